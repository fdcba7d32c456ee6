//! Unit tests for refgraph-reference

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use refgraph_core::{
    m3, ClassDescriptor, ModelGraph, ModelNode, NodeId, Primitive, PropertyDescriptor as P,
    ReferenceConfig, SourceSpan, TypeRegistry, Value,
};

use crate::*;

const SOURCE: &str = "/test/model.pure";
const THING: &str = "test::Thing";
const MULTI: &str = "test::Multi";
const BAR: &str = "test::Bar";
const ITEM: &str = "test::Item";
const PROXY: &str = "test::Proxy";
const KEYED: &str = "test::Keyed";

// ── Fixtures ────────────────────────────────────────────

fn span(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> SourceSpan {
    SourceSpan::new(SOURCE, start_line, start_column, end_line, end_column)
}

fn line(n: u32) -> SourceSpan {
    span(n, 1, n, 40)
}

fn registry() -> TypeRegistry {
    let mut types = TypeRegistry::with_m3();
    types.register(
        ClassDescriptor::new(THING)
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::optional("alt", BAR))
            .property(P::to_one("bar", BAR))
            .property(P::optional("zzzz", BAR))
            .property(P::to_many("bars", BAR))
            .property(P::to_many("items", ITEM))
            .property(P::optional("proxy", PROXY))
            .property(P::to_many("labels", "String"))
            .property(P::optional("other", THING)),
    );
    types.register(
        ClassDescriptor::new(MULTI)
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::to_many("bar", BAR)),
    );
    types.register(
        ClassDescriptor::new(BAR)
            .extends(m3::ANY)
            .property(P::to_one("name", "String"))
            .property(P::optional("child", BAR))
            .property(P::optional("parent", THING)),
    );
    types.register(
        ClassDescriptor::new(ITEM)
            .extends(m3::ANY)
            .property(P::to_one("code", "String"))
            .property(P::to_many("parts", ITEM)),
    );
    types.register(
        ClassDescriptor::new(PROXY)
            .extends(m3::ANY)
            .property(P::optional("target", BAR)),
    );
    types.register(
        ClassDescriptor::new(KEYED)
            .extends(m3::ANY)
            .property(P::to_one("name", "String"))
            .property(P::to_one("id", "String")),
    );
    types
}

fn config() -> ReferenceConfig {
    let mut config = ReferenceConfig::default();
    config.stub_classifiers.push(PROXY.to_string());
    config
}

fn new_graph() -> ModelGraph {
    ModelGraph::new(registry())
}

fn add_element(graph: &mut ModelGraph, classifier: &str, name: &str, span: Option<SourceSpan>) -> NodeId {
    let mut node = ModelNode::new(classifier).with_name(name);
    node.span = span;
    graph.add_element("pkg", node).unwrap()
}

fn add_named(graph: &mut ModelGraph, classifier: &str, name: &str, span: Option<SourceSpan>) -> NodeId {
    let mut node = ModelNode::new(classifier).with_primitive("name", Primitive::String(name.to_string()));
    node.span = span;
    graph.add_node(node)
}

fn link(graph: &mut ModelGraph, from: NodeId, property: &str, to: NodeId) {
    graph.push_value(from, property, to).unwrap();
}

fn ids_of(graph: &ModelGraph, element: NodeId) -> HashMap<NodeId, String> {
    let classes = ClassInfoCache::new(&config());
    ReferenceIdGenerator::new(graph, &classes)
        .generate_ids(element)
        .unwrap()
}

fn sorted_ids(ids: &HashMap<NodeId, String>) -> Vec<String> {
    let mut ids: Vec<String> = ids.values().cloned().collect();
    ids.sort();
    ids
}

/// `pkg::Foo` over lines 1-20 and `pkg::Baz` over lines 30-40.
fn two_elements() -> (ModelGraph, NodeId, NodeId) {
    let mut graph = new_graph();
    let foo = add_element(&mut graph, THING, "Foo", Some(span(1, 1, 20, 1)));
    let baz = add_element(&mut graph, THING, "Baz", Some(span(30, 1, 40, 1)));
    (graph, foo, baz)
}

// ── Edge and path ordering ──────────────────────────────

#[test]
fn test_compare_strings_length_first() {
    assert_eq!(compare_strings("b", "aa"), Ordering::Less);
    assert_eq!(compare_strings("ab", "b"), Ordering::Greater);
    assert_eq!(compare_strings("ab", "ac"), Ordering::Less);
    assert_eq!(compare_strings("same", "same"), Ordering::Equal);
}

#[test]
fn test_edge_kind_precedence() {
    let to_one = Edge::to_one("zzzzzz");
    let by_index = Edge::at_index("a", 0);
    let by_key = Edge::with_key("a", "name", "a");

    assert!(to_one < by_index);
    assert!(to_one < by_key);
    assert!(by_index < by_key);
    assert!(Edge::at_index("zzzzzz", 99) < Edge::with_key("a", "id", "a"));
}

#[test]
fn test_edge_order_within_kind() {
    assert!(Edge::to_one("bar") < Edge::to_one("alpha"));
    assert!(Edge::to_one("alt") < Edge::to_one("bar"));
    assert!(Edge::at_index("p", 2) < Edge::at_index("p", 10));
    assert!(Edge::at_index("p", 10) < Edge::at_index("pp", 0));
    assert!(Edge::with_key("p", "id", "z") < Edge::with_key("p", "name", "a"));
    assert!(Edge::with_key("p", "name", "b") < Edge::with_key("p", "name", "aa"));
    assert_eq!(Edge::with_key("p", "name", "a").cmp(&Edge::with_key("p", "name", "a")), Ordering::Equal);
}

#[test]
fn test_shorter_path_wins_regardless_of_edges() {
    let short = GraphPath::new("pkg::Foo").with_edge(Edge::with_key("zzzz", "name", "zzzz"));
    let long = GraphPath::new("pkg::Foo")
        .with_edge(Edge::to_one("a"))
        .with_edge(Edge::to_one("b"));
    assert!(short < long);
}

// ── Path encoding ───────────────────────────────────────

#[test]
fn test_path_description_and_parse() {
    let path = GraphPath::new("pkg::Foo")
        .with_edge(Edge::with_key("bar", "name", "a"))
        .with_edge(Edge::to_one("child"))
        .with_edge(Edge::at_index("items", 3));
    let description = path.description();
    assert_eq!(description, "pkg::Foo.bar[name=a].child.items[3]");
    assert_eq!(GraphPath::parse(&description).unwrap(), path);
    assert_eq!(description.parse::<GraphPath>().unwrap().start_path(), "pkg::Foo");
}

#[test]
fn test_key_escaping_round_trips() {
    let path = GraphPath::new("pkg::Foo").with_edge(Edge::with_key("bar", "name", r"x]y\z=1[0]"));
    let description = path.description();
    assert_eq!(description, r"pkg::Foo.bar[name=x\]y\\z=1[0\]]");
    assert_eq!(GraphPath::parse(&description).unwrap(), path);
}

#[test]
fn test_numeric_key_is_not_an_index() {
    let keyed = GraphPath::parse("pkg::Foo.bar[id=1]").unwrap();
    let indexed = GraphPath::parse("pkg::Foo.bar[1]").unwrap();
    assert_eq!(keyed.edges()[0], Edge::with_key("bar", "id", "1"));
    assert_eq!(indexed.edges()[0], Edge::at_index("bar", 1));
}

#[test]
fn test_parse_rejects_malformed_ids() {
    for bad in [
        "",
        ".bar",
        "pkg::Foo.",
        "pkg::::Foo.bar",
        "pkg::Foo bar",
        "pkg::Foo.bar[",
        "pkg::Foo.bar[1",
        "pkg::Foo.bar[1x]",
        "pkg::Foo.bar[name=a",
        "pkg::Foo.bar[name]",
        r"pkg::Foo.bar[name=a\q]",
        "pkg::Foo.bar]",
        "pkg::Foo.9bar",
    ] {
        let err = GraphPath::parse(bad).unwrap_err();
        assert!(
            matches!(err, ReferenceError::InvalidReferenceId { .. }),
            "{bad:?} gave {err}"
        );
    }
}

// ── ContainingElementIndex ──────────────────────────────

#[test]
fn test_containing_element_lookup() {
    let (mut graph, foo, baz) = two_elements();
    let inside_foo = add_named(&mut graph, BAR, "a", Some(line(5)));
    let inside_baz = add_named(&mut graph, BAR, "b", Some(line(35)));
    let between = add_named(&mut graph, BAR, "c", Some(line(25)));
    let elsewhere = add_named(&mut graph, BAR, "d", Some(SourceSpan::new("/other.pure", 5, 1, 5, 5)));
    let spanless = add_named(&mut graph, BAR, "e", None);

    let index = ContainingElementIndex::for_graph(&graph).unwrap();
    assert_eq!(index.find_containing_element(&graph, inside_foo), Some(foo));
    assert_eq!(index.find_containing_element(&graph, inside_baz), Some(baz));
    assert_eq!(index.find_containing_element(&graph, foo), Some(foo));
    assert_eq!(index.find_containing_element(&graph, between), None);
    assert_eq!(index.find_containing_element(&graph, elsewhere), None);
    assert_eq!(index.find_containing_element(&graph, spanless), None);
}

#[test]
fn test_packages_are_virtual_elements() {
    let (graph, _, _) = two_elements();
    let index = ContainingElementIndex::for_graph(&graph).unwrap();
    let pkg = graph.element_by_path("pkg").unwrap();
    assert_eq!(index.find_containing_element(&graph, pkg), Some(pkg));
    assert_eq!(index.find_containing_element(&graph, graph.root()), Some(graph.root()));
    // Root, pkg, Foo, Baz
    assert_eq!(index.element_count(), 4);
}

#[test]
fn test_overlapping_elements_rejected() {
    let mut graph = new_graph();
    add_element(&mut graph, THING, "A", Some(span(1, 1, 10, 1)));
    add_element(&mut graph, THING, "B", Some(span(5, 1, 15, 1)));
    let err = ContainingElementIndex::for_graph(&graph).unwrap_err();
    match err {
        ReferenceError::OverlappingElements { first, second, .. } => {
            assert_eq!(first, "pkg::A");
            assert_eq!(second, "pkg::B");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_adjacent_elements_and_duplicates_accepted() {
    let mut graph = new_graph();
    let a = add_element(&mut graph, THING, "A", Some(span(1, 1, 10, 1)));
    let b = add_element(&mut graph, THING, "B", Some(span(10, 2, 15, 1)));
    let node = add_named(&mut graph, BAR, "x", Some(span(10, 5, 10, 9)));

    let mut builder = ContainingElementIndex::builder(&graph);
    builder.add_elements([a, b, a]).unwrap();
    let index = builder.build().unwrap();
    assert_eq!(index.element_count(), 2);
    assert_eq!(index.find_containing_element(&graph, node), Some(b));
}

#[test]
fn test_spanless_non_package_element_rejected() {
    let mut graph = new_graph();
    let element = add_element(&mut graph, THING, "NoSpan", None);
    let mut builder = ContainingElementIndex::builder(&graph);
    let err = builder.add_element(element).err().unwrap();
    assert_eq!(err.to_string(), "Invalid element, no source information: pkg::NoSpan");
}

#[test]
fn test_invalid_span_rejected() {
    let mut graph = new_graph();
    let element = add_element(&mut graph, THING, "Backwards", Some(span(10, 1, 2, 1)));
    let mut builder = ContainingElementIndex::builder(&graph);
    assert!(matches!(
        builder.add_element(element).err().unwrap(),
        ReferenceError::InvalidElement(_)
    ));
}

// ── ClassInfo ───────────────────────────────────────────

#[test]
fn test_class_info_skips_back_references_and_primitives() {
    let graph = new_graph();
    let classes = ClassInfoCache::new(&config());
    let info = classes.class_info(&graph, THING).unwrap();

    let package = info.property("package").unwrap();
    assert!(package.to_one && package.skip);
    assert!(info.property("referenceUsages").unwrap().skip);
    assert!(info.property("labels").unwrap().skip);
    let bars = info.property("bars").unwrap();
    assert!(!bars.to_one && !bars.skip);
    assert_eq!(bars.raw_type.as_deref(), Some(BAR));
    // to-one primitives are filtered per value, not skipped
    assert!(!info.property("name").unwrap().skip);

    let package_info = classes.class_info(&graph, m3::PACKAGE).unwrap();
    assert!(package_info.property("children").unwrap().skip);
    let class_info = classes.class_info(&graph, m3::CLASS).unwrap();
    assert!(class_info.property("specializations").unwrap().skip);
    assert!(class_info.property("propertiesFromAssociations").unwrap().skip);
}

#[test]
fn test_index_keys() {
    let graph = new_graph();
    let classes = ClassInfoCache::new(&config());
    let keys = |classifier: &str| classes.class_info(&graph, classifier).unwrap().index_keys().to_vec();

    assert_eq!(keys(BAR), vec!["name"]);
    assert_eq!(keys(KEYED), vec!["name", "id"]);
    assert!(keys(ITEM).is_empty());
    assert_eq!(keys(m3::QUALIFIED_PROPERTY), vec!["id"]);
    assert_eq!(keys(m3::STEREOTYPE), vec!["value"]);
    assert_eq!(keys(m3::TAG), vec!["value"]);
    assert_eq!(keys(m3::ENUM), vec!["name"]);
}

#[test]
fn test_enumeration_values_typed_as_enum() {
    let graph = new_graph();
    let classes = ClassInfoCache::new(&config());
    let info = classes.class_info(&graph, m3::ENUMERATION).unwrap();
    let values = info.property(m3::VALUES).unwrap();
    assert_eq!(values.raw_type.as_deref(), Some(m3::ENUM));
    assert!(!values.skip);
}

#[test]
fn test_class_info_is_memoized() {
    let graph = new_graph();
    let classes = ClassInfoCache::new(&config());
    let first = classes.class_info(&graph, BAR).unwrap();
    let second = classes.class_info(&graph, BAR).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(classes.len(), 1);
    assert!(matches!(
        classes.class_info(&graph, "test::Unknown").unwrap_err(),
        ReferenceError::UnknownClassifier(c) if c == "test::Unknown"
    ));
}

// ── Generator scenarios ─────────────────────────────────

#[test]
fn test_to_one_child_id() {
    let mut graph = new_graph();
    let foo = add_element(&mut graph, THING, "Foo", Some(span(1, 1, 20, 1)));
    let bar = add_named(&mut graph, BAR, "x", Some(line(2)));
    link(&mut graph, foo, "bar", bar);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids[&foo], "pkg::Foo");
    assert_eq!(ids[&bar], "pkg::Foo.bar");
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_to_many_keyed_by_name() {
    let mut graph = new_graph();
    let foo = add_element(&mut graph, MULTI, "Foo", Some(span(1, 1, 20, 1)));
    let a = add_named(&mut graph, BAR, "a", Some(line(2)));
    let b = add_named(&mut graph, BAR, "b", Some(line(3)));
    link(&mut graph, foo, "bar", a);
    link(&mut graph, foo, "bar", b);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids[&a], "pkg::Foo.bar[name=a]");
    assert_eq!(ids[&b], "pkg::Foo.bar[name=b]");
}

#[test]
fn test_to_many_falls_back_to_index_on_duplicate_keys() {
    let mut graph = new_graph();
    let foo = add_element(&mut graph, MULTI, "Foo", Some(span(1, 1, 20, 1)));
    let a = add_named(&mut graph, BAR, "same", Some(line(2)));
    let b = add_named(&mut graph, BAR, "same", Some(line(3)));
    link(&mut graph, foo, "bar", a);
    link(&mut graph, foo, "bar", b);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids[&a], "pkg::Foo.bar[0]");
    assert_eq!(ids[&b], "pkg::Foo.bar[1]");
}

#[test]
fn test_to_many_falls_back_to_index_on_missing_key() {
    let mut graph = new_graph();
    let foo = add_element(&mut graph, MULTI, "Foo", Some(span(1, 1, 20, 1)));
    let a = add_named(&mut graph, BAR, "a", Some(line(2)));
    let unnamed = graph.add_node(ModelNode::new(BAR).with_span(line(3)));
    link(&mut graph, foo, "bar", a);
    link(&mut graph, foo, "bar", unnamed);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids[&a], "pkg::Foo.bar[0]");
    assert_eq!(ids[&unnamed], "pkg::Foo.bar[1]");
}

#[test]
fn test_second_index_key_used_when_first_fails() {
    let mut types = registry();
    types.register(
        ClassDescriptor::new("test::Holder")
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::to_many("entries", KEYED)),
    );
    let mut graph = ModelGraph::new(types);
    let holder = graph
        .add_element("pkg", ModelNode::new("test::Holder").with_name("H").with_span(span(1, 1, 20, 1)))
        .unwrap();
    let mut entry = |name: &str, id: &str, line_no: u32| {
        let node = ModelNode::new(KEYED)
            .with_span(line(line_no))
            .with_primitive("name", Primitive::String(name.into()))
            .with_primitive("id", Primitive::String(id.into()));
        let node = graph.add_node(node);
        graph.push_value(holder, "entries", node).unwrap();
        node
    };
    let first = entry("dup", "one", 2);
    let second = entry("dup", "two", 3);

    let ids = ids_of(&graph, holder);
    assert_eq!(ids[&first], "pkg::H.entries[id=one]");
    assert_eq!(ids[&second], "pkg::H.entries[id=two]");
}

#[test]
fn test_generated_ids_snapshot() {
    let (mut graph, foo, _) = two_elements();
    let bar = add_named(&mut graph, BAR, "main", Some(line(2)));
    let child = add_named(&mut graph, BAR, "nested", Some(line(3)));
    let first = graph.add_node(ModelNode::new(ITEM).with_span(line(4)).with_primitive("code", Primitive::String("i1".into())));
    let part = graph.add_node(ModelNode::new(ITEM).with_span(line(5)));
    link(&mut graph, foo, "bar", bar);
    link(&mut graph, bar, "child", child);
    link(&mut graph, foo, "items", first);
    link(&mut graph, first, "parts", part);

    let ids = ids_of(&graph, foo);
    insta::assert_json_snapshot!(sorted_ids(&ids), @r###"
    [
      "pkg::Foo",
      "pkg::Foo.bar",
      "pkg::Foo.bar.child",
      "pkg::Foo.items[0]",
      "pkg::Foo.items[0].parts[0]"
    ]
    "###);
}

#[test]
fn test_shorter_path_preferred() {
    let (mut graph, foo, _) = two_elements();
    let bar = add_named(&mut graph, BAR, "main", Some(line(2)));
    let target = add_named(&mut graph, BAR, "t", Some(line(3)));
    link(&mut graph, foo, "bar", bar);
    link(&mut graph, bar, "child", target);
    link(&mut graph, foo, "bars", target);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids[&target], "pkg::Foo.bars[name=t]");
}

#[test]
fn test_equal_length_tie_breaks() {
    let (mut graph, foo, _) = two_elements();
    // to-one beats to-many even with a longer property name
    let a = add_named(&mut graph, BAR, "a", Some(line(2)));
    link(&mut graph, foo, "zzzz", a);
    link(&mut graph, foo, "bars", a);
    // shorter property name beats longer
    let b = add_named(&mut graph, BAR, "b", Some(line(3)));
    link(&mut graph, foo, "bar", b);
    // same length: lexicographic
    let c = add_named(&mut graph, BAR, "c", Some(line(4)));
    link(&mut graph, foo, "alt", c);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids[&a], "pkg::Foo.zzzz");
    assert_eq!(ids[&b], "pkg::Foo.bar");
    assert_eq!(ids[&c], "pkg::Foo.alt");

    let mut graph2 = new_graph();
    let foo2 = add_element(&mut graph2, THING, "Foo", Some(span(1, 1, 20, 1)));
    let shared = add_named(&mut graph2, BAR, "s", Some(line(2)));
    link(&mut graph2, foo2, "bar", shared);
    link(&mut graph2, foo2, "zzzz", shared);
    link(&mut graph2, foo2, "alt", shared);
    assert_eq!(ids_of(&graph2, foo2)[&shared], "pkg::Foo.alt");
}

#[test]
fn test_index_edge_preferred_over_key_edge() {
    let (mut graph, foo, _) = two_elements();
    let target = add_named(&mut graph, BAR, "x", Some(line(2)));
    // Item has no index keys, so `items` is addressed by position
    link(&mut graph, foo, "items", target);
    link(&mut graph, foo, "bars", target);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids[&target], "pkg::Foo.items[0]");
}

#[test]
fn test_cycles_terminate() {
    let (mut graph, foo, _) = two_elements();
    let a = add_named(&mut graph, BAR, "a", Some(line(2)));
    let b = add_named(&mut graph, BAR, "b", Some(line(3)));
    link(&mut graph, foo, "bar", a);
    link(&mut graph, a, "child", b);
    link(&mut graph, b, "child", a);
    link(&mut graph, a, "parent", foo);
    link(&mut graph, b, "parent", foo);
    link(&mut graph, foo, "other", foo);

    let ids = ids_of(&graph, foo);
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[&foo], "pkg::Foo");
    assert_eq!(ids[&a], "pkg::Foo.bar");
    assert_eq!(ids[&b], "pkg::Foo.bar.child");
}

#[test]
fn test_external_nodes_not_followed() {
    let (mut graph, foo, baz) = two_elements();
    let inside_baz = add_named(&mut graph, BAR, "theirs", Some(line(35)));
    link(&mut graph, foo, "other", baz);
    link(&mut graph, foo, "bar", inside_baz);
    let pkg = graph.element_by_path("pkg").unwrap();

    let ids = ids_of(&graph, foo);
    assert!(!ids.contains_key(&baz));
    assert!(!ids.contains_key(&inside_baz));
    assert!(!ids.contains_key(&pkg));
    assert_eq!(ids.len(), 1);
}

#[test]
fn test_stub_and_spanless_nodes_are_walked_through() {
    let (mut graph, foo, _) = two_elements();
    let proxy = graph.add_node(ModelNode::new(PROXY).with_span(line(2)));
    let target = add_named(&mut graph, BAR, "t", Some(line(3)));
    link(&mut graph, foo, "proxy", proxy);
    link(&mut graph, proxy, "target", target);

    let spanless = add_named(&mut graph, BAR, "s", None);
    let nested = add_named(&mut graph, BAR, "n", Some(line(4)));
    link(&mut graph, foo, "bar", spanless);
    link(&mut graph, spanless, "child", nested);

    let ids = ids_of(&graph, foo);
    assert!(!ids.contains_key(&proxy));
    assert!(!ids.contains_key(&spanless));
    assert_eq!(ids[&target], "pkg::Foo.proxy.target");
    assert_eq!(ids[&nested], "pkg::Foo.bar.child");
}

#[test]
fn test_enumeration_values_keyed_by_name() {
    let mut graph = new_graph();
    let color = graph
        .add_element("pkg", ModelNode::new(m3::ENUMERATION).with_name("Color").with_span(span(1, 1, 5, 1)))
        .unwrap();
    let red = add_named(&mut graph, "pkg::Color", "RED", Some(line(2)));
    let green = add_named(&mut graph, "pkg::Color", "GREEN", Some(line(3)));
    link(&mut graph, color, m3::VALUES, red);
    link(&mut graph, color, m3::VALUES, green);

    let ids = ids_of(&graph, color);
    assert_eq!(ids[&red], "pkg::Color.values[name=RED]");
    assert_eq!(ids[&green], "pkg::Color.values[name=GREEN]");
}

#[test]
fn test_package_ids() {
    let (graph, _, _) = two_elements();
    let pkg = graph.element_by_path("pkg").unwrap();
    let ids = ids_of(&graph, pkg);
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[&pkg], "pkg");
    assert_eq!(ids_of(&graph, graph.root())[&graph.root()], "Root");
}

#[test]
fn test_generation_is_deterministic() {
    let build = |order: &[&str]| {
        let mut graph = new_graph();
        let foo = add_element(&mut graph, MULTI, "Foo", Some(span(1, 1, 20, 1)));
        for (i, name) in order.iter().enumerate() {
            let node = add_named(&mut graph, BAR, name, Some(line(2 + i as u32)));
            link(&mut graph, foo, "bar", node);
        }
        let ids = ids_of(&graph, foo);
        let by_name: BTreeMap<String, String> = ids
            .iter()
            .filter_map(|(node, id)| graph.value_string(*node, "name").map(|n| (n.to_string(), id.clone())))
            .collect();
        (ids_of(&graph, foo) == ids, by_name)
    };
    let (stable_first, first) = build(&["x", "y", "z"]);
    let (stable_second, second) = build(&["z", "x", "y"]);
    assert!(stable_first && stable_second);
    assert_eq!(first, second);
    assert_eq!(first["x"], "pkg::Foo.bar[name=x]");
}

// ── Generator validation ────────────────────────────────

#[test]
fn test_name_mismatch_rejected() {
    let (mut graph, foo, _) = two_elements();
    graph.set_value(foo, "name", Value::string("Other")).unwrap();
    let classes = ClassInfoCache::new(&config());
    let err = ReferenceIdGenerator::new(&graph, &classes).generate_ids(foo).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid element 'pkg::Foo': instance name ('Foo') does not match name property ('Other')"
    );
}

#[test]
fn test_missing_name_rejected() {
    let (mut graph, foo, _) = two_elements();
    graph.clear_property(foo, "name").unwrap();
    let classes = ClassInfoCache::new(&config());
    let err = ReferenceIdGenerator::new(&graph, &classes).generate_ids(foo).unwrap_err();
    assert_eq!(err.to_string(), "Invalid element 'pkg::Foo': name is null");
}

#[test]
fn test_missing_instance_name_rejected() {
    let mut graph = new_graph();
    let node = ModelNode::new(THING)
        .with_primitive("name", Primitive::String("Foo".into()))
        .with_span(span(1, 1, 20, 1));
    let foo = graph.add_element("pkg", node).unwrap();
    assert_eq!(graph.element_path(foo).as_deref(), Some("pkg::Foo"));

    let classes = ClassInfoCache::new(&config());
    let err = ReferenceIdGenerator::new(&graph, &classes).generate_ids(foo).unwrap_err();
    assert_eq!(err.to_string(), "Invalid element 'pkg::Foo': name is null");
}

#[test]
fn test_element_name_outside_id_syntax_rejected() {
    let mut graph = new_graph();
    let element = add_element(&mut graph, THING, "Foo.Bar", Some(span(1, 1, 20, 1)));
    let classes = ClassInfoCache::new(&config());
    let err = ReferenceIdGenerator::new(&graph, &classes).generate_ids(element).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid element 'pkg::Foo.Bar': path cannot start a reference id"
    );
}

#[test]
fn test_property_name_outside_id_syntax_rejected() {
    let mut types = registry();
    types.register(
        ClassDescriptor::new("test::Odd")
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::optional("my prop", BAR)),
    );
    let mut graph = ModelGraph::new(types);
    let foo = graph
        .add_element("pkg", ModelNode::new("test::Odd").with_name("Foo").with_span(span(1, 1, 20, 1)))
        .unwrap();
    let classes = ClassInfoCache::new(&config());

    // Unset properties never reach an id
    let ids = ReferenceIdGenerator::new(&graph, &classes).generate_ids(foo).unwrap();
    assert_eq!(sorted_ids(&ids), vec!["pkg::Foo"]);

    let bar = add_named(&mut graph, BAR, "a", Some(line(2)));
    link(&mut graph, foo, "my prop", bar);
    let err = ReferenceIdGenerator::new(&graph, &classes).generate_ids(foo).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid property name 'my prop' on test::Odd: not usable in a reference id"
    );

    let provider = ReferenceIdProvider::new(&graph, &config()).unwrap();
    assert!(!provider.has_reference_id(bar));
    match provider.reference_id(bar).unwrap_err() {
        ReferenceError::CannotProvide { source: Some(source), .. } => {
            assert!(matches!(*source, ReferenceError::InvalidElement(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_id_syntax_predicates() {
    assert!(is_id_identifier("firstName"));
    assert!(is_id_identifier("_x$1"));
    assert!(!is_id_identifier(""));
    assert!(!is_id_identifier("1st"));
    assert!(!is_id_identifier("my prop"));

    assert!(is_id_start_path("pkg::Foo"));
    assert!(is_id_start_path("Foo"));
    assert!(!is_id_start_path("pkg::Foo.Bar"));
    assert!(!is_id_start_path("pkg::Foo[0]"));
    assert!(!is_id_start_path("pkg::::Foo"));
    assert!(!is_id_start_path(""));
}

#[test]
fn test_missing_source_information_rejected() {
    let mut graph = new_graph();
    let element = add_element(&mut graph, THING, "NoSpan", None);
    let classes = ClassInfoCache::new(&config());
    let err = ReferenceIdGenerator::new(&graph, &classes).generate_ids(element).unwrap_err();
    assert_eq!(err.to_string(), "No source information for 'pkg::NoSpan'");
}

#[test]
fn test_interior_node_is_not_an_element() {
    let (mut graph, _, _) = two_elements();
    let node = add_named(&mut graph, BAR, "x", Some(line(2)));
    let classes = ClassInfoCache::new(&config());
    let err = ReferenceIdGenerator::new(&graph, &classes).generate_ids(node).unwrap_err();
    assert!(matches!(err, ReferenceError::InvalidElement(msg) if msg.contains("not a packageable element")));
}

// ── Provider and resolver ───────────────────────────────

struct ProviderFixture {
    graph: ModelGraph,
    foo: NodeId,
    a: NodeId,
    b: NodeId,
    nested: NodeId,
    orphan: NodeId,
    elsewhere: NodeId,
}

fn provider_fixture() -> ProviderFixture {
    let mut graph = new_graph();
    let foo = add_element(&mut graph, MULTI, "Foo", Some(span(1, 1, 20, 1)));
    add_element(&mut graph, THING, "Baz", Some(span(30, 1, 40, 1)));
    let a = add_named(&mut graph, BAR, "a", Some(line(2)));
    let b = add_named(&mut graph, BAR, "b", Some(line(3)));
    let nested = add_named(&mut graph, BAR, "n", Some(line(4)));
    let orphan = add_named(&mut graph, BAR, "o", Some(line(5)));
    let elsewhere = add_named(&mut graph, BAR, "e", Some(SourceSpan::new("/other.pure", 1, 1, 1, 5)));
    link(&mut graph, foo, "bar", a);
    link(&mut graph, foo, "bar", b);
    link(&mut graph, a, "child", nested);
    ProviderFixture {
        graph,
        foo,
        a,
        b,
        nested,
        orphan,
        elsewhere,
    }
}

#[test]
fn test_provider_ids_round_trip() {
    let fx = provider_fixture();
    let provider = ReferenceIdProvider::new(&fx.graph, &config()).unwrap();
    let resolver = provider.resolver();

    for node in [fx.foo, fx.a, fx.b, fx.nested] {
        assert!(provider.has_reference_id(node));
        let id = provider.reference_id(node).unwrap();
        assert_eq!(resolver.resolve_reference(&id).unwrap(), node, "{id}");
    }
    assert_eq!(provider.reference_id(fx.nested).unwrap(), "pkg::Foo.bar[name=a].child");
    assert_eq!(provider.cached_owner_count(), 1);
}

#[test]
fn test_provider_cannot_provide() {
    let fx = provider_fixture();
    let provider = ReferenceIdProvider::new(&fx.graph, &config()).unwrap();

    assert!(!provider.has_reference_id(fx.orphan));
    match provider.reference_id(fx.orphan).unwrap_err() {
        ReferenceError::CannotProvide { owner, source, .. } => {
            assert_eq!(owner.as_deref(), Some("pkg::Foo"));
            assert!(source.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!provider.has_reference_id(fx.elsewhere));
    match provider.reference_id(fx.elsewhere).unwrap_err() {
        ReferenceError::CannotProvide { owner, reason, .. } => {
            assert!(owner.is_none());
            assert_eq!(reason, "no containing element found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_provider_wraps_generation_errors() {
    let mut fx = provider_fixture();
    fx.graph.set_value(fx.foo, "name", Value::string("Renamed")).unwrap();
    let provider = ReferenceIdProvider::new(&fx.graph, &config()).unwrap();
    let err = provider.reference_id(fx.a).unwrap_err();
    match err {
        ReferenceError::CannotProvide { source: Some(source), .. } => {
            assert!(matches!(*source, ReferenceError::InvalidElement(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_provider_concurrent_readers_agree() {
    let fx = provider_fixture();
    let provider = ReferenceIdProvider::new(&fx.graph, &config()).unwrap();
    let nodes = [fx.foo, fx.a, fx.b, fx.nested];

    let results: Vec<Vec<String>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    nodes
                        .iter()
                        .map(|n| provider.reference_id(*n).unwrap())
                        .collect::<Vec<String>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(provider.cached_owner_count(), 1);
}

#[test]
fn test_precompute_matches_lazy_ids() {
    let fx = provider_fixture();
    let eager = ReferenceIdProvider::new(&fx.graph, &config()).unwrap();
    let elements: Vec<NodeId> = ["pkg::Foo", "pkg::Baz"]
        .iter()
        .filter_map(|p| fx.graph.element_by_path(p))
        .collect();
    eager.precompute(&elements).unwrap();
    assert_eq!(eager.cached_owner_count(), 2);

    let lazy = ReferenceIdProvider::new(&fx.graph, &config()).unwrap();
    assert_eq!(eager.reference_id(fx.b).unwrap(), lazy.reference_id(fx.b).unwrap());
}

#[test]
fn test_key_addressing_survives_reordering() {
    let mut fx = provider_fixture();
    {
        let provider = ReferenceIdProvider::new(&fx.graph, &config()).unwrap();
        assert_eq!(provider.reference_id(fx.a).unwrap(), "pkg::Foo.bar[name=a]");
    }

    fx.graph.clear_property(fx.foo, "bar").unwrap();
    link(&mut fx.graph, fx.foo, "bar", fx.b);
    link(&mut fx.graph, fx.foo, "bar", fx.a);

    let resolver = ReferenceIdResolver::new(&fx.graph);
    assert_eq!(resolver.resolve_reference("pkg::Foo.bar[name=a]").unwrap(), fx.a);
    assert_eq!(resolver.resolve_reference("pkg::Foo.bar[0]").unwrap(), fx.b);
    assert_eq!(resolver.resolve_reference("pkg::Foo.bar[1]").unwrap(), fx.a);
}

#[test]
fn test_resolver_errors() {
    let fx = provider_fixture();
    let resolver = ReferenceIdResolver::new(&fx.graph);

    for stale in [
        "pkg::Missing",
        "pkg::Foo.nothing",
        "pkg::Foo.bar[5]",
        "pkg::Foo.bar[name=zz]",
        "pkg::Foo.bar[name=a].child.child",
        "pkg::Foo.name",
    ] {
        let err = resolver.resolve_reference(stale).unwrap_err();
        assert!(
            matches!(err, ReferenceError::UnresolvableReferenceId { .. }),
            "{stale}: {err}"
        );
    }
    assert!(matches!(
        resolver.resolve_reference("pkg::Foo.bar[").unwrap_err(),
        ReferenceError::InvalidReferenceId { .. }
    ));
}

#[test]
fn test_to_one_resolution_requires_single_value() {
    let fx = provider_fixture();
    let resolver = ReferenceIdResolver::new(&fx.graph);
    let err = resolver.resolve_reference("pkg::Foo.bar").unwrap_err();
    assert!(err.to_string().contains("has 2 values"), "{err}");
}
