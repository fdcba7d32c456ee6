//! Classifier registry: class descriptors, properties, multiplicities

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::m3;

/// Declared multiplicity of a property. `upper == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiplicity {
    pub lower: u32,
    pub upper: Option<u32>,
}

impl Multiplicity {
    pub const ONE: Multiplicity = Multiplicity { lower: 1, upper: Some(1) };
    pub const ZERO_ONE: Multiplicity = Multiplicity { lower: 0, upper: Some(1) };
    pub const MANY: Multiplicity = Multiplicity { lower: 0, upper: None };
    pub const ONE_MANY: Multiplicity = Multiplicity { lower: 1, upper: None };

    /// Lenient check: only the upper bound has to be 1.
    pub fn is_to_one(&self) -> bool {
        self.upper == Some(1)
    }
}

/// Generic type of a property. The raw type is absent when the property is
/// typed by a type parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenericType {
    pub raw_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_parameter: Option<String>,
}

impl GenericType {
    pub fn raw(raw_type: impl Into<String>) -> Self {
        GenericType {
            raw_type: Some(raw_type.into()),
            type_parameter: None,
        }
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        GenericType {
            raw_type: None,
            type_parameter: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Classifier that declares the property. Filled in on registration.
    #[serde(default)]
    pub owner: String,
    pub generic_type: GenericType,
    pub multiplicity: Multiplicity,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, generic_type: GenericType, multiplicity: Multiplicity) -> Self {
        PropertyDescriptor {
            name: name.into(),
            owner: String::new(),
            generic_type,
            multiplicity,
        }
    }

    pub fn to_one(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self::new(name, GenericType::raw(raw_type), Multiplicity::ONE)
    }

    pub fn optional(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self::new(name, GenericType::raw(raw_type), Multiplicity::ZERO_ONE)
    }

    pub fn to_many(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self::new(name, GenericType::raw(raw_type), Multiplicity::MANY)
    }

    /// `<owner>.<name>`, the form used by the back-reference table.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub path: String,
    #[serde(default)]
    pub generalizations: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl ClassDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        ClassDescriptor {
            path: path.into(),
            generalizations: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn extends(mut self, general: impl Into<String>) -> Self {
        self.generalizations.push(general.into());
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }
}

/// Registry of class descriptors keyed by classifier path.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    classes: HashMap<String, ClassDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry {
            classes: HashMap::new(),
        }
    }

    /// Registry pre-populated with the metamodel classes the id scheme relies on.
    pub fn with_m3() -> Self {
        let mut registry = TypeRegistry::new();
        for class in m3_classes() {
            registry.register(class);
        }
        registry
    }

    /// Register or replace a class. Property owners default to the class path.
    pub fn register(&mut self, mut class: ClassDescriptor) {
        for property in &mut class.properties {
            if property.owner.is_empty() {
                property.owner = class.path.clone();
            }
        }
        tracing::debug!("Registered classifier: {}", class.path);
        self.classes.insert(class.path.clone(), class);
    }

    pub fn class(&self, path: &str) -> Option<&ClassDescriptor> {
        self.classes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.classes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values()
    }

    /// Own and inherited properties, keyed by name. The nearest declaration
    /// wins; generalizations are walked breadth-first.
    pub fn simple_properties(&self, path: &str) -> BTreeMap<String, PropertyDescriptor> {
        let mut result = BTreeMap::new();
        for class in self.linearize(path) {
            for property in &class.properties {
                result
                    .entry(property.name.clone())
                    .or_insert_with(|| property.clone());
            }
        }
        result
    }

    pub fn property(&self, path: &str, name: &str) -> Option<PropertyDescriptor> {
        self.linearize(path)
            .into_iter()
            .flat_map(|c| c.properties.iter())
            .find(|p| p.name == name)
            .cloned()
    }

    /// True if `path` is `general` or (transitively) generalizes to it.
    pub fn is_subtype(&self, path: &str, general: &str) -> bool {
        path == general || self.linearize(path).iter().any(|c| c.path == general)
    }

    fn linearize(&self, path: &str) -> Vec<&ClassDescriptor> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([path]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(class) = self.classes.get(current) {
                order.push(class);
                queue.extend(class.generalizations.iter().map(String::as_str));
            }
        }
        order
    }
}

fn m3_classes() -> Vec<ClassDescriptor> {
    use PropertyDescriptor as P;

    let mut classes = vec![
        ClassDescriptor::new(m3::ANY),
        ClassDescriptor::new(m3::REFERENCEABLE)
            .extends(m3::ANY)
            .property(P::to_many("referenceUsages", "meta::pure::metamodel::ReferenceUsage")),
        ClassDescriptor::new(m3::PACKAGEABLE_ELEMENT)
            .extends(m3::REFERENCEABLE)
            .property(P::optional(m3::NAME, "String"))
            .property(P::optional(m3::PACKAGE_PROPERTY, m3::PACKAGE)),
        ClassDescriptor::new(m3::TYPE)
            .extends(m3::ANY)
            .property(P::to_many("specializations", "meta::pure::metamodel::relationship::Generalization")),
        ClassDescriptor::new(m3::PACKAGE)
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::to_many(m3::CHILDREN, m3::PACKAGEABLE_ELEMENT)),
        ClassDescriptor::new(m3::CLASS)
            .extends(m3::TYPE)
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::to_many("properties", m3::PROPERTY))
            .property(P::to_many("qualifiedProperties", m3::QUALIFIED_PROPERTY))
            .property(P::to_many("propertiesFromAssociations", m3::PROPERTY))
            .property(P::to_many("qualifiedPropertiesFromAssociations", m3::QUALIFIED_PROPERTY))
            .property(P::to_many("stereotypes", m3::STEREOTYPE)),
        ClassDescriptor::new(m3::FUNCTION)
            .extends(m3::ANY)
            .property(P::to_many("applications", "meta::pure::metamodel::valuespecification::FunctionExpression")),
        ClassDescriptor::new(m3::PROPERTY)
            .extends(m3::FUNCTION)
            .property(P::to_one(m3::NAME, "String"))
            .property(P::to_one("owner", m3::CLASS))
            .property(P::to_one("genericType", "meta::pure::metamodel::type::generics::GenericType")),
        ClassDescriptor::new(m3::QUALIFIED_PROPERTY)
            .extends(m3::FUNCTION)
            .property(P::to_one(m3::NAME, "String"))
            .property(P::to_one(m3::ID, "String"))
            .property(P::to_one("owner", m3::CLASS)),
        ClassDescriptor::new("meta::pure::metamodel::type::generics::GenericType")
            .extends(m3::ANY)
            .property(P::optional("rawType", m3::TYPE))
            .property(P::to_many("typeArguments", "meta::pure::metamodel::type::generics::GenericType")),
        ClassDescriptor::new(m3::ENUMERATION)
            .extends(m3::TYPE)
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::new(m3::VALUES, GenericType::parameter("T"), Multiplicity::MANY)),
        ClassDescriptor::new(m3::ENUM)
            .extends(m3::ANY)
            .property(P::to_one(m3::NAME, "String")),
        ClassDescriptor::new("meta::pure::metamodel::extension::Profile")
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::to_many("p_stereotypes", m3::STEREOTYPE))
            .property(P::to_many("p_tags", m3::TAG)),
        ClassDescriptor::new(m3::STEREOTYPE)
            .extends(m3::ANY)
            .property(P::to_one(m3::VALUE, "String"))
            .property(P::to_one("profile", "meta::pure::metamodel::extension::Profile")),
        ClassDescriptor::new(m3::TAG)
            .extends(m3::ANY)
            .property(P::to_one(m3::VALUE, "String"))
            .property(P::to_one("profile", "meta::pure::metamodel::extension::Profile")),
        ClassDescriptor::new(m3::IMPORT_GROUP)
            .extends(m3::PACKAGEABLE_ELEMENT)
            .property(P::to_many("imports", "meta::pure::metamodel::import::Import")),
    ];
    for stub in m3::STUB_CLASSIFIERS {
        classes.push(ClassDescriptor::new(*stub).extends(m3::ANY));
    }
    for primitive in m3::PRIMITIVE_TYPES {
        classes.push(ClassDescriptor::new(*primitive).extends(m3::ANY));
    }
    classes
}
