//! Well-known metamodel paths and property names

pub const ROOT: &str = "Root";
pub const PATH_SEPARATOR: &str = "::";

// ── Classifiers ─────────────────────────────────────────
pub const ANY: &str = "meta::pure::metamodel::type::Any";
pub const TYPE: &str = "meta::pure::metamodel::type::Type";
pub const CLASS: &str = "meta::pure::metamodel::type::Class";
pub const PACKAGE: &str = "meta::pure::metamodel::type::Package";
pub const PACKAGEABLE_ELEMENT: &str = "meta::pure::metamodel::PackageableElement";
pub const REFERENCEABLE: &str = "meta::pure::metamodel::Referenceable";
pub const ENUMERATION: &str = "meta::pure::metamodel::type::Enumeration";
pub const ENUM: &str = "meta::pure::metamodel::type::Enum";
pub const FUNCTION: &str = "meta::pure::metamodel::function::Function";
pub const PROPERTY: &str = "meta::pure::metamodel::function::property::Property";
pub const QUALIFIED_PROPERTY: &str = "meta::pure::metamodel::function::property::QualifiedProperty";
pub const STEREOTYPE: &str = "meta::pure::metamodel::extension::Stereotype";
pub const TAG: &str = "meta::pure::metamodel::extension::Tag";
pub const IMPORT_GROUP: &str = "meta::pure::metamodel::import::ImportGroup";

pub const IMPORT_STUB: &str = "meta::pure::metamodel::import::ImportStub";
pub const PROPERTY_STUB: &str = "meta::pure::metamodel::import::PropertyStub";
pub const ENUM_STUB: &str = "meta::pure::metamodel::import::EnumStub";
pub const GRAMMAR_INFO_STUB: &str = "meta::pure::metamodel::import::GrammarInfoStub";

// ── Properties ──────────────────────────────────────────
pub const NAME: &str = "name";
pub const ID: &str = "id";
pub const VALUE: &str = "value";
pub const VALUES: &str = "values";
pub const PACKAGE_PROPERTY: &str = "package";
pub const CHILDREN: &str = "children";

/// Primitive type names. Values of these types are never addressable nodes.
pub const PRIMITIVE_TYPES: &[&str] = &[
    "Boolean",
    "Byte",
    "Date",
    "DateTime",
    "Decimal",
    "Float",
    "Integer",
    "LatestDate",
    "Number",
    "StrictDate",
    "StrictTime",
    "String",
];

/// Placeholder classifiers that never receive their own reference id.
pub const STUB_CLASSIFIERS: &[&str] = &[IMPORT_STUB, PROPERTY_STUB, ENUM_STUB, GRAMMAR_INFO_STUB];

/// Structural back-references, as `<owner classifier>.<property>`.
pub const BACK_REFERENCES: &[&str] = &[
    "meta::pure::metamodel::function::Function.applications",
    "meta::pure::metamodel::type::Type.specializations",
    "meta::pure::metamodel::type::Class.propertiesFromAssociations",
    "meta::pure::metamodel::type::Class.qualifiedPropertiesFromAssociations",
    "meta::pure::metamodel::Referenceable.referenceUsages",
    "meta::pure::metamodel::PackageableElement.package",
    "meta::pure::metamodel::type::Package.children",
    "meta::pure::metamodel::function::property::Property.owner",
    "meta::pure::metamodel::function::property::QualifiedProperty.owner",
];

pub fn is_primitive_type(name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&name)
}

/// Strip the package prefix from a path: `a::b::C` -> `C`.
pub fn simple_name(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}
