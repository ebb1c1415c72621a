//! Schema AST element types

use std::collections::HashMap;

/// A parsed XML Schema document
#[derive(Debug, Clone, Default)]
pub struct XsdSchema {
    /// Target namespace of the schema document
    pub target_namespace: Option<String>,
    /// Global element declarations, in document order
    pub elements: Vec<XsdElement>,
    /// Named complex types, keyed by local name
    pub complex_types: HashMap<String, XsdComplexType>,
    /// Named simple types, keyed by local name, already flattened to a
    /// primitive plus merged facets
    pub simple_types: HashMap<String, XsdSimpleType>,
}

impl XsdSchema {
    /// Look up a named simple type
    pub fn simple_type(&self, name: &str) -> Option<&XsdSimpleType> {
        self.simple_types.get(name)
    }

    /// Look up a named complex type
    pub fn complex_type(&self, name: &str) -> Option<&XsdComplexType> {
        self.complex_types.get(name)
    }

    /// Look up a global element by local name
    pub fn global_element(&self, name: &str) -> Option<&XsdElement> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// An element declaration, global or local
#[derive(Debug, Clone)]
pub struct XsdElement {
    /// Local name; empty for unresolved `ref=` declarations
    pub name: String,
    /// Target namespace of the declaring schema
    pub namespace: Option<String>,
    /// Name of a global element this local declaration references
    pub ref_name: Option<String>,
    pub min_occurs: u32,
    /// `u32::MAX` means `unbounded`
    pub max_occurs: u32,
    pub type_ref: TypeRef,
    /// `xs:key` / `xs:unique` constraints declared on this element
    pub identity_constraints: Vec<IdentityConstraint>,
}

/// How an element's type is given
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// `type="xs:string"` and friends: a builtin primitive local name
    Builtin(String),
    /// `type="SomeNamedType"`, resolved against the schema registries
    Named(String),
    /// Inline `<xs:simpleType>` child
    InlineSimple(XsdSimpleType),
    /// Inline `<xs:complexType>` child
    InlineComplex(Box<XsdComplexType>),
    /// No type given (`xs:anyType` semantics)
    None,
}

/// A complex type: attributes plus a content particle and/or a simple text type
#[derive(Debug, Clone, Default)]
pub struct XsdComplexType {
    /// Named base complex type for `complexContent` extension
    pub base: Option<String>,
    pub attributes: Vec<XsdAttribute>,
    pub content: ElementContent,
}

/// Content of a complex type
#[derive(Debug, Clone, Default)]
pub enum ElementContent {
    /// No children (attributes only, or empty)
    #[default]
    Empty,
    /// A compositor particle with child elements
    Particle(Particle),
    /// `simpleContent`: text of the given simple type, plus attributes
    Simple(XsdSimpleType),
}

/// An XSD compositor
#[derive(Debug, Clone)]
pub enum Particle {
    Sequence(Vec<ParticleItem>),
    All(Vec<ParticleItem>),
    Choice(Vec<ParticleItem>),
}

impl Particle {
    pub fn items(&self) -> &[ParticleItem] {
        match self {
            Particle::Sequence(items) | Particle::All(items) | Particle::Choice(items) => items,
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, Particle::Choice(_))
    }
}

/// One entry inside a compositor
#[derive(Debug, Clone)]
pub enum ParticleItem {
    Element(XsdElement),
    /// A nested compositor
    Group(Particle),
}

/// An attribute declaration on a complex type
#[derive(Debug, Clone)]
pub struct XsdAttribute {
    pub name: String,
    /// `use="required"`
    pub required: bool,
    pub ty: XsdSimpleType,
}

/// A simple type flattened to its primitive name plus merged facets
#[derive(Debug, Clone)]
pub struct XsdSimpleType {
    /// Local name of the XSD builtin primitive, e.g. `string`, `decimal`, `ID`
    pub primitive: String,
    pub facets: Facets,
}

impl XsdSimpleType {
    pub fn builtin(primitive: &str) -> Self {
        Self {
            primitive: primitive.to_string(),
            facets: Facets::default(),
        }
    }
}

/// Restriction facets collected along a derivation chain.
/// Nearer (more derived) restrictions win on merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    pub length: Option<u32>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub total_digits: Option<u32>,
    pub fraction_digits: Option<u32>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
}

impl Facets {
    /// Merge `base` facets underneath `self`: values already present win.
    pub fn merge_base(&mut self, base: &Facets) {
        if self.length.is_none() {
            self.length = base.length;
        }
        if self.min_length.is_none() {
            self.min_length = base.min_length;
        }
        if self.max_length.is_none() {
            self.max_length = base.max_length;
        }
        if self.total_digits.is_none() {
            self.total_digits = base.total_digits;
        }
        if self.fraction_digits.is_none() {
            self.fraction_digits = base.fraction_digits;
        }
        if self.min_inclusive.is_none() {
            self.min_inclusive = base.min_inclusive.clone();
        }
        if self.max_inclusive.is_none() {
            self.max_inclusive = base.max_inclusive.clone();
        }
        if self.min_exclusive.is_none() {
            self.min_exclusive = base.min_exclusive.clone();
        }
        if self.max_exclusive.is_none() {
            self.max_exclusive = base.max_exclusive.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Facets::default()
    }
}

/// Kind of identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Key,
    Unique,
}

/// An `xs:key` or `xs:unique` declaration on an element
#[derive(Debug, Clone)]
pub struct IdentityConstraint {
    pub kind: IdentityKind,
    pub name: String,
    /// Raw `xpath` attribute of each `xs:field` child
    pub fields: Vec<String>,
}
