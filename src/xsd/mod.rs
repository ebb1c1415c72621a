//! XSD parse tree: a roxmltree-backed reader and the schema AST it produces.
//!
//! The reader resolves named simple types eagerly (restriction chains are
//! flattened to a primitive plus merged facets); complex types and element
//! references stay name-keyed so that cyclic type graphs can be walked
//! lazily with a guard by the model builder.

mod reader;
mod types;

pub use reader::{parse_schema_document, parse_schema_file};
pub(crate) use reader::read_file_with_encoding_fallback;
pub use types::{
    ElementContent, Facets, IdentityConstraint, IdentityKind, Particle, ParticleItem, TypeRef,
    XsdAttribute, XsdComplexType, XsdElement, XsdSchema, XsdSimpleType,
};

/// The XML Schema namespace URI
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
