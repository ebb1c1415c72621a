//! Reader for XSD schema documents.
//!
//! Walks a roxmltree document into the [`XsdSchema`] AST. Constructs the
//! reader does not understand (`xs:include`, `xs:group`, wildcards) are
//! surfaced as warnings and skipped; the model build proceeds with what was
//! understood.

use std::collections::HashMap;
use std::path::Path;

use roxmltree::{Document, Node};
use tracing::warn;

use crate::error::XsdIngestError;
use crate::xsd::{
    ElementContent, Facets, IdentityConstraint, IdentityKind, Particle, ParticleItem, TypeRef,
    XsdAttribute, XsdComplexType, XsdElement, XsdSchema, XsdSimpleType, XSD_NAMESPACE,
};

/// Read a file as a string: honor a BOM if present, try UTF-8, then fall
/// back to Windows-1252 (common for files produced on Windows hosts).
pub(crate) fn read_file_with_encoding_fallback(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;

    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(&bytes) {
        let (decoded, _, had_errors) = encoding.decode(&bytes[bom_len..]);
        if had_errors {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "File contains invalid characters",
            ));
        }
        return Ok(decoded.into_owned());
    }

    match String::from_utf8(bytes.clone()) {
        Ok(s) => Ok(s),
        Err(_) => {
            let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(&bytes);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}

/// Parse an XSD file into a schema AST
pub fn parse_schema_file(path: &Path) -> Result<XsdSchema, XsdIngestError> {
    let content = read_file_with_encoding_fallback(path).map_err(|source| {
        XsdIngestError::SchemaReadError {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let doc = Document::parse(&content).map_err(|source| XsdIngestError::SchemaParseError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_schema_document(&doc)
}

/// Parse an already-loaded XSD document
pub fn parse_schema_document(doc: &Document) -> Result<XsdSchema, XsdIngestError> {
    let root = doc.root_element();
    if !is_xsd(root, "schema") {
        return Err(XsdIngestError::InvalidSchema {
            message: format!("root element is <{}>, expected <xs:schema>", root.tag_name().name()),
        });
    }

    let target_namespace = root.attribute("targetNamespace").map(str::to_string);

    // First pass: collect named type definitions so forward references resolve.
    let mut raw_simple: HashMap<String, Node> = HashMap::new();
    let mut raw_complex: HashMap<String, Node> = HashMap::new();
    for child in root.children().filter(|n| n.is_element()) {
        match xsd_local(child) {
            Some("simpleType") => {
                if let Some(name) = child.attribute("name") {
                    raw_simple.insert(name.to_string(), child);
                }
            }
            Some("complexType") => {
                if let Some(name) = child.attribute("name") {
                    raw_complex.insert(name.to_string(), child);
                }
            }
            _ => {}
        }
    }

    let mut schema = XsdSchema {
        target_namespace,
        ..Default::default()
    };

    // Resolve named simple types to primitive + merged facets.
    for name in raw_simple.keys() {
        let mut seen = Vec::new();
        if let Some(resolved) = resolve_simple_by_name(name, &raw_simple, &mut seen) {
            schema.simple_types.insert(name.clone(), resolved);
        }
    }

    // Named complex types keep name-keyed references for lazy walking.
    for (name, node) in &raw_complex {
        let ct = parse_complex_type(*node, &raw_simple, &schema.target_namespace);
        schema.complex_types.insert(name.clone(), ct);
    }

    // Second pass: global elements.
    for child in root.children().filter(|n| n.is_element()) {
        match xsd_local(child) {
            Some("element") => {
                let element =
                    parse_element(child, &raw_simple, &schema.target_namespace);
                if element.name.is_empty() {
                    warn!("skipping global element without a name");
                    continue;
                }
                schema.elements.push(element);
            }
            Some("simpleType") | Some("complexType") | Some("annotation") => {}
            Some(other) => warn!(construct = other, "unsupported top-level schema construct"),
            None => {}
        }
    }

    Ok(schema)
}

fn is_xsd(node: Node, local: &str) -> bool {
    node.tag_name().namespace() == Some(XSD_NAMESPACE) && node.tag_name().name() == local
}

fn xsd_local<'a>(node: Node<'a, 'a>) -> Option<&'a str> {
    if node.tag_name().namespace() == Some(XSD_NAMESPACE) {
        Some(node.tag_name().name())
    } else {
        None
    }
}

fn parse_occurs(value: Option<&str>, default: u32) -> u32 {
    match value {
        None => default,
        Some("unbounded") => u32::MAX,
        Some(v) => v.parse().unwrap_or(default),
    }
}

/// Resolve a `type="..."` QName attribute into a [`TypeRef`]
fn resolve_type_attr(node: Node, value: &str) -> TypeRef {
    let (prefix, local) = match value.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, value),
    };
    let uri = node.lookup_namespace_uri(prefix);
    if uri == Some(XSD_NAMESPACE) {
        TypeRef::Builtin(local.to_string())
    } else {
        TypeRef::Named(local.to_string())
    }
}

fn parse_element(
    node: Node,
    raw_simple: &HashMap<String, Node>,
    target_ns: &Option<String>,
) -> XsdElement {
    let mut element = XsdElement {
        name: node.attribute("name").unwrap_or_default().to_string(),
        namespace: target_ns.clone(),
        ref_name: node.attribute("ref").map(|r| local_part(r).to_string()),
        min_occurs: parse_occurs(node.attribute("minOccurs"), 1),
        max_occurs: parse_occurs(node.attribute("maxOccurs"), 1),
        type_ref: TypeRef::None,
        identity_constraints: Vec::new(),
    };

    if let Some(type_attr) = node.attribute("type") {
        element.type_ref = resolve_type_attr(node, type_attr);
    } else {
        for child in node.children().filter(|n| n.is_element()) {
            match xsd_local(child) {
                Some("simpleType") => {
                    let mut seen = Vec::new();
                    if let Some(st) = resolve_simple_node(child, raw_simple, &mut seen) {
                        element.type_ref = TypeRef::InlineSimple(st);
                    }
                }
                Some("complexType") => {
                    let ct = parse_complex_type(child, raw_simple, target_ns);
                    element.type_ref = TypeRef::InlineComplex(Box::new(ct));
                }
                _ => {}
            }
        }
    }

    for child in node.children().filter(|n| n.is_element()) {
        let kind = match xsd_local(child) {
            Some("key") => Some(IdentityKind::Key),
            Some("unique") => Some(IdentityKind::Unique),
            _ => None,
        };
        if let Some(kind) = kind {
            let fields = child
                .children()
                .filter(|n| n.is_element() && xsd_local(*n) == Some("field"))
                .filter_map(|f| f.attribute("xpath").map(str::to_string))
                .collect();
            element.identity_constraints.push(IdentityConstraint {
                kind,
                name: child.attribute("name").unwrap_or_default().to_string(),
                fields,
            });
        }
    }

    element
}

fn parse_complex_type(
    node: Node,
    raw_simple: &HashMap<String, Node>,
    target_ns: &Option<String>,
) -> XsdComplexType {
    let mut ct = XsdComplexType::default();

    for child in node.children().filter(|n| n.is_element()) {
        match xsd_local(child) {
            Some("sequence") | Some("all") | Some("choice") => {
                ct.content = ElementContent::Particle(parse_particle(child, raw_simple, target_ns));
            }
            Some("attribute") => {
                if let Some(attr) = parse_attribute(child, raw_simple) {
                    ct.attributes.push(attr);
                }
            }
            Some("simpleContent") => {
                parse_simple_content(child, raw_simple, &mut ct);
            }
            Some("complexContent") => {
                parse_complex_content(child, raw_simple, target_ns, &mut ct);
            }
            Some("annotation") => {}
            Some(other) => warn!(construct = other, "unsupported complex type construct"),
            None => {}
        }
    }

    ct
}

fn parse_particle(
    node: Node,
    raw_simple: &HashMap<String, Node>,
    target_ns: &Option<String>,
) -> Particle {
    let mut items = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        match xsd_local(child) {
            Some("element") => {
                items.push(ParticleItem::Element(parse_element(
                    child, raw_simple, target_ns,
                )));
            }
            Some("sequence") | Some("all") | Some("choice") => {
                items.push(ParticleItem::Group(parse_particle(
                    child, raw_simple, target_ns,
                )));
            }
            Some("annotation") => {}
            Some(other) => warn!(construct = other, "unsupported particle construct"),
            None => {}
        }
    }
    match xsd_local(node) {
        Some("all") => Particle::All(items),
        Some("choice") => Particle::Choice(items),
        _ => Particle::Sequence(items),
    }
}

fn parse_attribute(node: Node, raw_simple: &HashMap<String, Node>) -> Option<XsdAttribute> {
    let name = node.attribute("name")?.to_string();
    let required = node.attribute("use") == Some("required");
    let ty = attribute_simple_type(node, raw_simple);
    Some(XsdAttribute { name, required, ty })
}

/// Resolve an attribute's simple type from its `type=` attribute or inline
/// `<xs:simpleType>`; untyped attributes default to `xs:string`.
fn attribute_simple_type(node: Node, raw_simple: &HashMap<String, Node>) -> XsdSimpleType {
    if let Some(type_attr) = node.attribute("type") {
        match resolve_type_attr(node, type_attr) {
            TypeRef::Builtin(p) => return XsdSimpleType::builtin(&p),
            TypeRef::Named(n) => {
                let mut seen = Vec::new();
                if let Some(st) = resolve_simple_by_name(&n, raw_simple, &mut seen) {
                    return st;
                }
            }
            _ => {}
        }
    }
    for child in node.children().filter(|n| n.is_element()) {
        if xsd_local(child) == Some("simpleType") {
            let mut seen = Vec::new();
            if let Some(st) = resolve_simple_node(child, raw_simple, &mut seen) {
                return st;
            }
        }
    }
    XsdSimpleType::builtin("string")
}

fn parse_simple_content(
    node: Node,
    raw_simple: &HashMap<String, Node>,
    ct: &mut XsdComplexType,
) {
    for ext in node.children().filter(|n| n.is_element()) {
        if !matches!(xsd_local(ext), Some("extension") | Some("restriction")) {
            continue;
        }
        let text_type = match ext.attribute("base") {
            Some(base) => match resolve_type_attr(ext, base) {
                TypeRef::Builtin(p) => XsdSimpleType::builtin(&p),
                TypeRef::Named(n) => {
                    let mut seen = Vec::new();
                    resolve_simple_by_name(&n, raw_simple, &mut seen)
                        .unwrap_or_else(|| XsdSimpleType::builtin("string"))
                }
                _ => XsdSimpleType::builtin("string"),
            },
            None => XsdSimpleType::builtin("string"),
        };
        ct.content = ElementContent::Simple(text_type);
        for child in ext.children().filter(|n| n.is_element()) {
            if xsd_local(child) == Some("attribute") {
                if let Some(attr) = parse_attribute(child, raw_simple) {
                    ct.attributes.push(attr);
                }
            }
        }
    }
}

fn parse_complex_content(
    node: Node,
    raw_simple: &HashMap<String, Node>,
    target_ns: &Option<String>,
    ct: &mut XsdComplexType,
) {
    for ext in node.children().filter(|n| n.is_element()) {
        if !matches!(xsd_local(ext), Some("extension") | Some("restriction")) {
            continue;
        }
        ct.base = ext.attribute("base").map(|b| local_part(b).to_string());
        for child in ext.children().filter(|n| n.is_element()) {
            match xsd_local(child) {
                Some("sequence") | Some("all") | Some("choice") => {
                    ct.content =
                        ElementContent::Particle(parse_particle(child, raw_simple, target_ns));
                }
                Some("attribute") => {
                    if let Some(attr) = parse_attribute(child, raw_simple) {
                        ct.attributes.push(attr);
                    }
                }
                _ => {}
            }
        }
    }
}

fn local_part(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// Resolve a named simple type, following the restriction chain
fn resolve_simple_by_name(
    name: &str,
    raw_simple: &HashMap<String, Node>,
    seen: &mut Vec<String>,
) -> Option<XsdSimpleType> {
    if seen.iter().any(|s| s == name) {
        warn!(name, "cyclic simple type derivation");
        return None;
    }
    seen.push(name.to_string());
    let node = raw_simple.get(name)?;
    resolve_simple_node(*node, raw_simple, seen)
}

/// Resolve a `<xs:simpleType>` node to its primitive plus merged facets
fn resolve_simple_node(
    node: Node,
    raw_simple: &HashMap<String, Node>,
    seen: &mut Vec<String>,
) -> Option<XsdSimpleType> {
    let restriction = node
        .children()
        .find(|n| n.is_element() && xsd_local(*n) == Some("restriction"))?;

    let mut facets = parse_facets(restriction);

    let base = restriction.attribute("base")?;
    match resolve_type_attr(restriction, base) {
        TypeRef::Builtin(primitive) => Some(XsdSimpleType { primitive, facets }),
        TypeRef::Named(base_name) => {
            let base_type = resolve_simple_by_name(&base_name, raw_simple, seen)?;
            facets.merge_base(&base_type.facets);
            Some(XsdSimpleType {
                primitive: base_type.primitive,
                facets,
            })
        }
        _ => None,
    }
}

fn parse_facets(restriction: Node) -> Facets {
    let mut facets = Facets::default();
    for facet in restriction.children().filter(|n| n.is_element()) {
        let value = facet.attribute("value");
        let as_u32 = || value.and_then(|v| v.parse::<u32>().ok());
        let as_text = || value.map(str::to_string);
        match xsd_local(facet) {
            Some("length") => facets.length = as_u32(),
            Some("minLength") => facets.min_length = as_u32(),
            Some("maxLength") => facets.max_length = as_u32(),
            Some("totalDigits") => facets.total_digits = as_u32(),
            Some("fractionDigits") => facets.fraction_digits = as_u32(),
            Some("minInclusive") => facets.min_inclusive = as_text(),
            Some("maxInclusive") => facets.max_inclusive = as_text(),
            Some("minExclusive") => facets.min_exclusive = as_text(),
            Some("maxExclusive") => facets.max_exclusive = as_text(),
            _ => {}
        }
    }
    facets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xsd: &str) -> XsdSchema {
        let doc = Document::parse(xsd).expect("parse xml");
        parse_schema_document(&doc).expect("parse schema")
    }

    #[test]
    fn test_global_elements_and_namespace() {
        let schema = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          targetNamespace="urn:demo:orders">
                 <xs:element name="Order" type="xs:string"/>
               </xs:schema>"#,
        );
        assert_eq!(schema.target_namespace.as_deref(), Some("urn:demo:orders"));
        assert_eq!(schema.elements.len(), 1);
        assert_eq!(schema.elements[0].name, "Order");
        assert!(matches!(
            schema.elements[0].type_ref,
            TypeRef::Builtin(ref p) if p == "string"
        ));
    }

    #[test]
    fn test_named_simple_type_chain_merges_facets() {
        let schema = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:simpleType name="Code">
                   <xs:restriction base="xs:string">
                     <xs:maxLength value="20"/>
                   </xs:restriction>
                 </xs:simpleType>
                 <xs:simpleType name="ShortCode">
                   <xs:restriction base="Code">
                     <xs:minLength value="2"/>
                   </xs:restriction>
                 </xs:simpleType>
               </xs:schema>"#,
        );
        let short = schema.simple_type("ShortCode").expect("ShortCode");
        assert_eq!(short.primitive, "string");
        assert_eq!(short.facets.max_length, Some(20));
        assert_eq!(short.facets.min_length, Some(2));
    }

    #[test]
    fn test_inline_complex_type_with_choice() {
        let schema = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="Root">
                   <xs:complexType>
                     <xs:choice>
                       <xs:element name="A" type="xs:string"/>
                       <xs:element name="B" type="xs:int"/>
                     </xs:choice>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        );
        let root = &schema.elements[0];
        let TypeRef::InlineComplex(ct) = &root.type_ref else {
            panic!("expected inline complex type");
        };
        let ElementContent::Particle(particle) = &ct.content else {
            panic!("expected particle content");
        };
        assert!(particle.is_choice());
        assert_eq!(particle.items().len(), 2);
    }

    #[test]
    fn test_unbounded_and_identity_constraints() {
        let schema = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="Items">
                   <xs:complexType>
                     <xs:sequence>
                       <xs:element name="Item" type="xs:string" maxOccurs="unbounded" minOccurs="0"/>
                     </xs:sequence>
                   </xs:complexType>
                   <xs:key name="ItemKey">
                     <xs:selector xpath="Item"/>
                     <xs:field xpath="@id"/>
                   </xs:key>
                 </xs:element>
               </xs:schema>"#,
        );
        let root = &schema.elements[0];
        assert_eq!(root.identity_constraints.len(), 1);
        assert_eq!(root.identity_constraints[0].fields, vec!["@id".to_string()]);
        let TypeRef::InlineComplex(ct) = &root.type_ref else {
            panic!("expected inline complex type");
        };
        let ElementContent::Particle(p) = &ct.content else {
            panic!("expected particle");
        };
        let ParticleItem::Element(item) = &p.items()[0] else {
            panic!("expected element item");
        };
        assert_eq!(item.max_occurs, u32::MAX);
        assert_eq!(item.min_occurs, 0);
    }

    #[test]
    fn test_simple_content_extension() {
        let schema = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:complexType name="Amount">
                   <xs:simpleContent>
                     <xs:extension base="xs:decimal">
                       <xs:attribute name="currency" type="xs:string" use="required"/>
                     </xs:extension>
                   </xs:simpleContent>
                 </xs:complexType>
               </xs:schema>"#,
        );
        let ct = schema.complex_type("Amount").expect("Amount");
        assert_eq!(ct.attributes.len(), 1);
        assert!(ct.attributes[0].required);
        let ElementContent::Simple(text) = &ct.content else {
            panic!("expected simple content");
        };
        assert_eq!(text.primitive, "decimal");
    }
}
