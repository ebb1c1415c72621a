//! Minimal example instance document generated from the schema.
//!
//! Descends from the first global element, picking one occurrence per
//! child, the first branch of every choice, and a placeholder value per
//! primitive. Best-effort: schemas without global elements yield an error
//! the caller downgrades to a warning.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::XsdIngestError;
use crate::xsd::{
    ElementContent, Particle, ParticleItem, TypeRef, XsdComplexType, XsdElement, XsdSchema,
    XsdSimpleType,
};

const MAX_DEPTH: usize = 8;

/// Render `schema.samples.xml` from the first global element
pub fn render_sample_document(schema: &XsdSchema) -> Result<String, XsdIngestError> {
    let root = schema
        .elements
        .first()
        .ok_or_else(|| XsdIngestError::XmlGenerationError {
            message: "no global elements found in schema".to_string(),
        })?;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;
    write_element(&mut writer, schema, root, &mut Vec::new(), 0)?;

    String::from_utf8(writer.into_inner()).map_err(|e| XsdIngestError::XmlGenerationError {
        message: e.to_string(),
    })
}

fn xml_err<E: std::fmt::Display>(e: E) -> XsdIngestError {
    XsdIngestError::XmlGenerationError {
        message: e.to_string(),
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    schema: &XsdSchema,
    element: &XsdElement,
    path: &mut Vec<String>,
    depth: usize,
) -> Result<(), XsdIngestError> {
    let resolved;
    let element = if let Some(ref_name) = &element.ref_name {
        match schema.global_element(ref_name) {
            Some(global) => {
                resolved = global.clone();
                &resolved
            }
            None => return Ok(()),
        }
    } else {
        element
    };
    if element.name.is_empty() || depth > MAX_DEPTH {
        return Ok(());
    }

    match &element.type_ref {
        TypeRef::Builtin(primitive) => {
            write_scalar(writer, &element.name, &XsdSimpleType::builtin(primitive))
        }
        TypeRef::InlineSimple(st) => write_scalar(writer, &element.name, st),
        TypeRef::Named(name) => {
            if let Some(st) = schema.simple_type(name) {
                write_scalar(writer, &element.name, st)
            } else if let Some(ct) = schema.complex_type(name) {
                if path.iter().any(|p| p == name) {
                    return Ok(());
                }
                path.push(name.clone());
                let result = write_complex(writer, schema, &element.name, ct, path, depth);
                path.pop();
                result
            } else {
                write_empty(writer, &element.name)
            }
        }
        TypeRef::InlineComplex(ct) => write_complex(writer, schema, &element.name, ct, path, depth),
        TypeRef::None => write_empty(writer, &element.name),
    }
}

fn write_complex<W: std::io::Write>(
    writer: &mut Writer<W>,
    schema: &XsdSchema,
    name: &str,
    ct: &XsdComplexType,
    path: &mut Vec<String>,
    depth: usize,
) -> Result<(), XsdIngestError> {
    let mut start = BytesStart::new(name);
    for attribute in &ct.attributes {
        start.push_attribute((attribute.name.as_str(), sample_value(&attribute.ty)));
    }

    match &ct.content {
        ElementContent::Empty => {
            writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        }
        ElementContent::Simple(text_type) => {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(sample_value(text_type))))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_err)?;
        }
        ElementContent::Particle(particle) => {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            write_particle(writer, schema, particle, path, depth)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_err)?;
        }
    }
    Ok(())
}

fn write_particle<W: std::io::Write>(
    writer: &mut Writer<W>,
    schema: &XsdSchema,
    particle: &Particle,
    path: &mut Vec<String>,
    depth: usize,
) -> Result<(), XsdIngestError> {
    let items = particle.items();
    // A choice contributes only its first branch.
    let selected: &[ParticleItem] = if particle.is_choice() {
        &items[..items.len().min(1)]
    } else {
        items
    };
    for item in selected {
        match item {
            ParticleItem::Element(child) => write_element(writer, schema, child, path, depth + 1)?,
            ParticleItem::Group(nested) => write_particle(writer, schema, nested, path, depth)?,
        }
    }
    Ok(())
}

fn write_scalar<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    st: &XsdSimpleType,
) -> Result<(), XsdIngestError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(sample_value(st))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)
}

fn write_empty<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<(), XsdIngestError> {
    writer
        .write_event(Event::Empty(BytesStart::new(name)))
        .map_err(xml_err)
}

fn sample_value(st: &XsdSimpleType) -> &'static str {
    match st.primitive.as_str() {
        "decimal" => "0.00",
        "integer" | "long" | "int" | "short" | "byte" | "unsignedLong" | "unsignedInt"
        | "unsignedShort" | "unsignedByte" | "nonNegativeInteger" | "positiveInteger" => "0",
        "boolean" => "false",
        "float" | "double" => "0.0",
        "date" => "2000-01-01",
        "dateTime" => "2000-01-01T00:00:00",
        "time" => "00:00:00",
        "duration" => "P1D",
        "anyURI" => "https://example.invalid/",
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::parse_schema_document;
    use roxmltree::Document;

    #[test]
    fn test_sample_roots_at_first_global_element() {
        let doc = Document::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="Root">
                   <xs:complexType>
                     <xs:sequence>
                       <xs:element name="Code" type="xs:string"/>
                       <xs:element name="Amount" type="xs:decimal"/>
                     </xs:sequence>
                     <xs:attribute name="id" type="xs:ID" use="required"/>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        )
        .unwrap();
        let schema = parse_schema_document(&doc).unwrap();
        let xml = render_sample_document(&schema).unwrap();
        assert!(xml.contains("<Root id=\"text\">"));
        assert!(xml.contains("<Code>text</Code>"));
        assert!(xml.contains("<Amount>0.00</Amount>"));
        // The generated sample must itself be well-formed.
        Document::parse(&xml).expect("well-formed sample");
    }

    #[test]
    fn test_sample_without_globals_is_an_error() {
        let doc =
            Document::parse(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#).unwrap();
        let schema = parse_schema_document(&doc).unwrap();
        assert!(render_sample_document(&schema).is_err());
    }
}
