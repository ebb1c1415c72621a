//! Build the relational model from parsed XSD schemas.
//!
//! One table per global element (namespace-disambiguated on local-name
//! collisions), one child table per repeated or complex child element,
//! simple single-occurrence children as columns. The walk keeps a path of
//! named complex types so self-referential schemas terminate.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::model::identifiers::{namespace_token, sanitize, table_ident};
use crate::model::tables::{Column, ForeignKey, SqlType, Table, TableModel};
use crate::model::type_mapper::{facet_checks, map_simple_type};
use crate::xsd::{
    ElementContent, IdentityConstraint, Particle, ParticleItem, TypeRef, XsdComplexType,
    XsdElement, XsdSchema, XsdSimpleType,
};

/// Discriminator column on a table whose type contains a `<choice>`
pub const CHOICE_OPTION: &str = "ChoiceOption";
/// Discriminator column on child tables born inside a `<choice>`
pub const CHOICE_PARENT_OPTION: &str = "ChoiceParentOption";

/// Build a table model from one or more parsed schemas
pub fn build_model(schemas: &[XsdSchema], target_schema: &str) -> Result<TableModel> {
    let mut builder = ModelBuilder {
        schemas,
        model: TableModel::new(target_schema),
        colliding: colliding_local_names(schemas),
    };

    for schema in schemas {
        for element in &schema.elements {
            builder.global_element(schema, element);
        }
    }

    Ok(builder.model)
}

/// Local names declared as global elements in more than one namespace
fn colliding_local_names(schemas: &[XsdSchema]) -> HashSet<String> {
    let mut namespaces: HashMap<String, HashSet<Option<&str>>> = HashMap::new();
    for schema in schemas {
        for element in &schema.elements {
            namespaces
                .entry(element.name.to_ascii_lowercase())
                .or_default()
                .insert(element.namespace.as_deref());
        }
    }
    namespaces
        .into_iter()
        .filter(|(_, ns)| ns.len() > 1)
        .map(|(name, _)| name)
        .collect()
}

struct ModelBuilder<'a> {
    schemas: &'a [XsdSchema],
    model: TableModel,
    colliding: HashSet<String>,
}

impl<'a> ModelBuilder<'a> {
    fn global_element(&mut self, schema: &'a XsdSchema, element: &'a XsdElement) {
        let base = table_ident(&element.name);
        let table_name = if self.colliding.contains(&element.name.to_ascii_lowercase()) {
            let token = namespace_token(element.namespace.as_deref().unwrap_or_default());
            format!("{}{}", token, base)
        } else {
            base
        };
        let table_name = self.model.ensure_table(&table_name);
        self.model
            .bind_element(element.namespace.clone(), &element.name, &table_name);

        let mut path = Vec::new();
        self.descend(schema, element, &table_name, &mut path);
    }

    /// Descend into the type of the element that owns `table`
    fn descend(
        &mut self,
        schema: &'a XsdSchema,
        element: &XsdElement,
        table: &str,
        path: &mut Vec<String>,
    ) {
        if let Some(simple) = simple_type_of(schema, element) {
            // The element itself becomes a column on its owning table.
            let column = table_ident(&element.name);
            self.add_scalar_column(table, &column, &simple, element.min_occurs == 0);
        } else if let Some((ct, named)) = complex_type_of(schema, element) {
            if let Some(name) = &named {
                if path.iter().any(|p| p == name) {
                    return;
                }
                path.push(name.clone());
            }
            self.walk_complex(schema, &ct, table, path);
            if named.is_some() {
                path.pop();
            }
        }

        self.apply_identity_constraints(table, &element.identity_constraints);
    }

    fn walk_complex(
        &mut self,
        schema: &'a XsdSchema,
        ct: &XsdComplexType,
        table: &str,
        path: &mut Vec<String>,
    ) {
        // complexContent extension: the base type's shape comes first.
        if let Some(base_name) = &ct.base {
            if !path.iter().any(|p| p == base_name) {
                if let Some(base) = schema.complex_type(base_name) {
                    path.push(base_name.clone());
                    let base = base.clone();
                    self.walk_complex(schema, &base, table, path);
                    path.pop();
                }
            }
        }

        for attribute in &ct.attributes {
            let column = table_ident(&attribute.name);
            self.add_scalar_column(table, &column, &attribute.ty, !attribute.required);
        }

        match &ct.content {
            ElementContent::Empty => {}
            ElementContent::Simple(text_type) => {
                // simpleContent: the text value lands in a `Value` column.
                self.add_scalar_column(table, "Value", text_type, true);
            }
            ElementContent::Particle(particle) => {
                let particle = particle.clone();
                self.walk_particle(schema, &particle, table, false, path);
            }
        }
    }

    fn walk_particle(
        &mut self,
        schema: &'a XsdSchema,
        particle: &Particle,
        table: &str,
        in_choice: bool,
        path: &mut Vec<String>,
    ) {
        let in_choice = in_choice || particle.is_choice();
        if particle.is_choice() {
            if let Some(t) = self.model.table_mut(table) {
                t.add_or_merge_column(Column::plain(
                    CHOICE_OPTION,
                    SqlType::NVarChar(Some(64)),
                    true,
                ));
            }
        }

        for item in particle.items() {
            match item {
                ParticleItem::Element(child) => {
                    self.child_element(schema, table, child, in_choice, path);
                }
                ParticleItem::Group(nested) => {
                    self.walk_particle(schema, nested, table, in_choice, path);
                }
            }
        }
    }

    fn child_element(
        &mut self,
        schema: &'a XsdSchema,
        parent_table: &str,
        child: &XsdElement,
        in_choice: bool,
        path: &mut Vec<String>,
    ) {
        // A `ref=` child stands in for the referenced global element, with
        // the occurrence bounds of the reference site.
        let resolved;
        let child = if let Some(ref_name) = &child.ref_name {
            match self.find_global(schema, ref_name) {
                Some(global) => {
                    resolved = XsdElement {
                        min_occurs: child.min_occurs,
                        max_occurs: child.max_occurs,
                        ..global.clone()
                    };
                    &resolved
                }
                None => {
                    tracing::warn!(reference = %ref_name, "unresolved element reference");
                    return;
                }
            }
        } else {
            child
        };
        if child.name.is_empty() {
            return;
        }

        if in_choice {
            if let Some(t) = self.model.table_mut(parent_table) {
                t.choice_members.push(child.name.clone());
            }
        }

        let simple = simple_type_of(schema, child);
        let needs_child_table = child.max_occurs > 1 || simple.is_none();

        if !needs_child_table {
            let column = table_ident(&child.name);
            let nullable = child.min_occurs == 0 || in_choice;
            self.add_scalar_column(parent_table, &column, &simple.unwrap(), nullable);
            return;
        }

        let child_table = table_ident(&format!("{}_{}", parent_table, sanitize(&child.name)));
        let child_table = self.model.ensure_table(&child_table);
        self.attach_to_parent(&child_table, parent_table);
        if in_choice {
            if let Some(t) = self.model.table_mut(&child_table) {
                t.add_or_merge_column(Column::plain(
                    CHOICE_PARENT_OPTION,
                    SqlType::NVarChar(Some(64)),
                    true,
                ));
            }
        }

        self.descend(schema, child, &child_table, path);
    }

    /// Give `child` the parent FK column and constraint (once)
    fn attach_to_parent(&mut self, child_table: &str, parent_table: &str) {
        let fk_column = format!("{}Id", parent_table);
        let fk_name = format!("FK_{}_{}", child_table, parent_table);
        let schema = self.model.schema.clone();
        let Some(t) = self.model.table_mut(child_table) else {
            return;
        };
        t.add_or_merge_column(Column::plain(&fk_column, SqlType::Int, false));
        if !t.foreign_keys.iter().any(|fk| fk.name == fk_name) {
            t.foreign_keys.push(ForeignKey {
                name: fk_name,
                column_name: fk_column.clone(),
                ref_schema: schema,
                ref_table: parent_table.to_string(),
                ref_column: fk_column,
            });
        }
    }

    fn add_scalar_column(
        &mut self,
        table: &str,
        column: &str,
        simple: &XsdSimpleType,
        nullable: bool,
    ) {
        let sql_type = map_simple_type(simple);
        let checks = facet_checks(column, simple, &sql_type);
        let Some(t) = self.model.table_mut(table) else {
            return;
        };
        t.add_or_merge_column(Column::plain(column, sql_type, nullable));
        for predicate in checks {
            t.add_check(column, predicate);
        }
        if simple.primitive == "ID" {
            t.add_unique(vec![canonical_column_name(t, column)]);
        }
    }

    /// Collect identity-constraint field columns that exist on `table` and
    /// register a UNIQUE constraint over them.
    fn apply_identity_constraints(&mut self, table: &str, constraints: &[IdentityConstraint]) {
        for constraint in constraints {
            let Some(t) = self.model.table_mut(table) else {
                return;
            };
            let columns: Vec<String> = constraint
                .fields
                .iter()
                .filter_map(|xpath| field_column_name(xpath))
                .filter_map(|name| t.column(&name).map(|c| c.name.clone()))
                .collect();
            if !columns.is_empty() {
                t.add_unique(columns);
            }
        }
    }

    fn find_global(&self, preferred: &'a XsdSchema, name: &str) -> Option<&'a XsdElement> {
        preferred.global_element(name).or_else(|| {
            self.schemas
                .iter()
                .find_map(|schema| schema.global_element(name))
        })
    }
}

/// The column a `xs:field` xpath refers to, when its last step is a simple
/// identifier (`@id`, `Code`, `ns:Code`, `Item/@id`).
fn field_column_name(xpath: &str) -> Option<String> {
    let last = xpath.rsplit('/').next()?.trim();
    let last = last.strip_prefix('@').unwrap_or(last);
    let last = last.rsplit(':').next()?.trim();
    if last.is_empty() || last.contains(['*', '(', ')', '[', ']']) {
        return None;
    }
    Some(table_ident(last))
}

fn canonical_column_name(table: &Table, column: &str) -> String {
    table
        .column(column)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| column.to_string())
}

/// Resolve an element's type to a simple type, when it is one
fn simple_type_of(schema: &XsdSchema, element: &XsdElement) -> Option<XsdSimpleType> {
    match &element.type_ref {
        TypeRef::Builtin(primitive) => Some(XsdSimpleType::builtin(primitive)),
        TypeRef::InlineSimple(st) => Some(st.clone()),
        TypeRef::Named(name) => schema.simple_type(name).cloned(),
        _ => None,
    }
}

/// Resolve an element's type to a complex type, when it is one. Returns the
/// type plus its registry name (for the recursion guard). Untyped elements
/// behave as empty complex types.
fn complex_type_of(
    schema: &XsdSchema,
    element: &XsdElement,
) -> Option<(XsdComplexType, Option<String>)> {
    match &element.type_ref {
        TypeRef::InlineComplex(ct) => Some((ct.as_ref().clone(), None)),
        TypeRef::Named(name) => match schema.complex_type(name) {
            Some(ct) => Some((ct.clone(), Some(name.clone()))),
            None => {
                if schema.simple_type(name).is_none() {
                    tracing::warn!(name = %name, "unresolved type reference, treating as empty");
                    Some((XsdComplexType::default(), Some(name.clone())))
                } else {
                    None
                }
            }
        },
        TypeRef::None => Some((XsdComplexType::default(), None)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::parse_schema_document;
    use roxmltree::Document;

    fn model_from(xsd: &str) -> TableModel {
        let doc = Document::parse(xsd).expect("xml");
        let schema = parse_schema_document(&doc).expect("schema");
        build_model(&[schema], "xsd").expect("model")
    }

    const ORDERS: &str = r#"
        <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:element name="Root">
            <xs:complexType>
              <xs:sequence>
                <xs:element name="Item" maxOccurs="unbounded">
                  <xs:complexType>
                    <xs:sequence>
                      <xs:element name="Code" type="xs:string"/>
                      <xs:element name="Amount" type="xs:decimal" minOccurs="0"/>
                    </xs:sequence>
                    <xs:attribute name="id" type="xs:ID" use="required"/>
                  </xs:complexType>
                </xs:element>
              </xs:sequence>
            </xs:complexType>
          </xs:element>
        </xs:schema>"#;

    #[test]
    fn test_child_table_with_fk_and_pk() {
        let model = model_from(ORDERS);
        let root = model.table("Root").expect("Root");
        assert_eq!(root.columns[0].name, "RootId");

        let item = model.table("RootItem").expect("RootItem");
        assert_eq!(item.columns[0].name, "RootItemId");
        assert_eq!(item.columns[1].name, "RootId");
        assert!(!item.columns[1].nullable);
        assert_eq!(item.foreign_keys.len(), 1);
        assert_eq!(item.foreign_keys[0].name, "FK_RootItem_Root");
        assert_eq!(item.foreign_keys[0].ref_table, "Root");
        assert_eq!(item.foreign_keys[0].ref_column, "RootId");
    }

    #[test]
    fn test_attributes_and_scalars_become_columns() {
        let model = model_from(ORDERS);
        let item = model.table("RootItem").expect("RootItem");
        let id = item.column("Id").expect("Id column");
        assert!(!id.nullable, "required attribute is NOT NULL");
        assert!(item.column("Code").is_some_and(|c| !c.nullable));
        assert!(item.column("Amount").is_some_and(|c| c.nullable));
    }

    #[test]
    fn test_xs_id_generates_unique() {
        let model = model_from(ORDERS);
        let item = model.table("RootItem").expect("RootItem");
        assert_eq!(item.uniques.len(), 1);
        assert_eq!(item.uniques[0].name, "UQ_RootItem_Id");
        assert_eq!(item.uniques[0].columns, vec!["Id".to_string()]);
    }

    #[test]
    fn test_choice_discriminators() {
        let model = model_from(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="Root">
                   <xs:complexType>
                     <xs:choice>
                       <xs:element name="A"><xs:complexType/></xs:element>
                       <xs:element name="B"><xs:complexType/></xs:element>
                     </xs:choice>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        );
        let root = model.table("Root").expect("Root");
        let option = root.column(CHOICE_OPTION).expect("ChoiceOption");
        assert!(option.nullable);
        assert_eq!(option.sql_type, SqlType::NVarChar(Some(64)));
        assert_eq!(root.choice_members, vec!["A".to_string(), "B".to_string()]);

        for name in ["RootA", "RootB"] {
            let t = model.table(name).expect(name);
            assert!(t.column(CHOICE_PARENT_OPTION).is_some_and(|c| c.nullable));
        }
    }

    #[test]
    fn test_simple_child_in_choice_is_nullable_column() {
        let model = model_from(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="Root">
                   <xs:complexType>
                     <xs:choice>
                       <xs:element name="X" type="xs:string"/>
                       <xs:element name="Y" type="xs:int"/>
                     </xs:choice>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        );
        let root = model.table("Root").expect("Root");
        assert!(root.column("X").is_some_and(|c| c.nullable));
        assert!(root.column("Y").is_some_and(|c| c.nullable));
    }

    #[test]
    fn test_namespace_disambiguation() {
        let parse = |xsd: &str| {
            let doc = Document::parse(xsd).expect("xml");
            parse_schema_document(&doc).expect("schema")
        };
        let a = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          targetNamespace="urn:billing">
                 <xs:element name="Invoice" type="xs:string"/>
               </xs:schema>"#,
        );
        let b = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          targetNamespace="urn:shipping">
                 <xs:element name="Invoice" type="xs:string"/>
               </xs:schema>"#,
        );
        let model = build_model(&[a, b], "xsd").expect("model");
        assert!(model.has_table("BillingInvoice"));
        assert!(model.has_table("ShippingInvoice"));
        assert_eq!(
            model.binding(Some("urn:billing"), "Invoice").unwrap().table_name,
            "BillingInvoice"
        );
    }

    #[test]
    fn test_recursive_type_terminates() {
        let model = model_from(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:complexType name="Node">
                   <xs:sequence>
                     <xs:element name="Label" type="xs:string"/>
                     <xs:element name="Child" type="Node" minOccurs="0" maxOccurs="unbounded"/>
                   </xs:sequence>
                 </xs:complexType>
                 <xs:element name="Tree" type="Node"/>
               </xs:schema>"#,
        );
        let tree = model.table("Tree").expect("Tree");
        assert!(tree.column("Label").is_some());
        // One level of child table, then the guard stops the descent.
        assert!(model.has_table("TreeChild"));
        assert!(!model.has_table("TreeChildChild"));
    }

    #[test]
    fn test_identity_constraint_unique() {
        let model = model_from(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="Reg">
                   <xs:complexType>
                     <xs:sequence>
                       <xs:element name="Code" type="xs:string"/>
                       <xs:element name="Year" type="xs:int"/>
                     </xs:sequence>
                   </xs:complexType>
                   <xs:unique name="RegCodeYear">
                     <xs:selector xpath="."/>
                     <xs:field xpath="Code"/>
                     <xs:field xpath="Year"/>
                   </xs:unique>
                 </xs:element>
               </xs:schema>"#,
        );
        let reg = model.table("Reg").expect("Reg");
        assert_eq!(reg.uniques.len(), 1);
        assert_eq!(reg.uniques[0].name, "UQ_Reg_Code_Year");
    }
}
