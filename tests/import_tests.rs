//! Instance importer tests against the in-memory adapter

mod common;

use common::{model_from, ImportHarness, CHOICE_XSD, ORDERS_XSD};
use xsd_ingest::db::memory::MemoryConnector;
use xsd_ingest::db::SqlValue;

const ORDERS_XML: &str = r#"<Root>
  <Item id="i1"><Code>A</Code><Amount>1.23</Amount></Item>
  <Item id="i2"><Code>B</Code><Amount>2.00</Amount></Item>
</Root>"#;

#[tokio::test]
async fn test_import_tiny_document() {
    let harness = ImportHarness::new(model_from(ORDERS_XSD), true);
    let outcome = harness.import_xml(ORDERS_XML).await.expect("import");

    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.per_table.get("Root"), Some(&1));
    assert_eq!(outcome.per_table.get("RootItem"), Some(&2));

    assert_eq!(harness.connector.row_count("xsd", "Root"), 1);
    let items = harness.connector.rows("xsd", "RootItem");
    assert_eq!(items.len(), 2);
    let roots = harness.connector.rows("xsd", "Root");
    let root_id = roots[0].get("RootId").expect("Root PK");
    for item in &items {
        assert_eq!(item.get("RootId"), Some(root_id), "items carry the parent FK");
    }
    let codes: Vec<_> = items.iter().filter_map(|r| r.get("Code")).collect();
    assert!(codes.contains(&&SqlValue::Text("A".to_string())));
    assert!(codes.contains(&&SqlValue::Text("B".to_string())));
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let harness = ImportHarness::new(model_from(ORDERS_XSD), true);
    let first = harness.import_xml(ORDERS_XML).await.expect("first import");
    assert_eq!(first.total, 3);

    let second = harness.import_xml(ORDERS_XML).await.expect("second import");
    assert_eq!(second.total, 0, "second pass must insert nothing");
    assert_eq!(harness.connector.row_count("xsd", "RootItem"), 2);
    assert_eq!(harness.connector.row_count("xsd", "Root"), 1);
}

#[tokio::test]
async fn test_no_idempotency_duplicates_rows() {
    let harness = ImportHarness::new(model_from(ORDERS_XSD), false);
    harness.import_xml(ORDERS_XML).await.expect("first import");
    harness.import_xml(ORDERS_XML).await.expect("second import");
    assert_eq!(harness.connector.row_count("xsd", "RootItem"), 4);
    assert_eq!(harness.connector.row_count("xsd", "Root"), 2);
}

#[tokio::test]
async fn test_failed_import_rolls_back_everything() {
    // Two inserts succeed, the third blows up mid-file.
    let harness = ImportHarness::with_connector(
        model_from(ORDERS_XSD),
        true,
        MemoryConnector::failing_after(2),
    );
    let result = harness.import_xml(ORDERS_XML).await;
    assert!(result.is_err());
    assert_eq!(harness.connector.row_count("xsd", "Root"), 0);
    assert_eq!(harness.connector.row_count("xsd", "RootItem"), 0);
}

#[tokio::test]
async fn test_choice_discriminators_populated() {
    let harness = ImportHarness::new(model_from(CHOICE_XSD), true);
    let outcome = harness
        .import_xml("<Root><A/></Root>")
        .await
        .expect("import");
    assert_eq!(outcome.total, 2);

    let roots = harness.connector.rows("xsd", "Root");
    assert_eq!(roots.len(), 1);
    assert_eq!(
        roots[0].get("ChoiceOption"),
        Some(&SqlValue::Text("A".to_string()))
    );

    let branch = harness.connector.rows("xsd", "RootA");
    assert_eq!(branch.len(), 1);
    assert_eq!(
        branch[0].get("ChoiceParentOption"),
        Some(&SqlValue::Text("A".to_string()))
    );
    assert_eq!(branch[0].get("RootId"), roots[0].get("RootId"));
    assert_eq!(harness.connector.row_count("xsd", "RootB"), 0);
}

#[tokio::test]
async fn test_unknown_elements_are_skipped_not_fatal() {
    let harness = ImportHarness::new(model_from(ORDERS_XSD), true);
    let outcome = harness
        .import_xml(
            r#"<Root>
                 <Unmapped><Item id="i9"><Code>C</Code></Item></Unmapped>
               </Root>"#,
        )
        .await
        .expect("import");
    // Root inserts; the unmapped wrapper is skipped but its Item still
    // lands under Root's context.
    assert!(outcome.total >= 2);
    assert_eq!(harness.connector.row_count("xsd", "RootItem"), 1);
}

#[tokio::test]
async fn test_required_columns_backfilled_with_defaults() {
    let model = model_from(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
             <xs:element name="Rec">
               <xs:complexType>
                 <xs:sequence>
                   <xs:element name="Name" type="xs:string"/>
                   <xs:element name="Count" type="xs:int"/>
                 </xs:sequence>
               </xs:complexType>
             </xs:element>
           </xs:schema>"#,
    );
    let harness = ImportHarness::new(model, true);
    harness
        .import_xml("<Rec><Name>only</Name></Rec>")
        .await
        .expect("import");
    let rows = harness.connector.rows("xsd", "Rec");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Name"), Some(&SqlValue::Text("only".to_string())));
    assert_eq!(rows[0].get("Count"), Some(&SqlValue::Int(0)));
}
