//! Common test utilities for xsd-ingest tests

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use xsd_ingest::db::memory::MemoryConnector;
use xsd_ingest::db::SqlConnector;
use xsd_ingest::import::{ImportOptions, ImportOutcome, Importer};
use xsd_ingest::model::{build_model, TableModel};
use xsd_ingest::observe::Observer;
use xsd_ingest::xsd::{parse_schema_document, XsdSchema};

/// Parse an XSD document from a string
pub fn schema_from(xsd: &str) -> XsdSchema {
    let doc = roxmltree::Document::parse(xsd).expect("well-formed xsd");
    parse_schema_document(&doc).expect("valid schema")
}

/// Parse an XSD and derive its table model under the `xsd` schema
pub fn model_from(xsd: &str) -> TableModel {
    let schema = schema_from(xsd);
    build_model(&[schema], "xsd").expect("model build")
}

/// Import harness around the in-memory adapter
pub struct ImportHarness {
    pub connector: MemoryConnector,
    pub importer: Importer,
    pub out_dir: TempDir,
}

impl ImportHarness {
    pub fn new(model: TableModel, idempotency: bool) -> Self {
        Self::with_connector(model, idempotency, MemoryConnector::new())
    }

    pub fn with_connector(
        model: TableModel,
        idempotency: bool,
        connector: MemoryConnector,
    ) -> Self {
        let out_dir = TempDir::new().expect("temp out dir");
        let observer = Arc::new(Observer::configure(out_dir.path(), true));
        let importer = Importer::new(
            Arc::new(model),
            ImportOptions { idempotency },
            observer,
        );
        Self {
            connector,
            importer,
            out_dir,
        }
    }

    /// Write the XML to a temp file and import it in one transaction
    pub async fn import_xml(
        &self,
        xml: &str,
    ) -> Result<ImportOutcome, xsd_ingest::XsdIngestError> {
        let path = self.write_xml(xml);
        let mut session = self.connector.connect().await?;
        self.importer.import_file(session.as_mut(), &path).await
    }

    pub fn write_xml(&self, xml: &str) -> PathBuf {
        let path = self
            .out_dir
            .path()
            .join(format!("doc_{}.xml", std::process::id()));
        std::fs::write(&path, xml).expect("write xml");
        path
    }
}

/// The S1/S2 fixture: Root with repeated Item carrying an xs:ID attribute
pub const ORDERS_XSD: &str = r#"
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

/// The S4 fixture: a choice of two empty complex elements
pub const CHOICE_XSD: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Root">
    <xs:complexType>
      <xs:choice>
        <xs:element name="A"><xs:complexType/></xs:element>
        <xs:element name="B"><xs:complexType/></xs:element>
      </xs:choice>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
