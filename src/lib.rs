//! xsd-ingest: an XSD-driven XML-to-relational ingestion engine
//!
//! Given an XML Schema, this library derives a normalized relational model
//! (tables, keys, constraints), emits SQL Server DDL, and imports XML
//! instance documents into that schema with transactional, idempotent
//! semantics. A daemon mode watches an ingest directory and mirrors a
//! remote source into it.

pub mod config;
pub mod db;
pub mod ddl;
pub mod error;
pub mod import;
pub mod ingest;
pub mod model;
pub mod observe;
pub mod util;
pub mod xsd;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

pub use error::XsdIngestError;

/// Options for the one-shot analysis pipeline
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Path to the .xsd file
    pub xsd_path: PathBuf,
    /// Output directory for generated artifacts
    pub out_dir: PathBuf,
    /// Target SQL schema for every generated table
    pub target_schema: String,
}

/// Result of the analysis pipeline: the parsed schema and the derived model
pub struct AnalyzeOutput {
    pub schema: xsd::XsdSchema,
    pub model: model::TableModel,
}

/// Parse the XSD, derive the table model, and write the DDL artifacts
pub fn analyze_xsd(options: &AnalyzeOptions) -> Result<AnalyzeOutput> {
    info!(xsd = %options.xsd_path.display(), "analyzing schema");

    // Step 1: Parse the schema document
    let schema = xsd::parse_schema_file(&options.xsd_path)?;
    info!(
        elements = schema.elements.len(),
        types = schema.complex_types.len() + schema.simple_types.len(),
        "parsed schema"
    );

    // Step 2: Derive the relational model
    let model = model::build_model(std::slice::from_ref(&schema), &options.target_schema)?;
    info!(tables = model.tables().len(), "derived table model");

    // Step 3: Emit DDL and companion artifacts
    std::fs::create_dir_all(&options.out_dir)?;
    ddl::write_artifacts(&model, &schema, &options.out_dir)?;
    info!(out = %options.out_dir.display(), "wrote artifacts");

    Ok(AnalyzeOutput { schema, model })
}
