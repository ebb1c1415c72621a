//! DDL and companion artifact generation from the table model.

mod admin;
mod emitter;
mod sample;
mod summary;

pub use admin::{render_clear_script, render_drop_script};
pub use emitter::render_schema_script;
pub use sample::render_sample_document;
pub use summary::render_schema_summary;

use std::path::Path;

use crate::error::XsdIngestError;
use crate::model::TableModel;
use crate::xsd::XsdSchema;

/// Write every generated artifact into `out_dir`:
/// `schema.sql`, `schema.drop.sql`, `schema.clear.sql`,
/// `schema_summary.txt`, and `schema.samples.xml`.
pub fn write_artifacts(
    model: &TableModel,
    schema: &XsdSchema,
    out_dir: &Path,
) -> Result<(), XsdIngestError> {
    let write = |name: &str, content: String| -> Result<(), XsdIngestError> {
        let path = out_dir.join(name);
        std::fs::write(&path, content).map_err(|source| XsdIngestError::OutputWriteError {
            path,
            source,
        })
    };

    write("schema.sql", render_schema_script(model))?;
    write("schema.drop.sql", render_drop_script(model))?;
    write("schema.clear.sql", render_clear_script(model))?;
    write("schema_summary.txt", render_schema_summary(model))?;
    match render_sample_document(schema) {
        Ok(sample) => write("schema.samples.xml", sample)?,
        // Sample generation is best-effort, like the analyzer it descends from.
        Err(err) => tracing::warn!(error = %err, "skipped example XML generation"),
    }
    Ok(())
}
