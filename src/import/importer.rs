//! Recursive, transactional XML-tree-to-rows mapper.
//!
//! One transaction per file. Elements resolve to tables in document order
//! (pre-order DFS); each resolved element binds its attribute and scalar
//! child values, backfills required columns, runs the idempotency probes,
//! inserts, and recurses with its new PK as the children's parent FK.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use roxmltree::{Document, Node};

use crate::db::{RowInsert, RowProbe, SqlSession, SqlValue, TableRef};
use crate::error::{IngestResult, XsdIngestError};
use crate::import::values::{coerce, default_for};
use crate::model::builder::{CHOICE_OPTION, CHOICE_PARENT_OPTION};
use crate::model::identifiers::table_ident;
use crate::model::tables::{Table, TableModel};
use crate::model::TableResolver;
use crate::observe::{format_params, AuditEvent, Observer};
use crate::util::eq_ci;
use crate::xsd::read_file_with_encoding_fallback;

const READ_RETRIES: u32 = 5;
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Probe for existing rows before inserting
    pub idempotency: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { idempotency: true }
    }
}

/// Row counts produced by one file import
#[derive(Debug, Default, Clone)]
pub struct ImportOutcome {
    pub total: u64,
    pub per_table: BTreeMap<String, u64>,
}

impl ImportOutcome {
    fn add(&mut self, table: &str) {
        self.total += 1;
        *self.per_table.entry(table.to_string()).or_default() += 1;
    }
}

/// Parent context carried through the element walk
#[derive(Debug, Clone)]
struct ParentCtx {
    table: String,
    id: Option<i32>,
}

pub struct Importer {
    model: Arc<TableModel>,
    options: ImportOptions,
    observer: Arc<Observer>,
}

impl Importer {
    pub fn new(model: Arc<TableModel>, options: ImportOptions, observer: Arc<Observer>) -> Self {
        Self {
            model,
            options,
            observer,
        }
    }

    /// Import one file inside a single transaction: commit on success,
    /// roll back and report on any error.
    pub async fn import_file(
        &self,
        session: &mut dyn SqlSession,
        path: &Path,
    ) -> IngestResult<ImportOutcome> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let content = self.read_with_retry(path).await?;
        let doc = Document::parse(&content).map_err(|source| {
            XsdIngestError::DocumentParseError {
                path: path.to_path_buf(),
                source,
            }
        })?;

        session.begin().await?;
        let mut outcome = ImportOutcome::default();
        let walk = self
            .walk_node(session, doc.root_element(), None, &mut outcome, &file)
            .await;
        if let Err(err) = walk {
            if let Err(rollback_err) = session.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            return Err(err);
        }
        session.commit().await?;

        self.audit(AuditEvent {
            file: file.clone(),
            event: "file-summary",
            reason: format!("total={}", outcome.total),
            ..Default::default()
        });
        Ok(outcome)
    }

    /// Transient read errors retry with a short backoff before giving up
    async fn read_with_retry(&self, path: &Path) -> IngestResult<String> {
        let mut attempt = 1;
        loop {
            match read_file_with_encoding_fallback(path) {
                Ok(content) => return Ok(content),
                Err(source) if attempt < READ_RETRIES => {
                    tracing::debug!(path = %path.display(), attempt, error = %source, "read retry");
                    attempt += 1;
                    tokio::time::sleep(READ_RETRY_BACKOFF).await;
                }
                Err(source) => {
                    return Err(XsdIngestError::DocumentReadError {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }

    fn walk_node<'a>(
        &'a self,
        session: &'a mut dyn SqlSession,
        node: Node<'a, 'a>,
        parent: Option<ParentCtx>,
        outcome: &'a mut ImportOutcome,
        file: &'a str,
    ) -> Pin<Box<dyn Future<Output = IngestResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let local = node.tag_name().name().to_string();
            let namespace = node.tag_name().namespace();
            let resolver = TableResolver::new(&self.model);
            let table = resolver.resolve(
                namespace,
                &local,
                parent.as_ref().map(|p| p.table.as_str()),
            );

            let Some(table) = table else {
                self.audit(AuditEvent {
                    file: file.to_string(),
                    event: "skip-no-table",
                    element: local,
                    parent_table: parent.as_ref().map(|p| p.table.clone()).unwrap_or_default(),
                    parent_id: parent.as_ref().and_then(|p| p.id),
                    ..Default::default()
                });
                for child in node.children().filter(|n| n.is_element()) {
                    self.walk_node(session, child, parent.clone(), outcome, file)
                        .await?;
                }
                return Ok(());
            };

            let mut bound = self.bind_values(table, node, &parent, &local);

            // A NOT NULL parent FK with no parent id to bind means the row
            // cannot satisfy referential integrity; skip it but keep walking.
            if let Some(fk) = table.columns.iter().find(|c| {
                !c.identity
                    && !c.nullable
                    && table.is_fk_column(&c.name)
                    && !has_binding(&bound, &c.name)
            }) {
                self.audit(AuditEvent {
                    file: file.to_string(),
                    event: "skip",
                    element: local.clone(),
                    table: table.name.clone(),
                    parent_table: parent.as_ref().map(|p| p.table.clone()).unwrap_or_default(),
                    fk_column: fk.name.clone(),
                    reason: "Missing required parent FK".to_string(),
                    ..Default::default()
                });
                let next = ParentCtx {
                    table: table.name.clone(),
                    id: None,
                };
                self.recurse_children(session, node, table, next, outcome, file)
                    .await?;
                return Ok(());
            }

            // Backfill remaining required columns with type defaults.
            for column in &table.columns {
                if column.identity || column.nullable || table.is_fk_column(&column.name) {
                    continue;
                }
                if !has_binding(&bound, &column.name) {
                    bound.push((column.name.clone(), default_for(&column.sql_type)));
                }
            }

            let table_ref = TableRef {
                schema: self.model.schema.clone(),
                table: table.name.clone(),
                pk_column: table.pk_column(),
            };

            let mut new_id: Option<i32> = None;
            if self.options.idempotency {
                new_id = self.probe_existing(session, table, &table_ref, &bound).await?;
                if let Some(id) = new_id {
                    self.audit(AuditEvent {
                        file: file.to_string(),
                        event: "skip",
                        element: local.clone(),
                        table: table.name.clone(),
                        new_id: Some(id),
                        parent_table: parent.as_ref().map(|p| p.table.clone()).unwrap_or_default(),
                        parent_id: parent.as_ref().and_then(|p| p.id),
                        reason: "Idempotent".to_string(),
                        ..Default::default()
                    });
                }
            }

            if new_id.is_none() {
                let id = if bound.is_empty() {
                    // Nothing to bind and everything nullable: anchor the
                    // children with an all-defaults row.
                    let id = session.insert_default_row(&table_ref).await?;
                    self.audit(AuditEvent {
                        file: file.to_string(),
                        event: "default-row-insert",
                        element: local.clone(),
                        table: table.name.clone(),
                        new_id: Some(id),
                        ..Default::default()
                    });
                    id
                } else {
                    let (columns, values): (Vec<String>, Vec<SqlValue>) =
                        bound.iter().cloned().unzip();
                    let insert = RowInsert {
                        table: table_ref.clone(),
                        columns,
                        values,
                    };
                    let id = session.insert_row(&insert).await?;
                    self.audit(AuditEvent {
                        file: file.to_string(),
                        event: "insert",
                        element: local.clone(),
                        table: table.name.clone(),
                        new_id: Some(id),
                        parent_table: parent.as_ref().map(|p| p.table.clone()).unwrap_or_default(),
                        parent_id: parent.as_ref().and_then(|p| p.id),
                        params: format_params(&bound),
                        ..Default::default()
                    });
                    id
                };
                outcome.add(&table.name);
                new_id = Some(id);
            }

            let next = ParentCtx {
                table: table.name.clone(),
                id: new_id,
            };
            self.recurse_children(session, node, table, next, outcome, file)
                .await
        })
    }

    /// Bind the parent FK, attribute values, scalar child values, and the
    /// discriminator columns for this element.
    fn bind_values(
        &self,
        table: &Table,
        node: Node<'_, '_>,
        parent: &Option<ParentCtx>,
        local: &str,
    ) -> Vec<(String, SqlValue)> {
        let mut bound: Vec<(String, SqlValue)> = Vec::new();

        if let Some(p) = parent {
            let fk_column = format!("{}Id", p.table);
            if let (Some(column), Some(id)) = (table.column(&fk_column), p.id) {
                bound.push((column.name.clone(), SqlValue::Int(id as i64)));
            }
        }

        for attribute in node.attributes() {
            let Some(column) = table.column(&table_ident(attribute.name())) else {
                continue;
            };
            if column.identity || has_binding(&bound, &column.name) {
                continue;
            }
            bound.push((column.name.clone(), coerce(attribute.value(), &column.sql_type)));
        }

        // simpleContent text lands in the `Value` column when the model has one.
        if let Some(column) = table.column("Value") {
            if !column.identity && !has_binding(&bound, &column.name) {
                if let Some(text) = node.text().map(str::trim).filter(|t| !t.is_empty()) {
                    bound.push((column.name.clone(), coerce(text, &column.sql_type)));
                }
            }
        }

        for child in node.children().filter(|n| n.is_element()) {
            if child.children().any(|n| n.is_element()) {
                continue;
            }
            let Some(text) = child.text().map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            let Some(column) = table.column(&table_ident(child.tag_name().name())) else {
                continue;
            };
            if column.identity || has_binding(&bound, &column.name) {
                continue;
            }
            bound.push((column.name.clone(), coerce(text, &column.sql_type)));
        }

        if let Some(column) = table.column(CHOICE_PARENT_OPTION) {
            if !has_binding(&bound, &column.name) {
                bound.push((column.name.clone(), SqlValue::Text(local.to_string())));
            }
        }

        // The selected choice branch is known from the children present.
        if let Some(column) = table.column(CHOICE_OPTION) {
            if !has_binding(&bound, &column.name) {
                let selected = node
                    .children()
                    .filter(|n| n.is_element())
                    .map(|n| n.tag_name().name())
                    .find(|name| table.choice_members.iter().any(|m| eq_ci(m, name)));
                if let Some(branch) = selected {
                    bound.push((column.name.clone(), SqlValue::Text(branch.to_string())));
                }
            }
        }

        bound
    }

    /// Idempotency probes: each unique constraint fully covered by the
    /// bound set, in declaration order, then the generic full-row probe.
    async fn probe_existing(
        &self,
        session: &mut dyn SqlSession,
        table: &Table,
        table_ref: &TableRef,
        bound: &[(String, SqlValue)],
    ) -> IngestResult<Option<i32>> {
        let mut probed_unique = false;
        for unique in &table.uniques {
            let covered: Vec<(String, SqlValue)> = unique
                .columns
                .iter()
                .filter_map(|c| {
                    bound
                        .iter()
                        .find(|(name, _)| eq_ci(name, c))
                        .map(|(name, value)| (name.clone(), value.clone()))
                })
                .collect();
            if covered.len() != unique.columns.len() {
                continue;
            }
            probed_unique = true;
            let (columns, values) = covered.into_iter().unzip();
            let probe = RowProbe {
                table: table_ref.clone(),
                columns,
                values,
            };
            if let Some(id) = session.find_existing(&probe).await? {
                return Ok(Some(id));
            }
        }

        if probed_unique {
            return Ok(None);
        }
        let (columns, values): (Vec<String>, Vec<SqlValue>) = bound.iter().cloned().unzip();
        let probe = RowProbe {
            table: table_ref.clone(),
            columns,
            values,
        };
        session.find_existing(&probe).await
    }

    async fn recurse_children<'a>(
        &'a self,
        session: &'a mut dyn SqlSession,
        node: Node<'a, 'a>,
        table: &Table,
        next: ParentCtx,
        outcome: &'a mut ImportOutcome,
        file: &'a str,
    ) -> IngestResult<()> {
        for child in node.children().filter(|n| n.is_element()) {
            // Children consumed as scalar columns of this table don't recurse.
            let is_scalar_child = !child.children().any(|n| n.is_element())
                && table.has_column(&table_ident(child.tag_name().name()));
            if is_scalar_child {
                continue;
            }
            self.walk_node(session, child, Some(next.clone()), outcome, file)
                .await?;
        }
        Ok(())
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(audit) = self.observer.audit() {
            audit.record(&event);
        }
    }
}

fn has_binding(bound: &[(String, SqlValue)], column: &str) -> bool {
    bound.iter().any(|(name, _)| eq_ci(name, column))
}
