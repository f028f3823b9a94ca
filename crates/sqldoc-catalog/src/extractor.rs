//! Metadata extraction
//!
//! [`MetadataExtractor`] probes the database identity, fetches every catalog
//! [`Category`], decodes each one independently and hands the decoded rows to
//! the [`ModelBuilder`]. A category that fails to fetch or decode leaves its
//! collection empty and produces an [`ExtractionWarning::Category`]; only a
//! failure to connect or to read the database identity aborts the run.

use crate::builder::ModelBuilder;
use crate::category::{exact_row_count_sql, DATABASE_INFO_SQL};
use crate::decode::{decode_database_info, CatalogSnapshot, Owned};
use crate::{Category, ExtractionWarning, ExtractorConfig, RowCountStrategy, SchemaModel};
use sqldoc_core::{Connection, ConnectionProvider, QueryResult, SqldocError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strum::IntoEnumIterator;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to connect to the database: {0}")]
    Connection(#[source] SqldocError),

    #[error("database metadata is unavailable: {0}")]
    MetadataUnavailable(String),
}

/// A finished extraction
#[derive(Debug, Clone)]
pub struct Extraction {
    pub model: SchemaModel,
    pub warnings: Vec<ExtractionWarning>,
}

#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Complete(Extraction),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionProgress {
    pub category: Category,
    pub completed: usize,
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(ExtractionProgress) + Send + Sync>;

pub struct MetadataExtractor {
    provider: Arc<dyn ConnectionProvider>,
    config: ExtractorConfig,
    progress: Option<ProgressCallback>,
}

impl MetadataExtractor {
    pub fn new(provider: Arc<dyn ConnectionProvider>, config: ExtractorConfig) -> Self {
        Self {
            provider,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Categories this configuration fetches, in fetch order
    pub fn categories(&self) -> Vec<Category> {
        let catalog_counts = self.config.include_row_counts
            && self.config.row_count_strategy == RowCountStrategy::CatalogStatistics;
        Category::iter()
            .filter(|c| *c != Category::RowCounts || catalog_counts)
            .collect()
    }

    #[tracing::instrument(skip_all, fields(concurrent = self.config.concurrent_categories))]
    pub async fn extract(&self, cancel: &CancellationToken) -> Result<ExtractionOutcome, ExtractError> {
        if cancel.is_cancelled() {
            return Ok(ExtractionOutcome::Cancelled);
        }

        let connection = self
            .provider
            .acquire()
            .await
            .map_err(ExtractError::Connection)?;
        let outcome = self.extract_on(&connection, cancel).await;
        self.provider.release(connection).await;
        outcome
    }

    async fn extract_on(
        &self,
        connection: &Arc<dyn Connection>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome, ExtractError> {
        let probe = connection
            .query(DATABASE_INFO_SQL)
            .await
            .map_err(ExtractError::Connection)?;
        let info = decode_database_info(&probe)
            .map_err(|e| ExtractError::MetadataUnavailable(e.to_string()))?
            .ok_or_else(|| ExtractError::MetadataUnavailable("identity probe returned no rows".into()))?;
        tracing::info!(database = %info.database_name, "extracting catalog metadata");

        let categories = self.categories();
        let results = if self.config.concurrent_categories && self.provider.supports_concurrency() {
            let results = self.fetch_concurrently(&categories).await;
            if cancel.is_cancelled() {
                return Ok(ExtractionOutcome::Cancelled);
            }
            results
        } else {
            let mut results = Vec::with_capacity(categories.len());
            for (completed, category) in categories.iter().copied().enumerate() {
                if cancel.is_cancelled() {
                    return Ok(ExtractionOutcome::Cancelled);
                }
                results.push((category, fetch(connection.as_ref(), category).await));
                self.report(category, completed + 1, categories.len());
            }
            results
        };

        let mut snapshot = CatalogSnapshot::default();
        let mut warnings = Vec::new();
        let mut failed = HashSet::new();
        for (category, result) in results {
            let absorbed = result
                .map_err(|e| e.to_string())
                .and_then(|r| snapshot.absorb(category, &r).map_err(|e| e.to_string()));
            if let Err(message) = absorbed {
                tracing::warn!(%category, error = %message, "catalog category failed");
                failed.insert(category);
                warnings.push(ExtractionWarning::Category { category, message });
            }
        }
        let mut orphaned = Vec::new();
        if failed.contains(&Category::Tables) {
            orphaned.extend(
                snapshot
                    .discard_table_children()
                    .into_iter()
                    .map(|(category, rows)| (category, rows, Category::Tables)),
            );
        }
        if failed.contains(&Category::Views) {
            let rows = snapshot.discard(Category::ViewColumns);
            if rows > 0 {
                orphaned.push((Category::ViewColumns, rows, Category::Views));
            }
        }
        for (category, rows, owner) in orphaned {
            let message = format!("{} rows discarded because {} could not be extracted", rows, owner);
            tracing::warn!(%category, %owner, rows, "catalog rows discarded");
            warnings.push(ExtractionWarning::Category { category, message });
        }

        if self.config.include_row_counts
            && self.config.row_count_strategy == RowCountStrategy::ExactCount
            && !failed.contains(&Category::Tables)
        {
            match self.count_rows(connection.as_ref(), &snapshot, cancel).await {
                Some((counts, count_warnings)) => {
                    snapshot.row_counts = counts;
                    warnings.extend(count_warnings);
                }
                None => return Ok(ExtractionOutcome::Cancelled),
            }
        }

        if cancel.is_cancelled() {
            return Ok(ExtractionOutcome::Cancelled);
        }

        let (model, join_warnings) =
            ModelBuilder::new(&self.config).build(snapshot, info, chrono::Local::now().naive_local());
        warnings.extend(join_warnings);
        tracing::info!(
            tables = model.statistics.total_tables,
            views = model.statistics.total_views,
            warnings = warnings.len(),
            "catalog extraction finished"
        );
        Ok(ExtractionOutcome::Complete(Extraction { model, warnings }))
    }

    /// One connection per category, all in flight at once
    async fn fetch_concurrently(
        &self,
        categories: &[Category],
    ) -> Vec<(Category, sqldoc_core::Result<QueryResult>)> {
        let completed = AtomicUsize::new(0);
        let total = categories.len();
        let fetches = categories.iter().copied().map(|category| {
            let completed = &completed;
            async move {
                let result = match self.provider.acquire().await {
                    Ok(connection) => {
                        let result = fetch(connection.as_ref(), category).await;
                        self.provider.release(connection).await;
                        result
                    }
                    Err(e) => Err(e),
                };
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.report(category, done, total);
                (category, result)
            }
        });
        futures::future::join_all(fetches).await
    }

    /// `COUNT_BIG(*)` for every table that survives filtering; `None` when cancelled
    async fn count_rows(
        &self,
        connection: &dyn Connection,
        snapshot: &CatalogSnapshot,
        cancel: &CancellationToken,
    ) -> Option<(Vec<Owned<u64>>, Vec<ExtractionWarning>)> {
        let mut counts = Vec::new();
        let mut warnings = Vec::new();
        for shipped in &snapshot.tables {
            let table = &shipped.item;
            if !self
                .config
                .keeps_object(&table.schema_name, shipped.is_ms_shipped)
            {
                continue;
            }
            if cancel.is_cancelled() {
                return None;
            }
            let sql = exact_row_count_sql(&table.schema_name, &table.table_name);
            let count = connection.query(&sql).await.and_then(|result| {
                result
                    .scalar()
                    .and_then(|v| v.as_i64())
                    .and_then(|v| u64::try_from(v).ok())
                    .ok_or_else(|| SqldocError::Query("row count query returned no count".into()))
            });
            match count {
                Ok(row_count) => counts.push(Owned {
                    schema_name: table.schema_name.clone(),
                    table_name: table.table_name.clone(),
                    ordinal: 0,
                    is_ms_shipped: shipped.is_ms_shipped,
                    item: row_count,
                }),
                Err(e) => {
                    tracing::warn!(table = %table.qualified_name(), error = %e, "row count failed");
                    warnings.push(ExtractionWarning::Category {
                        category: Category::RowCounts,
                        message: format!("{}: {}", table.qualified_name(), e),
                    });
                }
            }
        }
        Some((counts, warnings))
    }

    fn report(&self, category: Category, completed: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(ExtractionProgress {
                category,
                completed,
                total,
            });
        }
    }
}

#[tracing::instrument(skip(connection), fields(%category))]
async fn fetch(connection: &dyn Connection, category: Category) -> sqldoc_core::Result<QueryResult> {
    let result = connection.query(category.sql()).await?;
    tracing::debug!(rows = result.row_count(), "fetched catalog category");
    Ok(result)
}
