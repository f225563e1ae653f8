//! Reports stored in a GitHub repository.
//!
//! A report is two objects in the repository: an entry in the shared index
//! (`data/reports-index.json`) and an HTML file (`reports/<id>.html`). The repository has no
//! multi-object transactions, so [`ReportsManager`] is the only writer of either and keeps them
//! consistent by how it orders writes:
//!
//! - Create and update write the HTML file and the whole index in one batch commit. Either both
//!   land or neither does.
//! - Delete removes the HTML file first and rewrites the index second. A crash in between leaves
//!   an index entry whose file is gone; readers already treat that as "not found".
//!
//! The core applies no domain policy to titles or categories. Callers validate first.

mod model;

pub use model::{
    DeletedReport, IndexSnapshot, NewReport, Report, ReportMeta, ReportUpdate, ReportsIndex,
};

use crate::constants::{DEFAULT_REPORT_TITLE, REPORTS_DIR, REPORTS_INDEX_PATH, REPORT_ID_PREFIX};
use crate::github::{BatchFile, FileCommit};
use crate::store::RepoStore;
use crate::{ReportsError, ReportsResult};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;

/// Source of "now" for timestamps and report ids.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Keeps the reports index and the per-report HTML files in step.
#[derive(Clone)]
pub struct ReportsManager {
    store: Arc<dyn RepoStore>,
    clock: Clock,
}

impl std::fmt::Debug for ReportsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportsManager").finish_non_exhaustive()
    }
}

impl ReportsManager {
    pub fn new(store: Arc<dyn RepoStore>) -> Self {
        Self {
            store,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, for deterministic ids and timestamps.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn RepoStore> {
        &self.store
    }

    // Millisecond precision so timestamps survive a round trip through the index.
    fn now(&self) -> DateTime<Utc> {
        (self.clock)().trunc_subsecs(3)
    }

    fn html_path(file_name: &str) -> String {
        format!("{REPORTS_DIR}/{file_name}")
    }

    fn next_report_id(&self, index: &ReportsIndex, now: DateTime<Utc>) -> String {
        let mut millis = now.timestamp_millis();
        loop {
            let id = format!("{REPORT_ID_PREFIX}{millis}");
            if !index.contains(&id) {
                return id;
            }
            millis += 1;
        }
    }

    fn render_index(index: &ReportsIndex) -> ReportsResult<String> {
        serde_json::to_string_pretty(index).map_err(ReportsError::Serialization)
    }

    /// Read the index.
    ///
    /// A missing index file yields an empty index with no SHA. Hand-edited entries with missing
    /// fields are filled in and entries without an id are skipped (see [`ReportMeta`]). Only a
    /// file that is not JSON at all is logged and replaced by an empty index that keeps the
    /// file's SHA, so the next save can still overwrite it.
    pub async fn get_reports_index(&self) -> ReportsResult<IndexSnapshot> {
        let Some(file) = self.store.get_file_content(REPORTS_INDEX_PATH).await? else {
            return Ok(IndexSnapshot {
                index: ReportsIndex::empty(self.now()),
                sha: None,
            });
        };

        match serde_json::from_str::<ReportsIndex>(&file.content) {
            Ok(index) => Ok(IndexSnapshot {
                index,
                sha: Some(file.sha),
            }),
            Err(e) => {
                tracing::error!("failed to parse {REPORTS_INDEX_PATH}, starting from empty: {e}");
                Ok(IndexSnapshot {
                    index: ReportsIndex::empty(self.now()),
                    sha: Some(file.sha),
                })
            }
        }
    }

    /// Write the index on its own with a fresh `lastUpdated`.
    ///
    /// `sha` must name the blob being replaced, or be `None` if the file does not exist yet.
    pub async fn save_reports_index(
        &self,
        index: &ReportsIndex,
        sha: Option<&str>,
    ) -> ReportsResult<FileCommit> {
        let index = ReportsIndex {
            last_updated: self.now(),
            ..index.clone()
        };
        let content = Self::render_index(&index)?;
        let message = format!("Update reports index: {} reports", index.reports.len());

        Ok(self
            .store
            .create_or_update_file(REPORTS_INDEX_PATH, &content, &message, sha)
            .await?)
    }

    /// Create a report and commit its HTML file and the extended index together.
    pub async fn create_report(&self, data: NewReport) -> ReportsResult<Report> {
        let IndexSnapshot { mut index, .. } = self.get_reports_index().await?;

        let now = self.now();
        let id = self.next_report_id(&index, now);
        let title = data.title.filter(|t| !t.is_empty());
        let message = format!("Create report: {}", title.as_deref().unwrap_or(&id));

        let meta = ReportMeta {
            file_name: format!("{id}.html"),
            title: title.unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string()),
            description: data.description.unwrap_or_default(),
            categories: data.categories.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            id,
        };

        index.reports.push(meta.clone());
        index.last_updated = now;

        let files = [
            BatchFile::new(Self::html_path(&meta.file_name), data.html_code.as_str()),
            BatchFile::new(REPORTS_INDEX_PATH, Self::render_index(&index)?),
        ];
        self.store.batch_commit(&files, &message).await?;

        tracing::info!("created report {} ({})", meta.id, meta.title);
        Ok(Report {
            meta,
            html_code: data.html_code,
        })
    }

    /// Apply the supplied fields to an existing report and commit the result.
    ///
    /// # Errors
    ///
    /// Returns `ReportsError::ReportNotFound` if `id` is not in the index. Nothing is written
    /// in that case.
    pub async fn update_report(&self, id: &str, data: ReportUpdate) -> ReportsResult<Report> {
        let IndexSnapshot { mut index, .. } = self.get_reports_index().await?;

        let Some(position) = index.reports.iter().position(|r| r.id == id) else {
            return Err(ReportsError::ReportNotFound(id.to_string()));
        };

        let now = self.now();
        let meta = {
            let entry = &mut index.reports[position];
            if let Some(title) = data.title {
                entry.title = title;
            }
            if let Some(description) = data.description {
                entry.description = description;
            }
            if let Some(categories) = data.categories {
                entry.categories = categories;
            }
            entry.updated_at = now;
            entry.clone()
        };
        index.last_updated = now;

        let html_path = Self::html_path(&meta.file_name);
        let (html_code, mut files) = match data.html_code {
            Some(html) => {
                let file = BatchFile::new(html_path.as_str(), html.as_str());
                (html, vec![file])
            }
            None => {
                let current = self
                    .store
                    .get_file_content(&html_path)
                    .await?
                    .map(|f| f.content)
                    .unwrap_or_default();
                (current, Vec::new())
            }
        };
        files.push(BatchFile::new(REPORTS_INDEX_PATH, Self::render_index(&index)?));

        self.store
            .batch_commit(&files, &format!("Update report: {}", meta.title))
            .await?;

        tracing::info!("updated report {}", meta.id);
        Ok(Report { meta, html_code })
    }

    /// Delete a report's HTML file, then drop it from the index.
    ///
    /// If the HTML file is already gone (an earlier delete stopped between its two writes, or
    /// the file was removed by hand) this is not an error: a warning is logged, no file delete
    /// is sent, and the index entry is still removed.
    ///
    /// # Errors
    ///
    /// Returns `ReportsError::ReportNotFound` if `id` is not in the index. Nothing is written
    /// in that case.
    pub async fn delete_report(&self, id: &str) -> ReportsResult<DeletedReport> {
        let IndexSnapshot { mut index, sha } = self.get_reports_index().await?;

        let Some(report) = index.find(id).cloned() else {
            return Err(ReportsError::ReportNotFound(id.to_string()));
        };

        let html_path = Self::html_path(&report.file_name);
        let html = self.store.get_file_content(&html_path).await?;

        index.reports.retain(|r| r.id != id);

        match html {
            Some(file) => {
                self.store
                    .delete_file(&html_path, &file.sha, &format!("Delete report: {}", report.title))
                    .await?;
            }
            None => {
                tracing::warn!("{html_path} is already missing, removing {id} from the index only");
            }
        }

        self.save_reports_index(&index, sha.as_deref()).await?;

        tracing::info!("deleted report {id}");
        Ok(DeletedReport {
            success: true,
            deleted_report: report,
        })
    }

    /// Fetch one report with its HTML.
    ///
    /// `None` if the id is not in the index or its HTML file is missing.
    pub async fn get_report(&self, id: &str) -> ReportsResult<Option<Report>> {
        let snapshot = self.get_reports_index().await?;
        let Some(meta) = snapshot.index.find(id).cloned() else {
            return Ok(None);
        };

        let html = self
            .store
            .get_file_content(&Self::html_path(&meta.file_name))
            .await?;

        Ok(html.map(|file| Report {
            meta,
            html_code: file.content,
        }))
    }

    /// Metadata of every report, in index order. Reads only the index.
    pub async fn get_all_reports(&self) -> ReportsResult<Vec<ReportMeta>> {
        Ok(self.get_reports_index().await?.index.reports)
    }
}
