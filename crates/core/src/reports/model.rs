//! Report metadata and the reports index document.
//!
//! The index is committed as `data/reports-index.json`:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "lastUpdated": "2024-05-01T10:00:00.000Z",
//!   "reports": [
//!     {
//!       "id": "report-1714557600000",
//!       "title": "Q2 revenue",
//!       "description": "",
//!       "categories": ["finance", "quarterly", "revenue"],
//!       "fileName": "report-1714557600000.html",
//!       "createdAt": "2024-05-01T10:00:00.000Z",
//!       "updatedAt": "2024-05-01T10:00:00.000Z"
//!     }
//!   ]
//! }
//! ```

use crate::constants::{DEFAULT_REPORT_TITLE, INDEX_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// RFC 3339 timestamps with millisecond precision and a `Z` suffix.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Any value that is not an RFC 3339 string reads as `None`.
    pub fn lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Like [`lenient`], falling back to the unix epoch.
    pub fn or_epoch<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        Ok(lenient(d)?.unwrap_or_default())
    }
}

/// One entry of the reports index.
///
/// The index is a plain file in the repository and may be edited by hand, so reading is
/// forgiving: only `id` is required. A missing title reads as the default title, a missing file
/// name as `<id>.html`, and a missing or malformed timestamp takes the other timestamp (or the
/// unix epoch if both are unusable).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredMeta")]
pub struct ReportMeta {
    pub id: String,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    /// `<id>.html`, relative to the reports directory.
    pub file_name: String,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub updated_at: DateTime<Utc>,
}

/// An index entry as found in the file.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMeta {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default, deserialize_with = "timestamp::lenient")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::lenient")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<StoredMeta> for ReportMeta {
    fn from(raw: StoredMeta) -> Self {
        let created_at = raw.created_at.or(raw.updated_at).unwrap_or_default();
        let updated_at = raw.updated_at.unwrap_or(created_at);
        Self {
            file_name: raw.file_name.unwrap_or_else(|| format!("{}.html", raw.id)),
            title: raw
                .title
                .unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string()),
            description: raw.description.unwrap_or_default(),
            categories: raw.categories.unwrap_or_default(),
            created_at,
            updated_at,
            id: raw.id,
        }
    }
}

/// Report metadata together with its HTML body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(flatten)]
    pub meta: ReportMeta,
    pub html_code: String,
}

/// The whole index document.
///
/// Entries that cannot be read at all (no `id`, wrong shape) are skipped with a warning; every
/// other entry is kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsIndex {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(
        default,
        serialize_with = "timestamp::serialize",
        deserialize_with = "timestamp::or_epoch"
    )]
    pub last_updated: DateTime<Utc>,
    #[serde(default, deserialize_with = "readable_entries")]
    pub reports: Vec<ReportMeta>,
}

fn default_version() -> String {
    INDEX_VERSION.to_string()
}

fn readable_entries<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ReportMeta>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value::<ReportMeta>(entry) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!("skipping unreadable reports index entry {i}: {e}");
                None
            }
        })
        .collect())
}

impl ReportsIndex {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            last_updated: now,
            reports: Vec::new(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&ReportMeta> {
        self.reports.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }
}

/// The index as read from the repository, with the SHA of the blob it came from.
///
/// `sha` is `None` when the index file does not exist yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub index: ReportsIndex,
    pub sha: Option<String>,
}

/// Input for creating a report. Missing metadata falls back to defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewReport {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub html_code: String,
}

/// Input for updating a report. `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    /// `None` leaves the HTML file untouched and only rewrites the index.
    pub html_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedReport {
    pub success: bool,
    pub deleted_report: ReportMeta,
}
