//! Request and response bodies for the REST API.
//!
//! Field names are camelCase to match the index document the UI already reads.

use chrono::{DateTime, SecondsFormat, Utc};
use reports_core::github::RepoInfo;
use reports_core::{Report, ReportMeta};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub owner: String,
    pub repo: String,
    pub token_set: bool,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfigStatusRes {
    pub configured: bool,
    pub config: Option<ConfigSummary>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SaveConfigReq {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateConfigReq {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub port: Option<u16>,
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetaRes {
    pub id: String,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub file_name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ReportMeta> for ReportMetaRes {
    fn from(meta: ReportMeta) -> Self {
        Self {
            id: meta.id,
            title: meta.title,
            description: meta.description,
            categories: meta.categories,
            file_name: meta.file_name,
            created_at: timestamp(meta.created_at),
            updated_at: timestamp(meta.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportRes {
    #[serde(flatten)]
    pub meta: ReportMetaRes,
    pub html_code: String,
}

impl From<Report> for ReportRes {
    fn from(report: Report) -> Self {
        Self {
            meta: report.meta.into(),
            html_code: report.html_code,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportReq {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub html_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListReportsRes {
    pub success: bool,
    pub reports: Vec<ReportMetaRes>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GetReportRes {
    pub success: bool,
    pub report: ReportRes,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaveReportRes {
    pub success: bool,
    pub message: String,
    pub report: ReportRes,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReportRes {
    pub success: bool,
    pub message: String,
    pub deleted_report: ReportMetaRes,
}

// ============================================================================
// CONNECTION
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub default_branch: String,
}

impl From<RepoInfo> for RepoSummary {
    fn from(info: RepoInfo) -> Self {
        Self {
            name: info.name,
            full_name: info.full_name,
            private: info.private,
            default_branch: info.default_branch,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionRes {
    pub success: bool,
    pub message: String,
    pub repo: RepoSummary,
}
