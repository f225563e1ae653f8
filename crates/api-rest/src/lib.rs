//! # API REST
//!
//! REST API for the reports admin.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, CORS, status codes)
//! - Publishing policy on incoming reports, via `report-types`
//!
//! Report and connection routes answer `400` until a complete GitHub config has been saved.

#![warn(rust_2018_idioms)]

pub mod types;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use report_types::{CategoryList, NonEmptyText, TextError};
use reports_core::{
    ConfigStore, ConfigUpdate, GitHubClient, GitHubConfig, NewReport, RepoStore, ReportUpdate,
    ReportsError, ReportsManager, ReportsResult,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use types::{
    ConfigStatusRes, ConfigSummary, ConnectionRes, DeleteReportRes, ErrorRes, GetReportRes,
    HealthRes, ListReportsRes, MessageRes, ReportMetaRes, ReportReq, ReportRes, RepoSummary,
    SaveConfigReq, SaveReportRes, UpdateConfigReq,
};

/// Builds the repository store for a freshly loaded config.
pub type StoreFactory =
    Arc<dyn Fn(GitHubConfig) -> ReportsResult<Arc<dyn RepoStore>> + Send + Sync>;

/// Application state shared by every handler.
///
/// The reports manager is rebuilt whenever the config file changes, so it sits behind a lock
/// and is `None` until the config is complete.
#[derive(Clone)]
pub struct AppState {
    config_store: Arc<ConfigStore>,
    store_factory: StoreFactory,
    manager: Arc<RwLock<Option<ReportsManager>>>,
}

impl AppState {
    /// State that talks to GitHub over HTTPS.
    pub fn new(config_store: ConfigStore) -> Self {
        Self::with_store_factory(
            config_store,
            Arc::new(|cfg: GitHubConfig| -> ReportsResult<Arc<dyn RepoStore>> {
                Ok(Arc::new(GitHubClient::new(cfg)?))
            }),
        )
    }

    pub fn with_store_factory(config_store: ConfigStore, store_factory: StoreFactory) -> Self {
        Self {
            config_store: Arc::new(config_store),
            store_factory,
            manager: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    /// Re-read the config file and rebuild the reports manager.
    ///
    /// Returns whether a manager is available afterwards.
    pub async fn reload(&self) -> ReportsResult<bool> {
        let github = self
            .config_store
            .get_config()?
            .and_then(|cfg| cfg.github_config());

        let manager = match github {
            Some(cfg) => {
                tracing::info!("using GitHub repository {}/{}", cfg.owner(), cfg.repo());
                Some(ReportsManager::new((self.store_factory)(cfg)?))
            }
            None => None,
        };

        let configured = manager.is_some();
        *self.manager.write().await = manager;
        Ok(configured)
    }

    async fn require_manager(&self) -> Result<ReportsManager, ApiError> {
        self.manager
            .read()
            .await
            .clone()
            .ok_or_else(|| ApiError::from(ReportsError::NotConfigured))
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error response: a status code and a `{ success: false, error }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<ReportsError> for ApiError {
    fn from(err: ReportsError) -> Self {
        let status = match &err {
            ReportsError::ReportNotFound(_) => StatusCode::NOT_FOUND,
            ReportsError::InvalidInput(_) | ReportsError::NotConfigured => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {err}");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<TextError> for ApiError {
    fn from(err: TextError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorRes {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// ROUTER
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        config_status,
        save_config,
        update_config,
        list_reports,
        get_report,
        create_report,
        update_report,
        delete_report,
        test_connection,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        MessageRes,
        ConfigStatusRes,
        ConfigSummary,
        SaveConfigReq,
        UpdateConfigReq,
        ReportMetaRes,
        ReportRes,
        ReportReq,
        ListReportsRes,
        GetReportRes,
        SaveReportRes,
        DeleteReportRes,
        RepoSummary,
        ConnectionRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/config/status", get(config_status))
        .route("/api/config/save", post(save_config))
        .route("/api/config/update", put(update_config))
        .route("/api/reports", get(list_reports).post(create_report))
        .route(
            "/api/reports/:id",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/api/test/connection", get(test_connection))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Reports admin REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/api/config/status",
    responses(
        (status = 200, description = "Whether a complete config exists", body = ConfigStatusRes),
        (status = 500, description = "Config file could not be read", body = ErrorRes)
    )
)]
/// Report whether the admin is configured, without exposing the token.
async fn config_status(State(state): State<AppState>) -> ApiResult<ConfigStatusRes> {
    let config = state.config_store().get_config()?;

    let summary = config.filter(|cfg| cfg.is_complete()).map(|cfg| ConfigSummary {
        token_set: cfg.token.is_some(),
        owner: cfg.owner.unwrap_or_default(),
        repo: cfg.repo.unwrap_or_default(),
        port: cfg.port,
    });

    Ok(Json(ConfigStatusRes {
        configured: summary.is_some(),
        config: summary,
    }))
}

#[utoipa::path(
    post,
    path = "/api/config/save",
    request_body = SaveConfigReq,
    responses(
        (status = 200, description = "Config saved", body = MessageRes),
        (status = 400, description = "Owner, repo or token missing", body = ErrorRes),
        (status = 500, description = "Config file could not be written", body = ErrorRes)
    )
)]
/// Overwrite the config file and reconnect.
async fn save_config(
    State(state): State<AppState>,
    Json(req): Json<SaveConfigReq>,
) -> ApiResult<MessageRes> {
    let required = |v: Option<String>| v.and_then(|v| NonEmptyText::new(v).ok());
    let (Some(owner), Some(repo), Some(token)) =
        (required(req.owner), required(req.repo), required(req.token))
    else {
        return Err(ApiError::bad_request("owner, repo and token are required"));
    };

    state
        .config_store()
        .save_config(owner.as_str(), repo.as_str(), token.as_str(), req.port)?;
    state.reload().await?;

    tracing::info!("config saved for {owner}/{repo}");
    Ok(Json(MessageRes {
        success: true,
        message: "Config saved".into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/config/update",
    request_body = UpdateConfigReq,
    responses(
        (status = 200, description = "Config updated", body = MessageRes),
        (status = 500, description = "Config file could not be written", body = ErrorRes)
    )
)]
/// Change some config fields and reconnect.
async fn update_config(
    State(state): State<AppState>,
    Json(req): Json<UpdateConfigReq>,
) -> ApiResult<MessageRes> {
    state.config_store().update_config(ConfigUpdate {
        owner: req.owner,
        repo: req.repo,
        token: req.token,
        port: req.port,
    })?;
    state.reload().await?;

    Ok(Json(MessageRes {
        success: true,
        message: "Config updated".into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/reports",
    responses(
        (status = 200, description = "Metadata of every report", body = ListReportsRes),
        (status = 400, description = "Not configured", body = ErrorRes),
        (status = 500, description = "GitHub request failed", body = ErrorRes)
    )
)]
/// List report metadata from the index.
async fn list_reports(State(state): State<AppState>) -> ApiResult<ListReportsRes> {
    let manager = state.require_manager().await?;
    let reports = manager.get_all_reports().await?;

    Ok(Json(ListReportsRes {
        success: true,
        reports: reports.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report with its HTML", body = GetReportRes),
        (status = 400, description = "Not configured", body = ErrorRes),
        (status = 404, description = "Report not found", body = ErrorRes),
        (status = 500, description = "GitHub request failed", body = ErrorRes)
    )
)]
/// Fetch one report with its HTML.
async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<GetReportRes> {
    let manager = state.require_manager().await?;
    let report = manager
        .get_report(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("report not found: {id}")))?;

    Ok(Json(GetReportRes {
        success: true,
        report: report.into(),
    }))
}

/// Title and HTML are mandatory on both create and update.
fn required_title_and_html(req: &ReportReq) -> Result<(NonEmptyText, String), ApiError> {
    let missing = || ApiError::bad_request("title and htmlCode are required");
    let title = req
        .title
        .as_deref()
        .and_then(|t| NonEmptyText::new(t).ok())
        .ok_or_else(missing)?;
    let html = req
        .html_code
        .clone()
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(missing)?;
    Ok((title, html))
}

#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = ReportReq,
    responses(
        (status = 200, description = "Report created", body = SaveReportRes),
        (status = 400, description = "Validation failed or not configured", body = ErrorRes),
        (status = 500, description = "GitHub request failed", body = ErrorRes)
    )
)]
/// Create a report. Needs a title, HTML and at least three categories.
async fn create_report(
    State(state): State<AppState>,
    Json(req): Json<ReportReq>,
) -> ApiResult<SaveReportRes> {
    let manager = state.require_manager().await?;
    let (title, html_code) = required_title_and_html(&req)?;
    let categories = CategoryList::new(req.categories.unwrap_or_default())?;

    let report = manager
        .create_report(NewReport {
            title: Some(title.into_string()),
            description: req.description,
            categories: Some(categories.into_vec()),
            html_code,
        })
        .await?;

    Ok(Json(SaveReportRes {
        success: true,
        message: "Report created".into(),
        report: report.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/reports/{id}",
    params(("id" = String, Path, description = "Report id")),
    request_body = ReportReq,
    responses(
        (status = 200, description = "Report updated", body = SaveReportRes),
        (status = 400, description = "Validation failed or not configured", body = ErrorRes),
        (status = 404, description = "Report not found", body = ErrorRes),
        (status = 500, description = "GitHub request failed", body = ErrorRes)
    )
)]
/// Update a report. Categories, when given, still need at least three entries.
async fn update_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReportReq>,
) -> ApiResult<SaveReportRes> {
    let manager = state.require_manager().await?;
    let (title, html_code) = required_title_and_html(&req)?;
    let categories = req
        .categories
        .map(CategoryList::new)
        .transpose()?
        .map(CategoryList::into_vec);

    let report = manager
        .update_report(
            &id,
            ReportUpdate {
                title: Some(title.into_string()),
                description: req.description,
                categories,
                html_code: Some(html_code),
            },
        )
        .await?;

    Ok(Json(SaveReportRes {
        success: true,
        message: "Report updated".into(),
        report: report.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report deleted", body = DeleteReportRes),
        (status = 400, description = "Not configured", body = ErrorRes),
        (status = 404, description = "Report not found", body = ErrorRes),
        (status = 500, description = "GitHub request failed", body = ErrorRes)
    )
)]
/// Delete a report's HTML file and its index entry.
async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteReportRes> {
    let manager = state.require_manager().await?;
    let deleted = manager.delete_report(&id).await?;

    Ok(Json(DeleteReportRes {
        success: deleted.success,
        message: "Report deleted".into(),
        deleted_report: deleted.deleted_report.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/test/connection",
    responses(
        (status = 200, description = "Repository reachable", body = ConnectionRes),
        (status = 400, description = "Not configured", body = ErrorRes),
        (status = 500, description = "GitHub request failed", body = ErrorRes)
    )
)]
/// Check the configured credentials by reading the repository metadata.
async fn test_connection(State(state): State<AppState>) -> ApiResult<ConnectionRes> {
    let manager = state.require_manager().await?;
    let info = manager
        .store()
        .repo_info()
        .await
        .map_err(ReportsError::from)?;

    Ok(Json(ConnectionRes {
        success: true,
        message: "Connected".into(),
        repo: info.into(),
    }))
}
