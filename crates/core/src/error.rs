/// Coarse classification of a failed GitHub API call.
///
/// Callers branch on the kind rather than on message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// 5xx or 429 that survived the whole retry budget.
    Transient,
    /// 403 with an exhausted quota and no usable reset time.
    RateLimited,
    /// 404.
    NotFound,
    /// Any other non-2xx response.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API error: {status} - {body} (retries exhausted)")]
    Transient { status: u16, body: String },
    #[error("GitHub API rate limit exceeded: {status} - {body}")]
    RateLimited { status: u16, body: String },
    #[error("GitHub API error: 404 - {body}")]
    NotFound { body: String },
    #[error("GitHub API error: {status} - {body}")]
    Fatal { status: u16, body: String },
    #[error("GitHub request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to decode GitHub response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to decode file content: {0}")]
    ContentDecode(#[from] base64::DecodeError),
    #[error("invalid GitHub request: {0}")]
    InvalidRequest(String),
}

impl GitHubError {
    /// Kind of an HTTP-status failure; `None` for transport, decode and request-building errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Transient { .. } => Some(ErrorKind::Transient),
            Self::RateLimited { .. } => Some(ErrorKind::RateLimited),
            Self::NotFound { .. } => Some(ErrorKind::NotFound),
            Self::Fatal { .. } => Some(ErrorKind::Fatal),
            Self::Request(_)
            | Self::Decode(_)
            | Self::ContentDecode(_)
            | Self::InvalidRequest(_) => None,
        }
    }

    /// HTTP status code the API answered with, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. }
            | Self::RateLimited { status, .. }
            | Self::Fatal { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::ContentDecode(_) | Self::InvalidRequest(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type GitHubResult<T> = std::result::Result<T, GitHubError>;

#[derive(Debug, thiserror::Error)]
pub enum ReportsError {
    #[error("report not found: {0}")]
    ReportNotFound(String),
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error("failed to serialize reports index: {0}")]
    Serialization(serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("GitHub repository is not configured")]
    NotConfigured,
    #[error("failed to parse config file: {0}")]
    ConfigParse(dotenvy::Error),
    #[error("failed to write config file: {0}")]
    ConfigWrite(std::io::Error),
}

impl ReportsError {
    /// True for a report id missing from the index; transport 404s are not domain not-found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ReportNotFound(_))
    }
}

pub type ReportsResult<T> = std::result::Result<T, ReportsError>;
