//! Constants used throughout the reports core crate.
//!
//! Repository paths, branch names and config keys live here so the GitHub client, the reports
//! manager and the config store agree on them.

/// Default GitHub REST API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Branch every read and write targets.
pub const MAIN_BRANCH: &str = "main";

/// Repository path of the JSON reports index.
pub const REPORTS_INDEX_PATH: &str = "data/reports-index.json";

/// Repository directory holding one HTML file per report.
pub const REPORTS_DIR: &str = "reports";

/// Version string written into freshly created indexes.
pub const INDEX_VERSION: &str = "1.0";

/// Title used when a report is created without one.
pub const DEFAULT_REPORT_TITLE: &str = "Untitled";

/// Prefix of generated report identifiers (`report-<unix millis>`).
pub const REPORT_ID_PREFIX: &str = "report-";

/// Git file mode for regular, non-executable blobs.
pub const BLOB_FILE_MODE: &str = "100644";

/// Default port for the admin server when the config file does not set one.
pub const DEFAULT_PORT: u16 = 3030;

/// Default location of the admin config file.
pub const DEFAULT_CONFIG_PATH: &str = ".env";

pub const CONFIG_KEY_OWNER: &str = "GITHUB_OWNER";
pub const CONFIG_KEY_REPO: &str = "GITHUB_REPO";
pub const CONFIG_KEY_TOKEN: &str = "GITHUB_TOKEN";
pub const CONFIG_KEY_PORT: &str = "PORT";
pub const CONFIG_KEY_API_URL: &str = "GITHUB_API_URL";

/// GitHub REST API version pinned on every request.
pub const GITHUB_API_VERSION: &str = "2022-11-28";
