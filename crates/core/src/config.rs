//! Admin configuration.
//!
//! Repository credentials live in a `.env`-style file next to the admin server so that they can be
//! entered once through the UI or CLI and survive restarts. [`ConfigStore`] owns that file.
//!
//! The GitHub client never reads the file or the process environment itself. Callers resolve a
//! [`GitHubConfig`] once and pass it into the client constructor.

use crate::constants::{
    CONFIG_KEY_API_URL, CONFIG_KEY_OWNER, CONFIG_KEY_PORT, CONFIG_KEY_REPO, CONFIG_KEY_TOKEN,
    DEFAULT_API_BASE_URL, DEFAULT_PORT,
};
use crate::{ReportsError, ReportsResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Immutable connection settings for a single GitHub repository.
#[derive(Clone, PartialEq, Eq)]
pub struct GitHubConfig {
    owner: String,
    repo: String,
    token: String,
    api_base_url: String,
}

impl GitHubConfig {
    /// Create a new `GitHubConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ReportsError::InvalidInput` if owner, repo or token is blank.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
        api_base_url: Option<String>,
    ) -> ReportsResult<Self> {
        let owner = owner.into().trim().to_string();
        let repo = repo.into().trim().to_string();
        let token = token.into().trim().to_string();

        for (name, value) in [("owner", &owner), ("repo", &repo), ("token", &token)] {
            if value.is_empty() {
                return Err(ReportsError::InvalidInput(format!("{name} cannot be empty")));
            }
        }

        let api_base_url = api_base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            owner,
            repo,
            token,
            api_base_url,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// `/repos/<owner>/<repo>` prefix shared by every endpoint.
    pub fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}

// The token must never end up in logs.
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Values read from the config file. Any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub port: u16,
    pub api_base_url: Option<String>,
}

impl AdminConfig {
    /// Resolve the client configuration, or `None` when owner, repo or token is missing.
    pub fn github_config(&self) -> Option<GitHubConfig> {
        let (owner, repo, token) = (self.owner.as_ref()?, self.repo.as_ref()?, self.token.as_ref()?);
        GitHubConfig::new(owner, repo, token, self.api_base_url.clone()).ok()
    }

    pub fn is_complete(&self) -> bool {
        self.github_config().is_some()
    }
}

/// Partial update applied by [`ConfigStore::update_config`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub port: Option<u16>,
}

/// Reads and writes the admin config file.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_config(&self) -> bool {
        self.path.is_file()
    }

    /// Read every non-empty `KEY=value` pair from the config file.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ReportsError::ConfigParse` if the file exists but cannot be read or parsed.
    pub fn read_config(&self) -> ReportsResult<Option<HashMap<String, String>>> {
        if !self.has_config() {
            return Ok(None);
        }

        let iter = dotenvy::from_path_iter(&self.path).map_err(ReportsError::ConfigParse)?;
        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(ReportsError::ConfigParse)?;
            if !key.is_empty() && !value.is_empty() {
                values.insert(key, value);
            }
        }

        Ok(Some(values))
    }

    /// Read the config file into an [`AdminConfig`].
    ///
    /// An unparsable `PORT` falls back to the default port.
    pub fn get_config(&self) -> ReportsResult<Option<AdminConfig>> {
        let Some(mut values) = self.read_config()? else {
            return Ok(None);
        };

        let port = match values.remove(CONFIG_KEY_PORT) {
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("invalid {CONFIG_KEY_PORT} value {raw:?}, using {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Ok(Some(AdminConfig {
            owner: values.remove(CONFIG_KEY_OWNER),
            repo: values.remove(CONFIG_KEY_REPO),
            token: values.remove(CONFIG_KEY_TOKEN),
            port,
            api_base_url: values.remove(CONFIG_KEY_API_URL),
        }))
    }

    /// True when the file exists and names an owner, a repo and a token.
    pub fn is_config_valid(&self) -> bool {
        matches!(self.get_config(), Ok(Some(cfg)) if cfg.is_complete())
    }

    /// Overwrite the config file with the given credentials.
    ///
    /// A `GITHUB_API_URL` already present in the file is carried over.
    pub fn save_config(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        port: Option<u16>,
    ) -> ReportsResult<()> {
        let api_base_url = self
            .get_config()
            .ok()
            .flatten()
            .and_then(|cfg| cfg.api_base_url);
        self.write(owner, repo, token, port.unwrap_or(DEFAULT_PORT), api_base_url.as_deref())
    }

    /// Apply a partial update on top of the current file contents.
    pub fn update_config(&self, update: ConfigUpdate) -> ReportsResult<()> {
        let current = self.get_config()?.unwrap_or_default();
        let pick = |new: Option<String>, old: Option<String>| {
            new.filter(|v| !v.trim().is_empty())
                .or(old)
                .unwrap_or_default()
        };

        let owner = pick(update.owner, current.owner);
        let repo = pick(update.repo, current.repo);
        let token = pick(update.token, current.token);
        let port = update.port.unwrap_or(if current.port == 0 {
            DEFAULT_PORT
        } else {
            current.port
        });

        self.write(&owner, &repo, &token, port, current.api_base_url.as_deref())
    }

    fn write(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        port: u16,
        api_base_url: Option<&str>,
    ) -> ReportsResult<()> {
        let mut content = format!(
            "# GitHub configuration\n\
             # This file contains credentials. Do not commit it.\n\
             \n\
             # GitHub user or organisation\n\
             {CONFIG_KEY_OWNER}={owner}\n\
             \n\
             # Repository name\n\
             {CONFIG_KEY_REPO}={repo}\n\
             \n\
             # Personal access token\n\
             {CONFIG_KEY_TOKEN}={token}\n\
             \n\
             # Admin server port\n\
             {CONFIG_KEY_PORT}={port}\n"
        );

        if let Some(url) = api_base_url {
            content.push_str(&format!("\n# GitHub API base URL\n{CONFIG_KEY_API_URL}={url}\n"));
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ReportsError::ConfigWrite)?;
        }
        fs::write(&self.path, content).map_err(ReportsError::ConfigWrite)
    }
}
