//! In-memory stand-ins for GitHub.
//!
//! [`ScriptedTransport`] replays canned HTTP responses to a real [`GitHubClient`] and records
//! what it was sent. [`MemoryStore`] replaces the whole client behind [`RepoStore`] with a map of
//! files, including GitHub's SHA checks on update and delete.
//!
//! [`GitHubClient`]: crate::github::GitHubClient

use crate::github::{
    ApiRequest, ApiResponse, BatchFile, CommitInfo, FileCommit, FileContent, RepoInfo, ShaRef,
    Transport,
};
use crate::store::RepoStore;
use crate::{GitHubError, GitHubResult};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SCRIPTED TRANSPORT
// ============================================================================

/// Transport that answers requests from a queue, in order.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ApiResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ApiResponse) {
        lock(&self.responses).push_back(response);
    }

    /// Queue a response with no headers.
    pub fn push_body(&self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.push(ApiResponse {
            status,
            headers: HeaderMap::new(),
            body: body.to_string(),
        });
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> GitHubResult<ApiResponse> {
        lock(&self.requests).push(request.clone());
        lock(&self.responses).pop_front().ok_or_else(|| {
            GitHubError::InvalidRequest(format!(
                "no scripted response left for {} {}",
                request.method, request.url
            ))
        })
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// A write the store accepted, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreWrite {
    Put { path: String, message: String },
    Delete { path: String, message: String },
    Batch { paths: Vec<String>, message: String },
}

#[derive(Debug, Default)]
struct StoreState {
    files: BTreeMap<String, (String, String)>,
    writes: Vec<StoreWrite>,
    next_id: u64,
    fail_next_write: Option<GitHubError>,
}

impl StoreState {
    fn next_sha(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:040x}", self.next_id)
    }
}

/// Repository held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    info: RepoInfo,
    state: Mutex<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            info: RepoInfo {
                name: "reports".into(),
                full_name: "octo/reports".into(),
                private: false,
                default_branch: "main".into(),
            },
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Seed a file without recording a write. Returns its SHA.
    pub fn insert(&self, path: &str, content: &str) -> String {
        let mut state = lock(&self.state);
        let sha = state.next_sha("");
        state
            .files
            .insert(path.to_string(), (content.to_string(), sha.clone()));
        sha
    }

    pub fn remove(&self, path: &str) {
        lock(&self.state).files.remove(path);
    }

    pub fn content(&self, path: &str) -> Option<String> {
        lock(&self.state).files.get(path).map(|(c, _)| c.clone())
    }

    pub fn sha(&self, path: &str) -> Option<String> {
        lock(&self.state).files.get(path).map(|(_, s)| s.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.state).files.keys().cloned().collect()
    }

    pub fn writes(&self) -> Vec<StoreWrite> {
        lock(&self.state).writes.clone()
    }

    /// Make the next write (put, delete or batch) fail with `err` and change nothing.
    pub fn fail_next_write(&self, err: GitHubError) {
        lock(&self.state).fail_next_write = Some(err);
    }

    fn conflict(message: String) -> GitHubError {
        GitHubError::Fatal {
            status: 409,
            body: message,
        }
    }
}

#[async_trait]
impl RepoStore for MemoryStore {
    async fn repo_info(&self) -> GitHubResult<RepoInfo> {
        Ok(self.info.clone())
    }

    async fn get_file_content(&self, path: &str) -> GitHubResult<Option<FileContent>> {
        let state = lock(&self.state);
        Ok(state.files.get(path).map(|(content, sha)| FileContent {
            content: content.clone(),
            sha: sha.clone(),
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
        }))
    }

    async fn create_or_update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> GitHubResult<FileCommit> {
        let mut state = lock(&self.state);
        if let Some(err) = state.fail_next_write.take() {
            return Err(err);
        }

        let current = state.files.get(path).map(|(_, s)| s.clone());
        match (current.as_deref(), sha) {
            (Some(_), None) => {
                return Err(GitHubError::Fatal {
                    status: 422,
                    body: format!("\"sha\" wasn't supplied for {path}"),
                })
            }
            (Some(current), Some(given)) if current != given => {
                return Err(Self::conflict(format!("{path} does not match {given}")))
            }
            (None, Some(given)) => {
                return Err(Self::conflict(format!("{path} does not match {given}")))
            }
            _ => {}
        }

        let new_sha = state.next_sha("");
        let commit_sha = state.next_sha("c");
        state
            .files
            .insert(path.to_string(), (content.to_string(), new_sha.clone()));
        state.writes.push(StoreWrite::Put {
            path: path.to_string(),
            message: message.to_string(),
        });

        Ok(FileCommit {
            content: Some(ShaRef { sha: new_sha }),
            commit: Some(ShaRef { sha: commit_sha }),
        })
    }

    async fn delete_file(&self, path: &str, sha: &str, message: &str) -> GitHubResult<FileCommit> {
        let mut state = lock(&self.state);
        if let Some(err) = state.fail_next_write.take() {
            return Err(err);
        }

        match state.files.get(path) {
            None => {
                return Err(GitHubError::NotFound {
                    body: format!("{path} not found"),
                })
            }
            Some((_, current)) if current != sha => {
                return Err(Self::conflict(format!("{path} does not match {sha}")))
            }
            Some(_) => {}
        }

        state.files.remove(path);
        let commit_sha = state.next_sha("c");
        state.writes.push(StoreWrite::Delete {
            path: path.to_string(),
            message: message.to_string(),
        });

        Ok(FileCommit {
            content: None,
            commit: Some(ShaRef { sha: commit_sha }),
        })
    }

    async fn batch_commit(&self, files: &[BatchFile], message: &str) -> GitHubResult<CommitInfo> {
        let mut state = lock(&self.state);
        if files.is_empty() {
            return Err(GitHubError::InvalidRequest(
                "batch commit needs at least one file".into(),
            ));
        }
        if let Some(err) = state.fail_next_write.take() {
            return Err(err);
        }

        for file in files {
            let sha = state.next_sha("");
            let content = String::from_utf8_lossy(file.content.as_bytes()).into_owned();
            state.files.insert(file.path.clone(), (content, sha));
        }
        let tree_sha = state.next_sha("t");
        let commit_sha = state.next_sha("c");
        state.writes.push(StoreWrite::Batch {
            paths: files.iter().map(|f| f.path.clone()).collect(),
            message: message.to_string(),
        });

        Ok(CommitInfo {
            sha: commit_sha,
            tree: ShaRef { sha: tree_sha },
            message: message.to_string(),
        })
    }
}
