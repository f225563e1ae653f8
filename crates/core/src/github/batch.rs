//! Multi-file commits through the git database API.
//!
//! The contents API writes one file per commit. Writing a report and the index that lists it
//! must land together, so [`BatchCommit`] builds the commit by hand:
//!
//! ```text
//! Pending ─read_head─▶ HeadRead ─read_base_tree─▶ TreeRead ─write_blobs─▶ BlobsWritten
//!     ─write_tree─▶ TreeWritten ─write_commit─▶ CommitWritten ─update_ref─▶ RefUpdated
//! ```
//!
//! Each transition consumes the previous state and needs the previous response, so the calls
//! cannot be reordered or skipped. The branch only moves at `update_ref`. A failure before that
//! leaves unreferenced blobs, trees or commits behind, which GitHub garbage-collects and which
//! are invisible from the branch, so no cleanup is attempted.

use super::types::{BatchFile, CommitInfo, RefResponse, ShaRef, TreeEntry};
use super::{GitHubClient, Transport};
use crate::constants::{BLOB_FILE_MODE, MAIN_BRANCH};
use crate::GitHubResult;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Method;
use serde_json::json;

// ============================================================================
// TYPE-STATE MARKERS
// ============================================================================

/// Nothing has been read yet.
#[derive(Clone, Debug)]
pub struct Pending;

/// The branch head commit is known.
#[derive(Clone, Debug)]
pub struct HeadRead {
    head_sha: String,
}

/// The head commit's tree is known.
#[derive(Clone, Debug)]
pub struct TreeRead {
    head_sha: String,
    base_tree_sha: String,
}

/// Every file has a blob and a tree entry.
#[derive(Clone, Debug)]
pub struct BlobsWritten {
    head_sha: String,
    base_tree_sha: String,
    entries: Vec<TreeEntry>,
}

/// The new tree exists.
#[derive(Clone, Debug)]
pub struct TreeWritten {
    head_sha: String,
    tree_sha: String,
}

/// The new commit exists but the branch does not point at it yet.
#[derive(Clone, Debug)]
pub struct CommitWritten {
    commit: CommitInfo,
}

/// The branch points at the new commit.
#[derive(Clone, Debug)]
pub struct RefUpdated {
    commit: CommitInfo,
}

// ============================================================================
// BATCH COMMIT
// ============================================================================

/// One in-flight multi-file commit against the main branch.
pub struct BatchCommit<'a, T, S> {
    client: &'a GitHubClient<T>,
    message: String,
    state: S,
}

impl<'a, T, S> BatchCommit<'a, T, S> {
    pub fn state(&self) -> &S {
        &self.state
    }

    fn advance<N>(self, state: N) -> BatchCommit<'a, T, N> {
        BatchCommit {
            client: self.client,
            message: self.message,
            state,
        }
    }
}

impl<'a, T: Transport> BatchCommit<'a, T, Pending> {
    pub fn start(client: &'a GitHubClient<T>, message: impl Into<String>) -> Self {
        Self {
            client,
            message: message.into(),
            state: Pending,
        }
    }

    pub async fn read_head(self) -> GitHubResult<BatchCommit<'a, T, HeadRead>> {
        let endpoint = format!(
            "{}/git/ref/heads/{MAIN_BRANCH}",
            self.client.config().repo_path()
        );
        let head: RefResponse = self.client.api_call(Method::GET, &endpoint, None).await?;

        Ok(self.advance(HeadRead {
            head_sha: head.object.sha,
        }))
    }
}

impl<'a, T: Transport> BatchCommit<'a, T, HeadRead> {
    pub fn head_sha(&self) -> &str {
        &self.state.head_sha
    }

    pub async fn read_base_tree(self) -> GitHubResult<BatchCommit<'a, T, TreeRead>> {
        let endpoint = format!(
            "{}/git/commits/{}",
            self.client.config().repo_path(),
            self.state.head_sha
        );
        let head_commit: CommitInfo = self.client.api_call(Method::GET, &endpoint, None).await?;

        let head_sha = self.state.head_sha.clone();
        Ok(self.advance(TreeRead {
            head_sha,
            base_tree_sha: head_commit.tree.sha,
        }))
    }
}

impl<'a, T: Transport> BatchCommit<'a, T, TreeRead> {
    pub fn base_tree_sha(&self) -> &str {
        &self.state.base_tree_sha
    }

    /// Upload one blob per file, strictly in input order.
    pub async fn write_blobs(
        self,
        files: &[BatchFile],
    ) -> GitHubResult<BatchCommit<'a, T, BlobsWritten>> {
        let endpoint = format!("{}/git/blobs", self.client.config().repo_path());
        let mut entries = Vec::with_capacity(files.len());

        for file in files {
            let body = if file.content.is_binary() {
                json!({
                    "content": general_purpose::STANDARD.encode(file.content.as_bytes()),
                    "encoding": "base64",
                })
            } else {
                json!({
                    "content": String::from_utf8_lossy(file.content.as_bytes()),
                    "encoding": "utf-8",
                })
            };

            let blob: ShaRef = self
                .client
                .api_call(Method::POST, &endpoint, Some(body))
                .await?;

            entries.push(TreeEntry {
                path: file.path.clone(),
                mode: BLOB_FILE_MODE,
                kind: "blob",
                sha: blob.sha,
            });
        }

        let TreeRead {
            head_sha,
            base_tree_sha,
        } = self.state.clone();
        Ok(self.advance(BlobsWritten {
            head_sha,
            base_tree_sha,
            entries,
        }))
    }
}

impl<'a, T: Transport> BatchCommit<'a, T, BlobsWritten> {
    pub fn entries(&self) -> &[TreeEntry] {
        &self.state.entries
    }

    /// Create a tree on top of the base tree; paths not listed are inherited unchanged.
    pub async fn write_tree(self) -> GitHubResult<BatchCommit<'a, T, TreeWritten>> {
        let endpoint = format!("{}/git/trees", self.client.config().repo_path());
        let body = json!({
            "base_tree": self.state.base_tree_sha,
            "tree": self.state.entries,
        });
        let tree: ShaRef = self
            .client
            .api_call(Method::POST, &endpoint, Some(body))
            .await?;

        let head_sha = self.state.head_sha.clone();
        Ok(self.advance(TreeWritten {
            head_sha,
            tree_sha: tree.sha,
        }))
    }
}

impl<'a, T: Transport> BatchCommit<'a, T, TreeWritten> {
    pub fn tree_sha(&self) -> &str {
        &self.state.tree_sha
    }

    /// Create a commit for the new tree whose only parent is the head read at the start.
    pub async fn write_commit(self) -> GitHubResult<BatchCommit<'a, T, CommitWritten>> {
        let endpoint = format!("{}/git/commits", self.client.config().repo_path());
        let body = json!({
            "message": self.message,
            "tree": self.state.tree_sha,
            "parents": [self.state.head_sha],
        });
        let commit: CommitInfo = self
            .client
            .api_call(Method::POST, &endpoint, Some(body))
            .await?;

        Ok(self.advance(CommitWritten { commit }))
    }
}

impl<'a, T: Transport> BatchCommit<'a, T, CommitWritten> {
    pub fn commit(&self) -> &CommitInfo {
        &self.state.commit
    }

    /// Fast-forward the branch to the new commit. GitHub rejects the update if the branch moved
    /// since `read_head`.
    pub async fn update_ref(self) -> GitHubResult<BatchCommit<'a, T, RefUpdated>> {
        let endpoint = format!(
            "{}/git/refs/heads/{MAIN_BRANCH}",
            self.client.config().repo_path()
        );
        let body = json!({ "sha": self.state.commit.sha, "force": false });
        let _: serde_json::Value = self
            .client
            .api_call(Method::PATCH, &endpoint, Some(body))
            .await?;

        let commit = self.state.commit.clone();
        Ok(self.advance(RefUpdated { commit }))
    }
}

impl<T> BatchCommit<'_, T, RefUpdated> {
    pub fn into_commit(self) -> CommitInfo {
        self.state.commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;
    use crate::github::BlobContent;
    use crate::testing::ScriptedTransport;
    use crate::ErrorKind;
    use serde_json::Value;

    const REPO: &str = "https://gh.test/repos/octo/site";

    fn client(transport: ScriptedTransport) -> GitHubClient<ScriptedTransport> {
        let cfg = GitHubConfig::new("octo", "site", "ghp_test", Some("https://gh.test".into()))
            .expect("config should be valid");
        GitHubClient::with_transport(cfg, transport)
    }

    fn body_of(request: &crate::github::ApiRequest) -> Value {
        serde_json::from_str(request.body.as_deref().expect("request should have a body"))
            .expect("body should be JSON")
    }

    fn script_happy_path(transport: &ScriptedTransport, blobs: usize) {
        transport.push_body(200, r#"{"object":{"sha":"head1","type":"commit"}}"#);
        transport.push_body(200, r#"{"sha":"head1","tree":{"sha":"base1"},"message":"prev"}"#);
        for i in 0..blobs {
            transport.push_body(201, &format!(r#"{{"sha":"blob{i}"}}"#));
        }
        transport.push_body(201, r#"{"sha":"tree2"}"#);
        transport.push_body(201, r#"{"sha":"commit2","tree":{"sha":"tree2"},"message":"msg"}"#);
        transport.push_body(200, r#"{"ref":"refs/heads/main","object":{"sha":"commit2"}}"#);
    }

    #[tokio::test]
    async fn read_head_reads_main_ref() {
        let transport = ScriptedTransport::new();
        transport.push_body(200, r#"{"object":{"sha":"head1"}}"#);
        let client = client(transport);

        let step = BatchCommit::start(&client, "msg").read_head().await.unwrap();

        assert_eq!(step.head_sha(), "head1");
        let requests = client.transport().requests();
        let req = &requests[0];
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.url, format!("{REPO}/git/ref/heads/main"));
    }

    #[tokio::test]
    async fn read_base_tree_uses_head_commit() {
        let transport = ScriptedTransport::new();
        transport.push_body(200, r#"{"sha":"head1","tree":{"sha":"base1"}}"#);
        let client = client(transport);
        let step = BatchCommit {
            client: &client,
            message: "msg".into(),
            state: HeadRead {
                head_sha: "head1".into(),
            },
        };

        let step = step.read_base_tree().await.unwrap();

        assert_eq!(step.base_tree_sha(), "base1");
        assert_eq!(
            client.transport().requests()[0].url,
            format!("{REPO}/git/commits/head1")
        );
    }

    #[tokio::test]
    async fn write_blobs_picks_encoding_per_file() {
        let transport = ScriptedTransport::new();
        transport.push_body(201, r#"{"sha":"b0"}"#);
        transport.push_body(201, r#"{"sha":"b1"}"#);
        transport.push_body(201, r#"{"sha":"b2"}"#);
        let client = client(transport);
        let step = BatchCommit {
            client: &client,
            message: "msg".into(),
            state: TreeRead {
                head_sha: "head1".into(),
                base_tree_sha: "base1".into(),
            },
        };
        let files = [
            BatchFile::new("reports/a.html", "<p>hi</p>"),
            BatchFile::new("data/raw.bin", "a\0b"),
            BatchFile::new("img/logo.png", vec![0x89u8, 0x50, 0x4e, 0x47]),
        ];

        let step = step.write_blobs(&files).await.unwrap();

        let requests = client.transport().requests();
        assert!(requests
            .iter()
            .all(|r| r.method == Method::POST && r.url == format!("{REPO}/git/blobs")));
        assert_eq!(
            body_of(&requests[0]),
            serde_json::json!({"content": "<p>hi</p>", "encoding": "utf-8"})
        );
        assert_eq!(body_of(&requests[1])["encoding"], "base64");
        assert_eq!(
            body_of(&requests[1])["content"],
            general_purpose::STANDARD.encode("a\0b")
        );
        assert_eq!(
            body_of(&requests[2])["content"],
            general_purpose::STANDARD.encode([0x89u8, 0x50, 0x4e, 0x47])
        );

        let shas: Vec<&str> = step.entries().iter().map(|e| e.sha.as_str()).collect();
        assert_eq!(shas, ["b0", "b1", "b2"]);
        assert!(step
            .entries()
            .iter()
            .all(|e| e.mode == "100644" && e.kind == "blob"));
        assert_eq!(step.entries()[2].path, "img/logo.png");
        assert!(BlobContent::from(vec![1u8]).is_binary());
    }

    #[tokio::test]
    async fn write_tree_builds_on_base_tree() {
        let transport = ScriptedTransport::new();
        transport.push_body(201, r#"{"sha":"tree2"}"#);
        let client = client(transport);
        let step = BatchCommit {
            client: &client,
            message: "msg".into(),
            state: BlobsWritten {
                head_sha: "head1".into(),
                base_tree_sha: "base1".into(),
                entries: vec![TreeEntry {
                    path: "reports/a.html".into(),
                    mode: BLOB_FILE_MODE,
                    kind: "blob",
                    sha: "b0".into(),
                }],
            },
        };

        let step = step.write_tree().await.unwrap();

        assert_eq!(step.tree_sha(), "tree2");
        let body = body_of(&client.transport().requests()[0]);
        assert_eq!(body["base_tree"], "base1");
        assert_eq!(body["tree"][0]["path"], "reports/a.html");
        assert_eq!(body["tree"][0]["type"], "blob");
    }

    #[tokio::test]
    async fn write_commit_has_head_as_sole_parent() {
        let transport = ScriptedTransport::new();
        transport.push_body(201, r#"{"sha":"commit2","tree":{"sha":"tree2"}}"#);
        let client = client(transport);
        let step = BatchCommit {
            client: &client,
            message: "Create report: Q3".into(),
            state: TreeWritten {
                head_sha: "head1".into(),
                tree_sha: "tree2".into(),
            },
        };

        let step = step.write_commit().await.unwrap();

        assert_eq!(step.commit().sha, "commit2");
        let body = body_of(&client.transport().requests()[0]);
        assert_eq!(
            body,
            serde_json::json!({"message": "Create report: Q3", "tree": "tree2", "parents": ["head1"]})
        );
    }

    #[tokio::test]
    async fn update_ref_patches_without_force() {
        let transport = ScriptedTransport::new();
        transport.push_body(200, r#"{"object":{"sha":"commit2"}}"#);
        let client = client(transport);
        let step = BatchCommit {
            client: &client,
            message: "msg".into(),
            state: CommitWritten {
                commit: CommitInfo {
                    sha: "commit2".into(),
                    tree: ShaRef { sha: "tree2".into() },
                    message: "msg".into(),
                },
            },
        };

        let commit = step.update_ref().await.unwrap().into_commit();

        assert_eq!(commit.sha, "commit2");
        let requests = client.transport().requests();
        let req = &requests[0];
        assert_eq!(req.method, Method::PATCH);
        assert_eq!(req.url, format!("{REPO}/git/refs/heads/main"));
        assert_eq!(
            body_of(req),
            serde_json::json!({"sha": "commit2", "force": false})
        );
    }

    #[tokio::test]
    async fn batch_commit_runs_every_step_in_order() {
        let transport = ScriptedTransport::new();
        script_happy_path(&transport, 2);
        let client = client(transport);
        let files = [
            BatchFile::new("reports/report-1.html", "<html></html>"),
            BatchFile::new("data/reports-index.json", "{}"),
        ];

        let commit = client.batch_commit(&files, "Create report: X").await.unwrap();

        assert_eq!(commit.sha, "commit2");
        let calls: Vec<(Method, String)> = client
            .transport()
            .requests()
            .into_iter()
            .map(|r| (r.method, r.url.trim_start_matches(REPO).to_string()))
            .collect();
        assert_eq!(
            calls,
            vec![
                (Method::GET, "/git/ref/heads/main".to_string()),
                (Method::GET, "/git/commits/head1".to_string()),
                (Method::POST, "/git/blobs".to_string()),
                (Method::POST, "/git/blobs".to_string()),
                (Method::POST, "/git/trees".to_string()),
                (Method::POST, "/git/commits".to_string()),
                (Method::PATCH, "/git/refs/heads/main".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failure_before_ref_update_stops_the_sequence() {
        let transport = ScriptedTransport::new();
        transport.push_body(200, r#"{"object":{"sha":"head1"}}"#);
        transport.push_body(200, r#"{"sha":"head1","tree":{"sha":"base1"}}"#);
        transport.push_body(201, r#"{"sha":"blob0"}"#);
        transport.push_body(422, r#"{"message":"tree.sha is invalid"}"#);
        let client = client(transport);
        let files = [BatchFile::new("reports/a.html", "<p></p>")];

        let err = client.batch_commit(&files, "msg").await.unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Fatal));
        let requests = client.transport().requests();
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().all(|r| r.method != Method::PATCH));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_without_network_calls() {
        let client = client(ScriptedTransport::new());

        let err = client.batch_commit(&[], "msg").await.unwrap_err();

        assert!(matches!(err, crate::GitHubError::InvalidRequest(_)));
        assert!(client.transport().requests().is_empty());
    }
}
