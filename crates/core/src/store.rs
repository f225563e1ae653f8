//! Repository storage seam used by the reports manager.
//!
//! [`GitHubClient`] is the production implementation. Tests and the REST integration suite use
//! `testing::MemoryStore` instead.

use crate::github::{
    BatchFile, CommitInfo, FileCommit, FileContent, GitHubClient, RepoInfo, Transport,
};
use crate::GitHubResult;
use async_trait::async_trait;

#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn repo_info(&self) -> GitHubResult<RepoInfo>;

    /// `Ok(None)` when the file does not exist.
    async fn get_file_content(&self, path: &str) -> GitHubResult<Option<FileContent>>;

    async fn create_or_update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> GitHubResult<FileCommit>;

    async fn delete_file(&self, path: &str, sha: &str, message: &str) -> GitHubResult<FileCommit>;

    /// Write every file in one commit; either all of them land or none do.
    async fn batch_commit(&self, files: &[BatchFile], message: &str) -> GitHubResult<CommitInfo>;
}

#[async_trait]
impl<T: Transport> RepoStore for GitHubClient<T> {
    async fn repo_info(&self) -> GitHubResult<RepoInfo> {
        self.get_repo_info().await
    }

    async fn get_file_content(&self, path: &str) -> GitHubResult<Option<FileContent>> {
        GitHubClient::get_file_content(self, path).await
    }

    async fn create_or_update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> GitHubResult<FileCommit> {
        GitHubClient::create_or_update_file(self, path, content, message, sha).await
    }

    async fn delete_file(&self, path: &str, sha: &str, message: &str) -> GitHubResult<FileCommit> {
        GitHubClient::delete_file(self, path, sha, message).await
    }

    async fn batch_commit(&self, files: &[BatchFile], message: &str) -> GitHubResult<CommitInfo> {
        GitHubClient::batch_commit(self, files, message).await
    }
}
