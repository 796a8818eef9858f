use crate::domain::errors::FetchError;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoTransport: Send + Sync {
    /// Copy the video named by `reference` into `destination`.
    ///
    /// The destination is a scratch path; callers decide when it becomes visible.
    async fn download(&self, reference: &str, destination: &Path) -> Result<(), FetchError>;
}
