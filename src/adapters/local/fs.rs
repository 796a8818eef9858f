use crate::domain::errors::FetchError;
use crate::ports::transport::VideoTransport;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;

/// Copies videos that already sit on this machine (`file://` links or plain paths).
#[derive(Clone, Copy, Debug, Default)]
pub struct FsTransport;

impl FsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VideoTransport for FsTransport {
    async fn download(&self, reference: &str, destination: &Path) -> Result<(), FetchError> {
        let source = Path::new(reference.strip_prefix("file://").unwrap_or(reference));

        if source != destination {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| FetchError::write_failed(parent, e))?;
            }
            tokio::fs::copy(source, destination)
                .await
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound if !source.exists() => {
                        FetchError::RemoteNotFound(reference.to_string())
                    }
                    _ => FetchError::write_failed(destination, e),
                })?;
        }
        Ok(())
    }
}
