//! Local cache of remote match videos.
//!
//! A reference always maps to the same file under the cache root. Only one
//! download per reference runs at a time; concurrent callers wait for it and
//! then reuse the file.

use crate::domain::errors::FetchError;
use crate::ports::transport::VideoTransport;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "mp4";

static EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/[^/?#]*\.([A-Za-z0-9]{1,5})(?:[?#]|$)").expect("valid extension regex")
});

pub struct VideoCache<T> {
    root: PathBuf,
    transport: T,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<T: VideoTransport> VideoCache<T> {
    pub fn new(root: impl Into<PathBuf>, transport: T) -> Self {
        Self {
            root: root.into(),
            transport,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the video for `reference` lives once fetched.
    pub fn local_path_for(&self, reference: &str) -> PathBuf {
        let digest = Sha256::digest(reference.as_bytes());
        self.root
            .join(format!("{:x}.{}", digest, extension_of(reference)))
    }

    /// Resolve `reference` to an intact local file, downloading it if needed.
    pub async fn fetch(&self, reference: &str) -> Result<PathBuf, FetchError> {
        let target = self.local_path_for(reference);
        if is_intact(&target).await {
            tracing::debug!(reference, path = %target.display(), "video cache hit");
            return Ok(target);
        }

        let gate = self.gate_for(reference);
        let result = {
            let _held = gate.lock().await;
            if is_intact(&target).await {
                tracing::debug!(reference, "video fetched by a concurrent caller");
                Ok(target)
            } else {
                self.download(reference, &target).await.map(|_| target)
            }
        };
        drop(gate);
        self.forget_gate(reference);
        result
    }

    async fn download(&self, reference: &str, target: &Path) -> Result<(), FetchError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| FetchError::write_failed(&self.root, e))?;

        let part = self.root.join(format!(".{}.part", Uuid::new_v4()));
        tracing::info!(reference, path = %target.display(), "fetching video");

        let result = async {
            self.transport.download(reference, &part).await?;
            if !is_intact(&part).await {
                return Err(FetchError::unreachable(
                    reference,
                    "transfer produced an empty file",
                ));
            }
            tokio::fs::rename(&part, target)
                .await
                .map_err(|e| FetchError::write_failed(target, e))
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!(reference, "video fetch failed: {}", e);
            let _ = tokio::fs::remove_file(&part).await;
        }
        result
    }

    fn gate_for(&self, reference: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.entry(reference.to_string()).or_default().clone()
    }

    fn forget_gate(&self, reference: &str) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(reference)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            in_flight.remove(reference);
        }
    }
}

fn extension_of(reference: &str) -> String {
    EXTENSION
        .captures(reference)
        .and_then(|captures| captures.get(1))
        .map(|ext| ext.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Present, a regular non-empty file, and readable.
async fn is_intact(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => tokio::fs::File::open(path).await.is_ok(),
        _ => false,
    }
}
