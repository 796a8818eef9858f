//! Download-by-link transports for match videos.

use crate::adapters::local::fs::FsTransport;
use crate::domain::errors::FetchError;
use crate::ports::transport::VideoTransport;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

/// Streams `http(s)://` references straight to disk.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let http = Client::builder()
            .build()
            .map_err(|e| FetchError::unreachable("http client", e))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl VideoTransport for HttpTransport {
    async fn download(&self, reference: &str, destination: &Path) -> Result<(), FetchError> {
        let response = self
            .http
            .get(reference)
            .send()
            .await
            .map_err(|e| FetchError::unreachable(reference, e))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(FetchError::RemoteNotFound(reference.to_string()))
            }
            status if !status.is_success() => {
                return Err(FetchError::unreachable(
                    reference,
                    format!("server answered {}", status),
                ))
            }
            _ => {}
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let body_reader = StreamReader::new(stream);
        tokio::pin!(body_reader);

        let file = File::create(destination)
            .await
            .map_err(|e| FetchError::write_failed(destination, e))?;
        let mut file_writer = BufWriter::new(file);

        let copied = tokio::io::copy(&mut body_reader, &mut file_writer)
            .await
            .map_err(|e| classify(reference, destination, e))?;
        file_writer
            .flush()
            .await
            .map_err(|e| FetchError::write_failed(destination, e))?;

        tracing::debug!(reference, bytes = copied, "video downloaded");
        Ok(())
    }
}

/// Errors raised by the body stream are transfer failures; anything else is the disk.
fn classify(reference: &str, destination: &Path, e: std::io::Error) -> FetchError {
    let from_network = e
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>());
    if from_network {
        FetchError::unreachable(reference, e)
    } else {
        FetchError::write_failed(destination, e)
    }
}

/// Picks the transport from the reference's scheme: HTTP for `http(s)://`,
/// the local filesystem for `file://` and bare paths.
#[derive(Clone)]
pub struct SchemeTransport {
    http: HttpTransport,
    fs: FsTransport,
}

impl SchemeTransport {
    pub fn new(http: HttpTransport, fs: FsTransport) -> Self {
        Self { http, fs }
    }
}

#[async_trait]
impl VideoTransport for SchemeTransport {
    async fn download(&self, reference: &str, destination: &Path) -> Result<(), FetchError> {
        let lowered = reference.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            self.http.download(reference, destination).await
        } else {
            self.fs.download(reference, destination).await
        }
    }
}
