//! HTTP client for the external video-analysis service.

use super::retry::RetryPolicy;
use crate::domain::analysis::{AnalysisRequest, AnalysisResult, CleanReport, ServiceStatus};
use crate::domain::errors::ClientError;
use crate::ports::analysis::AnalysisService;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct AnalysisClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl AnalysisClient {
    /// `timeout` bounds a single attempt; analyses of a full match take minutes.
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn attempt(&self, request: &AnalysisRequest, attempt: u32) -> Result<AnalysisResult, ClientError> {
        tracing::debug!(match_id = request.match_id, attempt, "posting analysis request");
        let response = self
            .http
            .post(self.url("process"))
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        let raw = read_body(response).await?;
        AnalysisResult::parse(&raw).inspect_err(|_| {
            tracing::error!(match_id = request.match_id, raw = %raw, "malformed analysis response");
        })
    }

    /// Health probe of the service.
    pub async fn status(&self) -> Result<ServiceStatus, ClientError> {
        let response = self
            .http
            .get(self.url("status"))
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        decode(&read_body(response).await?)
    }

    /// Ask the service to drop its temporary files.
    pub async fn clean(&self) -> Result<CleanReport, ClientError> {
        let response = self
            .http
            .post(self.url("clean"))
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        decode(&read_body(response).await?)
    }
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ClientError> {
        self.retry
            .run("analyze", |attempt| self.attempt(request, attempt))
            .await
    }
}

/// Body of a successful answer; 4xx is a rejection, 5xx a service error.
async fn read_body(response: Response) -> Result<String, ClientError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::Unreachable(e.to_string()))?;

    if status.is_success() {
        Ok(body)
    } else if status.is_server_error() {
        Err(ClientError::ServiceError {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(ClientError::RejectedByService {
            status: status.as_u16(),
            body,
        })
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, ClientError> {
    serde_json::from_str(raw).map_err(|e| ClientError::malformed(e.to_string(), raw))
}
