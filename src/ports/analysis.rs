use crate::domain::analysis::{AnalysisRequest, AnalysisResult};
use crate::domain::errors::ClientError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Submit a match for analysis and wait for the per-player frame lists.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ClientError>;
}
