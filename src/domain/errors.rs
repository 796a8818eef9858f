//! Error taxonomy for the analysis pipeline.

use super::matches::MatchId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by `Coordinator::submit`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("match {match_id} is not eligible for analysis: {reason}")]
    InvalidMatch { match_id: MatchId, reason: String },

    #[error("analysis for match {0} is already in flight")]
    AlreadyInFlight(MatchId),

    #[error("{0} lane is closed")]
    QueueClosed(&'static str),
}

impl CoordinatorError {
    pub fn invalid(match_id: MatchId, reason: impl Into<String>) -> Self {
        Self::InvalidMatch {
            match_id,
            reason: reason.into(),
        }
    }
}

/// Errors produced by the analysis service client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("analysis service unreachable: {0}")]
    Unreachable(String),

    #[error("analysis service rejected the request ({status}): {body}")]
    RejectedByService { status: u16, body: String },

    #[error("malformed analysis response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("analysis service error ({status}): {body}")]
    ServiceError { status: u16, body: String },

    #[error("analysis gave up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<ClientError> },
}

impl ClientError {
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Connection failures and 5xx answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Unreachable(_) | ClientError::ServiceError { .. }
        )
    }
}

/// Errors produced while resolving a remote video to a local file.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("video {0} was not found")]
    RemoteNotFound(String),

    #[error("video {reference} could not be fetched: {reason}")]
    RemoteUnreachable { reference: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    LocalWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn unreachable(reference: impl Into<String>, reason: impl ToString) -> Self {
        Self::RemoteUnreachable {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalWriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// Errors produced by the clip slicer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SliceError {
    #[error("cannot read source video {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("cannot write clip {}: {reason}", path.display())]
    OutputWriteFailed { path: PathBuf, reason: String },

    #[error("none of the requested frames fall inside {}", path.display())]
    EmptySelection { path: PathBuf },
}

impl SliceError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OutputWriteFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure reported by the result persistence collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("result sink failed: {0}")]
pub struct SinkError(pub String);

/// Outcome delivered to a completion callback when a job never finished.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("worker running job {job_id} was lost")]
    WorkerLost { job_id: String },

    #[error("job {job_id} was abandoned when its lane shut down")]
    Abandoned { job_id: String },
}

/// Terminal failures after the analysis result came back.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Slice(#[from] SliceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("{0} lane is closed")]
    QueueClosed(&'static str),
}
