//! Adapters that talk to other machines.

pub mod analysis;
pub mod download;
pub mod retry;

pub use analysis::AnalysisClient;
pub use download::{HttpTransport, SchemeTransport};
pub use retry::RetryPolicy;
