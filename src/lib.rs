//! Faceoff - Match video analysis and per-player clip extraction
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (matches, analysis wire types, windows, av)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations
//! - application/: Lease table, job lanes, video cache and coordinator
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use adapters::local::{events, EventHub};
pub use application::coordinator::Coordinator;
pub use config::{MockServiceConfig, PipelineConfig};
pub use domain::av;
