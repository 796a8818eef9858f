//! Application layer - Orchestration services built on the ports.

pub mod coordinator;
pub mod fetch_cache;
pub mod lease;
pub mod queue;
pub mod worker;
