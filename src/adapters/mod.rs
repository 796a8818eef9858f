//! Adapters - Concrete implementations of ports.

pub mod local;
pub mod mock_service;
pub mod remote;
