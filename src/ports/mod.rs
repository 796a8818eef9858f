//! Ports - Trait definitions for the pipeline's collaborators.

pub mod analysis;
pub mod results;
pub mod slicer;
pub mod submission;
pub mod transport;
