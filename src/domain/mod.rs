//! Domain layer - Pure business logic.

pub mod analysis;
pub mod av;
pub mod errors;
pub mod jobs;
pub mod matches;
pub mod windows;
