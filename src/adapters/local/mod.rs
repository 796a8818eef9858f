//! Local adapters for monolith deployment.

pub mod events;
pub mod ffmpeg;
pub mod fs;
pub mod http;
pub mod memory;

pub use events::hub::EventHub;
pub use ffmpeg::FfmpegSlicer;
pub use fs::FsTransport;
pub use memory::InMemoryResults;
