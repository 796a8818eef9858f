//! Audio/Video domain modules (ffmpeg-backed).

pub mod clips;
pub mod probe;

#[cfg(test)]
pub(crate) mod fixtures;
