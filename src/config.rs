//! Configuration for the pipeline and the mock analysis service.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Configuration of the monolith.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Root URL of the analysis service
    pub analysis_base_url: String,
    /// Opaque token forwarded with every analysis request
    pub analysis_auth_token: String,
    /// Upper bound for one analysis attempt
    pub analysis_timeout: Duration,
    pub analysis_max_attempts: u32,
    /// Delay before the first retry, doubled for each following one
    pub analysis_backoff: Duration,
    pub analysis_workers: usize,
    pub slicing_workers: usize,
    /// Where fetched match videos are kept
    pub video_cache_dir: PathBuf,
    /// Where player clips are written
    pub clips_dir: PathBuf,
    /// Frames per detected appearance
    pub clip_window_frames: u64,
    /// Clip frame rate when the source does not report one
    pub clip_fallback_fps: u32,
    /// A running analysis lease not renewed for this long counts as released.
    /// Never shorter than the retry budget of one analysis.
    pub lease_ttl: Duration,
    /// Match events buffered per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            analysis_base_url: env::var("ANALYSIS_BASE_URL")
                .unwrap_or_else(|_| String::from("http://127.0.0.1:8000/")),
            analysis_auth_token: env::var("ANALYSIS_AUTH_TOKEN").unwrap_or_default(),
            analysis_timeout: Duration::from_secs(env_or("ANALYSIS_TIMEOUT_SECS", 1800)),
            analysis_max_attempts: env_or("ANALYSIS_MAX_ATTEMPTS", 3),
            analysis_backoff: Duration::from_millis(env_or("ANALYSIS_BACKOFF_MS", 1000)),
            analysis_workers: env_or("ANALYSIS_WORKERS", 2),
            slicing_workers: env_or("SLICING_WORKERS", 4),
            video_cache_dir: PathBuf::from(
                env::var("VIDEO_CACHE_DIR").unwrap_or_else(|_| String::from("./cache/videos")),
            ),
            clips_dir: PathBuf::from(
                env::var("CLIPS_DIR").unwrap_or_else(|_| String::from("./clips")),
            ),
            clip_window_frames: env_or("CLIP_WINDOW_FRAMES", 5),
            clip_fallback_fps: env_or("CLIP_FALLBACK_FPS", 25),
            lease_ttl: Duration::from_secs(env_or("LEASE_TTL_SECS", 7200)),
            event_capacity: env_or("EVENT_CAPACITY", DEFAULT_EVENT_CAPACITY),
        }
    }
}

/// Configuration of the mock analysis service.
#[derive(Clone, Debug)]
pub struct MockServiceConfig {
    pub addr: String,
    pub port: String,
    /// How long `/process` pretends to work
    pub delay: Duration,
    pub frames_per_player: usize,
    pub min_frame: u64,
    pub max_frame: u64,
}

impl MockServiceConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("MOCK_ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("MOCK_PORT").unwrap_or_else(|_| String::from("8000")),
            delay: Duration::from_secs(env_or("MOCK_DELAY_SECS", 5)),
            frames_per_player: env_or("MOCK_FRAMES_PER_PLAYER", 10),
            min_frame: env_or("MOCK_MIN_FRAME", 0),
            max_frame: env_or("MOCK_MAX_FRAME", 1000),
        }
    }
}

/// Parse `key`, falling back to `default` when unset or unparseable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            default
        }),
        Err(_) => default,
    }
}
