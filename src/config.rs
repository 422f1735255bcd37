//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the submission
//! policy constants shared by the intake validator and the job pipeline.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Root directory for per-user working directories
    pub user_dir: String,

    /// Interpreter used to launch the transformation script
    pub transform_runtime: String,

    /// Path to the transformation runner script
    pub transform_script: String,

    /// ffprobe binary used to measure video durations
    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: String,

    /// Execution provider passed to the transformation runner
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,

    /// Frame processor passed to the transformation runner
    #[serde(default = "default_frame_processor")]
    pub frame_processor: String,
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

fn default_execution_provider() -> String {
    "cuda".to_string()
}

fn default_frame_processor() -> String {
    "face_swapper".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Settings from environment variables directly
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}

// Submission policy
/// Maximum number of jobs a user may submit before being blocked
pub const USAGE_QUOTA: i64 = 5;
/// Size ceiling for uncompressed image documents (first or second input)
pub const MAX_IMAGE_DOC_BYTES: u64 = 5 * 1024 * 1024;
/// Size ceiling for video inputs
pub const MAX_VIDEO_BYTES: u64 = 200 * 1024 * 1024;
/// Duration ceiling for video inputs, measured by decoding the artifact
pub const MAX_VIDEO_DURATION_SECS: f64 = 15.0;

/// Diagnostic substring the transformation runner prints when the source
/// image contains no detectable face. The process still exits with code 0
/// in that case, so the runner output must be scanned for it.
pub const NO_FACE_DIAGNOSTIC: &str = "No face in source path detected.";
