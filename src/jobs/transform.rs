//! External transformation invocation
//!
//! The actual face swap happens in an external program launched per job.
//! This module builds its command line, captures its output, and maps the
//! outcome onto [`TransformError`]. One quirk of the runner script: when it
//! finds no face in the source image it prints a diagnostic and still exits
//! with code 0, so stdout has to be scanned in addition to the exit code.

use crate::config::{Settings, NO_FACE_DIAGNOSTIC};
use crate::jobs::model::QueuedJob;
use std::process::Output;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// How a transformation attempt failed
#[derive(Debug, Error)]
pub enum TransformError {
    /// The runner process could not be launched
    #[error("failed to launch transformation runner: {0}")]
    Spawn(#[from] std::io::Error),
    /// The runner exited non-zero; carries its stderr text
    #[error("transformation failed ({code}): {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    /// The runner exited cleanly but reported the no-face diagnostic
    #[error("No face in the 1st photo detected.")]
    NoFaceDetected,
}

/// Command-line profile of the transformation runner
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Interpreter launching the runner script
    pub runtime: String,
    /// Path to the runner script
    pub script: String,
    /// Inference backend, e.g. `cuda`
    pub execution_provider: String,
    /// Frame processor selecting the transformation, e.g. `face_swapper`
    pub frame_processor: String,
}

impl TransformConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            runtime: settings.transform_runtime.clone(),
            script: settings.transform_script.clone(),
            execution_provider: settings.execution_provider.clone(),
            frame_processor: settings.frame_processor.clone(),
        }
    }

    /// Arguments passed to the runtime, script first.
    fn args(&self, job: &QueuedJob) -> Vec<String> {
        vec![
            self.script.clone(),
            "--target".to_string(),
            job.target_path.clone(),
            "--source".to_string(),
            job.source_path.clone(),
            "-o".to_string(),
            job.result_path.clone(),
            "--execution-provider".to_string(),
            self.execution_provider.clone(),
            "--keep-fps".to_string(),
            "--output-video-quality".to_string(),
            "1".to_string(),
            "--frame-processor".to_string(),
            self.frame_processor.clone(),
        ]
    }

    /// Run the transformation for one job and return its stdout.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] on spawn failure, non-zero exit, or the
    /// no-face diagnostic.
    pub async fn run(&self, job: &QueuedJob) -> Result<String, TransformError> {
        let args = self.args(job);
        info!(runtime = %self.runtime, ?args, "Running transformation command");
        let output = Command::new(&self.runtime).args(&args).output().await?;
        classify_output(output)
    }
}

/// Map process output onto success stdout or a [`TransformError`].
fn classify_output(output: Output) -> Result<String, TransformError> {
    if !output.status.success() {
        return Err(TransformError::NonZeroExit {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(stdout = %stdout, "Transformation command output");
    if stdout.contains(NO_FACE_DIAGNOSTIC) {
        return Err(TransformError::NoFaceDetected);
    }
    Ok(stdout)
}
