//! Video duration probing via ffprobe
//!
//! Declared metadata is not trusted for the duration ceiling; the artifact
//! is decoded by ffprobe after download and its container duration is read
//! from the JSON output.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Measure the duration of a downloaded video artifact in seconds.
///
/// # Errors
///
/// Returns an error if ffprobe cannot be spawned, exits non-zero, or its
/// output carries no parseable duration.
pub async fn video_duration_secs(ffprobe_bin: &str, path: &Path) -> Result<f64> {
    let output = Command::new(ffprobe_bin)
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await
        .with_context(|| format!("failed to spawn {ffprobe_bin}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let duration = parse_duration(&stdout)?;
    debug!(path = %path.display(), duration, "Probed video duration");
    Ok(duration)
}

/// Extract `format.duration` from ffprobe JSON output.
fn parse_duration(json: &str) -> Result<f64> {
    let probe: ProbeOutput =
        serde_json::from_str(json).context("malformed ffprobe output")?;
    let raw = probe
        .format
        .duration
        .ok_or_else(|| anyhow!("ffprobe output carries no duration"))?;
    raw.parse::<f64>()
        .with_context(|| format!("unparseable duration {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_from_ffprobe_json() -> Result<()> {
        let json = r#"{"format": {"filename": "clip.mp4", "duration": "9.967000"}}"#;
        let duration = parse_duration(json)?;
        assert!((duration - 9.967).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn missing_duration_is_an_error() {
        let json = r#"{"format": {"filename": "clip.mp4"}}"#;
        assert!(parse_duration(json).is_err());
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(parse_duration("not json").is_err());
        assert!(parse_duration(r#"{"format": {"duration": "abc"}}"#).is_err());
    }
}
