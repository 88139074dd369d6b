use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, ReelError};
use super::MediaCommand;

/// Subset of `ffprobe -print_format json -show_streams -show_format`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

fn parse_seconds(value: Option<&String>) -> Option<f64> {
    value.and_then(|s| s.trim().parse::<f64>().ok())
}

impl ProbeReport {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Audio stream duration if any, else container duration
    pub fn duration_seconds(&self) -> Option<f64> {
        self.streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("audio"))
            .find_map(|s| parse_seconds(s.duration.as_ref()))
            .or_else(|| parse_seconds(self.format.as_ref().and_then(|f| f.duration.as_ref())))
    }

    /// Like `duration_seconds`, failing with `DurationNotFound` for `path`
    pub fn require_duration(&self, path: &Path) -> Result<f64> {
        self.duration_seconds()
            .ok_or_else(|| ReelError::DurationNotFound(path.display().to_string()))
    }
}

/// Runs ffprobe against media files
pub struct Prober {
    binary_path: String,
}

impl Prober {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    pub fn probe<P: AsRef<Path>>(&self, path: P) -> Result<ProbeReport> {
        let path = path.as_ref();
        let output = MediaCommand::new(&self.binary_path, format!("Probe {}", path.display()))
            .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path.to_string_lossy().to_string())
            .execute()?;

        ProbeReport::from_json(&output.stdout)
            .map_err(|e| {
                ReelError::Probe(format!(
                    "Unreadable probe output for {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    /// Media duration in seconds, or `DurationNotFound`
    pub fn duration<P: AsRef<Path>>(&self, path: P) -> Result<f64> {
        let path = path.as_ref();
        let report = self.probe(path)?;
        let seconds = report.require_duration(path)?;
        debug!("Duration of {}: {}s", path.display(), seconds);
        Ok(seconds)
    }
}
