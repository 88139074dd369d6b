use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, ReelError};

fn default_preset() -> String {
    "veryfast".to_string()
}

fn default_upscale_width() -> u32 {
    3840
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub media: MediaConfig,
    pub encode: EncodeConfig,
    pub clip: ClipConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Video encoder used for every rendered clip
    pub video_codec: String,
    /// Pixel format; yuv420p keeps QuickTime and browsers happy
    pub pixel_format: String,
    /// Audio encoder for compressed outputs
    pub audio_codec: String,
    /// Uncompressed audio encoder for narration-first outputs
    pub pcm_codec: String,
    /// Encoder speed preset (ultrafast, veryfast, medium, slow, ...)
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Output channel count
    pub channels: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipConfig {
    /// Frame rate for still-image sources
    pub fps: u32,
    /// Target frame width
    pub width: u32,
    /// Target frame height
    pub height: u32,
    /// Per-frame zoom increment for the Ken Burns effect
    pub zoom_increment: f64,
    /// Width the still is upscaled to before zoompan
    #[serde(default = "default_upscale_width")]
    pub upscale_width: u32,
    /// Font file used by drawtext
    pub font: String,
    /// Font size used by drawtext
    pub font_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory rendered files are written to
    pub dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
            },
            encode: EncodeConfig {
                video_codec: "libx264".to_string(),
                pixel_format: "yuv420p".to_string(),
                audio_codec: "aac".to_string(),
                pcm_codec: "pcm_s16le".to_string(),
                preset: default_preset(),
                sample_rate: 48000,
                channels: 2,
            },
            clip: ClipConfig {
                fps: 30,
                width: 1920,
                height: 1080,
                zoom_increment: 0.0006,
                upscale_width: default_upscale_width(),
                font: "/Library/Fonts/Arial.ttf".to_string(),
                font_size: 56,
            },
            output: OutputConfig {
                dir: PathBuf::from("out"),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReelError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ReelError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReelError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ReelError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
