use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::clip::Rendered;
use crate::config::{Config, EncodeConfig};
use crate::error::{Result, ReelError};
use crate::graph::{concat, Input, OutputOption, OutputSpec};
use crate::media::MediaRunner;

const CLIP_EXTENSIONS: [&str; 5] = ["mp4", "mov", "mkv", "webm", "avi"];

/// Ordered list of rendered clips, joined with a re-encode.
///
/// Stream copy breaks when clips were encoded with different parameters,
/// so the chapter always re-encodes.
#[derive(Debug, Clone)]
pub struct Chapter {
    clips: Vec<PathBuf>,
    encode: EncodeConfig,
}

impl Default for Chapter {
    fn default() -> Self {
        Self::new(Config::default().encode)
    }
}

impl Chapter {
    pub fn new(encode: EncodeConfig) -> Self {
        Self {
            clips: Vec::new(),
            encode,
        }
    }

    pub fn clips(&self) -> &[PathBuf] {
        &self.clips
    }

    /// Append a clip; the file must already exist
    pub fn add<P: AsRef<Path>>(&mut self, clip: P) -> Result<&mut Self> {
        let clip = clip.as_ref();
        if !clip.exists() {
            return Err(ReelError::NotFound(clip.to_path_buf()));
        }
        self.clips.push(clip.to_path_buf());
        Ok(self)
    }

    /// Append every video file directly inside `dir`, in file-name order
    pub fn add_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ReelError::NotFound(dir.to_path_buf()));
        }

        let mut added = 0;
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
                if CLIP_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                    self.clips.push(entry.path().to_path_buf());
                    added += 1;
                }
            }
        }

        debug!("Added {} clips from {}", added, dir.display());
        Ok(added)
    }

    /// Concat graph over all clips: one input each, (video, audio) pairs in order
    pub fn output_spec<P: AsRef<Path>>(&self, destination: P) -> Result<OutputSpec> {
        if self.clips.is_empty() {
            return Err(ReelError::Clip("No clips to concatenate.".to_string()));
        }

        let pairs: Vec<_> = self
            .clips
            .iter()
            .map(|path| {
                let input = Input::new(path);
                (input.video(), input.audio())
            })
            .collect();
        let (video, audio) = concat(&pairs)?;

        Ok(OutputSpec::new(vec![video, audio], destination)
            .option(OutputOption::VideoCodec(self.encode.video_codec.clone()))
            .option(OutputOption::PixelFormat(self.encode.pixel_format.clone()))
            .option(OutputOption::AudioCodec(self.encode.audio_codec.clone()))
            .option(OutputOption::Preset(self.encode.preset.clone())))
    }

    pub fn render<P: AsRef<Path>>(
        &self,
        runner: &dyn MediaRunner,
        destination: P,
    ) -> Result<Rendered> {
        let destination = destination.as_ref();
        let job = self.output_spec(destination)?.assemble()?;

        info!("Concat {} clips -> {}", self.clips.len(), destination.display());
        debug!("Chapter command: {}", job);

        let output = runner.execute(&job, true).map_err(|e| match e {
            ReelError::ProcessFailure { stderr, .. } => ReelError::Clip(stderr),
            other => other,
        })?;

        Ok(Rendered {
            path: destination.to_path_buf(),
            output,
        })
    }
}
