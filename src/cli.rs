use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the ffmpeg command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn numbered image frames into a silent video
    Frames {
        /// Frame pattern, e.g. frames/frame_%03d.png
        #[arg(short, long)]
        pattern: String,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Output video file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a still image with narration into a clip
    Still {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,

        /// Narration audio; the clip ends with it
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Clip length in seconds when there is no narration
        #[arg(short, long)]
        duration: Option<f64>,

        /// Apply a slow Ken Burns zoom
        #[arg(long)]
        kenburns: bool,

        /// Per-frame zoom increment for --kenburns
        #[arg(long)]
        zoom: Option<f64>,

        /// Caption drawn near the top of the frame
        #[arg(short, long)]
        text: Option<String>,

        /// Output video file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Burn a caption into an existing video
    Caption {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Caption text
        #[arg(short, long)]
        text: String,

        /// Font size
        #[arg(long)]
        font_size: Option<u32>,

        /// Output video file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Concatenate rendered clips (files or directories) with a re-encode
    Concat {
        /// Clips in playback order
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        /// Output video file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Duck background music under narration
    Duck {
        /// Input video file (video stream is copied)
        #[arg(short, long)]
        video: PathBuf,

        /// Narration audio, used as the sidechain trigger
        #[arg(short, long)]
        narration: PathBuf,

        /// Background music
        #[arg(short, long)]
        music: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Mix music with narration, trimmed to the narration length
    Blend {
        /// Narration audio
        #[arg(short, long)]
        narration: PathBuf,

        /// Background music
        #[arg(short, long)]
        music: PathBuf,

        /// Output audio file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace a video's audio track
    Dub {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Replacement audio
        #[arg(short, long)]
        audio: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a media file's duration in seconds
    Probe {
        /// Media file
        input: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(default_value = "reelkit.toml")]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_still_with_kenburns() {
        let args = Args::parse_from([
            "reelkit", "--dry-run", "still", "-i", "panel.jpg", "-a", "narration.wav", "--kenburns",
        ]);
        assert!(args.dry_run);
        match args.command {
            Commands::Still { image, audio, kenburns, zoom, .. } => {
                assert_eq!(image, PathBuf::from("panel.jpg"));
                assert_eq!(audio, Some(PathBuf::from("narration.wav")));
                assert!(kenburns);
                assert_eq!(zoom, None);
            }
            _ => panic!("expected still"),
        }
    }

    #[test]
    fn test_concat_requires_clips() {
        assert!(Args::try_parse_from(["reelkit", "concat"]).is_err());
    }
}
