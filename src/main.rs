//! Reelkit - fluent ffmpeg jobs for narrated clips
//!
//! Command-line entry point: each subcommand runs one workflow recipe and
//! writes its result to the configured output directory.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reelkit::cli::{Args, Commands};
use reelkit::clip::TextOverlay;
use reelkit::config::Config;
use reelkit::media::MediaRunnerFactory;
use reelkit::workflow::{DuckSettings, StillOptions, Workflow};

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("reelkit.toml").exists() {
                info!("Found reelkit.toml in current directory, loading...");
                Config::from_file("reelkit.toml")?
            } else {
                Config::default()
            }
        }
    };

    if let Commands::InitConfig { path } = &args.command {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        config.save_to_file(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&config.output.dir)?;

    let runner = MediaRunnerFactory::create_runner(config.media.clone(), args.dry_run);
    if !args.dry_run {
        runner.check_availability()?;
        info!("Using {}", runner.version_info()?);
    }
    let workflow = Workflow::new(config.clone(), runner);
    let out_dir = config.output.dir.clone();
    let out = |given: Option<PathBuf>, default_name: &str| -> PathBuf {
        given.unwrap_or_else(|| out_dir.join(default_name))
    };

    match args.command {
        Commands::Frames { pattern, fps, output } => {
            let fps = fps.unwrap_or(config.clip.fps);
            let path = workflow.images_to_video(&pattern, fps, out(output, "silent.mp4"))?;
            info!("Wrote {}", path.display());
        }
        Commands::Still {
            image,
            audio,
            duration,
            kenburns,
            zoom,
            text,
            output,
        } => {
            let options = StillOptions {
                narration: audio,
                duration,
                kenburns: if kenburns || zoom.is_some() {
                    Some(zoom.unwrap_or(config.clip.zoom_increment))
                } else {
                    None
                },
                caption: text.map(|t| caption_overlay(&config, t, None)),
            };
            let default_name = format!("{}_clip.mp4", file_stem(&image));
            let path = workflow.still(&image, &options, out(output, &default_name))?;
            info!("Wrote {}", path.display());
        }
        Commands::Caption {
            video,
            text,
            font_size,
            output,
        } => {
            let overlay = caption_overlay(&config, text, font_size);
            let default_name = format!("{}_text.mp4", file_stem(&video));
            let path = workflow.caption(&video, &overlay, out(output, &default_name))?;
            info!("Wrote {}", path.display());
        }
        Commands::Concat { clips, output } => {
            let path = workflow.concat(&clips, out(output, "chapter_concat.mp4"))?;
            info!("Wrote {}", path.display());
        }
        Commands::Duck {
            video,
            narration,
            music,
            output,
        } => {
            let path = workflow.duck_music(
                &video,
                &narration,
                &music,
                &DuckSettings::default(),
                out(output, "ducked.mp4"),
            )?;
            info!("Wrote {}", path.display());
        }
        Commands::Blend {
            narration,
            music,
            output,
        } => {
            let path = workflow.blend_tracks(&narration, &music, out(output, "mix_blended.wav"))?;
            info!("Wrote {}", path.display());
        }
        Commands::Dub { video, audio, output } => {
            let default_name = format!("{}_dub.mp4", file_stem(&video));
            let path = workflow.dub(&video, &audio, out(output, &default_name))?;
            info!("Wrote {}", path.display());
        }
        Commands::Probe { input } => {
            let seconds = workflow.duration(&input)?;
            println!("{:.3}", seconds);
        }
        // Written before the runner exists
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn caption_overlay(config: &Config, text: String, font_size: Option<u32>) -> TextOverlay {
    TextOverlay::new(text)
        .font(config.clip.font.clone())
        .font_size(font_size.unwrap_or(config.clip.font_size))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".reelkit").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive main
    let file_appender = rolling::daily(&log_dir, "reelkit.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
