// Process boundary
//
// Everything that spawns an external tool lives here:
// - commands: concrete invocations and captured output
// - runner: the MediaRunner implementations (ffmpeg, dry run)
// - probe: ffprobe metadata and durations

pub mod commands;
pub mod probe;
pub mod runner;

pub use commands::*;
pub use probe::*;
pub use runner::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::graph::JobArguments;

/// Executes assembled jobs against the external media tool.
///
/// Each call blocks until the process exits. Concurrent calls are
/// independent subprocesses; two jobs writing the same destination race and
/// leave undefined content, which callers must avoid.
#[cfg_attr(test, mockall::automock)]
pub trait MediaRunner {
    /// Run the job; `overwrite` replaces an existing destination without prompting
    fn execute(&self, job: &JobArguments, overwrite: bool) -> Result<RunOutput>;

    /// Check if the media tool can be started
    fn check_availability(&self) -> Result<()>;

    /// First line of the tool's version banner
    fn version_info(&self) -> Result<String>;
}

/// Factory for creating runner instances
pub struct MediaRunnerFactory;

impl MediaRunnerFactory {
    /// Runner for the configured ffmpeg, or one that only prints commands
    pub fn create_runner(config: MediaConfig, dry_run: bool) -> Box<dyn MediaRunner> {
        if dry_run {
            Box::new(DryRunRunner::new(config))
        } else {
            Box::new(FfmpegRunner::new(config))
        }
    }
}
