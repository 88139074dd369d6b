use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, ReelError};
use crate::graph::JobArguments;
use super::{MediaCommand, MediaRunner, RunOutput};

/// Runs jobs with the configured ffmpeg binary
pub struct FfmpegRunner {
    config: MediaConfig,
}

impl FfmpegRunner {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }
}

impl MediaRunner for FfmpegRunner {
    fn execute(&self, job: &JobArguments, overwrite: bool) -> Result<RunOutput> {
        let command = MediaCommand::from_job(
            &self.config.binary_path,
            format!("Render {}", job.destination().display()),
            job,
            overwrite,
        );
        let output = command.execute()?;
        debug!("ffmpeg stderr: {}", output.stderr_text());
        Ok(output)
    }

    fn check_availability(&self) -> Result<()> {
        MediaCommand::new(&self.config.binary_path, "Version check")
            .arg("-version")
            .execute()
            .map_err(|e| ReelError::Config(format!("Media processor not usable: {}", e)))?;
        info!("Media processor is available");
        Ok(())
    }

    fn version_info(&self) -> Result<String> {
        let output = MediaCommand::new(&self.config.binary_path, "Version check")
            .arg("-version")
            .execute()?;
        let version = output.stdout_text();
        Ok(version.lines().next().unwrap_or("Unknown version").to_string())
    }
}

/// Prints the command line instead of running it
pub struct DryRunRunner {
    binary_path: String,
}

impl DryRunRunner {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            binary_path: config.binary_path,
        }
    }
}

impl MediaRunner for DryRunRunner {
    fn execute(&self, job: &JobArguments, overwrite: bool) -> Result<RunOutput> {
        let flag = if overwrite { "-y" } else { "-n" };
        println!("{} -hide_banner {} {}", self.binary_path, flag, job);
        Ok(RunOutput {
            exit_code: Some(0),
            ..RunOutput::default()
        })
    }

    fn check_availability(&self) -> Result<()> {
        Ok(())
    }

    fn version_info(&self) -> Result<String> {
        Ok(format!("{} (dry run)", self.binary_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Input, OutputSpec};

    #[test]
    fn test_dry_run_reports_success_without_spawning() {
        let runner = DryRunRunner::new(MediaConfig {
            binary_path: "/nonexistent/ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
        });
        let job = OutputSpec::new(vec![Input::new("in.mp4").video()], "out.mp4")
            .assemble()
            .unwrap();
        let out = runner.execute(&job, true).unwrap();
        assert_eq!(out.exit_code, Some(0));
        assert!(runner.check_availability().is_ok());
    }

    #[test]
    fn test_missing_binary_fails_availability_check() {
        let runner = FfmpegRunner::new(MediaConfig {
            binary_path: "/nonexistent/ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
        });
        assert!(matches!(runner.check_availability(), Err(ReelError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_binary_surfaces_process_failure() {
        // `false` ignores its arguments and exits 1
        let runner = FfmpegRunner::new(MediaConfig {
            binary_path: "false".to_string(),
            probe_path: "ffprobe".to_string(),
        });
        let job = OutputSpec::new(vec![Input::new("in.mp4").video()], "out.mp4")
            .assemble()
            .unwrap();
        let err = runner.execute(&job, true).unwrap_err();
        assert!(matches!(err, ReelError::ProcessFailure { exit_code: Some(1), .. }));
    }
}
