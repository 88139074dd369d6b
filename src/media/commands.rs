use std::process::Command;
use tracing::debug;

use crate::error::{Result, ReelError};
use crate::graph::JobArguments;

/// Captured result of a finished media process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutput {
    /// Stderr decoded permissively; invalid UTF-8 is replaced, never fatal
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

/// Concrete process invocation: binary, argument list and a description for errors
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Build the invocation for an assembled job
    pub fn from_job<S1: Into<String>, S2: Into<String>>(
        binary_path: S1,
        description: S2,
        job: &JobArguments,
        overwrite: bool,
    ) -> Self {
        let cmd = Self::new(binary_path, description).arg("-hide_banner");
        let cmd = if overwrite { cmd.overwrite() } else { cmd.no_overwrite() };
        cmd.args(job.to_args())
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Refuse to overwrite output instead of prompting on stdin
    pub fn no_overwrite(self) -> Self {
        self.arg("-n")
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// Blocks the calling thread; there is no timeout.
    pub fn execute(&self) -> Result<RunOutput> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .map_err(|e| ReelError::ProcessFailure {
                description: self.description.clone(),
                exit_code: None,
                stderr: format!("Failed to execute {}: {}", self.binary_path, e),
            })?;

        let run = RunOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if !output.status.success() {
            return Err(ReelError::ProcessFailure {
                description: self.description.clone(),
                exit_code: run.exit_code,
                stderr: run.stderr_text(),
            });
        }

        Ok(run)
    }
}
