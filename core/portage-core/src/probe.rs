//! The seam between the engine and the operating system.
//!
//! Every external command Portage depends on is behind `ProcessProbe`, so
//! the pipeline only ever sees command *output*. `SystemProbe` shells out
//! to the macOS tools; tests substitute a scripted probe.

use std::process::Command;

use tracing::debug;

use crate::error::{PortageError, Result};

/// Source of raw command output consumed by the pipeline.
///
/// Only `socket_listing` can fail the run. Every other method returns
/// `None` when the command fails or is missing, and callers degrade.
pub trait ProcessProbe: Send + Sync {
    /// Full socket listing (`lsof -i -P -n`).
    fn socket_listing(&self) -> Result<String>;

    /// Working-directory listing for one process (`lsof -a -p PID -d cwd -Fn`).
    fn working_directory(&self, pid: &str) -> Option<String>;

    /// Elapsed run time for one process (`ps -p PID -o etime=`).
    fn elapsed_time(&self, pid: &str) -> Option<String>;

    /// Titles of open Cursor windows, comma-separated.
    fn editor_window_titles(&self) -> Option<String>;

    /// Process table rows mentioning Claude (`ps aux`, filtered).
    fn assistant_processes(&self) -> Option<String>;

    /// Full open-file listing for one process (`lsof -p PID`).
    fn open_files(&self, pid: &str) -> Option<String>;
}

/// Probe backed by real command invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessProbe for SystemProbe {
    fn socket_listing(&self) -> Result<String> {
        let output = Command::new("lsof")
            .args(["-i", "-P", "-n"])
            .output()
            .map_err(|e| PortageError::ListingUnavailable {
                details: format!("failed to run lsof: {}", e),
            })?;

        if !output.status.success() {
            return Err(PortageError::ListingUnavailable {
                details: format!(
                    "lsof exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn working_directory(&self, pid: &str) -> Option<String> {
        run_optional("lsof", &["-a", "-p", pid, "-d", "cwd", "-Fn"])
    }

    fn elapsed_time(&self, pid: &str) -> Option<String> {
        run_optional("ps", &["-p", pid, "-o", "etime="])
    }

    fn editor_window_titles(&self) -> Option<String> {
        run_optional(
            "osascript",
            &[
                "-e",
                r#"tell application "System Events" to get name of every window of application process "Cursor""#,
            ],
        )
    }

    fn assistant_processes(&self) -> Option<String> {
        run_optional("sh", &["-c", "ps aux | grep -i claude | grep -v grep"])
    }

    fn open_files(&self, pid: &str) -> Option<String> {
        run_optional("lsof", &["-p", pid])
    }
}

/// Runs a command once; any failure is reported as `None`.
fn run_optional(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => {
            debug!(program, ?args, status = %output.status, "command exited unsuccessfully");
            None
        }
        Err(err) => {
            debug!(program, ?args, error = %err, "command failed to start");
            None
        }
    }
}
