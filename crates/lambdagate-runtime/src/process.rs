//! Process spawning capability.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;

/// Outcome of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` if the process was terminated by a signal
    pub code: Option<i32>,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessExit {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Spawns external programs and waits for them to finish.
///
/// Dropping the returned future must stop the child, so callers can bound a
/// run with `tokio::time::timeout`.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Runs `program` with `args` in working directory `cwd`.
    ///
    /// An `Err` means the process could not be started or awaited at all.
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> io::Result<ProcessExit>;
}

/// [`ProcessSpawner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessSpawner;

#[async_trait]
impl ProcessSpawner for TokioProcessSpawner {
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> io::Result<ProcessExit> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
