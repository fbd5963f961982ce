//! Test doubles for the runtime's capabilities.
//!
//! Enabled in this crate's tests and, for other crates, through the
//! `testing` feature.

use crate::engine::{ExecutionEngine, FunctionHandle, FunctionSource};
use crate::process::{ProcessExit, ProcessSpawner};
use async_trait::async_trait;
use lambdagate_common::Result;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded [`ProcessSpawner::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCall {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

#[derive(Debug, Clone)]
enum SpawnOutcome {
    Exit(ProcessExit),
    Unavailable,
}

/// A [`ProcessSpawner`] that records calls instead of spawning anything.
#[derive(Debug)]
pub struct RecordingSpawner {
    outcome: SpawnOutcome,
    delay: Option<Duration>,
    calls: Mutex<Vec<SpawnCall>>,
}

impl RecordingSpawner {
    /// Every run exits with code 0.
    pub fn succeeding() -> Self {
        Self::with_outcome(SpawnOutcome::Exit(ProcessExit::success()))
    }

    /// Every run exits with `code` and a short stderr message.
    pub fn failing(code: i32) -> Self {
        Self::with_outcome(SpawnOutcome::Exit(ProcessExit {
            code: Some(code),
            stderr: format!("installer failed with code {}", code),
        }))
    }

    /// Every run fails to spawn, as if the program did not exist.
    pub fn unavailable() -> Self {
        Self::with_outcome(SpawnOutcome::Unavailable)
    }

    /// Sleeps for `delay` before reporting the outcome.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_outcome(outcome: SpawnOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SpawnCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ProcessSpawner for RecordingSpawner {
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> io::Result<ProcessExit> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(SpawnCall {
                program: program.to_string(),
                args: args.to_vec(),
                cwd: cwd.to_path_buf(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            SpawnOutcome::Exit(exit) => Ok(exit.clone()),
            SpawnOutcome::Unavailable => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: program not found", program),
            )),
        }
    }
}

/// An [`ExecutionEngine`] wrapper counting loads per function name.
#[derive(Debug)]
pub struct CountingEngine<E> {
    inner: E,
    loads: Mutex<HashMap<String, usize>>,
}

impl<E: ExecutionEngine> CountingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            loads: Mutex::new(HashMap::new()),
        }
    }

    /// Number of load attempts for `name`, failed ones included.
    pub fn loads(&self, name: &str) -> usize {
        self.loads
            .lock()
            .ok()
            .and_then(|loads| loads.get(name).copied())
            .unwrap_or(0)
    }
}

impl<E: ExecutionEngine> ExecutionEngine for CountingEngine<E> {
    fn load(&self, source: FunctionSource) -> Result<Arc<dyn FunctionHandle>> {
        if let Ok(mut loads) = self.loads.lock() {
            *loads.entry(source.name.clone()).or_insert(0) += 1;
        }
        self.inner.load(source)
    }
}
