//! Function cache with modification-time based reloading.
//!
//! # Reload protocol
//!
//! For every [`FunctionCache::resolve`] call, under the function's own lock:
//!
//! 1. Stat the source file; a missing file is `FunctionNotFound`. A name
//!    whose source was never observed gets no record
//! 2. The entry is stale if no time was recorded or the recorded time differs
//! 3. The observed time is recorded *before* reloading
//! 4. If stale: drop the old handle, load the source (bounded by the
//!    execution timeout), read its declared dependencies and provision them
//! 5. Return the current handle
//!
//! Because the time is recorded first, a failed reload is not retried until
//! the source changes again (unless [`ReloadPolicy::RetryAfterFailure`]).
//! A provisioning failure still installs the freshly loaded handle, so the
//! next call with the same timestamp returns it without re-provisioning.

use crate::config::{ReloadPolicy, RuntimeConfig};
use crate::engine::{ExecutionEngine, FunctionHandle, FunctionSource};
use crate::fs::Filesystem;
use crate::provisioner::DependencyProvisioner;
use dashmap::DashMap;
use lambdagate_common::{LambdaError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

/// Cache entry for one function. Entries live for the whole process.
struct FunctionRecord {
    source_path: PathBuf,
    directory: PathBuf,
    last_modified: Option<SystemTime>,
    dependencies: Vec<String>,
    handle: Option<Arc<dyn FunctionHandle>>,
}

/// Read-only view of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSnapshot {
    pub name: String,
    pub source_path: PathBuf,
    pub last_modified: Option<SystemTime>,
    pub dependencies: Vec<String>,
    /// Whether a handle is currently installed
    pub loaded: bool,
}

/// Resolves function names to loaded handles.
pub struct FunctionCache {
    config: RuntimeConfig,
    fs: Arc<dyn Filesystem>,
    engine: Arc<dyn ExecutionEngine>,
    provisioner: DependencyProvisioner,
    entries: DashMap<String, Arc<Mutex<FunctionRecord>>>,
}

impl FunctionCache {
    pub fn new(
        config: RuntimeConfig,
        fs: Arc<dyn Filesystem>,
        engine: Arc<dyn ExecutionEngine>,
        provisioner: DependencyProvisioner,
    ) -> Self {
        Self {
            config,
            fs,
            engine,
            provisioner,
            entries: DashMap::new(),
        }
    }

    /// Resolves `name` to its invocable handle, reloading it if the source
    /// changed since it was last observed.
    ///
    /// # Errors
    ///
    /// - `FunctionNotFound` if the source file does not exist
    /// - `SourceUnavailable` if the source cannot be inspected or read
    /// - `InvalidFunction` if the source does not load
    /// - `ProvisioningFailed` / `DirectoryUnavailable` if dependencies could
    ///   not be installed
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn FunctionHandle>> {
        let existing = self.entries.get(name).map(|e| Arc::clone(e.value()));
        let entry = match existing {
            Some(entry) => entry,
            None => {
                // Records exist only for functions whose source was once observed
                self.observe(name, &self.config.source_path(name)).await?;
                self.entry(name)
            }
        };
        let mut record = entry.lock().await;

        let observed = self.observe(name, &record.source_path).await?;

        if record.last_modified != Some(observed) {
            record.last_modified = Some(observed);
            record.handle = None;

            tracing::info!("Reloading function '{}'", name);
            if let Err(e) = self.reload(name, &mut record).await {
                tracing::warn!("Reloading function '{}' failed: {}", name, e);
                if self.config.reload_policy == ReloadPolicy::RetryAfterFailure {
                    record.last_modified = None;
                }
                return Err(e);
            }
        } else if record.handle.is_none() {
            // The last load produced nothing; evaluate again, provisioning
            // only happens on a timestamp change
            tracing::debug!("Re-evaluating function '{}' after failed load", name);
            let handle = self.load(name, &record).await?;
            record.dependencies = handle.dependencies().to_vec();
            record.handle = Some(handle);
        }

        record
            .handle
            .clone()
            .ok_or_else(|| LambdaError::InvalidFunction(format!("Function '{}' is not loaded", name)))
    }

    /// Snapshot of the cache entry for `name`, if it was ever resolved.
    pub async fn snapshot(&self, name: &str) -> Option<FunctionSnapshot> {
        let entry = self.entries.get(name).map(|e| Arc::clone(e.value()))?;
        let record = entry.lock().await;
        Some(FunctionSnapshot {
            name: name.to_string(),
            source_path: record.source_path.clone(),
            last_modified: record.last_modified,
            dependencies: record.dependencies.clone(),
            loaded: record.handle.is_some(),
        })
    }

    /// Number of functions that have a cache entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Arc<Mutex<FunctionRecord>> {
        let entry = self.entries.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(FunctionRecord {
                source_path: self.config.source_path(name),
                directory: self.config.function_dir(name),
                last_modified: None,
                dependencies: Vec::new(),
                handle: None,
            }))
        });
        Arc::clone(entry.value())
    }

    async fn observe(&self, name: &str, source_path: &Path) -> Result<SystemTime> {
        match self.fs.modified(source_path).await {
            Ok(time) => Ok(time),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LambdaError::FunctionNotFound(name.to_string()))
            }
            Err(e) => Err(LambdaError::SourceUnavailable(format!(
                "{}: {}",
                source_path.display(),
                e
            ))),
        }
    }

    async fn reload(&self, name: &str, record: &mut FunctionRecord) -> Result<()> {
        let handle = self.load(name, record).await?;
        record.dependencies = handle.dependencies().to_vec();
        record.handle = Some(handle);

        self.provisioner
            .provision(&record.dependencies, &record.directory)
            .await
    }

    async fn load(&self, name: &str, record: &FunctionRecord) -> Result<Arc<dyn FunctionHandle>> {
        let code = match self.fs.read_to_string(&record.source_path).await {
            Ok(code) => code,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LambdaError::FunctionNotFound(name.to_string()));
            }
            Err(e) => {
                return Err(LambdaError::SourceUnavailable(format!(
                    "{}: {}",
                    record.source_path.display(),
                    e
                )));
            }
        };

        let source = FunctionSource {
            name: name.to_string(),
            directory: record.directory.clone(),
            source_path: record.source_path.clone(),
            code,
        };

        let engine = Arc::clone(&self.engine);
        let limit = self.config.limits.execution_timeout;
        let task = tokio::task::spawn_blocking(move || engine.load(source));

        match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined
                .map_err(|e| LambdaError::InvalidFunction(format!("Loader task failed: {}", e)))?,
            Err(_) => {
                tracing::warn!("Loading function '{}' timed out after {:?}", name, limit);
                Err(LambdaError::InvalidFunction(format!(
                    "Loading function '{}' timed out after {:?}",
                    name, limit
                )))
            }
        }
    }
}
