//! Function runtime: invocation plus the administrative operations on the
//! function store.

use crate::cache::{FunctionCache, FunctionSnapshot};
use crate::config::RuntimeConfig;
use crate::engine::{BoaEngine, ExecutionEngine};
use crate::fs::{DiskFilesystem, Filesystem};
use crate::process::{ProcessSpawner, TokioProcessSpawner};
use crate::provisioner::DependencyProvisioner;
use lambdagate_common::{LambdaError, Result};
use serde_json::Value as JsonValue;
use std::io;
use std::sync::Arc;

/// Checks that `name` addresses exactly one directory inside the function store.
///
/// # Errors
///
/// `InvalidRequest` for empty names, `.`, `..` and names containing a path
/// separator.
pub fn validate_function_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(LambdaError::InvalidRequest(format!(
            "Invalid function name: '{}'",
            name
        )));
    }
    Ok(())
}

/// Runs functions by name and manages the on-disk function store.
pub struct FunctionRuntime {
    config: RuntimeConfig,
    fs: Arc<dyn Filesystem>,
    cache: FunctionCache,
}

impl FunctionRuntime {
    /// Creates a runtime backed by the local disk, `tokio::process` and Boa.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let engine = Arc::new(BoaEngine::from_config(&config));
        Self::with_capabilities(
            config,
            Arc::new(DiskFilesystem),
            Arc::new(TokioProcessSpawner),
            engine,
        )
    }

    /// Creates a runtime with explicit capabilities.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if the configuration does not validate.
    pub fn with_capabilities(
        config: RuntimeConfig,
        fs: Arc<dyn Filesystem>,
        spawner: Arc<dyn ProcessSpawner>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| LambdaError::InvalidRequest(format!("Invalid runtime configuration: {}", e)))?;

        let provisioner = DependencyProvisioner::new(config.installer.clone(), fs.clone(), spawner);
        let cache = FunctionCache::new(config.clone(), fs.clone(), engine, provisioner);

        Ok(Self { config, fs, cache })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn cache(&self) -> &FunctionCache {
        &self.cache
    }

    /// Invokes function `name` with `args`.
    ///
    /// Resolution errors are returned unchanged; anything going wrong inside
    /// the handler is a `FunctionExecutionFailed`.
    pub async fn run(&self, name: &str, args: JsonValue) -> Result<JsonValue> {
        validate_function_name(name)?;
        let handle = self.cache.resolve(name).await?;

        tracing::debug!("Running function '{}'", name);
        let limit = self.config.limits.execution_timeout;
        let task = tokio::task::spawn_blocking(move || handle.invoke(args));

        let outcome = tokio::time::timeout(limit, task).await.map_err(|_| {
            tracing::warn!("Function '{}' timed out after {:?}", name, limit);
            LambdaError::FunctionExecutionFailed(format!(
                "Function '{}' timed out after {:?}",
                name, limit
            ))
        })?;

        outcome
            .map_err(|e| {
                LambdaError::FunctionExecutionFailed(format!("Function '{}' panicked: {}", name, e))
            })?
            .map_err(|e| match e {
                LambdaError::FunctionExecutionFailed(_) => e,
                other => LambdaError::FunctionExecutionFailed(other.to_string()),
            })
    }

    /// Names of the functions present in the store, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        Ok(self.fs.read_dir_names(&self.config.functions_dir).await?)
    }

    /// Source text of function `name`.
    pub async fn read(&self, name: &str) -> Result<String> {
        validate_function_name(name)?;
        let path = self.config.source_path(name);
        match self.fs.read_to_string(&path).await {
            Ok(source) => Ok(source),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LambdaError::FunctionNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates or replaces the source of function `name`.
    ///
    /// The function is not reloaded here; the next `run` notices the new
    /// modification time.
    pub async fn write(&self, name: &str, source: &str) -> Result<()> {
        validate_function_name(name)?;
        self.fs.create_dir_all(&self.config.function_dir(name)).await?;
        self.fs
            .write(&self.config.source_path(name), source.as_bytes())
            .await?;
        tracing::info!("Stored function '{}'", name);
        Ok(())
    }

    /// Deletes the whole directory of function `name`. Removing a function
    /// that does not exist succeeds.
    pub async fn remove(&self, name: &str) -> Result<()> {
        validate_function_name(name)?;
        match self.fs.remove_dir_all(&self.config.function_dir(name)).await {
            Ok(()) => {
                tracing::info!("Removed function '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Cache snapshot for `name`, if it was ever resolved.
    pub async fn snapshot(&self, name: &str) -> Option<FunctionSnapshot> {
        self.cache.snapshot(name).await
    }
}
