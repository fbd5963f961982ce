//! Dependency provisioning.
//!
//! Installs a function's declared dependencies into its private directory by
//! spawning the configured installer (`npm install <deps...>` by default).

use crate::config::InstallerConfig;
use crate::fs::Filesystem;
use crate::process::ProcessSpawner;
use lambdagate_common::{LambdaError, Result};
use std::path::Path;
use std::sync::Arc;

/// Maximum number of stderr bytes carried in a `ProvisioningFailed` cause.
const STDERR_TAIL_BYTES: usize = 2048;

/// Ensures declared dependencies are installed before a function runs.
#[derive(Clone)]
pub struct DependencyProvisioner {
    installer: InstallerConfig,
    fs: Arc<dyn Filesystem>,
    spawner: Arc<dyn ProcessSpawner>,
}

impl DependencyProvisioner {
    pub fn new(
        installer: InstallerConfig,
        fs: Arc<dyn Filesystem>,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> Self {
        Self {
            installer,
            fs,
            spawner,
        }
    }

    pub fn installer(&self) -> &InstallerConfig {
        &self.installer
    }

    /// Installs `dependencies` into `target_dir`.
    ///
    /// An empty list succeeds without touching the disk or spawning anything.
    ///
    /// # Errors
    ///
    /// - `DirectoryUnavailable` if the dependency store cannot be created
    /// - `ProvisioningFailed` if the installer cannot be spawned, exits
    ///   unsuccessfully or exceeds the configured timeout
    pub async fn provision(&self, dependencies: &[String], target_dir: &Path) -> Result<()> {
        if dependencies.is_empty() {
            return Ok(());
        }

        let store = target_dir.join(&self.installer.dependency_dir);
        self.fs.create_dir_all(&store).await.map_err(|e| {
            LambdaError::DirectoryUnavailable(format!("{}: {}", store.display(), e))
        })?;

        let mut args = self.installer.args.clone();
        args.extend(dependencies.iter().cloned());

        tracing::info!(
            "Installing dependencies {:?} in {} with {}",
            dependencies,
            target_dir.display(),
            self.installer.program
        );

        let run = self.spawner.run(&self.installer.program, &args, target_dir);
        let outcome = match self.installer.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let cause = format!(
                        "{} did not finish within {:?}",
                        self.installer.program, limit
                    );
                    tracing::warn!("Dependency installation failed: {}", cause);
                    return Err(LambdaError::ProvisioningFailed(cause));
                }
            },
            None => run.await,
        };

        let exit = outcome.map_err(|e| {
            let cause = format!("failed to spawn {}: {}", self.installer.program, e);
            tracing::warn!("Dependency installation failed: {}", cause);
            LambdaError::ProvisioningFailed(cause)
        })?;

        if !exit.is_success() {
            let status = match exit.code {
                Some(code) => format!("exit code {}", code),
                None => "termination by signal".to_string(),
            };
            let cause = format!(
                "{} failed with {}: {}",
                self.installer.program,
                status,
                stderr_tail(&exit.stderr)
            );
            tracing::warn!("Dependency installation failed: {}", cause);
            return Err(LambdaError::ProvisioningFailed(cause));
        }

        tracing::debug!("Dependencies installed in {}", target_dir.display());
        Ok(())
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}
