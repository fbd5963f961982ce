//! Runtime configuration.
//!
//! Defaults describe the usual store layout: each function lives in its own
//! directory under `functions_dir` with an `index.js` entry point, and
//! dependencies are installed with `npm install` into `node_modules`.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where functions live and how they are loaded, provisioned and executed.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Root directory holding one subdirectory per function
    pub functions_dir: PathBuf,
    /// Entry point file name inside a function directory
    pub entry_file: String,
    pub installer: InstallerConfig,
    pub limits: ResourceLimits,
    pub reload_policy: ReloadPolicy,
}

impl RuntimeConfig {
    pub fn new(functions_dir: impl Into<PathBuf>) -> Self {
        Self {
            functions_dir: functions_dir.into(),
            entry_file: "index.js".to_string(),
            installer: InstallerConfig::default(),
            limits: ResourceLimits::default(),
            reload_policy: ReloadPolicy::default(),
        }
    }

    pub fn with_installer(mut self, installer: InstallerConfig) -> Self {
        self.installer = installer;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_reload_policy(mut self, policy: ReloadPolicy) -> Self {
        self.reload_policy = policy;
        self
    }

    /// Private directory of function `name`.
    pub fn function_dir(&self, name: &str) -> PathBuf {
        self.functions_dir.join(name)
    }

    /// Entry point source file of function `name`.
    pub fn source_path(&self, name: &str) -> PathBuf {
        self.function_dir(name).join(&self.entry_file)
    }

    pub fn functions_dir(&self) -> &Path {
        &self.functions_dir
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.entry_file.is_empty() || self.entry_file.contains(['/', '\\']) {
            return Err(format!("entry file must be a plain file name (got '{}')", self.entry_file));
        }
        self.installer.validate()?;
        self.limits.validate()
    }
}

/// External package installer used to provision dependencies.
///
/// The installer is spawned as `<program> <args...> <dependencies...>` with the
/// function directory as working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallerConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Dependency store directory created inside the function directory
    pub dependency_dir: String,
    /// No timeout by default: installs are network bound and may take long
    pub timeout: Option<Duration>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["install".to_string()],
            dependency_dir: "node_modules".to_string(),
            timeout: None,
        }
    }
}

impl InstallerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependency_dir(mut self, dir: impl Into<String>) -> Self {
        self.dependency_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("installer program must not be empty".to_string());
        }
        if self.dependency_dir.is_empty() || self.dependency_dir.contains(['/', '\\']) {
            return Err(format!(
                "dependency directory must be a plain directory name (got '{}')",
                self.dependency_dir
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err("installer timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Default iteration cap for a single loop.
pub const DEFAULT_LOOP_ITERATION_LIMIT: u64 = 10_000_000;

/// Default maximum call depth.
pub const DEFAULT_RECURSION_LIMIT: usize = 512;

/// Resource limits for function execution.
///
/// `execution_timeout` bounds how long a caller waits for a module to load and
/// for a handler to return. The loop and recursion limits are enforced inside
/// the JavaScript engine: a timed-out script keeps its blocking thread until
/// one of them stops it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLimits {
    pub execution_timeout: Duration,
    pub loop_iteration_limit: Option<u64>,
    pub recursion_limit: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(30),
            loop_iteration_limit: Some(DEFAULT_LOOP_ITERATION_LIMIT),
            recursion_limit: Some(DEFAULT_RECURSION_LIMIT),
        }
    }
}

impl ResourceLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
        self.loop_iteration_limit = Some(limit);
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    /// Validates the resource limits.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Execution timeout is zero
    /// - Execution timeout is excessively long (> 1 hour)
    pub fn validate(&self) -> Result<(), String> {
        if self.execution_timeout.is_zero() {
            return Err("execution timeout must be greater than zero".to_string());
        }

        if self.execution_timeout.as_secs() > 3600 {
            return Err(format!(
                "execution timeout must be <= 1 hour (got {} seconds)",
                self.execution_timeout.as_secs()
            ));
        }

        Ok(())
    }
}

/// What the cache does with the observed modification time when a reload fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    /// Keep the observed time even if loading or provisioning failed. The next
    /// call with the same timestamp does not reload; the source has to change
    /// again before another reload is attempted.
    #[default]
    PinObservedTimestamp,
    /// Forget the observed time after a failed reload so the next call retries.
    RetryAfterFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = RuntimeConfig::new("/srv/lambdas");
        assert_eq!(config.function_dir("greet"), PathBuf::from("/srv/lambdas/greet"));
        assert_eq!(config.source_path("greet"), PathBuf::from("/srv/lambdas/greet/index.js"));
        assert_eq!(config.installer.program, "npm");
        assert_eq!(config.installer.args, vec!["install".to_string()]);
        assert_eq!(config.installer.dependency_dir, "node_modules");
        assert!(config.installer.timeout.is_none());
        assert_eq!(config.reload_policy, ReloadPolicy::PinObservedTimestamp);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_resource_limits() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.execution_timeout.as_secs(), 30);
        assert_eq!(limits.loop_iteration_limit, Some(DEFAULT_LOOP_ITERATION_LIMIT));
        assert_eq!(limits.recursion_limit, Some(DEFAULT_RECURSION_LIMIT));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let limits = ResourceLimits::new().with_execution_timeout(Duration::ZERO);
        let err = limits.validate().unwrap_err();
        assert!(err.contains("greater than zero"));
    }

    #[test]
    fn test_validate_excessive_timeout_fails() {
        let limits = ResourceLimits::new().with_execution_timeout(Duration::from_secs(7200));
        let err = limits.validate().unwrap_err();
        assert!(err.contains("1 hour"));
    }

    #[test]
    fn test_installer_builder() {
        let installer = InstallerConfig::new("pnpm")
            .with_args(["add"])
            .with_dependency_dir("deps")
            .with_timeout(Duration::from_secs(120));
        assert_eq!(installer.program, "pnpm");
        assert_eq!(installer.args, vec!["add".to_string()]);
        assert_eq!(installer.dependency_dir, "deps");
        assert_eq!(installer.timeout, Some(Duration::from_secs(120)));
        assert!(installer.validate().is_ok());
    }

    #[test]
    fn test_installer_validation() {
        assert!(InstallerConfig::new("  ").validate().is_err());
        assert!(InstallerConfig::default().with_dependency_dir("a/b").validate().is_err());
        assert!(InstallerConfig::default().with_timeout(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_entry_file_must_be_plain_name() {
        let mut config = RuntimeConfig::new("/srv/lambdas");
        config.entry_file = "../index.js".to_string();
        assert!(config.validate().is_err());
    }
}
