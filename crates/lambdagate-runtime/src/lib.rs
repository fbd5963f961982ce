//! LambdaGate Runtime
//!
//! This crate hosts functions stored on disk and executes them on demand.
//!
//! # Architecture
//!
//! - [`DependencyProvisioner`]: installs a function's declared dependencies into
//!   its private directory by spawning the configured installer
//! - [`FunctionCache`]: resolves a function name to a loaded handle, reloading
//!   (and re-provisioning) whenever the source modification time changes
//! - [`FunctionRuntime`]: the invocation façade plus the administrative
//!   operations (list, read, write, remove)
//! - [`engine`]: the pluggable execution strategy; [`BoaEngine`] runs functions
//!   written as CommonJS-style JavaScript modules
//!
//! Filesystem and process spawning are injected through the [`Filesystem`] and
//! [`ProcessSpawner`] traits so the reload protocol can be exercised in tests.
//!
//! # Example
//!
//! ```no_run
//! use lambdagate_runtime::{FunctionRuntime, RuntimeConfig};
//! use serde_json::json;
//!
//! # async fn example() -> lambdagate_common::Result<()> {
//! let runtime = FunctionRuntime::new(RuntimeConfig::new("./lambdas"))?;
//! let result = runtime.run("greet", json!({"name": "world"})).await?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod fs;
pub mod process;
pub mod provisioner;
pub mod runtime;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{FunctionCache, FunctionSnapshot};
pub use config::{InstallerConfig, ReloadPolicy, ResourceLimits, RuntimeConfig};
pub use engine::{BoaEngine, ExecutionEngine, FunctionHandle, FunctionSource};
pub use fs::{DiskFilesystem, Filesystem};
pub use process::{ProcessExit, ProcessSpawner, TokioProcessSpawner};
pub use provisioner::DependencyProvisioner;
pub use runtime::{validate_function_name, FunctionRuntime};
