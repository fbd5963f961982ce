use lambdagate_common::Result;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::config::{ResourceLimits, RuntimeConfig};
use crate::engine::bindings::ModuleSettings;
use crate::engine::context::FunctionContext;
use crate::engine::{ExecutionEngine, FunctionHandle, FunctionSource};

/// Runs functions written as CommonJS-style JavaScript modules in Boa.
///
/// Loading evaluates the module once to validate it and read its declared
/// dependencies. At that point the dependencies may not be installed yet, so
/// an unresolvable `require` yields an empty object instead of throwing.
///
/// Each invocation evaluates the module again in a fresh context.
/// Boa contexts carry thread-local state and cannot be shared, and a fresh
/// context also means no state leaks between invocations.
#[derive(Debug, Clone)]
pub struct BoaEngine {
    limits: ResourceLimits,
    dependency_dir: String,
}

impl Default for BoaEngine {
    fn default() -> Self {
        Self::new(ResourceLimits::default(), "node_modules")
    }
}

impl BoaEngine {
    pub fn new(limits: ResourceLimits, dependency_dir: impl Into<String>) -> Self {
        Self {
            limits,
            dependency_dir: dependency_dir.into(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.limits.clone(), config.installer.dependency_dir.clone())
    }
}

impl ExecutionEngine for BoaEngine {
    fn load(&self, source: FunctionSource) -> Result<Arc<dyn FunctionHandle>> {
        let settings = ModuleSettings {
            name: &source.name,
            directory: &source.directory,
            dependency_dir: &self.dependency_dir,
            lenient: true,
        };

        let mut context = FunctionContext::evaluate(&settings, &self.limits, &source.code)?;
        context.handler()?;
        let dependencies = context.dependencies()?;

        tracing::debug!(
            "Loaded function '{}' from {} ({} dependencies)",
            source.name,
            source.source_path.display(),
            dependencies.len()
        );

        Ok(Arc::new(BoaHandle {
            source,
            dependencies,
            limits: self.limits.clone(),
            dependency_dir: self.dependency_dir.clone(),
        }))
    }
}

/// Handle to a function validated by [`BoaEngine`].
#[derive(Debug)]
pub struct BoaHandle {
    source: FunctionSource,
    dependencies: Vec<String>,
    limits: ResourceLimits,
    dependency_dir: String,
}

impl BoaHandle {
    pub fn source(&self) -> &FunctionSource {
        &self.source
    }
}

impl FunctionHandle for BoaHandle {
    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn invoke(&self, args: JsonValue) -> Result<JsonValue> {
        let settings = ModuleSettings {
            name: &self.source.name,
            directory: &self.source.directory,
            dependency_dir: &self.dependency_dir,
            lenient: false,
        };

        tracing::debug!("Invoking function '{}'", self.source.name);
        let mut context = FunctionContext::evaluate(&settings, &self.limits, &self.source.code)?;
        context.call_handler(args)
    }
}
