//! Execution strategies.
//!
//! The function cache never touches a JavaScript engine directly: it hands a
//! [`FunctionSource`] to an [`ExecutionEngine`] and keeps the resulting
//! [`FunctionHandle`] until the source changes on disk.
//!
//! Both traits are synchronous; callers run them on tokio's blocking pool.

mod bindings;
mod boa;
mod context;
mod conversions;
#[cfg(test)]
mod tests;

pub use boa::{BoaEngine, BoaHandle};
pub use conversions::{js_value_to_json, json_to_js_value};

use lambdagate_common::Result;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything an engine needs to materialise a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    pub name: String,
    /// The function's private directory (dependencies are installed here)
    pub directory: PathBuf,
    pub source_path: PathBuf,
    pub code: String,
}

/// A loaded, invocable function.
pub trait FunctionHandle: Send + Sync {
    /// Dependencies declared by the module; empty if it declares none.
    fn dependencies(&self) -> &[String];

    /// Invokes the function's handler with structured arguments.
    fn invoke(&self, args: JsonValue) -> Result<JsonValue>;
}

/// Turns function source into an invocable handle.
pub trait ExecutionEngine: Send + Sync {
    /// Evaluates `source` and returns its handle.
    ///
    /// # Errors
    ///
    /// `InvalidFunction` if the source does not evaluate or exports no handler.
    fn load(&self, source: FunctionSource) -> Result<Arc<dyn FunctionHandle>>;
}
