use boa_engine::{js_string, object::JsObject, value::JsValue, Context, JsString};
use lambdagate_common::{LambdaError, Result};
use serde_json::Value as JsonValue;

use crate::config::ResourceLimits;
use crate::engine::bindings::{install_module_bindings, ModuleSettings};
use crate::engine::conversions::{js_value_to_json, json_to_js_value};

/// A Boa context with one function module evaluated in it.
///
/// Boa's `Context` is neither `Send` nor `Sync`, so a `FunctionContext` lives
/// and dies on the thread that created it: one per load check and one per
/// invocation.
pub(crate) struct FunctionContext {
    ctx: Context,
    loader: JsObject,
    exports: JsValue,
    name: String,
}

impl FunctionContext {
    /// Creates a context, installs the module bindings and evaluates `code`.
    pub(crate) fn evaluate(
        settings: &ModuleSettings<'_>,
        limits: &ResourceLimits,
        code: &str,
    ) -> Result<Self> {
        let mut ctx = Context::default();

        if let Some(limit) = limits.loop_iteration_limit {
            ctx.runtime_limits_mut().set_loop_iteration_limit(limit);
        }
        if let Some(limit) = limits.recursion_limit {
            ctx.runtime_limits_mut().set_recursion_limit(limit);
        }

        let loader = install_module_bindings(&mut ctx, settings)?;
        let load = Self::method(&loader, "load", &mut ctx)?;

        let exports = load
            .call(&JsValue::from(loader.clone()), &[JsValue::new(JsString::from(code))], &mut ctx)
            .map_err(|e| {
                LambdaError::InvalidFunction(format!(
                    "Failed to evaluate function '{}': {}",
                    settings.name, e
                ))
            })?;

        Ok(Self {
            ctx,
            loader,
            exports,
            name: settings.name.to_string(),
        })
    }

    /// The handler exported by the module.
    ///
    /// Accepts `module.exports = function (args) {...}` as well as a
    /// `handler` property on the exports object.
    pub(crate) fn handler(&mut self) -> Result<JsObject> {
        let exports = self
            .exports
            .as_object()
            .cloned()
            .ok_or_else(|| self.invalid("module.exports is not an object"))?;

        if exports.is_callable() {
            return Ok(exports);
        }

        let handler = exports
            .get(js_string!("handler"), &mut self.ctx)
            .map_err(|e| self.invalid(&format!("failed to read handler: {}", e)))?;

        handler
            .as_object()
            .filter(|o| o.is_callable())
            .cloned()
            .ok_or_else(|| self.invalid("module does not export a handler function"))
    }

    /// The `dependencies` list exported by the module, empty if absent.
    pub(crate) fn dependencies(&mut self) -> Result<Vec<String>> {
        let Some(exports) = self.exports.as_object().cloned() else {
            return Ok(Vec::new());
        };

        let value = exports
            .get(js_string!("dependencies"), &mut self.ctx)
            .map_err(|e| self.invalid(&format!("failed to read dependencies: {}", e)))?;

        if value.is_undefined() || value.is_null() {
            return Ok(Vec::new());
        }

        match js_value_to_json(value, &mut self.ctx)? {
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    JsonValue::String(s) => Ok(s),
                    other => Err(self.invalid(&format!("dependency {} is not a string", other))),
                })
                .collect(),
            _ => Err(self.invalid("dependencies must be an array of strings")),
        }
    }

    /// Calls the handler with `args` and drives a returned promise to completion.
    pub(crate) fn call_handler(&mut self, args: JsonValue) -> Result<JsonValue> {
        let handler = self.handler()?;
        let invoke = Self::method(&self.loader, "invoke", &mut self.ctx)?;

        let args_js = json_to_js_value(args, &mut self.ctx)?;
        let outcome = invoke
            .call(
                &JsValue::from(self.loader.clone()),
                &[JsValue::from(handler), args_js],
                &mut self.ctx,
            )
            .map_err(|e| self.failed(&e.to_string()))?;

        self.ctx.run_jobs();

        let outcome = outcome
            .as_object()
            .cloned()
            .ok_or_else(|| self.failed("handler produced no outcome"))?;

        let settled = self.read_flag(&outcome, "settled")?;
        if !settled {
            return Err(self.failed("returned promise never settled"));
        }

        if self.read_flag(&outcome, "failed")? {
            let error = outcome
                .get(js_string!("error"), &mut self.ctx)
                .map_err(|e| self.failed(&e.to_string()))?;
            let message = error
                .as_string()
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(self.failed(&message));
        }

        let value = outcome
            .get(js_string!("value"), &mut self.ctx)
            .map_err(|e| self.failed(&e.to_string()))?;
        js_value_to_json(value, &mut self.ctx)
    }

    fn read_flag(&mut self, outcome: &JsObject, key: &str) -> Result<bool> {
        outcome
            .get(JsString::from(key), &mut self.ctx)
            .map(|v| v.to_boolean())
            .map_err(|e| self.failed(&e.to_string()))
    }

    fn method(object: &JsObject, key: &str, ctx: &mut Context) -> Result<JsObject> {
        object
            .get(JsString::from(key), ctx)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .filter(|o| o.is_callable())
            .ok_or_else(|| LambdaError::InvalidFunction(format!("Loader has no '{}' method", key)))
    }

    fn invalid(&self, message: &str) -> LambdaError {
        LambdaError::InvalidFunction(format!("Function '{}': {}", self.name, message))
    }

    fn failed(&self, message: &str) -> LambdaError {
        LambdaError::FunctionExecutionFailed(format!("Function '{}': {}", self.name, message))
    }
}
