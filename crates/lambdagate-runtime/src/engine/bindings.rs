//! Host bindings for function modules.
//!
//! Functions are written as CommonJS-style modules. The prelude below runs in
//! every fresh context and installs:
//!
//! - `require(name)` - relative files are resolved against the requiring
//!   module's directory, bare names against the dependency store
//!   (`node_modules/<name>`, honouring `package.json` `main`)
//! - `console.log/info/warn/error/debug` - forwarded to `tracing`
//!
//! File resolution and logging are native functions on a host object that is
//! passed to the prelude; nothing host-specific is left on the global object.

use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::{FunctionObjectBuilder, JsObject, ObjectInitializer},
    property::Attribute,
    Context, JsArgs, JsNativeError, JsResult, JsString, JsValue, Source,
};
use lambdagate_common::{LambdaError, Result};
use std::path::{Path, PathBuf};

/// Installs `require` and `console`, then returns the module loader.
///
/// Called as `prelude(host, functionDir, dependencyDir, lenient, name)`; the
/// returned `load(code)` evaluates the entry module and yields its exports.
/// `invoke(handler, args)` captures both synchronous throws and promise
/// outcomes into a plain record read back by the host.
const PRELUDE: &str = r#"
(function (host, functionDir, dependencyDir, lenient, name) {
    var cache = Object.create(null);

    function describe(error) {
        if (error instanceof Error) {
            return error.name + ': ' + error.message;
        }
        if (typeof error === 'string') {
            return error;
        }
        try {
            return JSON.stringify(error);
        } catch (e) {
            return String(error);
        }
    }

    function evaluate(module, code, dir) {
        var wrapper = new Function('module', 'exports', 'require', code);
        wrapper.call(module.exports, module, module.exports, makeRequire(dir));
        return module.exports;
    }

    function makeRequire(fromDir) {
        return function require(request) {
            var resolved = host.resolve(fromDir, String(request), dependencyDir);
            if (resolved === null) {
                if (lenient) {
                    return {};
                }
                throw new Error("Cannot find module '" + request + "'");
            }
            var cached = cache[resolved.path];
            if (cached !== undefined) {
                return cached.exports;
            }
            var module = { exports: {} };
            cache[resolved.path] = module;
            if (resolved.json) {
                module.exports = JSON.parse(resolved.code);
                return module.exports;
            }
            return evaluate(module, resolved.code, resolved.dir);
        };
    }

    function format(args) {
        var parts = [];
        for (var i = 0; i < args.length; i++) {
            var arg = args[i];
            if (typeof arg === 'string') {
                parts.push(arg);
            } else if (arg instanceof Error) {
                parts.push(describe(arg));
            } else {
                try {
                    var text = JSON.stringify(arg);
                    parts.push(text === undefined ? String(arg) : text);
                } catch (e) {
                    parts.push(String(arg));
                }
            }
        }
        return parts.join(' ');
    }

    function logger(level) {
        return function () {
            host.log(name, level, format(arguments));
        };
    }

    globalThis.require = makeRequire(functionDir);
    globalThis.console = {
        log: logger('info'),
        info: logger('info'),
        debug: logger('debug'),
        warn: logger('warn'),
        error: logger('error'),
    };

    return {
        load: function (code) {
            var module = { exports: {} };
            globalThis.module = module;
            globalThis.exports = module.exports;
            return evaluate(module, code, functionDir);
        },
        invoke: function (handler, args) {
            var outcome = { settled: false, failed: false, value: undefined, error: undefined };
            function fulfil(value) {
                outcome.settled = true;
                outcome.value = value;
            }
            function reject(error) {
                outcome.settled = true;
                outcome.failed = true;
                outcome.error = describe(error);
            }
            try {
                var result = handler(args);
                if (result !== null && typeof result === 'object' && typeof result.then === 'function') {
                    result.then(fulfil, reject);
                } else {
                    fulfil(result);
                }
            } catch (e) {
                reject(e);
            }
            return outcome;
        },
    };
})
"#;

/// Settings the prelude is instantiated with.
#[derive(Debug, Clone)]
pub(crate) struct ModuleSettings<'a> {
    pub name: &'a str,
    pub directory: &'a Path,
    pub dependency_dir: &'a str,
    /// Unresolvable `require` calls yield `{}` instead of throwing
    pub lenient: bool,
}

/// Evaluates the prelude and returns the `{ load, invoke }` loader object.
pub(crate) fn install_module_bindings(ctx: &mut Context, settings: &ModuleSettings<'_>) -> Result<JsObject> {
    let host = ObjectInitializer::new(ctx).build();

    let resolve_fn = FunctionObjectBuilder::new(ctx.realm(), NativeFunction::from_fn_ptr(resolve_module))
        .name(js_string!("resolve"))
        .length(3)
        .build();
    host.set(js_string!("resolve"), resolve_fn, false, ctx)
        .map_err(|e| LambdaError::InvalidFunction(e.to_string()))?;

    let log_fn = FunctionObjectBuilder::new(ctx.realm(), NativeFunction::from_fn_ptr(log_message))
        .name(js_string!("log"))
        .length(3)
        .build();
    host.set(js_string!("log"), log_fn, false, ctx)
        .map_err(|e| LambdaError::InvalidFunction(e.to_string()))?;

    let prelude = ctx
        .eval(Source::from_bytes(PRELUDE))
        .map_err(|e| LambdaError::InvalidFunction(format!("Prelude evaluation error: {}", e)))?;
    let prelude = prelude
        .as_object()
        .filter(|o| o.is_callable())
        .cloned()
        .ok_or_else(|| LambdaError::InvalidFunction("Prelude is not a function".into()))?;

    let args = [
        JsValue::from(host),
        JsValue::new(JsString::from(settings.directory.to_string_lossy().as_ref())),
        JsValue::new(JsString::from(settings.dependency_dir)),
        JsValue::new(settings.lenient),
        JsValue::new(JsString::from(settings.name)),
    ];
    let loader = prelude
        .call(&JsValue::undefined(), &args, ctx)
        .map_err(|e| LambdaError::InvalidFunction(format!("Prelude setup error: {}", e)))?;

    loader
        .as_object()
        .cloned()
        .ok_or_else(|| LambdaError::InvalidFunction("Prelude returned no loader".into()))
}

/// `host.resolve(fromDir, request, dependencyDir)`
///
/// Returns `null` when nothing matches, otherwise
/// `{ path, dir, code, json }` for the resolved file.
fn resolve_module(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let from_dir = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    let request = args.get_or_undefined(1).to_string(context)?.to_std_string_escaped();
    let dependency_dir = args.get_or_undefined(2).to_string(context)?.to_std_string_escaped();

    let Some(path) = resolve_request(Path::new(&from_dir), &request, &dependency_dir) else {
        tracing::debug!("Module '{}' not found from {}", request, from_dir);
        return Ok(JsValue::null());
    };

    let code = std::fs::read_to_string(&path).map_err(|e| {
        JsNativeError::error().with_message(format!("Failed to read module {}: {}", path.display(), e))
    })?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let is_json = path.extension().is_some_and(|ext| ext == "json");

    let record = ObjectInitializer::new(context)
        .property(
            js_string!("path"),
            JsString::from(path.to_string_lossy().as_ref()),
            Attribute::all(),
        )
        .property(
            js_string!("dir"),
            JsString::from(dir.to_string_lossy().as_ref()),
            Attribute::all(),
        )
        .property(js_string!("code"), JsString::from(code.as_str()), Attribute::all())
        .property(js_string!("json"), is_json, Attribute::all())
        .build();

    Ok(record.into())
}

/// `host.log(name, level, message)`
fn log_message(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let name = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    let level = args.get_or_undefined(1).to_string(context)?.to_std_string_escaped();
    let message = args.get_or_undefined(2).to_string(context)?.to_std_string_escaped();

    match level.as_str() {
        "error" => tracing::error!(function = %name, "{}", message),
        "warn" => tracing::warn!(function = %name, "{}", message),
        "debug" => tracing::debug!(function = %name, "{}", message),
        _ => tracing::info!(function = %name, "{}", message),
    }

    Ok(JsValue::undefined())
}

/// Resolves a `require` request to a file on disk.
///
/// Relative (`./`, `../`) and absolute requests are resolved against
/// `from_dir`; bare names are looked up in `<ancestor>/<dependency_dir>/` for
/// `from_dir` and each of its ancestors, nearest first.
pub(crate) fn resolve_request(from_dir: &Path, request: &str, dependency_dir: &str) -> Option<PathBuf> {
    if request.is_empty() {
        return None;
    }

    if request.starts_with("./") || request.starts_with("../") || request.starts_with('/') {
        let base = from_dir.join(request);
        return resolve_file(&base).or_else(|| resolve_directory(&base));
    }

    from_dir.ancestors().find_map(|ancestor| {
        let base = ancestor.join(dependency_dir).join(request);
        resolve_file(&base).or_else(|| resolve_directory(&base))
    })
}

fn resolve_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    ["js", "json"].iter().find_map(|ext| {
        let mut candidate = base.as_os_str().to_owned();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

fn resolve_directory(base: &Path) -> Option<PathBuf> {
    if !base.is_dir() {
        return None;
    }

    if let Some(main) = package_main(&base.join("package.json")) {
        let target = base.join(main);
        if let Some(found) = resolve_file(&target) {
            return Some(found);
        }
        let index = target.join("index.js");
        if index.is_file() {
            return Some(index);
        }
    }

    let index = base.join("index.js");
    index.is_file().then_some(index)
}

fn package_main(manifest: &Path) -> Option<String> {
    let text = std::fs::read_to_string(manifest).ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    value
        .get("main")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_relative_request_tries_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("util.js"), "").unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();

        assert_eq!(
            resolve_request(dir.path(), "./util", "node_modules"),
            Some(dir.path().join("./util.js"))
        );
        assert_eq!(
            resolve_request(dir.path(), "./data", "node_modules"),
            Some(dir.path().join("./data.json"))
        );
        assert_eq!(resolve_request(dir.path(), "./missing", "node_modules"), None);
    }

    #[test]
    fn test_bare_request_uses_package_main() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("node_modules/left-pad");
        fs::create_dir_all(pkg.join("lib")).unwrap();
        fs::write(pkg.join("package.json"), r#"{"main": "lib/pad.js"}"#).unwrap();
        fs::write(pkg.join("lib/pad.js"), "").unwrap();

        let resolved = resolve_request(dir.path(), "left-pad", "node_modules").unwrap();
        assert_eq!(resolved, pkg.join("lib/pad.js"));
    }

    #[test]
    fn test_bare_request_defaults_to_index() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("node_modules/tiny");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("index.js"), "").unwrap();

        let resolved = resolve_request(dir.path(), "tiny", "node_modules").unwrap();
        assert_eq!(resolved, pkg.join("index.js"));
    }

    #[test]
    fn test_bare_request_searches_ancestors() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("node_modules/shared");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("index.js"), "").unwrap();
        let nested = dir.path().join("node_modules/other/lib");
        fs::create_dir_all(&nested).unwrap();

        let resolved = resolve_request(&nested, "shared", "node_modules").unwrap();
        assert_eq!(resolved, pkg.join("index.js"));
    }

    #[test]
    fn test_missing_bare_request() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_request(dir.path(), "nope-not-here-xyz", "node_modules"), None);
    }
}
