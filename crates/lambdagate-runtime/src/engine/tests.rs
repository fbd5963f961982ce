use crate::config::ResourceLimits;
use crate::engine::{BoaEngine, ExecutionEngine, FunctionSource};
use lambdagate_common::LambdaError;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn create_test_function(dir: &TempDir, code: &str) -> FunctionSource {
    let directory = dir.path().join("fn");
    fs::create_dir_all(&directory).unwrap();
    let source_path = directory.join("index.js");
    fs::write(&source_path, code).unwrap();
    FunctionSource {
        name: "fn".to_string(),
        directory,
        source_path,
        code: code.to_string(),
    }
}

#[test]
fn test_handler_property() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = {
            handler: function (args) { return { msg: 'hi ' + args.name }; },
        };
    "#);

    let handle = BoaEngine::default().load(source).unwrap();
    assert!(handle.dependencies().is_empty());
    let result = handle.invoke(json!({"name": "bob"})).unwrap();
    assert_eq!(result, json!({"msg": "hi bob"}));
}

#[test]
fn test_exports_shorthand() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, "exports.handler = (args) => args.a + args.b;");

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({"a": 5, "b": 3})).unwrap(), json!(8));
}

#[test]
fn test_callable_module_exports() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, "module.exports = function (args) { return args; };");

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({"x": [1, 2]})).unwrap(), json!({"x": [1, 2]}));
}

#[test]
fn test_declared_dependencies() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        var pad = require('left-pad');
        module.exports = {
            dependencies: ['left-pad', 'lodash'],
            handler: function () { return typeof pad; },
        };
    "#);

    // left-pad is not installed yet; loading still succeeds
    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.dependencies(), ["left-pad".to_string(), "lodash".to_string()]);

    // At invocation time the missing module is an error
    let err = handle.invoke(json!({})).unwrap_err();
    assert!(err.to_string().contains("Cannot find module"));
}

#[test]
fn test_require_installed_dependency() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = {
            dependencies: ['shout'],
            handler: function (args) { return require('shout')(args.text); },
        };
    "#);
    let pkg = source.directory.join("node_modules/shout");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join("index.js"), "module.exports = function (s) { return s.toUpperCase(); };").unwrap();

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({"text": "hey"})).unwrap(), json!("HEY"));
}

#[test]
fn test_require_relative_module() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        var helper = require('./lib/helper');
        module.exports = { handler: function () { return helper.answer(); } };
    "#);
    fs::create_dir_all(source.directory.join("lib")).unwrap();
    fs::write(
        source.directory.join("lib/helper.js"),
        "var data = require('./data.json'); exports.answer = function () { return data.value; };",
    )
    .unwrap();
    fs::write(source.directory.join("lib/data.json"), r#"{"value": 42}"#).unwrap();

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({})).unwrap(), json!(42));
}

#[test]
fn test_async_handler() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = {
            handler: async function (args) {
                var doubled = await Promise.resolve(args.n * 2);
                return { doubled: doubled };
            },
        };
    "#);

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({"n": 21})).unwrap(), json!({"doubled": 42}));
}

#[test]
fn test_rejected_promise_is_execution_failure() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = { handler: async function () { throw new Error('boom'); } };
    "#);

    let handle = BoaEngine::default().load(source).unwrap();
    let err = handle.invoke(json!({})).unwrap_err();
    assert!(matches!(err, LambdaError::FunctionExecutionFailed(_)));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn test_thrown_error_is_execution_failure() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = { handler: function () { throw new TypeError('bad input'); } };
    "#);

    let handle = BoaEngine::default().load(source).unwrap();
    let err = handle.invoke(json!({})).unwrap_err();
    assert!(matches!(err, LambdaError::FunctionExecutionFailed(_)));
    assert!(err.to_string().contains("TypeError: bad input"));
}

#[test]
fn test_syntax_error_is_invalid_function() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, "this is not valid javascript ))");

    let err = BoaEngine::default().load(source).err().unwrap();
    assert!(matches!(err, LambdaError::InvalidFunction(_)));
}

#[test]
fn test_missing_handler_is_invalid_function() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, "module.exports = { notAHandler: 1 };");

    let err = BoaEngine::default().load(source).err().unwrap();
    assert!(matches!(err, LambdaError::InvalidFunction(_)));
    assert!(err.to_string().contains("handler"));
}

#[test]
fn test_non_string_dependency_is_invalid_function() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = { dependencies: [42], handler: function () {} };
    "#);

    let err = BoaEngine::default().load(source).err().unwrap();
    assert!(matches!(err, LambdaError::InvalidFunction(_)));
}

#[test]
fn test_fresh_context_per_invocation() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        var counter = 0;
        module.exports = { handler: function () { counter += 1; return counter; } };
    "#);

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({})).unwrap(), json!(1));
    assert_eq!(handle.invoke(json!({})).unwrap(), json!(1));
}

#[test]
fn test_console_is_available() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = {
            handler: function (args) {
                console.log('received', args);
                console.error(new Error('logged, not thrown'));
                return 'ok';
            },
        };
    "#);

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({"a": 1})).unwrap(), json!("ok"));
}

#[test]
fn test_loop_iteration_limit_stops_runaway_handler() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, r#"
        module.exports = { handler: function () { while (true) {} } };
    "#);

    let limits = ResourceLimits::new().with_loop_iteration_limit(10_000);
    let handle = BoaEngine::new(limits, "node_modules").load(source).unwrap();
    assert!(handle.invoke(json!({})).is_err());
}

#[test]
fn test_undefined_result_is_null() {
    let dir = TempDir::new().unwrap();
    let source = create_test_function(&dir, "module.exports = { handler: function () {} };");

    let handle = BoaEngine::default().load(source).unwrap();
    assert_eq!(handle.invoke(json!({})).unwrap(), json!(null));
}
