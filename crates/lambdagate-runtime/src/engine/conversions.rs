//! JSON <-> JavaScript value conversions.
//!
//! | JSON Type | JavaScript Type |
//! |-----------|-----------------|
//! | null | null |
//! | boolean | Boolean |
//! | number | Number |
//! | string | String |
//! | array | Array |
//! | object | Object |
//!
//! On the way back, `undefined` becomes `null`, object properties holding
//! `undefined` or a function are dropped (as `JSON.stringify` does), symbols
//! become `null`, and integral numbers are emitted as JSON integers.

use boa_engine::{
    object::{builtins::JsArray, JsObject},
    property::PropertyKey,
    value::JsValue,
    Context, JsString,
};
use lambdagate_common::{LambdaError, Result};
use serde_json::Value as JsonValue;

/// Largest integer a JavaScript number represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Convert `serde_json::Value` to a Boa `JsValue`.
pub fn json_to_js_value(json: JsonValue, ctx: &mut Context) -> Result<JsValue> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(b)),
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(JsValue::new)
            .or_else(|| n.as_f64().map(JsValue::new))
            .ok_or_else(|| LambdaError::InvalidRequest(format!("Number out of range: {}", n))),
        JsonValue::String(s) => Ok(JsValue::new(JsString::from(s.as_str()))),
        JsonValue::Array(arr) => {
            let js_array = JsArray::new(ctx);
            for (i, v) in arr.into_iter().enumerate() {
                let js_value = json_to_js_value(v, ctx)?;
                js_array.push(js_value, ctx).map_err(|e| {
                    LambdaError::FunctionExecutionFailed(format!(
                        "Failed to push array element {}: {}",
                        i, e
                    ))
                })?;
            }
            Ok(js_array.into())
        }
        JsonValue::Object(obj) => {
            let js_obj = JsObject::with_object_proto(ctx.intrinsics());

            for (key, value) in obj {
                let js_value = json_to_js_value(value, ctx)?;
                js_obj
                    .create_data_property_or_throw(JsString::from(key.as_str()), js_value, ctx)
                    .map_err(|e| {
                        LambdaError::FunctionExecutionFailed(format!(
                            "Failed to set property '{}': {}",
                            key, e
                        ))
                    })?;
            }

            Ok(js_obj.into())
        }
    }
}

/// Convert a Boa `JsValue` to `serde_json::Value`.
///
/// # Errors
///
/// Fails on property access errors (e.g. a throwing getter) and on
/// non-finite numbers, which JSON cannot represent.
pub fn js_value_to_json(value: JsValue, ctx: &mut Context) -> Result<JsonValue> {
    if value.is_undefined() || value.is_null() || value.is_symbol() {
        return Ok(JsonValue::Null);
    }

    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }

    if let Some(n) = value.as_number() {
        return number_to_json(n);
    }

    if let Some(s) = value.as_string() {
        return Ok(JsonValue::String(s.to_std_string_escaped()));
    }

    if let Some(obj) = value.as_object() {
        if obj.is_array() {
            let array = JsArray::from_object(obj.clone()).map_err(|e| {
                LambdaError::FunctionExecutionFailed(format!("Object is not a valid array: {}", e))
            })?;

            let length: usize = array
                .length(ctx)
                .map_err(|e| {
                    LambdaError::FunctionExecutionFailed(format!(
                        "Failed to get array length: {}",
                        e
                    ))
                })?
                .try_into()
                .map_err(|_| LambdaError::FunctionExecutionFailed("Array length overflow".into()))?;

            let mut result = Vec::with_capacity(length);
            for i in 0..length {
                let elem = array.get(i, ctx).map_err(|e| {
                    LambdaError::FunctionExecutionFailed(format!(
                        "Failed to get array element {}: {}",
                        i, e
                    ))
                })?;
                result.push(js_value_to_json(elem, ctx)?);
            }
            return Ok(JsonValue::Array(result));
        }

        if obj.is_callable() {
            return Ok(JsonValue::Null);
        }

        let keys = obj.own_property_keys(ctx).map_err(|e| {
            LambdaError::FunctionExecutionFailed(format!("Failed to get object keys: {}", e))
        })?;

        let mut result = serde_json::Map::new();

        for key in keys {
            let key_str = match &key {
                PropertyKey::String(s) => s.to_std_string_escaped(),
                PropertyKey::Index(i) => i.get().to_string(),
                PropertyKey::Symbol(_) => continue,
            };

            let prop_value = obj.get(key.clone(), ctx).map_err(|e| {
                LambdaError::FunctionExecutionFailed(format!(
                    "Failed to get property '{}': {}",
                    key_str, e
                ))
            })?;

            if prop_value.is_undefined() || prop_value.as_object().is_some_and(|o| o.is_callable()) {
                continue;
            }

            result.insert(key_str, js_value_to_json(prop_value, ctx)?);
        }

        return Ok(JsonValue::Object(result));
    }

    Ok(JsonValue::Null)
}

fn number_to_json(n: f64) -> Result<JsonValue> {
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        // -0.0 lands here too and becomes 0
        return Ok(JsonValue::Number((n as i64).into()));
    }

    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .ok_or_else(|| {
            LambdaError::FunctionExecutionFailed(format!("Cannot represent {} as JSON", n))
        })
}
