// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The resolver: one expression plus a context, producing a value.

use serde_json::Value;

use crate::error::Result;
use crate::JsonObject;

use super::model::{ConfigValue, Expression, PipelineClosure, ResolvedValue};
use super::path::walk_path;
use super::templates::{render_handlebars, render_mustache, render_nunjucks};

/// Resolve one config field against a render context.
///
/// Literals pass through unchanged. Template kinds render to strings.
/// `var` paths walk the context, yielding `null` for any missing segment.
/// `pipeline` captures the context into a closure without executing.
/// `defer` hands back the raw structure for later re-resolution.
///
/// A tagged object whose `__type__` is unrecognized falls into the
/// literal arm at deserialization time (untagged fallback); it is a
/// corrupt mod definition and is rejected here rather than passed to a
/// brick as data.
pub fn resolve(value: &ConfigValue, context: &JsonObject) -> Result<ResolvedValue> {
    match value {
        ConfigValue::Literal(v) if Expression::is_expression_value(v) => {
            let expr = Expression::from_value(v.clone())?;
            resolve_expression(&expr, context)
        }
        ConfigValue::Literal(v) => Ok(ResolvedValue::Json(v.clone())),
        ConfigValue::Expression(expr) => resolve_expression(expr, context),
    }
}

/// Resolve a tagged expression against a render context.
pub fn resolve_expression(expr: &Expression, context: &JsonObject) -> Result<ResolvedValue> {
    match expr {
        Expression::Mustache(template) => Ok(ResolvedValue::Json(Value::String(
            render_mustache(template, context),
        ))),
        Expression::Nunjucks(template) => Ok(ResolvedValue::Json(Value::String(
            render_nunjucks(template, context)?,
        ))),
        Expression::Handlebars(template) => Ok(ResolvedValue::Json(Value::String(
            render_handlebars(template, context)?,
        ))),
        // Missing paths resolve to null, never an error; consumers decide
        // whether an absent value is acceptable.
        Expression::Var(path) => Ok(ResolvedValue::Json(
            walk_path(context, path).cloned().unwrap_or(Value::Null),
        )),
        Expression::Pipeline(steps) => Ok(ResolvedValue::Closure(PipelineClosure {
            steps: steps.clone(),
            captured: context.clone(),
        })),
        Expression::Defer(inner) => Ok(ResolvedValue::Deferred(inner.clone())),
    }
}

/// Re-resolve a deferred structure once the caller is ready for it.
///
/// Walks the structure; embedded expression objects (wire shape) are
/// resolved in place. Nested `pipeline` and `defer` expressions stay
/// raw: a closure is not JSON, and a defer inside a defer waits for its
/// own explicit resolution.
pub fn resolve_deferred(value: &Value, context: &JsonObject) -> Result<Value> {
    match value {
        Value::Object(map) => {
            if Expression::is_expression_value(value) {
                let expr = Expression::from_value(value.clone())?;
                return match resolve_expression(&expr, context)? {
                    ResolvedValue::Json(v) => Ok(v),
                    ResolvedValue::Closure(_) | ResolvedValue::Deferred(_) => Ok(value.clone()),
                };
            }
            let mut resolved = JsonObject::new();
            for (key, v) in map {
                resolved.insert(key.clone(), resolve_deferred(v, context)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|v| resolve_deferred(v, context))
                .collect::<Result<Vec<_>>>()?,
        )),
        _ => Ok(value.clone()),
    }
}
