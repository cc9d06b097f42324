// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Tagged expression types and the values resolution produces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::runtime::Step;
use crate::JsonObject;

/// A tagged expression, the non-literal half of a config field.
///
/// Serializes in the historical wire shape:
///
/// ```json
/// {"__type__": "mustache", "__value__": "{{name}}"}
/// ```
///
/// The template kinds (`mustache`, `nunjucks`, `handlebars`) hold a
/// template string. `var` holds a dotted/bracketed context path such as
/// `@input.foo[0]`. `pipeline` holds the steps of a sub-pipeline to be
/// captured as a closure. `defer` holds an arbitrary nested structure
/// whose embedded expressions stay unevaluated until explicitly requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__", content = "__value__", rename_all = "lowercase")]
pub enum Expression {
    /// Mustache template, missing variables render as empty string
    Mustache(String),
    /// Nunjucks (jinja2-style) template with the engine's native semantics
    Nunjucks(String),
    /// Handlebars template, missing variables render as empty string
    Handlebars(String),
    /// Context path reference, e.g. `@input.foo[0]`
    Var(String),
    /// Sub-pipeline; resolves to a closure, never executed eagerly
    Pipeline(Vec<Step>),
    /// Deferred structure; embedded expressions are not resolved eagerly
    Defer(Value),
}

impl Expression {
    /// Parse an expression out of a raw JSON value in wire shape.
    ///
    /// An unrecognized `__type__` is a corrupt mod definition, so this
    /// maps serde's rejection to a configuration error rather than a
    /// serialization error.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::configuration(format!("malformed expression: {e}")))
    }

    /// Whether a raw JSON value has the tagged wire shape.
    #[must_use]
    pub fn is_expression_value(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|o| o.contains_key("__type__") && o.contains_key("__value__"))
    }

    /// Whether this expression's template carries any interpolation
    /// markers. Callers use this to tell a blank rendered field apart
    /// from a literal empty template. Non-template kinds report `false`.
    #[must_use]
    pub fn has_interpolation(&self) -> bool {
        match self {
            Expression::Mustache(t) | Expression::Handlebars(t) => {
                super::templates::has_interpolation("mustache", t)
            }
            Expression::Nunjucks(t) => super::templates::has_interpolation("nunjucks", t),
            Expression::Var(_) | Expression::Pipeline(_) | Expression::Defer(_) => false,
        }
    }
}

/// One config field: either a tagged expression or a raw JSON literal.
///
/// Literals pass through resolution unchanged, which lets a pipeline mix
/// raw values and explicit expressions field by field. An explicit
/// `null`/`""` literal is distinguishable from an absent field because
/// the field is present in the config map at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Tagged expression in wire shape
    Expression(Expression),
    /// Raw JSON literal, passed through unchanged
    Literal(Value),
}

impl From<Value> for ConfigValue {
    fn from(v: Value) -> Self {
        ConfigValue::Literal(v)
    }
}

impl From<Expression> for ConfigValue {
    fn from(e: Expression) -> Self {
        ConfigValue::Expression(e)
    }
}

/// A sub-pipeline bound to the context it was resolved in.
///
/// Resolving a `pipeline` expression does not execute anything; it
/// snapshots the render context visible at that point. The reducer's
/// closure entry point later seeds a child run from `captured`, so the
/// closure sees the named outputs that existed at creation time but can
/// never mutate the parent's context.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineClosure {
    /// The steps to run when the closure is invoked
    pub steps: Vec<Step>,
    /// Render context snapshot taken at resolution time
    pub captured: JsonObject,
}

/// The result of resolving one config field.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// A concrete JSON value
    Json(Value),
    /// A callable sub-pipeline closure
    Closure(PipelineClosure),
    /// A deferred structure, embedded expressions intact (wire shape)
    Deferred(Value),
}

impl ResolvedValue {
    /// Borrow the concrete JSON value, if this is one.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResolvedValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Consume into a concrete JSON value, if this is one.
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            ResolvedValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the closure, if this is one.
    #[must_use]
    pub fn as_closure(&self) -> Option<&PipelineClosure> {
        match self {
            ResolvedValue::Closure(c) => Some(c),
            _ => None,
        }
    }

    /// Borrow the deferred structure, if this is one.
    #[must_use]
    pub fn as_deferred(&self) -> Option<&Value> {
        match self {
            ResolvedValue::Deferred(v) => Some(v),
            _ => None,
        }
    }
}
