// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The three template engines.
//!
//! - **mustache**: hand-rolled interpolation pass. Missing variables
//!   render as empty string. Fast path for the overwhelmingly common
//!   `{{path}}` substitution; no sections or partials.
//! - **nunjucks**: rendered with tera (jinja2-compatible). The engine's
//!   native behavior is preserved, including its rejection of undefined
//!   variables.
//! - **handlebars**: rendered with the handlebars crate in non-strict
//!   mode, so missing variables render as empty string.
//!
//! Context keys in this runtime start with `@` (`@input`, `@options`,
//! named outputs). Tera and handlebars both reserve `@` in identifiers,
//! so templates for those engines are rewritten to a safe alias before
//! rendering, with the context mirrored under the same alias.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::JsonObject;

use super::path::walk_path;

fn at_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("static @-reference pattern")
    })
}

fn interpolation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\{\{.+?\}\}|\{%.+?%\}").expect("static interpolation marker pattern")
    })
}

/// Whether a template string carries any interpolation markers for the
/// given engine family. `{%..%}` blocks only count for nunjucks.
#[must_use]
pub fn has_interpolation(engine: &str, template: &str) -> bool {
    interpolation_regex()
        .find_iter(template)
        .any(|m| engine == "nunjucks" || m.as_str().starts_with("{{"))
}

/// Render a JSON value the way a template substitution should print it.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Render a mustache template against a context.
///
/// Scans for `{{ path }}` markers and substitutes the path's value from
/// the context; a missing path renders as empty string. Unterminated
/// markers are kept as literal text.
#[must_use]
pub fn render_mustache(template: &str, context: &JsonObject) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some(start) = remaining.find("{{") {
        result.push_str(&remaining[..start]);
        remaining = &remaining[start..];

        if let Some(end) = remaining.find("}}") {
            let inner = remaining[2..end].trim();
            // `{{& path}}` / `{{{path}}}`-style unescape markers carry no
            // meaning here (output is not HTML); strip and resolve.
            let triple = inner.starts_with('{');
            let path = inner.trim_start_matches(['&', '{']).trim_end_matches('}').trim();
            if let Some(value) = walk_path(context, path) {
                result.push_str(&value_to_string(value));
            }
            remaining = &remaining[end + 2..];
            if triple {
                remaining = remaining.strip_prefix('}').unwrap_or(remaining);
            }
        } else {
            result.push_str(remaining);
            remaining = "";
        }
    }

    result.push_str(remaining);
    result
}

/// Rewrite `@name` references to an engine-safe alias.
fn sanitize_at_refs(template: &str) -> String {
    at_ref_regex().replace_all(template, "__at_$1").into_owned()
}

/// Mirror `@`-prefixed context keys under the engine-safe alias.
fn sanitize_context(context: &JsonObject) -> JsonObject {
    let mut sanitized = context.clone();
    for (key, value) in context {
        if let Some(name) = key.strip_prefix('@') {
            sanitized.insert(format!("__at_{name}"), value.clone());
        }
    }
    sanitized
}

/// Render a nunjucks template with tera.
///
/// Tera's native semantics apply: referencing an undefined variable is a
/// render error, surfaced as a template error.
pub fn render_nunjucks(template: &str, context: &JsonObject) -> Result<String> {
    let sanitized = sanitize_context(context);
    let tera_context =
        tera::Context::from_serialize(Value::Object(sanitized)).map_err(|e| Error::Template {
            engine: "nunjucks",
            message: e.to_string(),
        })?;
    tera::Tera::one_off(&sanitize_at_refs(template), &tera_context, false).map_err(|e| {
        Error::Template {
            engine: "nunjucks",
            message: e.to_string(),
        }
    })
}

/// Render a handlebars template.
///
/// Non-strict mode: missing variables render as empty string.
pub fn render_handlebars(template: &str, context: &JsonObject) -> Result<String> {
    let registry = handlebars::Handlebars::new();
    let sanitized = sanitize_context(context);
    registry
        .render_template(&sanitize_at_refs(template), &Value::Object(sanitized))
        .map_err(|e| Error::Template {
            engine: "handlebars",
            message: e.to_string(),
        })
}
