// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! API-version compatibility policy.
//!
//! The runtime's templating semantics changed twice while already-published
//! mods had to keep executing identically, so every pipeline invocation
//! branches on the mod component's declared `apiVersion`. Exactly three
//! behaviors differ between versions; each is an exhaustive match so a
//! future `V4` cannot compile without visiting every policy point.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Declared runtime semantics of a mod component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    /// Original semantics: implicit context merge, template conditionals
    #[serde(rename = "v1")]
    V1,
    /// Structured context; conditionals still accept untagged templates
    #[serde(rename = "v2")]
    V2,
    /// Explicit expressions everywhere
    #[serde(rename = "v3")]
    V3,
}

impl ApiVersion {
    /// Whether a step's raw output is shallow-merged into the top-level
    /// render context, making bare `{{field}}` references see it.
    #[must_use]
    pub fn implicit_context_merge(self) -> bool {
        match self {
            ApiVersion::V1 => true,
            ApiVersion::V2 | ApiVersion::V3 => false,
        }
    }

    /// Whether an untagged string condition is rendered as a mustache
    /// template and then string-truthed. From v3 on, conditions must be
    /// explicit `mustache`/`var` expressions.
    #[must_use]
    pub fn string_condition_is_template(self) -> bool {
        match self {
            ApiVersion::V1 | ApiVersion::V2 => true,
            ApiVersion::V3 => false,
        }
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v1" => Ok(ApiVersion::V1),
            "v2" => Ok(ApiVersion::V2),
            "v3" => Ok(ApiVersion::V3),
            other => Err(Error::configuration(format!(
                "unknown apiVersion tag: {other:?} (expected v1, v2, or v3)"
            ))),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
            ApiVersion::V3 => "v3",
        };
        write!(f, "{tag}")
    }
}

/// Conditional truthiness over JSON values.
///
/// Strings follow the historical template-conditional rule: empty,
/// `"false"`, `"null"` and `"undefined"` are falsy (a rendered template
/// that missed its variable produces one of these), everything else is
/// truthy. Arrays and objects are always truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "false" | "null" | "undefined"),
        Value::Array(_) | Value::Object(_) => true,
    }
}
