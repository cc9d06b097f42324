// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! One element of a pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::expression::ConfigValue;

/// A validated output key.
///
/// When present on a step, the step's result is merged into the context
/// under `@<key>` instead of replacing the implicit value. Keys must be
/// identifier-shaped; validation happens at construction and at the serde
/// boundary so a corrupt mod definition fails before execution starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OutputKey(String);

impl OutputKey {
    /// Validate and wrap an output key.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let mut chars = key.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(OutputKey(key))
        } else {
            Err(Error::configuration(format!(
                "invalid outputKey: {key:?} (must be a valid identifier)"
            )))
        }
    }

    /// The bare key name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespaced context key (`@<key>`).
    #[must_use]
    pub fn context_key(&self) -> String {
        format!("@{}", self.0)
    }
}

impl TryFrom<String> for OutputKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        OutputKey::new(value)
    }
}

impl From<OutputKey> for String {
    fn from(key: OutputKey) -> Self {
        key.0
    }
}

/// One brick invocation inside a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Registry id of the brick to invoke
    pub brick_id: String,

    /// Optional human label, surfaced in spans and error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Config fields, each a literal or a tagged expression
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,

    /// Merge the result under `@<key>` instead of replacing the implicit value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<OutputKey>,

    /// Gate: a falsy condition short-circuits the rest of the pipeline
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "if")]
    pub condition: Option<ConfigValue>,

    /// Force root-aware treatment even if the brick does not declare it
    #[serde(default)]
    pub is_root_aware: bool,

    /// Identifies this step instance in traces and error context
    #[serde(default = "Uuid::new_v4")]
    pub instance_id: Uuid,
}

impl Step {
    /// Create a step invoking the given brick with an empty config.
    #[must_use]
    pub fn new(brick_id: impl Into<String>) -> Self {
        Step {
            brick_id: brick_id.into(),
            label: None,
            config: BTreeMap::new(),
            output_key: None,
            condition: None,
            is_root_aware: false,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Add a config field.
    #[must_use]
    pub fn with_config(mut self, field: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(field.into(), value.into());
        self
    }

    /// Set the output key.
    #[must_use]
    pub fn with_output_key(mut self, key: OutputKey) -> Self {
        self.output_key = Some(key);
        self
    }

    /// Set the condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<ConfigValue>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set the human label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
