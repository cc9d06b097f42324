// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Per-invocation data flow: initial values, options, and the RunContext
//! threaded between steps.

use std::sync::Arc;

use serde_json::Value;

use crate::state::ModComponentRef;
use crate::JsonObject;

use super::api_version::ApiVersion;
use super::logging::{NullLogger, PipelineLogger, TracingLogger};
use super::step::OutputKey;

/// Default bound on sub-pipeline nesting. Mod definitions deep enough to
/// hit this are self-referential, not legitimate.
pub const DEFAULT_MAX_PIPELINE_DEPTH: usize = 64;

/// What a pipeline run is anchored to on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootTarget {
    /// The whole document
    Document,
    /// A specific element, identified by selector
    Element(String),
}

/// The root environment a starter brick observed when it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRoot {
    /// Where the run is anchored
    pub target: RootTarget,
    /// Whether the run originates inside an iframe
    pub in_frame: bool,
}

impl RunRoot {
    /// A top-frame, document-anchored root (the common case).
    #[must_use]
    pub fn document() -> Self {
        RunRoot {
            target: RootTarget::Document,
            in_frame: false,
        }
    }

    /// An element-anchored root.
    #[must_use]
    pub fn element(selector: impl Into<String>) -> Self {
        RunRoot {
            target: RootTarget::Element(selector.into()),
            in_frame: false,
        }
    }
}

/// What a starter brick hands the reducer for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct InitialValues {
    /// Reader/trigger output, exposed as `@input` and as bare fields
    pub input: JsonObject,
    /// Root environment, if the starter brick knows one
    pub root: Option<RunRoot>,
    /// Resolved integration credentials/config (`@`-prefixed keys)
    pub service_context: JsonObject,
    /// Mod option values, exposed as `@options`
    pub options_args: JsonObject,
}

/// Options governing one pipeline run.
#[derive(Clone)]
pub struct RunOptions {
    /// Declared semantics of the mod component; never upgraded silently
    pub api_version: ApiVersion,
    /// Diagnostics sink; never used for control flow
    pub logger: Arc<dyn PipelineLogger>,
    /// Identifies the mod component for logging and error context
    pub component: Option<ModComponentRef>,
    /// Block-scoped argument a calling brick supplies to a sub-pipeline
    /// (loop item, click event); exposed to expressions as `@arg`
    pub explicit_arg: Option<Value>,
    /// Bound on sub-pipeline nesting depth
    pub max_pipeline_depth: usize,
}

impl RunOptions {
    /// Options with the tracing logger and default depth bound.
    #[must_use]
    pub fn new(api_version: ApiVersion) -> Self {
        RunOptions {
            api_version,
            logger: Arc::new(TracingLogger::default()),
            component: None,
            explicit_arg: None,
            max_pipeline_depth: DEFAULT_MAX_PIPELINE_DEPTH,
        }
    }

    /// Options with no logging at all (tests).
    #[must_use]
    pub fn silent(api_version: ApiVersion) -> Self {
        RunOptions {
            logger: Arc::new(NullLogger),
            ..RunOptions::new(api_version)
        }
    }

    /// Attach the mod component identity.
    #[must_use]
    pub fn with_component(mut self, component: ModComponentRef) -> Self {
        self.component = Some(component);
        self
    }

    /// Supply a block-scoped `@arg` value.
    #[must_use]
    pub fn with_explicit_arg(mut self, arg: Value) -> Self {
        self.explicit_arg = Some(arg);
        self
    }
}

/// The data-flow state threaded between a pipeline's steps.
///
/// Created once per invocation and exclusively owned by it. Sub-pipeline
/// runs get a child context seeded from the closure's captured
/// environment: they inherit what was visible at closure creation but
/// can never mutate the parent's context.
#[derive(Debug, Clone)]
pub struct RunContext {
    api_version: ApiVersion,
    /// Original input, exposed as `@input` (never mutated)
    input: JsonObject,
    /// Mod options, exposed as `@options`
    options_args: JsonObject,
    /// Integration context, merged into the render context as-is
    service_context: JsonObject,
    /// Bare top-level fields; starts as the input, evolves only under v1
    bare: JsonObject,
    /// Named outputs, keyed with their `@` prefix
    named_outputs: JsonObject,
    /// The implicit "current value"
    implicit: Value,
}

impl RunContext {
    /// Context for a fresh top-level run. The caller's objects are cloned
    /// up front so the reducer never mutates caller-owned data.
    #[must_use]
    pub fn new(api_version: ApiVersion, initial: &InitialValues) -> Self {
        RunContext {
            api_version,
            input: initial.input.clone(),
            options_args: initial.options_args.clone(),
            service_context: initial.service_context.clone(),
            bare: initial.input.clone(),
            named_outputs: JsonObject::new(),
            implicit: Value::Null,
        }
    }

    /// Child context seeded from a closure's captured render context.
    #[must_use]
    pub fn from_captured(api_version: ApiVersion, captured: &JsonObject) -> Self {
        let mut input = JsonObject::new();
        let mut options_args = JsonObject::new();
        let mut named_outputs = JsonObject::new();
        let mut bare = JsonObject::new();

        for (key, value) in captured {
            match key.as_str() {
                "@input" => {
                    if let Value::Object(map) = value {
                        input = map.clone();
                    }
                }
                "@options" => {
                    if let Value::Object(map) = value {
                        options_args = map.clone();
                    }
                }
                k if k.starts_with('@') => {
                    named_outputs.insert(key.clone(), value.clone());
                }
                _ => {
                    bare.insert(key.clone(), value.clone());
                }
            }
        }

        RunContext {
            api_version,
            input,
            options_args,
            service_context: JsonObject::new(),
            bare,
            named_outputs,
            implicit: Value::Null,
        }
    }

    /// Flattened view the resolver evaluates expressions against.
    #[must_use]
    pub fn render_context(&self) -> JsonObject {
        let mut context = self.bare.clone();
        for (key, value) in &self.service_context {
            context.insert(key.clone(), value.clone());
        }
        for (key, value) in &self.named_outputs {
            context.insert(key.clone(), value.clone());
        }
        context.insert("@input".to_string(), Value::Object(self.input.clone()));
        context.insert(
            "@options".to_string(),
            Value::Object(self.options_args.clone()),
        );
        context
    }

    /// Add or overwrite a named (`@`-prefixed) context entry.
    pub fn set_named(&mut self, key: impl Into<String>, value: Value) {
        self.named_outputs.insert(key.into(), value);
    }

    /// Fold one step's result into the context.
    ///
    /// With an output key, the result is added as a named output and the
    /// implicit value survives. Otherwise the result becomes the implicit
    /// value; under v1's implicit merge, an object result is additionally
    /// shallow-merged onto the bare context so later bare `{{field}}`
    /// references see it.
    pub(crate) fn fold(&mut self, output_key: Option<&OutputKey>, result: Value) {
        if let Some(key) = output_key {
            self.named_outputs.insert(key.context_key(), result);
            return;
        }
        if self.api_version.implicit_context_merge() {
            if let Value::Object(map) = &result {
                for (k, v) in map {
                    self.bare.insert(k.clone(), v.clone());
                }
                self.implicit = Value::Object(self.bare.clone());
                return;
            }
        }
        self.implicit = result;
    }

    /// The current implicit value.
    #[must_use]
    pub fn implicit(&self) -> &Value {
        &self.implicit
    }

    /// Value a run returns when a condition gates the rest of the
    /// pipeline. Version policy: v1 returns the raw merged context, v2
    /// returns `{}`, v3 leaves the implicit value unchanged.
    #[must_use]
    pub fn short_circuit_value(&self) -> Value {
        match self.api_version {
            ApiVersion::V1 => Value::Object(self.bare.clone()),
            ApiVersion::V2 => Value::Object(JsonObject::new()),
            ApiVersion::V3 => self.implicit.clone(),
        }
    }

    /// Final value of a completed run. Under v1 the merged raw context is
    /// the result; later versions return the implicit value.
    #[must_use]
    pub fn into_final_value(self) -> Value {
        match self.api_version {
            ApiVersion::V1 => Value::Object(self.bare),
            ApiVersion::V2 | ApiVersion::V3 => self.implicit,
        }
    }
}
