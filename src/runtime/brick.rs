// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The brick abstraction: the unit of work a pipeline step invokes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::expression::{PipelineClosure, ResolvedValue};
use crate::JsonObject;

use super::context::{RunOptions, RunRoot};
use super::logging::PipelineLogger;
use super::reducer::{Branch, PipelineReducer};

/// A step's fully resolved config, keyed by field name.
///
/// Every value has already been rendered against the run context; bricks
/// never see raw templates. Fields resolve to plain JSON, to a pipeline
/// closure, or to a deferred structure, and the accessors here let a brick
/// demand the shape it needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrickArgs(BTreeMap<String, ResolvedValue>);

impl BrickArgs {
    /// Wrap a resolved config map.
    #[must_use]
    pub fn new(fields: BTreeMap<String, ResolvedValue>) -> Self {
        BrickArgs(fields)
    }

    /// Whether the field is present at all. An explicit `null` literal is
    /// present; an omitted field is not.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The raw resolved value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&ResolvedValue> {
        self.0.get(field)
    }

    /// The field as plain JSON, if present and concrete.
    #[must_use]
    pub fn json(&self, field: &str) -> Option<&Value> {
        self.0.get(field).and_then(ResolvedValue::as_json)
    }

    /// The field as plain JSON, required.
    pub fn require_json(&self, field: &str) -> Result<&Value> {
        self.json(field).ok_or_else(|| {
            Error::invalid_input(format!("missing or non-JSON config field: {field:?}"))
        })
    }

    /// The field as a pipeline closure, if present and one.
    #[must_use]
    pub fn closure(&self, field: &str) -> Option<&PipelineClosure> {
        self.0.get(field).and_then(ResolvedValue::as_closure)
    }

    /// The field as a pipeline closure, required.
    pub fn require_closure(&self, field: &str) -> Result<&PipelineClosure> {
        self.closure(field).ok_or_else(|| {
            Error::invalid_input(format!("config field {field:?} must be a pipeline"))
        })
    }

    /// The field as a deferred structure, if present and one.
    #[must_use]
    pub fn deferred(&self, field: &str) -> Option<&Value> {
        self.0.get(field).and_then(ResolvedValue::as_deferred)
    }

    /// Iterate over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The concrete-JSON subset of the args as one object. Closure and
    /// deferred fields are omitted.
    #[must_use]
    pub fn to_json_object(&self) -> JsonObject {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_json().map(|j| (k.clone(), j.clone())))
            .collect()
    }
}

/// Execution services handed to a brick alongside its args.
///
/// Borrowed from the reducer for the duration of one step; a brick cannot
/// stash it. Sub-pipeline execution goes through here so the depth guard
/// and version semantics stay with the run that owns them.
pub struct BrickContext<'a> {
    pub(crate) runner: &'a PipelineReducer,
    pub(crate) options: &'a RunOptions,
    pub(crate) root: Option<&'a RunRoot>,
    pub(crate) logger: &'a dyn PipelineLogger,
    pub(crate) depth: usize,
}

impl BrickContext<'_> {
    /// The root environment of this run, if the starter brick knew one.
    #[must_use]
    pub fn root(&self) -> Option<&RunRoot> {
        self.root
    }

    /// The run options (API version, depth bound, logger).
    #[must_use]
    pub fn options(&self) -> &RunOptions {
        self.options
    }

    /// The diagnostics sink scoped to the current step.
    #[must_use]
    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger
    }

    /// Execute a pipeline closure in a child context.
    ///
    /// The child sees the closure's captured environment plus the `extra`
    /// map (keys are inserted as-is, so `@`-prefixed keys become named
    /// context entries). Nesting past the run's depth bound is a
    /// configuration error.
    pub async fn run_closure(
        &self,
        closure: &PipelineClosure,
        extra: JsonObject,
    ) -> Result<Value> {
        self.runner
            .run_closure(closure, extra, self.options, self.root, self.depth + 1, None)
            .await
    }

    /// Like [`run_closure`](Self::run_closure), tagging the child run's
    /// span with a branch key and counter so repeated invocations of the
    /// same closure (loop iterations, repeated clicks) are
    /// distinguishable in traces.
    pub async fn run_closure_branched(
        &self,
        closure: &PipelineClosure,
        extra: JsonObject,
        branch: Branch,
    ) -> Result<Value> {
        self.runner
            .run_closure(
                closure,
                extra,
                self.options,
                self.root,
                self.depth + 1,
                Some(branch),
            )
            .await
    }
}

/// The unit of work a pipeline step invokes.
#[async_trait]
pub trait Brick: Send + Sync {
    /// Registry id, e.g. `"example/echo"`.
    fn id(&self) -> &str;

    /// Whether this brick requires a concrete root target. Root-aware
    /// bricks cannot run inside a frame without an explicit element
    /// target.
    fn is_root_aware(&self) -> bool {
        false
    }

    /// Execute with resolved args.
    async fn run(&self, args: BrickArgs, ctx: BrickContext<'_>) -> Result<Value>;
}

/// Lookup of bricks by registry id.
pub trait BrickRegistry: Send + Sync {
    /// The brick registered under `id`, if any.
    fn lookup(&self, id: &str) -> Option<Arc<dyn Brick>>;
}

/// Concurrent in-memory registry.
#[derive(Default)]
pub struct InMemoryBrickRegistry {
    bricks: DashMap<String, Arc<dyn Brick>>,
}

impl InMemoryBrickRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a brick under its own id, replacing any previous
    /// registration.
    pub fn register(&self, brick: Arc<dyn Brick>) {
        self.bricks.insert(brick.id().to_string(), brick);
    }
}

impl BrickRegistry for InMemoryBrickRegistry {
    fn lookup(&self, id: &str) -> Option<Arc<dyn Brick>> {
        self.bricks.get(id).map(|entry| Arc::clone(entry.value()))
    }
}
