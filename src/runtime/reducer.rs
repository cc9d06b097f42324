// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The pipeline reducer: an ordered fold of brick invocations over a
//! run context.
//!
//! Per-step order is fixed: condition, config resolution, root decision,
//! brick invocation (the only suspension point), fold. A falsy condition
//! short-circuits the remainder of the pipeline with the API version's
//! policy value. The reducer holds no run state of its own; everything a
//! run needs lives in the [`RunContext`] it exclusively owns.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::expression::{
    render_mustache, resolve, ConfigValue, PipelineClosure, ResolvedValue,
};
use crate::JsonObject;

use super::api_version::{is_truthy, ApiVersion};
use super::brick::{BrickArgs, BrickContext, BrickRegistry};
use super::context::{InitialValues, RootTarget, RunContext, RunOptions, RunRoot};
use super::logging::LogContext;
use super::step::Step;

/// Tags one closure invocation among repeats of the same closure, so
/// loop iterations are distinguishable in traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// What the branch iterates over (e.g. the loop config field)
    pub key: String,
    /// Zero-based invocation counter
    pub counter: usize,
}

/// Executes pipelines against a brick registry.
///
/// Stateless apart from the registry handle; one reducer can serve any
/// number of concurrent runs.
pub struct PipelineReducer {
    registry: Arc<dyn BrickRegistry>,
}

impl PipelineReducer {
    /// A reducer over the given registry.
    #[must_use]
    pub fn new(registry: Arc<dyn BrickRegistry>) -> Self {
        PipelineReducer { registry }
    }

    /// Run a pipeline to completion.
    ///
    /// Returns the final context value (version-dependent, see
    /// [`RunContext::into_final_value`]), the short-circuit value if a
    /// condition gated the run, or the first error.
    pub async fn run(
        &self,
        pipeline: &[Step],
        initial: InitialValues,
        options: &RunOptions,
    ) -> Result<Value> {
        let mut ctx = RunContext::new(options.api_version, &initial);
        if let Some(arg) = &options.explicit_arg {
            ctx.set_named("@arg", arg.clone());
        }
        let span = tracing::info_span!(
            "pipeline.run",
            api_version = %options.api_version,
            steps = pipeline.len(),
        );
        self.run_steps(pipeline, ctx, initial.root.as_ref(), options, 0)
            .instrument(span)
            .await
    }

    /// Entry point for sub-pipeline closures.
    ///
    /// Seeds a child context from the closure's captured environment and
    /// merges the `extra` map on top, then runs the closure's steps one
    /// nesting level deeper.
    pub(crate) async fn run_closure(
        &self,
        closure: &PipelineClosure,
        extra: JsonObject,
        options: &RunOptions,
        root: Option<&RunRoot>,
        depth: usize,
        branch: Option<Branch>,
    ) -> Result<Value> {
        let mut ctx = RunContext::from_captured(options.api_version, &closure.captured);
        for (key, value) in extra {
            ctx.set_named(key, value);
        }
        let branch = branch.unwrap_or(Branch {
            key: String::new(),
            counter: 0,
        });
        let span = tracing::info_span!(
            "pipeline.closure",
            depth,
            branch_key = %branch.key,
            branch_counter = branch.counter,
        );
        self.run_steps(&closure.steps, ctx, root, options, depth)
            .instrument(span)
            .await
    }

    async fn run_steps(
        &self,
        steps: &[Step],
        mut ctx: RunContext,
        root: Option<&RunRoot>,
        options: &RunOptions,
        depth: usize,
    ) -> Result<Value> {
        if depth > options.max_pipeline_depth {
            return Err(Error::configuration(format!(
                "sub-pipeline nesting exceeded {} levels; the mod definition is self-referential",
                options.max_pipeline_depth
            )));
        }

        let base = LogContext {
            mod_id: options
                .component
                .as_ref()
                .map(|c| c.mod_id.clone()),
            component_id: options
                .component
                .as_ref()
                .and_then(|c| c.mod_component_id),
            ..LogContext::default()
        };

        for (step_index, step) in steps.iter().enumerate() {
            let render = ctx.render_context();

            if let Some(condition) = &step.condition {
                if !evaluate_condition(condition, &render, options.api_version)? {
                    options.logger.debug(
                        &base,
                        &format!("condition gated pipeline at step {step_index}"),
                    );
                    return Ok(ctx.short_circuit_value());
                }
            }

            let mut fields = BTreeMap::new();
            for (field, value) in &step.config {
                fields.insert(field.clone(), resolve(value, &render)?);
            }
            let args = BrickArgs::new(fields);

            let brick = self
                .registry
                .lookup(&step.brick_id)
                .ok_or_else(|| Error::BrickNotFound(step.brick_id.clone()))?;

            if brick.is_root_aware() || step.is_root_aware {
                check_root(&step.brick_id, root)?;
            }

            let step_ctx = base.for_step(
                &step.brick_id,
                step.instance_id,
                step_index,
                step.label.as_deref(),
            );
            let logger = options.logger.child(step_ctx.clone());
            logger.on_step_start(&step_ctx);

            let span = tracing::info_span!(
                "step.execute",
                mod_id = step_ctx.mod_id.as_deref().unwrap_or(""),
                brick_id = %step.brick_id,
                instance_id = %step.instance_id,
                step_index,
                label = step.label.as_deref().unwrap_or(""),
            );
            let invocation = brick.run(
                args,
                BrickContext {
                    runner: self,
                    options,
                    root,
                    logger: &*logger,
                    depth,
                },
            );
            match invocation.instrument(span).await {
                Ok(result) => {
                    logger.on_step_end(&step_ctx, &result);
                    ctx.fold(step.output_key.as_ref(), result);
                }
                Err(err) => {
                    let wrapped = Error::BrickFailed {
                        brick_id: step.brick_id.clone(),
                        instance_id: step.instance_id,
                        step_index,
                        source: Box::new(err),
                    };
                    logger.on_step_error(&step_ctx, &wrapped);
                    return Err(wrapped);
                }
            }
        }

        Ok(ctx.into_final_value())
    }
}

/// A root-aware brick cannot run inside a frame unless the run is
/// anchored to an explicit element.
fn check_root(brick_id: &str, root: Option<&RunRoot>) -> Result<()> {
    if let Some(root) = root {
        if root.in_frame && !matches!(root.target, RootTarget::Element(_)) {
            return Err(Error::business(format!(
                "Brick '{brick_id}' requires a target element and cannot run in a frame"
            )));
        }
    }
    Ok(())
}

/// Decide whether a step's condition lets execution continue.
///
/// Under v1/v2 an untagged string is rendered as a mustache template and
/// the rendered string is truth-tested, so `"{{missing}}"` gates. From v3
/// on, untagged values are plain literals and conditions must use
/// explicit expressions. A condition can never be a closure or a deferred
/// structure.
fn evaluate_condition(
    condition: &ConfigValue,
    render: &JsonObject,
    version: ApiVersion,
) -> Result<bool> {
    if let ConfigValue::Literal(Value::String(template)) = condition {
        if version.string_condition_is_template() {
            let rendered = render_mustache(template, render);
            return Ok(is_truthy(&Value::String(rendered)));
        }
    }
    match resolve(condition, render)? {
        ResolvedValue::Json(value) => Ok(is_truthy(&value)),
        ResolvedValue::Closure(_) | ResolvedValue::Deferred(_) => Err(Error::configuration(
            "a pipeline or defer expression cannot be used as a step condition",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::runtime::brick::{Brick, InMemoryBrickRegistry};
    use crate::runtime::step::OutputKey;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Brick for Echo {
        fn id(&self) -> &str {
            "test/echo"
        }

        async fn run(&self, args: BrickArgs, _ctx: BrickContext<'_>) -> Result<Value> {
            Ok(json!({ "message": args.require_json("message")?.clone() }))
        }
    }

    struct Identity;

    #[async_trait]
    impl Brick for Identity {
        fn id(&self) -> &str {
            "test/identity"
        }

        async fn run(&self, args: BrickArgs, _ctx: BrickContext<'_>) -> Result<Value> {
            Ok(args.json("value").cloned().unwrap_or(Value::Null))
        }
    }

    struct Fail;

    #[async_trait]
    impl Brick for Fail {
        fn id(&self) -> &str {
            "test/fail"
        }

        async fn run(&self, _args: BrickArgs, _ctx: BrickContext<'_>) -> Result<Value> {
            Err(Error::business("deliberate failure"))
        }
    }

    /// Runs its `body` closure once per item in `items`, returning the
    /// collected results.
    struct ForEach;

    #[async_trait]
    impl Brick for ForEach {
        fn id(&self) -> &str {
            "test/for_each"
        }

        async fn run(&self, args: BrickArgs, ctx: BrickContext<'_>) -> Result<Value> {
            let items = args
                .require_json("items")?
                .as_array()
                .cloned()
                .unwrap_or_default();
            let body = args.require_closure("body")?;
            let mut results = Vec::with_capacity(items.len());
            for (counter, item) in items.into_iter().enumerate() {
                let mut extra = JsonObject::new();
                extra.insert("@arg".to_string(), item);
                let branch = Branch {
                    key: "items".to_string(),
                    counter,
                };
                results.push(ctx.run_closure_branched(body, extra, branch).await?);
            }
            Ok(Value::Array(results))
        }
    }

    /// Invokes itself through a closure forever; only the depth guard
    /// stops it.
    struct Recurse;

    #[async_trait]
    impl Brick for Recurse {
        fn id(&self) -> &str {
            "test/recurse"
        }

        async fn run(&self, _args: BrickArgs, ctx: BrickContext<'_>) -> Result<Value> {
            let closure = PipelineClosure {
                steps: vec![Step::new("test/recurse")],
                captured: JsonObject::new(),
            };
            ctx.run_closure(&closure, JsonObject::new()).await
        }
    }

    struct NeedsRoot;

    #[async_trait]
    impl Brick for NeedsRoot {
        fn id(&self) -> &str {
            "test/needs_root"
        }

        fn is_root_aware(&self) -> bool {
            true
        }

        async fn run(&self, _args: BrickArgs, _ctx: BrickContext<'_>) -> Result<Value> {
            Ok(json!("shown"))
        }
    }

    fn reducer() -> PipelineReducer {
        let registry = InMemoryBrickRegistry::new();
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(Identity));
        registry.register(Arc::new(Fail));
        registry.register(Arc::new(ForEach));
        registry.register(Arc::new(Recurse));
        registry.register(Arc::new(NeedsRoot));
        PipelineReducer::new(Arc::new(registry))
    }

    fn input(value: Value) -> InitialValues {
        let input = match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        InitialValues {
            input,
            ..InitialValues::default()
        }
    }

    #[tokio::test]
    async fn test_mustache_echo_v3() {
        let pipeline = vec![Step::new("test/echo")
            .with_config("message", Expression::Mustache("{{name}}".into()))];
        let result = reducer()
            .run(
                &pipeline,
                input(json!({"name": "Ada"})),
                &RunOptions::silent(ApiVersion::V3),
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"message": "Ada"}));
    }

    #[tokio::test]
    async fn test_output_key_chaining() {
        let pipeline = vec![
            Step::new("test/identity")
                .with_config("value", json!({"x": 1}))
                .with_output_key(OutputKey::new("first").unwrap()),
            Step::new("test/identity")
                .with_config("value", Expression::Var("@first.x".into())),
        ];
        let result = reducer()
            .run(
                &pipeline,
                input(json!({})),
                &RunOptions::silent(ApiVersion::V3),
            )
            .await
            .unwrap();
        assert_eq!(result, json!(1));
    }

    #[tokio::test]
    async fn test_falsy_condition_short_circuits_v2_vs_v1() {
        let pipeline = vec![Step::new("test/echo")
            .with_config("message", json!("never"))
            .with_condition(Expression::Var("@input.run".into()))];
        let initial = json!({"name": "Ada", "run": false});

        let v2 = reducer()
            .run(
                &pipeline,
                input(initial.clone()),
                &RunOptions::silent(ApiVersion::V2),
            )
            .await
            .unwrap();
        assert_eq!(v2, json!({}));

        let v1 = reducer()
            .run(
                &pipeline,
                input(initial),
                &RunOptions::silent(ApiVersion::V1),
            )
            .await
            .unwrap();
        assert_eq!(v1, json!({"name": "Ada", "run": false}));
    }

    #[tokio::test]
    async fn test_untagged_string_condition_is_template_before_v3() {
        let pipeline = vec![Step::new("test/echo")
            .with_config("message", json!("ran"))
            .with_condition(json!("{{missing}}"))];

        // v2: renders to "", which is falsy
        let v2 = reducer()
            .run(
                &pipeline,
                input(json!({})),
                &RunOptions::silent(ApiVersion::V2),
            )
            .await
            .unwrap();
        assert_eq!(v2, json!({}));

        // v3: the string is a plain literal, and "{{missing}}" is truthy
        let v3 = reducer()
            .run(
                &pipeline,
                input(json!({})),
                &RunOptions::silent(ApiVersion::V3),
            )
            .await
            .unwrap();
        assert_eq!(v3, json!({"message": "ran"}));
    }

    #[tokio::test]
    async fn test_brick_error_wrapped_with_step_identity() {
        let pipeline = vec![
            Step::new("test/echo").with_config("message", json!("ok")),
            Step::new("test/fail"),
        ];
        let err = reducer()
            .run(
                &pipeline,
                input(json!({})),
                &RunOptions::silent(ApiVersion::V3),
            )
            .await
            .unwrap_err();
        match err {
            Error::BrickFailed {
                brick_id,
                step_index,
                source,
                ..
            } => {
                assert_eq!(brick_id, "test/fail");
                assert_eq!(step_index, 1);
                assert!(matches!(*source, Error::Business(_)));
            }
            other => panic!("expected BrickFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_brick() {
        let pipeline = vec![Step::new("test/nope")];
        let err = reducer()
            .run(
                &pipeline,
                input(json!({})),
                &RunOptions::silent(ApiVersion::V3),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BrickNotFound(id) if id == "test/nope"));
    }

    #[tokio::test]
    async fn test_root_aware_brick_rejected_in_frame() {
        let pipeline = vec![Step::new("test/needs_root")];
        let mut initial = input(json!({}));
        initial.root = Some(RunRoot {
            target: RootTarget::Document,
            in_frame: true,
        });
        let err = reducer()
            .run(&pipeline, initial, &RunOptions::silent(ApiVersion::V3))
            .await
            .unwrap_err();
        assert!(err.is_user_facing());

        // An explicit element target makes the same placement legal
        let mut initial = input(json!({}));
        initial.root = Some(RunRoot {
            target: RootTarget::Element("#panel".into()),
            in_frame: true,
        });
        let result = reducer()
            .run(&pipeline, initial, &RunOptions::silent(ApiVersion::V3))
            .await
            .unwrap();
        assert_eq!(result, json!("shown"));
    }

    #[tokio::test]
    async fn test_closure_runs_with_arg() {
        // body: identity over @arg, invoked per item
        let body = vec![Step::new("test/identity")
            .with_config("value", Expression::Var("@arg".into()))];
        let pipeline = vec![Step::new("test/for_each")
            .with_config("items", json!([1, 2, 3]))
            .with_config("body", Expression::Pipeline(body))];
        let result = reducer()
            .run(
                &pipeline,
                input(json!({})),
                &RunOptions::silent(ApiVersion::V3),
            )
            .await
            .unwrap();
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_closure_sees_captured_named_outputs() {
        let body = vec![Step::new("test/identity")
            .with_config("value", Expression::Var("@first".into()))];
        let pipeline = vec![
            Step::new("test/identity")
                .with_config("value", json!("captured"))
                .with_output_key(OutputKey::new("first").unwrap()),
            Step::new("test/for_each")
                .with_config("items", json!([0]))
                .with_config("body", Expression::Pipeline(body)),
        ];
        let result = reducer()
            .run(
                &pipeline,
                input(json!({})),
                &RunOptions::silent(ApiVersion::V3),
            )
            .await
            .unwrap();
        assert_eq!(result, json!(["captured"]));
    }

    #[tokio::test]
    async fn test_depth_guard_stops_self_reference() {
        let pipeline = vec![Step::new("test/recurse")];
        let mut options = RunOptions::silent(ApiVersion::V3);
        options.max_pipeline_depth = 8;
        let err = reducer()
            .run(&pipeline, input(json!({})), &options)
            .await
            .unwrap_err();
        // Innermost error is the guard; it surfaces wrapped per level
        let mut cause: &Error = &err;
        while let Error::BrickFailed { source, .. } = cause {
            cause = source;
        }
        assert!(matches!(cause, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_explicit_arg_exposed_at_top_level() {
        let pipeline = vec![Step::new("test/identity")
            .with_config("value", Expression::Var("@arg.item".into()))];
        let options =
            RunOptions::silent(ApiVersion::V3).with_explicit_arg(json!({"item": 7}));
        let result = reducer()
            .run(&pipeline, input(json!({})), &options)
            .await
            .unwrap();
        assert_eq!(result, json!(7));
    }
}
