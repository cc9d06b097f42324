#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Property-based tests for BrickFlow
//!
//! Algebraic properties that should hold for all valid inputs:
//!
//! 1. **Resolution**: literal pass-through, missing-path totality,
//!    template rendering never panics.
//! 2. **Version insensitivity**: pipelines without conditionals or
//!    untagged templates produce identical output across v1/v2/v3.
//! 3. **Merge strategies**: replace idempotence, deep-merge preservation.

use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::{json, Value};

use brickflow::expression::{resolve, ConfigValue, Expression, ResolvedValue};
use brickflow::runtime::{
    ApiVersion, Brick, BrickArgs, BrickContext, InMemoryBrickRegistry, InitialValues, OutputKey,
    PipelineReducer, RunOptions, Step,
};
use brickflow::state::{
    InMemorySessionStorage, MergeStrategy, ModComponentRef, ModVariableStore, StateNamespace,
};
use brickflow::{JsonObject, Result};

/// Returns its `value` config unchanged; the simplest deterministic brick.
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

fn reducer() -> PipelineReducer {
    let registry = InMemoryBrickRegistry::new();
    registry.register(Arc::new(Identity));
    PipelineReducer::new(Arc::new(registry))
}

/// Strategy for arbitrary JSON values of bounded depth
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for arbitrary JSON objects of bounded depth
fn arb_json_object() -> impl Strategy<Value = JsonObject> {
    prop::collection::btree_map("[a-z]{1,6}", arb_json(), 0..5)
        .prop_map(|m| m.into_iter().collect())
}

/// Strategy for dotted context paths
fn arb_path() -> impl Strategy<Value = String> {
    r"@?[a-z_]{1,6}(\.[a-z_]{1,6}){0,3}".prop_map(|s| s)
}

proptest! {
    /// Property: literals resolve to themselves in any context
    #[test]
    fn prop_literal_pass_through(value in arb_json(), context in arb_json_object()) {
        let resolved = resolve(&ConfigValue::Literal(value.clone()), &context).unwrap();
        prop_assert_eq!(resolved, ResolvedValue::Json(value));
    }

    /// Property: var resolution is total; a missing path yields null,
    /// never an error
    #[test]
    fn prop_var_resolution_never_errors(path in arb_path(), context in arb_json_object()) {
        let expr = Expression::Var(path);
        let resolved = resolve(&ConfigValue::Expression(expr), &context).unwrap();
        prop_assert!(matches!(resolved, ResolvedValue::Json(_)));
    }

    /// Property: mustache rendering never panics, whatever the template
    #[test]
    fn prop_mustache_total(template in ".{0,64}", context in arb_json_object()) {
        let _ = brickflow::expression::render_mustache(&template, &context);
    }

    /// Property: pipelines without conditionals or untagged templates
    /// produce identical output across v1/v2/v3. Intermediate steps use
    /// output keys; the final step produces an object, so none of the
    /// version-variant behaviors (implicit merge visibility, template
    /// conditionals, short-circuit values) can come into play.
    #[test]
    fn prop_version_insensitive_pipelines(
        payloads in prop::collection::vec(arb_json_object(), 1..5),
        last in arb_json_object(),
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let mut pipeline: Vec<Step> = payloads
                .iter()
                .enumerate()
                .map(|(i, payload)| {
                    Step::new("test/identity")
                        .with_config("value", Value::Object(payload.clone()))
                        .with_output_key(OutputKey::new(format!("out{i}")).unwrap())
                })
                .collect();
            pipeline.push(
                Step::new("test/identity").with_config("value", Value::Object(last.clone())),
            );

            let reducer = reducer();
            let mut results = Vec::new();
            for version in [ApiVersion::V1, ApiVersion::V2, ApiVersion::V3] {
                let result = reducer
                    .run(
                        &pipeline,
                        InitialValues::default(),
                        &RunOptions::silent(version),
                    )
                    .await
                    .unwrap();
                results.push(result);
            }
            prop_assert_eq!(&results[0], &results[1]);
            prop_assert_eq!(&results[1], &results[2]);
            prop_assert_eq!(&results[2], &Value::Object(last));
            Ok(())
        })?;
    }

    /// Property: REPLACE is idempotent through the store
    #[test]
    fn prop_replace_idempotent(data in arb_json_object()) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let store = ModVariableStore::new(Arc::new(InMemorySessionStorage::new()));
            let mod_ref = ModComponentRef::new("prop-mod");

            let once = store
                .set_state(StateNamespace::Mod, &mod_ref, &data, MergeStrategy::Replace)
                .await
                .unwrap();
            let twice = store
                .set_state(StateNamespace::Mod, &mod_ref, &data, MergeStrategy::Replace)
                .await
                .unwrap();

            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(&once, &data);
            Ok(())
        })?;
    }

    /// Property: DEEP preserves previous keys absent from the update and
    /// takes the update's value for top-level non-object keys
    #[test]
    fn prop_deep_merge_preservation(
        previous in arb_json_object(),
        update in arb_json_object(),
    ) {
        let next = MergeStrategy::Deep.apply(&previous, &update);

        for (key, value) in &previous {
            if !update.contains_key(key) {
                prop_assert_eq!(next.get(key), Some(value));
            }
        }
        for (key, value) in &update {
            match (previous.get(key), value) {
                // Object-into-object merges recursively; anything else
                // takes the update's value wholesale
                (Some(Value::Object(_)), Value::Object(_)) => {}
                _ => prop_assert_eq!(next.get(key), Some(value)),
            }
        }
    }

    /// Property: get after set round-trips the merged result, synced or not
    #[test]
    fn prop_get_set_round_trip(
        first in arb_json_object(),
        second in arb_json_object(),
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let store = ModVariableStore::new(Arc::new(InMemorySessionStorage::new()));
            let mod_ref = ModComponentRef::new("prop-mod");

            store
                .set_state(StateNamespace::Mod, &mod_ref, &first, MergeStrategy::Replace)
                .await
                .unwrap();
            let next = store
                .set_state(StateNamespace::Mod, &mod_ref, &second, MergeStrategy::Shallow)
                .await
                .unwrap();
            let read = store.get_state(StateNamespace::Mod, &mod_ref).await.unwrap();

            prop_assert_eq!(read, next);
            Ok(())
        })?;
    }
}
