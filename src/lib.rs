// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! # BrickFlow
//!
//! The brick-pipeline execution runtime of a mod system: declarative
//! pipelines of brick invocations with templated arguments, evaluated
//! step by step against a threaded data-flow context.
//!
//! - [`expression`]: the tagged expression model (`mustache`, `nunjucks`,
//!   `handlebars`, `var`, `pipeline`, `defer`), the resolver, and context
//!   path walking.
//! - [`runtime`]: the pipeline reducer, the [`runtime::Brick`] trait and
//!   registry, run context/options, API-version policy, and step
//!   diagnostics.
//! - [`state`]: the namespaced mod variable store with merge strategies,
//!   schema-derived sync policy, and change notification.
//!
//! Three API versions (`v1`/`v2`/`v3`) changed how implicit context,
//! template conditionals, and short-circuiting behave; published mods keep
//! the semantics they declared, so every run carries its
//! [`runtime::ApiVersion`] and the reducer consults it at each policy
//! point.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use brickflow::expression::Expression;
//! use brickflow::runtime::{
//!     ApiVersion, Brick, BrickArgs, BrickContext, InMemoryBrickRegistry,
//!     InitialValues, PipelineReducer, RunOptions, Step,
//! };
//! use brickflow::Result;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Brick for Echo {
//!     fn id(&self) -> &str {
//!         "example/echo"
//!     }
//!
//!     async fn run(&self, args: BrickArgs, _ctx: BrickContext<'_>) -> Result<Value> {
//!         Ok(json!({ "message": args.require_json("message")?.clone() }))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let registry = InMemoryBrickRegistry::new();
//! registry.register(Arc::new(Echo));
//! let reducer = PipelineReducer::new(Arc::new(registry));
//!
//! let pipeline = vec![Step::new("example/echo")
//!     .with_config("message", Expression::Mustache("{{name}}".into()))];
//! let mut initial = InitialValues::default();
//! initial.input.insert("name".into(), json!("Ada"));
//!
//! let result = reducer
//!     .run(&pipeline, initial, &RunOptions::new(ApiVersion::V3))
//!     .await?;
//! assert_eq!(result, json!({"message": "Ada"}));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod expression;
pub mod runtime;
pub mod state;

pub use error::{Error, ErrorCategory, Result};

/// JSON object alias used throughout the crate for contexts and state.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
