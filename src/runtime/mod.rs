// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Pipeline execution runtime
//!
//! The reducer walks an ordered pipeline of brick invocations, resolving
//! each step's templated config against the running context, invoking the
//! target brick through the registry, and folding the result back into
//! the context. Three API-version semantics are honored exactly as the
//! mods that declare them expect; behavior is never upgraded silently.

mod api_version;
mod brick;
mod context;
mod logging;
mod reducer;
mod step;

pub use api_version::{is_truthy, ApiVersion};
pub use brick::{Brick, BrickArgs, BrickContext, BrickRegistry, InMemoryBrickRegistry};
pub use context::{InitialValues, RootTarget, RunContext, RunOptions, RunRoot};
pub use logging::{LogContext, NullLogger, PipelineLogger, TracingLogger};
pub use reducer::{Branch, PipelineReducer};
pub use step::{OutputKey, Step};
