// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Pipeline diagnostics.
//!
//! The reducer reports step lifecycle events through a [`PipelineLogger`]
//! so hosts can route diagnostics wherever they like (devtools panel,
//! in-memory ring buffer, nothing). Logging is observe-only: no
//! implementation can influence execution, and the reducer never branches
//! on what a logger does.

use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

/// Identifies where in a mod a log event originated.
///
/// Built incrementally: the run-level context carries the mod identity,
/// and [`PipelineLogger::child`] narrows it to a step before the step's
/// events fire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    /// Registry id of the mod, if known
    pub mod_id: Option<String>,
    /// Mod-component instance that owns the run
    pub component_id: Option<Uuid>,
    /// Registry id of the brick being invoked
    pub brick_id: Option<String>,
    /// Instance id of the step definition
    pub instance_id: Option<Uuid>,
    /// Zero-based position in the pipeline
    pub step_index: Option<usize>,
    /// Human label from the step definition
    pub label: Option<String>,
}

impl LogContext {
    /// Narrow this context to one step.
    #[must_use]
    pub fn for_step(
        &self,
        brick_id: &str,
        instance_id: Uuid,
        step_index: usize,
        label: Option<&str>,
    ) -> Self {
        LogContext {
            brick_id: Some(brick_id.to_string()),
            instance_id: Some(instance_id),
            step_index: Some(step_index),
            label: label.map(ToString::to_string),
            ..self.clone()
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.brick_id, self.step_index) {
            (Some(brick), Some(index)) => write!(f, "step {index} ({brick})"),
            (Some(brick), None) => write!(f, "{brick}"),
            _ => write!(f, "pipeline"),
        }
    }
}

/// Observe-only sink for pipeline lifecycle events.
///
/// Implementations must be cheap and must not block: the reducer calls
/// them inline on the execution path.
pub trait PipelineLogger: Send + Sync {
    /// A logger scoped to the given context. Events emitted through the
    /// child carry the narrowed identity.
    fn child(&self, context: LogContext) -> Box<dyn PipelineLogger>;

    /// A step is about to run, with its resolved (rendered) config.
    fn on_step_start(&self, context: &LogContext) {
        let _ = context;
    }

    /// A step completed; `result` is the value folded into the context.
    fn on_step_end(&self, context: &LogContext, result: &Value) {
        let _ = (context, result);
    }

    /// A step failed.
    fn on_step_error(&self, context: &LogContext, error: &Error) {
        let _ = (context, error);
    }

    /// Freeform diagnostic message.
    fn debug(&self, context: &LogContext, message: &str) {
        let _ = (context, message);
    }
}

/// Logger that forwards everything to the `tracing` ecosystem.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    context: LogContext,
}

impl TracingLogger {
    /// Logger carrying the given base context.
    #[must_use]
    pub fn new(context: LogContext) -> Self {
        TracingLogger { context }
    }
}

impl PipelineLogger for TracingLogger {
    fn child(&self, context: LogContext) -> Box<dyn PipelineLogger> {
        Box::new(TracingLogger::new(context))
    }

    fn on_step_start(&self, context: &LogContext) {
        tracing::debug!(
            brick_id = context.brick_id.as_deref().unwrap_or(""),
            step_index = context.step_index.unwrap_or(0),
            label = context.label.as_deref().unwrap_or(""),
            "step start"
        );
    }

    fn on_step_end(&self, context: &LogContext, result: &Value) {
        tracing::debug!(
            brick_id = context.brick_id.as_deref().unwrap_or(""),
            step_index = context.step_index.unwrap_or(0),
            result = %result,
            "step end"
        );
    }

    fn on_step_error(&self, context: &LogContext, error: &Error) {
        tracing::warn!(
            brick_id = context.brick_id.as_deref().unwrap_or(""),
            step_index = context.step_index.unwrap_or(0),
            error = %error,
            "step failed"
        );
    }

    fn debug(&self, context: &LogContext, message: &str) {
        tracing::debug!(context = %context, "{message}");
    }
}

/// Logger that drops everything. Useful in tests and for hosts that
/// attach their own tracing subscriber instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl PipelineLogger for NullLogger {
    fn child(&self, _context: LogContext) -> Box<dyn PipelineLogger> {
        Box::new(NullLogger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_step_narrows_identity() {
        let base = LogContext {
            mod_id: Some("example-mod".into()),
            component_id: Some(Uuid::nil()),
            ..LogContext::default()
        };
        let id = Uuid::new_v4();
        let step = base.for_step("example/echo", id, 3, Some("Echo it"));

        assert_eq!(step.mod_id.as_deref(), Some("example-mod"));
        assert_eq!(step.brick_id.as_deref(), Some("example/echo"));
        assert_eq!(step.instance_id, Some(id));
        assert_eq!(step.step_index, Some(3));
        assert_eq!(step.label.as_deref(), Some("Echo it"));
    }

    #[test]
    fn test_display() {
        let ctx = LogContext::default().for_step("example/echo", Uuid::nil(), 1, None);
        assert_eq!(ctx.to_string(), "step 1 (example/echo)");
        assert_eq!(LogContext::default().to_string(), "pipeline");
    }

    #[test]
    fn test_null_logger_is_inert() {
        let logger = NullLogger;
        let ctx = LogContext::default();
        logger.on_step_start(&ctx);
        logger.on_step_end(&ctx, &Value::Null);
        logger.debug(&ctx, "ignored");
        let child = logger.child(ctx.clone());
        child.on_step_start(&ctx);
    }
}
