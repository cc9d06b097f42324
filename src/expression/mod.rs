// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Expression model and resolution
//!
//! A pipeline step's config is a map of fields, each either a raw JSON
//! literal or a tagged expression (`{"__type__": ..., "__value__": ...}`).
//! This module owns the tagged-union model, the three template engines,
//! variable path walking, and the resolver that turns one expression plus
//! a data context into a concrete value.
//!
//! Resolution is pure: every non-literal expression carries enough
//! information to be re-evaluated deterministically given only a context
//! object. Pipeline expressions resolve to *closures*, not results;
//! execution happens only when a brick invokes the closure.

mod model;
mod path;
mod resolve;
mod templates;

pub use model::{ConfigValue, Expression, PipelineClosure, ResolvedValue};
pub use path::{parse_path, walk_path, PathSegment};
pub use resolve::{resolve, resolve_deferred, resolve_expression};
pub use templates::{has_interpolation, render_handlebars, render_mustache, render_nunjucks};
