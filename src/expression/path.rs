// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Context path parsing and traversal.
//!
//! Paths use the `var` grammar: dot-separated keys with optional bracket
//! segments, e.g. `@input.items[0].name` or `@input["dotted.key"]`.
//! A missing segment yields `None`; path lookups never fail.

use serde_json::Value;

use crate::JsonObject;

/// One segment of a parsed context path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key lookup
    Key(String),
    /// Array index lookup
    Index(usize),
}

/// Parse a path string into segments.
///
/// Splits on `.` outside brackets. Bracket segments hold either a
/// numeric index (`[0]`) or a quoted key (`["some.key"]`, `['k']`).
/// An unterminated bracket is treated as a literal key rather than an
/// error; lookups on garbage paths simply miss.
#[must_use]
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    // Unterminated bracket: keep as a literal key
                    segments.push(PathSegment::Key(format!("[{inner}")));
                    continue;
                }
                let trimmed = inner.trim();
                if let Ok(index) = trimmed.parse::<usize>() {
                    segments.push(PathSegment::Index(index));
                } else {
                    let unquoted = trimmed
                        .strip_prefix('"')
                        .and_then(|s| s.strip_suffix('"'))
                        .or_else(|| {
                            trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\''))
                        })
                        .unwrap_or(trimmed);
                    segments.push(PathSegment::Key(unquoted.to_string()));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }

    segments
}

/// Walk a path against a context object.
///
/// Returns `None` when any segment is missing or the shape does not
/// match (index into a non-array, key into a non-object).
#[must_use]
pub fn walk_path<'a>(context: &'a JsonObject, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path);
    let mut segments = segments.into_iter();

    let mut current = match segments.next()? {
        PathSegment::Key(k) => context.get(&k)?,
        PathSegment::Index(_) => return None,
    };

    for segment in segments {
        current = match segment {
            PathSegment::Key(k) => current.as_object()?.get(&k)?,
            PathSegment::Index(i) => current.as_array()?.get(i)?,
        };
    }

    Some(current)
}
