//! Pattern-based request router.
//!
//! Path patterns are compiled once at startup into regular expressions with
//! named capture groups ([`pattern`]); the [`Router`] tries routes in
//! registration order per HTTP method, first match wins; registration
//! order is the tie-break for overlapping patterns. CORS preflight answers
//! are synthesized in [`cors`].

mod core;
pub mod cors;
mod pattern;

pub use core::{ParamVec, RouteEntry, RouteMatch, Router, MAX_INLINE_PARAMS};

use thiserror::Error;

/// Route table construction failures. Raised at startup, never while
/// serving.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern {pattern:?}: {reason}")]
    BadPattern { pattern: String, reason: String },
}
