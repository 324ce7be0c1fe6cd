//! Explicit registry for auth strategies and exception handlers.
//!
//! Constructed once at startup and handed to the dispatcher, so multiple
//! independent server instances can coexist in one process (the tests rely
//! on this). Both lists are ordered: strategies are tried and exception
//! handlers are matched in registration order.

use std::sync::Arc;

use crate::error::HandlerError;
use crate::response::Response;
use crate::security::AuthStrategy;

type ExceptionMapper = Box<dyn Fn(&HandlerError) -> Option<Response> + Send + Sync>;

/// Ordered registries consumed by the dispatcher.
#[derive(Default)]
pub struct Registry {
    strategies: Vec<Arc<dyn AuthStrategy>>,
    exception_handlers: Vec<ExceptionMapper>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an authentication strategy. Order matters: the dispatcher
    /// tries strategies first-registered-first.
    pub fn register_strategy(&mut self, strategy: Arc<dyn AuthStrategy>) {
        self.strategies.push(strategy);
    }

    /// Register a response mapping for one concrete error type.
    ///
    /// The first registered handler whose type matches a raised error
    /// produces the response; later registrations for the same type never
    /// run.
    pub fn register_exception<E, F>(&mut self, map: F)
    where
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&E) -> Response + Send + Sync + 'static,
    {
        self.exception_handlers.push(Box::new(move |err| {
            err.downcast_ref::<E>().map(&map)
        }));
    }

    pub(crate) fn strategies(&self) -> &[Arc<dyn AuthStrategy>] {
        &self.strategies
    }

    /// Walk the registered exception handlers in order; first type match
    /// wins.
    pub(crate) fn map_exception(&self, err: &HandlerError) -> Option<Response> {
        self.exception_handlers
            .iter()
            .find_map(|handler| handler(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("missing track {0}")]
    struct TrackMissing(u64);

    #[derive(Debug, Error)]
    #[error("broken")]
    struct Unrelated;

    #[test]
    fn first_type_match_wins() {
        let mut registry = Registry::new();
        registry.register_exception::<TrackMissing, _>(|e| {
            Response::error(StatusCode::NOT_FOUND, &e.to_string())
        });
        registry.register_exception::<TrackMissing, _>(|_| {
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, "shadowed")
        });

        let err: HandlerError = Box::new(TrackMissing(7));
        let resp = registry.map_exception(&err).unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unmatched_type_falls_through() {
        let mut registry = Registry::new();
        registry.register_exception::<TrackMissing, _>(|e| {
            Response::error(StatusCode::NOT_FOUND, &e.to_string())
        });
        let err: HandlerError = Box::new(Unrelated);
        assert!(registry.map_exception(&err).is_none());
    }
}
