//! Request dispatch: validation, authentication, invocation, and
//! exception-to-response mapping.
//!
//! Every step short-circuits to an HTTP response; nothing below this layer
//! ever sees an uncaught failure, which is what keeps a connection thread
//! alive across misbehaving handlers. The pipeline, in order: auth
//! resolution, query validation, header validation, body validation,
//! invocation, exception mapping, timing guard.

use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};

use http::StatusCode;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::endpoint::{AuthRequirement, BodyKind, BodySpec, EndpointDescriptor, ParamSpec};
use crate::registry::Registry;
use crate::request::Request;
use crate::response::Response;
use crate::router::RouteMatch;
use crate::security::AuthContext;

/// Drives validated, authenticated handler invocations.
///
/// Holds the [`Registry`] of auth strategies and exception handlers; all
/// other per-request state lives on the [`Request`] itself. One dispatcher
/// is shared read-only across every connection thread.
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Run the full pipeline for a matched route.
    pub fn dispatch(&self, req: &mut Request<'_>, matched: &RouteMatch) -> Response {
        let endpoint = &matched.route.endpoint;
        req.path_params = matched.path_params.clone();

        if let Some(resp) = self.resolve_auth(req, endpoint) {
            return resp;
        }
        if let Some(resp) = Self::validate_query(req, &endpoint.query) {
            return resp;
        }
        if let Some(resp) = Self::validate_headers(req, &endpoint.headers) {
            return resp;
        }
        if let Some(resp) = Self::validate_body(req, endpoint.body.as_ref()) {
            return resp;
        }

        let response = self.invoke(req, endpoint);

        if let Some(threshold) = endpoint.slow_after {
            let elapsed = req.started.elapsed();
            if elapsed > threshold {
                warn!(
                    method = %req.method,
                    path = %req.path,
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "handler exceeded its declared time threshold"
                );
            }
        }

        response
    }

    /// Try each registered strategy in order until one yields a principal.
    fn resolve_auth(&self, req: &mut Request<'_>, endpoint: &EndpointDescriptor) -> Option<Response> {
        let AuthRequirement::Required { scopes } = &endpoint.auth else {
            return None;
        };
        let ctx = AuthContext {
            headers: &req.headers,
            query: &req.query,
            cookies: &req.cookies,
        };
        for strategy in self.registry.strategies() {
            if let Some(principal) = strategy.authenticate(&ctx, scopes) {
                debug!(principal = %principal.id, path = %req.path, "request authenticated");
                req.principal = Some(principal);
                return None;
            }
        }
        info!(method = %req.method, path = %req.path, "no auth strategy yielded a principal");
        Some(Response::error(StatusCode::UNAUTHORIZED, "unauthorized"))
    }

    fn validate_query(req: &mut Request<'_>, specs: &[ParamSpec]) -> Option<Response> {
        for spec in specs {
            let raw = req.query.all(&spec.name);
            let value = match validate_values(spec, raw) {
                Ok(v) => v,
                Err(resp) => return Some(resp),
            };
            if let Some(value) = value {
                req.args.insert(spec.name.clone(), value);
            }
        }
        None
    }

    fn validate_headers(req: &mut Request<'_>, specs: &[ParamSpec]) -> Option<Response> {
        for spec in specs {
            let raw: Vec<String> = req
                .headers
                .get(&spec.name)
                .map(|v| vec![v.to_string()])
                .unwrap_or_default();
            let value = match validate_values(spec, &raw) {
                Ok(v) => v,
                Err(resp) => return Some(resp),
            };
            if let Some(value) = value {
                req.header_args.insert(spec.name.clone(), value);
            }
        }
        None
    }

    /// Check content type against the declared acceptances, then decode.
    fn validate_body(req: &mut Request<'_>, spec: Option<&BodySpec>) -> Option<Response> {
        let spec = spec?;
        let content_type = req.headers.get("content-type").unwrap_or("").to_string();
        let accepted = spec
            .content_types
            .iter()
            .any(|ct| content_type.starts_with(ct.as_str()));
        if !accepted {
            return Some(Response::error(
                StatusCode::BAD_REQUEST,
                &format!("unsupported content type {content_type:?}"),
            ));
        }
        match &spec.kind {
            // Raw decoded stream passes straight through to the handler.
            BodyKind::Stream => None,
            BodyKind::Json { required_fields } => {
                let mut raw = Vec::new();
                if let Err(e) = req.body.read_to_end(&mut raw) {
                    debug!(error = %e, "body read failed during validation");
                    return Some(Response::error(
                        StatusCode::BAD_REQUEST,
                        "unreadable request body",
                    ));
                }
                let value: Value = match serde_json::from_slice(&raw) {
                    Ok(v) => v,
                    Err(_) => {
                        return Some(Response::error(
                            StatusCode::BAD_REQUEST,
                            "malformed JSON body",
                        ))
                    }
                };
                for field in required_fields {
                    if value.get(field).is_none() {
                        return Some(Response::error(
                            StatusCode::BAD_REQUEST,
                            &format!("missing required field {field:?}"),
                        ));
                    }
                }
                req.json = Some(value);
                None
            }
        }
    }

    /// Call the handler, mapping raised errors and panics to responses.
    fn invoke(&self, req: &mut Request<'_>, endpoint: &EndpointDescriptor) -> Response {
        let outcome = catch_unwind(AssertUnwindSafe(|| endpoint.handler.handle(req)));
        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                if let Some(response) = self.registry.map_exception(&err) {
                    debug!(error = %err, status = response.status.as_u16(), "exception mapped to response");
                    return response;
                }
                error!(
                    method = %req.method,
                    path = %req.path,
                    error = %err,
                    "unhandled handler exception"
                );
                Response::error(StatusCode::INTERNAL_SERVER_ERROR, "unhandled exception")
            }
            Err(panic) => {
                error!(
                    method = %req.method,
                    path = %req.path,
                    panic = %panic_message(panic.as_ref()),
                    "handler panicked"
                );
                Response::error(StatusCode::INTERNAL_SERVER_ERROR, "unhandled exception")
            }
        }
    }
}

/// Apply one parameter spec to its raw occurrences.
///
/// Returns `Ok(None)` when the parameter is absent, optional, and has no
/// default. Errors are already shaped as 400 responses naming the
/// parameter.
fn validate_values(spec: &ParamSpec, raw: &[String]) -> Result<Option<Value>, Response> {
    if raw.is_empty() {
        if let Some(default) = &spec.default {
            return Ok(Some(default.clone()));
        }
        if spec.required {
            return Err(Response::error(
                StatusCode::BAD_REQUEST,
                &format!("missing required parameter {:?}", spec.name),
            ));
        }
        return Ok(None);
    }

    let convert = |value: &str| {
        spec.ty.convert(value).map_err(|reason| {
            Response::error(
                StatusCode::BAD_REQUEST,
                &format!("invalid value for parameter {:?}: {reason}", spec.name),
            )
        })
    };

    if spec.repeated {
        let mut values = Vec::with_capacity(raw.len());
        for value in raw {
            values.push(convert(value)?);
        }
        Ok(Some(Value::Array(values)))
    } else {
        // Non-repeated parameters take the first occurrence.
        convert(&raw[0]).map(Some)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
