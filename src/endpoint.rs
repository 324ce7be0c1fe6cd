//! Endpoint descriptors: the declarative metadata a business resource
//! attaches to each handler it registers.
//!
//! Descriptors are accumulated through [`EndpointBuilder`] at startup and
//! immutable afterwards; the dispatcher consumes them to validate and
//! authenticate every request before the handler runs. Declared response
//! codes are carried for documentation tooling only and never enforced.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde_json::Value;

use crate::error::HandlerError;
use crate::request::Request;
use crate::response::Response;

/// A bound request handler.
///
/// Handlers receive a request that has already passed routing, auth, and
/// validation. Returning an error routes through the registered exception
/// handlers; the connection is never killed by a handler failure.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &mut Request<'_>) -> Result<Response, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request<'_>) -> Result<Response, HandlerError> + Send + Sync,
{
    fn handle(&self, req: &mut Request<'_>) -> Result<Response, HandlerError> {
        self(req)
    }
}

/// Validator applied to a raw query or header string.
#[derive(Clone)]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    /// Caller-supplied conversion; the error string is surfaced in the 400
    /// diagnostic.
    Custom(Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>),
}

impl ParamType {
    /// Convert a raw string value into its validated JSON form.
    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        match self {
            ParamType::Str => Ok(Value::String(raw.to_string())),
            ParamType::Int => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got {raw:?}")),
            ParamType::Float => raw
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("expected a number, got {raw:?}")),
            ParamType::Bool => match raw {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(format!("expected a boolean, got {raw:?}")),
            },
            ParamType::Custom(f) => f(raw),
        }
    }
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Str => write!(f, "Str"),
            ParamType::Int => write!(f, "Int"),
            ParamType::Float => write!(f, "Float"),
            ParamType::Bool => write!(f, "Bool"),
            ParamType::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// One declared query parameter or header.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    /// Repeated parameters collect every occurrence into an ordered array;
    /// others take the first occurrence.
    pub repeated: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            repeated: false,
            default: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// How a declared body is decoded.
#[derive(Debug, Clone)]
pub enum BodyKind {
    /// Parsed as JSON; the listed top-level fields must be present.
    Json { required_fields: Vec<String> },
    /// Passed through to the handler as the raw decoded stream.
    Stream,
}

/// A declared request body: decode strategy plus accepted content types.
#[derive(Debug, Clone)]
pub struct BodySpec {
    pub kind: BodyKind,
    /// Accepted content types, matched as prefixes so parameters such as
    /// `; charset=utf-8` do not defeat the check.
    pub content_types: Vec<String>,
}

impl BodySpec {
    #[must_use]
    pub fn json(required_fields: &[&str]) -> Self {
        Self {
            kind: BodyKind::Json {
                required_fields: required_fields.iter().map(|s| s.to_string()).collect(),
            },
            content_types: vec!["application/json".to_string()],
        }
    }

    #[must_use]
    pub fn stream(content_types: &[&str]) -> Self {
        Self {
            kind: BodyKind::Stream,
            content_types: content_types.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Whether an endpoint demands an authenticated principal.
#[derive(Debug, Clone, Default)]
pub enum AuthRequirement {
    #[default]
    Public,
    Required {
        scopes: Vec<String>,
    },
}

/// The immutable registration record for one handler.
pub struct EndpointDescriptor {
    pub method: Method,
    pub path: String,
    pub handler: Arc<dyn Handler>,
    pub query: Vec<ParamSpec>,
    pub headers: Vec<ParamSpec>,
    pub body: Option<BodySpec>,
    pub auth: AuthRequirement,
    /// Declared response status codes; documentation only.
    pub responses: Vec<u16>,
    /// Warn when a handler runs longer than this.
    pub slow_after: Option<Duration>,
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("auth", &self.auth)
            .field("responses", &self.responses)
            .finish_non_exhaustive()
    }
}

/// Builder accumulating an [`EndpointDescriptor`] at registration time.
pub struct EndpointBuilder {
    descriptor: EndpointDescriptor,
}

/// Start building an endpoint registration.
pub fn endpoint(
    method: Method,
    path: impl Into<String>,
    handler: impl Handler + 'static,
) -> EndpointBuilder {
    EndpointBuilder {
        descriptor: EndpointDescriptor {
            method,
            path: path.into(),
            handler: Arc::new(handler),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            auth: AuthRequirement::Public,
            responses: Vec::new(),
            slow_after: None,
        },
    }
}

impl EndpointBuilder {
    #[must_use]
    pub fn query(mut self, spec: ParamSpec) -> Self {
        self.descriptor.query.push(spec);
        self
    }

    #[must_use]
    pub fn header(mut self, spec: ParamSpec) -> Self {
        self.descriptor.headers.push(spec);
        self
    }

    #[must_use]
    pub fn body(mut self, spec: BodySpec) -> Self {
        self.descriptor.body = Some(spec);
        self
    }

    /// Require an authenticated principal carrying every listed scope.
    #[must_use]
    pub fn auth(mut self, scopes: &[&str]) -> Self {
        self.descriptor.auth = AuthRequirement::Required {
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        };
        self
    }

    #[must_use]
    pub fn responses(mut self, codes: &[u16]) -> Self {
        self.descriptor.responses = codes.to_vec();
        self
    }

    #[must_use]
    pub fn slow_after(mut self, threshold: Duration) -> Self {
        self.descriptor.slow_after = Some(threshold);
        self
    }

    #[must_use]
    pub fn build(self) -> EndpointDescriptor {
        self.descriptor
    }
}
