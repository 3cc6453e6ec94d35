//! # OpenTelemetry HTTP client instrumentation
//!
//! [`TracingClient`] wraps a [`Transport`] and records a `CLIENT` span for
//! every outbound request, following the OpenTelemetry HTTP semantic
//! conventions:
//!
//! * spans are named after the request method, or `{METHOD} {template}` for
//!   templated requests when `url.template` is opted in, unless a
//!   [`SpanName`] override is configured;
//! * `http.request.method`, `server.address`, `server.port`, `url.full` and
//!   `http.response.status_code` are always recorded, the attributes listed in
//!   [`OptInAttribute`] and allow-listed headers only on request;
//! * trace context is injected into the request headers with the configured
//!   [`Propagation`];
//! * responses with status 400 or above, and transport failures, mark the span
//!   as an error and record `error.type`.
//!
//! The outcome produced by the transport is always handed back unchanged.
//!
//! ```no_run
//! use http::{Method, StatusCode};
//! use opentelemetry_http_client::{
//!     transport_fn, Config, OptInAttribute, RequestContext, ResponseContext, TracingClient,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder()
//!     .with_opt_in_attrs([OptInAttribute::UrlTemplate])
//!     .with_response_header_attrs(["content-type"])
//!     .with_mark_status_ok([404])
//!     .build()?;
//! let transport = transport_fn(|request: RequestContext| {
//!     Ok(ResponseContext::new(StatusCode::OK, request.expanded_url().unwrap()))
//! });
//! let client = TracingClient::new(transport, config);
//!
//! let request = RequestContext::new(Method::GET, "http://localhost:8080/users/:id")
//!     .with_path_params([("id", "3")]);
//! // recorded as a `GET /users/:id` span
//! let outcome = client.execute(request).await?;
//! # Ok(())
//! # }
//! ```
//!
//! With the `reqwest` feature, `reqwest::Client` implements [`Transport`].

use opentelemetry::propagation::Injector;

pub mod attributes;
pub mod classify;
mod client;
pub mod config;
mod error;
pub mod headers;
pub mod naming;
pub mod propagation;
#[cfg(feature = "reqwest")]
mod reqwest;
mod transport;

#[doc(no_inline)]
pub use bytes::Bytes;
pub use client::TracingClient;
pub use config::{Config, ConfigBuilder, OptInAttribute, Propagation, SpanName};
pub use error::{BoxError, ConfigError, Error};
pub use transport::{
    transport_fn, Outcome, RequestContext, RequestOptions, ResponseContext, Transport,
    TransportError, TransportFn,
};

/// Helper for injecting headers into outgoing requests. Used by
/// [`propagation::inject`] to hand the request headers to a propagator.
pub struct HeaderInjector<'a>(pub &'a mut http::HeaderMap);

impl Injector for HeaderInjector<'_> {
    /// Set a key and value in the HeaderMap, replacing any previous values.
    /// Does nothing if the key or value are not valid inputs.
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = http::header::HeaderName::from_bytes(key.as_bytes()) {
            if let Ok(val) = http::header::HeaderValue::from_str(&value) {
                self.0.insert(name, val);
            }
        }
    }
}
