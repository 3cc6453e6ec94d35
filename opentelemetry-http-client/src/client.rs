use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{otel_debug, otel_warn, Context, InstrumentationScope, KeyValue};
use opentelemetry_semantic_conventions::attribute::{ERROR_TYPE, URL_FULL};

use crate::attributes::{request_attributes, response_attributes};
use crate::classify::{classify, Classification};
use crate::config::Config;
use crate::error::Error;
use crate::naming::span_name;
use crate::propagation::inject;
use crate::transport::{Outcome, RequestContext, Transport};

/// Wraps a [`Transport`] and records an OpenTelemetry client span for every
/// request sent through it.
///
/// The outcome of the transport is always returned unchanged; HTTP and
/// transport errors are only reported on the span. The only change made to the
/// request is the injection of propagation headers.
///
/// # Example
///
/// ```no_run
/// use http::{Method, StatusCode};
/// use opentelemetry_http_client::{
///     transport_fn, Config, RequestContext, ResponseContext, TracingClient,
/// };
///
/// # async fn run() -> Result<(), opentelemetry_http_client::Error> {
/// let transport = transport_fn(|request: RequestContext| {
///     Ok(ResponseContext::new(StatusCode::OK, request.expanded_url().unwrap()))
/// });
/// let client = TracingClient::new(transport, Config::default());
///
/// let outcome = client
///     .execute(RequestContext::new(Method::GET, "http://localhost:8080/health"))
///     .await?;
/// assert!(outcome.is_ok());
/// # Ok(())
/// # }
/// ```
pub struct TracingClient<C, T = BoxedTracer> {
    transport: C,
    tracer: T,
    config: Config,
    default_propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
}

impl<C: Transport> TracingClient<C> {
    /// Create a client that records spans with the globally configured tracer
    /// provider.
    pub fn new(transport: C, config: Config) -> Self {
        let scope = InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        TracingClient {
            transport,
            tracer: global::tracer_with_scope(scope),
            config,
            default_propagator: None,
        }
    }
}

impl<C, T> TracingClient<C, T>
where
    C: Transport,
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    /// Record spans with `tracer` instead of the global tracer.
    pub fn with_tracer<U>(self, tracer: U) -> TracingClient<C, U>
    where
        U: Tracer,
    {
        TracingClient {
            transport: self.transport,
            tracer,
            config: self.config,
            default_propagator: self.default_propagator,
        }
    }

    /// Propagator used when the configuration selects
    /// [`Propagation::Default`](crate::Propagation::Default). Without one the
    /// global text map propagator is used.
    pub fn with_default_propagator<P>(mut self, propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        self.default_propagator = Some(Arc::new(propagator));
        self
    }

    /// The client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &C {
        &self.transport
    }

    /// Send `request` through the transport inside a client span.
    ///
    /// Returns an [`Error`] without calling the transport, and without
    /// starting a span, when the span name cannot be computed or the request
    /// cannot be described (unsupported method, unresolvable url). Any
    /// transport outcome, success or failure, is returned as `Ok`.
    pub async fn execute(&self, mut request: RequestContext) -> Result<Outcome, Error> {
        let name = span_name(&request, &self.config)?;
        // `url.full` is recorded once, from the response when there is one
        let (request_url, attributes): (Vec<_>, Vec<_>) =
            request_attributes(&request, &self.config)?
                .into_iter()
                .partition(|kv| kv.key.as_str() == URL_FULL);

        let parent = Context::current();
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &parent);
        let scope = SpanScope::new(parent.with_span(span), request_url);
        otel_debug!(name: "HttpClient.SpanStarted", method = request.method.as_str());

        let mut ok_statuses: HashSet<u16> = self.config.mark_status_ok().clone();
        ok_statuses.extend(request.options.additional_ok_statuses.iter().copied());

        inject(
            &mut request,
            &scope.cx,
            self.config.propagation(),
            self.default_propagator.as_deref(),
        );

        let outcome = self
            .transport
            .send(request)
            .with_context(scope.cx.clone())
            .await;

        match &outcome {
            Ok(response) => scope
                .cx
                .span()
                .set_attributes(response_attributes(response, &self.config)),
            Err(error) => {
                otel_debug!(name: "HttpClient.TransportFailed", error = format!("{error}"));
                scope.cx.span().set_attributes(scope.request_url.clone());
            }
        }
        scope.finish(classify(&outcome, &ok_statuses));
        Ok(outcome)
    }
}

impl<C: fmt::Debug, T> fmt::Debug for TracingClient<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingClient")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("default_propagator", &self.default_propagator)
            .finish_non_exhaustive()
    }
}

/// Owns the client span for the duration of one call and ends it exactly
/// once, also when the call is dropped before the transport returns.
struct SpanScope {
    cx: Context,
    // request-time `url.full`, used when no response is received
    request_url: Vec<KeyValue>,
    finished: bool,
}

impl SpanScope {
    fn new(cx: Context, request_url: Vec<KeyValue>) -> Self {
        SpanScope {
            cx,
            request_url,
            finished: false,
        }
    }

    fn finish(mut self, classification: Classification) {
        let span = self.cx.span();
        if let Some(error_type) = classification.error_type {
            span.set_attribute(KeyValue::new(ERROR_TYPE, error_type.into_owned()));
        }
        if classification.status != Status::Unset {
            span.set_status(classification.status);
        }
        span.end();
        self.finished = true;
    }
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        otel_warn!(name: "HttpClient.SpanDropped");
        let span = self.cx.span();
        span.set_attributes(std::mem::take(&mut self.request_url));
        span.set_attribute(KeyValue::new(ERROR_TYPE, "unknown"));
        span.set_status(Status::error(""));
        span.end();
    }
}
