use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Debug};
use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

/// The result of handing a request to a [`Transport`].
///
/// `Ok` means the transport received a response, whatever its status code.
pub type Outcome = Result<ResponseContext, TransportError>;

/// An outgoing HTTP request as seen by the interceptor.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Request method.
    pub method: Method,
    /// Absolute url, or a url relative to [`RequestOptions::base_url`].
    pub url: String,
    /// Request headers. Propagation headers are written here.
    pub headers: HeaderMap,
    /// Literal request body, if any.
    pub body: Option<Bytes>,
    /// Per-request options.
    pub options: RequestOptions,
}

/// Per-request options read by the interceptor.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Base url that relative request urls are resolved against.
    pub base_url: Option<Url>,
    /// Path parameters. `Some` marks the request url as a template such as
    /// `/users/:id`.
    pub path_params: Option<Vec<(String, String)>>,
    /// Number of times this request has already been sent.
    pub retry_count: Option<u32>,
    /// Status codes that should not mark the span as an error, in addition to
    /// the client's configured `mark_status_ok`.
    pub additional_ok_statuses: Vec<u16>,
}

impl RequestContext {
    /// Create a request with no headers, body or options.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        RequestContext {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set a literal body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Resolve relative urls against `base_url`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.options.base_url = Some(base_url);
        self
    }

    /// Mark the url as a template and provide its parameters.
    pub fn with_path_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.options.path_params = Some(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Record how many times this request has been sent before.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.options.retry_count = Some(retry_count);
        self
    }

    /// Status codes to treat as successful for this request only.
    pub fn with_additional_ok_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.options.additional_ok_statuses.extend(statuses);
        self
    }

    /// Whether the url is a template with path parameters.
    pub fn is_templated(&self) -> bool {
        self.options.path_params.is_some()
    }

    /// The request url, resolved against `base_url` when it is relative.
    ///
    /// Path parameters are not substituted, see [`expanded_url`](Self::expanded_url).
    pub fn resolve_url(&self) -> Result<Url, url::ParseError> {
        match Url::parse(&self.url) {
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.options.base_url {
                Some(base) => base.join(&self.url),
                None => Err(url::ParseError::RelativeUrlWithoutBase),
            },
            other => other,
        }
    }

    /// The url a transport should actually request: [`resolve_url`](Self::resolve_url)
    /// with `:name` and `{name}` path segments replaced by their parameter values.
    pub fn expanded_url(&self) -> Result<Url, url::ParseError> {
        let mut url = self.resolve_url()?;
        let Some(params) = &self.options.path_params else {
            return Ok(url);
        };

        let segments: Option<Vec<String>> = url.path_segments().map(|segments| {
            segments
                .map(|segment| expand_segment(segment, params).into_owned())
                .collect()
        });
        if let Some(segments) = segments {
            if let Ok(mut path) = url.path_segments_mut() {
                path.clear().extend(segments.iter());
            }
        }
        Ok(url)
    }
}

fn expand_segment<'a>(segment: &'a str, params: &[(String, String)]) -> Cow<'a, str> {
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let name = decoded
        .strip_prefix(':')
        .or_else(|| decoded.strip_prefix('{').and_then(|s| s.strip_suffix('}')));

    match name.and_then(|name| params.iter().find(|(key, _)| key == name)) {
        Some((_, value)) => Cow::Owned(value.clone()),
        None => decoded,
    }
}

/// A response received by a [`Transport`].
#[derive(Clone, Debug)]
pub struct ResponseContext {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
    /// The url that was finally requested, after path substitution and
    /// redirects.
    pub url: Url,
}

impl ResponseContext {
    /// Create a response with no headers and an empty body.
    pub fn new(status: StatusCode, url: Url) -> Self {
        ResponseContext {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url,
        }
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Why a transport failed to produce a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The redirect limit was reached.
    #[error("too many redirects")]
    TooManyRedirects,
    /// The request timed out.
    #[error("request timed out")]
    Timeout,
    /// Retries were exhausted; `reason` names the last failure.
    #[error("retries exhausted: {reason}")]
    RetryExhausted {
        /// Name of the failure that caused the final retry to fail.
        reason: String,
    },
    /// The host name could not be resolved.
    #[error("dns lookup failed")]
    Dns,
    /// The server refused the connection.
    #[error("connection refused")]
    ConnectionRefused,
    /// The connection was closed before a response was received.
    #[error("connection closed")]
    ConnectionClosed,
    /// A structured error raised by the transport.
    #[error("{kind}: {message}")]
    Exception {
        /// Low cardinality identifier of the error type.
        kind: String,
        /// Human readable message.
        message: String,
    },
    /// A named failure without further structure.
    #[error("{0}")]
    Other(String),
    /// A failure whose shape is not known.
    #[error("unclassified transport error")]
    Unclassified,
}

impl TransportError {
    /// Wrap an arbitrary error, using its Rust type name as the error kind.
    pub fn exception<E: StdError>(error: &E) -> Self {
        TransportError::Exception {
            kind: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
        }
    }

    /// Classify an error by walking its source chain for well known io
    /// failures. Returns `None` when nothing recognizable is found.
    pub fn from_source_chain(error: &(dyn StdError + 'static)) -> Option<Self> {
        let mut current = Some(error);
        while let Some(err) = current {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionRefused => {
                        return Some(TransportError::ConnectionRefused)
                    }
                    io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof => {
                        return Some(TransportError::ConnectionClosed)
                    }
                    io::ErrorKind::TimedOut => return Some(TransportError::Timeout),
                    _ => {}
                }
            }
            // hyper-util reports resolver failures only through the message
            if err.to_string().starts_with("dns error") {
                return Some(TransportError::Dns);
            }
            current = err.source();
        }
        None
    }
}

/// The downstream handler a [`TracingClient`](crate::TracingClient) delegates to.
///
/// Implementations own connection handling, redirects, retries and timeouts;
/// the interceptor only observes the outcome.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    /// Send the request and report what happened.
    async fn send(&self, request: RequestContext) -> Outcome;
}

/// A [`Transport`] backed by a synchronous closure, see [`transport_fn`].
#[derive(Clone)]
pub struct TransportFn<F>(F);

/// Create a [`Transport`] from a closure.
pub fn transport_fn<F>(f: F) -> TransportFn<F>
where
    F: Fn(RequestContext) -> Outcome + Send + Sync,
{
    TransportFn(f)
}

impl<F> Debug for TransportFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Transport for TransportFn<F>
where
    F: Fn(RequestContext) -> Outcome + Send + Sync,
{
    async fn send(&self, request: RequestContext) -> Outcome {
        (self.0)(request)
    }
}
