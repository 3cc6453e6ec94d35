//! # Interceptor configuration
//!
//! A [`Config`] is built once, either programmatically through
//! [`Config::builder`] or from a YAML document with [`Config::from_yaml`], and
//! is immutable afterwards. Every setting has a default, so
//! `Config::default()` is a valid configuration that emits only the base
//! attributes, names spans after the request method and propagates context
//! with the default propagator.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use http::{HeaderName, StatusCode};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_semantic_conventions::attribute;
use serde::Deserialize;

use crate::error::{BoxError, ConfigError};
use crate::transport::RequestContext;

/// Attributes that are only recorded when explicitly requested, because they
/// are costly, high cardinality or potentially sensitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum OptInAttribute {
    /// `http.request.body.size`
    #[serde(rename = "http.request.body.size")]
    RequestBodySize,
    /// `http.response.body.size`
    #[serde(rename = "http.response.body.size")]
    ResponseBodySize,
    /// `http.request.resend_count`
    #[serde(rename = "http.request.resend_count")]
    RequestResendCount,
    /// `network.transport`
    #[serde(rename = "network.transport")]
    NetworkTransport,
    /// `url.scheme`
    #[serde(rename = "url.scheme")]
    UrlScheme,
    /// `url.template`
    #[serde(rename = "url.template")]
    UrlTemplate,
    /// `user_agent.original`
    #[serde(rename = "user_agent.original")]
    UserAgentOriginal,
}

impl OptInAttribute {
    /// Every supported opt-in attribute.
    pub const ALL: [OptInAttribute; 7] = [
        OptInAttribute::RequestBodySize,
        OptInAttribute::ResponseBodySize,
        OptInAttribute::RequestResendCount,
        OptInAttribute::NetworkTransport,
        OptInAttribute::UrlScheme,
        OptInAttribute::UrlTemplate,
        OptInAttribute::UserAgentOriginal,
    ];

    /// The attribute key.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptInAttribute::RequestBodySize => attribute::HTTP_REQUEST_BODY_SIZE,
            OptInAttribute::ResponseBodySize => attribute::HTTP_RESPONSE_BODY_SIZE,
            OptInAttribute::RequestResendCount => attribute::HTTP_REQUEST_RESEND_COUNT,
            OptInAttribute::NetworkTransport => attribute::NETWORK_TRANSPORT,
            OptInAttribute::UrlScheme => attribute::URL_SCHEME,
            OptInAttribute::UrlTemplate => attribute::URL_TEMPLATE,
            OptInAttribute::UserAgentOriginal => attribute::USER_AGENT_ORIGINAL,
        }
    }
}

impl FromStr for OptInAttribute {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptInAttribute::ALL
            .into_iter()
            .find(|attr| attr.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownOptInAttribute(s.to_string()))
    }
}

impl fmt::Display for OptInAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type SpanNameFn = dyn Fn(&RequestContext) -> Result<String, BoxError> + Send + Sync;

/// Overrides the default `{METHOD}` span name.
#[derive(Clone)]
pub enum SpanName {
    /// Use this name for every span.
    Literal(String),
    /// Compute the name from the request.
    Computed(Arc<SpanNameFn>),
}

impl SpanName {
    /// A span name computed from each request. Errors returned by `f` abort
    /// the call.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        SpanName::Computed(Arc::new(f))
    }
}

impl fmt::Debug for SpanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanName::Literal(name) => f.debug_tuple("Literal").field(name).finish(),
            SpanName::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for SpanName {
    fn from(name: &str) -> Self {
        SpanName::Literal(name.to_string())
    }
}

impl From<String> for SpanName {
    fn from(name: String) -> Self {
        SpanName::Literal(name)
    }
}

/// Selects how trace context is injected into outgoing requests.
#[derive(Clone, Debug, Default)]
pub enum Propagation {
    /// Use the client's default propagator, falling back to the global
    /// text map propagator.
    #[default]
    Default,
    /// Use this propagator.
    Custom(Arc<dyn TextMapPropagator + Send + Sync>),
    /// Do not inject any headers.
    Disabled,
}

impl Propagation {
    /// Propagate with the given propagator.
    pub fn custom<P>(propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        Propagation::Custom(Arc::new(propagator))
    }
}

/// Validated interceptor configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    opt_in_attrs: HashSet<OptInAttribute>,
    propagation: Propagation,
    request_header_attrs: Vec<HeaderName>,
    response_header_attrs: Vec<HeaderName>,
    span_name: Option<SpanName>,
    mark_status_ok: HashSet<u16>,
    url_template_enabled: bool,
}

impl Config {
    /// Start building a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse and validate a YAML configuration document.
    ///
    /// Unrecognized keys and mistyped values are rejected. Custom propagators
    /// and computed span names can only be configured through the builder.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = serde_yaml::from_str(yaml)?;
        document.into_builder().build()
    }

    /// Whether `attr` was opted in.
    pub fn is_opted_in(&self, attr: OptInAttribute) -> bool {
        self.opt_in_attrs.contains(&attr)
    }

    /// The opted in attributes.
    pub fn opt_in_attrs(&self) -> impl Iterator<Item = OptInAttribute> + '_ {
        self.opt_in_attrs.iter().copied()
    }

    /// How context is propagated.
    pub fn propagation(&self) -> &Propagation {
        &self.propagation
    }

    /// Request headers recorded as span attributes.
    pub fn request_header_attrs(&self) -> &[HeaderName] {
        &self.request_header_attrs
    }

    /// Response headers recorded as span attributes.
    pub fn response_header_attrs(&self) -> &[HeaderName] {
        &self.response_header_attrs
    }

    /// The span name override, if any.
    pub fn span_name(&self) -> Option<&SpanName> {
        self.span_name.as_ref()
    }

    /// Status codes that do not mark the span as an error.
    pub fn mark_status_ok(&self) -> &HashSet<u16> {
        &self.mark_status_ok
    }

    /// True when `url.template` is opted in, which also qualifies span names
    /// of templated requests with their path.
    pub fn url_template_enabled(&self) -> bool {
        self.url_template_enabled
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug, Default)]
#[must_use = "builders do nothing unless .build() is called"]
pub struct ConfigBuilder {
    opt_in_attrs: Vec<OptInAttribute>,
    propagation: Propagation,
    request_header_attrs: Vec<String>,
    response_header_attrs: Vec<String>,
    span_name: Option<SpanName>,
    mark_status_ok: Vec<u16>,
}

impl ConfigBuilder {
    /// Opt in to additional attributes.
    pub fn with_opt_in_attrs(mut self, attrs: impl IntoIterator<Item = OptInAttribute>) -> Self {
        self.opt_in_attrs.extend(attrs);
        self
    }

    /// Select how context is propagated.
    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Record these request headers as `http.request.header.<name>`.
    pub fn with_request_header_attrs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_header_attrs
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Record these response headers as `http.response.header.<name>`.
    pub fn with_response_header_attrs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_header_attrs
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Override the span name.
    pub fn with_span_name(mut self, span_name: impl Into<SpanName>) -> Self {
        self.span_name = Some(span_name.into());
        self
    }

    /// Do not mark spans as errors for these status codes.
    pub fn with_mark_status_ok(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.mark_status_ok.extend(statuses);
        self
    }

    /// Validate and normalize the settings.
    pub fn build(self) -> Result<Config, ConfigError> {
        let request_header_attrs =
            header_names(self.request_header_attrs, "request_header_attrs")?;
        let response_header_attrs =
            header_names(self.response_header_attrs, "response_header_attrs")?;
        let mark_status_ok = self
            .mark_status_ok
            .into_iter()
            .map(|code| {
                StatusCode::from_u16(code)
                    .map(|_| code)
                    .map_err(|_| ConfigError::InvalidStatusCode(code))
            })
            .collect::<Result<HashSet<_>, _>>()?;
        let opt_in_attrs: HashSet<_> = self.opt_in_attrs.into_iter().collect();
        let url_template_enabled = opt_in_attrs.contains(&OptInAttribute::UrlTemplate);

        Ok(Config {
            opt_in_attrs,
            propagation: self.propagation,
            request_header_attrs,
            response_header_attrs,
            span_name: self.span_name,
            mark_status_ok,
            url_template_enabled,
        })
    }
}

fn header_names(names: Vec<String>, list: &'static str) -> Result<Vec<HeaderName>, ConfigError> {
    names
        .into_iter()
        .map(|name| {
            HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
                .map_err(|_| ConfigError::InvalidHeaderName { name, list })
        })
        .collect()
}

/// Serialized form of [`Config`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigDocument {
    opt_in_attrs: Vec<OptInAttribute>,
    propagator: PropagatorSetting,
    request_header_attrs: Vec<String>,
    response_header_attrs: Vec<String>,
    span_name: Option<String>,
    mark_status_ok: Vec<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PropagatorSetting {
    #[default]
    Default,
    Disabled,
}

impl ConfigDocument {
    fn into_builder(self) -> ConfigBuilder {
        let propagation = match self.propagator {
            PropagatorSetting::Default => Propagation::Default,
            PropagatorSetting::Disabled => Propagation::Disabled,
        };
        let builder = Config::builder()
            .with_opt_in_attrs(self.opt_in_attrs)
            .with_propagation(propagation)
            .with_request_header_attrs(self.request_header_attrs)
            .with_response_header_attrs(self.response_header_attrs)
            .with_mark_status_ok(self.mark_status_ok);
        match self.span_name {
            Some(name) => builder.with_span_name(name),
            None => builder,
        }
    }
}
