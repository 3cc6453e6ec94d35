use thiserror::Error;

/// Boxed error type returned by user supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while validating a [`Config`](crate::Config).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration document could not be parsed, contained an
    /// unrecognized key or a value of the wrong type.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An opt-in attribute outside of the supported vocabulary.
    #[error("unknown opt-in attribute `{0}`")]
    UnknownOptInAttribute(String),

    /// A header allow-list entry that is not a valid header name.
    #[error("invalid header name `{name}` in {list}")]
    InvalidHeaderName {
        /// The offending entry.
        name: String,
        /// The allow-list it was found in.
        list: &'static str,
    },

    /// A `mark_status_ok` entry that is not a valid HTTP status code.
    #[error("invalid status code {0} in mark_status_ok")]
    InvalidStatusCode(u16),
}

/// Errors that abort a traced call before the transport is invoked.
///
/// HTTP and transport failures are never reported here, they are part of the
/// returned [`Outcome`](crate::Outcome).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request method is not one of the nine standard HTTP methods.
    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    /// The request url could not be parsed, or was relative without a base url.
    #[error("invalid request url `{url}`: {source}")]
    InvalidUrl {
        /// The url as given on the request.
        url: String,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },

    /// The configured span name function failed.
    #[error("span name function failed: {0}")]
    SpanName(#[source] BoxError),
}
