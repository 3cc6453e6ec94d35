use std::borrow::Cow;
use std::collections::HashSet;

use opentelemetry::trace::Status;

use crate::transport::{Outcome, TransportError};

/// How an [`Outcome`] is reported on the span.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    /// The final span status. [`Status::Unset`] leaves the span untouched.
    pub status: Status,
    /// Low cardinality `error.type` value, if the call failed.
    pub error_type: Option<Cow<'static, str>>,
}

impl Classification {
    fn unset() -> Self {
        Classification {
            status: Status::Unset,
            error_type: None,
        }
    }

    fn error(
        description: impl Into<Cow<'static, str>>,
        error_type: impl Into<Cow<'static, str>>,
    ) -> Self {
        Classification {
            status: Status::error(description),
            error_type: Some(error_type.into()),
        }
    }
}

/// Classify the outcome of a call.
///
/// Responses with a status of 400 or above are errors unless the status is in
/// `ok_statuses`. Transport failures are always errors.
pub fn classify(outcome: &Outcome, ok_statuses: &HashSet<u16>) -> Classification {
    match outcome {
        Ok(response) => {
            let status = response.status.as_u16();
            if status < 400 {
                Classification::unset()
            } else if ok_statuses.contains(&status) {
                Classification {
                    status: Status::Ok,
                    error_type: None,
                }
            } else {
                Classification::error("", status.to_string())
            }
        }
        Err(error) => classify_error(error),
    }
}

fn classify_error(error: &TransportError) -> Classification {
    match error {
        TransportError::TooManyRedirects => Classification::error("", "too_many_redirects"),
        TransportError::Timeout => Classification::error("request_timeout", "request_timeout"),
        TransportError::RetryExhausted { reason } => {
            Classification::error(format!("retry_failed: {reason}"), "retry_failed")
        }
        TransportError::Dns => Classification::error("nxdomain", "dns_error"),
        TransportError::ConnectionRefused => {
            Classification::error("connection_refused", "connection_refused")
        }
        TransportError::ConnectionClosed => {
            Classification::error("connection_closed", "connection_closed")
        }
        TransportError::Exception { kind, message } => {
            Classification::error(message.clone(), kind.clone())
        }
        TransportError::Other(tag) => Classification::error(tag.clone(), tag.clone()),
        TransportError::Unclassified => Classification::error("", "unknown"),
    }
}
