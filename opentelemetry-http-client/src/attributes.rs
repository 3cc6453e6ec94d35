//! Semantic convention attributes for HTTP client spans.
//!
//! Request attributes are known before the request is sent and are recorded
//! when the span starts. Response attributes are only recorded when the
//! transport produced a response, whatever its status code.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, USER_AGENT};
use http::HeaderMap;
use opentelemetry::{KeyValue, Value};
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, SERVER_ADDRESS, SERVER_PORT, URL_FULL,
};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::{Config, OptInAttribute};
use crate::error::Error;
use crate::headers::{header_attributes, HeaderDirection};
use crate::transport::{RequestContext, ResponseContext};

const KNOWN_METHODS: [&str; 9] = [
    "CONNECT", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT", "TRACE",
];

/// Attributes describing `request`.
///
/// `url.full` is the resolved request url with user info removed. Fails when
/// the method is not one of the nine standard methods or the url cannot be
/// resolved.
pub fn request_attributes(
    request: &RequestContext,
    config: &Config,
) -> Result<Vec<KeyValue>, Error> {
    let method = http_method(request)?;
    let url = request.resolve_url().map_err(|source| Error::InvalidUrl {
        url: request.url.clone(),
        source,
    })?;
    let scheme = match url.scheme() {
        "https" => "https",
        _ => "http",
    };
    let port = explicit_port(&request.url, &url).unwrap_or(match scheme {
        "https" => 443,
        _ => 80,
    });

    let mut attributes = vec![
        KeyValue::new(HTTP_REQUEST_METHOD, method),
        KeyValue::new(SERVER_ADDRESS, url.host_str().unwrap_or_default().to_string()),
        KeyValue::new(SERVER_PORT, i64::from(port)),
        KeyValue::new(URL_FULL, redacted(&url)),
    ];

    let user_agent = request
        .headers
        .get(USER_AGENT)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();
    let opt_in: [Option<(OptInAttribute, Value)>; 6] = [
        Some((
            OptInAttribute::RequestBodySize,
            body_size(&request.headers, request.body.as_ref()).into(),
        )),
        Some((OptInAttribute::NetworkTransport, "tcp".into())),
        Some((OptInAttribute::UrlScheme, scheme.into())),
        Some((
            OptInAttribute::UrlTemplate,
            template_path(request).unwrap_or_default().into(),
        )),
        Some((OptInAttribute::UserAgentOriginal, user_agent.into())),
        request
            .options
            .retry_count
            .filter(|count| *count > 0)
            .map(|count| (OptInAttribute::RequestResendCount, i64::from(count).into())),
    ];
    attributes.extend(
        opt_in
            .into_iter()
            .flatten()
            .filter(|(attr, _)| config.is_opted_in(*attr))
            .map(|(attr, value)| KeyValue::new(attr.as_str(), value)),
    );

    attributes.extend(header_attributes(
        HeaderDirection::Request,
        &request.headers,
        config.request_header_attrs(),
    ));
    Ok(attributes)
}

/// Attributes describing a received `response`.
///
/// `url.full` is re-derived from the url that was actually requested, so it
/// reflects path and query substitution. User info is removed.
pub fn response_attributes(response: &ResponseContext, config: &Config) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(response.status.as_u16()),
        ),
        KeyValue::new(URL_FULL, redacted(&response.url)),
    ];
    if config.is_opted_in(OptInAttribute::ResponseBodySize) {
        attributes.push(KeyValue::new(
            OptInAttribute::ResponseBodySize.as_str(),
            body_size(&response.headers, Some(&response.body)),
        ));
    }
    attributes.extend(header_attributes(
        HeaderDirection::Response,
        &response.headers,
        config.response_header_attrs(),
    ));
    attributes
}

/// The unexpanded request path of a templated request, percent-decoded so
/// `{id}` style placeholders read as written.
pub(crate) fn template_path(request: &RequestContext) -> Option<String> {
    if !request.is_templated() {
        return None;
    }
    let url = request.resolve_url().ok()?;
    Some(percent_decode_str(url.path()).decode_utf8_lossy().into_owned())
}

fn http_method(request: &RequestContext) -> Result<&'static str, Error> {
    let token = request.method.as_str();
    KNOWN_METHODS
        .into_iter()
        .find(|known| known.eq_ignore_ascii_case(token))
        .ok_or_else(|| Error::UnsupportedMethod(token.to_string()))
}

// content-length if it parses, otherwise the literal body length
fn body_size(headers: &HeaderMap, body: Option<&Bytes>) -> i64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .or_else(|| body.and_then(|body| i64::try_from(body.len()).ok()))
        .unwrap_or(0)
}

// `Url` drops a port equal to the scheme default, so read it back from the
// authority as written.
fn explicit_port(raw: &str, url: &Url) -> Option<u16> {
    if let Some(port) = url.port() {
        return Some(port);
    }
    let (_, rest) = raw.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let (host, port) = host_port.rsplit_once(':')?;
    if host.starts_with('[') && !host.ends_with(']') {
        return None;
    }
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    url.port_or_known_default()
}

fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    // only fails for urls that cannot carry credentials in the first place
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.to_string()
}
