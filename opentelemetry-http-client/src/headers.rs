use http::{HeaderMap, HeaderName};
use opentelemetry::{Array, KeyValue, StringValue, Value};
use opentelemetry_semantic_conventions::attribute::{HTTP_REQUEST_HEADER, HTTP_RESPONSE_HEADER};

/// Which side of the exchange a header belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderDirection {
    /// `http.request.header.<name>`
    Request,
    /// `http.response.header.<name>`
    Response,
}

impl HeaderDirection {
    fn prefix(self) -> &'static str {
        match self {
            HeaderDirection::Request => HTTP_REQUEST_HEADER,
            HeaderDirection::Response => HTTP_RESPONSE_HEADER,
        }
    }
}

/// Record the allow-listed headers present in `headers`.
///
/// Each attribute holds every value of the header, in order. Headers that are
/// absent produce no attribute at all.
pub fn header_attributes(
    direction: HeaderDirection,
    headers: &HeaderMap,
    allow_list: &[HeaderName],
) -> Vec<KeyValue> {
    allow_list
        .iter()
        .filter_map(|name| {
            let values: Vec<StringValue> = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned().into())
                .collect();
            if values.is_empty() {
                return None;
            }
            Some(KeyValue::new(
                format!("{}.{}", direction.prefix(), name.as_str()),
                Value::Array(Array::String(values)),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn allow(names: &[&'static str]) -> Vec<HeaderName> {
        names.iter().copied().map(HeaderName::from_static).collect()
    }

    #[test]
    fn collects_every_value() {
        let mut headers = HeaderMap::new();
        headers.append(
            HeaderName::from_bytes(b"X-Tag").unwrap(),
            HeaderValue::from_static("a"),
        );
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let attrs = header_attributes(HeaderDirection::Request, &headers, &allow(&["x-tag"]));
        assert_eq!(
            attrs,
            vec![KeyValue::new(
                "http.request.header.x-tag",
                Value::Array(Array::String(vec!["a".into(), "b".into()])),
            )]
        );
    }

    #[test]
    fn absent_headers_are_omitted() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let attrs = header_attributes(
            HeaderDirection::Response,
            &headers,
            &allow(&["x-missing", "content-type"]),
        );
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].key.as_str(), "http.response.header.content-type");
        assert_eq!(
            attrs[0].value,
            Value::Array(Array::String(vec!["text/plain".into()]))
        );
    }

    #[test]
    fn empty_allow_list() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        assert!(header_attributes(HeaderDirection::Request, &headers, &[]).is_empty());
    }
}
