use crate::attributes::template_path;
use crate::config::{Config, SpanName};
use crate::error::Error;
use crate::transport::RequestContext;

/// Compute the name of the client span for `request`.
///
/// A configured [`SpanName`] always wins. Otherwise the span is named after
/// the upper-cased method, qualified with the unexpanded request path for
/// templated requests when `url.template` is opted in. Plain urls are never
/// used, as they are high cardinality.
pub fn span_name(request: &RequestContext, config: &Config) -> Result<String, Error> {
    match config.span_name() {
        Some(SpanName::Literal(name)) => Ok(name.clone()),
        Some(SpanName::Computed(f)) => f(request).map_err(Error::SpanName),
        None => {
            let method = request.method.as_str().to_ascii_uppercase();
            if !config.url_template_enabled() {
                return Ok(method);
            }
            match template_path(request) {
                Some(path) => Ok(format!("{method} {path}")),
                None => Ok(method),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptInAttribute;
    use http::Method;

    fn templated() -> RequestContext {
        RequestContext::new(Method::GET, "http://localhost:4000/users/:id")
            .with_path_params([("id", "3")])
    }

    #[test]
    fn defaults_to_method() {
        let config = Config::default();
        assert_eq!(span_name(&templated(), &config).unwrap(), "GET");

        let request = RequestContext::new(
            Method::from_bytes(b"patch").unwrap(),
            "http://localhost/users/1",
        );
        assert_eq!(span_name(&request, &config).unwrap(), "PATCH");
    }

    #[test]
    fn template_is_opt_in() {
        let config = Config::builder()
            .with_opt_in_attrs([OptInAttribute::UrlTemplate])
            .build()
            .unwrap();
        assert_eq!(span_name(&templated(), &config).unwrap(), "GET /users/:id");

        let plain = RequestContext::new(Method::POST, "http://localhost:4000/users/3");
        assert_eq!(span_name(&plain, &config).unwrap(), "POST");
    }

    #[test]
    fn literal_override() {
        let config = Config::builder()
            .with_span_name("fetch user")
            .with_opt_in_attrs([OptInAttribute::UrlTemplate])
            .build()
            .unwrap();
        assert_eq!(span_name(&templated(), &config).unwrap(), "fetch user");
    }

    #[test]
    fn computed_override() {
        let config = Config::builder()
            .with_span_name(SpanName::computed(|request| {
                Ok(format!("{} via fn", request.method))
            }))
            .build()
            .unwrap();
        assert_eq!(span_name(&templated(), &config).unwrap(), "GET via fn");
    }

    #[test]
    fn computed_failure_is_returned() {
        let config = Config::builder()
            .with_span_name(SpanName::computed(|_| Err("no name".into())))
            .build()
            .unwrap();
        let err = span_name(&templated(), &config).unwrap_err();
        assert!(matches!(err, Error::SpanName(_)));
        assert_eq!(err.to_string(), "span name function failed: no name");
    }
}
