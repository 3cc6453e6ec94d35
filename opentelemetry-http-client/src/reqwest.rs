use async_trait::async_trait;
use opentelemetry::otel_debug;

use crate::transport::{Outcome, RequestContext, ResponseContext, Transport, TransportError};

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: RequestContext) -> Outcome {
        otel_debug!(name: "ReqwestClient.Send");
        let url = request
            .expanded_url()
            .map_err(|err| TransportError::exception(&err))?;
        let mut builder = self.request(request.method, url).headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let mut response = builder.send().await.map_err(transport_error)?;
        let headers = std::mem::take(response.headers_mut());
        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(transport_error)?;

        let mut context = ResponseContext::new(status, url).with_body(body);
        context.headers = headers;
        Ok(context)
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_redirect() {
        TransportError::TooManyRedirects
    } else {
        TransportError::from_source_chain(&err).unwrap_or_else(|| TransportError::exception(&err))
    }
}
