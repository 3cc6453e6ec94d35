use http::{HeaderValue, Method};
use opentelemetry::global;
use opentelemetry::trace::{TraceContextExt, Tracer};
use opentelemetry_http_client::{Config, OptInAttribute, RequestContext, TracingClient};
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider};
use opentelemetry_stdout::SpanExporter;
use url::Url;

fn init_tracer() -> SdkTracerProvider {
    global::set_text_map_propagator(TraceContextPropagator::new());
    // Spans are printed to stdout as soon as they end.
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(SpanExporter::default())
        .build();

    global::set_tracer_provider(provider.clone());
    provider
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let provider = init_tracer();

    let config = Config::builder()
        .with_opt_in_attrs([
            OptInAttribute::UrlTemplate,
            OptInAttribute::ResponseBodySize,
        ])
        .with_response_header_attrs(["content-type"])
        .with_mark_status_ok([404])
        .build()?;
    let client = TracingClient::new(reqwest::Client::new(), config);

    let base = Url::parse("http://httpbin.org")?;
    let tracer = global::tracer("example/reqwest-client");
    let span = tracer.start("check-statuses");
    let cx = opentelemetry::Context::current_with_span(span);
    {
        let _guard = cx.clone().attach();

        for code in ["200", "404"] {
            let request = RequestContext::new(Method::GET, "/status/:code")
                .with_base_url(base.clone())
                .with_path_params([("code", code)])
                .with_header(
                    http::header::ACCEPT,
                    HeaderValue::from_static("application/json"),
                );
            match client.execute(request).await? {
                Ok(response) => println!("GET /status/{code} -> {}", response.status),
                Err(err) => println!("GET /status/{code} failed: {err}"),
            }
        }
    }
    cx.span().end();

    provider.shutdown()?;
    Ok(())
}
