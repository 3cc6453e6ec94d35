use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::{global, otel_debug, Context};

use crate::config::Propagation;
use crate::transport::RequestContext;
use crate::HeaderInjector;

/// Inject the trace context of `cx` into the headers of `request`.
///
/// [`Propagation::Default`] uses `default` when the client was given one, and
/// the global text map propagator otherwise. Only the request headers are
/// modified.
pub fn inject(
    request: &mut RequestContext,
    cx: &Context,
    propagation: &Propagation,
    default: Option<&(dyn TextMapPropagator + Send + Sync)>,
) {
    let mut injector = HeaderInjector(&mut request.headers);
    match (propagation, default) {
        (Propagation::Disabled, _) => {
            otel_debug!(name: "HttpClient.PropagationDisabled");
        }
        (Propagation::Custom(propagator), _) => propagator.inject_context(cx, &mut injector),
        (Propagation::Default, Some(propagator)) => propagator.inject_context(cx, &mut injector),
        (Propagation::Default, None) => global::get_text_map_propagator(|propagator| {
            propagator.inject_context(cx, &mut injector)
        }),
    }
}
