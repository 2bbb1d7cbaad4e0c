//! Structured logging for the newsflow backend.
//!
//! Events are emitted as Bunyan-formatted JSON lines. `log` records from
//! dependencies are bridged into `tracing`, and each HTTP request gets a
//! root span (see [`NewsRootSpan`]) that the auth extractors tag with the
//! caller's user id.

pub mod middleware;

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
};
use tracing::{Span, Subscriber, subscriber::set_global_default};
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt::MakeWriter, layer::SubscriberExt};

pub use middleware::RequestLoggingMiddleware;

/// Composes the subscriber: `RUST_LOG` (or `env_filter` when unset), span
/// storage, and Bunyan JSON written to `sink`.
pub fn get_subscriber<Sink>(
    name: String,
    env_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Installs `subscriber` globally and redirects `log` records into it.
///
/// # Errors
/// Fails if a global subscriber or logger was already installed.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) -> anyhow::Result<()> {
    LogTracer::init()?;
    set_global_default(subscriber)?;
    Ok(())
}

/// Root span for every request, with an empty `user_id` slot that the auth
/// extractors fill in.
pub struct NewsRootSpan;

impl RootSpanBuilder for NewsRootSpan {
    fn on_request_start(request: &ServiceRequest) -> Span {
        tracing_actix_web::root_span!(request, user_id = tracing::field::Empty)
    }

    fn on_request_end<B: MessageBody>(span: Span, outcome: &Result<ServiceResponse<B>, actix_web::Error>) {
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}
