//! HTTP front door: `POST /text` with a plain-text body feeds the producer.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::TextEvent;
use crate::pipeline::{OverflowPolicy, TextProducer};

pub struct IngressState<P> {
    producer: Arc<P>,
    overflow: OverflowPolicy,
}

impl<P> Clone for IngressState<P> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            overflow: self.overflow,
        }
    }
}

pub fn router<P>(producer: Arc<P>, overflow: OverflowPolicy) -> Router
where
    P: TextProducer + 'static,
{
    Router::new()
        .route("/text", post(post_text::<P>))
        .route("/health", get(health))
        .with_state(IngressState { producer, overflow })
}

/// Serves `router` on `listener` until `shutdown` fires.
pub async fn serve<P>(
    listener: TcpListener,
    producer: Arc<P>,
    overflow: OverflowPolicy,
    shutdown: CancellationToken,
) -> std::io::Result<()>
where
    P: TextProducer + 'static,
{
    info!("HTTP ingress listening on {}", listener.local_addr()?);
    axum::serve(listener, router(producer, overflow))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn post_text<P>(
    State(state): State<IngressState<P>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode
where
    P: TextProducer + 'static,
{
    if !is_plain_text(&headers) {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE;
    }

    let event = TextEvent::new(body);
    let result = match state.overflow {
        OverflowPolicy::FailFast => state.producer.produce(event),
        OverflowPolicy::Block => state.producer.produce_wait(event).await,
    };

    match result {
        Ok(()) => {
            debug!("Text accepted");
            StatusCode::OK
        }
        // both BufferFull and Closed mean "not now", never a client error
        Err(e) => {
            warn!("Text rejected: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn is_plain_text(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case("text/plain"))
        .unwrap_or(false)
}
