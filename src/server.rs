//! HTTP and WebSocket surface.
//!
//! - `GET /`       -- plotting page
//! - `GET /ws`     -- sample stream, `initial_data` once, then `new_data` per batch
//! - `GET /health` -- liveness check

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::SampleFeed;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub fn app(feed: SampleFeed) -> Router {
    // the page may be opened from anywhere during development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(feed)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn ws_handler(ws: WebSocketUpgrade, State(feed): State<SampleFeed>) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_samples(socket, feed))
}

async fn stream_samples(socket: WebSocket, feed: SampleFeed) {
    let (mut sink, mut stream) = socket.split();
    let mut subscription = feed.subscribe();
    info!(clients = feed.client_count(), "client connected");

    let forward = async {
        while let Some(message) = subscription.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode feed message: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    };
    // clients only listen, inbound frames matter for noticing a close
    let inbound = async {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = inbound => {}
    }
    info!(clients = feed.client_count().saturating_sub(1), "client disconnected");
}
