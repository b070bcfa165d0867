//! MCP server over HTTP with server-sent events.
//!
//! - `GET /` serves a status page.
//! - `GET /sse` opens a session. The first event (`endpoint`) tells the
//!   client where to post messages; responses follow as `message` events.
//! - `POST /messages/?session_id=<id>` accepts one JSON-RPC message for the
//!   session and answers `202 Accepted`.

use super::McpHandler;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Html, IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use futures::StreamExt;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Sessions = Arc<Mutex<HashMap<Uuid, mpsc::UnboundedSender<Event>>>>;

/// Shared state of the SSE server.
#[derive(Clone)]
pub struct AppState {
    handler: McpHandler,
    sessions: Sessions,
}

impl AppState {
    pub fn new(handler: McpHandler) -> Self {
        Self {
            handler,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of open event streams.
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn open_session(&self) -> (Uuid, mpsc::UnboundedReceiver<Event>, SessionGuard) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);

        let guard = SessionGuard {
            id,
            sessions: self.sessions.clone(),
        };
        (id, rx, guard)
    }

    fn session_sender(&self, id: &Uuid) -> Option<mpsc::UnboundedSender<Event>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

/// Removes a session from the table when its event stream is dropped.
struct SessionGuard {
    id: Uuid,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        debug!("SSE session {} closed", self.id);
    }
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/sse", get(open_stream))
        .route("/messages", post(post_message))
        .route("/messages/", post(post_message))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run(handler: McpHandler, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Serving MCP over SSE on http://{}", addr);
    axum::serve(listener, router(AppState::new(handler)))
        .await
        .context("SSE server failed")?;

    Ok(())
}

async fn status_page() -> Html<&'static str> {
    Html(include_str!("status_page.html"))
}

async fn open_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx, guard) = state.open_session();
    info!("SSE session {} opened ({} active)", id, state.session_count());

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages/?session_id={}", id.simple()));

    // The guard lives inside the stream and is dropped with it.
    let stream = futures::stream::once(async move { endpoint })
        .chain(UnboundedReceiverStream::new(rx))
        .map(move |event| {
            let _session = &guard;
            Ok(event)
        });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn post_message(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let Some(raw_id) = params.get("session_id") else {
        return (StatusCode::BAD_REQUEST, "session_id is required").into_response();
    };
    let Ok(id) = Uuid::parse_str(raw_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid session ID").into_response();
    };
    let Some(sender) = state.session_sender(&id) else {
        warn!("Message for unknown session {}", raw_id);
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };
    let Ok(message) = String::from_utf8(body.to_vec()) else {
        return (StatusCode::BAD_REQUEST, "Message must be UTF-8").into_response();
    };

    let handler = state.handler.clone();
    tokio::spawn(async move {
        if let Some(response) = handler.handle_message(&message).await {
            if sender
                .send(Event::default().event("message").data(response))
                .is_err()
            {
                debug!("SSE session {} went away before its response", id);
            }
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
