//! HTTP question-answering server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | `{"question": "…"}` → `{"answer": "…"}` |
//!
//! Each caller IP address gets its own [`ChatHistory`], so follow-up questions
//! are rewritten against that caller's earlier turns. There is no
//! authentication.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! | Status | Code | Cause |
//! |--------|------|-------|
//! | 400 | `bad_request` | malformed body or empty question |
//! | 502 | `upstream_error` | a model or embedding service rejected the request |
//! | 503 | `upstream_unavailable` | a model or embedding service could not be reached |
//! | 500 | `internal` | anything else |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::chain::ConversationalChain;
use crate::error::CapabilityError;
use crate::history::ChatHistory;

/// Shared state for the route handlers.
#[derive(Clone)]
struct AppState {
    chain: Arc<ConversationalChain>,
    /// Per-client histories. Never locked across a model call.
    sessions: Arc<Mutex<HashMap<IpAddr, ChatHistory>>>,
}

/// Builds the router. Callers serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so handlers can see
/// the peer address.
pub fn router(chain: Arc<ConversationalChain>) -> Router {
    let state = AppState {
        chain,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state)
}

/// Binds `bind` and serves until the process is terminated.
pub async fn run_server(chain: Arc<ConversationalChain>, bind: &str) -> anyhow::Result<()> {
    let app = router(chain);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, "listening");
    println!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Maps a failed answer to a status: capability errors keep their meaning,
/// everything else is internal.
fn classify(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    match err.downcast_ref::<CapabilityError>() {
        Some(CapabilityError::Unavailable { .. }) => {
            warn!(error = %message, "upstream unavailable");
            AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "upstream_unavailable",
                message,
            }
        }
        Some(CapabilityError::Rejected { .. }) => {
            warn!(error = %message, "upstream error");
            AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error",
                message,
            }
        }
        None => {
            error!(error = %message, "answer failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message,
            }
        }
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let client = peer.ip();
    let history = state
        .sessions
        .lock()
        .await
        .get(&client)
        .cloned()
        .unwrap_or_default();

    let (answer, history) = state
        .chain
        .answer(question, history)
        .await
        .map_err(classify)?;

    state.sessions.lock().await.insert(client, history);
    info!(%client, "answered");

    Ok(Json(AskResponse { answer }))
}
