use axum::{
    body::{ Body, Bytes },
    extract::State,
    http::{ header, Method },
    response::{ IntoResponse, Response },
    routing::post,
    Json,
    Router,
};
use futures::StreamExt;
use log::{ debug, error, info };
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{ Any, CorsLayer };

use super::error::ApiError;
use super::json::JsonRequest;
use crate::history::encode_history;
use crate::llm::chat::{ create_streaming_response, ChatSession, GenerativeModel, ResponseStream };
use crate::llm::response::response_string;
use crate::models::chat::{ ChatRequest, ChatResponse, Content };

type Chunk = Result<Bytes, Infallible>;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn GenerativeModel>,
}

impl AppState {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    fn start_chat(&self, history: &[Content]) -> ChatSession {
        ChatSession::new(self.model.clone(), encode_history(history))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::HEAD])
        .allow_headers([header::ACCESS_CONTROL_ALLOW_ORIGIN, header::CONTENT_TYPE]);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/stream", post(streaming_chat_handler))
        .layer(cors)
        .with_state(state)
}

/// Returns the complete model reply as `{ "text": ... }`.
async fn chat_handler(
    State(state): State<AppState>,
    JsonRequest(req): JsonRequest<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!("POST /chat history={}", req.history.len());
    let mut session = state.start_chat(&req.history);
    let res = session.send_message(&req.chat).await?;
    let text = response_string(&res)?;
    Ok(Json(ChatResponse { text }))
}

/// Streams the model reply as raw text chunks, one write per partial response.
async fn streaming_chat_handler(
    State(state): State<AppState>,
    JsonRequest(req): JsonRequest<ChatRequest>,
) -> Result<Response, ApiError> {
    info!("POST /stream history={}", req.history.len());
    let session = state.start_chat(&req.history);
    let mut stream = session.send_message_stream(&req.chat).await?;

    // Headers are not committed until this returns, so the first pull can
    // still fail with a proper status.
    let first = match stream.next().await {
        Some(res) => Some(response_string(&res?)?),
        None => None,
    };

    let body = Body::from_stream(relay_chunks(first, stream));
    Ok(([(header::CONTENT_TYPE, "text/event-stream")], body).into_response())
}

/// Pulls the rest of the cursor on its own task. Any failure ends the body
/// cleanly: the status line is already on the wire.
fn relay_chunks(first: Option<String>, mut stream: ResponseStream) -> ReceiverStream<Chunk> {
    create_streaming_response(1, move |tx: mpsc::Sender<Chunk>| async move {
        let Some(first) = first else {
            debug!("Model stream exhausted before the first chunk");
            return;
        };
        if !send_chunk(&tx, first).await {
            return;
        }

        while let Some(item) = stream.next().await {
            let res = match item {
                Ok(res) => res,
                Err(e) => {
                    error!("Model stream failed mid-response: {}", e);
                    return;
                }
            };
            let text = match response_string(&res) {
                Ok(text) => text,
                Err(e) => {
                    error!("Ending stream: {}", e);
                    return;
                }
            };
            if !send_chunk(&tx, text).await {
                return;
            }
        }
        debug!("Model stream exhausted");
    })
}

async fn send_chunk(tx: &mpsc::Sender<Chunk>, text: String) -> bool {
    if text.is_empty() {
        return true;
    }
    if tx.send(Ok(Bytes::from(text))).await.is_err() {
        debug!("Client disconnected, dropping model stream");
        return false;
    }
    true
}
