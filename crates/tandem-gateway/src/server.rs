use crate::connection::{Connection, ConnectionManager};
use crate::envelope;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tandem_turn::{TurnOrchestrator, TurnRequest};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub connections: Arc<ConnectionManager>,
}

/// Builds the delivery router.
pub struct GatewayServer;

impl GatewayServer {
    pub fn build(
        orchestrator: Arc<TurnOrchestrator>,
        connections: Arc<ConnectionManager>,
    ) -> Router {
        let state = Arc::new(AppState {
            orchestrator,
            connections,
        });

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route("/conversations/{id}/messages", post(post_message_handler))
            .with_state(state)
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "tandem"}))
}

#[derive(Deserialize)]
struct PostMessageBody {
    user_id: String,
    content: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    use_tools: bool,
    #[serde(default)]
    use_memory: bool,
    #[serde(default)]
    stream: bool,
}

/// Unary turn endpoint. With `stream: true` the response body is
/// newline-delimited JSON delivery events; otherwise a single reply object.
/// Malformed input is the only error that surfaces at the transport level.
async fn post_message_handler(
    Path(conversation_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<PostMessageBody>,
) -> Response {
    let req = TurnRequest {
        conversation_id,
        user_id: body.user_id,
        content: body.content,
        model: body.model,
        use_tools: body.use_tools,
        use_memory: body.use_memory,
    };

    if body.stream {
        let rx = state.orchestrator.run_streaming(req);
        let lines = ReceiverStream::new(rx)
            .map(|event| Ok::<_, std::convert::Infallible>(envelope::to_line(&event)));
        (
            [(header::CONTENT_TYPE, "application/x-ndjson")],
            Body::from_stream(lines),
        )
            .into_response()
    } else {
        Json(state.orchestrator.run(req).await).into_response()
    }
}

#[derive(Deserialize)]
struct WsParams {
    #[serde(default)]
    user_id: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let user_id = params.user_id.unwrap_or_else(|| "anonymous".to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsInbound {
    Message {
        #[serde(default)]
        conversation_id: Option<Uuid>,
        content: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        stream: bool,
        #[serde(default)]
        use_tools: bool,
        #[serde(default)]
        use_memory: bool,
    },
    Ping,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let connection_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state
        .connections
        .add(Connection {
            id: connection_id,
            user_id: user_id.clone(),
            tx: tx.clone(),
        })
        .await;

    info!(connection_id = %connection_id, user = %user_id, "WebSocket connected");

    let welcome = serde_json::json!({
        "type": "connected",
        "connection_id": connection_id,
        "user_id": user_id,
    });
    let _ = tx.send(welcome.to_string());

    // Forward everything queued for this connection out to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = Arc::clone(&state);
    let recv_user = user_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_inbound(&recv_state, &recv_user, &tx, &text).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.connections.remove(connection_id).await;
    info!(connection_id = %connection_id, "WebSocket disconnected");
}

async fn handle_inbound(
    state: &Arc<AppState>,
    user_id: &str,
    tx: &mpsc::UnboundedSender<String>,
    text: &str,
) {
    let inbound: WsInbound = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Unparseable inbound frame");
            let _ = tx.send(
                serde_json::json!({
                    "type": "error",
                    "message": format!("Invalid message: {e}"),
                })
                .to_string(),
            );
            return;
        }
    };

    match inbound {
        WsInbound::Ping => {
            let _ = tx.send(serde_json::json!({"type": "pong"}).to_string());
        }
        WsInbound::Message {
            conversation_id,
            content,
            model,
            stream,
            use_tools,
            use_memory,
        } => {
            let conversation_id = conversation_id.unwrap_or_else(Uuid::new_v4);
            let req = TurnRequest {
                conversation_id,
                user_id: user_id.to_string(),
                content,
                model,
                use_tools,
                use_memory,
            };

            if stream {
                let mut events = state.orchestrator.run_streaming(req);
                while let Some(event) = events.recv().await {
                    state
                        .connections
                        .send_to_user(user_id, &envelope::to_frame(&event, conversation_id))
                        .await;
                }
            } else {
                let reply = state.orchestrator.run(req).await;
                let frame = serde_json::json!({
                    "type": "reply",
                    "conversation_id": conversation_id,
                    "message_id": reply.message_id,
                    "content": reply.content,
                    "usage": reply.usage,
                    "error": reply.error,
                    "timestamp": chrono::Utc::now(),
                });
                state.connections.send_to_user(user_id, &frame.to_string()).await;
            }
        }
    }
}
