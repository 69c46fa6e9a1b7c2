// WebSocket handler: full snapshot replay, then live update relay

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("new viewer connected");
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so no update falls in the gap
    // between baseline and live stream.
    let mut rx = state.subscribe();

    for event in state.registry.snapshot().await {
        let Ok(json) = serde_json::to_string(&event) else {
            continue;
        };
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "viewer fell behind the update stream");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Viewers send nothing meaningful; poll only to notice the close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_)) = receiver.next().await {}
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
    tracing::info!("viewer disconnected");
}
