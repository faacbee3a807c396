use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::services::SubscriptionHandle;
use crate::types::{ChannelKey, ClientMessage, ServerMessage, Side, TimeRange};
use crate::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One held channel subscription: its teardown handle plus the task
/// forwarding its stream to this client.
struct ClientSubscription {
    handle: SubscriptionHandle,
    forward_task: JoinHandle<()>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Channel for sending messages to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let client_id = Uuid::new_v4();
    info!("dashboard client connected: {}", client_id);

    // Forward outbound messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions: HashMap<String, ClientSubscription> = HashMap::new();

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                debug!("received message from {}: {}", client_id, text);
                handle_message(&state, &tx, &mut subscriptions, &text);
            }
            Ok(Message::Close(_)) => {
                info!("dashboard client disconnecting: {}", client_id);
                break;
            }
            Err(e) => {
                error!("websocket error for {}: {}", client_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up
    for (_, mut subscription) in subscriptions {
        subscription.handle.unsubscribe();
        subscription.forward_task.abort();
    }
    send_task.abort();
    info!("dashboard client disconnected: {}", client_id);
}

fn handle_message(
    state: &AppState,
    tx: &mpsc::UnboundedSender<String>,
    subscriptions: &mut HashMap<String, ClientSubscription>,
    text: &str,
) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            send_server_message(
                tx,
                &ServerMessage::Error {
                    message: format!("invalid message: {}", e),
                },
            );
            return;
        }
    };

    let (market_id, side, range) = match &msg {
        ClientMessage::Subscribe {
            market_id,
            side,
            range,
        }
        | ClientMessage::Unsubscribe {
            market_id,
            side,
            range,
        }
        | ClientMessage::Replay {
            market_id,
            side,
            range,
        } => (market_id.clone(), side.clone(), range.clone()),
    };

    let (Some(side), Some(range)) = (Side::from_str(&side), TimeRange::from_str(&range)) else {
        send_server_message(
            tx,
            &ServerMessage::Error {
                message: format!("unknown side or range: {}/{}", side, range),
            },
        );
        return;
    };

    let key = ChannelKey::generate(&market_id, side, range);

    match msg {
        ClientMessage::Subscribe { .. } => {
            if subscriptions.contains_key(&key) {
                return;
            }

            let subscription = state
                .manager
                .subscribe_with_cleanup(&market_id, side, range, None);
            let mut stream = subscription.stream;
            let forward_tx = tx.clone();

            let forward_task = tokio::spawn(async move {
                while let Some(msg) = stream.recv().await {
                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if forward_tx.send(json).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("failed to serialize channel message: {}", e);
                        }
                    }
                }
            });

            subscriptions.insert(
                key.clone(),
                ClientSubscription {
                    handle: subscription.handle,
                    forward_task,
                },
            );
            send_server_message(tx, &ServerMessage::Subscribed { channel: key });
        }
        ClientMessage::Unsubscribe { .. } => {
            if let Some(mut subscription) = subscriptions.remove(&key) {
                subscription.handle.unsubscribe();
                subscription.forward_task.abort();
                send_server_message(tx, &ServerMessage::Unsubscribed { channel: key });
            }
        }
        ClientMessage::Replay { .. } => {
            state.manager.replay(&market_id, side, range);
        }
    }
}

fn send_server_message(tx: &mpsc::UnboundedSender<String>, msg: &ServerMessage) {
    if let Ok(json) = serde_json::to_string(msg) {
        let _ = tx.send(json);
    }
}
