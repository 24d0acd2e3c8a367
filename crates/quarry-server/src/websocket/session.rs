//! One observer connection, from upgrade through disconnect.
//!
//! 1. Registers a [`ClientSession`] with the registry
//! 2. Greets the new session (direct frame, not a broadcast)
//! 3. Forwards queued frames and periodic pings on the write side
//! 4. Dispatches inbound frames: `cancel_task` commands to the facade,
//!    anything else to the chat delegate
//! 5. Tears the session down on disconnect, leaving task state untouched

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::broadcast::SessionRegistry;
use super::connection::ClientSession;
use crate::chat::ChatDelegate;
use crate::config::ServerConfig;
use quarry_core::events::{ClientCommand, InboundFrame, MessageKind, ServerEvent, parse_inbound};
use quarry_core::ids::ClientId;
use quarry_runtime::facade::Orchestrator;

/// Run a WebSocket session for one connected observer.
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: ClientId,
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionRegistry>,
    chat: Arc<dyn ChatDelegate>,
    config: ServerConfig,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.session_queue_depth);
    let session = Arc::new(ClientSession::new(client_id.clone(), send_tx));

    let connected_at = std::time::Instant::now();
    info!("observer connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    sessions.add(session.clone()).await;

    // Direct hello so a reconnecting observer knows the stream is live.
    let hello = ServerEvent::message(MessageKind::System, "Connected to quarry task stream");
    if let Ok(frame) = serde_json::to_string(&hello) {
        let _ = session.send(Arc::new(frame));
    }

    // Write side: drain the session queue, interleave heartbeat pings.
    let ping_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(config.heartbeat_timeout_secs);
    let writer_session = session.clone();
    let writer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        let _ = ticker.tick().await; // skip the immediate tick

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !writer_session.check_alive()
                        && writer_session.last_pong_elapsed() > pong_timeout
                    {
                        warn!("observer unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read side: classify and dispatch inbound frames.
    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_owned()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("observer sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                session.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        session.mark_alive();
        dispatch_inbound(&text, &orchestrator, chat.as_ref()).await;
    }

    info!(frames = session.seq(), dropped = session.drop_count(), "observer disconnected");
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connected_at.elapsed().as_secs_f64());
    writer.abort();
    sessions.remove(&client_id).await;
}

/// Route one inbound text frame.
///
/// Cancellation commands go straight to the facade; failures surface to
/// observers as an `error` message. Everything else is chat input.
pub async fn dispatch_inbound(text: &str, orchestrator: &Orchestrator, chat: &dyn ChatDelegate) {
    match parse_inbound(text) {
        InboundFrame::Command(ClientCommand::CancelTask { task_id }) => {
            debug!(task_id = %task_id, "cancel command from observer");
            if let Err(err) = orchestrator.request_cancel(&task_id) {
                let _ = orchestrator
                    .emitter()
                    .emit_message(MessageKind::Error, format!("Cancel failed: {err}"));
            }
        }
        InboundFrame::Chat(text) => {
            chat.on_chat(&text, orchestrator).await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
