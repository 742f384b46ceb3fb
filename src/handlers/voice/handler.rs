//! Voice WebSocket handler
//!
//! Upgrades `/voice/{agent_id}`, sets up the session and drives it until the
//! caller hangs up, the transport drops, or the agent's call limit elapses.

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitStream};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep_until, timeout};
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::auth::Auth;
use crate::middleware::HeldConnection;
use crate::state::AppState;

use super::messages::{OutgoingMessage, VoiceMessageRoute};
use super::session::{SessionControl, VoiceSession};

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Frames read ahead while a turn is in flight
const MAX_PENDING_FRAMES: usize = 256;

/// How long queued frames may take to flush after the loop ends
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_DURATION_MESSAGE: &str = "Maximum call duration reached";

/// How a voice session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    ClientClosed,
    EndCall,
    MaxDuration,
    TransportError,
    SetupFailed,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::ClientClosed => "client_closed",
            SessionOutcome::EndCall => "end_call",
            SessionOutcome::MaxDuration => "max_duration",
            SessionOutcome::TransportError => "transport_error",
            SessionOutcome::SetupFailed => "setup_failed",
        }
    }

    /// Whether a close frame should still be sent to the client.
    fn closes_gracefully(&self) -> bool {
        matches!(
            self,
            SessionOutcome::EndCall | SessionOutcome::MaxDuration | SessionOutcome::SetupFailed
        )
    }
}

/// Voice WebSocket handler
///
/// The auth middleware has already verified the caller; the connection
/// limit middleware may have attached a slot, which is held until the
/// socket task finishes.
pub async fn voice_handler(
    ws: WebSocketUpgrade,
    Path(agent_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    slot: Option<Extension<HeldConnection>>,
) -> Response {
    info!(
        auth_id = ?auth.id,
        agent_id = %agent_id,
        "Voice WebSocket connection upgrade requested"
    );

    let slot = slot.map(|Extension(slot)| slot);
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            handle_voice_socket(socket, state, auth, agent_id).await;
            drop(slot);
        })
}

async fn handle_voice_socket(socket: WebSocket, state: Arc<AppState>, auth: Auth, agent_id: String) {
    info!(auth_id = ?auth.id, agent_id = %agent_id, "Voice WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<VoiceMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, VoiceMessageRoute::Close);

            let result = match route {
                VoiceMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                VoiceMessageRoute::Audio(data) => sender.send(Message::Binary(data)).await,
                VoiceMessageRoute::Close => sender.send(Message::Close(None)).await,
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    let (outcome, session_id, turns, duration) =
        match VoiceSession::establish(&state, &auth, &agent_id).await {
            Ok(mut session) => {
                info!(
                    session_id = %session.id(),
                    agent_id = %agent_id,
                    user_id = ?auth.id,
                    "Voice session ready"
                );
                let outcome = drive(&mut session, &mut receiver, &message_tx).await;
                (
                    outcome,
                    Some(session.id().to_string()),
                    session.turns(),
                    session.elapsed(),
                )
            }
            Err(e) => {
                warn!(
                    agent_id = %agent_id,
                    user_id = ?auth.id,
                    reason = %e,
                    "Voice session setup failed"
                );
                let _ = message_tx
                    .send(VoiceMessageRoute::Outgoing(OutgoingMessage::error(
                        e.to_string(),
                    )))
                    .await;
                (SessionOutcome::SetupFailed, None, 0, Duration::ZERO)
            }
        };

    if outcome.closes_gracefully() {
        let _ = message_tx.send(VoiceMessageRoute::Close).await;
    }
    drop(message_tx);

    if timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task).await.is_err() {
        warn!("Voice sender did not drain in time");
        sender_task.abort();
    }

    info!(
        session_id = ?session_id,
        agent_id = %agent_id,
        user_id = ?auth.id,
        duration_secs = duration.as_secs_f64(),
        turns = turns,
        outcome = outcome.as_str(),
        "Voice WebSocket connection terminated"
    );
}

/// Receive loop. Frames are handled one at a time; while one is being
/// handled the socket is still watched so a hang-up cancels the turn.
async fn drive(
    session: &mut VoiceSession,
    receiver: &mut SplitStream<WebSocket>,
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
) -> SessionOutcome {
    if message_tx
        .send(VoiceMessageRoute::Outgoing(session.ready_message()))
        .await
        .is_err()
    {
        return SessionOutcome::TransportError;
    }

    let deadline = Instant::now() + session.agent().max_call_duration();
    let mut pending: VecDeque<Message> = VecDeque::new();

    loop {
        let message = match pending.pop_front() {
            Some(message) => message,
            None => select! {
                frame = receiver.next() => match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!("Voice WebSocket error: {}", e);
                        return SessionOutcome::TransportError;
                    }
                    None => return SessionOutcome::ClientClosed,
                },
                _ = sleep_until(deadline) => return max_duration_reached(message_tx).await,
            },
        };

        let work = process_frame(session, message, message_tx);
        tokio::pin!(work);

        let control = loop {
            select! {
                control = &mut work => break control,
                frame = receiver.next(), if pending.len() < MAX_PENDING_FRAMES => match frame {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client disconnected mid-turn, dropping turn");
                        return SessionOutcome::ClientClosed;
                    }
                    Some(Err(e)) => {
                        warn!("Voice WebSocket error mid-turn: {}", e);
                        return SessionOutcome::TransportError;
                    }
                    Some(Ok(message)) => pending.push_back(message),
                },
                _ = message_tx.closed() => return SessionOutcome::TransportError,
                _ = sleep_until(deadline) => return max_duration_reached(message_tx).await,
            }
        };

        match control {
            Some(SessionControl::Continue) => {}
            Some(SessionControl::EndCall) => return SessionOutcome::EndCall,
            Some(SessionControl::Disconnected) => return SessionOutcome::TransportError,
            None => return SessionOutcome::ClientClosed,
        }
    }
}

/// Handle one frame. `None` means the client sent a close frame.
async fn process_frame(
    session: &mut VoiceSession,
    message: Message,
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
) -> Option<SessionControl> {
    match message {
        Message::Binary(data) => Some(session.handle_audio(&data, message_tx).await),
        Message::Text(text) => Some(session.handle_text(text.as_str(), message_tx).await),
        // Transport-level keepalives
        Message::Ping(_) | Message::Pong(_) => Some(SessionControl::Continue),
        Message::Close(_) => None,
    }
}

async fn max_duration_reached(message_tx: &mpsc::Sender<VoiceMessageRoute>) -> SessionOutcome {
    info!("Maximum call duration reached");
    let _ = message_tx
        .send(VoiceMessageRoute::Outgoing(OutgoingMessage::error(
            MAX_DURATION_MESSAGE,
        )))
        .await;
    SessionOutcome::MaxDuration
}
