//! Per-connection voice session
//!
//! A `VoiceSession` is created once the caller, agent and provider keys have
//! been resolved. It owns the audio buffer and the pipeline, and turns each
//! inbound frame into zero or more outbound routes.

use bytes::Bytes;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::Auth;
use crate::core::audio::{AUDIO_CHUNK_SIZE, AudioBuffer, MIN_TURN_BYTES, chunk_audio};
use crate::core::credentials::CredentialError;
use crate::core::directory::{AgentProfile, DirectoryError, resolve_credentials};
use crate::core::pipeline::{PipelineTimeouts, VoicePipeline};
use crate::core::providers::{CapabilityError, SessionCapabilities};
use crate::state::AppState;

use super::messages::{
    IncomingMessage, MAX_TEXT_SIZE, OutgoingMessage, TranscriptRole, VoiceMessageRoute,
    truncate_chars,
};

/// Directory user id used for callers when authentication is disabled.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

const LOGGED_TRANSCRIPT_CHARS: usize = 100;

/// Reasons a session cannot start. Reported once, then the connection closes.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("No organization found for this user")]
    NoOrganization,

    #[error("Agent not found")]
    AgentNotFound,

    #[error("Agent is not active")]
    AgentInactive,

    #[error(transparent)]
    MissingCredential(CredentialError),

    #[error("Failed to load agent configuration")]
    Directory(#[from] DirectoryError),

    #[error("Failed to initialize providers: {0}")]
    Capability(CapabilityError),
}

impl From<CredentialError> for SetupError {
    fn from(err: CredentialError) -> Self {
        SetupError::MissingCredential(err)
    }
}

impl From<CapabilityError> for SetupError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::Credential(e) => SetupError::MissingCredential(e),
            other => SetupError::Capability(other),
        }
    }
}

/// What the connection loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Continue,
    /// Client asked to hang up
    EndCall,
    /// The outbound channel is gone
    Disconnected,
}

pub struct VoiceSession {
    id: String,
    agent: AgentProfile,
    pipeline: VoicePipeline,
    buffer: AudioBuffer,
    started_at: Instant,
    turns: usize,
}

impl VoiceSession {
    /// Resolve caller, agent, keys and collection, then build the pipeline.
    pub async fn establish(
        state: &AppState,
        auth: &Auth,
        agent_id: &str,
    ) -> Result<Self, SetupError> {
        let user_id = auth.user_id().unwrap_or(ANONYMOUS_USER_ID);
        let directory = state.directory.as_ref();

        let org_id = directory
            .organization_for_user(user_id)
            .await?
            .ok_or(SetupError::NoOrganization)?;
        let agent = directory
            .agent(&org_id, agent_id)
            .await?
            .ok_or(SetupError::AgentNotFound)?;
        if !agent.is_active {
            return Err(SetupError::AgentInactive);
        }

        let credentials = resolve_credentials(directory, &org_id).await?;
        for provider in agent.required_providers() {
            credentials.require(provider)?;
        }
        let collection = directory.knowledge_collection(&agent.id).await?;
        let capabilities = state.capabilities.build(&agent, &credentials)?;

        debug!(
            org_id = %org_id,
            agent_id = %agent.id,
            providers = ?credentials.providers(),
            collection = ?collection,
            greeting = %agent.greeting,
            "Session resolved"
        );

        Ok(Self::new(
            agent,
            capabilities,
            collection,
            state.config.pipeline_timeouts(),
        ))
    }

    pub fn new(
        agent: AgentProfile,
        capabilities: SessionCapabilities,
        collection: Option<String>,
        timeouts: PipelineTimeouts,
    ) -> Self {
        let pipeline = VoicePipeline::new(
            capabilities,
            &agent.system_prompt,
            &agent.language,
            collection,
            timeouts,
        );
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent,
            pipeline,
            buffer: AudioBuffer::new(),
            started_at: Instant::now(),
            turns: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> &AgentProfile {
        &self.agent
    }

    pub fn pipeline(&self) -> &VoicePipeline {
        &self.pipeline
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Completed turns so far.
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn ready_message(&self) -> OutgoingMessage {
        OutgoingMessage::Ready {
            agent: self.agent.name.clone(),
        }
    }

    /// Append a binary frame to the turn buffer.
    pub async fn handle_audio(
        &mut self,
        frame: &[u8],
        tx: &mpsc::Sender<VoiceMessageRoute>,
    ) -> SessionControl {
        match self.buffer.push(frame) {
            Ok(()) => SessionControl::Continue,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Audio buffer overflow, dropping turn");
                send(tx, OutgoingMessage::error(e.to_string())).await
            }
        }
    }

    /// Handle a text frame. Malformed or unknown messages are ignored.
    pub async fn handle_text(
        &mut self,
        raw: &str,
        tx: &mpsc::Sender<VoiceMessageRoute>,
    ) -> SessionControl {
        match IncomingMessage::parse(raw) {
            Some(message) => self.handle_message(message, tx).await,
            None => {
                debug!(session_id = %self.id, bytes = raw.len(), "Ignoring unrecognized frame");
                SessionControl::Continue
            }
        }
    }

    pub async fn handle_message(
        &mut self,
        message: IncomingMessage,
        tx: &mpsc::Sender<VoiceMessageRoute>,
    ) -> SessionControl {
        match message {
            IncomingMessage::EndTurn => self.end_turn(tx).await,
            IncomingMessage::Ping => send(tx, OutgoingMessage::Pong).await,
            IncomingMessage::EndCall => SessionControl::EndCall,
            IncomingMessage::Text { text } => self.text_turn(&text, tx).await,
            IncomingMessage::Reset => {
                self.pipeline.reset();
                self.buffer.clear();
                info!(session_id = %self.id, "Conversation reset");
                send(tx, OutgoingMessage::ResetDone).await
            }
        }
    }

    async fn end_turn(&mut self, tx: &mpsc::Sender<VoiceMessageRoute>) -> SessionControl {
        let buffered = self.buffer.len();
        let Some(wav) = self.buffer.take_turn() else {
            debug!(
                session_id = %self.id,
                buffered_bytes = buffered,
                min_bytes = MIN_TURN_BYTES,
                "Turn too short, discarded"
            );
            return SessionControl::Continue;
        };

        let started = Instant::now();
        match self.pipeline.process_audio(wav).await {
            Ok(output) => {
                self.turns += 1;
                debug!(
                    session_id = %self.id,
                    user = truncate_chars(&output.user_text, LOGGED_TRANSCRIPT_CHARS),
                    agent = truncate_chars(&output.agent_text, LOGGED_TRANSCRIPT_CHARS),
                    "Turn transcripts"
                );
                info!(
                    session_id = %self.id,
                    turn = self.turns,
                    pcm_bytes = buffered,
                    audio_bytes = output.audio.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Voice turn processed"
                );
                emit_turn(tx, output.user_text, output.agent_text, output.audio).await
            }
            Err(e) => {
                warn!(
                    session_id = %self.id,
                    stage = %e.stage(),
                    error = %e,
                    "Voice turn failed"
                );
                send(tx, OutgoingMessage::processing_error(&e.to_string())).await
            }
        }
    }

    async fn text_turn(
        &mut self,
        text: &str,
        tx: &mpsc::Sender<VoiceMessageRoute>,
    ) -> SessionControl {
        if text.len() > MAX_TEXT_SIZE {
            warn!(session_id = %self.id, bytes = text.len(), "Text turn too large");
            return send(
                tx,
                OutgoingMessage::error(format!(
                    "Text too large: {} bytes (max: {MAX_TEXT_SIZE} bytes)",
                    text.len()
                )),
            )
            .await;
        }

        let started = Instant::now();
        match self.pipeline.process_text(text).await {
            Ok(output) => {
                self.turns += 1;
                info!(
                    session_id = %self.id,
                    turn = self.turns,
                    text_bytes = text.len(),
                    audio_bytes = output.audio.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Text turn processed"
                );
                emit_turn(tx, text.to_string(), output.agent_text, output.audio).await
            }
            Err(e) => {
                warn!(
                    session_id = %self.id,
                    stage = %e.stage(),
                    error = %e,
                    "Text turn failed"
                );
                send(tx, OutgoingMessage::processing_error(&e.to_string())).await
            }
        }
    }
}

async fn send(tx: &mpsc::Sender<VoiceMessageRoute>, message: OutgoingMessage) -> SessionControl {
    match tx.send(VoiceMessageRoute::Outgoing(message)).await {
        Ok(()) => SessionControl::Continue,
        Err(_) => SessionControl::Disconnected,
    }
}

/// Emit one turn in protocol order: user transcript, assistant transcript,
/// audio chunks, then the end marker.
async fn emit_turn(
    tx: &mpsc::Sender<VoiceMessageRoute>,
    user_text: String,
    agent_text: String,
    audio: Bytes,
) -> SessionControl {
    let mut routes = vec![
        VoiceMessageRoute::Outgoing(OutgoingMessage::transcript(TranscriptRole::User, user_text)),
        VoiceMessageRoute::Outgoing(OutgoingMessage::transcript(
            TranscriptRole::Assistant,
            agent_text,
        )),
    ];
    routes.extend(chunk_audio(&audio, AUDIO_CHUNK_SIZE).map(VoiceMessageRoute::Audio));
    routes.push(VoiceMessageRoute::Outgoing(OutgoingMessage::AudioEnd));

    for route in routes {
        if tx.send(route).await.is_err() {
            return SessionControl::Disconnected;
        }
    }
    SessionControl::Continue
}
