//! Voice WebSocket message types
//!
//! JSON control frames in both directions. Audio travels as binary frames:
//! 16-bit little-endian mono PCM at 16 kHz from the client, synthesized
//! audio chunks from the server.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum allowed size for typed text turns (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Maximum characters of error detail sent to the client
pub const MAX_ERROR_DETAIL_CHARS: usize = 200;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    /// Buffered audio forms a complete user turn
    EndTurn,
    Ping,
    /// Caller hangs up
    EndCall,
    /// Typed user turn, skips transcription
    Text { text: String },
    /// Start a fresh conversation on the same connection
    Reset,
}

impl IncomingMessage {
    /// Parse a text frame. Malformed JSON and unknown types yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Session set up; sent once
    Ready { agent: String },
    Error { message: String },
    Transcript { role: TranscriptRole, text: String },
    /// All audio chunks of the current turn have been sent
    AudioEnd,
    Pong,
    ResetDone,
}

impl OutgoingMessage {
    pub fn error(message: impl Into<String>) -> Self {
        OutgoingMessage::Error {
            message: message.into(),
        }
    }

    /// Error frame for a failed turn, with the detail bounded in length.
    pub fn processing_error(detail: &str) -> Self {
        Self::error(format!("Processing error: {}", truncate_chars(detail, MAX_ERROR_DETAIL_CHARS)))
    }

    pub fn transcript(role: TranscriptRole, text: impl Into<String>) -> Self {
        OutgoingMessage::Transcript {
            role,
            text: text.into(),
        }
    }
}

// =============================================================================
// Message Routing
// =============================================================================

/// Work items for the socket sender task
#[derive(Debug)]
pub enum VoiceMessageRoute {
    /// JSON text message
    Outgoing(OutgoingMessage),
    /// Binary audio data
    Audio(Bytes),
    /// Close connection
    Close,
}

/// Cut `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
