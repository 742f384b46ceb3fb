//! Voice conversation WebSocket
//!
//! One connection carries one call with one agent. Each user turn runs
//! through transcription, optional knowledge retrieval, generation and
//! synthesis before the reply streams back.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **Binary frames**: Audio data (PCM 16-bit little-endian, 16kHz, mono)
//! - **end_turn**: Buffered audio is a complete turn
//! - **text**: Typed turn, skips transcription
//! - **reset**: Start a fresh conversation
//! - **ping**: Liveness check
//! - **end_call**: Hang up
//!
//! ## Server → Client
//!
//! - **ready**: Session established
//! - **transcript**: User or assistant text of a turn
//! - **Binary frames**: Synthesized reply audio, in chunks of up to 8 KB
//! - **audio_end**: Reply audio complete
//! - **reset_done**: Conversation cleared
//! - **pong**: Reply to ping
//! - **error**: Setup failure (connection then closes) or turn failure

mod handler;
pub mod messages;
pub mod session;

pub use handler::{SessionOutcome, voice_handler};
