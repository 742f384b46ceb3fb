pub mod audio;
pub mod credentials;
pub mod directory;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod providers;
pub mod rag;
pub mod stt;
pub mod tts;

// Re-export commonly used types for convenience
pub use audio::{AUDIO_CHUNK_SIZE, AudioBuffer, MIN_TURN_BYTES};
pub use credentials::{CredentialError, ProviderCredentials, ProviderId};
pub use directory::{AgentProfile, Directory, DirectoryError};
pub use llm::{ChatModel, ChatTurn, Conversation, LLMError};
pub use pipeline::{PipelineError, PipelineStage, PipelineTimeouts, VoicePipeline};
pub use providers::{CapabilityFactory, HttpCapabilityFactory, SessionCapabilities};
pub use rag::{RetrievalError, RetrievedChunk, Retriever};
pub use stt::{STTError, Transcriber};
pub use tts::{Synthesizer, TTSError};
