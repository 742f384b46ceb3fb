//! Turn orchestration: transcription, optional retrieval, generation and
//! synthesis, in that order, each bounded by its own timeout.

use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::llm::{Conversation, LLMError};
use crate::core::providers::SessionCapabilities;
use crate::core::rag::{DEFAULT_TOP_K, RetrievalError, Retriever, build_context};
use crate::core::stt::{STTError, Transcriber};
use crate::core::tts::{Synthesizer, TTSError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Transcribing,
    Retrieving,
    Generating,
    Synthesizing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Transcribing => "transcription",
            PipelineStage::Retrieving => "retrieval",
            PipelineStage::Generating => "generation",
            PipelineStage::Synthesizing => "synthesis",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transcription(#[from] STTError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] LLMError),

    #[error(transparent)]
    Synthesis(#[from] TTSError),

    #[error("{stage} timed out after {limit:?}")]
    Timeout {
        stage: PipelineStage,
        limit: Duration,
    },
}

impl PipelineError {
    /// Stage the turn failed in.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Transcription(_) => PipelineStage::Transcribing,
            PipelineError::Retrieval(_) => PipelineStage::Retrieving,
            PipelineError::Generation(_) => PipelineStage::Generating,
            PipelineError::Synthesis(_) => PipelineStage::Synthesizing,
            PipelineError::Timeout { stage, .. } => *stage,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Upper bound on each provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTimeouts {
    pub transcription: Duration,
    pub retrieval: Duration,
    pub generation: Duration,
    pub synthesis: Duration,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self {
            transcription: Duration::from_secs(15),
            retrieval: Duration::from_secs(10),
            generation: Duration::from_secs(20),
            synthesis: Duration::from_secs(30),
        }
    }
}

/// Result of a voice turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutput {
    pub user_text: String,
    pub agent_text: String,
    pub audio: Bytes,
}

/// Result of a typed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTurnOutput {
    pub agent_text: String,
    pub audio: Bytes,
}

async fn bounded<T, E, F>(stage: PipelineStage, limit: Duration, fut: F) -> PipelineResult<T>
where
    F: Future<Output = Result<T, E>>,
    PipelineError: From<E>,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => Err(PipelineError::Timeout { stage, limit }),
    };
    debug!(
        stage = %stage,
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Pipeline stage finished"
    );
    result
}

/// Per-session orchestrator. Owns the conversation and processes one turn at a time.
pub struct VoicePipeline {
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    retriever: Option<Arc<dyn Retriever>>,
    conversation: Conversation,
    language: String,
    collection: Option<String>,
    top_k: usize,
    timeouts: PipelineTimeouts,
    stage: PipelineStage,
}

impl VoicePipeline {
    pub fn new(
        capabilities: SessionCapabilities,
        system_prompt: &str,
        language: &str,
        collection: Option<String>,
        timeouts: PipelineTimeouts,
    ) -> Self {
        if collection.is_some() && capabilities.retriever.is_none() {
            warn!("Knowledge collection configured but no retriever available");
        }
        Self {
            transcriber: capabilities.transcriber,
            synthesizer: capabilities.synthesizer,
            retriever: capabilities.retriever,
            conversation: Conversation::new(capabilities.chat_model, system_prompt),
            language: language.to_string(),
            collection,
            top_k: DEFAULT_TOP_K,
            timeouts,
            stage: PipelineStage::Idle,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run a voice turn over a WAV-framed buffer.
    pub async fn process_audio(&mut self, wav: Bytes) -> PipelineResult<TurnOutput> {
        let started = Instant::now();
        let result = self.run_audio(wav).await;
        self.stage = PipelineStage::Idle;
        if let Ok(output) = &result {
            info!(
                user_chars = output.user_text.len(),
                agent_chars = output.agent_text.len(),
                audio_bytes = output.audio.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Voice turn complete"
            );
        }
        result
    }

    /// Run a typed turn, skipping transcription.
    pub async fn process_text(&mut self, text: &str) -> PipelineResult<TextTurnOutput> {
        let result = self.answer(text).await;
        self.stage = PipelineStage::Idle;
        result.map(|(agent_text, audio)| TextTurnOutput { agent_text, audio })
    }

    /// Forget the conversation, keeping the system prompt.
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.stage = PipelineStage::Idle;
    }

    async fn run_audio(&mut self, wav: Bytes) -> PipelineResult<TurnOutput> {
        self.stage = PipelineStage::Transcribing;
        let user_text = bounded(
            PipelineStage::Transcribing,
            self.timeouts.transcription,
            self.transcriber.transcribe(wav, &self.language),
        )
        .await?;

        let (agent_text, audio) = self.answer(&user_text).await?;
        Ok(TurnOutput {
            user_text,
            agent_text,
            audio,
        })
    }

    async fn answer(&mut self, user_text: &str) -> PipelineResult<(String, Bytes)> {
        let knowledge = self.retriever.clone().zip(self.collection.clone());

        let context = match knowledge {
            Some((retriever, collection)) => {
                self.stage = PipelineStage::Retrieving;
                let chunks = bounded(
                    PipelineStage::Retrieving,
                    self.timeouts.retrieval,
                    retriever.search(&collection, user_text, self.top_k),
                )
                .await?;
                Some(build_context(&chunks))
            }
            None => None,
        };

        self.stage = PipelineStage::Generating;
        let pending = bounded(
            PipelineStage::Generating,
            self.timeouts.generation,
            self.conversation.draft(user_text, context.as_deref()),
        )
        .await?;

        self.stage = PipelineStage::Synthesizing;
        let audio = bounded(
            PipelineStage::Synthesizing,
            self.timeouts.synthesis,
            self.synthesizer.synthesize(pending.reply()),
        )
        .await?;

        // The exchange is only recorded once the caller can hear the reply.
        let agent_text = self.conversation.commit(pending);
        Ok((agent_text, audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{AudioBuffer, WAV_HEADER_LEN};
    use crate::core::llm::{ChatModel, ChatTurn, GenerationParams, LLMResult, Role};
    use crate::core::rag::{RetrievalResult, RetrievedChunk};
    use crate::core::stt::STTResult;
    use crate::core::tts::{AudioStream, TTSResult};
    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeTranscriber {
        text: String,
        delay: Option<Duration>,
        received: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, wav: Bytes, _language: &str) -> STTResult<String> {
            self.received.lock().push(wav.len());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.text.clone())
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    #[derive(Default)]
    struct FakeModel {
        reply: String,
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn complete(
            &self,
            turns: &[ChatTurn],
            _params: &GenerationParams,
        ) -> LLMResult<String> {
            if let Some(last) = turns.last() {
                self.prompts.lock().push(last.content.clone());
            }
            if self.fail {
                return Err(LLMError::ProviderError("overloaded".into()));
            }
            Ok(self.reply.clone())
        }

        fn model_id(&self) -> &str {
            "fake"
        }
    }

    struct FakeSynthesizer {
        bytes: usize,
        fail: bool,
    }

    #[async_trait]
    impl Synthesizer for FakeSynthesizer {
        async fn synthesize_stream(&self, text: &str) -> TTSResult<AudioStream> {
            if self.fail {
                return Err(TTSError::ProviderError("voice unavailable".into()));
            }
            let audio = if text.is_empty() {
                Bytes::new()
            } else {
                Bytes::from(vec![1u8; self.bytes])
            };
            Ok(futures::stream::iter(vec![Ok(audio)]).boxed())
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    #[derive(Default)]
    struct FakeRetriever {
        chunks: Vec<&'static str>,
        fail: bool,
        searched: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn search(
            &self,
            collection: &str,
            _query: &str,
            top_k: usize,
        ) -> RetrievalResult<Vec<RetrievedChunk>> {
            self.searched.lock().push((collection.to_string(), top_k));
            if self.fail {
                return Err(RetrievalError::BackendError("collection offline".into()));
            }
            Ok(self
                .chunks
                .iter()
                .map(|c| RetrievedChunk {
                    content: c.to_string(),
                    score: 0.5,
                    document_id: "d".into(),
                    metadata: Default::default(),
                })
                .collect())
        }
    }

    fn capabilities(
        transcriber: Arc<FakeTranscriber>,
        model: Arc<FakeModel>,
        retriever: Option<Arc<FakeRetriever>>,
    ) -> SessionCapabilities {
        SessionCapabilities {
            transcriber,
            chat_model: model,
            synthesizer: Arc::new(FakeSynthesizer {
                bytes: 20_000,
                fail: false,
            }),
            retriever: retriever.map(|r| r as Arc<dyn Retriever>),
        }
    }

    fn turn_of(pcm_len: usize) -> Bytes {
        let mut buffer = AudioBuffer::new();
        buffer.push(&vec![0u8; pcm_len]).unwrap();
        buffer.take_turn().unwrap()
    }

    #[tokio::test]
    async fn test_voice_turn_without_knowledge() {
        let transcriber = Arc::new(FakeTranscriber {
            text: "hello".into(),
            ..Default::default()
        });
        let model = Arc::new(FakeModel {
            reply: "Hi there".into(),
            ..Default::default()
        });
        let mut pipeline = VoicePipeline::new(
            capabilities(transcriber.clone(), model.clone(), None),
            "You are a helpful assistant.",
            "en",
            None,
            PipelineTimeouts::default(),
        );

        let output = pipeline.process_audio(turn_of(6400)).await.unwrap();

        assert_eq!(output.user_text, "hello");
        assert_eq!(output.agent_text, "Hi there");
        assert_eq!(output.audio.len(), 20_000);
        assert_eq!(*transcriber.received.lock(), vec![WAV_HEADER_LEN + 6400]);
        let history = pipeline.conversation().history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], ChatTurn::user("hello"));
        assert_eq!(history[2].role, Role::Assistant);
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
    }

    #[tokio::test]
    async fn test_knowledge_context_prepended() {
        let transcriber = Arc::new(FakeTranscriber {
            text: "When do you open?".into(),
            ..Default::default()
        });
        let model = Arc::new(FakeModel {
            reply: "At nine.".into(),
            ..Default::default()
        });
        let retriever = Arc::new(FakeRetriever {
            chunks: vec!["We open at 9.", "We close at 5."],
            ..Default::default()
        });
        let mut pipeline = VoicePipeline::new(
            capabilities(transcriber, model.clone(), Some(retriever.clone())),
            "sys",
            "en",
            Some("kb_1".into()),
            PipelineTimeouts::default(),
        );

        let output = pipeline.process_audio(turn_of(3200)).await.unwrap();

        assert_eq!(output.user_text, "When do you open?");
        assert_eq!(*retriever.searched.lock(), vec![("kb_1".to_string(), 3)]);
        assert_eq!(
            model.prompts.lock()[0],
            "Context:\nWe open at 9.\n\nWe close at 5.\n\nUser: When do you open?"
        );
        assert_eq!(
            pipeline.conversation().transcript()[0],
            ChatTurn::user("When do you open?")
        );
    }

    #[tokio::test]
    async fn test_text_turn_skips_transcription() {
        let transcriber = Arc::new(FakeTranscriber::default());
        let model = Arc::new(FakeModel {
            reply: "Sure.".into(),
            ..Default::default()
        });
        let mut pipeline = VoicePipeline::new(
            capabilities(transcriber.clone(), model, None),
            "sys",
            "en",
            None,
            PipelineTimeouts::default(),
        );

        let output = pipeline.process_text("Can you help?").await.unwrap();
        assert_eq!(output.agent_text, "Sure.");
        assert!(!output.audio.is_empty());
        assert!(transcriber.received.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transcription_timeout_returns_to_idle() {
        let transcriber = Arc::new(FakeTranscriber {
            text: "late".into(),
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let model = Arc::new(FakeModel::default());
        let timeouts = PipelineTimeouts {
            transcription: Duration::from_millis(50),
            ..Default::default()
        };
        let mut pipeline = VoicePipeline::new(
            capabilities(transcriber, model.clone(), None),
            "sys",
            "en",
            None,
            timeouts,
        );

        let err = pipeline.process_audio(turn_of(3200)).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Timeout {
                stage: PipelineStage::Transcribing,
                ..
            }
        ));
        assert_eq!(err.stage(), PipelineStage::Transcribing);
        assert!(err.to_string().starts_with("transcription timed out"));
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
        assert!(model.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_history() {
        let transcriber = Arc::new(FakeTranscriber {
            text: "hello".into(),
            ..Default::default()
        });
        let model = Arc::new(FakeModel {
            fail: true,
            ..Default::default()
        });
        let mut pipeline = VoicePipeline::new(
            capabilities(transcriber, model, None),
            "sys",
            "en",
            None,
            PipelineTimeouts::default(),
        );

        let err = pipeline.process_audio(turn_of(3200)).await.unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Generating);
        assert_eq!(pipeline.conversation().history().len(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_failure_discards_exchange() {
        let transcriber = Arc::new(FakeTranscriber {
            text: "hello".into(),
            ..Default::default()
        });
        let model = Arc::new(FakeModel {
            reply: "hi".into(),
            ..Default::default()
        });
        let mut caps = capabilities(transcriber, model.clone(), None);
        caps.synthesizer = Arc::new(FakeSynthesizer {
            bytes: 100,
            fail: true,
        });
        let mut pipeline =
            VoicePipeline::new(caps, "sys", "en", None, PipelineTimeouts::default());

        let err = pipeline.process_text("hello").await.unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Synthesizing);
        assert!(matches!(err, PipelineError::Synthesis(_)));
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
        assert_eq!(pipeline.conversation().history(), &[ChatTurn::system("sys")]);
        assert!(pipeline.conversation().transcript().is_empty());

        let err = pipeline.process_audio(turn_of(3200)).await.unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Synthesizing);
        assert_eq!(pipeline.conversation().history().len(), 1);

        assert_eq!(*model.prompts.lock(), vec!["hello", "hello"]);
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_generation() {
        let transcriber = Arc::new(FakeTranscriber {
            text: "When do you open?".into(),
            ..Default::default()
        });
        let model = Arc::new(FakeModel {
            reply: "At nine.".into(),
            ..Default::default()
        });
        let retriever = Arc::new(FakeRetriever {
            fail: true,
            ..Default::default()
        });
        let mut pipeline = VoicePipeline::new(
            capabilities(transcriber, model.clone(), Some(retriever.clone())),
            "sys",
            "en",
            Some("kb_1".into()),
            PipelineTimeouts::default(),
        );

        let err = pipeline.process_audio(turn_of(3200)).await.unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Retrieving);
        assert!(err.to_string().starts_with("Retrieval failed"));
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
        assert!(model.prompts.lock().is_empty());
        assert_eq!(pipeline.conversation().history().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let transcriber = Arc::new(FakeTranscriber::default());
        let model = Arc::new(FakeModel {
            reply: "ok".into(),
            ..Default::default()
        });
        let mut pipeline = VoicePipeline::new(
            capabilities(transcriber, model, None),
            "sys",
            "en",
            None,
            PipelineTimeouts::default(),
        );
        pipeline.process_text("one").await.unwrap();
        pipeline.process_text("two").await.unwrap();

        pipeline.reset();
        assert_eq!(pipeline.conversation().history(), &[ChatTurn::system("sys")]);
    }
}
