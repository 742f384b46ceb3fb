//! Shared harness for integration tests: scripted providers, an in-memory
//! directory and a server bound to an ephemeral port.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt, stream};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use voxa_gateway::core::llm::{ChatTurn, GenerationParams, LLMResult};
use voxa_gateway::core::providers::CapabilityError;
use voxa_gateway::core::stt::STTResult;
use voxa_gateway::core::tts::{AudioStream, TTSResult};
use voxa_gateway::core::directory::FileDirectory;
use voxa_gateway::{
    AgentProfile, CapabilityFactory, ChatModel, LLMError, ProviderCredentials, STTError,
    ServerConfig, SessionCapabilities, Synthesizer, Transcriber, routes, state::AppState,
};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory with one organization whose only user is the anonymous caller.
pub const DIRECTORY_YAML: &str = r#"
organizations:
  - id: org-1
    users: [anonymous]
    provider_keys:
      - provider: openai
        key: sk-test
      - provider: deepgram
        key: dg-test
    agents:
      - id: front-desk
        name: Front Desk
        system_prompt: You answer questions about Acme.
      - id: retired
        name: Retired
        is_active: false
      - id: claude-desk
        name: Claude Desk
        llm_provider: anthropic
"#;

/// Transcriber that replays a script, then repeats its last entry.
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<STTResult<String>>>,
    fallback: String,
}

impl ScriptedTranscriber {
    pub fn new(script: Vec<STTResult<String>>, fallback: &str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: fallback.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _wav: Bytes, _language: &str) -> STTResult<String> {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Replies with a fixed prefix plus the last user message.
pub struct EchoModel;

#[async_trait]
impl ChatModel for EchoModel {
    async fn complete(&self, turns: &[ChatTurn], _params: &GenerationParams) -> LLMResult<String> {
        let last = turns
            .last()
            .ok_or_else(|| LLMError::InvalidResponse("no turns".into()))?;
        Ok(format!("You said: {}", last.content))
    }

    fn model_id(&self) -> &str {
        "echo"
    }
}

/// Produces `len` bytes of audio for any non-empty text.
pub struct SizedSynth {
    pub len: usize,
}

#[async_trait]
impl Synthesizer for SizedSynth {
    async fn synthesize_stream(&self, text: &str) -> TTSResult<AudioStream> {
        if text.is_empty() {
            return Ok(stream::empty().boxed());
        }
        let audio = Bytes::from(vec![0x5a; self.len]);
        Ok(stream::iter(vec![Ok(audio)]).boxed())
    }

    fn provider_name(&self) -> &'static str {
        "sized"
    }
}

/// Factory handing every session the same scripted capabilities.
pub struct ScriptedFactory {
    transcriber: Arc<ScriptedTranscriber>,
    audio_len: usize,
}

impl ScriptedFactory {
    pub fn new(script: Vec<STTResult<String>>, audio_len: usize) -> Self {
        Self {
            transcriber: Arc::new(ScriptedTranscriber::new(script, "What are your hours?")),
            audio_len,
        }
    }
}

impl CapabilityFactory for ScriptedFactory {
    fn build(
        &self,
        _agent: &AgentProfile,
        credentials: &ProviderCredentials,
    ) -> Result<SessionCapabilities, CapabilityError> {
        credentials.require(voxa_gateway::ProviderId::OpenAI)?;
        Ok(SessionCapabilities {
            transcriber: self.transcriber.clone(),
            chat_model: Arc::new(EchoModel),
            synthesizer: Arc::new(SizedSynth {
                len: self.audio_len,
            }),
            retriever: None,
        })
    }
}

pub fn transcription_failure() -> STTResult<String> {
    Err(STTError::ProviderError(
        "Deepgram API error (500 Internal Server Error): boom".into(),
    ))
}

pub fn open_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.auth_required = false;
    config
}

/// Serve the full router on an ephemeral port.
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = routes::build_router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server");
    });
    addr
}

/// Server with auth disabled, [`DIRECTORY_YAML`] and scripted providers.
pub async fn spawn_scripted(factory: ScriptedFactory) -> (Arc<AppState>, SocketAddr) {
    spawn_with_directory(DIRECTORY_YAML, factory).await
}

pub async fn spawn_with_directory(
    yaml: &str,
    factory: ScriptedFactory,
) -> (Arc<AppState>, SocketAddr) {
    let directory = Arc::new(FileDirectory::from_yaml_str(yaml).expect("directory yaml"));
    let state = AppState::with_components(open_config(), directory, Arc::new(factory))
        .expect("state");
    let addr = spawn_server(state.clone()).await;
    (state, addr)
}

pub async fn connect(addr: SocketAddr, agent_id: &str) -> Client {
    let url = format!("ws://{addr}/voice/{agent_id}");
    let (client, _) = connect_async(url).await.expect("websocket connect");
    client
}

/// Next frame, skipping transport keepalives. `None` once the server closed.
pub async fn next_frame(client: &mut Client) -> Option<Message> {
    loop {
        let frame = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for frame");
        match frame {
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(message)) => return Some(message),
        }
    }
}

/// Next frame, which must be a JSON text frame.
pub async fn next_json(client: &mut Client) -> Value {
    match next_frame(client).await {
        Some(Message::Text(text)) => serde_json::from_str(text.as_str()).expect("json frame"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send text");
}

pub async fn send_audio(client: &mut Client, len: usize) {
    client
        .send(Message::Binary(Bytes::from(vec![0u8; len])))
        .await
        .expect("send audio");
}

/// Read frames until `audio_end`, returning the JSON frames seen and the
/// sizes of the binary frames.
pub async fn collect_turn(client: &mut Client) -> (Vec<Value>, Vec<usize>) {
    let mut json = Vec::new();
    let mut audio = Vec::new();
    loop {
        match next_frame(client).await {
            Some(Message::Text(text)) => {
                let value: Value = serde_json::from_str(text.as_str()).expect("json frame");
                let done = value["type"] == "audio_end";
                json.push(value);
                if done {
                    return (json, audio);
                }
            }
            Some(Message::Binary(data)) => audio.push(data.len()),
            other => panic!("unexpected frame mid-turn: {other:?}"),
        }
    }
}
