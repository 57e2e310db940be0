//! Speech payload functions.
//!
//! The functions here validate their input, delegate the actual audio work to
//! a [`SpeechClient`] and return `{"media": {"payload": <base64>}}`.

use crate::error::WorkflowError;
use crate::input::{StepInput, StepOutput};
use crate::step::{StepFunction, StepName};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Voice used when the input does not name one.
pub const DEFAULT_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";
/// Model used when the input does not name one.
pub const DEFAULT_MODEL_ID: &str = "eleven_monolingual_v1";
/// Output format requested when Twilio-compatible audio is wanted.
pub const TWILIO_OUTPUT_FORMAT: &str = "ulaw_8000";

/// Recognized text-to-speech options.
///
/// | Option            | Default                  | Effect                                 |
/// |-------------------|--------------------------|----------------------------------------|
/// | `voice_id`        | [`DEFAULT_VOICE_ID`]     | voice the text is spoken with          |
/// | `model_id`        | [`DEFAULT_MODEL_ID`]     | synthesis model                        |
/// | `twilio_encoding` | `false`                  | request [`TWILIO_OUTPUT_FORMAT`] audio |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsOptions {
    /// Voice identifier.
    pub voice_id: String,
    /// Model identifier.
    pub model_id: String,
    /// Whether to request 8 kHz mu-law output.
    pub twilio_encoding: bool,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            twilio_encoding: false,
        }
    }
}

/// Voice tuning sent with every synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    /// Voice stability, 0.0 to 1.0.
    pub stability: f32,
    /// Similarity boost, 0.0 to 1.0.
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.5,
        }
    }
}

/// A synthesis request as a provider receives it.
///
/// Serializes to the JSON body; `voice_id` travels in the request path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    /// Voice to use, part of the endpoint rather than the body.
    #[serde(skip)]
    pub voice_id: String,
    /// Text to speak.
    pub text: String,
    /// Synthesis model.
    pub model_id: String,
    /// Voice tuning.
    pub voice_settings: VoiceSettings,
    /// Requested audio format, provider default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl SynthesisRequest {
    /// Builds a request for `text` with the given options.
    pub fn new(text: impl Into<String>, options: &TtsOptions) -> Self {
        Self {
            voice_id: options.voice_id.clone(),
            text: text.into(),
            model_id: options.model_id.clone(),
            voice_settings: VoiceSettings::default(),
            output_format: options
                .twilio_encoding
                .then(|| TWILIO_OUTPUT_FORMAT.to_string()),
        }
    }
}

/// Client for a speech provider.
///
/// Failures of the remote call should be reported as
/// [`WorkflowError::Transport`].
#[async_trait]
pub trait SpeechClient: Send + Sync + Debug {
    /// Converts text to encoded audio bytes.
    async fn synthesize(
        &self,
        api_key: &str,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, WorkflowError>;

    /// Removes background noise from `audio`, returning the cleaned audio.
    async fn isolate(&self, api_key: &str, audio: Vec<u8>) -> Result<Vec<u8>, WorkflowError>;
}

/// Offline client for local development.
///
/// Synthesis returns the UTF-8 bytes of the text and isolation returns the
/// audio unchanged, so workflows can run end to end without credentials
/// being checked remotely.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackSpeechClient;

#[async_trait]
impl SpeechClient for LoopbackSpeechClient {
    async fn synthesize(
        &self,
        _api_key: &str,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, WorkflowError> {
        debug!(
            "Loopback synthesis with voice '{}' and model '{}'",
            request.voice_id, request.model_id
        );
        Ok(request.text.as_bytes().to_vec())
    }

    async fn isolate(&self, _api_key: &str, audio: Vec<u8>) -> Result<Vec<u8>, WorkflowError> {
        Ok(audio)
    }
}

/// Wraps encoded audio in the `{"media": {"payload": ...}}` shape.
pub fn media_output(audio: &[u8]) -> StepOutput {
    StepOutput::new().with("media", json!({ "payload": STANDARD.encode(audio) }))
}

fn require(value: Option<String>, message: &str) -> Result<String, WorkflowError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(WorkflowError::Validation(message.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct TextToSpeechInput {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(flatten)]
    options: TtsOptions,
}

/// The `text_to_speech` payload.
///
/// Input keys: `text`, `api_key` (both required) plus the [`TtsOptions`].
#[derive(Debug, Clone)]
pub struct TextToSpeech {
    client: Arc<dyn SpeechClient>,
}

impl TextToSpeech {
    /// Registered step name.
    pub const NAME: &'static str = "text_to_speech";

    /// Creates the payload over a speech client.
    pub fn new(client: Arc<dyn SpeechClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StepFunction for TextToSpeech {
    async fn call(&self, input: StepInput) -> Result<StepOutput, WorkflowError> {
        info!("{} function started", Self::NAME);
        let result = async {
            let input: TextToSpeechInput = input.parse()?;
            let text = require(input.text, "Text is empty.")?;
            let api_key = require(input.api_key, "API key is missing.")?;

            let request = SynthesisRequest::new(text, &input.options);
            let audio = self.client.synthesize(&api_key, &request).await?;
            let output = media_output(&audio);
            info!(audio_length = audio.len(), "Speech synthesis successful");
            Ok::<_, WorkflowError>(output)
        }
        .await;

        if let Err(e) = &result {
            warn!("{} function failed: {}", Self::NAME, e);
        }
        result
    }

    fn name(&self) -> StepName {
        StepName::new(Self::NAME)
    }
}

#[derive(Debug, Deserialize)]
struct IsolateAudioInput {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    audio_file_path: Option<String>,
}

/// The `isolate_audio` payload.
///
/// Input keys: `api_key` and `audio_file_path`, both required.
#[derive(Debug, Clone)]
pub struct IsolateAudio {
    client: Arc<dyn SpeechClient>,
}

impl IsolateAudio {
    /// Registered step name.
    pub const NAME: &'static str = "isolate_audio";

    /// Creates the payload over a speech client.
    pub fn new(client: Arc<dyn SpeechClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StepFunction for IsolateAudio {
    async fn call(&self, input: StepInput) -> Result<StepOutput, WorkflowError> {
        info!("{} function started", Self::NAME);
        let result = async {
            let input: IsolateAudioInput = input.parse()?;
            let api_key = require(input.api_key, "API key is missing.")?;
            let path = require(input.audio_file_path, "Audio file path is missing.")?;

            let audio = tokio::fs::read(&path)
                .await
                .map_err(|e| WorkflowError::Transport(format!("failed to read {path}: {e}")))?;
            let isolated = self.client.isolate(&api_key, audio).await?;
            let output = media_output(&isolated);
            info!(audio_length = isolated.len(), "Audio isolation successful");
            Ok::<_, WorkflowError>(output)
        }
        .await;

        if let Err(e) = &result {
            warn!("{} function failed: {}", Self::NAME, e);
        }
        result
    }

    fn name(&self) -> StepName {
        StepName::new(Self::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingClient {
        requests: Mutex<Vec<SynthesisRequest>>,
    }

    #[async_trait]
    impl SpeechClient for RecordingClient {
        async fn synthesize(
            &self,
            _api_key: &str,
            request: &SynthesisRequest,
        ) -> Result<Vec<u8>, WorkflowError> {
            self.requests
                .lock()
                .expect("lock")
                .push(request.clone());
            Ok(b"ABC".to_vec())
        }

        async fn isolate(&self, _api_key: &str, _audio: Vec<u8>) -> Result<Vec<u8>, WorkflowError> {
            Err(WorkflowError::Transport("401 Unauthorized".to_string()))
        }
    }

    #[tokio::test]
    async fn test_text_to_speech_returns_base64_media() {
        let client = Arc::new(RecordingClient::default());
        let step = TextToSpeech::new(client.clone());

        let output = step
            .call(StepInput::new().with("text", "hi").with("api_key", "k"))
            .await
            .expect("synthesis succeeds");

        assert_eq!(output.pointer("/media/payload"), Some(&json!("QUJD")));
        let requests = client.requests.lock().expect("lock");
        assert_eq!(requests[0].voice_id, DEFAULT_VOICE_ID);
        assert_eq!(requests[0].model_id, DEFAULT_MODEL_ID);
        assert_eq!(requests[0].output_format, None);
    }

    #[tokio::test]
    async fn test_text_to_speech_validation() {
        let step = TextToSpeech::new(Arc::new(LoopbackSpeechClient));

        let err = step
            .call(StepInput::new().with("api_key", "k"))
            .await
            .expect_err("no text");
        assert_eq!(err, WorkflowError::Validation("Text is empty.".to_string()));

        let err = step
            .call(StepInput::new().with("text", "hi").with("api_key", ""))
            .await
            .expect_err("empty key");
        assert_eq!(err.message(), "API key is missing.");

        let err = step
            .call(
                StepInput::new()
                    .with("text", "hi")
                    .with("api_key", "k")
                    .with("twilio_encoding", "yes"),
            )
            .await
            .expect_err("bad option type");
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_twilio_encoding_selects_output_format() {
        let client = Arc::new(RecordingClient::default());
        let step = TextToSpeech::new(client.clone());

        step.call(
            StepInput::new()
                .with("text", "hi")
                .with("api_key", "k")
                .with("voice_id", "custom")
                .with("twilio_encoding", true),
        )
        .await
        .expect("synthesis succeeds");

        let requests = client.requests.lock().expect("lock");
        assert_eq!(requests[0].voice_id, "custom");
        assert_eq!(requests[0].output_format.as_deref(), Some(TWILIO_OUTPUT_FORMAT));
    }

    #[test]
    fn test_synthesis_request_body() {
        let request = SynthesisRequest::new("hi", &TtsOptions::default());
        let body = serde_json::to_value(&request).expect("serializable");
        assert_eq!(
            body,
            json!({
                "text": "hi",
                "model_id": DEFAULT_MODEL_ID,
                "voice_settings": {"stability": 0.5, "similarity_boost": 0.5}
            })
        );
    }

    #[tokio::test]
    async fn test_isolate_audio_validation() {
        let step = IsolateAudio::new(Arc::new(LoopbackSpeechClient));

        let err = step
            .call(StepInput::new().with("api_key", "").with("audio_file_path", "a.mp3"))
            .await
            .expect_err("empty key");
        assert_eq!(err, WorkflowError::Validation("API key is missing.".to_string()));

        let err = step
            .call(StepInput::new().with("api_key", "k"))
            .await
            .expect_err("no path");
        assert_eq!(err.message(), "Audio file path is missing.");
    }

    #[tokio::test]
    async fn test_isolate_audio_missing_file_is_transport_error() {
        let step = IsolateAudio::new(Arc::new(LoopbackSpeechClient));
        let err = step
            .call(
                StepInput::new()
                    .with("api_key", "k")
                    .with("audio_file_path", "/definitely/not/here.mp3"),
            )
            .await
            .expect_err("missing file");
        assert!(matches!(err, WorkflowError::Transport(_)));
    }

    #[tokio::test]
    async fn test_isolate_audio_round_trips_file() {
        let path = std::env::temp_dir().join(format!("speechflow-{}.mp3", std::process::id()));
        tokio::fs::write(&path, b"ABC").await.expect("write fixture");

        let step = IsolateAudio::new(Arc::new(LoopbackSpeechClient));
        let output = step
            .call(
                StepInput::new()
                    .with("api_key", "k")
                    .with("audio_file_path", path.to_string_lossy().to_string()),
            )
            .await
            .expect("isolation succeeds");
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(output.pointer("/media/payload"), Some(&json!("QUJD")));
    }

    #[tokio::test]
    async fn test_client_failure_propagates() {
        let path = std::env::temp_dir().join(format!("speechflow-fail-{}.mp3", std::process::id()));
        tokio::fs::write(&path, b"ABC").await.expect("write fixture");

        let step = IsolateAudio::new(Arc::new(RecordingClient::default()));
        let err = step
            .call(
                StepInput::new()
                    .with("api_key", "k")
                    .with("audio_file_path", path.to_string_lossy().to_string()),
            )
            .await
            .expect_err("client rejects");
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(err, WorkflowError::Transport("401 Unauthorized".to_string()));
    }
}
