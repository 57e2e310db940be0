//! Runtime settings loaded from the environment.

use crate::error::WorkflowError;
use crate::speech::TtsOptions;
use crate::step::Deadline;
use crate::waiter::ResultWaiter;
use std::path::PathBuf;
use std::time::Duration;

/// Sentence spoken by `TextToSpeechWorkflow` when none is configured.
pub const DEFAULT_TTS_TEXT: &str =
    "Hello, this is a test of the ElevenLabs text-to-speech converter.";

/// Provider credentials and defaults handed to workflows at construction.
///
/// Every field has a default; [`Settings::from_env`] overrides them from
/// these variables:
///
/// | Variable                       | Field               |
/// |--------------------------------|---------------------|
/// | `ELEVEN_LABS_API_KEY`          | `api_key`           |
/// | `SPEECHFLOW_VOICE_ID`          | `tts.voice_id`      |
/// | `SPEECHFLOW_MODEL_ID`          | `tts.model_id`      |
/// | `SPEECHFLOW_TWILIO_ENCODING`   | `tts.twilio_encoding` |
/// | `SPEECHFLOW_TTS_TEXT`          | `tts_text`          |
/// | `SPEECHFLOW_AUDIO_FILE`        | `audio_file_path`   |
/// | `SPEECHFLOW_STEP_TIMEOUT_SECS` | `step_deadline`     |
/// | `SPEECHFLOW_POLL_INTERVAL_MS`  | `poll_interval`     |
/// | `SPEECHFLOW_RESULT_GRACE_SECS` | `result_grace`      |
/// | `SPEECHFLOW_RETENTION_SECS`    | `retention`         |
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Provider API key. Left unset, the payloads reject their input.
    pub api_key: Option<String>,
    /// Text-to-speech options.
    pub tts: TtsOptions,
    /// Text spoken by the text-to-speech workflow.
    pub tts_text: String,
    /// Audio file cleaned by the audio isolation workflow.
    pub audio_file_path: Option<PathBuf>,
    /// Start-to-close deadline of every step. Default: 120 seconds.
    pub step_deadline: Deadline,
    /// Interval for looking up a run that is not registered yet.
    pub poll_interval: Duration,
    /// How long a missing run is looked for before giving up.
    pub result_grace: Duration,
    /// How long an unobserved terminal run is kept.
    pub retention: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            tts: TtsOptions::default(),
            tts_text: DEFAULT_TTS_TEXT.to_string(),
            audio_file_path: None,
            step_deadline: Deadline::default(),
            poll_interval: ResultWaiter::DEFAULT_POLL_INTERVAL,
            result_grace: ResultWaiter::DEFAULT_GRACE,
            retention: Duration::from_secs(3600),
        }
    }
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, WorkflowError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through `lookup`, starting from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Configuration`] for unparsable numbers or
    /// booleans and for a zero step timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use speechflow::Settings;
    /// use std::time::Duration;
    ///
    /// let settings = Settings::from_lookup(|key| match key {
    ///     "ELEVEN_LABS_API_KEY" => Some("secret".to_string()),
    ///     "SPEECHFLOW_STEP_TIMEOUT_SECS" => Some("30".to_string()),
    ///     _ => None,
    /// })
    /// .expect("valid settings");
    ///
    /// assert_eq!(settings.api_key.as_deref(), Some("secret"));
    /// assert_eq!(settings.step_deadline.as_duration(), Duration::from_secs(30));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(key) = lookup("ELEVEN_LABS_API_KEY") {
            settings.api_key = Some(key);
        }
        if let Some(voice_id) = lookup("SPEECHFLOW_VOICE_ID") {
            settings.tts.voice_id = voice_id;
        }
        if let Some(model_id) = lookup("SPEECHFLOW_MODEL_ID") {
            settings.tts.model_id = model_id;
        }
        if let Some(value) = lookup("SPEECHFLOW_TWILIO_ENCODING") {
            settings.tts.twilio_encoding = parse_bool("SPEECHFLOW_TWILIO_ENCODING", &value)?;
        }
        if let Some(text) = lookup("SPEECHFLOW_TTS_TEXT") {
            settings.tts_text = text;
        }
        if let Some(path) = lookup("SPEECHFLOW_AUDIO_FILE") {
            settings.audio_file_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("SPEECHFLOW_STEP_TIMEOUT_SECS") {
            let secs = parse_u64("SPEECHFLOW_STEP_TIMEOUT_SECS", &value)?;
            if secs == 0 {
                return Err(WorkflowError::Configuration(
                    "SPEECHFLOW_STEP_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }
            settings.step_deadline = Deadline::from_secs(secs);
        }
        if let Some(value) = lookup("SPEECHFLOW_POLL_INTERVAL_MS") {
            settings.poll_interval =
                Duration::from_millis(parse_u64("SPEECHFLOW_POLL_INTERVAL_MS", &value)?);
        }
        if let Some(value) = lookup("SPEECHFLOW_RESULT_GRACE_SECS") {
            settings.result_grace =
                Duration::from_secs(parse_u64("SPEECHFLOW_RESULT_GRACE_SECS", &value)?);
        }
        if let Some(value) = lookup("SPEECHFLOW_RETENTION_SECS") {
            settings.retention =
                Duration::from_secs(parse_u64("SPEECHFLOW_RETENTION_SECS", &value)?);
        }

        Ok(settings)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, WorkflowError> {
    value.trim().parse().map_err(|e| {
        WorkflowError::Configuration(format!("{key} must be a whole number, got '{value}': {e}"))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, WorkflowError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(WorkflowError::Configuration(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
