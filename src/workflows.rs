//! The speech workflows and the scheduler that serves them.

use crate::config::Settings;
use crate::error::WorkflowError;
use crate::input::StepInput;
use crate::scheduler::Scheduler;
use crate::speech::{IsolateAudio, SpeechClient, TextToSpeech};
use crate::workflow::Workflow;
use std::sync::Arc;

/// Identity of the text-to-speech workflow.
pub const TEXT_TO_SPEECH_WORKFLOW: &str = "TextToSpeechWorkflow";
/// Identity of the audio isolation workflow.
pub const AUDIO_ISOLATION_WORKFLOW: &str = "AudioIsolationWorkflow";

/// One `text_to_speech` step with the configured text, key and options.
pub fn text_to_speech_workflow(settings: &Settings) -> Result<Workflow, WorkflowError> {
    let input = StepInput::new()
        .with("text", settings.tts_text.as_str())
        .with_opt("api_key", settings.api_key.as_deref())
        .with("voice_id", settings.tts.voice_id.as_str())
        .with("model_id", settings.tts.model_id.as_str())
        .with("twilio_encoding", settings.tts.twilio_encoding);

    Workflow::builder(TEXT_TO_SPEECH_WORKFLOW)
        .default_deadline(settings.step_deadline)
        .step(TextToSpeech::NAME, input)
        .build()
}

/// One `isolate_audio` step over the configured audio file.
pub fn audio_isolation_workflow(settings: &Settings) -> Result<Workflow, WorkflowError> {
    let input = StepInput::new()
        .with_opt("api_key", settings.api_key.as_deref())
        .with_opt(
            "audio_file_path",
            settings
                .audio_file_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        );

    Workflow::builder(AUDIO_ISOLATION_WORKFLOW)
        .default_deadline(settings.step_deadline)
        .step(IsolateAudio::NAME, input)
        .build()
}

/// Builds a scheduler with both speech payloads and both workflows.
pub fn speech_scheduler(
    settings: &Settings,
    client: Arc<dyn SpeechClient>,
) -> Result<Scheduler, WorkflowError> {
    Scheduler::builder()
        .function(TextToSpeech::new(Arc::clone(&client)))
        .function(IsolateAudio::new(client))
        .workflow(text_to_speech_workflow(settings)?)
        .workflow(audio_isolation_workflow(settings)?)
        .build()
}
