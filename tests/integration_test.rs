use async_trait::async_trait;
use serde_json::json;
use speechflow::prelude::*;
use speechflow::workflows::{speech_scheduler, AUDIO_ISOLATION_WORKFLOW, TEXT_TO_SPEECH_WORKFLOW};
use speechflow::SynthesisRequest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[derive(Debug)]
struct StubSpeechClient;

#[async_trait]
impl SpeechClient for StubSpeechClient {
    async fn synthesize(
        &self,
        _api_key: &str,
        _request: &SynthesisRequest,
    ) -> Result<Vec<u8>, WorkflowError> {
        Ok(b"ABC".to_vec())
    }

    async fn isolate(&self, _api_key: &str, audio: Vec<u8>) -> Result<Vec<u8>, WorkflowError> {
        Ok(audio)
    }
}

fn settings() -> Settings {
    Settings {
        api_key: Some("test-key".to_string()),
        ..Settings::default()
    }
}

#[tokio::test]
async fn test_text_to_speech_workflow() {
    let settings = Settings {
        tts_text: "hi".into(),
        api_key: Some("k".into()),
        ..Settings::default()
    };
    let scheduler =
        speech_scheduler(&settings, Arc::new(StubSpeechClient)).expect("valid scheduler");
    let workflow_id = WorkflowId::new(TEXT_TO_SPEECH_WORKFLOW);

    let run_id = scheduler
        .schedule_workflow(&workflow_id, None)
        .expect("scheduled");
    assert!(run_id.as_str().ends_with(TEXT_TO_SPEECH_WORKFLOW));

    let output = scheduler
        .waiter()
        .await_result(&workflow_id, &run_id, None)
        .await
        .expect("run succeeds");
    assert_eq!(output.into_value(), json!({"media": {"payload": "QUJD"}}));

    let run = scheduler
        .registry()
        .get(&workflow_id, &run_id)
        .expect("registered");
    assert_eq!(run.state(), RunState::Succeeded);
    assert_eq!(run.steps().len(), 1);
    assert_eq!(run.steps()[0].step_name, "text_to_speech");
    assert!(run.started_at().is_some());
    assert!(run.completed_at() >= run.started_at());
}

#[tokio::test]
async fn test_audio_isolation_without_api_key_fails() {
    let settings = Settings {
        api_key: Some(String::new()),
        audio_file_path: Some("/nonexistent/input.mp3".into()),
        ..Settings::default()
    };
    let scheduler =
        speech_scheduler(&settings, Arc::new(StubSpeechClient)).expect("valid scheduler");
    let workflow_id = WorkflowId::new(AUDIO_ISOLATION_WORKFLOW);

    let run_id = scheduler
        .schedule_workflow(&workflow_id, None)
        .expect("scheduled");
    let run = scheduler
        .waiter()
        .await_run(&workflow_id, &run_id, None)
        .await
        .expect("terminal");

    assert_eq!(run.state(), RunState::Failed);
    let err = run
        .result()
        .cloned()
        .expect("terminal run has a result")
        .expect_err("validation fails");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "API key is missing.");
}

#[tokio::test]
async fn test_audio_isolation_round_trip() {
    let path = std::env::temp_dir().join(format!("speechflow-it-{}.mp3", std::process::id()));
    tokio::fs::write(&path, b"ABC").await.expect("write audio");

    let settings = Settings {
        audio_file_path: Some(path.clone()),
        ..settings()
    };
    let scheduler =
        speech_scheduler(&settings, Arc::new(StubSpeechClient)).expect("valid scheduler");
    let workflow_id = WorkflowId::new(AUDIO_ISOLATION_WORKFLOW);

    let run_id = scheduler
        .schedule_workflow(&workflow_id, None)
        .expect("scheduled");
    let output = scheduler
        .waiter()
        .await_result(&workflow_id, &run_id, None)
        .await
        .expect("run succeeds");
    tokio::fs::remove_file(&path).await.expect("cleanup");

    assert_eq!(output.pointer("/media/payload"), Some(&json!("QUJD")));
}

#[tokio::test]
async fn test_concurrent_waiters_see_identical_results() {
    let scheduler = Scheduler::builder()
        .function(step_fn("slow", |_input| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(StepOutput::new().with("value", 42))
        }))
        .workflow(
            Workflow::builder("SlowWorkflow")
                .step("slow", StepInput::new())
                .build()
                .expect("valid workflow"),
        )
        .build()
        .expect("valid scheduler");
    let workflow_id = WorkflowId::new("SlowWorkflow");
    let run_id = scheduler
        .schedule_workflow(&workflow_id, None)
        .expect("scheduled");

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let waiter = scheduler.waiter();
            let (workflow_id, run_id) = (workflow_id.clone(), run_id.clone());
            tokio::spawn(async move { waiter.await_result(&workflow_id, &run_id, None).await })
        })
        .collect();

    let mut results = Vec::new();
    for waiter in waiters {
        results.push(waiter.await.expect("waiter task"));
    }

    let expected = Ok(StepOutput::new().with("value", 42));
    assert!(results.iter().all(|result| *result == expected));
}

#[tokio::test]
async fn test_step_timeout_fails_run() {
    let deadline = Duration::from_millis(100);
    let scheduler = Scheduler::builder()
        .function(step_fn("stuck", |_input| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(StepOutput::new())
        }))
        .workflow(
            Workflow::builder("StuckWorkflow")
                .step_with_deadline("stuck", StepInput::new(), Deadline::new(deadline))
                .build()
                .expect("valid workflow"),
        )
        .build()
        .expect("valid scheduler");
    let workflow_id = WorkflowId::new("StuckWorkflow");

    let run_id = scheduler
        .schedule_workflow(&workflow_id, None)
        .expect("scheduled");
    let run = scheduler
        .waiter()
        .await_run(&workflow_id, &run_id, None)
        .await
        .expect("terminal");

    assert_eq!(run.state(), RunState::Failed);
    let err = run
        .result()
        .cloned()
        .expect("terminal run has a result")
        .expect_err("step times out");
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let started = run.started_at().expect("started");
    let completed = run.completed_at().expect("completed");
    let elapsed = (completed - started).to_std().expect("non-negative");
    assert!(elapsed >= deadline);
    assert!(elapsed < deadline + Duration::from_secs(2));
}

#[tokio::test]
async fn test_failed_step_stops_the_run() {
    let second_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&second_ran);

    let scheduler = Scheduler::builder()
        .function(step_fn("first", |_input| async {
            Err(WorkflowError::Transport("503 Service Unavailable".to_string()))
        }))
        .function(step_fn("second", move |_input| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(StepOutput::new())
            }
        }))
        .workflow(
            Workflow::builder("TwoStepWorkflow")
                .step("first", StepInput::new())
                .step("second", StepInput::new())
                .build()
                .expect("valid workflow"),
        )
        .build()
        .expect("valid scheduler");
    let workflow_id = WorkflowId::new("TwoStepWorkflow");

    let run_id = scheduler
        .schedule_workflow(&workflow_id, None)
        .expect("scheduled");
    let err = scheduler
        .waiter()
        .await_result(&workflow_id, &run_id, None)
        .await
        .expect_err("first step fails");

    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.message(), "503 Service Unavailable");
    assert!(!second_ran.load(Ordering::SeqCst));

    let run = scheduler
        .registry()
        .get(&workflow_id, &run_id)
        .expect("registered");
    assert_eq!(run.steps().len(), 1);
    assert_eq!(run.steps()[0].error, Some(ErrorKind::Application));
}

#[tokio::test]
async fn test_duplicate_run_id_rejected() {
    let scheduler =
        speech_scheduler(&settings(), Arc::new(StubSpeechClient)).expect("valid scheduler");
    let workflow_id = WorkflowId::new(TEXT_TO_SPEECH_WORKFLOW);
    let run_id = RunId::new("fixed-run");

    assert_ok!(scheduler.schedule_workflow(&workflow_id, Some(run_id.clone())));
    let err = assert_err!(scheduler.schedule_workflow(&workflow_id, Some(run_id.clone())));
    assert!(matches!(err, WorkflowError::DuplicateRun(_)));

    let output = scheduler
        .waiter()
        .await_result(&workflow_id, &run_id, None)
        .await
        .expect("first run unaffected");
    assert_eq!(output.pointer("/media/payload"), Some(&json!("QUJD")));
    assert_eq!(scheduler.registry().len(), 1);
}

#[tokio::test]
async fn test_terminal_run_is_immutable() {
    let scheduler =
        speech_scheduler(&settings(), Arc::new(StubSpeechClient)).expect("valid scheduler");
    let workflow_id = WorkflowId::new(TEXT_TO_SPEECH_WORKFLOW);
    let run_id = scheduler
        .schedule_workflow(&workflow_id, None)
        .expect("scheduled");

    let first = scheduler
        .waiter()
        .await_run(&workflow_id, &run_id, None)
        .await
        .expect("terminal");
    let second = scheduler
        .registry()
        .get(&workflow_id, &run_id)
        .expect("registered");
    let third = scheduler
        .waiter()
        .await_run(&workflow_id, &run_id, None)
        .await
        .expect("terminal");

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &third));
}
