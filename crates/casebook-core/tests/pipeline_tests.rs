mod common;

use std::sync::Arc;
use std::time::Duration;

use casebook_core::{
    CapturedOutput, Console, ReportedOutcome, ReportedResult, ReportingConfig, ReportingPipeline,
};
use common::{failed_case, passed_case, skipped_case, Call, RecordingClient, RUN_URL};

fn pipeline(client: &Arc<RecordingClient>, batch_size: usize) -> (ReportingPipeline, CapturedOutput) {
    let (console, captured) = Console::capture();
    let pipeline = ReportingPipeline::new(client.clone(), "build-42", console)
        .with_batch_size(batch_size)
        .with_cooldown(Duration::ZERO);
    (pipeline, captured)
}

#[tokio::test]
async fn test_run_start_creates_run() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 2);

    pipeline.on_run_start("Casebook.Tests").await;

    assert_eq!(pipeline.run_id(), Some(RUN_URL));
    assert!(pipeline.is_active());
    assert_eq!(
        client.calls(),
        vec![Call::CreateRun {
            run_name: "Casebook.Tests".to_string(),
            build_id: "build-42".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_second_run_start_keeps_the_first_run() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 2);

    pipeline.on_run_start("Casebook.Tests").await;
    pipeline.on_run_start("Casebook.Tests").await;

    assert_eq!(client.calls().len(), 1);
    assert_eq!(pipeline.run_id(), Some(RUN_URL));
}

#[tokio::test]
async fn test_batches_are_capacity_bounded() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 3);

    pipeline.on_run_start("run").await;
    for i in 0..7 {
        pipeline.on_case_passed(&passed_case(&format!("case{}", i))).await;
    }

    // Two full batches went out as soon as they filled up.
    assert_eq!(client.accepted_batches().len(), 2);

    pipeline.on_run_end().await;

    let sizes: Vec<usize> = client.accepted_batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);

    let names: Vec<String> = client
        .accepted_batches()
        .into_iter()
        .flatten()
        .map(|r| r.automated_test_name)
        .collect();
    let expected: Vec<String> = (0..7).map(|i| format!("Sample.case{}", i)).collect();
    assert_eq!(names, expected);

    assert_eq!(client.completions(), 1);
    assert!(matches!(client.calls().last(), Some(Call::CompleteRun { run_id }) if run_id == RUN_URL));
}

#[tokio::test]
async fn test_outcome_tags() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 10);

    pipeline.on_run_start("run").await;
    pipeline.on_case_skipped(&skipped_case("skip", Some("later"))).await;
    pipeline.on_case_passed(&passed_case("pass")).await;
    pipeline.on_case_failed(&failed_case("fail", "'fail' failed!")).await;
    pipeline.on_run_end().await;

    let results = client.accepted_batches().concat();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0].outcome, ReportedOutcome::Warning);
    assert_eq!(results[0].error_message.as_deref(), Some("later"));

    assert_eq!(results[1].outcome, ReportedOutcome::Passed);
    assert_eq!(results[1].error_message, None);

    assert_eq!(results[2].outcome, ReportedOutcome::Failed);
    assert_eq!(results[2].error_message.as_deref(), Some("'fail' failed!"));
    assert_eq!(
        results[2].stack_trace.as_deref(),
        Some("FailureException\nat Sample")
    );
}

#[tokio::test]
async fn test_submitted_results_are_case_projections() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 10);

    let cases = [
        skipped_case("skip", None),
        passed_case("pass"),
        failed_case("fail", "boom"),
    ];

    pipeline.on_run_start("run").await;
    for case in &cases {
        pipeline.on_case_completed(case).await;
    }
    pipeline.on_run_end().await;

    let expected: Vec<ReportedResult> = cases
        .iter()
        .filter_map(ReportedResult::from_case)
        .collect();
    assert_eq!(expected.len(), 3);
    assert_eq!(client.accepted_batches().concat(), expected);
}

#[tokio::test]
async fn test_mismatched_status_is_ignored() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 1);

    pipeline.on_run_start("run").await;
    pipeline.on_case_failed(&passed_case("pass")).await;
    pipeline.on_case_skipped(&passed_case("pass")).await;

    assert_eq!(client.submit_attempts(), 0);
}

#[tokio::test]
async fn test_retry_succeeds_on_fifth_attempt() {
    let client = Arc::new(RecordingClient::new().failing_submits(4));
    let (pipeline, captured) = pipeline(&client, 1);

    pipeline.on_run_start("run").await;
    pipeline.on_case_passed(&passed_case("pass")).await;

    assert_eq!(client.submit_attempts(), 5);
    assert_eq!(client.accepted_batches().len(), 1);
    assert!(!pipeline.is_api_unavailable());

    let console = captured.contents();
    for attempt in 1..=4 {
        assert!(console.contains(&format!(
            "Failed to submit test result batch to the Recording API (attempt #{} of 5): Network error: connection reset",
            attempt
        )));
    }
    assert!(console.contains(
        "Successfully submitted test result batch to the Recording API on attempt #5."
    ));
    assert!(!console.contains("suppressed"));
}

#[tokio::test]
async fn test_first_attempt_success_is_silent() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, captured) = pipeline(&client, 1);

    pipeline.on_run_start("run").await;
    pipeline.on_case_passed(&passed_case("pass")).await;

    assert_eq!(client.submit_attempts(), 1);
    assert!(captured.contents().is_empty());
}

#[tokio::test]
async fn test_circuit_breaker_trips_after_max_attempts() {
    let client = Arc::new(RecordingClient::new().failing_submits(usize::MAX));
    let (pipeline, captured) = pipeline(&client, 2);

    pipeline.on_run_start("run").await;
    pipeline.on_case_passed(&passed_case("a")).await;
    pipeline.on_case_passed(&passed_case("b")).await;

    assert_eq!(client.submit_attempts(), 5);
    assert!(pipeline.is_api_unavailable());

    let console = captured.contents();
    assert!(console.contains("(attempt #5 of 5)"));
    assert!(console.contains("further attempts will be suppressed for the remainder of this test run"));
    assert!(console.contains("subsequent result batches will not be retried"));

    // Everything after the breaker trips is dropped without remote calls.
    for name in ["c", "d", "e"] {
        pipeline.on_case_passed(&passed_case(name)).await;
    }
    pipeline.on_case_failed(&failed_case("f", "boom")).await;
    pipeline.on_run_end().await;

    assert_eq!(client.submit_attempts(), 5);
    assert_eq!(client.completions(), 1);
}

#[tokio::test]
async fn test_run_end_with_empty_batch_only_completes() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 2);

    pipeline.on_run_start("run").await;
    pipeline.on_case_passed(&passed_case("a")).await;
    pipeline.on_case_passed(&passed_case("b")).await;
    pipeline.on_run_end().await;

    assert_eq!(client.submit_attempts(), 1);
    assert_eq!(client.completions(), 1);

    // A second run end is a no-op.
    pipeline.on_run_end().await;
    assert_eq!(client.completions(), 1);
}

#[tokio::test]
async fn test_create_run_failure_disables_reporting() {
    let client = Arc::new(RecordingClient::new().failing_create());
    let (pipeline, captured) = pipeline(&client, 1);

    pipeline.on_run_start("run").await;
    pipeline.on_case_passed(&passed_case("a")).await;
    pipeline.on_run_end().await;

    assert!(!pipeline.is_active());
    assert_eq!(pipeline.run_id(), None);
    assert_eq!(client.calls().len(), 1);
    assert!(captured
        .contents()
        .contains("Failed to create a remote test run via the Recording API"));
}

#[tokio::test]
async fn test_results_before_run_start_are_dropped() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 1);

    pipeline.on_case_passed(&passed_case("a")).await;
    pipeline.on_run_end().await;

    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_complete_failure_is_reported_not_retried() {
    let client = Arc::new(RecordingClient::new().failing_complete());
    let (pipeline, captured) = pipeline(&client, 5);

    pipeline.on_run_start("run").await;
    pipeline.on_case_passed(&passed_case("a")).await;
    pipeline.on_run_end().await;

    assert_eq!(client.completions(), 1);
    assert!(captured.contents().contains(
        "Failed to complete the remote test run via the Recording API: Network error: connection refused"
    ));
}

#[tokio::test]
async fn test_config_applies_retry_policy() {
    let client = Arc::new(RecordingClient::new().failing_submits(usize::MAX));
    let (console, _) = Console::capture();
    let config = ReportingConfig {
        batch_size: 1,
        max_attempts: 2,
        retry_cooldown_secs: 0,
        ..Default::default()
    };
    let pipeline = ReportingPipeline::new(client.clone(), "build", console).with_config(&config);

    pipeline.on_run_start("run").await;
    pipeline.on_case_passed(&passed_case("a")).await;

    assert_eq!(client.submit_attempts(), 2);
    assert!(pipeline.is_api_unavailable());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_are_not_lost_or_duplicated() {
    let client = Arc::new(RecordingClient::new());
    let (pipeline, _) = pipeline(&client, 10);
    let pipeline = Arc::new(pipeline);

    pipeline.on_run_start("run").await;

    let handles: Vec<_> = (0..95)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let case = passed_case(&format!("case{}", i));
                pipeline.on_case_passed(&case).await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    pipeline.on_run_end().await;

    let batches = client.accepted_batches();
    assert_eq!(batches.len(), 10);
    assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 10));

    let mut names: Vec<String> = batches
        .into_iter()
        .flatten()
        .map(|r| r.automated_test_name)
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 95);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_separates_attempts() {
    let client = Arc::new(RecordingClient::new().failing_submits(4));
    let (console, _) = Console::capture();
    let pipeline = ReportingPipeline::new(client.clone(), "build", console).with_batch_size(1);

    pipeline.on_run_start("run").await;

    let started = tokio::time::Instant::now();
    pipeline.on_case_passed(&passed_case("a")).await;
    let elapsed = started.elapsed();

    assert_eq!(client.submit_attempts(), 5);
    assert!(!pipeline.is_api_unavailable());
    assert!(elapsed >= Duration::from_secs(4 * 5), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5 * 5), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_follows_every_failed_attempt_before_breaker_trips() {
    let client = Arc::new(RecordingClient::new().failing_submits(usize::MAX));
    let (console, _) = Console::capture();
    let config = ReportingConfig {
        batch_size: 1,
        ..Default::default()
    };
    let pipeline = ReportingPipeline::new(client.clone(), "build", console).with_config(&config);

    pipeline.on_run_start("run").await;

    let started = tokio::time::Instant::now();
    pipeline.on_case_passed(&passed_case("a")).await;
    let elapsed = started.elapsed();

    assert!(pipeline.is_api_unavailable());
    assert_eq!(client.submit_attempts(), 5);
    assert!(elapsed >= config.retry_cooldown() * 5, "elapsed {:?}", elapsed);
}
