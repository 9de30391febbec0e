mod common;

use common::{
    DescribeBehavior, MockDescriber, MockEngine, OutputBehavior, REGION, command_failure,
    controller,
};
use modcheck_core::{
    DescribeError, LifecycleError, LifecycleState, ResourceRecord, RunIdentity,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RUN_NAME: &str = "cs-pmod-ab12cd-testing";

fn identity() -> RunIdentity {
    RunIdentity::new("cs-pmod-", "ab12cd", "-testing")
}

#[tokio::test]
async fn test_end_to_end_pass() {
    let engine = Arc::new(MockEngine::new());
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

    let report = controller(engine.clone(), describer.clone())
        .run_as(identity(), &CancellationToken::new())
        .await;

    assert!(report.passed(), "{}", report);
    assert_eq!(report.run_name, RUN_NAME);
    assert_eq!(report.identifier.as_deref(), Some(RUN_NAME));
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].name, RUN_NAME);
    assert_eq!(
        report.history,
        vec![
            LifecycleState::Init,
            LifecycleState::Named,
            LifecycleState::Applied,
            LifecycleState::OutputRetrieved,
            LifecycleState::IdentifierExtracted,
            LifecycleState::Verified,
            LifecycleState::TornDown,
        ]
    );

    // The module received the region and the generated name
    let seen = engine.seen_inputs.lock().unwrap();
    assert_eq!(seen[0].vars["region"], serde_json::json!(REGION));
    assert_eq!(seen[0].vars["name"], serde_json::json!(RUN_NAME));
    assert_eq!(seen[0].env["AWS_DEFAULT_REGION"], REGION);

    assert_eq!(describer.requested.lock().unwrap().as_slice(), [RUN_NAME]);
    assert_eq!(engine.applies(), 1);
    assert_eq!(engine.destroys(), 1);
}

#[tokio::test]
async fn test_end_to_end_not_found() {
    let engine = Arc::new(MockEngine::new());
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Respond(Err(
        DescribeError::provider(
            "RepositoryNotFoundException",
            "The repository with name 'cs-pmod-ab12cd-testing' does not exist",
        ),
    ))));

    let report = controller(engine.clone(), describer.clone())
        .run_as(identity(), &CancellationToken::new())
        .await;

    assert!(!report.passed());
    assert!(matches!(report.failure, Some(LifecycleError::NotFound { .. })));
    assert!(report.causes()[0].contains(RUN_NAME));
    assert!(report.teardown_error.is_none());
    assert_eq!(report.state(), LifecycleState::TornDown);
    assert_eq!(engine.destroys(), 1);
}

#[tokio::test]
async fn test_apply_failure_still_destroys() {
    let engine = Arc::new(
        MockEngine::new().failing_apply(vec![command_failure("Error: creating ECR Repository")]),
    );
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

    let report = controller(engine.clone(), describer.clone())
        .run_as(identity(), &CancellationToken::new())
        .await;

    match &report.failure {
        Some(LifecycleError::ApplyError { name, .. }) => assert_eq!(name, RUN_NAME),
        other => panic!("expected ApplyError, got {:?}", other),
    }
    assert!(!report.reached(LifecycleState::Applied));
    assert_eq!(engine.applies(), 1);
    assert_eq!(engine.destroys(), 1);
    assert_eq!(describer.describes(), 0);
}

#[tokio::test]
async fn test_missing_output_still_destroys() {
    let engine = Arc::new(MockEngine::new().with_output(OutputBehavior::Missing));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

    let report = controller(engine.clone(), describer.clone())
        .run_as(identity(), &CancellationToken::new())
        .await;

    match &report.failure {
        Some(LifecycleError::MissingOutput { key }) => assert_eq!(key, "repository_url"),
        other => panic!("expected MissingOutput, got {:?}", other),
    }
    assert!(report.reached(LifecycleState::Applied));
    assert!(!report.reached(LifecycleState::OutputRetrieved));
    assert_eq!(engine.destroys(), 1);
    assert_eq!(describer.describes(), 0);
}

#[tokio::test]
async fn test_malformed_output_never_verifies() {
    for raw in ["hostname", "host/mid/cs-pmod-ab12cd-testing"] {
        let engine = Arc::new(MockEngine::new().with_output(OutputBehavior::Raw(raw.to_string())));
        let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

        let report = controller(engine.clone(), describer.clone())
            .run_as(identity(), &CancellationToken::new())
            .await;

        match &report.failure {
            Some(LifecycleError::MalformedOutput { output, .. }) => assert_eq!(output, raw),
            other => panic!("expected MalformedOutput for {}, got {:?}", raw, other),
        }
        assert!(report.reached(LifecycleState::OutputRetrieved));
        assert!(report.identifier.is_none());
        assert_eq!(describer.describes(), 0);
        assert_eq!(engine.destroys(), 1);
    }
}

#[tokio::test]
async fn test_verification_failures_still_destroy() {
    let cases = vec![
        (
            Err(DescribeError::provider("AccessDeniedException", "not authorized")),
            "provider-error",
        ),
        (
            Err(DescribeError::Unknown("dispatch failure: connection refused".to_string())),
            "unknown-verification-error",
        ),
        (
            Err(DescribeError::provider("ThrottlingException", "Rate exceeded")),
            "transient-verification-error",
        ),
        (Ok(vec![]), "not-found"),
        (Ok(vec![ResourceRecord::new("someone-elses-repo")]), "not-found"),
    ];

    for (response, kind) in cases {
        let engine = Arc::new(MockEngine::new());
        let describer = Arc::new(MockDescriber::new(DescribeBehavior::Respond(response)));

        let report = controller(engine.clone(), describer.clone())
            .run_as(identity(), &CancellationToken::new())
            .await;

        let failure = report.failure.as_ref().expect("verification should fail");
        assert_eq!(failure.kind(), kind);
        assert!(failure.to_string().contains(RUN_NAME));
        assert!(report.reached(LifecycleState::Verified));
        assert_eq!(describer.describes(), 1);
        assert_eq!(engine.destroys(), 1);
    }
}

#[tokio::test]
async fn test_provider_error_code_is_surfaced() {
    let engine = Arc::new(MockEngine::new());
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Respond(Err(
        DescribeError::provider("AccessDeniedException", "not authorized"),
    ))));

    let report = controller(engine, describer)
        .run_as(identity(), &CancellationToken::new())
        .await;

    match report.failure {
        Some(LifecycleError::ProviderError { code, identifier, .. }) => {
            assert_eq!(code, "AccessDeniedException");
            assert_eq!(identifier, RUN_NAME);
        }
        other => panic!("expected ProviderError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transient_apply_errors_are_retried() {
    let engine = Arc::new(MockEngine::new().failing_apply(vec![
        command_failure("ThrottlingException: Rate exceeded"),
        command_failure("ThrottlingException: Rate exceeded"),
    ]));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

    let report = controller(engine.clone(), describer)
        .run_as(identity(), &CancellationToken::new())
        .await;

    assert!(report.passed(), "{}", report);
    assert_eq!(engine.applies(), 3);
    assert_eq!(engine.destroys(), 1);
}

#[tokio::test]
async fn test_retry_ceiling_fails_the_run() {
    let engine = Arc::new(MockEngine::new().failing_apply(vec![
        command_failure("ThrottlingException"),
        command_failure("ThrottlingException"),
        command_failure("ThrottlingException"),
        command_failure("ThrottlingException"),
    ]));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

    let report = controller(engine.clone(), describer)
        .run_as(identity(), &CancellationToken::new())
        .await;

    assert!(matches!(report.failure, Some(LifecycleError::ApplyError { .. })));
    assert_eq!(engine.applies(), 3);
    assert_eq!(engine.destroys(), 1);
}

#[tokio::test]
async fn test_non_retryable_apply_error_is_not_retried() {
    let engine = Arc::new(MockEngine::new().failing_apply(vec![command_failure(
        "Error: Invalid value for input variable",
    )]));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

    let report = controller(engine.clone(), describer)
        .run_as(identity(), &CancellationToken::new())
        .await;

    assert!(matches!(report.failure, Some(LifecycleError::ApplyError { .. })));
    assert_eq!(engine.applies(), 1);
    assert_eq!(engine.destroys(), 1);
}

#[tokio::test]
async fn test_destroy_failure_does_not_mask_verification_failure() {
    let engine = Arc::new(MockEngine::new().failing_destroy("Error: deleting ECR Repository"));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Respond(Ok(vec![]))));

    let report = controller(engine.clone(), describer)
        .run_as(identity(), &CancellationToken::new())
        .await;

    assert!(matches!(report.failure, Some(LifecycleError::NotFound { .. })));
    assert!(matches!(
        report.teardown_error,
        Some(LifecycleError::DestroyError { .. })
    ));
    assert_eq!(report.causes().len(), 2);
    assert_eq!(engine.destroys(), 1);
}

#[tokio::test]
async fn test_destroy_failure_alone_fails_the_run() {
    let engine = Arc::new(MockEngine::new().failing_destroy("Error: deleting ECR Repository"));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));

    let report = controller(engine.clone(), describer)
        .run_as(identity(), &CancellationToken::new())
        .await;

    assert!(report.failure.is_none());
    assert!(!report.passed());
    assert!(report.causes()[0].contains(RUN_NAME));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_apply_still_destroys() {
    let engine = Arc::new(MockEngine::new().slow_apply(Duration::from_secs(3600)));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let report = controller(engine.clone(), describer.clone())
        .run_as(identity(), &cancel)
        .await;

    match &report.failure {
        Some(LifecycleError::Cancelled { state }) => assert_eq!(*state, LifecycleState::Named),
        other => panic!("expected Cancelled, got {:?}", other),
    }
    assert_eq!(engine.applies(), 1);
    assert_eq!(engine.destroys(), 1);
    assert_eq!(describer.describes(), 0);
    assert_eq!(report.state(), LifecycleState::TornDown);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_apply_winds_down_before_destroy() {
    let engine = Arc::new(MockEngine::new().slow_apply(Duration::from_secs(3600)));
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let report = controller(engine.clone(), describer)
        .run_as(identity(), &cancel)
        .await;

    assert!(matches!(report.failure, Some(LifecycleError::Cancelled { .. })));
    assert!(report.teardown_error.is_none());
    assert_eq!(engine.events(), vec!["apply", "apply-wound-down", "destroy"]);
}

#[tokio::test]
async fn test_cancel_before_apply_destroys_nothing() {
    let engine = Arc::new(MockEngine::new());
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = controller(engine.clone(), describer)
        .run_as(identity(), &cancel)
        .await;

    assert!(matches!(report.failure, Some(LifecycleError::Cancelled { .. })));
    assert_eq!(report.state(), LifecycleState::TornDown);
    assert_eq!(engine.applies(), 0);
    assert_eq!(engine.destroys(), 0);
}

#[tokio::test]
async fn test_concurrent_runs_use_distinct_names() {
    let engine = Arc::new(MockEngine::new());
    let describer = Arc::new(MockDescriber::new(DescribeBehavior::Exists));
    let controller = controller(engine.clone(), describer);

    let (first, second) = tokio::join!(controller.run(), controller.run());

    assert!(first.passed(), "{}", first);
    assert!(second.passed(), "{}", second);
    assert_ne!(first.run_name, second.run_name);
    assert_eq!(engine.applies(), 2);
    assert_eq!(engine.destroys(), 2);
}
