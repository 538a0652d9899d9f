//! Integration tests for the refinement loop.
//!
//! Candidates are `sh` scripts rather than Python so the tests stay hermetic:
//! the executor's interpreter is configurable and the loop never inspects the
//! script language. Providers are scripted closures, exactly the shape the
//! real LLM adapter plugs in as.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stmtgen_core::{
    compare, Acceptance, AttemptFailure, CancelFlag, Comparison, ExecError, Executor, Fallbacks,
    RefineConfig, Refiner, RunError, Target,
};

const REFERENCE_CSV: &str =
    "Date,Description,Amount\n05-01-2024,X,-100.00\n06-01-2024,Y,250.00\n";

/// Emits exactly the reference table.
const GOOD_SCRIPT: &str =
    "printf 'Date,Description,Amount\\n05-01-2024,X,-100.00\\n06-01-2024,Y,250.00\\n'";

/// Wrong amount in the second row.
const WRONG_AMOUNT_SCRIPT: &str =
    "printf 'Date,Description,Amount\\n05-01-2024,X,-100.00\\n06-01-2024,Y,999.00\\n'";

/// Drops the second row entirely.
const DROPPED_ROW_SCRIPT: &str = "printf 'Date,Description,Amount\\n05-01-2024,X,-100.00\\n'";

fn setup_target(dir: &Path) -> Target {
    let target_dir = dir.join("data").join("sample");
    std::fs::create_dir_all(&target_dir).unwrap();
    std::fs::write(target_dir.join("statement.txt"), "STATEMENT OF ACCOUNT 2024").unwrap();
    std::fs::write(target_dir.join("reference.csv"), REFERENCE_CSV).unwrap();
    Target::discover(&dir.join("data"), "sample").unwrap()
}

fn sh_refiner(dir: &Path, fallbacks: Fallbacks, max_attempts: usize) -> Refiner {
    let target = setup_target(dir);
    let executor = Executor::new(
        PathBuf::from("sh"),
        dir.join("staging"),
        Duration::from_secs(5),
    );
    Refiner::new(
        target,
        executor,
        fallbacks,
        RefineConfig {
            max_attempts,
            ..RefineConfig::default()
        },
    )
    .unwrap()
}

#[tokio::test]
async fn failing_provider_engages_fallback_within_budget() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(dir.path(), Fallbacks::empty().with("sample", GOOD_SCRIPT), 3);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = calls.clone();
    let provider = move |_prompt: String| {
        let calls = calls_in.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, String>("provider unreachable".to_string())
        }
    };

    let outcome = refiner.run(provider, &CancelFlag::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.acceptance, Acceptance::Fallback);
    assert_eq!(outcome.history.len(), 3);
    assert!(outcome
        .history
        .iter()
        .all(|r| matches!(r.failure, AttemptFailure::Synthesis(_))));
    assert_eq!(compare(refiner.reference(), &outcome.table), Comparison::Equal);
}

#[tokio::test]
async fn accepted_attempt_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(dir.path(), Fallbacks::empty(), 3);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = calls.clone();
    // Fenced response also exercises code-block stripping.
    let provider = move |_prompt: String| {
        let calls = calls_in.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<String, String>(format!("Here you go:\n```sh\n{GOOD_SCRIPT}\n```"))
        }
    };

    let outcome = refiner.run(provider, &CancelFlag::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.acceptance, Acceptance::Synthesized { attempts: 1 });
    assert!(outcome.history.is_empty());
    assert_eq!(outcome.metrics.attempts, 1);
}

#[tokio::test]
async fn feedback_accumulates_across_all_prior_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(dir.path(), Fallbacks::empty(), 3);

    let scripts = [WRONG_AMOUNT_SCRIPT, DROPPED_ROW_SCRIPT, GOOD_SCRIPT];
    let calls = Arc::new(AtomicUsize::new(0));
    let prompts = Arc::new(Mutex::new(Vec::<String>::new()));
    let calls_in = calls.clone();
    let prompts_in = prompts.clone();
    let provider = move |prompt: String| {
        let n = calls_in.fetch_add(1, Ordering::SeqCst);
        prompts_in.lock().unwrap().push(prompt);
        let script = scripts[n].to_string();
        async move { Ok::<String, String>(script) }
    };

    let outcome = refiner.run(provider, &CancelFlag::new()).await.unwrap();
    assert_eq!(outcome.acceptance, Acceptance::Synthesized { attempts: 3 });

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 3);
    assert!(!prompts[0].contains("Previous attempts failed"));

    // Attempt 2 sees attempt 1's cell-level mismatch.
    assert!(prompts[1].contains("attempt 1 of 3"));
    assert!(prompts[1].contains("999.00"));

    // Attempt 3 sees feedback from BOTH prior attempts, not just the latest.
    assert!(prompts[2].contains("attempt 1 of 3"));
    assert!(prompts[2].contains("999.00"));
    assert!(prompts[2].contains("attempt 2 of 3"));
    assert!(prompts[2].contains("expected 2 rows"));
}

#[tokio::test]
async fn single_attempt_budget_still_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(dir.path(), Fallbacks::empty().with("sample", GOOD_SCRIPT), 1);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = calls.clone();
    let provider = move |_prompt: String| {
        let calls = calls_in.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, String>("quota exceeded".to_string())
        }
    };

    let outcome = refiner.run(provider, &CancelFlag::new()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.acceptance, Acceptance::Fallback);
}

#[tokio::test]
async fn crashing_candidate_becomes_execution_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(dir.path(), Fallbacks::empty(), 3);

    let scripts = [
        "echo 'boom: division by zero on empty amount row' >&2; exit 7",
        GOOD_SCRIPT,
    ];
    let calls = Arc::new(AtomicUsize::new(0));
    let prompts = Arc::new(Mutex::new(Vec::<String>::new()));
    let calls_in = calls.clone();
    let prompts_in = prompts.clone();
    let provider = move |prompt: String| {
        let n = calls_in.fetch_add(1, Ordering::SeqCst);
        prompts_in.lock().unwrap().push(prompt);
        let script = scripts[n].to_string();
        async move { Ok::<String, String>(script) }
    };

    let outcome = refiner.run(provider, &CancelFlag::new()).await.unwrap();
    assert_eq!(outcome.acceptance, Acceptance::Synthesized { attempts: 2 });

    match &outcome.history[0].failure {
        AttemptFailure::Execution(ExecError::NonZeroExit { code, stderr }) => {
            assert_eq!(*code, 7);
            assert!(stderr.contains("boom"));
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
    let prompts = prompts.lock().unwrap();
    assert!(prompts[1].contains("boom: division by zero"));
}

#[tokio::test]
async fn broken_fallback_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(
        dir.path(),
        Fallbacks::empty().with("sample", WRONG_AMOUNT_SCRIPT),
        1,
    );

    let provider =
        |_prompt: String| async move { Err::<String, String>("provider unreachable".to_string()) };

    let err = refiner.run(provider, &CancelFlag::new()).await.unwrap_err();
    match err {
        RunError::FallbackIntegrity { target, failure } => {
            assert_eq!(target, "sample");
            assert!(failure.contains("did not match"));
        }
        other => panic!("expected FallbackIntegrity, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_fallback_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(dir.path(), Fallbacks::empty(), 1);

    let provider =
        |_prompt: String| async move { Err::<String, String>("provider unreachable".to_string()) };

    let err = refiner.run(provider, &CancelFlag::new()).await.unwrap_err();
    assert!(matches!(err, RunError::FallbackMissing { target } if target == "sample"));
}

#[tokio::test]
async fn cancelled_run_never_calls_the_provider() {
    let dir = tempfile::tempdir().unwrap();
    let refiner = sh_refiner(dir.path(), Fallbacks::empty().with("sample", GOOD_SCRIPT), 3);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = calls.clone();
    let provider = move |_prompt: String| {
        let calls = calls_in.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<String, String>(GOOD_SCRIPT.to_string())
        }
    };

    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = refiner.run(provider, &cancel).await.unwrap_err();

    assert!(matches!(err, RunError::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
