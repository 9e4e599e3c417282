/// Aggregation engine and orchestrator tests with in-process fake backends
/// Covers completion, fail-fast on rejection, cancellation of in-flight calls
/// and ordering independence
use async_trait::async_trait;
use blacklist_verification::aggregation::{AggregationEngine, AggregationPhase};
use blacklist_verification::errors::{AppError, BackendError};
use blacklist_verification::models::{
    BackendCallRequest, CallCandidate, ExchangeHeaders, RequestContext, ServiceName,
    VerificationRequest,
};
use blacklist_verification::orchestrator::Orchestrator;
use blacklist_verification::services::{Backends, BlacklistBackend};
use blacklist_verification::validator::CallRejection;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sets a flag when dropped before the call finished.
struct DropFlag {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Fake backend: optional delay, then a fixed result.
struct FakeBackend {
    status: Option<i64>,
    matched: bool,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl FakeBackend {
    fn new(status: i64, matched: bool) -> Self {
        Self {
            status: Some(status),
            matched,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl BlacklistBackend for FakeBackend {
    async fn check(
        &self,
        request: &BackendCallRequest,
    ) -> Result<Option<CallCandidate>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = DropFlag {
            flag: Arc::clone(&self.cancelled),
            armed: true,
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        guard.armed = false;
        self.completed.store(true, Ordering::SeqCst);
        Ok(Some(CallCandidate {
            status_code: self.status,
            matched: self.matched,
            raw: json!({"identificationNumber": request.identification_number}),
            http_status: 200,
        }))
    }
}

struct EmptyBackend;

#[async_trait]
impl BlacklistBackend for EmptyBackend {
    async fn check(
        &self,
        _request: &BackendCallRequest,
    ) -> Result<Option<CallCandidate>, BackendError> {
        Ok(None)
    }
}

struct FailingBackend(BackendError);

#[async_trait]
impl BlacklistBackend for FailingBackend {
    async fn check(
        &self,
        _request: &BackendCallRequest,
    ) -> Result<Option<CallCandidate>, BackendError> {
        Err(self.0.clone())
    }
}

struct PanickingBackend;

#[async_trait]
impl BlacklistBackend for PanickingBackend {
    async fn check(
        &self,
        _request: &BackendCallRequest,
    ) -> Result<Option<CallCandidate>, BackendError> {
        panic!("backend client bug");
    }
}

fn backends(
    d: impl BlacklistBackend + 'static,
    r: impl BlacklistBackend + 'static,
    e: impl BlacklistBackend + 'static,
) -> Backends {
    Backends::new(Arc::new(d), Arc::new(r), Arc::new(e))
}

fn call_request() -> BackendCallRequest {
    BackendCallRequest {
        identification_number: "00112345678".to_string(),
        identification_type: "Cedula".to_string(),
        headers: ExchangeHeaders::default(),
    }
}

fn verification_request() -> VerificationRequest {
    VerificationRequest {
        channel: Some("SIEBEL".to_string()),
        user: Some("jnino".to_string()),
        terminal: Some("TERM-01".to_string()),
        date_time: Some("2024-12-19T10:00:00".to_string()),
        version: Some("1.0".to_string()),
        identification_number: Some("00112345678".to_string()),
        identification_type: Some("Cedula".to_string()),
        first_name: Some("Juan".to_string()),
        first_surname: Some("Perez".to_string()),
    }
}

fn fixed_context() -> RequestContext {
    RequestContext::new(
        "7d0c3c2e-8a55-4a8e-9f4b-3f1d2f0e9a11",
        Utc.with_ymd_and_hms(2024, 12, 19, 10, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_all_accepted_reaches_complete() {
    let mut engine = AggregationEngine::new(backends(
        FakeBackend::new(200, false),
        FakeBackend::new(404, false),
        FakeBackend::new(503, false),
    ));
    assert_eq!(engine.phase(), AggregationPhase::Idle);

    let state = engine.run(&call_request()).await.unwrap();

    assert_eq!(engine.phase(), AggregationPhase::Complete);
    assert!(state.is_complete());
    assert_eq!(state.get(ServiceName::Restringido).unwrap().status_code, 404);
}

#[tokio::test]
async fn test_engine_runs_at_most_once() {
    let defraudadores = FakeBackend::new(200, false);
    let calls = Arc::clone(&defraudadores.calls);
    let mut engine = AggregationEngine::new(backends(
        defraudadores,
        FakeBackend::new(200, false),
        FakeBackend::new(200, false),
    ));

    engine.run(&call_request()).await.unwrap();
    let second = engine.run(&call_request()).await;

    assert!(matches!(second, Err(AppError::Aggregation(_))));
    assert_eq!(engine.phase(), AggregationPhase::Complete);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_status_fails_run() {
    let mut engine = AggregationEngine::new(backends(
        FakeBackend::new(200, true),
        FakeBackend::new(999, false),
        FakeBackend::new(200, false),
    ));

    let err = engine.run(&call_request()).await.unwrap_err();

    assert_eq!(
        err,
        AppError::AggregationValidation {
            service: ServiceName::Restringido,
            reason: CallRejection::InvalidStatusCode(999),
        }
    );
    assert_eq!(engine.phase(), AggregationPhase::Failed);
    assert_eq!(err.to_fault().status_code, 400);
}

#[tokio::test]
async fn test_invalid_status_wins_regardless_of_timing() {
    // The rejected call arrives last, after two accepted ones
    let mut engine = AggregationEngine::new(backends(
        FakeBackend::new(200, true),
        FakeBackend::new(200, false),
        FakeBackend::new(302, false).delayed(Duration::from_millis(50)),
    ));

    let err = engine.run(&call_request()).await.unwrap_err();
    assert_eq!(err.service(), Some(ServiceName::Externas));
}

#[tokio::test]
async fn test_missing_payload_is_rejected() {
    let mut engine = AggregationEngine::new(backends(
        FakeBackend::new(200, false),
        FakeBackend::new(200, false),
        EmptyBackend,
    ));

    let err = engine.run(&call_request()).await.unwrap_err();
    assert_eq!(
        err,
        AppError::AggregationValidation {
            service: ServiceName::Externas,
            reason: CallRejection::MissingResponse,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejection_cancels_in_flight_calls() {
    let externas = FakeBackend::new(200, true).delayed(Duration::from_secs(30));
    let completed = Arc::clone(&externas.completed);
    let cancelled = Arc::clone(&externas.cancelled);

    let orchestrator = Orchestrator::new(backends(
        FakeBackend::new(200, true),
        FakeBackend::new(999, true),
        externas,
    ));

    let fault = orchestrator
        .handle(&verification_request(), &fixed_context())
        .await
        .unwrap_err();
    assert_eq!(fault.status_code, 400);
    assert_eq!(fault.error_code, "AGGREGATION_VALIDATION_ERROR");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cancelled.load(Ordering::SeqCst));
    assert!(!completed.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_run_discards_late_completion() {
    let externas = FakeBackend::new(200, true).delayed(Duration::from_millis(300));
    let completed = Arc::clone(&externas.completed);
    let cancelled = Arc::clone(&externas.cancelled);

    let orchestrator = Orchestrator::new(backends(
        FakeBackend::new(200, true),
        FakeBackend::new(200, true),
        externas,
    ));

    let request = verification_request();
    let context = fixed_context();
    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        orchestrator.handle(&request, &context),
    )
    .await;
    assert!(outcome.is_err(), "run should still be waiting on externas");

    // Well past the point where externas would have answered
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(cancelled.load(Ordering::SeqCst));
    assert!(!completed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_slow_backend_still_completes() {
    let orchestrator = Orchestrator::new(backends(
        FakeBackend::new(200, true),
        FakeBackend::new(200, false),
        FakeBackend::new(200, true).delayed(Duration::from_millis(100)),
    ));

    let verdict = orchestrator
        .handle(&verification_request(), &fixed_context())
        .await
        .unwrap();
    assert_eq!(
        verdict.message,
        "El usuario Juan Perez se encuentra en listas defraudador y externa"
    );
}

#[tokio::test]
async fn test_calls_run_concurrently() {
    let delay = Duration::from_millis(200);
    let mut engine = AggregationEngine::new(backends(
        FakeBackend::new(200, false).delayed(delay),
        FakeBackend::new(200, false).delayed(delay),
        FakeBackend::new(200, false).delayed(delay),
    ));

    let started = std::time::Instant::now();
    engine.run(&call_request()).await.unwrap();

    // Sequential calls would need at least 600ms
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_arrival_order_does_not_change_verdict() {
    let delays = [
        [0, 20, 40],
        [40, 20, 0],
        [20, 0, 40],
        [40, 0, 20],
        [0, 40, 20],
        [20, 40, 0],
    ];

    let mut verdicts = Vec::new();
    for [d, r, e] in delays {
        let orchestrator = Orchestrator::new(backends(
            FakeBackend::new(200, true).delayed(Duration::from_millis(d)),
            FakeBackend::new(404, false).delayed(Duration::from_millis(r)),
            FakeBackend::new(200, true).delayed(Duration::from_millis(e)),
        ));
        verdicts.push(
            orchestrator
                .handle(&verification_request(), &fixed_context())
                .await
                .unwrap(),
        );
    }

    assert!(verdicts.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_unavailable_backend_maps_to_503() {
    let orchestrator = Orchestrator::new(backends(
        FailingBackend(BackendError::Unavailable("connection refused".to_string())),
        FakeBackend::new(200, false),
        FakeBackend::new(200, false),
    ));

    let fault = orchestrator
        .handle(&verification_request(), &fixed_context())
        .await
        .unwrap_err();
    assert_eq!(fault.status_code, 503);
    assert_eq!(fault.error_code, "SERVICE_UNAVAILABLE");
    assert!(fault.message.contains("defraudadores"));
}

#[tokio::test]
async fn test_request_failure_maps_to_aggregation_error() {
    let orchestrator = Orchestrator::new(backends(
        FakeBackend::new(200, false),
        FailingBackend(BackendError::Request("invalid header value".to_string())),
        FakeBackend::new(200, false),
    ));

    let fault = orchestrator
        .handle(&verification_request(), &fixed_context())
        .await
        .unwrap_err();
    assert_eq!(fault.status_code, 500);
    assert_eq!(fault.error_code, "AGGREGATION_ERROR");
}

#[tokio::test]
async fn test_panicking_backend_maps_to_internal_error() {
    let mut engine = AggregationEngine::new(backends(
        FakeBackend::new(200, false),
        FakeBackend::new(200, false),
        PanickingBackend,
    ));

    let err = engine.run(&call_request()).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(engine.phase(), AggregationPhase::Failed);

    let fault = err.to_fault();
    assert_eq!(fault.status_code, 500);
    assert_eq!(fault.error_code, "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_scenario_verdicts() {
    let cases = [
        ([false, false, false], false, "Exito"),
        (
            [true, false, false],
            true,
            "El usuario Juan Perez se encuentra en lista defraudador",
        ),
        (
            [true, true, false],
            true,
            "El usuario Juan Perez se encuentra en listas defraudador y restringido",
        ),
        (
            [true, true, true],
            true,
            "El usuario Juan Perez se encuentra en listas defraudador, restringido y externa",
        ),
    ];

    for ([d, r, e], has_match, message) in cases {
        let orchestrator = Orchestrator::new(backends(
            FakeBackend::new(200, d),
            FakeBackend::new(200, r),
            FakeBackend::new(200, e),
        ));
        let verdict = orchestrator
            .handle(&verification_request(), &fixed_context())
            .await
            .unwrap();

        assert_eq!(verdict.has_match, has_match);
        assert_eq!(verdict.message, message);
        assert_eq!(verdict.matched_lists.len(), [d, r, e].iter().filter(|m| **m).count());
        assert_eq!(verdict.transaction_id, "7d0c3c2e-8a55-4a8e-9f4b-3f1d2f0e9a11");
        assert_eq!(verdict.channel.as_deref(), Some("SIEBEL"));
    }
}
