//! Concurrent fan-out to the three blacklist backends.
//!
//! Each backend call runs as its own task and posts exactly one
//! `(service, result)` message through a [`JoinSet`]. The engine is the only
//! reader of those messages: it validates each result as it arrives, fills the
//! service's slot in a run-local [`AggregationState`], and fails fast on the
//! first rejected or failed call, aborting whatever is still in flight.
//!
//! # States
//!
//! `Idle → Dispatching → Aggregating → Complete`, or `Failed` from any
//! non-terminal phase. Terminal phases never go back to `Dispatching`, so an
//! engine performs at most one aggregation.

use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use crate::errors::{AppError, BackendError};
use crate::models::{AggregationState, BackendCallRequest, CallCandidate, ServiceName};
use crate::services::Backends;
use crate::validator::{validate_call, CallRejection};

type CallMessage = (ServiceName, Result<Option<CallCandidate>, BackendError>);

/// Lifecycle of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPhase {
    Idle,
    Dispatching,
    Aggregating,
    Complete,
    Failed,
}

impl AggregationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AggregationPhase::Complete | AggregationPhase::Failed)
    }

    fn can_transition_to(&self, next: AggregationPhase) -> bool {
        use AggregationPhase::*;
        matches!(
            (self, next),
            (Idle, Dispatching)
                | (Dispatching, Aggregating)
                | (Dispatching, Failed)
                | (Aggregating, Complete)
                | (Aggregating, Failed)
        )
    }
}

/// Runs the three backend calls of a single request.
pub struct AggregationEngine {
    backends: Backends,
    phase: AggregationPhase,
}

impl AggregationEngine {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            phase: AggregationPhase::Idle,
        }
    }

    pub fn phase(&self) -> AggregationPhase {
        self.phase
    }

    fn transition(&mut self, next: AggregationPhase) -> Result<(), AppError> {
        if !self.phase.can_transition_to(next) {
            return Err(AppError::Aggregation(format!(
                "invalid aggregation transition {:?} -> {:?}",
                self.phase, next
            )));
        }
        tracing::debug!("Aggregation phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Dispatches all three calls and waits for three accepted outcomes.
    ///
    /// # Returns
    ///
    /// * `Ok(AggregationState)` - complete state, every required service present.
    /// * `Err(AppError)` - the first rejection or failure; no partial state escapes.
    pub async fn run(&mut self, request: &BackendCallRequest) -> Result<AggregationState, AppError> {
        if self.phase != AggregationPhase::Idle {
            return Err(AppError::Aggregation(format!(
                "aggregation already attempted (phase {:?})",
                self.phase
            )));
        }
        self.transition(AggregationPhase::Dispatching)?;

        let mut tasks: JoinSet<CallMessage> = JoinSet::new();
        for service in ServiceName::ALL {
            let backend = self.backends.get(service);
            let request = request.clone();
            tasks.spawn(
                async move {
                    let result = backend.check(&request).await;
                    (service, result)
                }
                .instrument(tracing::Span::current()),
            );
        }
        tracing::info!("Dispatched {} backend calls", ServiceName::ALL.len());

        self.transition(AggregationPhase::Aggregating)?;

        match collect(&mut tasks).await {
            Ok(state) => {
                self.transition(AggregationPhase::Complete)?;
                tracing::info!(
                    "All {} backend responses aggregated",
                    state.outcomes().count()
                );
                Ok(state)
            }
            Err(e) => {
                tasks.abort_all();
                self.phase = AggregationPhase::Failed;
                tracing::error!("Aggregation failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Reads call messages in arrival order until the state is complete or a
/// call fails.
async fn collect(tasks: &mut JoinSet<CallMessage>) -> Result<AggregationState, AppError> {
    let mut state = AggregationState::new();

    while let Some(joined) = tasks.join_next().await {
        let (service, result) = joined.map_err(join_error)?;

        let candidate = result.map_err(|e| e.into_app_error(service))?;

        let outcome = validate_call(service, candidate.as_ref()).map_err(|reason| {
            tracing::error!("Response from {} rejected: {}", service, reason);
            AppError::AggregationValidation { service, reason }
        })?;

        tracing::debug!(
            "Accepted {} response (status {}, matched {})",
            service,
            outcome.status_code,
            outcome.matched
        );

        state.insert(outcome).map_err(|duplicate| {
            AppError::Aggregation(format!("duplicate response for {}", duplicate.service))
        })?;

        if state.is_complete() {
            break;
        }
    }

    verify_complete(&state)?;
    Ok(state)
}

/// A panicked call is an internal fault; any other join failure is an
/// aggregation fault.
fn join_error(err: JoinError) -> AppError {
    if err.is_panic() {
        AppError::Internal(format!("backend task panicked: {}", err))
    } else {
        AppError::Aggregation(format!("backend task did not finish: {}", err))
    }
}

/// Final cross-service check before the state leaves the engine.
fn verify_complete(state: &AggregationState) -> Result<(), AppError> {
    match state.missing().first() {
        Some(service) => {
            tracing::error!("Missing response from service: {}", service);
            Err(AppError::AggregationValidation {
                service: *service,
                reason: CallRejection::MissingResponse,
            })
        }
        None => Ok(()),
    }
}
