//! Per-request verification pipeline
//!
//! 1. Validate identification number and type
//! 2. Build the backend call request
//! 3. Fan out to the three blacklists (fresh engine per request)
//! 4. Build the verdict
//!
//! Every failure is translated to exactly one `Fault` here.

use tracing::Instrument;

use crate::aggregation::AggregationEngine;
use crate::errors::{AppError, Fault};
use crate::identification::{to_backend_request, validate_identification};
use crate::models::{RequestContext, Verdict, VerdictMetadata, VerificationRequest};
use crate::services::Backends;
use crate::verdict::build_verdict;

#[derive(Clone)]
pub struct Orchestrator {
    backends: Backends,
}

impl Orchestrator {
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }

    /// Verifies one request against all three blacklists.
    pub async fn handle(
        &self,
        request: &VerificationRequest,
        context: &RequestContext,
    ) -> Result<Verdict, Fault> {
        let span = tracing::info_span!("verification", session_id = %context.transaction_id);

        let result = self.process(request, context).instrument(span.clone()).await;

        span.in_scope(|| match result {
            Ok(verdict) => {
                tracing::info!(
                    target: "audit",
                    has_match = verdict.has_match,
                    message = %verdict.message,
                    error_code = "0",
                    "verification completed"
                );
                Ok(verdict)
            }
            Err(err) => {
                let fault = err.to_fault();
                tracing::error!("Verification failed: {}", err);
                tracing::info!(
                    target: "audit",
                    service = err.service().map(|s| s.as_str()).unwrap_or("-"),
                    error_code = %fault.error_code,
                    status_code = fault.status_code,
                    error_message = %fault.message,
                    "verification failed"
                );
                Err(fault)
            }
        })
    }

    async fn process(
        &self,
        request: &VerificationRequest,
        context: &RequestContext,
    ) -> Result<Verdict, AppError> {
        tracing::info!(
            "Starting verification (channel: {:?}, user: {:?}, terminal: {:?})",
            request.channel,
            request.user,
            request.terminal
        );

        validate_identification(request)?;
        let call_request = to_backend_request(request)?;
        tracing::debug!("Validation passed for type {}", call_request.identification_type);

        let mut engine = AggregationEngine::new(self.backends.clone());
        let state = engine.run(&call_request).await?;

        let metadata = VerdictMetadata::from_request(request, context);
        let verdict = build_verdict(&state, &metadata)?;

        tracing::info!(
            "Verdict built: has_match={}, lists={}",
            verdict.has_match,
            verdict.matched_lists.len()
        );
        Ok(verdict)
    }
}
