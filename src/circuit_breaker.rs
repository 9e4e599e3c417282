use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Circuit breaker guarding the transport of one blacklist backend.
pub type BackendCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for backend calls to prevent cascading failures.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive transport failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, calls pass through.
/// - **OPEN**: Backend unreachable, calls fail fast as unavailable.
/// - **HALF_OPEN**: Testing if the backend recovered.
///
/// Each backend client owns its own breaker, so one unreachable list never
/// trips the others.
pub fn create_backend_circuit_breaker() -> BackendCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
