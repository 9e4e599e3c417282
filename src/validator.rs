//! Classification of a single backend response as accepted or rejected.
//!
//! A clean "not found" (404) is an accepted outcome; only a missing response,
//! a missing status code, or a code outside [`ACCEPTED_STATUS_CODES`] is
//! rejected.

use std::fmt;

use crate::models::{CallCandidate, CallOutcome, ServiceName};

/// Status codes a backend may legitimately report.
pub const ACCEPTED_STATUS_CODES: [u16; 5] = [200, 400, 404, 500, 503];

/// Why a backend response was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallRejection {
    /// The backend produced no response payload.
    MissingResponse,
    /// The payload carried no status code.
    MissingStatusCode,
    /// The status code is outside the accepted set.
    InvalidStatusCode(i64),
}

impl fmt::Display for CallRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallRejection::MissingResponse => write!(f, "Respuesta nula"),
            CallRejection::MissingStatusCode => write!(f, "Código de respuesta no encontrado"),
            CallRejection::InvalidStatusCode(code) => {
                write!(f, "Código de respuesta inválido: {}", code)
            }
        }
    }
}

/// Returns true when `code` belongs to the accepted set.
pub fn is_accepted_status(code: i64) -> bool {
    u16::try_from(code)
        .map(|code| ACCEPTED_STATUS_CODES.contains(&code))
        .unwrap_or(false)
}

/// Validates one backend result and turns it into a [`CallOutcome`].
pub fn validate_call(
    service: ServiceName,
    candidate: Option<&CallCandidate>,
) -> Result<CallOutcome, CallRejection> {
    let candidate = candidate.ok_or(CallRejection::MissingResponse)?;
    let code = candidate
        .status_code
        .ok_or(CallRejection::MissingStatusCode)?;

    if !is_accepted_status(code) {
        return Err(CallRejection::InvalidStatusCode(code));
    }

    Ok(CallOutcome {
        service,
        // In range: the accepted set only holds u16 values.
        status_code: code as u16,
        matched: candidate.matched,
        raw: candidate.raw.clone(),
    })
}
