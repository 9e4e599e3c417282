use regex::Regex;
use std::sync::LazyLock;

use crate::errors::AppError;
use crate::models::{BackendCallRequest, ExchangeHeaders, VerificationRequest};

/// Identification types accepted by the blacklist backends.
pub const VALID_ID_TYPES: [&str; 4] = ["Cedula", "Pasaporte", "RNC", "GrupoEconomico"];

static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("alphanumeric pattern is valid"));

/// Validate identification number and type of an inbound request
///
/// Checks for:
/// - Both fields present and non-blank
/// - Alphanumeric identification number (after trimming)
/// - Identification type in `VALID_ID_TYPES` (exact match)
pub fn validate_identification(request: &VerificationRequest) -> Result<(), AppError> {
    let number = request
        .identification_number
        .as_deref()
        .ok_or_else(|| AppError::Validation("Identificación no puede ser null".to_string()))?;
    let id_type = request.identification_type.as_deref().ok_or_else(|| {
        AppError::Validation("Tipo de identificación no puede ser null".to_string())
    })?;

    if number.trim().is_empty() || id_type.trim().is_empty() {
        return Err(AppError::Validation(
            "Identificación y tipo de identificación son requeridos".to_string(),
        ));
    }

    if !ALPHANUMERIC.is_match(number.trim()) {
        tracing::warn!("❌ Non-alphanumeric identification rejected");
        return Err(AppError::Validation(
            "La identificación solo puede contener caracteres alfanuméricos".to_string(),
        ));
    }

    if !VALID_ID_TYPES.contains(&id_type) {
        tracing::warn!("❌ Unknown identification type: {}", id_type);
        return Err(AppError::Validation(format!(
            "Tipo de identificación no válido: {}",
            id_type
        )));
    }

    Ok(())
}

/// Build the request sent to the three backends from a validated request.
///
/// The identification number is forwarded as received.
pub fn to_backend_request(request: &VerificationRequest) -> Result<BackendCallRequest, AppError> {
    match (
        request.identification_number.as_deref(),
        request.identification_type.as_deref(),
    ) {
        (Some(number), Some(id_type)) => Ok(BackendCallRequest {
            identification_number: number.to_string(),
            identification_type: id_type.to_string(),
            headers: ExchangeHeaders::from_request(request),
        }),
        _ => Err(AppError::Validation(
            "Los campos de identificación son requeridos en el request".to_string(),
        )),
    }
}
