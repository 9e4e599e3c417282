use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ServiceName;
use crate::validator::CallRejection;

/// Namespace for caller input validation faults.
pub const VALIDATION_NAMESPACE: &str = "http://tempuri.org/";
/// Namespace for request envelope faults.
pub const INTEGRATION_NAMESPACE: &str = "http://banreservas.com/integration";
/// Namespace for faults raised while aggregating backend results.
pub const FAULTS_NAMESPACE: &str = "http://banreservas.com/integration/faults";

/// Application-specific error types.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Caller input is malformed (identification format or type).
    Validation(String),
    /// The request carried no body at all.
    EmptyRequest,
    /// A backend returned a response that failed validation.
    AggregationValidation {
        service: ServiceName,
        reason: CallRejection,
    },
    /// Unexpected failure while fanning out or merging.
    Aggregation(String),
    /// A backend could not be reached.
    BackendUnavailable {
        service: ServiceName,
        message: String,
    },
    /// Anything else.
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Error en validación: {}", msg),
            AppError::EmptyRequest => write!(f, "El mensaje está vacío o mal formado"),
            AppError::AggregationValidation { service, reason } => write!(
                f,
                "Error en validación de respuesta - {}: {}",
                service, reason
            ),
            AppError::Aggregation(msg) => write!(f, "Error en agregación: {}", msg),
            AppError::BackendUnavailable { service, message } => {
                write!(f, "Servicio no disponible: {}: {}", service, message)
            }
            AppError::Internal(msg) => write!(f, "Error interno: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Translates the error into the single fault returned to the caller.
    pub fn to_fault(&self) -> Fault {
        match self {
            AppError::Validation(_) => {
                Fault::new(self.to_string(), "VAL-400", VALIDATION_NAMESPACE, 400)
            }
            AppError::EmptyRequest => {
                Fault::new(self.to_string(), "EMPTY_REQUEST", INTEGRATION_NAMESPACE, 400)
            }
            AppError::AggregationValidation { .. } => Fault::new(
                self.to_string(),
                "AGGREGATION_VALIDATION_ERROR",
                FAULTS_NAMESPACE,
                400,
            ),
            AppError::Aggregation(_) => Fault::new(
                "Error inesperado durante la agregación",
                "AGGREGATION_ERROR",
                FAULTS_NAMESPACE,
                500,
            ),
            AppError::BackendUnavailable { .. } => Fault::new(
                self.to_string(),
                "SERVICE_UNAVAILABLE",
                FAULTS_NAMESPACE,
                503,
            ),
            AppError::Internal(_) => Fault::new(
                "Error interno del servidor",
                "INTERNAL_ERROR",
                FAULTS_NAMESPACE,
                500,
            ),
        }
    }

    /// Service the error is attributed to, if any.
    pub fn service(&self) -> Option<ServiceName> {
        match self {
            AppError::AggregationValidation { service, .. }
            | AppError::BackendUnavailable { service, .. } => Some(*service),
            _ => None,
        }
    }
}

/// Structured fault returned to the caller instead of a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fault {
    pub error_code: String,
    pub message: String,
    pub namespace: String,
    pub status_code: u16,
}

impl Fault {
    pub fn new(
        message: impl Into<String>,
        error_code: impl Into<String>,
        namespace: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            namespace: namespace.into(),
            status_code,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.status_code, self.error_code, self.message)
    }
}

impl IntoResponse for Fault {
    /// Converts the fault into an HTTP response carrying its status code.
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("Responding with fault {}", self);
        } else {
            tracing::warn!("Responding with fault {}", self);
        }
        (status, Json(self)).into_response()
    }
}

/// Failure reported by the outbound layer for one backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Connection refused, timeout, or an open circuit.
    Unavailable(String),
    /// The backend could not be called for any other reason.
    Request(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            BackendError::Request(msg) => write!(f, "Backend request failed: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    /// Connection-level failures become `Unavailable`, everything else `Request`.
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            BackendError::Unavailable(err.to_string())
        } else {
            BackendError::Request(err.to_string())
        }
    }
}

impl BackendError {
    /// Attributes the failure to a service and lifts it into the taxonomy.
    pub fn into_app_error(self, service: ServiceName) -> AppError {
        match self {
            BackendError::Unavailable(message) => AppError::BackendUnavailable { service, message },
            BackendError::Request(message) => {
                AppError::Aggregation(format!("{} call failed: {}", service, message))
            }
        }
    }
}
