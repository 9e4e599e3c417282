use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============ Blacklist Services ============

/// One of the three blacklist services consulted for every verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    /// Internal fraudsters list.
    Defraudadores,
    /// Internal restricted list.
    Restringido,
    /// External lists.
    Externas,
}

impl ServiceName {
    /// Every required service, in verdict precedence order.
    pub const ALL: [ServiceName; 3] = [
        ServiceName::Defraudadores,
        ServiceName::Restringido,
        ServiceName::Externas,
    ];

    /// Key used in logs, faults and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Defraudadores => "defraudadores",
            ServiceName::Restringido => "restringido",
            ServiceName::Externas => "externas",
        }
    }

    /// Name reported in the verdict's list of matches.
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceName::Defraudadores => "Defraudadores",
            ServiceName::Restringido => "Restringidos",
            ServiceName::Externas => "Externas",
        }
    }

    /// Whether the list is maintained internally or by a third party.
    pub fn origin(&self) -> ListOrigin {
        match self {
            ServiceName::Defraudadores | ServiceName::Restringido => ListOrigin::Interna,
            ServiceName::Externas => ListOrigin::Externa,
        }
    }

    /// Word used for this list in the human-readable match message.
    pub fn message_label(&self) -> &'static str {
        match self {
            ServiceName::Defraudadores => "defraudador",
            ServiceName::Restringido => "restringido",
            ServiceName::Externas => "externa",
        }
    }

    /// Position of the service's slot in an `AggregationState`.
    pub(crate) fn slot(&self) -> usize {
        match self {
            ServiceName::Defraudadores => 0,
            ServiceName::Restringido => 1,
            ServiceName::Externas => 2,
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a blacklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOrigin {
    Interna,
    Externa,
}

impl ListOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOrigin::Interna => "Interna",
            ListOrigin::Externa => "Externa",
        }
    }
}

// ============ Inbound Request ============

/// Verification request as received from the caller-facing adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// Channel the request was issued from.
    #[serde(default)]
    pub channel: Option<String>,
    /// User issuing the request.
    #[serde(default)]
    pub user: Option<String>,
    /// Terminal the request was issued from.
    #[serde(default)]
    pub terminal: Option<String>,
    /// Caller-side date/time of the request.
    #[serde(default)]
    pub date_time: Option<String>,
    /// Caller's service version.
    #[serde(default)]
    pub version: Option<String>,
    /// Identification number to verify.
    #[serde(default)]
    pub identification_number: Option<String>,
    /// Identification type (Cedula, Pasaporte, RNC, GrupoEconomico).
    #[serde(default)]
    pub identification_type: Option<String>,
    /// Person's first name, used only in the match message.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Person's first surname, used only in the match message.
    #[serde(default)]
    pub first_surname: Option<String>,
}

impl VerificationRequest {
    /// Display name built from first name and first surname.
    pub fn person_name(&self) -> String {
        [self.first_name.as_deref(), self.first_surname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Per-request context generated by the caller-facing layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation identifier for logs, audit and the verdict.
    pub transaction_id: String,
    /// Timestamp stamped on the verdict.
    pub timestamp: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(transaction_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            timestamp,
        }
    }

    /// Fresh context with a random UUID v4 transaction id.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), Utc::now())
    }
}

/// Request sent to each of the three blacklist backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCallRequest {
    pub identification_number: String,
    pub identification_type: String,
    /// Sent as HTTP headers, never in the body.
    #[serde(skip)]
    pub headers: ExchangeHeaders,
}

/// Caller metadata forwarded to every backend as HTTP headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeHeaders {
    pub channel: Option<String>,
    pub user: Option<String>,
    pub terminal: Option<String>,
    pub version: Option<String>,
}

impl ExchangeHeaders {
    pub fn from_request(request: &VerificationRequest) -> Self {
        Self {
            channel: request.channel.clone(),
            user: request.user.clone(),
            terminal: request.terminal.clone(),
            version: request.version.clone(),
        }
    }

    /// Header name/value pairs that carry a value. `application` repeats the channel.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("channel", self.channel.as_deref()),
            ("user", self.user.as_deref()),
            ("terminal", self.terminal.as_deref()),
            ("version", self.version.as_deref()),
            ("application", self.channel.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect()
    }
}

// ============ Backend Payloads ============
//
// Only `header.responseCode` and `body.result` are read. Every field decodes
// on its own, so a malformed neighbour never hides them.

/// Response header returned by every blacklist backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHeader {
    #[serde(default, deserialize_with = "deserialize_response_code")]
    pub response_code: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub response_message: Option<String>,
}

/// Accepts the response code as a JSON number or a numeric string.
fn deserialize_response_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Decodes the field if it has the expected shape, `None` otherwise.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Response body returned by every blacklist backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendBody {
    /// True when the identification is listed.
    #[serde(default, deserialize_with = "lenient")]
    pub result: Option<bool>,
}

/// Backend response payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub header: Option<BackendHeader>,
    #[serde(default, deserialize_with = "lenient")]
    pub body: Option<BackendBody>,
}

// ============ Call Results ============

/// Unvalidated result of one backend call, as produced by the outbound layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CallCandidate {
    /// Status code carried in the payload header, if any.
    pub status_code: Option<i64>,
    /// True if the backend signals the identification is listed.
    pub matched: bool,
    /// Opaque backend payload, retained for audit.
    pub raw: Value,
    /// Transport status of the HTTP exchange.
    pub http_status: u16,
}

impl CallCandidate {
    /// Builds a candidate from a decoded backend payload.
    pub fn from_payload(payload: &BackendPayload, raw: Value, http_status: u16) -> Self {
        Self {
            status_code: payload.header.as_ref().and_then(|h| h.response_code),
            matched: payload
                .body
                .as_ref()
                .and_then(|b| b.result)
                .unwrap_or(false),
            raw,
            http_status,
        }
    }
}

/// Accepted result of one backend call.
///
/// Only the validator constructs these, so `status_code` is always in the
/// accepted set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub service: ServiceName,
    pub status_code: u16,
    pub matched: bool,
    pub raw: Value,
}

/// Outcomes of one aggregation run, one single-writer slot per service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationState {
    slots: [Option<CallOutcome>; 3],
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the outcome's slot. Returns the outcome back if the slot was
    /// already taken; an existing outcome is never overwritten.
    pub fn insert(&mut self, outcome: CallOutcome) -> Result<(), CallOutcome> {
        let slot = &mut self.slots[outcome.service.slot()];
        if slot.is_some() {
            return Err(outcome);
        }
        *slot = Some(outcome);
        Ok(())
    }

    pub fn get(&self, service: ServiceName) -> Option<&CallOutcome> {
        self.slots[service.slot()].as_ref()
    }

    /// Required services that have no outcome yet, in precedence order.
    pub fn missing(&self) -> Vec<ServiceName> {
        ServiceName::ALL
            .into_iter()
            .filter(|service| self.get(*service).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Outcomes in precedence order.
    pub fn outcomes(&self) -> impl Iterator<Item = &CallOutcome> {
        self.slots.iter().flatten()
    }
}

// ============ Verdict ============

/// A list the identification was found on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedList {
    pub name: String,
    pub origin: String,
}

/// Request metadata echoed into the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerdictMetadata {
    pub transaction_id: String,
    pub timestamp: String,
    pub channel: Option<String>,
    pub user: Option<String>,
    pub terminal: Option<String>,
    pub version: Option<String>,
    /// Person name used in the match message.
    pub name: String,
}

impl VerdictMetadata {
    pub fn from_request(request: &VerificationRequest, context: &RequestContext) -> Self {
        Self {
            transaction_id: context.transaction_id.clone(),
            timestamp: context.timestamp.to_rfc3339(),
            channel: request.channel.clone(),
            user: request.user.clone(),
            terminal: request.terminal.clone(),
            version: request.version.clone(),
            name: request.person_name(),
        }
    }
}

/// Consolidated verification result returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub has_match: bool,
    /// "1" when any list matched, "0" otherwise.
    pub result_type: String,
    pub matched_lists: Vec<MatchedList>,
    pub message: String,
    pub transaction_id: String,
    pub timestamp: String,
    pub channel: Option<String>,
    pub user: Option<String>,
    pub terminal: Option<String>,
    pub version: Option<String>,
}
