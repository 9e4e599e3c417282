use crate::errors::AppError;
use crate::models::{AggregationState, MatchedList, ServiceName, Verdict, VerdictMetadata};

/// Message returned when no list matched.
pub const NO_MATCH_MESSAGE: &str = "Exito";

/// Builds the consolidated verdict from a complete aggregation.
///
/// Pure: the same state and metadata always produce the same verdict.
pub fn build_verdict(
    state: &AggregationState,
    metadata: &VerdictMetadata,
) -> Result<Verdict, AppError> {
    if let Some(service) = state.missing().first() {
        return Err(AppError::Aggregation(format!(
            "verdict requested without a response from {}",
            service
        )));
    }

    let matched = matched_services(state);
    let has_match = !matched.is_empty();

    let matched_lists = matched
        .iter()
        .map(|service| MatchedList {
            name: service.display_name().to_string(),
            origin: service.origin().as_str().to_string(),
        })
        .collect();

    let message = if has_match {
        build_match_message(&metadata.name, &matched)
    } else {
        NO_MATCH_MESSAGE.to_string()
    };

    Ok(Verdict {
        has_match,
        result_type: if has_match { "1" } else { "0" }.to_string(),
        matched_lists,
        message,
        transaction_id: metadata.transaction_id.clone(),
        timestamp: metadata.timestamp.clone(),
        channel: metadata.channel.clone(),
        user: metadata.user.clone(),
        terminal: metadata.terminal.clone(),
        version: metadata.version.clone(),
    })
}

/// Services that reported a match, in precedence order.
fn matched_services(state: &AggregationState) -> Vec<ServiceName> {
    ServiceName::ALL
        .into_iter()
        .filter(|service| state.get(*service).is_some_and(|o| o.matched))
        .collect()
}

/// "El usuario {name} se encuentra en lista(s) ..." for the matched services.
pub fn build_match_message(name: &str, matched: &[ServiceName]) -> String {
    let noun = if matched.len() > 1 { "listas" } else { "lista" };
    let labels: Vec<&str> = matched.iter().map(ServiceName::message_label).collect();
    let name = name.trim();

    if name.is_empty() {
        format!("El usuario se encuentra en {} {}", noun, join_labels(&labels))
    } else {
        format!(
            "El usuario {} se encuentra en {} {}",
            name,
            noun,
            join_labels(&labels)
        )
    }
}

/// Natural-language conjunction: "a", "a y b", "a, b y c".
fn join_labels(labels: &[&str]) -> String {
    match labels {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} y {}", init.join(", "), last),
    }
}
