//! Garde validation utilities.

use crate::domain::{DomainError, DomainResult};
use garde::{Report, Validate};
use std::collections::BTreeMap;
use tracing::debug;

/// Validate a request or alert before it reaches the platform.
///
/// The error names the rejected type and lists each failing field once,
/// e.g. `ChargeRequest: organization_id (length is lower than 1)`.
pub fn validate_struct<T>(value: &T) -> DomainResult<()>
where
    T: Validate,
    T::Context: Default,
{
    value.validate().map_err(|report| {
        let subject = short_type_name::<T>();
        let violations = describe_violations(&report);
        debug!(subject, violations = %violations, "validation rejected");
        DomainError::ValidationError(format!("{}: {}", subject, violations))
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Messages grouped per field path, fields in lexical order
fn describe_violations(report: &Report) -> String {
    let mut by_field: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (path, error) in report.iter() {
        by_field
            .entry(path.to_string())
            .or_default()
            .push(error.message().to_string());
    }

    by_field
        .into_iter()
        .map(|(field, messages)| {
            if field.is_empty() {
                messages.join(", ")
            } else {
                format!("{} ({})", field, messages.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
