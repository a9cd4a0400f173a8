//! Display-name composition, sortable-name derivation, badge normalization
//! and the shared trim-or-drop treatment for optional string fields.

use itertools::Itertools;

use crate::model::product::badge_label;
use crate::model::transfer::TransferModel;

/// Offer-variant records (those carrying unifying properties) append each
/// variant value to the base name; plain records keep the name as supplied.
pub fn compose_name(model: &TransferModel) -> String {
    if model.unifying_properties.is_empty() {
        return model.name.trim().to_string();
    }
    let suffix = model
        .unifying_properties
        .iter()
        .map(|p| p.value.as_str())
        .join(" ");
    format!("{} {}", model.name, suffix).trim().to_string()
}

/// Collation key for catalog listings: lowercased, leading punctuation and
/// quoting stripped, inner whitespace collapsed.
pub fn sortable_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let stripped = match lowered.find(|c: char| c.is_alphanumeric()) {
        Some(pos) => &lowered[pos..],
        None => lowered.as_str(),
    };
    stripped.split_whitespace().join(" ")
}

/// Maps raw badge values through the fixed badge table; unrecognized values
/// are dropped.
pub fn normalize_badges(model: &TransferModel) -> Vec<String> {
    model
        .badge
        .iter()
        .filter_map(|b| badge_label(&b.value.trim().to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Blank-or-missing collapses to None, anything else is trimmed.
pub fn clean_string(raw: Option<&str>) -> Option<String> {
    match raw {
        Some(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
