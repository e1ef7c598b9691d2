use serde::{Deserialize, Serialize};

use crate::filter::{iso_timestamp, FilterSet};

/// Request body handed to a search backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub query: String,
    pub current_path: String,
    /// RFC 3339 lower bound, or empty when unbounded.
    pub modified_after: String,
    /// RFC 3339 upper bound, or empty when unbounded.
    pub modified_before: String,
}

impl QueryPayload {
    pub fn has_date_bounds(&self) -> bool {
        !self.modified_after.is_empty() || !self.modified_before.is_empty()
    }

    /// True when there is nothing to search for at all.
    pub fn is_blank(&self) -> bool {
        self.query.is_empty() && !self.has_date_bounds()
    }
}

/// Folds free text and filters into a payload. Date bounds go to their own
/// fields; every other filter becomes an inline token after the free text.
pub fn compose(free_text: &str, filters: &FilterSet, current_path: &str) -> QueryPayload {
    let mut parts: Vec<String> = Vec::new();
    let free_text = free_text.trim();
    if !free_text.is_empty() {
        parts.push(free_text.to_string());
    }

    let mut modified_after = String::new();
    let mut modified_before = String::new();
    for (_, filter) in filters.iter() {
        if let Some(after) = filter.modified_after() {
            modified_after = iso_timestamp(after);
        }
        if let Some(before) = filter.modified_before() {
            modified_before = iso_timestamp(before);
        }
        if !matches!(filter, crate::Filter::Date { .. }) {
            parts.extend(filter.query_fragments());
        }
    }

    QueryPayload {
        query: parts.join(" ").trim().to_string(),
        current_path: current_path.to_string(),
        modified_after,
        modified_before,
    }
}
