use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("filter already present: {0}")]
    DuplicateFilter(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterId(u64);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeOperator {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "=")]
    Equal,
}

impl SizeOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Greater => ">",
            Self::Less => "<",
            Self::Equal => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeUnit {
    #[serde(rename = "KB")]
    Kb,
    #[serde(rename = "MB")]
    Mb,
    #[serde(rename = "GB")]
    Gb,
}

impl SizeUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Kb => "KB",
            Self::Mb => "MB",
            Self::Gb => "GB",
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            Self::Kb => 1 << 10,
            Self::Mb => 1 << 20,
            Self::Gb => 1 << 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Type {
        extension: String,
    },
    Size {
        operator: SizeOperator,
        value: f64,
        unit: SizeUnit,
    },
    Date {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl Filter {
    pub fn file_type(extension: impl Into<String>) -> Self {
        Self::Type {
            extension: extension.into(),
        }
    }

    pub fn size(operator: SizeOperator, value: f64, unit: SizeUnit) -> Self {
        Self::Size {
            operator,
            value,
            unit,
        }
    }

    pub fn date(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self::Date { start, end }
    }

    /// Lower bound as the start of the UTC day.
    pub fn modified_after(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date {
                start: Some(start), ..
            } => start.and_hms_opt(0, 0, 0).map(|t| t.and_utc()),
            _ => None,
        }
    }

    /// Upper bound as 23:59:59 of the UTC day.
    pub fn modified_before(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date { end: Some(end), .. } => end.and_hms_opt(23, 59, 59).map(|t| t.and_utc()),
            _ => None,
        }
    }

    pub fn query_fragments(&self) -> Vec<String> {
        match self {
            Self::Type { extension } => vec![format!("type:{extension}")],
            Self::Size {
                operator,
                value,
                unit,
            } => vec![format!("size:{}{}{}", operator.symbol(), value, unit.label())],
            Self::Date { .. } => {
                let mut fragments = Vec::with_capacity(2);
                if let Some(after) = self.modified_after() {
                    fragments.push(format!("date:>={}", iso_timestamp(after)));
                }
                if let Some(before) = self.modified_before() {
                    fragments.push(format!("date:<={}", iso_timestamp(before)));
                }
                fragments
            }
        }
    }

    /// Short text for a filter tag.
    pub fn label(&self) -> String {
        match self {
            Self::Type { extension } => format!("type: {extension}"),
            Self::Size {
                operator,
                value,
                unit,
            } => format!("size: {} {}{}", operator.symbol(), value, unit.label()),
            Self::Date { start, end } => match (start, end) {
                (Some(start), Some(end)) => format!("{start} → {end}"),
                (Some(start), None) => format!("From {start}"),
                (None, Some(end)) => format!("To {end}"),
                (None, None) => "invalid date range".to_string(),
            },
        }
    }

    fn is_duplicate_of(&self, other: &Filter) -> bool {
        match (self, other) {
            (Self::Type { extension: a }, Self::Type { extension: b }) => a.eq_ignore_ascii_case(b),
            (
                Self::Size {
                    operator: op_a,
                    value: value_a,
                    unit: unit_a,
                },
                Self::Size {
                    operator: op_b,
                    value: value_b,
                    unit: unit_b,
                },
            ) => op_a == op_b && value_a == value_b && unit_a == unit_b,
            _ => false,
        }
    }

    fn validated(self) -> Result<Self, FilterError> {
        match self {
            Self::Type { extension } => {
                let extension = extension.trim().trim_start_matches('.').to_string();
                let separator = |c: char| c.is_whitespace() || c == ',' || c == ':';
                if extension.is_empty() || extension.contains(separator) {
                    return Err(FilterError::InvalidFilter(
                        "type filter needs a single extension".to_string(),
                    ));
                }
                Ok(Self::Type { extension })
            }
            Self::Size {
                operator,
                value,
                unit,
            } => {
                if !value.is_finite() || value < 0.0 {
                    return Err(FilterError::InvalidFilter(format!(
                        "size value must be a non-negative number, got {value}"
                    )));
                }
                Ok(Self::Size {
                    operator,
                    value,
                    unit,
                })
            }
            Self::Date { start, end } => match (start, end) {
                (None, None) => Err(FilterError::InvalidFilter(
                    "date filter needs a start or an end".to_string(),
                )),
                (Some(s), Some(e)) if s > e => Err(FilterError::InvalidFilter(format!(
                    "date range starts after it ends ({s} > {e})"
                ))),
                _ => Ok(Self::Date { start, end }),
            },
        }
    }
}

pub(crate) fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Ordered set of search filters with per-kind dedup rules.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    next_id: u64,
    slots: Vec<(FilterId, Filter)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter. A date filter replaces the existing one; an equal type
    /// or size filter is rejected and the set is left unchanged.
    pub fn add(&mut self, filter: Filter) -> Result<FilterId, FilterError> {
        let filter = filter.validated()?;

        if matches!(filter, Filter::Date { .. }) {
            self.slots
                .retain(|(_, existing)| !matches!(existing, Filter::Date { .. }));
        } else if let Some((_, existing)) = self
            .slots
            .iter()
            .find(|(_, existing)| existing.is_duplicate_of(&filter))
        {
            return Err(FilterError::DuplicateFilter(existing.label()));
        }

        self.next_id += 1;
        let id = FilterId(self.next_id);
        self.slots.push((id, filter));
        Ok(id)
    }

    /// Returns whether a filter was removed. Unknown ids are ignored.
    pub fn remove(&mut self, id: FilterId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot_id, _)| *slot_id != id);
        self.slots.len() != before
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: FilterId) -> Option<&Filter> {
        self.slots
            .iter()
            .find(|(slot_id, _)| *slot_id == id)
            .map(|(_, filter)| filter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterId, &Filter)> {
        self.slots.iter().map(|(id, filter)| (*id, filter))
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.slots.iter().map(|(_, filter)| filter.clone()).collect()
    }

    pub fn date_filter(&self) -> Option<&Filter> {
        self.slots
            .iter()
            .map(|(_, filter)| filter)
            .find(|filter| matches!(filter, Filter::Date { .. }))
    }

    pub fn to_query_fragments(&self) -> Vec<String> {
        self.slots
            .iter()
            .flat_map(|(_, filter)| filter.query_fragments())
            .collect()
    }
}
