mod compose;
mod filter;
mod parse;

use serde::{Deserialize, Serialize};
use seekcore_index::RawEntry;

pub use compose::{compose, QueryPayload};
pub use filter::{Filter, FilterError, FilterId, FilterSet, SizeOperator, SizeUnit};
pub use parse::{ParseError, ParsedQuery};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Standard,
    LanguageModel,
}

impl SearchMode {
    pub fn from_llm_flag(is_llm: bool) -> Self {
        if is_llm {
            Self::LanguageModel
        } else {
            Self::Standard
        }
    }

    pub fn is_llm(self) -> bool {
        self == Self::LanguageModel
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Echoed on every stream event produced for this request.
    pub request_id: u64,
    pub mode: SearchMode,
    pub payload: QueryPayload,
}

/// One delivery on the search stream channel. `item: None` ends the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStreamEvent {
    pub request_id: u64,
    pub item: Option<RawEntry>,
}

impl SearchStreamEvent {
    pub fn item(request_id: u64, item: impl Into<RawEntry>) -> Self {
        Self {
            request_id,
            item: Some(item.into()),
        }
    }

    pub fn end(request_id: u64) -> Self {
        Self {
            request_id,
            item: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.item.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_serializes_with_null_item() {
        let json = serde_json::to_string(&SearchStreamEvent::end(7)).unwrap();
        assert_eq!(json, r#"{"request_id":7,"item":null}"#);

        let back: SearchStreamEvent = serde_json::from_str(&json).unwrap();
        assert!(back.is_sentinel());
    }

    #[test]
    fn mode_follows_llm_flag() {
        assert_eq!(SearchMode::from_llm_flag(true), SearchMode::LanguageModel);
        assert!(!SearchMode::from_llm_flag(false).is_llm());
        assert_eq!(
            serde_json::to_string(&SearchMode::LanguageModel).unwrap(),
            r#""language_model""#
        );
    }
}
