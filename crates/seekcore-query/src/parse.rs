use chrono::{DateTime, Utc};
use seekcore_index::Entry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid size condition: {0}")]
    InvalidSize(String),
    #[error("invalid date condition: {0}")]
    InvalidDate(String),
    #[error("size range is empty ({min} > {max})")]
    EmptySizeRange { min: u64, max: u64 },
}

/// Query string split into matchable parts.
///
/// Understands `type:a,b`, `size:<op><value><unit>` (units B/K/M/G/T with an
/// optional trailing `B`, 1024-based), and `date:>=` / `date:<=` RFC 3339
/// bounds. Every other word is a case-insensitive name term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub terms: Vec<String>,
    pub extensions: Vec<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
}

impl ParsedQuery {
    pub fn parse(query: &str) -> Result<Self, ParseError> {
        let mut parsed = Self::default();

        for word in query.split_whitespace() {
            let lower = word.to_lowercase();
            if let Some(types) = lower.strip_prefix("type:") {
                parsed.extensions.extend(
                    types
                        .split(',')
                        .map(|ext| ext.trim().trim_start_matches('.'))
                        .filter(|ext| !ext.is_empty())
                        .map(str::to_string),
                );
            } else if let Some(cond) = lower.strip_prefix("size:") {
                parsed.apply_size(cond)?;
            } else if let Some(cond) = word.strip_prefix("date:") {
                parsed.apply_date(cond)?;
            } else {
                parsed.terms.push(lower);
            }
        }

        if let (Some(min), Some(max)) = (parsed.min_size, parsed.max_size) {
            if min > max {
                return Err(ParseError::EmptySizeRange { min, max });
            }
        }

        Ok(parsed)
    }

    /// Tightens the date bounds with an RFC 3339 pair. Empty strings and
    /// unparsable values leave the bound as is.
    pub fn with_date_bounds(mut self, after: &str, before: &str) -> Self {
        if let Ok(at) = DateTime::parse_from_rfc3339(after) {
            let at = at.with_timezone(&Utc);
            self.modified_after = Some(self.modified_after.map_or(at, |cur| cur.max(at)));
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(before) {
            let at = at.with_timezone(&Utc);
            self.modified_before = Some(self.modified_before.map_or(at, |cur| cur.min(at)));
        }
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        let name = entry.name.to_lowercase();
        if !self.terms.iter().all(|term| name.contains(term.as_str())) {
            return false;
        }

        if !self.extensions.is_empty() {
            let Some((_, ext)) = name.rsplit_once('.') else {
                return false;
            };
            if entry.is_dir || !self.extensions.iter().any(|wanted| wanted == ext) {
                return false;
            }
        }

        if self.min_size.is_some() || self.max_size.is_some() {
            if entry.is_dir {
                return false;
            }
            if self.min_size.is_some_and(|min| entry.size < min) {
                return false;
            }
            if self.max_size.is_some_and(|max| entry.size > max) {
                return false;
            }
        }

        if self.modified_after.is_some_and(|after| entry.modified_at < after) {
            return false;
        }
        if self.modified_before.is_some_and(|before| entry.modified_at > before) {
            return false;
        }

        true
    }

    fn apply_size(&mut self, cond: &str) -> Result<(), ParseError> {
        let invalid = || ParseError::InvalidSize(cond.to_string());

        let op_len = cond
            .find(|c: char| !matches!(c, '<' | '>' | '='))
            .ok_or_else(invalid)?;
        let (op, rest) = cond.split_at(op_len);
        let digits_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, unit) = rest.split_at(digits_len);

        let value: f64 = number.parse().map_err(|_| invalid())?;
        let multiplier = unit_multiplier(unit).ok_or_else(invalid)?;
        let size = (value * multiplier as f64) as u64;

        match op {
            ">=" => self.min_size = Some(size),
            ">" => self.min_size = Some(size.saturating_add(1)),
            "<=" => self.max_size = Some(size),
            "<" => self.max_size = Some(size.saturating_sub(1)),
            "=" => {
                self.min_size = Some(size);
                self.max_size = Some(size);
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }

    fn apply_date(&mut self, cond: &str) -> Result<(), ParseError> {
        let invalid = || ParseError::InvalidDate(cond.to_string());
        let (is_lower, raw) = if let Some(raw) = cond.strip_prefix(">=") {
            (true, raw)
        } else if let Some(raw) = cond.strip_prefix("<=") {
            (false, raw)
        } else {
            return Err(invalid());
        };

        let at = DateTime::parse_from_rfc3339(raw)
            .map_err(|_| invalid())?
            .with_timezone(&Utc);
        if is_lower {
            self.modified_after = Some(at);
        } else {
            self.modified_before = Some(at);
        }
        Ok(())
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let unit = unit.strip_suffix('b').unwrap_or(unit);
    let shift = match unit {
        "" => 0,
        "k" => 10,
        "m" => 20,
        "g" => 30,
        "t" => 40,
        _ => return None,
    };
    Some(1u64 << shift)
}
