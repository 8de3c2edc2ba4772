//! Predicates deciding which search handler receives a query.

use std::time::Duration;

use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::query::{Query, QueryData, RegexMatch};

/// How a restriction tests the search text.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Matches every query.
    Any,

    /// Matches when the search equals `text`.
    EqualTo {
        /// Text to compare against.
        text: String,
        /// Compare case-sensitively.
        case_sensitive: bool,
    },

    /// Matches when the search starts with `prefix` and the rest of the
    /// search has an acceptable length.
    StartsWith {
        /// Required prefix; stripped from the handler's view.
        prefix: String,
        /// Compare case-sensitively.
        case_sensitive: bool,
        /// Smallest accepted length of the remaining search, in characters.
        min_length: Option<usize>,
        /// Largest accepted length of the remaining search, in characters.
        max_length: Option<usize>,
    },

    /// Matches when the pattern finds a match in the search.
    Regex(Regex),
}

/// A matcher plus an optional debounce delay.
///
/// # Examples
///
/// ```
/// use flow_plugin::query::QueryData;
/// use flow_plugin::restriction::Restriction;
///
/// let restriction = Restriction::starts_with("greet ").max_length(20);
/// let data = QueryData { search: "Greet Sam".to_string(), ..QueryData::default() };
///
/// let query = restriction.evaluate(&data).expect("prefix matches");
/// assert_eq!(query.search(), "Sam");
/// ```
#[derive(Debug, Clone)]
pub struct Restriction {
    matcher: Matcher,
    debounce: Option<Duration>,
}

impl Default for Restriction {
    fn default() -> Self {
        Self::none()
    }
}

impl Restriction {
    /// A catch-all restriction.
    #[must_use]
    pub fn none() -> Self {
        Self {
            matcher: Matcher::Any,
            debounce: None,
        }
    }

    /// Matches a search equal to `text`, ignoring case.
    #[must_use]
    pub fn equal_to(text: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::EqualTo {
                text: text.into(),
                case_sensitive: false,
            },
            debounce: None,
        }
    }

    /// Matches a search starting with `prefix`, ignoring case.
    #[must_use]
    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::StartsWith {
                prefix: prefix.into(),
                case_sensitive: false,
                min_length: None,
                max_length: None,
            },
            debounce: None,
        }
    }

    /// Matches a search the case-insensitive `pattern` finds a match in.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn regex(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self::from_regex(regex))
    }

    /// Matches with a pre-built regex, flags and all.
    #[must_use]
    pub fn from_regex(regex: Regex) -> Self {
        Self {
            matcher: Matcher::Regex(regex),
            debounce: None,
        }
    }

    /// Makes text comparison case-sensitive. Has no effect on catch-all and
    /// regex restrictions.
    #[must_use]
    pub fn case_sensitive(mut self, sensitive: bool) -> Self {
        match &mut self.matcher {
            Matcher::EqualTo { case_sensitive, .. } | Matcher::StartsWith { case_sensitive, .. } => {
                *case_sensitive = sensitive;
            }
            Matcher::Any | Matcher::Regex(_) => {}
        }
        self
    }

    /// Sets the minimum remaining length of a prefix restriction.
    #[must_use]
    pub fn min_length(mut self, length: usize) -> Self {
        if let Matcher::StartsWith { min_length, .. } = &mut self.matcher {
            *min_length = Some(length);
        }
        self
    }

    /// Sets the maximum remaining length of a prefix restriction.
    #[must_use]
    pub fn max_length(mut self, length: usize) -> Self {
        if let Matcher::StartsWith { max_length, .. } = &mut self.matcher {
            *max_length = Some(length);
        }
        self
    }

    /// Waits `delay` before running the handler, dropping the query if a
    /// newer one arrives meanwhile.
    #[must_use]
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// The matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The debounce delay, if any.
    #[must_use]
    pub fn debounce_delay(&self) -> Option<Duration> {
        self.debounce
    }

    /// Tests `data`, returning the handler's view of the query on a match.
    #[must_use]
    pub fn evaluate(&self, data: &QueryData) -> Option<Query> {
        match &self.matcher {
            Matcher::Any => Some(Query::derive(data, 0)),
            Matcher::EqualTo {
                text,
                case_sensitive,
            } => {
                let equal = if *case_sensitive {
                    data.search == *text
                } else {
                    data.search.to_lowercase() == text.to_lowercase()
                };
                equal.then(|| Query::derive(data, data.search.chars().count()))
            }
            Matcher::StartsWith {
                prefix,
                case_sensitive,
                min_length,
                max_length,
            } => {
                let matched = matched_prefix_len(&data.search, prefix, *case_sensitive)?;
                let query = Query::derive(data, matched);
                let remaining = query.search().chars().count();
                if min_length.is_some_and(|min| remaining < min)
                    || max_length.is_some_and(|max| remaining > max)
                {
                    return None;
                }
                Some(query)
            }
            Matcher::Regex(regex) => {
                let captures = regex.captures(&data.search)?;
                let found = RegexMatch::from_captures(regex, &captures);
                Some(Query::with_match(data, found))
            }
        }
    }
}

/// Returns how many characters of `search` the prefix covers, or `None`
/// when `search` does not start with it. Case folding can change the length,
/// so the count is taken from `search` rather than from `prefix`.
fn matched_prefix_len(search: &str, prefix: &str, case_sensitive: bool) -> Option<usize> {
    if case_sensitive {
        return search
            .starts_with(prefix)
            .then(|| prefix.chars().count());
    }

    let target: String = prefix.chars().flat_map(char::to_lowercase).collect();
    if target.is_empty() {
        return Some(0);
    }
    let mut folded = String::with_capacity(target.len());
    for (count, c) in search.chars().enumerate() {
        folded.extend(c.to_lowercase());
        if folded == target {
            return Some(count + 1);
        }
        if !target.starts_with(folded.as_str()) {
            return None;
        }
    }
    None
}
