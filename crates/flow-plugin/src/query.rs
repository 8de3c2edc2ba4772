//! Inbound query data and the per-handler view derived from it.

use std::collections::HashMap;
use std::ops::Range;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Query parameters exactly as the host sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    /// The full text typed by the user, action keyword included.
    #[serde(default)]
    pub raw_query: String,

    /// `true` when the host re-issues a query the user already ran.
    #[serde(default)]
    pub is_re_query: bool,

    /// The text after the action keyword.
    #[serde(default)]
    pub search: String,

    /// `search` split into terms by the host.
    #[serde(default)]
    pub search_terms: Vec<String>,

    /// The action keyword that selected this plugin, or empty.
    #[serde(default)]
    pub action_keyword: String,
}

/// The query as seen by the handler a restriction selected.
///
/// For prefix restrictions the matched prefix is stripped from
/// [`search`](Self::search); for regex restrictions the match itself is
/// available through [`regex_match`](Self::regex_match).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    raw: String,
    is_requery: bool,
    search: String,
    terms: Vec<String>,
    action_keyword: String,
    regex_match: Option<RegexMatch>,
}

impl Query {
    /// Derives a view with the first `offset` characters of the search
    /// removed and surrounding whitespace trimmed.
    #[must_use]
    pub fn derive(data: &QueryData, offset: usize) -> Self {
        let search: String = data.search.chars().skip(offset).collect();
        let search = search.trim().to_string();
        let terms = search.split_whitespace().map(str::to_string).collect();
        Self {
            raw: data.raw_query.clone(),
            is_requery: data.is_re_query,
            search,
            terms,
            action_keyword: data.action_keyword.clone(),
            regex_match: None,
        }
    }

    /// Derives a view carrying a regex match. The search text is kept whole.
    #[must_use]
    pub fn with_match(data: &QueryData, regex_match: RegexMatch) -> Self {
        Self {
            regex_match: Some(regex_match),
            ..Self::derive(data, 0)
        }
    }

    /// The full raw query.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the host re-issued this query.
    #[must_use]
    pub fn is_requery(&self) -> bool {
        self.is_requery
    }

    /// The trimmed search text, prefix removed.
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Whitespace-separated terms of [`search`](Self::search).
    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// The action keyword, or empty.
    #[must_use]
    pub fn action_keyword(&self) -> &str {
        &self.action_keyword
    }

    /// The regex match, when a regex restriction selected the handler.
    #[must_use]
    pub fn regex_match(&self) -> Option<&RegexMatch> {
        self.regex_match.as_ref()
    }
}

/// An owned regex match with its capture groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    range: Range<usize>,
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl RegexMatch {
    /// Copies the groups out of `captures`, produced by `regex`.
    #[must_use]
    pub fn from_captures(regex: &Regex, captures: &Captures<'_>) -> Self {
        let range = captures.get(0).map_or(0..0, |m| m.range());
        let groups = captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Self {
            range,
            groups,
            named,
        }
    }

    /// The whole matched text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    /// Byte range of the match within the search text.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Numbered group `index`; group 0 is the whole match. `None` if the
    /// group does not exist or did not participate.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// Named group `name`, if it participated in the match.
    #[must_use]
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Number of groups, the whole match included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Always `false`; a match has at least group 0.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn data(search: &str) -> QueryData {
        QueryData {
            raw_query: format!("fp {search}"),
            search: search.to_string(),
            action_keyword: "fp".to_string(),
            ..QueryData::default()
        }
    }

    #[test]
    fn host_payload_deserializes() {
        let value = serde_json::json!({
            "rawQuery": "fp hi there",
            "isReQuery": true,
            "search": "hi there",
            "searchTerms": ["hi", "there"],
            "actionKeyword": "fp"
        });
        let parsed: QueryData = serde_json::from_value(value).unwrap();
        assert!(parsed.is_re_query);
        assert_eq!(parsed.search_terms, vec!["hi", "there"]);
    }

    #[rstest]
    #[case::no_offset("hi there", 0, "hi there")]
    #[case::prefix("hi there", 2, "there")]
    #[case::trims("  padded  ", 0, "padded")]
    #[case::past_end("ab", 5, "")]
    #[case::multibyte("héllo wörld", 6, "wörld")]
    fn derive_strips_offset_and_trims(#[case] search: &str, #[case] offset: usize, #[case] expected: &str) {
        let query = Query::derive(&data(search), offset);
        assert_eq!(query.search(), expected);
        assert_eq!(query.raw(), format!("fp {search}"));
    }

    #[test]
    fn terms_follow_the_stripped_search() {
        let query = Query::derive(&data("greet  Sam   Jones"), 6);
        assert_eq!(query.terms(), ["Sam", "Jones"]);
    }

    #[test]
    fn regex_match_exposes_groups() {
        let regex = Regex::new(r"^add (?<a>\d+) (\d+)?(x)?").unwrap();
        let captures = regex.captures("add 2 3").unwrap();
        let found = RegexMatch::from_captures(&regex, &captures);

        assert_eq!(found.as_str(), "add 2 3");
        assert_eq!(found.name("a"), Some("2"));
        assert_eq!(found.get(2), Some("3"));
        assert_eq!(found.get(3), None);
        assert_eq!(found.get(9), None);
        assert_eq!(found.len(), 4);
        assert_eq!(found.range(), 0..7);
    }
}
