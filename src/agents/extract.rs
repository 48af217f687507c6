//! Parsing of orchestrator output: completion marker and embedded search query

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ExtractionError;

/// Phrase the orchestrator opens with once the objective is met
pub const COMPLETION_MARKER: &str = "The task is complete:";

/// JSON key carrying the search question
pub const SEARCH_QUERY_KEY: &str = "search_query";

/// Greedy: first `{` through last `}`, across lines
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));

/// Markdown decoration tolerated ahead of the marker
const LEADING_DECORATION: &[char] = &['*', '_', '#', '>'];

/// The marker must start within this many bytes of the first real character
pub const MARKER_WINDOW: usize = 200;

fn strip_leading_decoration(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || LEADING_DECORATION.contains(&c))
}

/// Byte offset of the marker in `response`, if it starts near the beginning
fn find_marker(response: &str) -> Option<usize> {
    let text = strip_leading_decoration(response);
    let skipped = response.len() - text.len();
    text.find(COMPLETION_MARKER)
        .filter(|&at| at <= MARKER_WINDOW)
        .map(|at| skipped + at)
}

/// True if the completion marker (case-sensitive) appears near the start
pub fn is_complete(response: &str) -> bool {
    find_marker(response).is_some()
}

/// Text following the marker, trimmed. `None` if the marker is absent.
pub fn completion_remainder(response: &str) -> Option<&str> {
    let at = find_marker(response)?;
    let rest = &response[at + COMPLETION_MARKER.len()..];
    Some(rest.trim_start_matches(LEADING_DECORATION).trim())
}

/// A search query pulled out of orchestrator output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedQuery {
    pub query: String,
    /// The response with the JSON fragment removed
    pub remaining: String,
}

/// Find the brace-delimited JSON fragment and read its `search_query`.
///
/// `Ok(None)` when no fragment is present. On error the caller keeps the
/// original text untouched.
pub fn extract_search_query(response: &str) -> Result<Option<ExtractedQuery>, ExtractionError> {
    let Some(found) = JSON_OBJECT.find(response) else {
        return Ok(None);
    };
    let fragment = found.as_str();

    let value: Value = serde_json::from_str(fragment).map_err(ExtractionError::InvalidJson)?;
    let query = match value.get(SEARCH_QUERY_KEY) {
        None => return Err(ExtractionError::MissingKey),
        Some(Value::String(q)) => q.clone(),
        Some(_) => return Err(ExtractionError::NotAString),
    };

    let remaining = response.replacen(fragment, "", 1).trim().to_string();
    Ok(Some(ExtractedQuery { query, remaining }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_complete_at_start() {
        assert!(is_complete("The task is complete: all done"));
        assert!(is_complete("\n  The task is complete: all done"));
        assert!(is_complete("**The task is complete:** summary"));
    }

    #[test]
    fn test_is_complete_is_case_sensitive() {
        assert!(!is_complete("the task is complete: lowercase"));
        assert!(!is_complete("Next sub-task: write tests"));
    }

    #[test]
    fn test_is_complete_after_short_preamble() {
        assert!(is_complete("Assessment:\nThe task is complete: nothing left"));
        assert!(is_complete("After reviewing the results, The task is complete: nothing left"));
    }

    #[test]
    fn test_marker_window() {
        let at_edge = format!("{} The task is complete: done", "x".repeat(MARKER_WINDOW - 1));
        let past_edge = format!("{} The task is complete: done", "x".repeat(MARKER_WINDOW));
        assert!(is_complete(&at_edge));
        assert!(!is_complete(&past_edge));
        assert_eq!(completion_remainder(&past_edge), None);
    }

    #[test]
    fn test_completion_remainder() {
        assert_eq!(completion_remainder("The task is complete: ship it"), Some("ship it"));
        assert_eq!(completion_remainder("**The task is complete:** ship it"), Some("ship it"));
        assert_eq!(completion_remainder("The task is complete:"), Some(""));
        assert_eq!(completion_remainder("keep going"), None);
        assert_eq!(
            completion_remainder("Assessment:\n**The task is complete:** ship it"),
            Some("ship it")
        );
    }

    #[test]
    fn test_extract_embedded_query() {
        let response = "Next, research the API.\n{\"search_query\": \"tavily python client usage\"}\nThen write code.";
        let extracted = extract_search_query(response).unwrap().unwrap();
        assert_eq!(extracted.query, "tavily python client usage");
        assert_eq!(extracted.remaining, "Next, research the API.\n\nThen write code.");
        assert!(!extracted.remaining.contains("search_query"));
    }

    #[test]
    fn test_extract_ignores_extra_keys() {
        let extracted = extract_search_query(r#"{"search_query": "x", "note": "y"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(extracted.query, "x");
        assert_eq!(extracted.remaining, "");
    }

    #[test]
    fn test_extract_absent() {
        assert_eq!(extract_search_query("No JSON here at all").unwrap(), None);
    }

    #[test]
    fn test_extract_malformed() {
        let err = extract_search_query("prompt {\"search_query\": oops} more").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson(_)));
    }

    #[test]
    fn test_extract_greedy_spans_two_objects() {
        // Two objects with prose between them do not form one JSON value
        let err = extract_search_query(r#"{"search_query": "a"} and {"b": 1}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson(_)));
    }

    #[test]
    fn test_extract_missing_key() {
        let err = extract_search_query(r#"text {"query": "x"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingKey));
    }

    #[test]
    fn test_extract_non_string_query() {
        let err = extract_search_query(r#"{"search_query": 42}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::NotAString));
    }
}
