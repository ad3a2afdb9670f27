//! # Pattern Compiler
//!
//! Joins one or more user fragments into a single [`CompiledMatcher`].
//!
//! ```text
//! any          vim nano        → (?:vim)|(?:nano)
//! all-ordered  py dev          → (?:py)(?s:.*?)(?:dev)
//! --dev        lib$            → (?:(?:lib)).+dev$
//! ```
//!
//! Every fragment is compiled on its own first, so a syntax error names the
//! one fragment that caused it. A fragment that compiles alone is a complete
//! expression, and wrapping it in a non-capturing group keeps its meaning
//! when it is joined with the others.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::SearchError;

/// How several fragments combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Match if any fragment matches.
    #[default]
    Any,
    /// Match if all fragments are found in the given order, with anything
    /// (including newlines) between them.
    AllOrdered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    pub join: JoinMode,
    pub ignore_case: bool,
    /// Treat fragments as literal text.
    pub fixed_strings: bool,
    /// Require at least one more character and then `dev` after the query.
    pub dev_only: bool,
}

/// An immutable matcher built once per search.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    regex: Regex,
    fragments: usize,
}

impl CompiledMatcher {
    /// The composed expression, for status lines and logs.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Number of user fragments joined into this matcher.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// The leftmost matching slice of `text`.
    #[inline]
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex.find(text).map(|m| m.as_str())
    }
}

/// Compile `patterns` into one matcher.
///
/// Fails with [`SearchError::InvalidPattern`] when the list is empty or any
/// fragment is not a valid expression. An empty fragment is valid and
/// matches everything.
pub fn compile<P: AsRef<str>>(
    patterns: &[P],
    options: &PatternOptions,
) -> Result<CompiledMatcher, SearchError> {
    if patterns.is_empty() {
        return Err(SearchError::InvalidPattern {
            pattern: String::new(),
            reason: "no search pattern given".to_string(),
        });
    }

    let mut sources: Vec<String> = Vec::with_capacity(patterns.len());
    for raw in patterns {
        let raw = raw.as_ref();
        let source = if options.fixed_strings {
            regex::escape(raw)
        } else {
            raw.to_string()
        };
        build(&source, options.ignore_case).map_err(|e| SearchError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;
        sources.push(source);
    }

    // `--dev` appends to the whole query; an end anchor on the last fragment
    // has to move past the suffix or nothing could ever match.
    let mut anchor = "";
    if options.dev_only && !options.fixed_strings {
        if let Some(last) = sources.last_mut() {
            if ends_with_unescaped_dollar(last) {
                last.pop();
                anchor = "$";
            }
        }
    }

    let groups: Vec<String> = sources.iter().map(|s| format!("(?:{})", s)).collect();
    let gap = match options.join {
        JoinMode::Any => "|",
        JoinMode::AllOrdered => "(?s:.*?)",
    };
    let mut composed = groups.join(gap);
    if options.dev_only {
        composed = format!("(?:{}).+dev{}", composed, anchor);
    }

    let regex = build(&composed, options.ignore_case).map_err(|e| SearchError::InvalidPattern {
        pattern: composed.clone(),
        reason: e.to_string(),
    })?;

    Ok(CompiledMatcher {
        regex,
        fragments: patterns.len(),
    })
}

fn build(source: &str, ignore_case: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source)
        .case_insensitive(ignore_case)
        .build()
}

/// `foo$` yes, `foo\$` no, `foo\\$` yes.
fn ends_with_unescaped_dollar(s: &str) -> bool {
    let Some(body) = s.strip_suffix('$') else {
        return false;
    };
    let slashes = body.bytes().rev().take_while(|&b| b == b'\\').count();
    slashes % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(patterns: &[&str]) -> CompiledMatcher {
        compile(patterns, &PatternOptions::default()).unwrap()
    }

    fn ordered(patterns: &[&str]) -> CompiledMatcher {
        compile(
            patterns,
            &PatternOptions {
                join: JoinMode::AllOrdered,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_single_pattern_is_substring_search() {
        let m = any(&["vim"]);
        assert!(m.is_match("vim"));
        assert!(m.is_match("neovim-qt"));
        assert!(!m.is_match("emacs"));
        assert_eq!(m.fragment_count(), 1);
    }

    #[test]
    fn test_join_mode_irrelevant_for_single_pattern() {
        for text in ["vim", "gvim", "nano"] {
            assert_eq!(any(&["vim"]).is_match(text), ordered(&["vim"]).is_match(text));
        }
    }

    #[test]
    fn test_any_mode_alternates() {
        let m = any(&["foo", "bar"]);
        assert!(m.is_match("foobar"));
        assert!(m.is_match("baronly"));
        assert!(!m.is_match("qux"));
    }

    #[test]
    fn test_all_ordered_requires_order() {
        let m = ordered(&["py", "dev"]);
        assert!(m.is_match("python3-dev"));
        assert!(!m.is_match("devpython"));
    }

    #[test]
    fn test_all_ordered_allows_empty_gap_and_newlines() {
        let m = ordered(&["foo", "bar"]);
        assert!(m.is_match("foobar"));
        assert!(m.is_match("foo\nsomething\nbar"));
        assert!(!m.is_match("barfoo"));
    }

    #[test]
    fn test_alternation_inside_fragment_stays_grouped() {
        // Without grouping this would read as `a|b.*?c`.
        let m = ordered(&["a|b", "c"]);
        assert!(!m.is_match("a"));
        assert!(m.is_match("ac"));
        assert!(m.is_match("b-c"));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let m = any(&[""]);
        assert!(m.is_match(""));
        assert!(m.is_match("anything"));
    }

    #[test]
    fn test_ignore_case_applies_to_every_fragment() {
        let m = compile(
            &["PY", "Dev"],
            &PatternOptions {
                join: JoinMode::AllOrdered,
                ignore_case: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(m.is_match("python3-DEV"));
        assert!(m.is_match("PYTHON3-dev"));
    }

    #[test]
    fn test_case_sensitive_by_default() {
        assert!(!any(&["VIM"]).is_match("vim"));
    }

    #[test]
    fn test_invalid_fragment_is_named() {
        let err = compile(&["ok", "(unclosed"], &PatternOptions::default()).unwrap_err();
        match err {
            SearchError::InvalidPattern { pattern, reason } => {
                assert_eq!(pattern, "(unclosed");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_pattern_list_is_rejected() {
        let none: [&str; 0] = [];
        assert!(matches!(
            compile(&none, &PatternOptions::default()),
            Err(SearchError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_fixed_strings_escape_metacharacters() {
        let m = compile(
            &["g++"],
            &PatternOptions {
                fixed_strings: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(m.is_match("g++-12"));
        assert!(!m.is_match("gg"));

        // Would be a syntax error as a regex.
        assert!(compile(
            &["(unclosed"],
            &PatternOptions {
                fixed_strings: true,
                ..Default::default()
            }
        )
        .is_ok());
    }

    #[test]
    fn test_dev_only_requires_dev_after_query() {
        let m = compile(
            &["libssl"],
            &PatternOptions {
                dev_only: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(m.is_match("libssl-dev"));
        assert!(!m.is_match("libssl3"));
        assert!(!m.is_match("libssldev"));
    }

    #[test]
    fn test_dev_only_keeps_end_anchor_last() {
        let m = compile(
            &["libssl$"],
            &PatternOptions {
                dev_only: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(m.as_str().ends_with("dev$"));
        assert!(m.is_match("libssl-dev"));
        assert!(!m.is_match("libssl-dev-doc"));
    }

    #[test]
    fn test_dev_only_applies_to_every_alternative() {
        let m = compile(
            &["libssl", "libcurl"],
            &PatternOptions {
                dev_only: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(m.is_match("libcurl4-openssl-dev"));
        assert!(!m.is_match("libssl3"));
        assert!(!m.is_match("libcurl4"));
    }

    #[test]
    fn test_find_returns_matched_slice() {
        assert_eq!(any(&["v.m"]).find("neovim"), Some("vim"));
        assert_eq!(ordered(&["py", "dev"]).find("python3-dev"), Some("python3-dev"));
        assert_eq!(any(&["zzz"]).find("vim"), None);
    }

    #[test]
    fn test_unescaped_dollar_detection() {
        assert!(ends_with_unescaped_dollar("foo$"));
        assert!(!ends_with_unescaped_dollar(r"foo\$"));
        assert!(ends_with_unescaped_dollar(r"foo\\$"));
        assert!(!ends_with_unescaped_dollar("foo"));
    }
}
