//! # Filter Predicate
//!
//! Decides, for one record, whether it is emitted:
//!
//! 1. text match: name, then description when the scope includes it
//! 2. reverse: invert the text-match boolean
//! 3. state gate: the install-state filter, never touched by reverse
//!
//! The final rule is [`pkq_core::emit_decision`].

use pkq_core::{emit_decision, InstallStateFilter, PackageRecord};
use serde::{Deserialize, Serialize};

use crate::pattern::CompiledMatcher;

/// Which record fields the matcher looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    NamesOnly,
    #[default]
    NamesAndDescriptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Name,
    Description,
}

/// The text that made a record match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMatch {
    pub field: MatchField,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Emit the record. Carries the matched text, which is `None` for
    /// reverse searches (nothing matched).
    Emit(Option<TextMatch>),
    Reject,
}

impl Verdict {
    #[inline]
    pub fn is_emit(&self) -> bool {
        matches!(self, Self::Emit(_))
    }
}

#[derive(Debug, Clone)]
pub struct FilterPredicate {
    matcher: CompiledMatcher,
    scope: Scope,
    state_filter: InstallStateFilter,
    reverse: bool,
}

impl FilterPredicate {
    pub fn new(
        matcher: CompiledMatcher,
        scope: Scope,
        state_filter: InstallStateFilter,
        reverse: bool,
    ) -> Self {
        Self {
            matcher,
            scope,
            state_filter,
            reverse,
        }
    }

    pub fn matcher(&self) -> &CompiledMatcher {
        &self.matcher
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn state_filter(&self) -> InstallStateFilter {
        self.state_filter
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Match-only evaluation: no reverse, no state gate.
    pub fn text_match(&self, record: &PackageRecord) -> Option<TextMatch> {
        if let Some(text) = self.matcher.find(&record.name) {
            return Some(TextMatch {
                field: MatchField::Name,
                text: text.to_string(),
            });
        }
        if self.scope == Scope::NamesOnly || record.description.is_empty() {
            return None;
        }
        self.matcher.find(&record.description).map(|text| TextMatch {
            field: MatchField::Description,
            text: text.to_string(),
        })
    }

    pub fn evaluate(&self, record: &PackageRecord) -> Verdict {
        let state_accepted = self.state_filter.accepts(record.install_state);
        if !state_accepted {
            return Verdict::Reject;
        }

        let found = self.text_match(record);
        if !emit_decision(state_accepted, found.is_some(), self.reverse) {
            return Verdict::Reject;
        }
        Verdict::Emit(if self.reverse { None } else { found })
    }

    #[inline]
    pub fn accepts(&self, record: &PackageRecord) -> bool {
        self.evaluate(record).is_emit()
    }
}
