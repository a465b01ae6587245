// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword/regex rule engine.

use async_trait::async_trait;
use dashmap::DashMap;
use herald_core::{HeadlineDraft, HeadlineScorer, Importance, ImportanceParams, RuleField};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Scores `base_weight + sum(boost of every matching rule)`, clamped to `[0, 1]`.
///
/// Patterns are case-insensitive and compiled once per distinct pattern.
#[derive(Default)]
pub struct RuleScorer {
    compiled: DashMap<String, Option<Regex>>,
}

impl RuleScorer {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(&self, pattern: &str, text: &str) -> bool {
        if let Some(cached) = self.compiled.get(pattern) {
            return cached.as_ref().is_some_and(|re| re.is_match(text));
        }
        let compiled = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                debug!(pattern, error = %e, "skipping rule with invalid pattern");
                None
            }
        };
        let matched = compiled.as_ref().is_some_and(|re| re.is_match(text));
        self.compiled.insert(pattern.to_string(), compiled);
        matched
    }

    /// Synchronous scoring, also used as the LLM fallback.
    pub fn evaluate(&self, draft: &HeadlineDraft, params: &ImportanceParams) -> Importance {
        let description = draft.description.as_deref().unwrap_or("");
        let mut score = params.base_weight;
        let mut matched = Vec::new();

        for rule in &params.rules {
            let hit = match rule.field {
                RuleField::Title => self.matches(&rule.pattern, &draft.title),
                RuleField::Description => self.matches(&rule.pattern, description),
                RuleField::Any => {
                    self.matches(&rule.pattern, &draft.title)
                        || self.matches(&rule.pattern, description)
                }
            };
            if hit {
                score += rule.boost;
                matched.push(format!("{} ({:+.2})", rule.pattern, rule.boost));
            }
        }

        let rationale = (!matched.is_empty()).then(|| format!("rules matched: {}", matched.join(", ")));
        Importance::new(score, rationale)
    }
}

#[async_trait]
impl HeadlineScorer for RuleScorer {
    async fn score(&self, draft: &HeadlineDraft, params: &ImportanceParams) -> Importance {
        self.evaluate(draft, params)
    }
}
