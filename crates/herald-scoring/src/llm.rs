// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM importance scoring with rule-based fallback.

use std::sync::Arc;

use async_trait::async_trait;
use herald_config::model::ScorerConfig;
use herald_core::{
    GenerationOptions, HeadlineDraft, HeadlineScorer, Importance, ImportanceParams, TextGenerator,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::rules::RuleScorer;

/// Longest description excerpt included in a prompt.
const DESCRIPTION_EXCERPT: usize = 600;

#[derive(Debug, Deserialize)]
struct Verdict {
    score: f64,
    #[serde(default, alias = "rationale")]
    reason: Option<String>,
}

/// Scores headlines with a text generator; never fails.
pub struct LlmScorer {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    fallback: RuleScorer,
}

impl LlmScorer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &ScorerConfig) -> Self {
        Self {
            generator,
            options: GenerationOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            fallback: RuleScorer::new(),
        }
    }

    fn fall_back(&self, draft: &HeadlineDraft, params: &ImportanceParams, cause: &str) -> Importance {
        let rules = self.fallback.evaluate(draft, params);
        let rationale = match rules.rationale {
            Some(r) => format!("llm unavailable ({cause}); {r}"),
            None => format!("llm unavailable ({cause}); base weight"),
        };
        Importance::new(rules.score, Some(rationale))
    }
}

fn build_prompt(draft: &HeadlineDraft) -> String {
    let mut prompt = String::from(
        "Rate how important the following news headline is for a general reader.\n\
         Respond with JSON only: {\"score\": <number between 0 and 1>, \"reason\": \"<one sentence>\"}.\n\n",
    );
    prompt.push_str(&format!("Title: {}\n", draft.title));
    if let Some(category) = &draft.category {
        prompt.push_str(&format!("Category: {category}\n"));
    }
    if let Some(description) = &draft.description {
        let excerpt: String = description.chars().take(DESCRIPTION_EXCERPT).collect();
        prompt.push_str(&format!("Summary: {excerpt}\n"));
    }
    prompt
}

/// Extract a verdict from a reply: a JSON object (possibly wrapped in prose or
/// a code fence) or a bare number. Scores outside `[0, 1]` are rejected.
fn parse_verdict(reply: &str) -> Option<Verdict> {
    let trimmed = reply.trim();
    let verdict = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Verdict>(&trimmed[start..=end]).ok()?
        }
        _ => Verdict {
            score: trimmed.parse().ok()?,
            reason: None,
        },
    };
    (verdict.score.is_finite() && (0.0..=1.0).contains(&verdict.score)).then_some(verdict)
}

#[async_trait]
impl HeadlineScorer for LlmScorer {
    async fn score(&self, draft: &HeadlineDraft, params: &ImportanceParams) -> Importance {
        let reply = match self
            .generator
            .generate_text(&build_prompt(draft), &self.options)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "llm scoring failed; using rules");
                return self.fall_back(draft, params, "generator error");
            }
        };

        match parse_verdict(&reply) {
            Some(verdict) => {
                debug!(score = verdict.score, "llm verdict");
                let rationale = verdict
                    .reason
                    .filter(|r| !r.trim().is_empty())
                    .map_or_else(|| "llm".to_string(), |r| format!("llm: {}", r.trim()));
                Importance::new(verdict.score, Some(rationale))
            }
            None => {
                warn!(reply_chars = reply.len(), "unusable llm reply; using rules");
                self.fall_back(draft, params, "unusable reply")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{ImportanceRule, RuleField};
    use herald_test_utils::MockGenerator;

    fn params() -> ImportanceParams {
        ImportanceParams {
            base_weight: 0.4,
            threshold: 0.7,
            rules: vec![ImportanceRule {
                pattern: "outage".into(),
                boost: 0.3,
                field: RuleField::Any,
            }],
        }
    }

    fn scorer(generator: Arc<MockGenerator>) -> LlmScorer {
        LlmScorer::new(generator, &ScorerConfig::default())
    }

    #[test]
    fn verdict_parsing() {
        assert_eq!(parse_verdict(r#"{"score": 0.8, "reason": "big"}"#).unwrap().score, 0.8);
        let fenced = "```json\n{\"score\": 0.25, \"rationale\": \"minor\"}\n```";
        let verdict = parse_verdict(fenced).unwrap();
        assert_eq!(verdict.score, 0.25);
        assert_eq!(verdict.reason.as_deref(), Some("minor"));
        assert_eq!(parse_verdict(" 0.6 ").unwrap().score, 0.6);
        assert!(parse_verdict(r#"{"score": 7}"#).is_none());
        assert!(parse_verdict("very important").is_none());
    }

    #[tokio::test]
    async fn uses_the_llm_verdict() {
        let generator = Arc::new(MockGenerator::with_replies(vec![
            r#"{"score": 0.9, "reason": "Major outage"}"#,
        ]));
        let importance = scorer(generator.clone())
            .score(&HeadlineDraft::new("Cloud outage"), &params())
            .await;
        assert_eq!(importance.score, 0.9);
        assert_eq!(importance.rationale.as_deref(), Some("llm: Major outage"));
        assert!(generator.prompts()[0].contains("Title: Cloud outage"));
    }

    #[tokio::test]
    async fn generator_failure_falls_back_to_rules() {
        let generator = Arc::new(MockGenerator::new());
        generator.push_failure("connection refused");
        let importance = scorer(generator)
            .score(&HeadlineDraft::new("Cloud outage"), &params())
            .await;
        assert!((importance.score - 0.7).abs() < 1e-9);
        assert!(importance.rationale.unwrap().starts_with("llm unavailable (generator error)"));
    }

    #[tokio::test]
    async fn unusable_reply_falls_back_to_rules() {
        let generator = Arc::new(MockGenerator::with_replies(vec!["I think it matters"]));
        let importance = scorer(generator)
            .score(&HeadlineDraft::new("Quiet day"), &params())
            .await;
        assert_eq!(importance.score, 0.4);
        assert_eq!(
            importance.rationale.as_deref(),
            Some("llm unavailable (unusable reply); base weight")
        );
    }
}
