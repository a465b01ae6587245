// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Importance scoring for Herald headlines.
//!
//! [`RuleScorer`] applies keyword/regex boosts on top of a base weight.
//! [`LlmScorer`] asks a [`TextGenerator`](herald_core::TextGenerator) for a
//! score and falls back to the rules whenever the generator fails or answers
//! with something unusable.

pub mod generator;
pub mod llm;
pub mod rules;

use std::sync::Arc;

use herald_config::model::{ScorerConfig, ScorerMode};
use herald_core::{HeadlineScorer, HeraldError};
use tracing::info;

pub use generator::OpenAiCompatibleGenerator;
pub use llm::LlmScorer;
pub use rules::RuleScorer;

/// Build the scorer selected by `[scorer] mode`.
pub fn build_scorer(config: &ScorerConfig) -> Result<Arc<dyn HeadlineScorer>, HeraldError> {
    match config.mode {
        ScorerMode::Rules => {
            info!(mode = "rules", "importance scorer ready");
            Ok(Arc::new(RuleScorer::new()))
        }
        ScorerMode::Llm => {
            let generator = OpenAiCompatibleGenerator::from_config(config)?;
            info!(mode = "llm", endpoint = %config.endpoint, model = %config.model, "importance scorer ready");
            Ok(Arc::new(LlmScorer::new(Arc::new(generator), config)))
        }
    }
}
