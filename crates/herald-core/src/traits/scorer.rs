// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Importance scoring seams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HeraldError;
use crate::types::{HeadlineDraft, Importance, ImportanceParams};

/// Sampling parameters passed to a text generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 256,
        }
    }
}

/// A text-generation service (LLM) consumed by the importance scorer.
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, HeraldError>;
}

/// Computes the importance of a headline draft.
///
/// Scoring never fails; implementations fall back to a cheaper strategy
/// instead of returning errors.
#[async_trait]
pub trait HeadlineScorer: Send + Sync + 'static {
    async fn score(&self, draft: &HeadlineDraft, params: &ImportanceParams) -> Importance;
}
