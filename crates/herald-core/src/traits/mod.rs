// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the runtime and its collaborators.
//!
//! All traits use `#[async_trait]` so they can be held as trait objects.

pub mod plugin;
pub mod scorer;

pub use plugin::SourcePlugin;
pub use scorer::{GenerationOptions, HeadlineScorer, TextGenerator};
