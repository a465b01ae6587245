// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Herald integration tests.
//!
//! Provides scripted doubles for the plugin, scorer, generator, and secret
//! backend seams, plus a [`TestHarness`] that wires a plugin runtime over a
//! temporary headline store.
//!
//! # Components
//!
//! - [`MockPlugin`] - source plugin returning queued batches, with call counters
//! - [`FixedScorer`] - scorer that always returns the same importance
//! - [`MockGenerator`] - text generator with queued replies
//! - [`MemoryBackend`] - in-memory secret backend that can be switched to fail
//! - [`MockTokenEndpoint`] - OAuth2 token endpoint with queued responses

pub mod harness;
pub mod mock_plugin;
pub mod mocks;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_plugin::MockPlugin;
pub use mocks::{FixedScorer, MemoryBackend, MockGenerator, MockTokenEndpoint};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
