// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Doubles for the scorer, generator, secret backend, and token endpoint seams.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use herald_core::{
    GenerationOptions, HeadlineDraft, HeadlineScorer, HeraldError, Importance, ImportanceParams,
    TextGenerator,
};
use herald_vault::{RefreshRequest, SecretBackend, TokenEndpoint, TokenResponse};

use crate::lock;

/// Scores every headline with the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub f64);

#[async_trait]
impl HeadlineScorer for FixedScorer {
    async fn score(&self, _draft: &HeadlineDraft, _params: &ImportanceParams) -> Importance {
        Importance::new(self.0, Some("fixed".to_string()))
    }
}

/// A text generator that pops replies from a FIFO queue.
///
/// An empty queue is an error, which lets tests exercise fallback paths.
#[derive(Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<&str>) -> Self {
        let generator = Self::new();
        for reply in replies {
            generator.push_reply(reply);
        }
        generator
    }

    pub fn push_reply(&self, reply: &str) {
        lock(&self.replies).push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self, message: &str) {
        lock(&self.replies).push_back(Err(message.to_string()));
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate_text(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, HeraldError> {
        lock(&self.prompts).push(prompt.to_string());
        let next = lock(&self.replies).pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(HeraldError::Scorer(message)),
            None => Err(HeraldError::Scorer("no scripted reply".to_string())),
        }
    }
}

/// In-memory secret backend. While failing, every call returns an error.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
    failing: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Raw payload stored for a plugin, bypassing the failure switch.
    pub fn raw(&self, plugin_id: &str) -> Option<String> {
        lock(&self.entries).get(plugin_id).cloned()
    }

    fn check(&self) -> Result<(), HeraldError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(HeraldError::Vault("memory backend unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SecretBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, plugin_id: &str, payload: &str) -> Result<(), HeraldError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        lock(&self.entries).insert(plugin_id.to_string(), payload.to_string());
        Ok(())
    }

    async fn get(&self, plugin_id: &str) -> Result<Option<String>, HeraldError> {
        self.check()?;
        Ok(lock(&self.entries).get(plugin_id).cloned())
    }

    async fn delete(&self, plugin_id: &str) -> Result<bool, HeraldError> {
        self.check()?;
        Ok(lock(&self.entries).remove(plugin_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, HeraldError> {
        self.check()?;
        Ok(lock(&self.entries).keys().cloned().collect())
    }
}

/// Token endpoint returning queued responses. An empty queue is an error.
#[derive(Default)]
pub struct MockTokenEndpoint {
    responses: Mutex<VecDeque<TokenResponse>>,
    calls: AtomicUsize,
}

impl MockTokenEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response granting `access_token` for `expires_in` seconds.
    pub fn push_token(&self, access_token: &str, expires_in: i64) {
        lock(&self.responses).push_back(TokenResponse {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: Some(expires_in),
            token_type: Some("Bearer".to_string()),
            scope: None,
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn refresh(&self, _request: &RefreshRequest) -> Result<TokenResponse, HeraldError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| HeraldError::Vault("token endpoint rejected the refresh".to_string()))
    }
}
