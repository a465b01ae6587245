// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted source plugin for deterministic runtime tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use herald_core::{
    AuthRequirement, AuthType, ConfigSchema, FetchContext, HeadlineDraft, HealthReport,
    HeraldError, PluginDescriptor, RetentionPolicy, SchemaProperty, SchemaType, SourcePlugin,
};
use serde_json::Value;

use crate::lock;

/// A source plugin whose fetch results are popped from a FIFO queue.
///
/// An empty queue yields an empty batch. Every call is counted so tests can
/// assert how often the runtime reached the plugin.
pub struct MockPlugin {
    descriptor: PluginDescriptor,
    batches: Mutex<VecDeque<Result<Vec<HeadlineDraft>, String>>>,
    fetch_delay: Mutex<Option<Duration>>,
    fail_initialize: AtomicBool,
    fetch_calls: AtomicUsize,
    init_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
    last_config: Mutex<Option<Value>>,
    last_context: Mutex<Option<FetchContext>>,
}

impl MockPlugin {
    /// A plugin with unlimited retention, no auth, and an empty schema.
    pub fn new(id: &str) -> Self {
        Self {
            descriptor: PluginDescriptor {
                id: id.to_string(),
                name: format!("Mock {id}"),
                version: "0.1.0".to_string(),
                author: None,
                description: "scripted test plugin".to_string(),
                config_schema: ConfigSchema::object(),
                auth: None,
                retention: RetentionPolicy::Unlimited,
            },
            batches: Mutex::new(VecDeque::new()),
            fetch_delay: Mutex::new(None),
            fail_initialize: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            last_config: Mutex::new(None),
            last_context: Mutex::new(None),
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.descriptor.retention = retention;
        self
    }

    pub fn with_auth(mut self, auth_type: AuthType) -> Self {
        self.descriptor.auth = Some(AuthRequirement {
            auth_type,
            description: "mock credential".to_string(),
            scopes: Vec::new(),
        });
        self
    }

    /// Declare a required string key in the config schema.
    pub fn with_required_key(mut self, key: &str) -> Self {
        self.descriptor.config_schema = self.descriptor.config_schema.property(
            key,
            SchemaProperty::new(SchemaType::String, key),
            true,
        );
        self
    }

    /// Sleep this long inside every fetch.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *lock(&self.fetch_delay) = Some(delay);
        self
    }

    pub fn push_batch(&self, drafts: Vec<HeadlineDraft>) {
        lock(&self.batches).push_back(Ok(drafts));
    }

    pub fn push_error(&self, message: &str) {
        lock(&self.batches).push_back(Err(message.to_string()));
    }

    pub fn set_fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Config passed to the most recent `initialize`.
    pub fn last_config(&self) -> Option<Value> {
        lock(&self.last_config).clone()
    }

    /// Context passed to the most recent `fetch`.
    pub fn last_context(&self) -> Option<FetchContext> {
        lock(&self.last_context).clone()
    }
}

#[async_trait]
impl SourcePlugin for MockPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, config: &Value) -> Result<(), HeraldError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(HeraldError::execution(&self.descriptor.id, "mock initialize failure"));
        }
        *lock(&self.last_config) = Some(config.clone());
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<HeadlineDraft>, HeraldError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_context) = Some(ctx.clone());

        let delay = *lock(&self.fetch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.batches).pop_front();
        match next {
            Some(Ok(drafts)) => Ok(drafts),
            Some(Err(message)) => Err(HeraldError::execution(&ctx.plugin_id, message)),
            None => Ok(Vec::new()),
        }
    }

    async fn health_check(&self) -> HealthReport {
        HealthReport::healthy("mock")
    }
}
