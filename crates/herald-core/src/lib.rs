// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Herald feed curator.
//!
//! This crate provides the error taxonomy, the shared data model, and the
//! trait contracts that plugins, scorers, and text generators implement.

pub mod credential;
pub mod error;
pub mod traits;
pub mod types;

pub use credential::{Credential, CredentialSecret, OAuth2Token};
pub use error::HeraldError;
pub use types::{
    AuthRequirement, AuthType, ConfigSchema, ConfigValidation, FetchContext, Headline,
    HeadlineDraft, HealthReport, Importance, ImportanceParams, ImportanceRule, PluginCounts,
    PluginDescriptor, RetentionPolicy, RuleField, SchemaProperty, SchemaType, ServiceState,
    ServiceStatus,
};

pub use traits::{GenerationOptions, HeadlineScorer, SourcePlugin, TextGenerator};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Static {
        descriptor: PluginDescriptor,
    }

    #[async_trait]
    impl SourcePlugin for Static {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn initialize(&self, _config: &Value) -> Result<(), HeraldError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), HeraldError> {
            Ok(())
        }

        async fn fetch(&self, _ctx: &FetchContext) -> Result<Vec<HeadlineDraft>, HeraldError> {
            Ok(vec![HeadlineDraft::new("hello")])
        }
    }

    fn plugin() -> Static {
        Static {
            descriptor: PluginDescriptor {
                id: "static".into(),
                name: "Static".into(),
                version: "1.0.0".into(),
                author: None,
                description: "fixed items".into(),
                config_schema: ConfigSchema::object().property(
                    "url",
                    SchemaProperty::new(SchemaType::String, "url"),
                    true,
                ),
                auth: Some(AuthRequirement {
                    auth_type: AuthType::ApiKey,
                    description: "token".into(),
                    scopes: vec![],
                }),
                retention: RetentionPolicy::Count { max_items: 5 },
            },
        }
    }

    #[tokio::test]
    async fn default_methods_come_from_descriptor() {
        let p = plugin();
        assert_eq!(p.id(), "static");
        assert_eq!(p.retention_policy(), RetentionPolicy::Count { max_items: 5 });
        assert_eq!(p.auth_requirement().unwrap().auth_type, AuthType::ApiKey);
        assert!(p.validate_config(&json!({"url": "x"})).valid);
        assert!(!p.validate_config(&json!({})).valid);
        assert!(p.health_check().await.healthy);
    }

    #[test]
    fn error_predicates() {
        let nf = HeraldError::PluginNotFound {
            plugin_id: "x".into(),
        };
        let ne = HeraldError::PluginNotEnabled {
            plugin_id: "x".into(),
        };
        let busy = HeraldError::FetchInProgress {
            plugin_id: "x".into(),
        };
        assert!(nf.is_not_found() && !nf.is_not_enabled());
        assert!(ne.is_not_enabled() && !ne.is_not_found());
        assert!(busy.is_coalesced());
        assert_eq!(
            HeraldError::execution("rss", "boom").to_string(),
            "plugin rss failed: boom"
        );
    }

    #[test]
    fn service_state_display() {
        assert_eq!(ServiceState::Running.to_string(), "running");
        let stopped = ServiceStatus::stopped();
        assert!(!stopped.running);
        assert_eq!(stopped.state, ServiceState::Stopped);
    }
}
