// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RSS 2.0 feed source.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::{
    ConfigSchema, FetchContext, HeadlineDraft, HealthReport, HeraldError, PluginDescriptor,
    RetentionPolicy, SchemaProperty, SchemaType, SourcePlugin,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub const RSS_PLUGIN_ID: &str = "rss";

/// Validated configuration of the rss plugin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RssSettings {
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

pub struct RssPlugin {
    descriptor: PluginDescriptor,
    client: reqwest::Client,
    settings: ArcSwapOption<RssSettings>,
}

impl RssPlugin {
    pub fn new(client: reqwest::Client) -> Self {
        let config_schema = ConfigSchema::object()
            .property(
                "url",
                SchemaProperty::new(SchemaType::String, "Feed URL (http or https)"),
                true,
            )
            .property(
                "category",
                SchemaProperty::new(SchemaType::String, "Category applied to items without one"),
                false,
            )
            .property(
                "max_items",
                SchemaProperty::new(SchemaType::Integer, "Items kept per fetch")
                    .with_default(json!(50)),
                false,
            );
        Self {
            descriptor: PluginDescriptor {
                id: RSS_PLUGIN_ID.to_string(),
                name: "RSS".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                author: Some("Herald Contributors".to_string()),
                description: "Headlines from an RSS 2.0 feed".to_string(),
                config_schema,
                auth: None,
                retention: RetentionPolicy::Count { max_items: 200 },
            },
            client,
            settings: ArcSwapOption::empty(),
        }
    }

    fn settings(&self) -> Result<Arc<RssSettings>, HeraldError> {
        self.settings
            .load_full()
            .ok_or_else(|| HeraldError::execution(RSS_PLUGIN_ID, "plugin is not initialized"))
    }
}

fn parse_settings(raw: &Value) -> Result<RssSettings, String> {
    let settings: RssSettings =
        serde_json::from_value(raw.clone()).map_err(|e| format!("invalid rss config: {e}"))?;
    let url = reqwest::Url::parse(&settings.url)
        .map_err(|e| format!("`url` is not a valid URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("`url` must be http or https, got {}", url.scheme()));
    }
    if settings.max_items == Some(0) {
        return Err("`max_items` must be greater than 0".to_string());
    }
    Ok(settings)
}

#[async_trait]
impl SourcePlugin for RssPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn validate_config(&self, raw: &Value) -> herald_core::ConfigValidation {
        let schema = self.descriptor.config_schema.validate(raw);
        if !schema.valid {
            return schema;
        }
        match parse_settings(raw) {
            Ok(_) => schema,
            Err(e) => herald_core::ConfigValidation::invalid(vec![e]),
        }
    }

    async fn initialize(&self, config: &Value) -> Result<(), HeraldError> {
        let settings = parse_settings(config).map_err(|e| HeraldError::execution(RSS_PLUGIN_ID, e))?;
        debug!(url = %settings.url, "rss plugin initialized");
        self.settings.store(Some(Arc::new(settings)));
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.settings.store(None);
        Ok(())
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<HeadlineDraft>, HeraldError> {
        let settings = self.settings()?;
        let fail = |message: String| HeraldError::execution(&ctx.plugin_id, message);

        let response = self
            .client
            .get(&settings.url)
            .send()
            .await
            .map_err(|e| fail(format!("request to {} failed: {e}", settings.url)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("{} returned {status}", settings.url)));
        }
        let body = response
            .text()
            .await
            .map_err(|e| fail(format!("failed to read feed body: {e}")))?;

        let mut drafts = parse_feed(&body).map_err(fail)?;
        if let Some(category) = &settings.category {
            for draft in &mut drafts {
                draft.category.get_or_insert_with(|| category.clone());
            }
        }
        drafts.truncate(settings.max_items.unwrap_or(50));
        debug!(plugin_id = %ctx.plugin_id, items = drafts.len(), "rss feed parsed");
        Ok(drafts)
    }

    async fn health_check(&self) -> HealthReport {
        match self.settings.load_full() {
            Some(settings) => HealthReport::healthy(format!("polling {}", settings.url)),
            None => HealthReport::unhealthy("not initialized"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    guid: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<Text>,
}

/// Element text, ignoring attributes such as `isPermaLink` or `domain`.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an RSS 2.0 document into drafts. Items without a title are dropped.
pub fn parse_feed(xml: &str) -> Result<Vec<HeadlineDraft>, String> {
    let rss: Rss = quick_xml::de::from_str(xml).map_err(|e| format!("invalid RSS document: {e}"))?;
    let drafts = rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let title = non_empty(item.title)?;
            let mut tags: Vec<String> = item
                .categories
                .into_iter()
                .filter_map(|c| non_empty(Some(c.value)))
                .collect();
            let category = (!tags.is_empty()).then(|| tags.remove(0));
            Some(HeadlineDraft {
                guid: non_empty(item.guid.map(|g| g.value)),
                title,
                description: non_empty(item.description),
                link: non_empty(item.link),
                published_at: item
                    .pub_date
                    .as_deref()
                    .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                category,
                tags,
                metadata: Value::Null,
            })
        })
        .collect();
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com</link>
    <description>Example feed</description>
    <item>
      <title>Kernel 7.0 released</title>
      <link>https://example.com/kernel</link>
      <description><![CDATA[<p>Big <b>news</b></p>]]></description>
      <guid isPermaLink="false">kernel-7</guid>
      <pubDate>Tue, 06 Oct 2026 09:30:00 +0000</pubDate>
      <category domain="tech">Linux</category>
      <category>Release</category>
    </item>
    <item>
      <title>Tom &amp; Jerry return</title>
      <link>https://example.com/tj</link>
    </item>
    <item>
      <description>No title here</description>
    </item>
  </channel>
</rss>"#;

    fn ctx() -> FetchContext {
        FetchContext {
            plugin_id: RSS_PLUGIN_ID.into(),
            config: json!({}),
            credential: None,
            last_run_at: None,
        }
    }

    #[test]
    fn parses_items_and_skips_untitled() {
        let drafts = parse_feed(FEED).unwrap();
        assert_eq!(drafts.len(), 2);

        let first = &drafts[0];
        assert_eq!(first.title, "Kernel 7.0 released");
        assert_eq!(first.guid.as_deref(), Some("kernel-7"));
        assert_eq!(first.description.as_deref(), Some("<p>Big <b>news</b></p>"));
        assert_eq!(first.category.as_deref(), Some("Linux"));
        assert_eq!(first.tags, vec!["Release"]);
        assert_eq!(
            first.published_at.unwrap().to_rfc3339(),
            "2026-10-06T09:30:00+00:00"
        );

        assert_eq!(drafts[1].title, "Tom & Jerry return");
        assert!(drafts[1].published_at.is_none());
    }

    #[test]
    fn rejects_non_rss() {
        assert!(parse_feed("<html><body/></html>").is_err());
    }

    #[test]
    fn validate_config_checks_url() {
        let plugin = RssPlugin::new(reqwest::Client::new());
        assert!(plugin.validate_config(&json!({"url": "https://x.test/feed"})).valid);
        assert!(!plugin.validate_config(&json!({})).valid);
        assert!(!plugin.validate_config(&json!({"url": "ftp://x.test"})).valid);
        assert!(!plugin.validate_config(&json!({"url": "https://x.test", "max_items": 0})).valid);
    }

    #[tokio::test]
    async fn fetch_requires_initialize() {
        let plugin = RssPlugin::new(reqwest::Client::new());
        let err = plugin.fetch(&ctx()).await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
        assert!(!plugin.health_check().await.healthy);
    }

    #[tokio::test]
    async fn fetches_feed_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let plugin = RssPlugin::new(reqwest::Client::new());
        plugin
            .initialize(&json!({
                "url": format!("{}/feed.xml", server.uri()),
                "category": "World",
                "max_items": 1
            }))
            .await
            .unwrap();

        let drafts = plugin.fetch(&ctx()).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].category.as_deref(), Some("Linux"));

        plugin.shutdown().await.unwrap();
        assert!(plugin.fetch(&ctx()).await.is_err());
    }

    #[tokio::test]
    async fn default_category_fills_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;
        let plugin = RssPlugin::new(reqwest::Client::new());
        plugin
            .initialize(&json!({"url": server.uri(), "category": "World"}))
            .await
            .unwrap();
        let drafts = plugin.fetch(&ctx()).await.unwrap();
        assert_eq!(drafts[1].category.as_deref(), Some("World"));
    }

    #[tokio::test]
    async fn http_error_is_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let plugin = RssPlugin::new(reqwest::Client::new());
        plugin.initialize(&json!({"url": server.uri()})).await.unwrap();
        let err = plugin.fetch(&ctx()).await.unwrap_err();
        assert!(matches!(err, HeraldError::PluginExecution { .. }));
        assert!(err.to_string().contains("503"));
    }
}
