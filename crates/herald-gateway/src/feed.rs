// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RSS 2.0 rendering of stored headlines.

use chrono::{DateTime, Utc};
use herald_config::model::FeedConfig;
use herald_core::{Headline, HeraldError};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

fn xml_err(e: impl std::fmt::Display) -> HeraldError {
    HeraldError::Internal(format!("feed rendering failed: {e}"))
}

fn start(writer: &mut Writer<Vec<u8>>, element: BytesStart<'_>) -> Result<(), HeraldError> {
    writer.write_event(Event::Start(element)).map_err(xml_err)
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), HeraldError> {
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)
}

/// `<name>text</name>` with the text escaped.
fn text_element(writer: &mut Writer<Vec<u8>>, element: BytesStart<'_>, text: &str) -> Result<(), HeraldError> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    start(writer, element)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    end(writer, &name)
}

/// Render `headlines` (already filtered and ordered) as an RSS 2.0 document.
pub fn render_feed(
    config: &FeedConfig,
    headlines: &[Headline],
    built_at: DateTime<Utc>,
) -> Result<String, HeraldError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    start(&mut writer, BytesStart::new("rss").with_attributes([("version", "2.0")]))?;
    start(&mut writer, BytesStart::new("channel"))?;

    text_element(&mut writer, BytesStart::new("title"), &config.title)?;
    text_element(&mut writer, BytesStart::new("link"), &config.link)?;
    text_element(&mut writer, BytesStart::new("description"), &config.description)?;
    text_element(&mut writer, BytesStart::new("lastBuildDate"), &built_at.to_rfc2822())?;

    for headline in headlines {
        start(&mut writer, BytesStart::new("item"))?;
        text_element(&mut writer, BytesStart::new("title"), &headline.title)?;
        if let Some(link) = &headline.link {
            text_element(&mut writer, BytesStart::new("link"), link)?;
        }
        if let Some(description) = &headline.description {
            text_element(&mut writer, BytesStart::new("description"), description)?;
        }
        text_element(
            &mut writer,
            BytesStart::new("guid").with_attributes([("isPermaLink", "false")]),
            &headline.id,
        )?;
        text_element(&mut writer, BytesStart::new("pubDate"), &headline.published_at.to_rfc2822())?;
        for category in headline.category.iter().chain(headline.tags.iter()) {
            text_element(&mut writer, BytesStart::new("category"), category)?;
        }
        end(&mut writer, "item")?;
    }

    end(&mut writer, "channel")?;
    end(&mut writer, "rss")?;
    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn headline(id: &str, title: &str) -> Headline {
        let published = Utc.with_ymd_and_hms(2026, 10, 6, 9, 30, 0).unwrap();
        Headline {
            id: id.to_string(),
            plugin_id: "rss".to_string(),
            title: title.to_string(),
            description: Some("<b>bold</b> claims".to_string()),
            link: Some("https://example.com/a?x=1&y=2".to_string()),
            published_at: published,
            created_at: published,
            category: Some("Tech".to_string()),
            tags: vec!["Linux".to_string()],
            importance: 0.9,
            importance_rationale: None,
            metadata: Value::Null,
            read: false,
            starred: false,
            archived: false,
        }
    }

    #[test]
    fn renders_items_with_escaping() {
        let xml = render_feed(
            &FeedConfig::default(),
            &[headline("abc123", "Tom & Jerry <return>")],
            Utc::now(),
        )
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\">"));
        assert!(xml.contains("<title>Tom &amp; Jerry &lt;return&gt;</title>"));
        assert!(xml.contains("<guid isPermaLink=\"false\">abc123</guid>"));
        assert!(xml.contains("<pubDate>Tue, 6 Oct 2026 09:30:00 +0000</pubDate>"));
        assert!(xml.contains("<category>Tech</category>"));
        assert!(xml.contains("<category>Linux</category>"));
        assert!(xml.contains("x=1&amp;y=2"));
    }

    #[test]
    fn output_is_readable_by_the_rss_plugin() {
        let xml = render_feed(
            &FeedConfig::default(),
            &[headline("one", "First"), headline("two", "Second")],
            Utc::now(),
        )
        .unwrap();
        let drafts = herald_plugin::builtin::rss::parse_feed(&xml).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].guid.as_deref(), Some("one"));
        assert_eq!(drafts[0].description.as_deref(), Some("<b>bold</b> claims"));
        assert_eq!(drafts[1].category.as_deref(), Some("Tech"));
    }

    #[test]
    fn empty_feed_has_channel_metadata() {
        let mut config = FeedConfig::default();
        config.title = "My Herald".into();
        let xml = render_feed(&config, &[], Utc::now()).unwrap();
        assert!(xml.contains("<title>My Herald</title>"));
        assert!(!xml.contains("<item>"));
    }
}
