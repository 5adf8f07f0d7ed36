//! Feed retrieval and normalization.
//!
//! One upstream RSS endpoint, fetched with a browser User-Agent behind a
//! short freshness cache, parsed into at most [`MAX_HEADLINES`] normalized
//! [`Headline`] records in feed order.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::text::collapse_whitespace;

/// Upper bound on headlines kept per run; larger feeds are truncated in feed
/// order.
pub const MAX_HEADLINES: usize = 6;

/// Placeholder for feed items that carry no title element.
pub const UNKNOWN_TITLE: &str = "unknown title";

/// Default upstream feed.
pub const DEFAULT_FEED_URL: &str = "https://feeds.bbci.co.uk/news/rss.xml";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// One normalized feed item. Produced by [`FeedService::headlines`] and read
/// only from there on; ordering is feed order and becomes frame order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headline {
    pub title: String,
    pub link: String,
    /// Raw publication timestamp as the feed sent it; may be empty or
    /// unparseable. Interpretation happens at render time only.
    pub published_at: String,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub url: String,
    pub user_agent: String,
    /// Freshness window at the boundary to the origin server.
    pub cache_ttl: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl FeedConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

struct CachedFeed {
    fetched_at: Instant,
    headlines: Vec<Headline>,
}

/// Fetches and normalizes the upstream feed, serving repeat callers from an
/// in-process cache while it is fresh.
pub struct FeedService {
    client: reqwest::Client,
    config: FeedConfig,
    cache: tokio::sync::Mutex<Option<CachedFeed>>,
}

impl FeedService {
    pub fn new(config: FeedConfig) -> NewsreelResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| NewsreelError::fetch(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            config,
            cache: tokio::sync::Mutex::new(None),
        })
    }

    /// Current headlines, at most [`MAX_HEADLINES`], in feed order.
    ///
    /// A non-success upstream status or transport failure maps to the fetch
    /// error without retry. An empty list is a valid result here; the run
    /// pipeline decides that it is terminal.
    pub async fn headlines(&self) -> NewsreelResult<Vec<Headline>> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.fetched_at.elapsed() < self.config.cache_ttl
        {
            return Ok(cached.headlines.clone());
        }

        let body = self.fetch_body().await?;
        let headlines = parse_rss(&body)?;
        tracing::debug!(count = headlines.len(), url = %self.config.url, "fetched headlines");
        *cache = Some(CachedFeed {
            fetched_at: Instant::now(),
            headlines: headlines.clone(),
        });
        Ok(headlines)
    }

    async fn fetch_body(&self) -> NewsreelResult<String> {
        let resp = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| NewsreelError::fetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NewsreelError::fetch(format!(
                "upstream returned status {}",
                resp.status()
            )));
        }
        resp.text()
            .await
            .map_err(|e| NewsreelError::fetch(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: Option<RssChannel>,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    // Repeated elements deserialize into the Vec; a channel with a single
    // item yields a one-element list and a channel without any yields [].
    #[serde(default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Parse an RSS document into normalized headlines.
///
/// The upstream schema is not ours: missing fields degrade to defaults and a
/// missing channel or item list parses as an empty result, never an error.
pub fn parse_rss(xml: &str) -> NewsreelResult<Vec<Headline>> {
    let doc: RssDocument = quick_xml::de::from_str(xml)
        .map_err(|e| NewsreelError::fetch(format!("feed parse failed: {e}")))?;
    let items = doc.channel.map(|c| c.item).unwrap_or_default();
    Ok(items
        .into_iter()
        .take(MAX_HEADLINES)
        .map(normalize_item)
        .collect())
}

fn normalize_item(item: RssItem) -> Headline {
    Headline {
        title: match item.title {
            Some(title) => clean_text(&title),
            None => UNKNOWN_TITLE.to_string(),
        },
        link: item.link.unwrap_or_default(),
        published_at: item.pub_date.unwrap_or_default(),
        description: item
            .description
            .as_deref()
            .map(clean_text)
            .unwrap_or_default(),
    }
}

/// Strip embedded markup tags and collapse whitespace runs.
fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_item_channel_in_order() {
        let xml = r#"<rss version="2.0"><channel>
            <title>Example</title>
            <item>
                <title>First story</title>
                <link>https://example.com/1</link>
                <pubDate>Tue, 04 Aug 2026 10:30:00 GMT</pubDate>
                <description>Alpha</description>
            </item>
            <item>
                <title>Second story</title>
                <link>https://example.com/2</link>
                <description>Beta</description>
            </item>
        </channel></rss>"#;

        let headlines = parse_rss(xml).unwrap();
        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].title, "First story");
        assert_eq!(headlines[0].published_at, "Tue, 04 Aug 2026 10:30:00 GMT");
        assert_eq!(headlines[1].title, "Second story");
        assert_eq!(headlines[1].published_at, "");
    }

    #[test]
    fn single_item_channel_yields_one_element_list() {
        let xml = r#"<rss><channel><item><title>Only one</title></item></channel></rss>"#;
        let headlines = parse_rss(xml).unwrap();
        assert_eq!(headlines.len(), 1);
        assert_eq!(headlines[0].title, "Only one");
    }

    #[test]
    fn channel_without_items_yields_empty_list_not_error() {
        let xml = r#"<rss><channel><title>Quiet day</title></channel></rss>"#;
        assert!(parse_rss(xml).unwrap().is_empty());
    }

    #[test]
    fn missing_channel_yields_empty_list() {
        assert!(parse_rss("<rss></rss>").unwrap().is_empty());
    }

    #[test]
    fn missing_fields_degrade_to_defaults() {
        let xml = r#"<rss><channel><item><link>https://example.com</link></item></channel></rss>"#;
        let headlines = parse_rss(xml).unwrap();
        assert_eq!(headlines[0].title, UNKNOWN_TITLE);
        assert_eq!(headlines[0].link, "https://example.com");
        assert_eq!(headlines[0].published_at, "");
        assert_eq!(headlines[0].description, "");
    }

    #[test]
    fn markup_is_stripped_and_whitespace_collapsed() {
        let xml = r#"<rss><channel><item>
            <title>  Breaking:&#10;  markets   move </title>
            <description>&lt;p&gt;Stocks &lt;b&gt;rallied&lt;/b&gt;  today.&lt;/p&gt;</description>
        </item></channel></rss>"#;
        let headlines = parse_rss(xml).unwrap();
        assert_eq!(headlines[0].title, "Breaking: markets move");
        assert_eq!(headlines[0].description, "Stocks rallied today.");
    }

    #[test]
    fn truncates_to_six_items_in_feed_order() {
        let items: String = (0..9)
            .map(|i| format!("<item><title>Story {i}</title></item>"))
            .collect();
        let xml = format!("<rss><channel>{items}</channel></rss>");
        let headlines = parse_rss(&xml).unwrap();
        assert_eq!(headlines.len(), MAX_HEADLINES);
        for (i, h) in headlines.iter().enumerate() {
            assert_eq!(h.title, format!("Story {i}"));
        }
    }

    #[test]
    fn headline_json_uses_camel_case() {
        let h = Headline {
            title: "t".into(),
            link: "l".into(),
            published_at: "p".into(),
            description: "d".into(),
        };
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.contains("\"publishedAt\":\"p\""));
    }
}
