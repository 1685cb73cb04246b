//! Plain HTTP product page scraper.
//!
//! Fetches the page HTML, parses it into a DOM, and pulls out price, main
//! image, and visible text from the markup shops commonly publish:
//! OpenGraph / product meta tags, schema.org `price` properties, and JSON-LD
//! offers. Pages rendered purely by JavaScript yield little here.

use async_trait::async_trait;
use forgebom_config::SearchConfig;
use forgebom_core::{AdapterError, PriceTag, ScrapeSession, ScrapedPage, Scraper};
use regex_lite::Regex;
use scraper::{Html, Node, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Maximum characters of page text kept.
const MAX_TEXT_CHARS: usize = 5000;

/// Elements whose text never reaches the reader.
const NON_CONTENT_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

static PRICE_META: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"meta[property="product:price:amount"], meta[property="og:price:amount"], meta[name="price"], [itemprop="price"][content]"#,
    )
    .expect("price meta selector")
});

static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("json-ld selector")
});

static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:image"], meta[property="og:image:url"]"#)
        .expect("og:image selector")
});

static DOLLAR_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?([0-9]{1,3}(?:,[0-9]{3})*(?:\.[0-9]{2})|[0-9]+\.[0-9]{2})")
        .expect("dollar price regex")
});

/// Opens [`HttpScrapeSession`]s.
#[derive(Debug, Clone)]
pub struct HttpScraper {
    timeout: Duration,
    user_agent: String,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: BROWSER_USER_AGENT.into(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn open_session(&self) -> Result<Box<dyn ScrapeSession>, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| AdapterError::Network(format!("Failed to create HTTP client: {e}")))?;

        debug!("Scrape session opened");
        Ok(Box::new(HttpScrapeSession {
            client,
            pages: AtomicUsize::new(0),
        }))
    }
}

/// One connection pool shared by every page request of a fusion call.
pub struct HttpScrapeSession {
    client: reqwest::Client,
    pages: AtomicUsize,
}

#[async_trait]
impl ScrapeSession for HttpScrapeSession {
    async fn scrape_product_page(&self, link: &str) -> Result<Option<ScrapedPage>, AdapterError> {
        self.pages.fetch_add(1, Ordering::Relaxed);

        let response = self.client.get(link).send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout(e.to_string())
            } else {
                AdapterError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(link, status = status.as_u16(), "Product page returned error");
            return Ok(None);
        }

        let html = response
            .text()
            .await
            .map_err(|e| AdapterError::Parse(format!("Failed to read page body: {e}")))?;

        Ok(extract_page(&html))
    }

    async fn close(&self) {
        debug!(pages = self.pages.load(Ordering::Relaxed), "Scrape session closed");
    }
}

/// Pull price, image, and text out of a page. `None` when the page has
/// none of the three.
pub fn extract_page(html: &str) -> Option<ScrapedPage> {
    let document = Html::parse_document(html);
    let text = visible_text(&document);
    let price = structured_price(&document)
        .or_else(|| dollar_amount(&text))
        .map(PriceTag::Amount);
    let image_url = og_image(&document);

    if price.is_none() && image_url.is_none() && text.is_empty() {
        return None;
    }
    Some(ScrapedPage {
        price,
        image_url,
        text,
    })
}

/// Structured markup first, then the first dollar amount in the visible text.
pub fn extract_price(html: &str) -> Option<f64> {
    let document = Html::parse_document(html);
    structured_price(&document).or_else(|| dollar_amount(&visible_text(&document)))
}

pub fn extract_image(html: &str) -> Option<String> {
    og_image(&Html::parse_document(html))
}

fn structured_price(document: &Html) -> Option<f64> {
    document
        .select(&PRICE_META)
        .filter_map(|el| el.value().attr("content"))
        .find_map(parse_amount)
        .or_else(|| {
            document
                .select(&JSON_LD)
                .filter_map(|script| {
                    let raw = script.text().collect::<String>();
                    serde_json::from_str::<Value>(raw.trim())
                        .map_err(|e| debug!(error = %e, "Skipping malformed JSON-LD block"))
                        .ok()
                })
                .find_map(|ld| json_ld_price(&ld))
        })
}

/// Price from a JSON-LD document: the node's own `price` / `lowPrice`, then
/// its `offers`, then any `@graph` members.
fn json_ld_price(value: &Value) -> Option<f64> {
    match value {
        Value::Array(items) => items.iter().find_map(json_ld_price),
        Value::Object(map) => ["price", "lowPrice"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_amount(s),
                _ => None,
            })
            .or_else(|| map.get("offers").and_then(json_ld_price))
            .or_else(|| map.get("@graph").and_then(json_ld_price)),
        _ => None,
    }
}

fn dollar_amount(text: &str) -> Option<f64> {
    DOLLAR_PRICE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| parse_amount(m.as_str()))
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_start_matches('$')
        .replace(',', "")
        .trim()
        .parse()
        .ok()
}

fn og_image(document: &Html) -> Option<String> {
    document
        .select(&OG_IMAGE)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

/// Text nodes outside scripts and styles, entity-decoded by the parser,
/// whitespace collapsed.
fn visible_text(document: &Html) -> String {
    let words: Vec<&str> = document
        .root_element()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, &**text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| NON_CONTENT_ELEMENTS.contains(&el.name()))
            })
        })
        .flat_map(|(_, text)| text.split_whitespace())
        .collect();

    words.join(" ").chars().take(MAX_TEXT_CHARS).collect()
}
