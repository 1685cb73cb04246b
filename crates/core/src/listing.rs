//! Raw marketplace listings and scraped product pages.

use serde::{Deserialize, Serialize};

/// A price as it was found on a page or in a search result.
///
/// Shops publish placeholders such as "Check Site" or "Call for price";
/// those arrive as `Label` and never count as a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceTag {
    Amount(f64),
    Label(String),
}

impl PriceTag {
    pub fn amount(&self) -> Option<f64> {
        match self {
            Self::Amount(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

/// One search hit for a part query. Input only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, alias = "price")]
    pub list_price: Option<PriceTag>,
}

impl RawCandidate {
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            title: Some(title.into()),
            list_price: None,
        }
    }

    pub fn with_list_price(mut self, price: f64) -> Self {
        self.list_price = Some(PriceTag::Amount(price));
        self
    }
}

/// What the scraper saw on a product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    #[serde(default)]
    pub price: Option<PriceTag>,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub text: String,
}
