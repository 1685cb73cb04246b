//! Listing filter: drops search hits that cannot be product pages.

use forgebom_config::FusionConfig;
use forgebom_core::RawCandidate;

/// Rejects forum/social/how-to links and category-page titles.
///
/// Matching is case-insensitive substring matching against the whole link,
/// so entries may name a host (`reddit.com`), a host fragment (`forum`), or
/// a host plus path (`getfpv.com/learn`).
#[derive(Debug, Clone)]
pub struct ListingFilter {
    domain_blocklist: Vec<String>,
    title_blocklist: Vec<String>,
}

impl ListingFilter {
    pub fn new(domain_blocklist: Vec<String>, title_blocklist: Vec<String>) -> Self {
        Self {
            domain_blocklist: domain_blocklist.into_iter().map(|d| d.to_lowercase()).collect(),
            title_blocklist: title_blocklist.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(
            config.domain_blocklist.clone(),
            config.title_blocklist.clone(),
        )
    }

    pub fn accept(&self, candidate: &RawCandidate) -> bool {
        let (Some(link), Some(title)) = (candidate.link.as_deref(), candidate.title.as_deref())
        else {
            return false;
        };
        if link.trim().is_empty() || title.trim().is_empty() {
            return false;
        }

        let link = link.to_lowercase();
        if self.domain_blocklist.iter().any(|d| link.contains(d.as_str())) {
            return false;
        }

        let title = title.to_lowercase();
        !self.title_blocklist.iter().any(|t| title.contains(t.as_str()))
    }
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self::from_config(&FusionConfig::default())
    }
}
