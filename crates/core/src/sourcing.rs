//! Traits for the external sourcing collaborators.
//!
//! Search, scraping, schema generation, and vision extraction all live
//! outside the fusion core. Live implementations are in
//! `forgebom-providers`; tests implement these traits with scripted fakes.

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::listing::{RawCandidate, ScrapedPage};
use crate::spec::{AttributeReadings, AttributeSchema};

/// Web search over marketplace listings.
#[async_trait]
pub trait ComponentSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` listings for `query`, in discovery order.
    async fn find_components(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<RawCandidate>, AdapterError>;
}

/// Opens scraping sessions.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn open_session(&self) -> std::result::Result<Box<dyn ScrapeSession>, AdapterError>;
}

/// A scraping session shared by every evaluation in one fusion call.
///
/// `close` is called exactly once, after every page request has resolved.
#[async_trait]
pub trait ScrapeSession: Send + Sync {
    /// `Ok(None)` when the page loaded but held nothing usable.
    async fn scrape_product_page(
        &self,
        link: &str,
    ) -> std::result::Result<Option<ScrapedPage>, AdapterError>;

    async fn close(&self);
}

/// Produces the attribute schema the oracle fills for a part type.
#[async_trait]
pub trait SchemaGenerator: Send + Sync {
    async fn generate_attribute_schema(
        &self,
        part_type: &str,
    ) -> std::result::Result<Option<AttributeSchema>, AdapterError>;
}

/// The image attribute extraction oracle.
#[async_trait]
pub trait AttributeExtractor: Send + Sync {
    async fn extract_attributes(
        &self,
        image_url: &str,
        part_type: &str,
        schema: &AttributeSchema,
    ) -> std::result::Result<AttributeReadings, AdapterError>;
}
