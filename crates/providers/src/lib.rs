//! Live sourcing backends for ForgeBOM.
//!
//! Each type implements one of the `forgebom_core` sourcing traits:
//! - [`OpenAiVisionClient`]: `SchemaGenerator` and `AttributeExtractor`
//! - [`GoogleSearchClient`]: `ComponentSearch`
//! - [`HttpScraper`]: `Scraper`

pub mod google_search;
pub mod openai_compat;
pub mod scraper;

pub use google_search::GoogleSearchClient;
pub use openai_compat::OpenAiVisionClient;
pub use scraper::{HttpScrapeSession, HttpScraper};
