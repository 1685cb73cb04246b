//! The candidate fusion engine.
//!
//! Turns N noisy marketplace listings for one part type into one trusted
//! [`CompositePart`](forgebom_core::CompositePart):
//!
//! 1. **Search** for up to `search_limit` listings
//! 2. **Filter** out forum, social, and category pages
//! 3. **Evaluate** every survivor concurrently over one scraping session
//!    (price gate, vision or safe-mode defaults, title fallback)
//! 4. **Rank** by data completeness, ties in discovery order
//! 5. **Materialize** the winner as a BOM row

pub mod evaluator;
pub mod filter;
pub mod inference;
pub mod orchestrator;
pub mod ranker;
pub mod schema;

pub use evaluator::{
    DefaultsProvider, Evaluation, EvaluationInput, EvaluationPolicy, Evaluator, VisionEvaluator,
};
pub use filter::ListingFilter;
pub use orchestrator::FusionOrchestrator;
pub use ranker::CandidateRanker;
pub use schema::RegistrySchemaGenerator;
