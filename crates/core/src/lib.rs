//! # forgebom core
//!
//! Domain types, the part-type registry, collaborator traits, and error
//! definitions for the drone BOM fusion and assembly validation pipeline.
//! This crate has no I/O of its own; it defines the model that the fusion,
//! assembly, and provider crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (search, scraper, schema generator, vision
//! oracle) is a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping live and safe-mode strategies via configuration
//! - Easy testing with scripted implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod assembly;
pub mod bom;
pub mod error;
pub mod listing;
pub mod part;
pub mod sourcing;
pub mod spec;

// Re-export key types at crate root for ergonomics
pub use assembly::{
    AssemblyAction, AssemblyPlan, AssemblyPlanStep, CollisionReport, CollisionStatus, Fastener,
};
pub use bom::{BillOfMaterials, CompositePart, EvaluatedCandidate};
pub use error::{
    AdapterError, CollisionError, Error, FusionError, GeometryError, MeshError, Result,
};
pub use listing::{PriceTag, RawCandidate, ScrapedPage};
pub use part::{PartDescriptor, PartType, TitleInference};
pub use sourcing::{AttributeExtractor, ComponentSearch, SchemaGenerator, ScrapeSession, Scraper};
pub use spec::{
    AttributeReadings, AttributeSchema, AttributeValue, EngineeringSpec, Provenance, SpecValue,
};
