//! Error types for the forgebom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for forgebom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- External collaborator errors ---
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    // --- Fusion errors ---
    #[error("Fusion error: {0}")]
    Fusion(#[from] FusionError),

    // --- Geometry errors ---
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    // --- Mesh errors ---
    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    // --- Collision errors ---
    #[error("Collision error: {0}")]
    Collision(#[from] CollisionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by the external collaborators: search, scraper,
/// schema generator, and the vision extraction oracle.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by {service}, retry after {retry_after_secs}s")]
    RateLimited {
        service: String,
        retry_after_secs: u64,
    },

    #[error("Adapter not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Oracle reported an error: {0}")]
    Oracle(String),
}

/// Why a single `fuse` call produced no part.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FusionError {
    #[error("attribute schema generation failed for {part_type}")]
    SchemaUnavailable { part_type: String },

    #[error("component search failed for '{query}': {reason}")]
    SearchFailed { query: String, reason: String },

    #[error("no raw candidates found for '{query}'")]
    NoCandidates { query: String },

    #[error("all {total} candidates were filtered or failed evaluation")]
    NoSurvivors { total: usize },

    #[error("winning candidate '{product_name}' carries an empty engineering spec")]
    EmptyWinner { product_name: String },
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Renderer failed for {part}: {reason}")]
    RenderFailed { part: String, reason: String },

    #[error("Renderer timed out for {part} after {timeout_secs}s")]
    Timeout { part: String, timeout_secs: u64 },

    #[error("Renderer produced no output at {0}")]
    MissingOutput(PathBuf),
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Failed to read mesh {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid STL data: {0}")]
    InvalidStl(String),
}

#[derive(Debug, Clone, Error)]
pub enum CollisionError {
    #[error("Collision backend unavailable: {0}")]
    Unavailable(String),

    #[error("Collision backend failed: {0}")]
    Backend(String),
}
