//! Configuration loading, validation, and management for forgebom.
//!
//! Loads configuration from `~/.forgebom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.forgebom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Vision model used for schema generation and attribute extraction
    #[serde(default)]
    pub vision: VisionConfig,

    /// Marketplace search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Candidate fusion policy
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Geometry generation and collision checking
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_vision_url")]
    pub api_url: String,

    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_vision_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_vision_model() -> String {
    "gpt-4o".into()
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_vision_url(),
            model: default_vision_model(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Programmable search engine id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_id: Option<String>,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,
}

fn default_search_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}
fn default_scrape_timeout() -> u64 {
    20
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            endpoint: default_search_endpoint(),
            timeout_secs: default_scrape_timeout(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("engine_id", &self.engine_id)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which evaluation strategy fills engineering specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStrategy {
    /// Ask the vision oracle, gate by confidence.
    #[default]
    Vision,
    /// Safe mode: registry defaults, no oracle calls.
    Defaults,
}

impl std::str::FromStr for EvaluationStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vision" => Ok(Self::Vision),
            "defaults" | "safe_mode" => Ok(Self::Defaults),
            other => Err(ConfigError::ValidationError(format!(
                "unknown evaluation strategy '{other}' (expected 'vision' or 'defaults')"
            ))),
        }
    }
}

/// Ranking weights. Heuristic, so they are configuration, not constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Added when the engineering data came from the vision oracle
    #[serde(default = "default_vision_weight")]
    pub vision: u32,

    /// Added when the listing has a product image
    #[serde(default = "default_image_weight")]
    pub image: u32,

    /// Added per populated attribute
    #[serde(default = "default_attribute_weight")]
    pub per_attribute: u32,
}

fn default_vision_weight() -> u32 {
    20
}
fn default_image_weight() -> u32 {
    5
}
fn default_attribute_weight() -> u32 {
    1
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            vision: default_vision_weight(),
            image: default_image_weight(),
            per_attribute: default_attribute_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub strategy: EvaluationStrategy,

    /// Link substrings that mark forums, social media, and how-to pages
    #[serde(default = "default_domain_blocklist")]
    pub domain_blocklist: Vec<String>,

    /// Title substrings that mark category or listing pages
    #[serde(default = "default_title_blocklist")]
    pub title_blocklist: Vec<String>,

    /// Prices at or below this are treated as placeholders
    #[serde(default = "default_min_price")]
    pub min_price: f64,

    /// Vision readings below this confidence are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Use the search listing's price when the page has none
    #[serde(default)]
    pub fallback_to_list_price: bool,

    /// Try title inference for a missing critical attribute
    #[serde(default = "default_true")]
    pub text_inference: bool,

    #[serde(default)]
    pub weights: ScoreWeights,
}

fn default_domain_blocklist() -> Vec<String> {
    [
        "reddit.com",
        "facebook.com",
        "youtube.com",
        "twitter.com",
        "instagram.com",
        "forum",
        "pinterest",
        "thingiverse",
        "mdpi.com",
        "oscarliang.com",
        "getfpv.com/learn",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_title_blocklist() -> Vec<String> {
    [
        "collections",
        "products",
        "category",
        "browse",
        "shop",
        "rc model vehicles",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_min_price() -> f64 {
    0.50
}
fn default_min_confidence() -> f64 {
    0.6
}
fn default_search_limit() -> usize {
    5
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: EvaluationStrategy::default(),
            domain_blocklist: default_domain_blocklist(),
            title_blocklist: default_title_blocklist(),
            min_price: default_min_price(),
            min_confidence: default_min_confidence(),
            search_limit: default_search_limit(),
            fallback_to_list_price: false,
            text_inference: true,
            weights: ScoreWeights::default(),
        }
    }
}

/// Filesystem and renderer settings for one assembly validator.
///
/// Passed explicitly so that separate validators never share an output
/// directory unless they are configured to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// OpenSCAD library defining the `pro_*` part modules
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,

    #[serde(default = "default_openscad_bin")]
    pub openscad_bin: String,

    /// Hard ceiling for one render
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    /// Gap (mm) below which two bounding boxes count as touching
    #[serde(default)]
    pub collision_tolerance_mm: f64,
}

fn default_output_dir() -> PathBuf {
    AppConfig::config_dir().join("output")
}
fn default_library_path() -> PathBuf {
    AppConfig::config_dir().join("cad").join("library.scad")
}
fn default_openscad_bin() -> String {
    "openscad".into()
}
fn default_render_timeout() -> u64 {
    30
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            library_path: default_library_path(),
            openscad_bin: default_openscad_bin(),
            render_timeout_secs: default_render_timeout(),
            collision_tolerance_mm: 0.0,
        }
    }
}

impl AssemblyConfig {
    /// Defaults rooted at `dir` for both output and library.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            output_dir: dir.join("output"),
            library_path: dir.join("cad").join("library.scad"),
            ..Self::default()
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.forgebom/config.toml).
    ///
    /// Also checks environment variables:
    /// - `FORGEBOM_API_KEY`, then `OPENAI_API_KEY` (vision)
    /// - `FORGEBOM_SEARCH_KEY`, then `GOOGLE_API_KEY` (search)
    /// - `FORGEBOM_SEARCH_ENGINE` (search engine id)
    /// - `FORGEBOM_STRATEGY` (`vision` or `defaults`)
    /// - `FORGEBOM_OUTPUT_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.vision.api_key.is_none() {
            config.vision.api_key = std::env::var("FORGEBOM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if config.search.api_key.is_none() {
            config.search.api_key = std::env::var("FORGEBOM_SEARCH_KEY")
                .ok()
                .or_else(|| std::env::var("GOOGLE_API_KEY").ok());
        }

        if let Ok(engine) = std::env::var("FORGEBOM_SEARCH_ENGINE") {
            config.search.engine_id = Some(engine);
        }

        if let Ok(strategy) = std::env::var("FORGEBOM_STRATEGY") {
            config.fusion.strategy = strategy.parse()?;
        }

        if let Ok(dir) = std::env::var("FORGEBOM_OUTPUT_DIR") {
            config.assembly.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".forgebom")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fusion = &self.fusion;
        if !(0.0..=1.0).contains(&fusion.min_confidence) {
            return Err(ConfigError::ValidationError(
                "fusion.min_confidence must be between 0.0 and 1.0".into(),
            ));
        }

        if !fusion.min_price.is_finite() || fusion.min_price < 0.0 {
            return Err(ConfigError::ValidationError(
                "fusion.min_price must be a non-negative number".into(),
            ));
        }

        if fusion.search_limit == 0 {
            return Err(ConfigError::ValidationError(
                "fusion.search_limit must be at least 1".into(),
            ));
        }

        if self.assembly.render_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "assembly.render_timeout_secs must be at least 1".into(),
            ));
        }

        if self.assembly.collision_tolerance_mm < 0.0 {
            return Err(ConfigError::ValidationError(
                "assembly.collision_tolerance_mm must not be negative".into(),
            ));
        }

        Ok(())
    }

    /// Whether the live vision strategy can run.
    pub fn has_vision_key(&self) -> bool {
        self.vision.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
