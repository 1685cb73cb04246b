//! Engineering attributes and where they came from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::part::DefaultValue;

/// A single attribute value.
///
/// Live candidates only ever carry scalars. `Structured` exists so that
/// persisted BOM documents with nested values still deserialize; it never
/// coerces to a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Structured(serde_json::Value),
}

impl SpecValue {
    /// Convert an oracle value. Null, arrays, and objects are not scalars.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Numeric coercion. Text is accepted when it parses as a plain number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl From<DefaultValue> for SpecValue {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Number(n) => Self::Number(n),
            DefaultValue::Text(s) => Self::Text(s.to_string()),
        }
    }
}

impl From<f64> for SpecValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

/// One reading from the extraction oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    #[serde(default)]
    pub value: serde_json::Value,

    /// Oracle confidence in [0, 1]; a missing score counts as zero.
    #[serde(default)]
    pub confidence: f64,
}

/// Oracle output: attribute name to reading.
pub type AttributeReadings = BTreeMap<String, AttributeValue>;

/// How the attributes of a spec were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Vision,
    TextInference,
    SafeModeDefault,
    #[default]
    Unset,
}

impl Provenance {
    /// Label recorded on a composite part.
    pub fn source_method(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::TextInference => "text_inference",
            Self::SafeModeDefault => "safe_mode_default",
            Self::Unset => "raw_search",
        }
    }
}

/// Attributes that survived the confidence gate or were inferred.
///
/// The only way to add an attribute is [`EngineeringSpec::set`], which also
/// stamps the provenance, so a non-empty spec always carries a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineeringSpec {
    attributes: BTreeMap<String, SpecValue>,
    provenance: Provenance,
}

impl EngineeringSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: SpecValue, provenance: Provenance) {
        self.attributes.insert(name.into(), value);
        self.provenance = provenance;
    }

    pub fn get(&self, name: &str) -> Option<&SpecValue> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn attributes(&self) -> &BTreeMap<String, SpecValue> {
        &self.attributes
    }

    pub fn into_attributes(self) -> BTreeMap<String, SpecValue> {
        self.attributes
    }
}

/// The attribute schema the oracle is asked to fill for one part type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Instructions handed to the vision model.
    pub prompt_text: String,

    /// Expected output shape, keyed by attribute name.
    #[serde(default)]
    pub json_schema: serde_json::Value,
}

impl AttributeSchema {
    /// Attribute names declared by the schema.
    pub fn attribute_names(&self) -> Vec<&str> {
        self.json_schema
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
