//! Evaluated candidates, composite parts, and the bill of materials.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::spec::{EngineeringSpec, SpecValue};

/// A listing that passed evaluation. Lives only for one fusion call.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedCandidate {
    pub product_name: String,
    pub price: f64,
    pub source_url: String,
    pub image_url: Option<String>,
    pub engineering_data: EngineeringSpec,
    /// Position in the search results; ranking ties fall back to this.
    pub discovery_index: usize,
}

/// The trusted record produced by one successful fusion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositePart {
    pub part_type: String,
    pub product_name: String,
    pub price: f64,
    pub source_url: String,

    #[serde(default)]
    pub engineering_specs: BTreeMap<String, SpecValue>,

    #[serde(default)]
    pub reference_image: Option<String>,

    #[serde(default = "default_source_method")]
    pub data_source_method: String,

    #[serde(default)]
    pub alternatives_checked: usize,
}

fn default_source_method() -> String {
    "raw_search".into()
}

impl CompositePart {
    /// Materialize a ranking winner.
    pub fn from_winner(
        part_type: impl Into<String>,
        winner: EvaluatedCandidate,
        alternatives_checked: usize,
    ) -> Self {
        let method = winner.engineering_data.provenance().source_method().to_string();
        Self {
            part_type: part_type.into(),
            product_name: winner.product_name,
            price: winner.price,
            source_url: winner.source_url,
            engineering_specs: winner.engineering_data.into_attributes(),
            reference_image: winner.image_url,
            data_source_method: method,
            alternatives_checked,
        }
    }
}

/// Ordered BOM rows. Downstream expects one row per part type, but the
/// model does not enforce it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillOfMaterials(Vec<CompositePart>);

impl BillOfMaterials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: CompositePart) {
        self.0.push(part);
    }

    /// Replace the row with the same part type, or append. Returns the
    /// replaced row.
    pub fn upsert(&mut self, part: CompositePart) -> Option<CompositePart> {
        match self
            .0
            .iter_mut()
            .find(|p| p.part_type.eq_ignore_ascii_case(&part.part_type))
        {
            Some(existing) => Some(std::mem::replace(existing, part)),
            None => {
                self.0.push(part);
                None
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompositePart> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First row whose part type contains `needle`, case-insensitively.
    pub fn find(&self, needle: &str) -> Option<&CompositePart> {
        let needle = needle.to_lowercase();
        self.0
            .iter()
            .find(|p| p.part_type.to_lowercase().contains(&needle))
    }

    /// Sum of all row prices.
    pub fn total_price(&self) -> f64 {
        self.0.iter().map(|p| p.price).sum()
    }
}

impl From<Vec<CompositePart>> for BillOfMaterials {
    fn from(parts: Vec<CompositePart>) -> Self {
        Self(parts)
    }
}

impl FromIterator<CompositePart> for BillOfMaterials {
    fn from_iter<I: IntoIterator<Item = CompositePart>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a BillOfMaterials {
    type Item = &'a CompositePart;
    type IntoIter = std::slice::Iter<'a, CompositePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
