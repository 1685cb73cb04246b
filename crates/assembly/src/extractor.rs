//! Numeric engineering parameters pulled out of a bill of materials.

use forgebom_core::{BillOfMaterials, PartType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Camera modules wider than this are treated as digital (larger) systems.
const DIGITAL_CAMERA_WIDTH_MM: f64 = 19.0;

/// Read one numeric attribute from the first BOM row whose part type
/// contains `part_type_substring` (case-insensitive).
///
/// Total: a missing row, a missing attribute, or a value that is not a
/// number all yield `default`.
pub fn extract(
    bom: &BillOfMaterials,
    part_type_substring: &str,
    attribute: &str,
    default: f64,
) -> f64 {
    bom.find(part_type_substring)
        .and_then(|row| row.engineering_specs.get(attribute))
        .and_then(|value| value.as_f64())
        .unwrap_or(default)
}

/// The geometry inputs for every part type, as read from one BOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub parts: BTreeMap<PartType, BTreeMap<String, f64>>,
    pub is_digital_camera: bool,
}

impl ParameterSet {
    /// Extract every registry geometry input, falling back to its default.
    pub fn from_bom(bom: &BillOfMaterials) -> Self {
        let mut parts = BTreeMap::new();
        for part in PartType::ALL {
            let descriptor = part.descriptor();
            let values = descriptor
                .geometry_inputs
                .iter()
                .map(|input| {
                    let value = extract(bom, descriptor.bom_key, input.attribute, input.default);
                    (input.attribute.to_string(), value)
                })
                .collect();
            parts.insert(part, values);
        }

        let mut params = Self {
            parts,
            is_digital_camera: false,
        };
        params.is_digital_camera =
            params.get(PartType::CameraVtxKit, "width_mm") > DIGITAL_CAMERA_WIDTH_MM;
        params
    }

    /// A geometry input, or its registry default when it was never extracted.
    pub fn get(&self, part: PartType, attribute: &str) -> f64 {
        self.parts
            .get(&part)
            .and_then(|values| values.get(attribute))
            .copied()
            .or_else(|| {
                part.descriptor()
                    .geometry_inputs
                    .iter()
                    .find(|input| input.attribute == attribute)
                    .map(|input| input.default)
            })
            .unwrap_or(0.0)
    }

    pub fn wheelbase(&self) -> f64 {
        self.get(PartType::FrameKit, "wheelbase_mm")
    }
}
