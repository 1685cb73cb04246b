//! Part-type registry.
//!
//! Every canonical drone part type is described once here: how BOM rows are
//! matched to it, which attributes the safe-mode defaults provider writes,
//! which attribute is critical enough to infer from a listing title, and
//! which numeric inputs the geometry generator reads. Adding a part type is
//! a new table entry, not a new conditional branch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of part types the assembly pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartType {
    #[serde(rename = "Frame_Kit")]
    FrameKit,
    #[serde(rename = "Motors")]
    Motors,
    #[serde(rename = "Propellers")]
    Propellers,
    #[serde(rename = "FC_Stack")]
    FcStack,
    #[serde(rename = "Camera_VTX_Kit")]
    CameraVtxKit,
    #[serde(rename = "Battery")]
    Battery,
    #[serde(rename = "Companion_Computer")]
    CompanionComputer,
}

/// A registry default written by the safe-mode provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Number(f64),
    Text(&'static str),
}

/// Deterministic title parsers available for fallback inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleInference {
    /// Motor bolt pattern from `16x16` or a stator code like `2207`.
    MotorMounting,
    /// Propeller diameter in millimetres from inch sizes or prop codes.
    PropDiameter,
}

/// The attribute a part type cannot be assembled without.
#[derive(Debug, Clone, Copy)]
pub struct CriticalAttribute {
    pub attribute: &'static str,
    pub inference: TitleInference,
}

/// A numeric input the geometry generator needs, with its fallback value.
#[derive(Debug, Clone, Copy)]
pub struct GeometryInput {
    pub attribute: &'static str,
    pub default: f64,
}

/// One registry row.
#[derive(Debug)]
pub struct PartDescriptor {
    pub part_type: PartType,
    /// Name used in BOM rows, plans, and artifact file names.
    pub canonical_name: &'static str,
    /// Case-insensitive substring used to find this part's BOM row.
    pub bom_key: &'static str,
    pub safe_defaults: &'static [(&'static str, DefaultValue)],
    pub critical_attribute: Option<CriticalAttribute>,
    pub geometry_inputs: &'static [GeometryInput],
}

static REGISTRY: [PartDescriptor; 7] = [
    PartDescriptor {
        part_type: PartType::FrameKit,
        canonical_name: "Frame_Kit",
        bom_key: "frame",
        safe_defaults: &[],
        critical_attribute: None,
        geometry_inputs: &[GeometryInput {
            attribute: "wheelbase_mm",
            default: 225.0,
        }],
    },
    PartDescriptor {
        part_type: PartType::Motors,
        canonical_name: "Motors",
        bom_key: "motor",
        safe_defaults: &[("mounting_mm", DefaultValue::Number(16.0))],
        critical_attribute: Some(CriticalAttribute {
            attribute: "mounting_mm",
            inference: TitleInference::MotorMounting,
        }),
        geometry_inputs: &[GeometryInput {
            attribute: "stator_size",
            default: 2207.0,
        }],
    },
    PartDescriptor {
        part_type: PartType::Propellers,
        canonical_name: "Propellers",
        bom_key: "propeller",
        safe_defaults: &[("diameter_mm", DefaultValue::Number(127.0))],
        critical_attribute: Some(CriticalAttribute {
            attribute: "diameter_mm",
            inference: TitleInference::PropDiameter,
        }),
        geometry_inputs: &[GeometryInput {
            attribute: "diameter_mm",
            default: 127.0,
        }],
    },
    PartDescriptor {
        part_type: PartType::FcStack,
        canonical_name: "FC_Stack",
        bom_key: "fc",
        safe_defaults: &[
            ("mounting_mm", DefaultValue::Number(30.5)),
            ("usb_orientation", DefaultValue::Text("SIDE")),
        ],
        critical_attribute: None,
        geometry_inputs: &[GeometryInput {
            attribute: "mounting_mm",
            default: 30.5,
        }],
    },
    PartDescriptor {
        part_type: PartType::CameraVtxKit,
        canonical_name: "Camera_VTX_Kit",
        bom_key: "camera",
        safe_defaults: &[("width_mm", DefaultValue::Number(20.0))],
        critical_attribute: None,
        geometry_inputs: &[GeometryInput {
            attribute: "width_mm",
            default: 19.0,
        }],
    },
    PartDescriptor {
        part_type: PartType::Battery,
        canonical_name: "Battery",
        bom_key: "battery",
        safe_defaults: &[],
        critical_attribute: None,
        geometry_inputs: &[
            GeometryInput {
                attribute: "cells",
                default: 6.0,
            },
            GeometryInput {
                attribute: "capacity_mah",
                default: 1300.0,
            },
        ],
    },
    PartDescriptor {
        part_type: PartType::CompanionComputer,
        canonical_name: "Companion_Computer",
        bom_key: "companion",
        safe_defaults: &[],
        critical_attribute: None,
        geometry_inputs: &[],
    },
];

impl PartType {
    /// All part types in registry order.
    pub const ALL: [PartType; 7] = [
        PartType::FrameKit,
        PartType::Motors,
        PartType::Propellers,
        PartType::FcStack,
        PartType::CameraVtxKit,
        PartType::Battery,
        PartType::CompanionComputer,
    ];

    pub fn descriptor(self) -> &'static PartDescriptor {
        // ALL and REGISTRY share an order.
        &REGISTRY[self as usize]
    }

    pub fn canonical_name(self) -> &'static str {
        self.descriptor().canonical_name
    }

    /// Resolve a free-form part type string.
    ///
    /// Exact canonical names win (case-insensitive); otherwise the first
    /// registry entry whose BOM key occurs in the input is returned.
    pub fn parse(input: &str) -> Option<PartType> {
        let needle = input.trim();
        if needle.is_empty() {
            return None;
        }
        if let Some(d) = REGISTRY
            .iter()
            .find(|d| d.canonical_name.eq_ignore_ascii_case(needle))
        {
            return Some(d.part_type);
        }
        let lower = needle.to_lowercase();
        REGISTRY
            .iter()
            .find(|d| lower.contains(d.bom_key))
            .map(|d| d.part_type)
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for PartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartType::parse(s).ok_or_else(|| format!("unknown part type: {s}"))
    }
}
