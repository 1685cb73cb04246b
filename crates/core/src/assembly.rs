//! Assembly plans and collision verdicts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What an assembly step does. Unknown verbs are kept as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssemblyAction {
    MountMotors,
    InstallStack,
    SecureCamera,
    AttachProps,
    MountBattery,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyPlanStep {
    #[serde(default)]
    pub step_number: Option<u32>,

    #[serde(default)]
    pub title: Option<String>,

    pub action: AssemblyAction,

    pub target_part_type: String,

    #[serde(default)]
    pub base_part_type: Option<String>,

    #[serde(default)]
    pub details: Option<String>,

    #[serde(default)]
    pub fasteners_used: Option<String>,
}

impl AssemblyPlanStep {
    pub fn new(action: AssemblyAction, target_part_type: impl Into<String>) -> Self {
        Self {
            step_number: None,
            title: None,
            action,
            target_part_type: target_part_type.into(),
            base_part_type: None,
            details: None,
            fasteners_used: None,
        }
    }

    pub fn on_base(mut self, base_part_type: impl Into<String>) -> Self {
        self.base_part_type = Some(base_part_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fastener {
    pub item: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub usage: String,
}

/// The assembly blueprint produced upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyPlan {
    #[serde(default = "default_true")]
    pub is_buildable: bool,

    #[serde(default)]
    pub incompatibility_reason: Option<String>,

    #[serde(default)]
    pub required_fasteners: Vec<Fastener>,

    #[serde(default, rename = "blueprint_steps", alias = "steps")]
    pub steps: Vec<AssemblyPlanStep>,
}

fn default_true() -> bool {
    true
}

impl AssemblyPlan {
    pub fn from_steps(steps: Vec<AssemblyPlanStep>) -> Self {
        Self {
            is_buildable: true,
            incompatibility_reason: None,
            required_fasteners: Vec::new(),
            steps,
        }
    }
}

/// Whether the collision backend actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionStatus {
    Checked,
    Unchecked,
}

/// Outcome of one validation run.
///
/// `collided == false` alone does not mean the assembly is clean; look at
/// `status` to tell a clean check from a skipped one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionReport {
    pub status: CollisionStatus,
    pub collided: bool,
    pub colliding_parts: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colliding_pairs: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unchecked_reason: Option<String>,
}

impl CollisionReport {
    /// A report from a backend that ran.
    pub fn checked(pairs: Vec<(String, String)>) -> Self {
        let colliding_parts: BTreeSet<String> = pairs
            .iter()
            .flat_map(|(a, b)| [a.clone(), b.clone()])
            .collect();
        Self {
            status: CollisionStatus::Checked,
            collided: !pairs.is_empty(),
            colliding_parts,
            colliding_pairs: pairs,
            unchecked_reason: None,
        }
    }

    /// A report for a run where the backend was missing or failed.
    pub fn unchecked(reason: impl Into<String>) -> Self {
        Self {
            status: CollisionStatus::Unchecked,
            collided: false,
            colliding_parts: BTreeSet::new(),
            colliding_pairs: Vec::new(),
            unchecked_reason: Some(reason.into()),
        }
    }

    pub fn is_checked(&self) -> bool {
        self.status == CollisionStatus::Checked
    }

    /// Checked and nothing intersected.
    pub fn is_clean(&self) -> bool {
        self.is_checked() && !self.collided
    }
}
