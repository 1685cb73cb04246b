//! Placement planner: assembly steps to rigid transforms.
//!
//! Placement is a lookup from [`AssemblyAction`] to a [`PlacementRule`].
//! Actions without a rule place nothing; the plan only needs placement for
//! parts that can actually collide.

use forgebom_core::{AssemblyAction, AssemblyPlanStep};
use nalgebra::Isometry3;
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4};

/// Motor bells sit this far above the frame plate.
pub const MOTOR_MOUNT_HEIGHT_MM: f64 = 5.0;

/// Flight stack standoff clearance above the frame plate.
pub const STACK_CLEARANCE_MM: f64 = 8.0;

/// How one kind of step is laid out in space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementRule {
    /// Four X-configuration arm tips: 45°, 135°, 225°, 315° around the
    /// frame centre, at radius `(wheelbase / 2) * (√2 / 2)`.
    QuadCorners { height_mm: f64 },
    /// One copy on the frame centre.
    Centered { height_mm: f64 },
}

impl PlacementRule {
    pub fn for_action(action: AssemblyAction) -> Option<Self> {
        match action {
            AssemblyAction::MountMotors => Some(Self::QuadCorners {
                height_mm: MOTOR_MOUNT_HEIGHT_MM,
            }),
            AssemblyAction::InstallStack => Some(Self::Centered {
                height_mm: STACK_CLEARANCE_MM,
            }),
            _ => None,
        }
    }

    pub fn transforms(self, wheelbase: f64) -> Vec<Isometry3<f64>> {
        match self {
            Self::QuadCorners { height_mm } => {
                let radius = wheelbase / 2.0 * FRAC_1_SQRT_2;
                (0..4)
                    .map(|i| {
                        let angle = FRAC_PI_4 + FRAC_PI_2 * f64::from(i);
                        Isometry3::translation(
                            radius * angle.cos(),
                            radius * angle.sin(),
                            height_mm,
                        )
                    })
                    .collect()
            }
            Self::Centered { height_mm } => {
                vec![Isometry3::translation(0.0, 0.0, height_mm)]
            }
        }
    }
}

/// Transforms for one plan step. Unknown or unplaced actions yield none.
pub fn plan(step: &AssemblyPlanStep, wheelbase: f64) -> Vec<Isometry3<f64>> {
    PlacementRule::for_action(step.action)
        .map(|rule| rule.transforms(wheelbase))
        .unwrap_or_default()
}
