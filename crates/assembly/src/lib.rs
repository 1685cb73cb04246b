//! Assembly geometry validation.
//!
//! Given a bill of materials and an assembly plan, the validator:
//!
//! 1. **Extracts** numeric geometry inputs for every part type, with defaults
//! 2. **Renders** one solid per part type, falling back to a placeholder
//! 3. **Places** the rendered meshes according to the plan's steps
//! 4. **Checks** the scene for intersections, reporting "unchecked" rather
//!    than "clean" when no backend could run

pub mod collision;
pub mod extractor;
pub mod geometry;
pub mod mesh;
pub mod planner;
pub mod validator;

pub use collision::{BoundingBoxChecker, CollisionChecker, NoCollisionBackend, Scene, SceneObject};
pub use extractor::{ParameterSet, extract};
pub use geometry::{GeometryArtifact, GeometryGenerator, OpenScadGenerator};
pub use mesh::{Aabb, Mesh};
pub use planner::{PlacementRule, plan};
pub use validator::{AssemblyReport, AssemblyValidator};
