//! Scenes of placed meshes and the collision backends that inspect them.

use forgebom_core::CollisionError;
use nalgebra::Isometry3;
use std::sync::Arc;

use crate::mesh::Mesh;

/// One placed copy of a part.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub mesh: Arc<Mesh>,
    pub transform: Isometry3<f64>,
}

/// Named, transformed meshes for one validation run.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object. Returns `false` (and adds nothing) if the name is taken.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        mesh: Arc<Mesh>,
        transform: Isometry3<f64>,
    ) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.objects.push(SceneObject {
            name,
            mesh,
            transform,
        });
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.iter().any(|o| o.name == name)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.iter().map(|o| o.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Reports which scene objects intersect.
pub trait CollisionChecker: Send + Sync {
    fn name(&self) -> &str;

    /// Every intersecting pair of object names, each pair once.
    fn check(&self, scene: &Scene) -> Result<Vec<(String, String)>, CollisionError>;
}

/// Broad-phase checker: world-space axis-aligned bounding box overlap.
///
/// Conservative for rotated or concave parts (it can report overlaps that
/// exact mesh tests would not), never misses a true intersection.
#[derive(Debug, Clone, Default)]
pub struct BoundingBoxChecker {
    tolerance_mm: f64,
}

impl BoundingBoxChecker {
    pub fn new(tolerance_mm: f64) -> Self {
        Self { tolerance_mm }
    }
}

impl CollisionChecker for BoundingBoxChecker {
    fn name(&self) -> &str {
        "bounding_box"
    }

    fn check(&self, scene: &Scene) -> Result<Vec<(String, String)>, CollisionError> {
        let boxes: Vec<_> = scene
            .objects()
            .iter()
            .filter_map(|o| {
                o.mesh
                    .bounds()
                    .map(|b| (o.name.as_str(), b.transformed(&o.transform)))
            })
            .collect();

        let mut pairs = Vec::new();
        for (i, (name_a, box_a)) in boxes.iter().enumerate() {
            for (name_b, box_b) in &boxes[i + 1..] {
                if box_a.intersects(box_b, self.tolerance_mm) {
                    pairs.push((name_a.to_string(), name_b.to_string()));
                }
            }
        }
        Ok(pairs)
    }
}

/// Stand-in for environments without a collision kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollisionBackend;

impl CollisionChecker for NoCollisionBackend {
    fn name(&self) -> &str {
        "none"
    }

    fn check(&self, _scene: &Scene) -> Result<Vec<(String, String)>, CollisionError> {
        Err(CollisionError::Unavailable(
            "no collision backend configured".into(),
        ))
    }
}
