//! Assembly validator: BOM + plan in, artifacts and a collision verdict out.
//!
//! Nothing in here fails the whole run. A part that will not render gets a
//! placeholder, a mesh that will not load is left out of the scene, and a
//! collision backend that is missing or errors yields an `unchecked` report.

use chrono::{DateTime, Utc};
use forgebom_config::AssemblyConfig;
use forgebom_core::{AssemblyPlan, BillOfMaterials, CollisionReport, PartType};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collision::{CollisionChecker, Scene};
use crate::extractor::ParameterSet;
use crate::geometry::{GeometryArtifact, GeometryGenerator, write_placeholder};
use crate::mesh::Mesh;
use crate::planner;

/// Everything one validation run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub project_id: String,
    /// The numeric inputs every part was rendered from.
    pub parameters: ParameterSet,
    /// One entry per part type; `None` only if even the placeholder failed.
    pub artifacts: BTreeMap<PartType, Option<GeometryArtifact>>,
    /// Names of the objects that were placed in the collision scene.
    pub scene_objects: Vec<String>,
    pub collision_report: CollisionReport,
    pub generated_at: DateTime<Utc>,
}

pub struct AssemblyValidator {
    config: AssemblyConfig,
    generator: Arc<dyn GeometryGenerator>,
    checker: Arc<dyn CollisionChecker>,
}

impl AssemblyValidator {
    pub fn new(
        config: AssemblyConfig,
        generator: Arc<dyn GeometryGenerator>,
        checker: Arc<dyn CollisionChecker>,
    ) -> Self {
        Self {
            config,
            generator,
            checker,
        }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub async fn validate(
        &self,
        project_id: &str,
        plan: &AssemblyPlan,
        bom: &BillOfMaterials,
    ) -> AssemblyReport {
        info!(
            project_id = %project_id,
            bom_rows = bom.len(),
            steps = plan.steps.len(),
            generator = self.generator.name(),
            checker = self.checker.name(),
            "Validating assembly"
        );
        if !plan.is_buildable {
            warn!(
                reason = plan.incompatibility_reason.as_deref().unwrap_or("unspecified"),
                "Plan is marked unbuildable; validating geometry anyway"
            );
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.config.output_dir).await {
            warn!(
                dir = %self.config.output_dir.display(),
                error = %e,
                "Could not create output directory"
            );
        }

        // ── Step 1: Parameters ──
        let parameters = ParameterSet::from_bom(bom);

        // ── Step 2: Geometry, soft-failing to placeholders ──
        let mut artifacts = BTreeMap::new();
        for part in PartType::ALL {
            let artifact = self.render(project_id, part, &parameters).await;
            artifacts.insert(part, artifact);
        }

        // ── Step 3: Load meshes ──
        let meshes = load_meshes(&artifacts).await;

        // ── Step 4: Scene ──
        let scene = build_scene(plan, &meshes, parameters.wheelbase());
        let scene_objects = scene.names();

        // ── Step 5: Collision check ──
        let collision_report = self.check(scene).await;
        if collision_report.collided {
            warn!(parts = ?collision_report.colliding_parts, "Collision detected");
        }

        info!(
            project_id = %project_id,
            scene_objects = scene_objects.len(),
            status = ?collision_report.status,
            collided = collision_report.collided,
            "Assembly validation complete"
        );

        AssemblyReport {
            project_id: project_id.to_string(),
            parameters,
            artifacts,
            scene_objects,
            collision_report,
            generated_at: Utc::now(),
        }
    }

    async fn render(
        &self,
        project_id: &str,
        part: PartType,
        params: &ParameterSet,
    ) -> Option<GeometryArtifact> {
        match self.generator.generate(project_id, part, params).await {
            Ok(path) => Some(GeometryArtifact {
                path,
                placeholder: false,
            }),
            Err(e) => {
                warn!(part = %part, error = %e, "Render failed; substituting placeholder");
                match write_placeholder(&self.config.output_dir, project_id, part).await {
                    Ok(path) => Some(GeometryArtifact {
                        path,
                        placeholder: true,
                    }),
                    Err(e) => {
                        warn!(part = %part, error = %e, "Could not write placeholder");
                        None
                    }
                }
            }
        }
    }

    /// Run the backend off the async runtime. Any error or panic becomes an
    /// unchecked report.
    async fn check(&self, scene: Scene) -> CollisionReport {
        let checker = self.checker.clone();
        match tokio::task::spawn_blocking(move || checker.check(&scene)).await {
            Ok(Ok(pairs)) => CollisionReport::checked(pairs),
            Ok(Err(e)) => {
                warn!(error = %e, "Skipping collision check");
                CollisionReport::unchecked(e.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Collision backend aborted");
                CollisionReport::unchecked(format!("collision backend aborted: {e}"))
            }
        }
    }
}

async fn load_meshes(
    artifacts: &BTreeMap<PartType, Option<GeometryArtifact>>,
) -> BTreeMap<PartType, Arc<Mesh>> {
    let mut meshes = BTreeMap::new();
    for (part, artifact) in artifacts {
        let Some(artifact) = artifact else { continue };
        match Mesh::load(&artifact.path).await {
            Ok(mesh) if !mesh.is_empty() => {
                meshes.insert(*part, Arc::new(mesh));
            }
            Ok(_) => debug!(part = %part, "Skipping empty mesh"),
            Err(e) => debug!(part = %part, error = %e, "Skipping unloadable mesh"),
        }
    }
    meshes
}

/// Frame at the origin, then every placed step whose target has a mesh.
fn build_scene(
    plan: &AssemblyPlan,
    meshes: &BTreeMap<PartType, Arc<Mesh>>,
    wheelbase: f64,
) -> Scene {
    let mut scene = Scene::new();
    if let Some(frame) = meshes.get(&PartType::FrameKit) {
        scene.add(
            PartType::FrameKit.canonical_name(),
            frame.clone(),
            Isometry3::identity(),
        );
    }

    for step in &plan.steps {
        let Some(part) = PartType::parse(&step.target_part_type) else {
            debug!(part_type = %step.target_part_type, "Step targets an unknown part type");
            continue;
        };
        let Some(mesh) = meshes.get(&part) else {
            continue;
        };

        let transforms = planner::plan(step, wheelbase);
        let multiple = transforms.len() > 1;
        for (i, transform) in transforms.into_iter().enumerate() {
            let name = if multiple {
                format!("{}_{i}", part.canonical_name())
            } else {
                part.canonical_name().to_string()
            };
            if !scene.add(name.clone(), mesh.clone(), transform) {
                debug!(object = %name, "Already placed; ignoring repeated step");
            }
        }
    }
    scene
}
