//! `forgebom validate`: render a BOM and check the assembled scene.

use forgebom_assembly::{
    AssemblyReport, AssemblyValidator, BoundingBoxChecker, CollisionChecker, NoCollisionBackend,
    OpenScadGenerator,
};
use forgebom_config::AppConfig;
use forgebom_core::{AssemblyAction, AssemblyPlan, AssemblyPlanStep, PartType};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::fuse::load_bom;

pub struct ValidateArgs {
    pub bom: PathBuf,
    pub plan: Option<PathBuf>,
    pub project_id: Option<String>,
    pub no_collision: bool,
    pub report: Option<PathBuf>,
}

pub async fn run(args: ValidateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !args.bom.exists() {
        return Err(format!("BOM file not found: {}", args.bom.display()).into());
    }
    let bom = load_bom(&args.bom)?;
    let plan = match &args.plan {
        Some(path) => load_plan(path)?,
        None => standard_quad_plan(),
    };
    let project_id = args
        .project_id
        .unwrap_or_else(|| format!("proj_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]));

    let checker: Arc<dyn CollisionChecker> = if args.no_collision {
        Arc::new(NoCollisionBackend)
    } else {
        Arc::new(BoundingBoxChecker::new(
            config.assembly.collision_tolerance_mm,
        ))
    };
    let generator = Arc::new(OpenScadGenerator::from_config(&config.assembly));
    let validator = AssemblyValidator::new(config.assembly.clone(), generator, checker);

    println!(
        "📐 Validating {} ({} BOM rows, {} plan steps)",
        project_id,
        bom.len(),
        plan.steps.len()
    );
    if !plan.is_buildable {
        println!(
            "⚠️  Plan marked not buildable: {}",
            plan.incompatibility_reason.as_deref().unwrap_or("no reason given")
        );
    }

    let report = validator.validate(&project_id, &plan, &bom).await;
    print_report(&report);

    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("\n💾 Report written to {}", path.display());
    }

    if report.collision_report.collided {
        return Err(format!(
            "{} collision(s) detected",
            report.collision_report.colliding_pairs.len()
        )
        .into());
    }

    Ok(())
}

fn load_plan(path: &Path) -> Result<AssemblyPlan, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read plan {}: {e}", path.display()))?;
    let plan = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid plan {}: {e}", path.display()))?;
    Ok(plan)
}

/// Motors on the arms and the stack in the middle of the frame.
pub fn standard_quad_plan() -> AssemblyPlan {
    let frame = PartType::FrameKit.canonical_name();
    AssemblyPlan::from_steps(vec![
        AssemblyPlanStep::new(AssemblyAction::MountMotors, PartType::Motors.canonical_name())
            .on_base(frame),
        AssemblyPlanStep::new(AssemblyAction::InstallStack, PartType::FcStack.canonical_name())
            .on_base(frame),
    ])
}

fn print_report(report: &AssemblyReport) {
    println!();
    println!("   Parameters:");
    for (part, values) in &report.parameters.parts {
        let shown: Vec<String> = values.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("     {:<20} {}", part.canonical_name(), shown.join(", "));
    }

    println!("   Artifacts:");
    for (part, artifact) in &report.artifacts {
        match artifact {
            Some(a) if a.placeholder => println!(
                "     ⚠️  {:<17} {} (placeholder)",
                part.canonical_name(),
                a.path.display()
            ),
            Some(a) => println!("     ✅ {:<17} {}", part.canonical_name(), a.path.display()),
            None => println!("     ❌ {:<17} no artifact", part.canonical_name()),
        }
    }

    println!("   Scene:   {}", report.scene_objects.join(", "));

    let collision = &report.collision_report;
    if !collision.is_checked() {
        println!(
            "   ⚠️  Collisions unchecked: {}",
            collision.unchecked_reason.as_deref().unwrap_or("unknown reason")
        );
    } else if collision.is_clean() {
        println!("   ✅ No collisions");
    } else {
        for (a, b) in &collision.colliding_pairs {
            println!("   ❌ {a} intersects {b}");
        }
    }
}
