//! `forgebom fuse`: pick the best listing for one part type.

use forgebom_config::{AppConfig, EvaluationStrategy, FusionConfig};
use forgebom_core::{
    AdapterError, BillOfMaterials, ComponentSearch, CompositePart, PartType, Scraper,
};
use forgebom_fusion::FusionOrchestrator;
use forgebom_providers::{GoogleSearchClient, HttpScraper, OpenAiVisionClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub struct FuseArgs {
    pub part_type: String,
    pub query: String,
    pub limit: Option<usize>,
    pub min_confidence: Option<f64>,
    pub safe_mode: bool,
    pub bom: Option<PathBuf>,
}

pub async fn run(args: FuseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let mut fusion = config.fusion.clone();
    if args.safe_mode {
        fusion.strategy = EvaluationStrategy::Defaults;
    }
    let limit = args.limit.unwrap_or(fusion.search_limit);
    let min_confidence = args.min_confidence.unwrap_or(fusion.min_confidence);
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err("--min-confidence must be between 0.0 and 1.0".into());
    }

    if PartType::parse(&args.part_type).is_none() {
        warn!(
            part_type = %args.part_type,
            "Unknown part type: no defaults or title inference will apply"
        );
    }

    let search = GoogleSearchClient::from_config(&config.search).map_err(|e| {
        eprintln!();
        eprintln!("  ERROR: Search is not configured: {e}");
        eprintln!();
        eprintln!("  Set these environment variables:");
        eprintln!("    FORGEBOM_SEARCH_KEY    = '<google api key>'");
        eprintln!("    FORGEBOM_SEARCH_ENGINE = '<programmable search engine id>'");
        eprintln!();
        e
    })?;
    let scraper = HttpScraper::from_config(&config.search);

    let orchestrator = build_orchestrator(&config, &fusion, Arc::new(search), Arc::new(scraper))
        .map_err(|e| {
            eprintln!();
            eprintln!("  ERROR: Vision service unavailable: {e}");
            eprintln!("  Set FORGEBOM_API_KEY, or rerun with --safe-mode.");
            eprintln!();
            e
        })?;

    println!(
        "🔎 Fusing {} from \"{}\" (strategy: {}, limit: {limit})",
        args.part_type,
        args.query,
        orchestrator.strategy()
    );

    let part = match orchestrator
        .fuse(&args.part_type, &args.query, limit, min_confidence)
        .await
    {
        Ok(part) => part,
        Err(e) => {
            println!("❌ {e}");
            return Err(e.into());
        }
    };

    print_part(&part);

    if let Some(path) = args.bom {
        let replaced = save_into_bom(&path, part)?;
        match replaced {
            Some(old) => println!(
                "\n💾 Replaced {} ({}) in {}",
                old.part_type,
                old.product_name,
                path.display()
            ),
            None => println!("\n💾 Added to {}", path.display()),
        }
    }

    Ok(())
}

/// Wire the orchestrator for the configured strategy.
pub fn build_orchestrator(
    config: &AppConfig,
    fusion: &FusionConfig,
    search: Arc<dyn ComponentSearch>,
    scraper: Arc<dyn Scraper>,
) -> Result<FusionOrchestrator, AdapterError> {
    match fusion.strategy {
        EvaluationStrategy::Vision => {
            let client = Arc::new(OpenAiVisionClient::from_config(&config.vision)?);
            Ok(FusionOrchestrator::from_config(
                fusion,
                search,
                scraper,
                client.clone(),
                client,
            ))
        }
        EvaluationStrategy::Defaults => Ok(FusionOrchestrator::safe_mode(fusion, search, scraper)),
    }
}

/// Read a BOM file. A missing file is an empty BOM.
pub fn load_bom(path: &Path) -> Result<BillOfMaterials, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(BillOfMaterials::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read BOM {}: {e}", path.display()))?;
    let bom = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid BOM {}: {e}", path.display()))?;
    Ok(bom)
}

/// Upsert `part` into the BOM at `path`. Returns the row it replaced.
pub fn save_into_bom(
    path: &Path,
    part: CompositePart,
) -> Result<Option<CompositePart>, Box<dyn std::error::Error>> {
    let mut bom = load_bom(path)?;
    let replaced = bom.upsert(part);
    std::fs::write(path, serde_json::to_string_pretty(&bom)?)?;
    Ok(replaced)
}

fn print_part(part: &CompositePart) {
    println!();
    println!("✅ {}: {}", part.part_type, part.product_name);
    println!("   Price:        ${:.2}", part.price);
    println!("   Source:       {}", part.source_url);
    if let Some(image) = &part.reference_image {
        println!("   Image:        {image}");
    }
    println!("   Data source:  {}", part.data_source_method);
    println!("   Alternatives: {}", part.alternatives_checked);
    if !part.engineering_specs.is_empty() {
        println!("   Specs:");
        for (name, value) in &part.engineering_specs {
            let shown = serde_json::to_string(value).unwrap_or_default();
            println!("     {name:<18} {shown}");
        }
    }
}
