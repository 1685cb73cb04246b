//! End-to-end tests for the ForgeBOM pipeline.
//!
//! These tests run candidate fusion for several part types against scripted
//! search, scraping, and vision collaborators, collect the winners into a
//! bill of materials, and validate the assembled geometry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use forgebom_assembly::geometry::artifact_stem;
use forgebom_assembly::{
    AssemblyValidator, BoundingBoxChecker, GeometryGenerator, NoCollisionBackend, ParameterSet,
};
use forgebom_config::{AppConfig, AssemblyConfig, EvaluationStrategy, FusionConfig};
use forgebom_core::{
    AdapterError, AssemblyAction, AssemblyPlan, AssemblyPlanStep, AttributeExtractor,
    AttributeReadings, AttributeSchema, AttributeValue, BillOfMaterials, ComponentSearch,
    FusionError, GeometryError, PartType, PriceTag, RawCandidate, ScrapeSession, ScrapedPage,
    Scraper, SpecValue,
};
use forgebom_fusion::{FusionOrchestrator, RegistrySchemaGenerator};
use serde_json::json;

// ── Scripted collaborators ───────────────────────────────────────────────

/// Search results keyed by query.
#[derive(Default)]
struct CatalogSearch {
    results: HashMap<String, Vec<RawCandidate>>,
}

impl CatalogSearch {
    fn with(mut self, query: &str, results: Vec<RawCandidate>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }
}

#[async_trait]
impl ComponentSearch for CatalogSearch {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn find_components(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawCandidate>, AdapterError> {
        let mut hits = self.results.get(query).cloned().unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Product pages keyed by link, with session bookkeeping.
#[derive(Default)]
struct CatalogScraper {
    pages: Arc<HashMap<String, ScrapedPage>>,
    visited: Arc<Mutex<Vec<String>>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl CatalogScraper {
    fn new(pages: Vec<(&str, ScrapedPage)>) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .into_iter()
                    .map(|(link, page)| (link.to_string(), page))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

struct CatalogSession {
    pages: Arc<HashMap<String, ScrapedPage>>,
    visited: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Scraper for CatalogScraper {
    async fn open_session(&self) -> Result<Box<dyn ScrapeSession>, AdapterError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CatalogSession {
            pages: Arc::clone(&self.pages),
            visited: Arc::clone(&self.visited),
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[async_trait]
impl ScrapeSession for CatalogSession {
    async fn scrape_product_page(&self, link: &str) -> Result<Option<ScrapedPage>, AdapterError> {
        self.visited.lock().unwrap().push(link.to_string());
        match self.pages.get(link) {
            Some(page) => Ok(Some(page.clone())),
            None => Err(AdapterError::Network(format!("404 for {link}"))),
        }
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Vision readings keyed by image URL. Unknown images are unreadable.
#[derive(Default)]
struct CatalogOracle {
    readings: HashMap<String, AttributeReadings>,
    calls: AtomicUsize,
}

impl CatalogOracle {
    fn with(mut self, image_url: &str, readings: &[(&str, serde_json::Value, f64)]) -> Self {
        let readings = readings
            .iter()
            .map(|(name, value, confidence)| {
                (
                    name.to_string(),
                    AttributeValue {
                        value: value.clone(),
                        confidence: *confidence,
                    },
                )
            })
            .collect();
        self.readings.insert(image_url.to_string(), readings);
        self
    }
}

#[async_trait]
impl AttributeExtractor for CatalogOracle {
    async fn extract_attributes(
        &self,
        image_url: &str,
        _part_type: &str,
        _schema: &AttributeSchema,
    ) -> Result<AttributeReadings, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.readings
            .get(image_url)
            .cloned()
            .ok_or_else(|| AdapterError::Oracle(format!("cannot read {image_url}")))
    }
}

/// Writes an axis-aligned box per part, sized from the extracted parameters.
struct ParametricBoxGenerator {
    output_dir: PathBuf,
    frame_thickness_mm: f64,
}

impl ParametricBoxGenerator {
    /// (half width, height) of the solid for a part.
    fn envelope(&self, part: PartType, params: &ParameterSet) -> (f64, f64) {
        match part {
            PartType::FrameKit => (params.wheelbase() / 2.0, self.frame_thickness_mm),
            PartType::Motors => (14.0, 20.0),
            PartType::FcStack => ((params.get(part, "mounting_mm") + 6.0) / 2.0, 10.0),
            _ => (10.0, 10.0),
        }
    }
}

#[async_trait]
impl GeometryGenerator for ParametricBoxGenerator {
    fn name(&self) -> &str {
        "parametric_box"
    }

    async fn generate(
        &self,
        project_id: &str,
        part: PartType,
        params: &ParameterSet,
    ) -> Result<PathBuf, GeometryError> {
        let (half, height) = self.envelope(part, params);
        let stl = format!(
            "solid {part}\nfacet normal 0 0 0\nouter loop\n\
             vertex {lo} {lo} 0\nvertex {half} {lo} 0\nvertex {half} {half} {height}\n\
             endloop\nendfacet\nendsolid {part}\n",
            lo = -half
        );
        let path = self
            .output_dir
            .join(format!("{}.stl", artifact_stem(project_id, part)));
        tokio::fs::write(&path, stl)
            .await
            .map_err(|e| GeometryError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(path)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn page(price: f64, image: &str) -> ScrapedPage {
    ScrapedPage {
        price: Some(PriceTag::Amount(price)),
        image_url: Some(image.to_string()),
        text: String::new(),
    }
}

struct Marketplace {
    search: Arc<CatalogSearch>,
    scraper: Arc<CatalogScraper>,
    oracle: Arc<CatalogOracle>,
}

impl Marketplace {
    fn new() -> Self {
        let search = CatalogSearch::default()
            .with(
                "5 inch fpv frame",
                vec![RawCandidate::new("https://parts.test/frame-250", "Apex 250mm 5 inch Frame Kit")],
            )
            .with(
                "2207 fpv motor",
                vec![RawCandidate::new(
                    "https://parts.test/velox-2207",
                    "T-Motor Velox V2 2207 1750KV",
                )],
            )
            .with(
                "f405 stack",
                vec![
                    RawCandidate::new("https://www.youtube.com/watch?v=stack", "F405 stack build video"),
                    RawCandidate::new("https://parts.test/f405", "SpeedyBee F405 V4 30x30 Stack"),
                ],
            )
            .with(
                "5 inch propeller",
                vec![
                    RawCandidate::new("https://www.reddit.com/r/fpv/props", "Best 5 inch props?"),
                    RawCandidate::new("https://parts.test/cheap-prop", "Generic 5 inch prop"),
                    RawCandidate::new("https://parts.test/hqprop", "HQProp 5x4.3x3"),
                ],
            );

        let scraper = CatalogScraper::new(vec![
            ("https://parts.test/frame-250", page(49.99, "https://img.test/frame.jpg")),
            ("https://parts.test/velox-2207", page(24.99, "https://img.test/velox.jpg")),
            ("https://parts.test/f405", page(69.99, "https://img.test/f405.jpg")),
            ("https://parts.test/cheap-prop", page(0.30, "https://img.test/cheap.jpg")),
            ("https://parts.test/hqprop", page(3.99, "https://img.test/hq.jpg")),
        ]);

        let oracle = CatalogOracle::default()
            .with("https://img.test/frame.jpg", &[("wheelbase_mm", json!(250.0), 0.9)])
            // Too unsure to keep; the title carries the stator code instead.
            .with("https://img.test/velox.jpg", &[("mounting_mm", json!(19.0), 0.4)])
            .with(
                "https://img.test/f405.jpg",
                &[
                    ("mounting_mm", json!(30.5), 0.95),
                    ("usb_orientation", json!("SIDE"), 0.8),
                ],
            )
            .with("https://img.test/cheap.jpg", &[("diameter_mm", json!(125.0), 0.9)])
            .with("https://img.test/hq.jpg", &[("diameter_mm", json!(127.0), 0.85)]);

        Self {
            search: Arc::new(search),
            scraper: Arc::new(scraper),
            oracle: Arc::new(oracle),
        }
    }

    fn orchestrator(&self, config: &FusionConfig) -> FusionOrchestrator {
        FusionOrchestrator::from_config(
            config,
            self.search.clone(),
            self.scraper.clone(),
            Arc::new(RegistrySchemaGenerator),
            self.oracle.clone(),
        )
    }

    async fn fuse_bom(&self) -> BillOfMaterials {
        let orchestrator = self.orchestrator(&FusionConfig::default());
        let mut bom = BillOfMaterials::new();
        for (part_type, query) in [
            ("Frame_Kit", "5 inch fpv frame"),
            ("Motors", "2207 fpv motor"),
            ("FC_Stack", "f405 stack"),
            ("Propellers", "5 inch propeller"),
        ] {
            let part = orchestrator
                .fuse(part_type, query, 5, 0.6)
                .await
                .unwrap_or_else(|e| panic!("{part_type} failed: {e}"));
            bom.upsert(part);
        }
        bom
    }
}

fn quad_plan() -> AssemblyPlan {
    AssemblyPlan::from_steps(vec![
        AssemblyPlanStep::new(AssemblyAction::MountMotors, "Motors").on_base("Frame_Kit"),
        AssemblyPlanStep::new(AssemblyAction::InstallStack, "FC_Stack").on_base("Frame_Kit"),
        AssemblyPlanStep::new(AssemblyAction::AttachProps, "Propellers").on_base("Motors"),
    ])
}

fn validator(dir: &std::path::Path, frame_thickness_mm: f64) -> AssemblyValidator {
    let config = AssemblyConfig::rooted_at(dir);
    let generator = ParametricBoxGenerator {
        output_dir: config.output_dir.clone(),
        frame_thickness_mm,
    };
    AssemblyValidator::new(
        config,
        Arc::new(generator),
        Arc::new(BoundingBoxChecker::default()),
    )
}

// ── E2E: Candidate fusion ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_propeller_fusion_filters_gates_and_prefers_vision() {
    let market = Marketplace::new();
    let orchestrator = market.orchestrator(&FusionConfig::default());

    let part = orchestrator
        .fuse("Propellers", "5 inch propeller", 5, 0.6)
        .await
        .unwrap();

    assert_eq!(part.product_name, "HQProp 5x4.3x3");
    assert_eq!(part.price, 3.99);
    assert_eq!(part.data_source_method, "vision");
    assert_eq!(part.alternatives_checked, 1);
    assert_eq!(part.engineering_specs.len(), 1);
    assert_eq!(
        part.engineering_specs.get("diameter_mm"),
        Some(&SpecValue::Number(127.0))
    );
    assert_eq!(part.reference_image.as_deref(), Some("https://img.test/hq.jpg"));

    let visited = market.scraper.visited();
    assert!(!visited.iter().any(|l| l.contains("reddit")));
    assert_eq!(visited.len(), 2);
    assert_eq!(market.scraper.opened.load(Ordering::SeqCst), 1);
    assert_eq!(market.scraper.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn e2e_low_confidence_reading_falls_back_to_title() {
    let market = Marketplace::new();
    let part = market
        .orchestrator(&FusionConfig::default())
        .fuse("Motors", "2207 fpv motor", 5, 0.6)
        .await
        .unwrap();

    assert_eq!(part.data_source_method, "text_inference");
    assert_eq!(
        part.engineering_specs.get("mounting_mm"),
        Some(&SpecValue::Number(16.0))
    );
}

#[tokio::test]
async fn e2e_unknown_query_yields_no_candidates() {
    let market = Marketplace::new();
    let err = market
        .orchestrator(&FusionConfig::default())
        .fuse("Landing_Gear", "carbon landing gear", 5, 0.6)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FusionError::NoCandidates {
            query: "carbon landing gear".into()
        }
    );
    assert_eq!(market.scraper.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn e2e_safe_mode_never_consults_the_oracle() {
    let market = Marketplace::new();
    let config = FusionConfig {
        strategy: EvaluationStrategy::Defaults,
        ..FusionConfig::default()
    };
    let part = market
        .orchestrator(&config)
        .fuse("FC_Stack", "f405 stack", 5, 0.6)
        .await
        .unwrap();

    assert_eq!(part.data_source_method, "safe_mode_default");
    assert_eq!(
        part.engineering_specs.get("usb_orientation"),
        Some(&SpecValue::Text("SIDE".into()))
    );
    assert_eq!(market.oracle.calls.load(Ordering::SeqCst), 0);
}

// ── E2E: Fusion → assembly validation ────────────────────────────────────

#[tokio::test]
async fn e2e_fused_bom_assembles_cleanly() {
    let market = Marketplace::new();
    let bom = market.fuse_bom().await;
    assert_eq!(bom.len(), 4);

    let dir = tempfile::tempdir().unwrap();
    let report = validator(dir.path(), 4.0)
        .validate("proj_e2e", &quad_plan(), &bom)
        .await;

    // The vision-read wheelbase drives the frame and motor placement.
    assert_eq!(report.parameters.wheelbase(), 250.0);
    assert_eq!(report.parameters.get(PartType::FcStack, "mounting_mm"), 30.5);

    assert_eq!(report.artifacts.len(), PartType::ALL.len());
    assert!(
        report
            .artifacts
            .values()
            .all(|a| a.as_ref().is_some_and(|a| !a.placeholder))
    );

    assert_eq!(
        report.scene_objects,
        vec![
            "Frame_Kit",
            "Motors_0",
            "Motors_1",
            "Motors_2",
            "Motors_3",
            "FC_Stack"
        ]
    );
    assert!(report.collision_report.is_clean());
}

#[tokio::test]
async fn e2e_thick_frame_collides_with_every_motor() {
    let market = Marketplace::new();
    let bom = market.fuse_bom().await;

    let dir = tempfile::tempdir().unwrap();
    let report = validator(dir.path(), 6.0)
        .validate("proj_thick", &quad_plan(), &bom)
        .await;

    let collision = &report.collision_report;
    assert!(collision.is_checked());
    assert!(collision.collided);
    assert_eq!(collision.colliding_pairs.len(), 4);
    assert!(
        collision
            .colliding_pairs
            .iter()
            .all(|(a, b)| a == "Frame_Kit" && b.starts_with("Motors_"))
    );
    assert!(!collision.colliding_parts.contains("FC_Stack"));
}

#[tokio::test]
async fn e2e_missing_collision_backend_is_unchecked_not_clean() {
    let market = Marketplace::new();
    let bom = market.fuse_bom().await;

    let dir = tempfile::tempdir().unwrap();
    let config = AssemblyConfig::rooted_at(dir.path());
    let generator = ParametricBoxGenerator {
        output_dir: config.output_dir.clone(),
        frame_thickness_mm: 6.0,
    };
    let validator = AssemblyValidator::new(config, Arc::new(generator), Arc::new(NoCollisionBackend));
    let report = validator.validate("proj_none", &quad_plan(), &bom).await;

    let collision = &report.collision_report;
    assert!(!collision.is_checked());
    assert!(!collision.collided);
    assert!(!collision.is_clean());
    assert!(collision.unchecked_reason.is_some());
}

#[tokio::test]
async fn e2e_report_serializes_for_downstream() {
    let market = Marketplace::new();
    let bom = market.fuse_bom().await;

    let dir = tempfile::tempdir().unwrap();
    let report = validator(dir.path(), 4.0)
        .validate("proj_json", &quad_plan(), &bom)
        .await;

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["project_id"], "proj_json");
    assert_eq!(value["collision_report"]["status"], "checked");
    assert_eq!(value["collision_report"]["collided"], false);
    assert!(value["artifacts"]["Frame_Kit"]["path"]
        .as_str()
        .unwrap()
        .ends_with("proj_json_frame_kit.stl"));
}

// ── E2E: Configuration ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_defaults_and_validation() {
    let config = AppConfig::from_toml("").unwrap();
    assert_eq!(config.fusion.strategy, EvaluationStrategy::Vision);
    assert_eq!(config.fusion.weights.vision, 20);
    assert_eq!(config.fusion.weights.image, 5);
    assert_eq!(config.fusion.weights.per_attribute, 1);
    assert_eq!(config.fusion.min_price, 0.50);

    let safe = AppConfig::from_toml("[fusion]\nstrategy = \"defaults\"\n").unwrap();
    assert_eq!(safe.fusion.strategy, EvaluationStrategy::Defaults);

    assert!(AppConfig::from_toml("[fusion]\nmin_confidence = 1.5\n").is_err());
}
