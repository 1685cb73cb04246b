//! Fusion orchestrator: one search query in, one trusted BOM row out.

use forgebom_config::{EvaluationStrategy, FusionConfig};
use forgebom_core::{
    AttributeExtractor, AttributeSchema, ComponentSearch, CompositePart, EvaluatedCandidate,
    FusionError, RawCandidate, SchemaGenerator, ScrapeSession, Scraper,
};
use futures::FutureExt;
use futures::future::join_all;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::evaluator::{
    DefaultsProvider, EvaluationInput, EvaluationPolicy, Evaluator, VisionEvaluator,
};
use crate::filter::ListingFilter;
use crate::ranker::CandidateRanker;
use crate::schema::RegistrySchemaGenerator;

/// Reconciles the listings for one part type into a [`CompositePart`].
///
/// Each call is independent: the orchestrator holds no state that one
/// `fuse` call can observe from another.
pub struct FusionOrchestrator {
    search: Arc<dyn ComponentSearch>,
    scraper: Arc<dyn Scraper>,
    schemas: Arc<dyn SchemaGenerator>,
    evaluator: Arc<dyn Evaluator>,
    filter: ListingFilter,
    ranker: CandidateRanker,
}

impl FusionOrchestrator {
    pub fn new(
        search: Arc<dyn ComponentSearch>,
        scraper: Arc<dyn Scraper>,
        schemas: Arc<dyn SchemaGenerator>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        Self {
            search,
            scraper,
            schemas,
            evaluator,
            filter: ListingFilter::default(),
            ranker: CandidateRanker::default(),
        }
    }

    /// Wire an orchestrator from configuration.
    ///
    /// `oracle` is only consulted for the vision strategy; in safe mode the
    /// defaults provider is used and the oracle is never called.
    pub fn from_config(
        config: &FusionConfig,
        search: Arc<dyn ComponentSearch>,
        scraper: Arc<dyn Scraper>,
        schemas: Arc<dyn SchemaGenerator>,
        oracle: Arc<dyn AttributeExtractor>,
    ) -> Self {
        let policy = EvaluationPolicy::from_config(config);
        let evaluator: Arc<dyn Evaluator> = match config.strategy {
            EvaluationStrategy::Vision => Arc::new(VisionEvaluator::new(oracle, policy)),
            EvaluationStrategy::Defaults => Arc::new(DefaultsProvider::new(policy)),
        };
        Self::new(search, scraper, schemas, evaluator)
            .with_filter(ListingFilter::from_config(config))
            .with_ranker(CandidateRanker::new(config.weights))
    }

    /// Safe mode: registry schemas and defaults, no vision service at all.
    pub fn safe_mode(
        config: &FusionConfig,
        search: Arc<dyn ComponentSearch>,
        scraper: Arc<dyn Scraper>,
    ) -> Self {
        let evaluator = DefaultsProvider::new(EvaluationPolicy::from_config(config));
        Self::new(
            search,
            scraper,
            Arc::new(RegistrySchemaGenerator),
            Arc::new(evaluator),
        )
        .with_filter(ListingFilter::from_config(config))
        .with_ranker(CandidateRanker::new(config.weights))
    }

    pub fn with_filter(mut self, filter: ListingFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_ranker(mut self, ranker: CandidateRanker) -> Self {
        self.ranker = ranker;
        self
    }

    /// Name of the evaluation strategy in use.
    pub fn strategy(&self) -> &str {
        self.evaluator.name()
    }

    /// Search, filter, evaluate concurrently, rank, and materialize the winner.
    pub async fn fuse(
        &self,
        part_type: &str,
        search_query: &str,
        search_limit: usize,
        min_confidence: f64,
    ) -> Result<CompositePart, FusionError> {
        info!(
            part_type = %part_type,
            query = %search_query,
            limit = search_limit,
            min_confidence,
            strategy = self.evaluator.name(),
            "Fusion search starting"
        );

        // ── Step 1: Attribute schema ──
        let schema = match self.schemas.generate_attribute_schema(part_type).await {
            Ok(Some(schema)) => schema,
            Ok(None) => {
                warn!(part_type = %part_type, "No attribute schema produced");
                return Err(FusionError::SchemaUnavailable {
                    part_type: part_type.to_string(),
                });
            }
            Err(e) => {
                warn!(part_type = %part_type, error = %e, "Attribute schema generation failed");
                return Err(FusionError::SchemaUnavailable {
                    part_type: part_type.to_string(),
                });
            }
        };

        // ── Step 2: Search ──
        let raw = self
            .search
            .find_components(search_query, search_limit)
            .await
            .map_err(|e| FusionError::SearchFailed {
                query: search_query.to_string(),
                reason: e.to_string(),
            })?;
        if raw.is_empty() {
            return Err(FusionError::NoCandidates {
                query: search_query.to_string(),
            });
        }
        let total = raw.len();

        // ── Step 3: Filter, keeping discovery order ──
        let survivors: Vec<(usize, RawCandidate)> = raw
            .into_iter()
            .enumerate()
            .filter(|(_, c)| self.filter.accept(c))
            .collect();
        debug!(total, survivors = survivors.len(), "Listings filtered");
        if survivors.is_empty() {
            return Err(FusionError::NoSurvivors { total });
        }

        // ── Step 4: Concurrent evaluation over one shared session ──
        let session = match self.scraper.open_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Could not open scraping session");
                return Err(FusionError::NoSurvivors { total });
            }
        };

        // A panicking candidate is dropped like any other failed one, so
        // the join always completes and the session is always closed.
        let tasks = survivors.iter().map(|(index, candidate)| {
            AssertUnwindSafe(self.evaluate_candidate(
                session.as_ref(),
                *index,
                candidate,
                part_type,
                &schema,
                min_confidence,
            ))
            .catch_unwind()
            .map(move |outcome| {
                outcome.unwrap_or_else(|_| {
                    warn!(index, "Candidate evaluation panicked");
                    None
                })
            })
        });
        let results = join_all(tasks).await;
        session.close().await;

        let evaluated: Vec<EvaluatedCandidate> = results.into_iter().flatten().collect();
        let alternatives_checked = evaluated.len();

        // ── Step 5: Rank and materialize ──
        let winner = self.ranker.select_winner(evaluated).map_err(|e| match e {
            FusionError::NoSurvivors { .. } => FusionError::NoSurvivors { total },
            other => other,
        })?;

        info!(
            part_type = %part_type,
            product = %winner.product_name,
            price = winner.price,
            alternatives_checked,
            "Fusion winner selected"
        );

        Ok(CompositePart::from_winner(
            part_type,
            winner,
            alternatives_checked,
        ))
    }

    /// Scrape and evaluate one surviving listing. Every failure is local.
    async fn evaluate_candidate(
        &self,
        session: &dyn ScrapeSession,
        index: usize,
        candidate: &RawCandidate,
        part_type: &str,
        schema: &AttributeSchema,
        min_confidence: f64,
    ) -> Option<EvaluatedCandidate> {
        let link = candidate.link.as_deref()?;
        let title = candidate.title.as_deref()?;
        debug!(title = %title, "Evaluating candidate");

        let page = match session.scrape_product_page(link).await {
            Ok(Some(page)) => page,
            Ok(None) => {
                debug!(link = %link, "Nothing usable on page");
                return None;
            }
            Err(e) => {
                warn!(link = %link, error = %e, "Scrape failed");
                return None;
            }
        };

        let input = EvaluationInput {
            part_type,
            title,
            page: &page,
            list_price: candidate.list_price.as_ref(),
            schema: Some(schema),
            min_confidence,
        };
        let evaluation = self.evaluator.evaluate(&input).await?;

        Some(EvaluatedCandidate {
            product_name: title.to_string(),
            price: evaluation.price,
            source_url: link.to_string(),
            image_url: page.image_url,
            engineering_data: evaluation.spec,
            discovery_index: index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forgebom_core::{
        AdapterError, AttributeReadings, AttributeValue, PriceTag, ScrapedPage, SpecValue,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Scripted collaborators ──

    struct ScriptedSearch(Result<Vec<RawCandidate>, AdapterError>);

    #[async_trait]
    impl ComponentSearch for ScriptedSearch {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn find_components(
            &self,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<RawCandidate>, AdapterError> {
            self.0
                .clone()
                .map(|mut v| {
                    v.truncate(limit);
                    v
                })
        }
    }

    #[derive(Default)]
    struct ScriptedScraper {
        pages: HashMap<String, Result<Option<ScrapedPage>, AdapterError>>,
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
        visited: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedScraper {
        fn page(mut self, link: &str, page: ScrapedPage) -> Self {
            self.pages.insert(link.to_string(), Ok(Some(page)));
            self
        }

        fn failing(mut self, link: &str) -> Self {
            self.pages
                .insert(link.to_string(), Err(AdapterError::Network("reset".into())));
            self
        }
    }

    struct ScriptedSession {
        pages: HashMap<String, Result<Option<ScrapedPage>, AdapterError>>,
        closed: Arc<AtomicUsize>,
        visited: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Scraper for ScriptedScraper {
        async fn open_session(&self) -> Result<Box<dyn ScrapeSession>, AdapterError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                pages: self.pages.clone(),
                closed: self.closed.clone(),
                visited: self.visited.clone(),
            }))
        }
    }

    #[async_trait]
    impl ScrapeSession for ScriptedSession {
        async fn scrape_product_page(
            &self,
            link: &str,
        ) -> Result<Option<ScrapedPage>, AdapterError> {
            self.visited.lock().unwrap().push(link.to_string());
            self.pages.get(link).cloned().unwrap_or(Ok(None))
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedSchema(Option<AttributeSchema>);

    #[async_trait]
    impl SchemaGenerator for FixedSchema {
        async fn generate_attribute_schema(
            &self,
            _part_type: &str,
        ) -> Result<Option<AttributeSchema>, AdapterError> {
            Ok(self.0.clone())
        }
    }

    /// Oracle keyed by image URL.
    #[derive(Default)]
    struct ImageOracle(HashMap<String, AttributeReadings>);

    impl ImageOracle {
        fn reading(mut self, image: &str, name: &str, value: f64, confidence: f64) -> Self {
            self.0.entry(image.to_string()).or_default().insert(
                name.to_string(),
                AttributeValue {
                    value: serde_json::json!(value),
                    confidence,
                },
            );
            self
        }
    }

    #[async_trait]
    impl AttributeExtractor for ImageOracle {
        async fn extract_attributes(
            &self,
            image_url: &str,
            _part_type: &str,
            _schema: &AttributeSchema,
        ) -> Result<AttributeReadings, AdapterError> {
            Ok(self.0.get(image_url).cloned().unwrap_or_default())
        }
    }

    fn schema() -> Option<AttributeSchema> {
        Some(AttributeSchema {
            prompt_text: "Read the propeller".into(),
            json_schema: serde_json::json!({"diameter_mm": {}}),
        })
    }

    fn priced(price: f64, image: Option<&str>) -> ScrapedPage {
        ScrapedPage {
            price: Some(PriceTag::Amount(price)),
            image_url: image.map(str::to_string),
            text: String::new(),
        }
    }

    fn orchestrator(
        search: ScriptedSearch,
        scraper: Arc<ScriptedScraper>,
        oracle: ImageOracle,
        schema: Option<AttributeSchema>,
    ) -> FusionOrchestrator {
        FusionOrchestrator::from_config(
            &FusionConfig::default(),
            Arc::new(search),
            scraper,
            Arc::new(FixedSchema(schema)),
            Arc::new(oracle),
        )
    }

    #[tokio::test]
    async fn propeller_scenario() {
        let search = ScriptedSearch(Ok(vec![
            RawCandidate::new("https://www.reddit.com/r/fpv/best_props", "Best 5 inch props?"),
            RawCandidate::new("https://shop.test/cheap", "Generic 5 inch prop"),
            RawCandidate::new("https://shop.test/hq", "HQProp 5x4.3x3"),
        ]));
        let scraper = Arc::new(
            ScriptedScraper::default()
                .page("https://shop.test/cheap", priced(0.30, Some("https://img.test/cheap.jpg")))
                .page("https://shop.test/hq", priced(3.99, Some("https://img.test/hq.jpg"))),
        );
        let oracle = ImageOracle::default()
            .reading("https://img.test/hq.jpg", "diameter_mm", 127.0, 0.85)
            .reading("https://img.test/cheap.jpg", "diameter_mm", 127.0, 0.99);

        let part = orchestrator(search, scraper.clone(), oracle, schema())
            .fuse("Propellers", "5 inch propeller", 5, 0.6)
            .await
            .unwrap();

        assert_eq!(part.engineering_specs.len(), 1);
        assert_eq!(
            part.engineering_specs.get("diameter_mm"),
            Some(&SpecValue::Number(127.0))
        );
        assert_eq!(part.data_source_method, "vision");
        assert_eq!(part.alternatives_checked, 1);
        assert_eq!(part.product_name, "HQProp 5x4.3x3");
        assert_eq!(part.reference_image.as_deref(), Some("https://img.test/hq.jpg"));

        // The blocked listing is never scraped.
        let visited = scraper.visited.lock().unwrap().clone();
        assert!(!visited.iter().any(|l| l.contains("reddit")));
        assert_eq!(scraper.opened.load(Ordering::SeqCst), 1);
        assert_eq!(scraper.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_candidates() {
        let scraper = Arc::new(ScriptedScraper::default());
        let result = orchestrator(
            ScriptedSearch(Ok(vec![])),
            scraper.clone(),
            ImageOracle::default(),
            schema(),
        )
        .fuse("Propellers", "5 inch propeller", 5, 0.6)
        .await;
        assert!(matches!(result, Err(FusionError::NoCandidates { .. })));
        assert_eq!(scraper.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_filtered() {
        let search = ScriptedSearch(Ok(vec![
            RawCandidate::new("https://youtube.com/watch?v=1", "Prop review"),
            RawCandidate::new("https://shop.test/c/props", "Props Category"),
        ]));
        let result = orchestrator(
            search,
            Arc::new(ScriptedScraper::default()),
            ImageOracle::default(),
            schema(),
        )
        .fuse("Propellers", "props", 5, 0.6)
        .await;
        assert_eq!(result, Err(FusionError::NoSurvivors { total: 2 }));
    }

    #[tokio::test]
    async fn schema_failure_stops_before_search() {
        let result = orchestrator(
            ScriptedSearch(Err(AdapterError::Network("should not be called".into()))),
            Arc::new(ScriptedScraper::default()),
            ImageOracle::default(),
            None,
        )
        .fuse("Motors", "2207 motor", 5, 0.6)
        .await;
        assert_eq!(
            result,
            Err(FusionError::SchemaUnavailable {
                part_type: "Motors".into()
            })
        );
    }

    #[tokio::test]
    async fn search_error_is_typed() {
        let result = orchestrator(
            ScriptedSearch(Err(AdapterError::RateLimited {
                service: "search".into(),
                retry_after_secs: 30,
            })),
            Arc::new(ScriptedScraper::default()),
            ImageOracle::default(),
            schema(),
        )
        .fuse("Motors", "2207 motor", 5, 0.6)
        .await;
        assert!(matches!(result, Err(FusionError::SearchFailed { .. })));
    }

    #[tokio::test]
    async fn single_candidate_counts_one_alternative() {
        let search = ScriptedSearch(Ok(vec![RawCandidate::new(
            "https://shop.test/motor",
            "T-Motor Velox 2207 1950KV",
        )]));
        let scraper = Arc::new(ScriptedScraper::default().page("https://shop.test/motor", priced(21.9, None)));
        let part = orchestrator(search, scraper, ImageOracle::default(), schema())
            .fuse("Motors", "2207 motor", 5, 0.6)
            .await
            .unwrap();
        assert_eq!(part.alternatives_checked, 1);
        assert_eq!(part.data_source_method, "text_inference");
        assert_eq!(
            part.engineering_specs.get("mounting_mm"),
            Some(&SpecValue::Number(16.0))
        );
    }

    #[tokio::test]
    async fn sibling_failures_do_not_cancel_and_session_closes_once() {
        let search = ScriptedSearch(Ok(vec![
            RawCandidate::new("https://shop.test/a", "Gemfan 51433"),
            RawCandidate::new("https://shop.test/b", "HQProp 5 inch"),
            RawCandidate::new("https://shop.test/c", "Ethix S5"),
        ]));
        let scraper = Arc::new(
            ScriptedScraper::default()
                .failing("https://shop.test/a")
                .page("https://shop.test/b", priced(4.5, Some("https://img.test/b.jpg")))
                .page("https://shop.test/c", priced(4.0, Some("https://img.test/c.jpg"))),
        );
        let oracle = ImageOracle::default()
            .reading("https://img.test/b.jpg", "diameter_mm", 127.0, 0.9)
            .reading("https://img.test/c.jpg", "diameter_mm", 127.0, 0.9);

        let part = orchestrator(search, scraper.clone(), oracle, schema())
            .fuse("Propellers", "5 inch props", 5, 0.6)
            .await
            .unwrap();

        // Equal scores: the earlier listing wins.
        assert_eq!(part.product_name, "HQProp 5 inch");
        assert_eq!(part.alternatives_checked, 2);
        assert_eq!(scraper.visited.lock().unwrap().len(), 3);
        assert_eq!(scraper.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_candidate_is_isolated_and_session_closes() {
        struct SelectiveOracle;

        #[async_trait]
        impl AttributeExtractor for SelectiveOracle {
            async fn extract_attributes(
                &self,
                image_url: &str,
                _part_type: &str,
                _schema: &AttributeSchema,
            ) -> Result<AttributeReadings, AdapterError> {
                if image_url.ends_with("a.jpg") {
                    panic!("malformed reading");
                }
                let mut readings = AttributeReadings::new();
                readings.insert(
                    "diameter_mm".into(),
                    AttributeValue {
                        value: serde_json::json!(127.0),
                        confidence: 0.9,
                    },
                );
                Ok(readings)
            }
        }

        let search = ScriptedSearch(Ok(vec![
            RawCandidate::new("https://shop.test/a", "Gemfan 51433"),
            RawCandidate::new("https://shop.test/b", "HQProp 5 inch"),
        ]));
        let scraper = Arc::new(
            ScriptedScraper::default()
                .page("https://shop.test/a", priced(3.5, Some("https://img.test/a.jpg")))
                .page("https://shop.test/b", priced(4.5, Some("https://img.test/b.jpg"))),
        );
        let orchestrator = FusionOrchestrator::from_config(
            &FusionConfig::default(),
            Arc::new(search),
            scraper.clone(),
            Arc::new(FixedSchema(schema())),
            Arc::new(SelectiveOracle),
        );

        let part = orchestrator
            .fuse("Propellers", "5 inch props", 5, 0.6)
            .await
            .unwrap();

        assert_eq!(part.product_name, "HQProp 5 inch");
        assert_eq!(part.alternatives_checked, 1);
        assert_eq!(scraper.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_closes_when_every_candidate_fails() {
        let search = ScriptedSearch(Ok(vec![
            RawCandidate::new("https://shop.test/a", "Prop A"),
            RawCandidate::new("https://shop.test/b", "Prop B"),
        ]));
        let scraper = Arc::new(ScriptedScraper::default().failing("https://shop.test/a"));
        let result = orchestrator(search, scraper.clone(), ImageOracle::default(), schema())
            .fuse("Propellers", "props", 5, 0.6)
            .await;
        assert_eq!(result, Err(FusionError::NoSurvivors { total: 2 }));
        assert_eq!(scraper.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn safe_mode_never_calls_oracle() {
        struct PanickingOracle;

        #[async_trait]
        impl AttributeExtractor for PanickingOracle {
            async fn extract_attributes(
                &self,
                _image_url: &str,
                _part_type: &str,
                _schema: &AttributeSchema,
            ) -> Result<AttributeReadings, AdapterError> {
                panic!("oracle must not be called in safe mode");
            }
        }

        let config = FusionConfig {
            strategy: EvaluationStrategy::Defaults,
            ..FusionConfig::default()
        };
        let search = ScriptedSearch(Ok(vec![RawCandidate::new(
            "https://shop.test/stack",
            "SpeedyBee F405 V4 Stack",
        )]));
        let scraper = Arc::new(ScriptedScraper::default().page(
            "https://shop.test/stack",
            priced(69.99, Some("https://img.test/stack.jpg")),
        ));
        let orchestrator = FusionOrchestrator::from_config(
            &config,
            Arc::new(search),
            scraper,
            Arc::new(crate::RegistrySchemaGenerator),
            Arc::new(PanickingOracle),
        );
        assert_eq!(orchestrator.strategy(), "defaults");

        let part = orchestrator.fuse("FC_Stack", "f405 stack", 5, 0.6).await.unwrap();
        assert_eq!(part.data_source_method, "safe_mode_default");
        assert_eq!(
            part.engineering_specs.get("mounting_mm"),
            Some(&SpecValue::Number(30.5))
        );
    }

    #[tokio::test]
    async fn safe_mode_constructor_needs_no_schema_service() {
        let search = ScriptedSearch(Ok(vec![RawCandidate::new(
            "https://shop.test/motor",
            "T-Motor F60 Pro V 2207",
        )]));
        let scraper = Arc::new(
            ScriptedScraper::default().page("https://shop.test/motor", priced(24.99, None)),
        );
        let orchestrator =
            FusionOrchestrator::safe_mode(&FusionConfig::default(), Arc::new(search), scraper);
        assert_eq!(orchestrator.strategy(), "defaults");

        let part = orchestrator.fuse("Motors", "2207 motor", 5, 0.6).await.unwrap();
        assert_eq!(part.data_source_method, "safe_mode_default");
        assert_eq!(
            part.engineering_specs.get("mounting_mm"),
            Some(&SpecValue::Number(16.0))
        );
    }
}
