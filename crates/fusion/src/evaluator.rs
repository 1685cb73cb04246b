//! Candidate evaluation: one scraped page in, one engineering spec out.
//!
//! Two strategies share the [`Evaluator`] contract:
//! - [`VisionEvaluator`] asks the extraction oracle and keeps readings that
//!   clear the confidence gate.
//! - [`DefaultsProvider`] (safe mode) writes the registry defaults for the
//!   part type and never calls the oracle.
//!
//! Both run the same price gate before and the same title fallback and
//! empty-spec guard after, via [`EvaluationPolicy`].

use async_trait::async_trait;
use forgebom_config::FusionConfig;
use forgebom_core::{
    AttributeExtractor, AttributeSchema, EngineeringSpec, PartType, PriceTag, Provenance,
    ScrapedPage, SpecValue,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::inference;

/// Everything an evaluator may look at for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub part_type: &'a str,
    pub title: &'a str,
    pub page: &'a ScrapedPage,
    /// Price from the search listing, used only with list-price fallback.
    pub list_price: Option<&'a PriceTag>,
    pub schema: Option<&'a AttributeSchema>,
    pub min_confidence: f64,
}

/// A candidate that passed evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub price: f64,
    pub spec: EngineeringSpec,
}

/// Turns a scraped page into an engineering spec, or rejects it.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    /// `None` means the candidate is dropped from ranking.
    async fn evaluate(&self, input: &EvaluationInput<'_>) -> Option<Evaluation>;
}

/// The rules every strategy applies around its own attribute source.
#[derive(Debug, Clone)]
pub struct EvaluationPolicy {
    /// Prices must be strictly greater than this.
    pub min_price: f64,
    pub fallback_to_list_price: bool,
    pub text_inference: bool,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self::from_config(&FusionConfig::default())
    }
}

impl EvaluationPolicy {
    pub fn from_config(config: &FusionConfig) -> Self {
        Self {
            min_price: config.min_price,
            fallback_to_list_price: config.fallback_to_list_price,
            text_inference: config.text_inference,
        }
    }

    /// The candidate's price, if it is a real one.
    pub fn accepted_price(&self, input: &EvaluationInput<'_>) -> Option<f64> {
        let scraped = input.page.price.as_ref().and_then(PriceTag::amount);
        let price = match scraped {
            Some(p) => Some(p),
            None if self.fallback_to_list_price => input.list_price.and_then(PriceTag::amount),
            None => None,
        };
        match price {
            Some(p) if p > self.min_price => Some(p),
            other => {
                debug!(
                    title = %input.title,
                    price = ?other,
                    min_price = self.min_price,
                    "Rejected: implausible price"
                );
                None
            }
        }
    }

    /// Title fallback for a missing critical attribute, then the empty guard.
    pub fn finish(
        &self,
        mut spec: EngineeringSpec,
        input: &EvaluationInput<'_>,
        price: f64,
    ) -> Option<Evaluation> {
        if self.text_inference {
            apply_title_inference(&mut spec, input.part_type, input.title);
        }

        if spec.is_empty() {
            debug!(title = %input.title, "Rejected: no engineering attributes");
            return None;
        }

        Some(Evaluation { price, spec })
    }
}

/// Fill the part's critical attribute from the title if it is still absent.
/// Existing values, vision or otherwise, are never replaced.
pub fn apply_title_inference(spec: &mut EngineeringSpec, part_type: &str, title: &str) {
    let Some(critical) = PartType::parse(part_type).and_then(|p| p.descriptor().critical_attribute)
    else {
        return;
    };
    if spec.contains(critical.attribute) {
        return;
    }
    if let Some(value) = inference::infer(critical.inference, title) {
        debug!(
            attribute = critical.attribute,
            value,
            title = %title,
            "Inferred attribute from title"
        );
        spec.set(
            critical.attribute,
            SpecValue::Number(value),
            Provenance::TextInference,
        );
    }
}

/// Live strategy: the vision oracle, gated by confidence.
pub struct VisionEvaluator {
    oracle: Arc<dyn AttributeExtractor>,
    policy: EvaluationPolicy,
}

impl VisionEvaluator {
    pub fn new(oracle: Arc<dyn AttributeExtractor>, policy: EvaluationPolicy) -> Self {
        Self { oracle, policy }
    }

    async fn read_image(&self, input: &EvaluationInput<'_>) -> EngineeringSpec {
        let mut spec = EngineeringSpec::new();
        let (Some(image_url), Some(schema)) = (input.page.image_url.as_deref(), input.schema)
        else {
            return spec;
        };

        let readings = match self
            .oracle
            .extract_attributes(image_url, input.part_type, schema)
            .await
        {
            Ok(readings) => readings,
            Err(e) => {
                warn!(image_url = %image_url, error = %e, "Vision extraction failed");
                return spec;
            }
        };

        for (name, reading) in readings {
            let value = SpecValue::from_json(&reading.value);
            match value {
                Some(v) if reading.confidence >= input.min_confidence => {
                    spec.set(name, v, Provenance::Vision);
                }
                _ => {
                    debug!(
                        attribute = %name,
                        confidence = reading.confidence,
                        min_confidence = input.min_confidence,
                        "Rejected vision attribute"
                    );
                }
            }
        }
        spec
    }
}

#[async_trait]
impl Evaluator for VisionEvaluator {
    fn name(&self) -> &str {
        "vision"
    }

    async fn evaluate(&self, input: &EvaluationInput<'_>) -> Option<Evaluation> {
        let price = self.policy.accepted_price(input)?;
        let spec = self.read_image(input).await;
        self.policy.finish(spec, input, price)
    }
}

/// Safe-mode strategy: registry defaults instead of vision.
pub struct DefaultsProvider {
    policy: EvaluationPolicy,
}

impl DefaultsProvider {
    pub fn new(policy: EvaluationPolicy) -> Self {
        Self { policy }
    }

    /// The registry defaults for a part type, tagged as safe-mode values.
    pub fn defaults_for(part_type: &str) -> EngineeringSpec {
        let mut spec = EngineeringSpec::new();
        if let Some(part) = PartType::parse(part_type) {
            for (name, value) in part.descriptor().safe_defaults {
                spec.set(*name, SpecValue::from(*value), Provenance::SafeModeDefault);
            }
        }
        spec
    }
}

#[async_trait]
impl Evaluator for DefaultsProvider {
    fn name(&self) -> &str {
        "defaults"
    }

    async fn evaluate(&self, input: &EvaluationInput<'_>) -> Option<Evaluation> {
        let price = self.policy.accepted_price(input)?;
        let spec = Self::defaults_for(input.part_type);
        self.policy.finish(spec, input, price)
    }
}
