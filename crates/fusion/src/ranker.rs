//! Candidate ranking by data completeness.

use forgebom_config::ScoreWeights;
use forgebom_core::{EvaluatedCandidate, FusionError, Provenance};
use std::cmp::Reverse;

/// Orders evaluated candidates by how much usable engineering data they carry.
#[derive(Debug, Clone, Default)]
pub struct CandidateRanker {
    weights: ScoreWeights,
}

impl CandidateRanker {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Completeness score: vision-backed data, a reference image, and one
    /// point per attribute.
    pub fn score(&self, candidate: &EvaluatedCandidate) -> u32 {
        let spec = &candidate.engineering_data;
        let mut score = 0u32;
        if spec.provenance() == Provenance::Vision {
            score = score.saturating_add(self.weights.vision);
        }
        if candidate.image_url.is_some() {
            score = score.saturating_add(self.weights.image);
        }
        let attributes = u32::try_from(spec.len()).unwrap_or(u32::MAX);
        score.saturating_add(self.weights.per_attribute.saturating_mul(attributes))
    }

    /// Sort best-first. Ties keep discovery order.
    pub fn rank(&self, mut candidates: Vec<EvaluatedCandidate>) -> Vec<EvaluatedCandidate> {
        candidates.sort_by_key(|c| (Reverse(self.score(c)), c.discovery_index));
        candidates
    }

    /// The best candidate, provided it carries at least one attribute.
    pub fn select_winner(
        &self,
        candidates: Vec<EvaluatedCandidate>,
    ) -> Result<EvaluatedCandidate, FusionError> {
        let total = candidates.len();
        let winner = self
            .rank(candidates)
            .into_iter()
            .next()
            .ok_or(FusionError::NoSurvivors { total })?;
        if winner.engineering_data.is_empty() {
            return Err(FusionError::EmptyWinner {
                product_name: winner.product_name,
            });
        }
        Ok(winner)
    }
}
