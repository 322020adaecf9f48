//! Ranking of candidate batches.

use fulfillment_config::BatchingConfig;
use fulfillment_types::BatchDescriptor;
use std::cmp::Ordering;

/// Orders candidate batches by a priority score and keeps the best ones.
///
/// `score = savings`, multiplied by `priority_multiplier` for high-priority
/// candidates and by `large_batch_multiplier` when the candidate has more
/// than `large_batch_threshold` members.
#[derive(Debug, Clone)]
pub struct BatchRanker {
	pub priority_multiplier: f64,
	pub large_batch_threshold: usize,
	pub large_batch_multiplier: f64,
	pub limit: usize,
}

impl Default for BatchRanker {
	fn default() -> Self {
		Self::from_config(&BatchingConfig::default())
	}
}

impl BatchRanker {
	pub fn from_config(config: &BatchingConfig) -> Self {
		Self {
			priority_multiplier: config.priority_multiplier,
			large_batch_threshold: config.large_batch_threshold,
			large_batch_multiplier: config.large_batch_multiplier,
			limit: config.suggestion_limit,
		}
	}

	pub fn score(&self, batch: &BatchDescriptor) -> f64 {
		let mut score = batch.savings_estimate;
		if batch.is_high_priority() {
			score *= self.priority_multiplier;
		}
		if batch.member_count() > self.large_batch_threshold {
			score *= self.large_batch_multiplier;
		}
		score
	}

	/// Sorts by descending score and truncates to `limit`.
	///
	/// The sort is stable, so equal scores keep their input order.
	pub fn rank(&self, batches: Vec<BatchDescriptor>) -> Vec<BatchDescriptor> {
		let mut scored: Vec<(f64, BatchDescriptor)> =
			batches.into_iter().map(|b| (self.score(&b), b)).collect();
		scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
		scored
			.into_iter()
			.take(self.limit)
			.map(|(_, batch)| batch)
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::{BatchKind, BatchPriority};

	fn candidate(kind: BatchKind, name: &str, count: usize, savings: f64, high: bool) -> BatchDescriptor {
		BatchDescriptor {
			kind,
			name: name.to_string(),
			description: String::new(),
			orders: Vec::new(),
			order_ids: (0..count).map(|i| format!("ORD-{}", i)).collect(),
			savings_estimate: savings,
			priority: high.then_some(BatchPriority::High),
		}
	}

	#[test]
	fn test_score_multipliers() {
		let ranker = BatchRanker::default();
		assert_eq!(ranker.score(&candidate(BatchKind::Region, "r", 3, 6.0, false)), 6.0);
		assert_eq!(ranker.score(&candidate(BatchKind::Urgency, "u", 2, 6.0, true)), 12.0);
		// 10 members is not "more than 10".
		assert_eq!(ranker.score(&candidate(BatchKind::Region, "r", 10, 20.0, false)), 20.0);
		assert_eq!(ranker.score(&candidate(BatchKind::Region, "r", 11, 22.0, false)), 33.0);
		assert_eq!(ranker.score(&candidate(BatchKind::Urgency, "u", 11, 33.0, true)), 99.0);
	}

	#[test]
	fn test_ties_keep_input_order() {
		let ranker = BatchRanker::default();
		// Region of 3 and product of 4 both score 6.0.
		let ranked = ranker.rank(vec![
			candidate(BatchKind::Region, "first", 3, 6.0, false),
			candidate(BatchKind::Product, "second", 4, 6.0, false),
			candidate(BatchKind::Product, "top", 5, 7.5, false),
		]);
		let names: Vec<_> = ranked.iter().map(|b| b.name.as_str()).collect();
		assert_eq!(names, vec!["top", "first", "second"]);
	}

	#[test]
	fn test_output_is_non_increasing_and_capped() {
		let ranker = BatchRanker::default();
		let candidates: Vec<_> = (0..25)
			.map(|i| candidate(BatchKind::Region, &format!("b{}", i), 3 + i % 7, (i % 9) as f64, i % 4 == 0))
			.collect();
		let ranked = ranker.rank(candidates);
		assert_eq!(ranked.len(), 10);
		let scores: Vec<f64> = ranked.iter().map(|b| ranker.score(b)).collect();
		assert!(scores.windows(2).all(|w| w[0] >= w[1]));
	}

	#[test]
	fn test_custom_limit() {
		let ranker = BatchRanker {
			limit: 1,
			..BatchRanker::default()
		};
		let ranked = ranker.rank(vec![
			candidate(BatchKind::Region, "a", 3, 6.0, false),
			candidate(BatchKind::Region, "b", 3, 8.0, false),
		]);
		assert_eq!(ranked.len(), 1);
		assert_eq!(ranked[0].name, "b");
	}
}
