//! Batch suggestion module for the fulfillment system.
//!
//! Independent strategies each look at the same working set of validated
//! orders and propose candidate batches. The candidates are concatenated in
//! strategy run order and ranked by estimated time savings.
//!
//! Strategies are pure: they read a snapshot of orders and the current time,
//! and never touch storage.

use fulfillment_config::BatchingConfig;
use fulfillment_types::{BatchDescriptor, ConfigSchema, ImplementationRegistry, Order};
use std::collections::HashMap;
use thiserror::Error;

pub mod ranker;

pub use ranker::BatchRanker;

/// Re-export implementations
pub mod implementations {
	pub mod strategies {
		pub mod product;
		pub mod region;
		pub mod urgency;
	}
}

/// Errors that can occur while building batching strategies.
#[derive(Debug, Error)]
pub enum BatchingError {
	/// Error that occurs when strategy configuration is invalid.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
	/// Error that occurs when a configured strategy name has no implementation.
	#[error("Unknown batching strategy: {0}")]
	UnknownStrategy(String),
}

/// Trait defining the interface for batching strategies.
///
/// A strategy groups orders by one heuristic and returns the groups that
/// clear its own minimum size, in a deterministic order.
pub trait BatchingStrategy: Send + Sync {
	/// Returns the configuration schema for this strategy.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Proposes candidate batches from a snapshot of eligible orders.
	///
	/// `now` is the current unix time in seconds.
	fn propose(&self, orders: &[Order], now: u64) -> Vec<BatchDescriptor>;
}

/// Type alias for strategy factory functions.
pub type StrategyFactory = fn(&toml::Value) -> Result<Box<dyn BatchingStrategy>, BatchingError>;

/// Registry trait for strategy implementations.
pub trait StrategyRegistry: ImplementationRegistry<Factory = StrategyFactory> {}

/// Get all registered strategy implementations.
pub fn get_all_strategy_implementations() -> Vec<(&'static str, StrategyFactory)> {
	use implementations::strategies::{product, region, urgency};

	vec![
		(region::Registry::NAME, region::Registry::factory()),
		(urgency::Registry::NAME, urgency::Registry::factory()),
		(product::Registry::NAME, product::Registry::factory()),
	]
}

/// Reads a non-negative float parameter from a strategy table.
pub(crate) fn float_param(config: &toml::Value, key: &str, default: f64) -> f64 {
	config
		.get(key)
		.and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
		.unwrap_or(default)
}

/// Reads a non-negative integer parameter from a strategy table.
pub(crate) fn count_param(config: &toml::Value, key: &str, default: usize) -> usize {
	config
		.get(key)
		.and_then(|v| v.as_integer())
		.map(|i| i.max(0) as usize)
		.unwrap_or(default)
}

/// Service that runs the configured strategies and ranks their output.
pub struct BatchingService {
	/// Strategies in run order, with the name they were configured under.
	strategies: Vec<(String, Box<dyn BatchingStrategy>)>,
	ranker: BatchRanker,
}

impl BatchingService {
	pub fn new(strategies: Vec<(String, Box<dyn BatchingStrategy>)>, ranker: BatchRanker) -> Self {
		Self { strategies, ranker }
	}

	/// Builds every strategy listed in `config.strategies`, in that order,
	/// validating each one's table against its schema first.
	pub fn from_config<F>(
		config: &BatchingConfig,
		factories: &HashMap<String, F>,
	) -> Result<Self, BatchingError>
	where
		F: Fn(&toml::Value) -> Result<Box<dyn BatchingStrategy>, BatchingError>,
	{
		let empty = toml::Value::Table(toml::Table::new());
		let mut strategies = Vec::with_capacity(config.strategies.len());

		for name in &config.strategies {
			let factory = factories
				.get(name)
				.ok_or_else(|| BatchingError::UnknownStrategy(name.clone()))?;
			let table = config.implementations.get(name).unwrap_or(&empty);
			let strategy = factory(table)?;
			strategy
				.config_schema()
				.validate(table)
				.map_err(|e| BatchingError::InvalidConfig(format!("{}: {}", name, e)))?;

			tracing::info!(component = "batching", implementation = %name, "Loaded");
			strategies.push((name.clone(), strategy));
		}

		Ok(Self::new(strategies, BatchRanker::from_config(config)))
	}

	/// Names of the active strategies, in run order.
	pub fn strategy_names(&self) -> impl Iterator<Item = &str> {
		self.strategies.iter().map(|(name, _)| name.as_str())
	}

	/// Runs every strategy over `orders` and returns the ranked top candidates.
	pub fn suggest(&self, orders: &[Order], now: u64) -> Vec<BatchDescriptor> {
		let mut candidates = Vec::new();
		for (name, strategy) in &self.strategies {
			let proposed = strategy.propose(orders, now);
			tracing::debug!(strategy = %name, candidates = proposed.len(), "Strategy proposed batches");
			candidates.extend(proposed);
		}
		self.ranker.rank(candidates)
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use fulfillment_types::{LineItem, Order, OrderStatus, ShippingAddress};

	pub const NOW: u64 = 1_760_000_000;
	pub const HOUR: u64 = 3600;

	/// A validated order created `age_hours` before `NOW`.
	pub fn order(id: &str, state: Option<&str>, age_hours: u64, skus: &[(&str, &str)]) -> Order {
		Order {
			id: id.to_string(),
			status: OrderStatus::Validated,
			created_at: NOW - age_hours * HOUR,
			updated_at: NOW - age_hours * HOUR,
			updated_by: None,
			revision: 0,
			customer: Default::default(),
			address: ShippingAddress {
				state: state.map(str::to_string),
				..Default::default()
			},
			line_items: skus
				.iter()
				.map(|(sku, name)| LineItem {
					sku: Some(sku.to_string()),
					name: Some(name.to_string()),
					quantity: 1,
					price: 10.0,
				})
				.collect(),
			payment: Default::default(),
			validation: Default::default(),
			analysis: None,
			resolution: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;
	use fulfillment_types::BatchKind;

	fn factories() -> HashMap<String, StrategyFactory> {
		get_all_strategy_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect()
	}

	fn service() -> BatchingService {
		let factories = factories();
		BatchingService::from_config(&BatchingConfig::default(), &factories).unwrap()
	}

	#[test]
	fn test_three_orders_in_one_state() {
		let orders = vec![
			order("ORD-1", Some("CA"), 1, &[("SKU-A", "Lamp")]),
			order("ORD-2", Some("CA"), 1, &[("SKU-B", "Desk")]),
			order("ORD-3", Some("CA"), 1, &[("SKU-C", "Chair")]),
		];

		let suggestions = service().suggest(&orders, NOW);
		assert_eq!(suggestions.len(), 1);
		let batch = &suggestions[0];
		assert_eq!(batch.kind, BatchKind::Region);
		assert!(batch.name.contains("CA"));
		assert_eq!(batch.member_count(), 3);
		assert_eq!(BatchRanker::default().score(batch), 6.0);
	}

	#[test]
	fn test_strategies_run_in_configured_order() {
		let service = service();
		assert_eq!(
			service.strategy_names().collect::<Vec<_>>(),
			vec!["region", "urgency", "product"]
		);
	}

	#[test]
	fn test_overlapping_candidates_all_kept() {
		// Same three orders qualify for region, urgency and product batches.
		let orders: Vec<_> = (1..=3)
			.map(|i| order(&format!("ORD-{}", i), Some("TX"), 7, &[("SKU-A", "Lamp")]))
			.collect();

		let suggestions = service().suggest(&orders, NOW);
		let kinds: Vec<_> = suggestions.iter().map(|b| b.kind).collect();
		// urgency: 9 * 2 = 18, region: 6, product: 4.5
		assert_eq!(
			kinds,
			vec![BatchKind::Urgency, BatchKind::Region, BatchKind::Product]
		);
	}

	#[test]
	fn test_empty_working_set() {
		assert!(service().suggest(&[], NOW).is_empty());
	}

	#[test]
	fn test_unknown_strategy_rejected() {
		let factories = factories();
		let config = BatchingConfig {
			strategies: vec!["region".into(), "carrier".into()],
			..Default::default()
		};
		assert!(matches!(
			BatchingService::from_config(&config, &factories),
			Err(BatchingError::UnknownStrategy(name)) if name == "carrier"
		));
	}

	#[test]
	fn test_invalid_strategy_table_rejected() {
		let factories = factories();
		let mut config = BatchingConfig::default();
		config.implementations.insert(
			"region".into(),
			toml::from_str("min_orders = 0").unwrap(),
		);
		assert!(matches!(
			BatchingService::from_config(&config, &factories),
			Err(BatchingError::InvalidConfig(msg)) if msg.starts_with("region")
		));
	}
}
