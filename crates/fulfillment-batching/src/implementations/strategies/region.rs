//! Groups orders shipping to the same region.

use crate::{count_param, float_param, BatchingError, BatchingStrategy};
use fulfillment_types::{
	BatchDescriptor, BatchKind, ConfigSchema, Field, FieldType, ImplementationRegistry, Order,
	Schema, ValidationError,
};
use std::collections::HashMap;

/// Proposes one batch per address region with at least `min_orders` members.
///
/// Orders without a region are ignored. Groups are emitted in the order
/// their region first appears in the input.
pub struct RegionStrategy {
	min_orders: usize,
	minutes_per_order: f64,
}

impl RegionStrategy {
	pub fn new(min_orders: usize, minutes_per_order: f64) -> Self {
		Self {
			min_orders,
			minutes_per_order,
		}
	}
}

impl Default for RegionStrategy {
	fn default() -> Self {
		Self::new(3, 2.0)
	}
}

impl BatchingStrategy for RegionStrategy {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RegionStrategySchema)
	}

	fn propose(&self, orders: &[Order], _now: u64) -> Vec<BatchDescriptor> {
		let mut groups: Vec<(&str, Vec<Order>)> = Vec::new();
		let mut index: HashMap<&str, usize> = HashMap::new();

		for order in orders {
			let Some(region) = order.region() else {
				continue;
			};
			let slot = *index.entry(region).or_insert_with(|| {
				groups.push((region, Vec::new()));
				groups.len() - 1
			});
			groups[slot].1.push(order.clone());
		}

		groups
			.into_iter()
			.filter(|(_, members)| members.len() >= self.min_orders)
			.map(|(region, members)| {
				let count = members.len();
				BatchDescriptor::from_orders(
					BatchKind::Region,
					format!("{} Orders", region),
					format!("{} orders to {}", count, region),
					members,
					count as f64 * self.minutes_per_order,
					None,
				)
			})
			.collect()
	}
}

/// Configuration schema for RegionStrategy.
pub struct RegionStrategySchema;

impl ConfigSchema for RegionStrategySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new(
					"min_orders",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"minutes_per_order",
					FieldType::Float {
						min: Some(0.0),
						max: None,
					},
				),
			],
		)
		.validate(config)
	}
}

/// Factory function to create a region strategy from configuration.
///
/// Configuration parameters:
/// - `min_orders`: smallest group proposed (default: 3)
/// - `minutes_per_order`: estimated savings per member (default: 2.0)
pub fn create_strategy(config: &toml::Value) -> Result<Box<dyn BatchingStrategy>, BatchingError> {
	Ok(Box::new(RegionStrategy::new(
		count_param(config, "min_orders", 3),
		float_param(config, "minutes_per_order", 2.0),
	)))
}

/// Registry for the region strategy.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "region";
	type Factory = crate::StrategyFactory;

	fn factory() -> Self::Factory {
		create_strategy
	}
}

impl crate::StrategyRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{order, NOW};

	#[test]
	fn test_groups_below_minimum_are_dropped() {
		let orders = vec![
			order("ORD-1", Some("CA"), 0, &[]),
			order("ORD-2", Some("NY"), 0, &[]),
			order("ORD-3", Some("CA"), 0, &[]),
			order("ORD-4", Some("NY"), 0, &[]),
			order("ORD-5", None, 0, &[]),
			order("ORD-6", Some("CA"), 0, &[]),
		];

		let batches = RegionStrategy::default().propose(&orders, NOW);
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0].name, "CA Orders");
		assert_eq!(batches[0].description, "3 orders to CA");
		assert_eq!(batches[0].order_ids, vec!["ORD-1", "ORD-3", "ORD-6"]);
		assert_eq!(batches[0].savings_estimate, 6.0);
		assert_eq!(batches[0].priority, None);
	}

	#[test]
	fn test_groups_follow_first_appearance() {
		let mut orders = Vec::new();
		for i in 0..3 {
			orders.push(order(&format!("TX-{}", i), Some("TX"), 0, &[]));
			orders.push(order(&format!("WA-{}", i), Some("WA"), 0, &[]));
		}
		let names: Vec<_> = RegionStrategy::default()
			.propose(&orders, NOW)
			.into_iter()
			.map(|b| b.name)
			.collect();
		assert_eq!(names, vec!["TX Orders", "WA Orders"]);
	}

	#[test]
	fn test_blank_region_ignored() {
		let orders: Vec<_> = (0..4)
			.map(|i| order(&format!("ORD-{}", i), Some("  "), 0, &[]))
			.collect();
		assert!(RegionStrategy::default().propose(&orders, NOW).is_empty());
	}

	#[test]
	fn test_configured_threshold() {
		let config: toml::Value = toml::from_str("min_orders = 2\nminutes_per_order = 5").unwrap();
		let strategy = create_strategy(&config).unwrap();
		let orders = vec![
			order("ORD-1", Some("OR"), 0, &[]),
			order("ORD-2", Some("OR"), 0, &[]),
		];
		let batches = strategy.propose(&orders, NOW);
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0].savings_estimate, 10.0);
	}
}
