//! Groups orders that have waited too long since intake.

use crate::{count_param, float_param, BatchingError, BatchingStrategy};
use fulfillment_types::{
	BatchDescriptor, BatchKind, BatchPriority, ConfigSchema, Field, FieldType,
	ImplementationRegistry, Order, Schema, ValidationError,
};

/// Proposes a single high-priority batch of every order at least
/// `age_hours` old, when there are at least `min_orders` of them.
///
/// Orders stamped in the future count as age zero.
pub struct UrgencyStrategy {
	min_orders: usize,
	age_seconds: u64,
	minutes_per_order: f64,
}

impl UrgencyStrategy {
	pub fn new(min_orders: usize, age_hours: f64, minutes_per_order: f64) -> Self {
		Self {
			min_orders,
			age_seconds: (age_hours * 3600.0).round() as u64,
			minutes_per_order,
		}
	}
}

impl Default for UrgencyStrategy {
	fn default() -> Self {
		Self::new(2, 6.0, 3.0)
	}
}

impl BatchingStrategy for UrgencyStrategy {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(UrgencyStrategySchema)
	}

	fn propose(&self, orders: &[Order], now: u64) -> Vec<BatchDescriptor> {
		let urgent: Vec<Order> = orders
			.iter()
			.filter(|order| now.saturating_sub(order.created_at) >= self.age_seconds)
			.cloned()
			.collect();

		if urgent.len() < self.min_orders {
			return Vec::new();
		}

		let count = urgent.len();
		vec![BatchDescriptor::from_orders(
			BatchKind::Urgency,
			"Urgent Orders",
			format!("{} orders need immediate attention", count),
			urgent,
			count as f64 * self.minutes_per_order,
			Some(BatchPriority::High),
		)]
	}
}

/// Configuration schema for UrgencyStrategy.
pub struct UrgencyStrategySchema;

impl ConfigSchema for UrgencyStrategySchema {
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
					"age_hours",
					FieldType::Float {
						min: Some(0.0),
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

/// Factory function to create an urgency strategy from configuration.
///
/// Configuration parameters:
/// - `min_orders`: smallest batch proposed (default: 2)
/// - `age_hours`: age at which an order becomes urgent (default: 6)
/// - `minutes_per_order`: estimated savings per member (default: 3.0)
pub fn create_strategy(config: &toml::Value) -> Result<Box<dyn BatchingStrategy>, BatchingError> {
	Ok(Box::new(UrgencyStrategy::new(
		count_param(config, "min_orders", 2),
		float_param(config, "age_hours", 6.0).max(0.0),
		float_param(config, "minutes_per_order", 3.0),
	)))
}

/// Registry for the urgency strategy.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "urgency";
	type Factory = crate::StrategyFactory;

	fn factory() -> Self::Factory {
		create_strategy
	}
}

impl crate::StrategyRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{order, HOUR, NOW};

	#[test]
	fn test_exactly_six_hours_is_urgent() {
		let orders = vec![
			order("ORD-1", Some("CA"), 6, &[]),
			order("ORD-2", Some("NY"), 9, &[]),
			order("ORD-3", Some("NY"), 5, &[]),
		];

		let batches = UrgencyStrategy::default().propose(&orders, NOW);
		assert_eq!(batches.len(), 1);
		let batch = &batches[0];
		assert_eq!(batch.name, "Urgent Orders");
		assert_eq!(batch.order_ids, vec!["ORD-1", "ORD-2"]);
		assert_eq!(batch.savings_estimate, 6.0);
		assert!(batch.is_high_priority());
	}

	#[test]
	fn test_single_urgent_order_is_not_a_batch() {
		let orders = vec![
			order("ORD-1", None, 12, &[]),
			order("ORD-2", None, 1, &[]),
		];
		assert!(UrgencyStrategy::default().propose(&orders, NOW).is_empty());
	}

	#[test]
	fn test_future_timestamp_not_urgent() {
		let mut late = order("ORD-1", None, 0, &[]);
		late.created_at = NOW + HOUR;
		let orders = vec![late, order("ORD-2", None, 8, &[]), order("ORD-3", None, 8, &[])];

		let batches = UrgencyStrategy::default().propose(&orders, NOW);
		assert_eq!(batches[0].order_ids, vec!["ORD-2", "ORD-3"]);
	}

	#[test]
	fn test_fractional_age_threshold() {
		let config: toml::Value = toml::from_str("age_hours = 0.5").unwrap();
		let strategy = create_strategy(&config).unwrap();
		let orders = vec![order("ORD-1", None, 1, &[]), order("ORD-2", None, 1, &[])];
		assert_eq!(strategy.propose(&orders, NOW).len(), 1);
	}
}
