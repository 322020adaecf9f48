//! Groups orders that share a product.

use crate::{count_param, float_param, BatchingError, BatchingStrategy};
use fulfillment_types::{
	BatchDescriptor, BatchKind, ConfigSchema, Field, FieldType, ImplementationRegistry, Order,
	Schema, ValidationError,
};
use std::collections::{HashMap, HashSet};

/// Proposes one batch per SKU ordered by at least `min_orders` orders.
///
/// An order appears in every group for the SKUs it contains, but only once
/// per SKU even when it lists that SKU on several lines. Line items without
/// a SKU are ignored.
pub struct ProductStrategy {
	min_orders: usize,
	minutes_per_order: f64,
}

impl ProductStrategy {
	pub fn new(min_orders: usize, minutes_per_order: f64) -> Self {
		Self {
			min_orders,
			minutes_per_order,
		}
	}
}

impl Default for ProductStrategy {
	fn default() -> Self {
		Self::new(3, 1.5)
	}
}

/// Display name of `sku` taken from the first line of `order` carrying it.
fn product_name<'a>(order: &'a Order, sku: &'a str) -> &'a str {
	order
		.line_items
		.iter()
		.find(|item| item.sku.as_deref() == Some(sku))
		.and_then(|item| item.name.as_deref())
		.map(str::trim)
		.filter(|name| !name.is_empty())
		.unwrap_or(sku)
}

impl BatchingStrategy for ProductStrategy {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ProductStrategySchema)
	}

	fn propose(&self, orders: &[Order], _now: u64) -> Vec<BatchDescriptor> {
		let mut groups: Vec<(&str, Vec<&Order>)> = Vec::new();
		let mut index: HashMap<&str, usize> = HashMap::new();

		for order in orders {
			let mut seen = HashSet::new();
			for sku in order.line_items.iter().filter_map(|item| item.sku.as_deref()) {
				if sku.is_empty() || !seen.insert(sku) {
					continue;
				}
				let slot = *index.entry(sku).or_insert_with(|| {
					groups.push((sku, Vec::new()));
					groups.len() - 1
				});
				groups[slot].1.push(order);
			}
		}

		groups
			.into_iter()
			.filter(|(_, members)| members.len() >= self.min_orders)
			.map(|(sku, members)| {
				let name = product_name(members[0], sku).to_string();
				let count = members.len();
				BatchDescriptor::from_orders(
					BatchKind::Product,
					format!("{} Orders", name),
					format!("{} orders containing {}", count, name),
					members.into_iter().cloned().collect(),
					count as f64 * self.minutes_per_order,
					None,
				)
			})
			.collect()
	}
}

/// Configuration schema for ProductStrategy.
pub struct ProductStrategySchema;

impl ConfigSchema for ProductStrategySchema {
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

/// Factory function to create a product strategy from configuration.
///
/// Configuration parameters:
/// - `min_orders`: smallest group proposed (default: 3)
/// - `minutes_per_order`: estimated savings per member (default: 1.5)
pub fn create_strategy(config: &toml::Value) -> Result<Box<dyn BatchingStrategy>, BatchingError> {
	Ok(Box::new(ProductStrategy::new(
		count_param(config, "min_orders", 3),
		float_param(config, "minutes_per_order", 1.5),
	)))
}

/// Registry for the product strategy.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "product";
	type Factory = crate::StrategyFactory;

	fn factory() -> Self::Factory {
		create_strategy
	}
}

impl crate::StrategyRegistry for Registry {}
