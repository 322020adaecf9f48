//! Order status transition policy.
//!
//! The lifecycle is a fixed directed graph:
//!
//! ```text
//! validated -> processing -> paid -> picking -> packed -> shipped -> delivered
//!     |             |
//!     +---> paid    +---> exception
//! ```
//!
//! `delivered` and `exception` have no outgoing edges. Writing the status an
//! order already has is always allowed.

use fulfillment_types::OrderStatus;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Validated,
		HashSet::from([OrderStatus::Processing, OrderStatus::Paid]),
	);
	m.insert(
		OrderStatus::Processing,
		HashSet::from([OrderStatus::Paid, OrderStatus::Exception]),
	);
	m.insert(OrderStatus::Paid, HashSet::from([OrderStatus::Picking]));
	m.insert(OrderStatus::Picking, HashSet::from([OrderStatus::Packed]));
	m.insert(OrderStatus::Packed, HashSet::from([OrderStatus::Shipped]));
	m.insert(OrderStatus::Shipped, HashSet::from([OrderStatus::Delivered]));
	m.insert(OrderStatus::Delivered, HashSet::new()); // terminal
	m.insert(OrderStatus::Exception, HashSet::new()); // terminal
	m
});

/// Pure, static rules for order status changes.
pub struct TransitionPolicy;

impl TransitionPolicy {
	/// Whether an order in `from` may be moved to `to`.
	pub fn is_allowed(from: OrderStatus, to: OrderStatus) -> bool {
		from == to
			|| TRANSITIONS
				.get(&from)
				.is_some_and(|allowed| allowed.contains(&to))
	}

	/// Statuses reachable from `from` in one step, in lifecycle order.
	///
	/// Does not include `from` itself.
	pub fn next_statuses(from: OrderStatus) -> Vec<OrderStatus> {
		OrderStatus::ALL
			.into_iter()
			.filter(|to| {
				TRANSITIONS
					.get(&from)
					.is_some_and(|allowed| allowed.contains(to))
			})
			.collect()
	}

	pub fn is_terminal(status: OrderStatus) -> bool {
		Self::next_statuses(status).is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use OrderStatus::*;

	#[test]
	fn test_allowed_edges() {
		let edges = [
			(Validated, Processing),
			(Validated, Paid),
			(Processing, Paid),
			(Processing, Exception),
			(Paid, Picking),
			(Picking, Packed),
			(Packed, Shipped),
			(Shipped, Delivered),
		];

		for from in OrderStatus::ALL {
			for to in OrderStatus::ALL {
				let expected = from == to || edges.contains(&(from, to));
				assert_eq!(
					TransitionPolicy::is_allowed(from, to),
					expected,
					"{} -> {}",
					from,
					to
				);
			}
		}
	}

	#[test]
	fn test_same_status_always_allowed() {
		for status in OrderStatus::ALL {
			assert!(TransitionPolicy::is_allowed(status, status));
		}
	}

	#[test]
	fn test_terminal_statuses() {
		let terminal: Vec<_> = OrderStatus::ALL
			.into_iter()
			.filter(|s| TransitionPolicy::is_terminal(*s))
			.collect();
		assert_eq!(terminal, vec![Delivered, Exception]);
	}

	#[test]
	fn test_no_skipping_ahead() {
		assert!(!TransitionPolicy::is_allowed(Paid, Shipped));
		assert!(!TransitionPolicy::is_allowed(Validated, Delivered));
		assert!(!TransitionPolicy::is_allowed(Shipped, Exception));
		assert!(!TransitionPolicy::is_allowed(Exception, Validated));
	}

	#[test]
	fn test_next_statuses_in_lifecycle_order() {
		assert_eq!(TransitionPolicy::next_statuses(Validated), vec![Processing, Paid]);
		assert_eq!(TransitionPolicy::next_statuses(Processing), vec![Paid, Exception]);
		assert!(TransitionPolicy::next_statuses(Delivered).is_empty());
	}
}
