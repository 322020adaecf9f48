//! In-process event bus.
//!
//! A thin wrapper around a tokio broadcast channel. Publishing never blocks;
//! slow subscribers lag and lose the oldest events rather than holding up
//! the publisher.

use fulfillment_types::FulfillmentEvent;
use tokio::sync::broadcast;

/// Broadcast channel for fulfillment events.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<FulfillmentEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Creates a new receiver that sees events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is subscribed; callers usually ignore that.
	pub fn publish(
		&self,
		event: FulfillmentEvent,
	) -> Result<usize, broadcast::error::SendError<FulfillmentEvent>> {
		self.sender.send(event)
	}
}
