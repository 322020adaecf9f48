//! Order endpoints: intake, reads, status changes and exception handling.

use super::{order_error, transition_error};
use fulfillment_core::FulfillmentEngine;
use fulfillment_types::{
	APIError, AnalyzeExceptionResponse, ListOrdersQuery, ListOrdersResponse, NewOrder, OrderResponse,
	ResolveExceptionRequest, TransitionOutcome, UpdateStatusRequest,
};

/// Page size used when the caller does not pass `limit`.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Largest page size a caller may ask for.
pub const MAX_LIST_LIMIT: usize = 1000;

fn page_size(limit: Option<usize>) -> usize {
	limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)
}

/// Registers an order handed over by intake.
pub async fn register_order(
	engine: &FulfillmentEngine,
	new_order: NewOrder,
) -> Result<OrderResponse, APIError> {
	let order = engine.register_order(new_order).await.map_err(order_error)?;
	Ok(OrderResponse { order })
}

pub async fn get_order(engine: &FulfillmentEngine, id: &str) -> Result<OrderResponse, APIError> {
	let order = engine.get_order(id).await.map_err(transition_error)?;
	Ok(OrderResponse { order })
}

/// Lists orders newest first, optionally filtered by status.
pub async fn list_orders(
	engine: &FulfillmentEngine,
	query: ListOrdersQuery,
) -> Result<ListOrdersResponse, APIError> {
	let orders = engine
		.list_orders(query.status, page_size(query.limit))
		.await
		.map_err(transition_error)?;
	Ok(ListOrdersResponse {
		count: orders.len(),
		orders,
	})
}

pub async fn update_status(
	engine: &FulfillmentEngine,
	id: &str,
	request: UpdateStatusRequest,
) -> Result<TransitionOutcome, APIError> {
	engine
		.apply_order_status(id, request.status, request.revision)
		.await
		.map_err(transition_error)
}

/// Lists orders waiting in `exception`. Any `status` in the query is ignored.
pub async fn list_exceptions(
	engine: &FulfillmentEngine,
	query: ListOrdersQuery,
) -> Result<ListOrdersResponse, APIError> {
	let orders = engine
		.list_exceptions(page_size(query.limit))
		.await
		.map_err(transition_error)?;
	Ok(ListOrdersResponse {
		count: orders.len(),
		orders,
	})
}

/// Runs the rule-based exception analysis and returns the stored result.
pub async fn analyze_exception(
	engine: &FulfillmentEngine,
	id: &str,
) -> Result<AnalyzeExceptionResponse, APIError> {
	let analysis = engine.analyze_exception(id).await.map_err(order_error)?;
	Ok(AnalyzeExceptionResponse {
		order_id: id.to_string(),
		analysis,
	})
}

pub async fn resolve_exception(
	engine: &FulfillmentEngine,
	id: &str,
	request: ResolveExceptionRequest,
) -> Result<OrderResponse, APIError> {
	let order = engine
		.resolve_exception(id, request.notes)
		.await
		.map_err(order_error)?;
	Ok(OrderResponse { order })
}
