//! Batch endpoints: suggestions and the batch lifecycle.

use super::{batch_error, transition_error};
use fulfillment_core::FulfillmentEngine;
use fulfillment_types::{
	APIError, BatchDescriptor, BatchStatusRequest, BulkResult, CreateBatchResponse,
	GetBatchResponse, SuggestBatchesResponse,
};

/// Computes ranked batch suggestions over the current validated orders.
pub async fn suggest_batches(engine: &FulfillmentEngine) -> Result<SuggestBatchesResponse, APIError> {
	let batches = engine.suggest_batches().await.map_err(transition_error)?;
	Ok(SuggestBatchesResponse {
		count: batches.len(),
		batches,
	})
}

/// Persists a batch from a suggested or hand-built descriptor.
pub async fn create_batch(
	engine: &FulfillmentEngine,
	descriptor: BatchDescriptor,
) -> Result<CreateBatchResponse, APIError> {
	let batch = engine.create_batch(descriptor).await.map_err(batch_error)?;
	Ok(CreateBatchResponse { batch_id: batch.id })
}

pub async fn get_batch(engine: &FulfillmentEngine, id: &str) -> Result<GetBatchResponse, APIError> {
	let batch = engine.get_batch(id).await.map_err(batch_error)?;
	Ok(GetBatchResponse { batch })
}

/// Applies one status to every member order of a batch.
///
/// Per-member failures are part of the successful response.
pub async fn apply_status(
	engine: &FulfillmentEngine,
	id: &str,
	request: BatchStatusRequest,
) -> Result<BulkResult, APIError> {
	engine
		.bulk_apply_batch_status(id, request.status)
		.await
		.map_err(batch_error)
}
