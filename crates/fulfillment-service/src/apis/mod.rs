//! Request handlers for the fulfillment HTTP API.
//!
//! Handlers translate engine errors into `APIError` values carrying stable
//! error codes.

pub mod batch;
pub mod order;

use fulfillment_core::{BatchError, OrderError, TransitionError};
use fulfillment_types::APIError;

/// Seconds a client should wait before retrying after a storage outage.
const STORAGE_RETRY_AFTER_SECS: u64 = 5;

fn storage_unavailable(message: String) -> APIError {
	APIError::ServiceUnavailable {
		error_type: "STORAGE_UNAVAILABLE".to_string(),
		message,
		retry_after: Some(STORAGE_RETRY_AFTER_SECS),
	}
}

pub(crate) fn transition_error(err: TransitionError) -> APIError {
	let error_type = err.code().to_string();
	match &err {
		TransitionError::NotFound(_) => APIError::NotFound {
			error_type,
			message: err.to_string(),
		},
		TransitionError::InvalidTransition { from, to } => APIError::UnprocessableEntity {
			error_type,
			message: err.to_string(),
			details: Some(serde_json::json!({ "from": from, "to": to })),
		},
		TransitionError::Conflict { .. } => APIError::Conflict {
			error_type,
			message: err.to_string(),
		},
		TransitionError::Storage(_) if err.is_retryable() => storage_unavailable(err.to_string()),
		TransitionError::Storage(_) => APIError::InternalServerError {
			error_type,
			message: err.to_string(),
		},
	}
}

pub(crate) fn order_error(err: OrderError) -> APIError {
	match err {
		OrderError::InvalidInitialStatus(_) => APIError::BadRequest {
			error_type: err.code().to_string(),
			message: err.to_string(),
			details: None,
		},
		OrderError::State(e) => transition_error(e),
	}
}

pub(crate) fn batch_error(err: BatchError) -> APIError {
	let error_type = err.code().to_string();
	match &err {
		BatchError::NotFound(_) => APIError::NotFound {
			error_type,
			message: err.to_string(),
		},
		BatchError::UnknownOrders(ids) => APIError::UnprocessableEntity {
			error_type,
			message: err.to_string(),
			details: Some(serde_json::json!({ "order_ids": ids })),
		},
		BatchError::Storage(_) if err.is_retryable() => storage_unavailable(err.to_string()),
		BatchError::Storage(_) => APIError::InternalServerError {
			error_type,
			message: err.to_string(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_storage::StorageError;
	use fulfillment_types::OrderStatus;

	#[test]
	fn test_transition_error_status_codes() {
		let cases = [
			(TransitionError::NotFound("ORD-1".into()), 404),
			(
				TransitionError::InvalidTransition {
					from: OrderStatus::Paid,
					to: OrderStatus::Shipped,
				},
				422,
			),
			(
				TransitionError::Conflict {
					expected: 1,
					actual: 2,
				},
				409,
			),
			(
				TransitionError::Storage(StorageError::Timeout {
					operation: "get",
					timeout_ms: 5000,
				}),
				503,
			),
			(
				TransitionError::Storage(StorageError::Serialization("bad".into())),
				500,
			),
		];
		for (err, status) in cases {
			assert_eq!(transition_error(err).status_code(), status);
		}
	}

	#[test]
	fn test_storage_outage_sets_retry_after() {
		let err = batch_error(BatchError::Storage(StorageError::Backend("down".into())));
		let body = err.to_error_response();
		assert_eq!(body.error, "STORAGE_UNAVAILABLE");
		assert_eq!(body.retry_after, Some(STORAGE_RETRY_AFTER_SECS));
	}
}
