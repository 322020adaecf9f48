//! API types for the fulfillment HTTP API.
//!
//! Request and response bodies for the order, batch and exception endpoints,
//! plus the structured error type every handler returns.

use crate::{Batch, BatchDescriptor, ExceptionAnalysis, Order, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `PUT /api/orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
	pub status: OrderStatus,
	/// Revision the caller last read. When present, the change is rejected
	/// if the stored order has moved on.
	#[serde(default)]
	pub revision: Option<u64>,
}

/// Body of `POST /api/batches/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatusRequest {
	pub status: OrderStatus,
}

/// Body of `POST /api/exceptions/{id}/resolve`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveExceptionRequest {
	#[serde(default)]
	pub notes: String,
}

/// Query string of `GET /api/orders` and `GET /api/exceptions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrdersQuery {
	pub status: Option<OrderStatus>,
	pub limit: Option<usize>,
}

/// Response of `GET /api/batches/suggest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestBatchesResponse {
	pub count: usize,
	pub batches: Vec<BatchDescriptor>,
}

/// Response of `POST /api/batches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchResponse {
	pub batch_id: String,
}

/// Response of `GET /api/batches/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBatchResponse {
	pub batch: Batch,
}

/// Response of `POST /api/orders` and `GET /api/orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
	pub order: Order,
}

/// Response of `GET /api/orders` and `GET /api/exceptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
	pub count: usize,
	pub orders: Vec<Order>,
}

/// Response of `POST /api/exceptions/{id}/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeExceptionResponse {
	pub order_id: String,
	pub analysis: ExceptionAnalysis,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Referenced resource does not exist (404)
	NotFound { error_type: String, message: String },
	/// Write rejected because the resource changed underneath the caller (409)
	Conflict { error_type: String, message: String },
	/// Unprocessable entity for business logic failures (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone(), None),
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::Conflict {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message, None, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type, message, None, *retry_after),
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
