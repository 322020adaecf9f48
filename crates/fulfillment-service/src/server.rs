//! HTTP server for the fulfillment API.
//!
//! Exposes order intake, status changes, exception handling and the batch
//! lifecycle over JSON, plus a health check.

use crate::apis;
use axum::{
	extract::{DefaultBodyLimit, Path, Query, State},
	http::{HeaderName, HeaderValue, Method, StatusCode},
	response::{IntoResponse, Json},
	routing::{get, post, put},
	Router,
};
use fulfillment_config::{ApiConfig, CorsConfig};
use fulfillment_core::FulfillmentEngine;
use fulfillment_types::{
	APIError, AnalyzeExceptionResponse, BatchDescriptor, BatchStatusRequest, BulkResult, CreateBatchResponse,
	GetBatchResponse, ListOrdersQuery, ListOrdersResponse, NewOrder, OrderResponse,
	ResolveExceptionRequest, SuggestBatchesResponse, TransitionOutcome, UpdateStatusRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the fulfillment engine for processing requests.
	pub engine: Arc<FulfillmentEngine>,
}

/// Builds the router with all routes and middleware.
pub fn router(state: AppState, api_config: &ApiConfig) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_register_order).get(handle_list_orders))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/status", put(handle_update_status))
				.route("/batches", post(handle_create_batch))
				.route("/batches/suggest", get(handle_suggest_batches))
				.route("/batches/{id}", get(handle_get_batch))
				.route("/batches/{id}/status", post(handle_batch_status))
				.route("/exceptions", get(handle_list_exceptions))
				.route("/exceptions/{id}/analyze", post(handle_analyze_exception))
				.route("/exceptions/{id}/resolve", post(handle_resolve_exception)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<FulfillmentEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { engine }, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Fulfillment API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Permissive CORS unless the config narrows it down.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origins = if cors.allowed_origins.iter().any(|o| o == "*") {
		AllowOrigin::from(Any)
	} else {
		AllowOrigin::list(
			cors.allowed_origins
				.iter()
				.filter_map(|o| parse_or_warn::<HeaderValue>("origin", o)),
		)
	};
	let methods: Vec<Method> = cors
		.allowed_methods
		.iter()
		.filter_map(|m| parse_or_warn("method", m))
		.collect();
	let headers: Vec<HeaderName> = cors
		.allowed_headers
		.iter()
		.filter_map(|h| parse_or_warn("header", h))
		.collect();

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(methods)
		.allow_headers(headers)
}

fn parse_or_warn<T: std::str::FromStr>(kind: &str, value: &str) -> Option<T> {
	match value.parse() {
		Ok(parsed) => Some(parsed),
		Err(_) => {
			tracing::warn!(kind, value, "Ignoring invalid CORS entry");
			None
		},
	}
}

/// Handles GET /health requests.
async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "ok",
		"service": state.engine.config().service.id,
	}))
}

/// Handles POST /api/orders requests.
async fn handle_register_order(
	State(state): State<AppState>,
	Json(new_order): Json<NewOrder>,
) -> Result<impl IntoResponse, APIError> {
	match apis::order::register_order(&state.engine, new_order).await {
		Ok(response) => Ok((StatusCode::CREATED, Json(response))),
		Err(e) => {
			tracing::warn!("Order registration failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/orders requests.
async fn handle_list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, APIError> {
	match apis::order::list_orders(&state.engine, query).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Order listing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderResponse>, APIError> {
	match apis::order::get_order(&state.engine, &id).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Order retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles PUT /api/orders/{id}/status requests.
async fn handle_update_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TransitionOutcome>, APIError> {
	match apis::order::update_status(&state.engine, &id, request).await {
		Ok(outcome) => Ok(Json(outcome)),
		Err(e) => {
			tracing::warn!("Status update failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/batches/suggest requests.
async fn handle_suggest_batches(
	State(state): State<AppState>,
) -> Result<Json<SuggestBatchesResponse>, APIError> {
	match apis::batch::suggest_batches(&state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Batch suggestion failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/batches requests.
async fn handle_create_batch(
	State(state): State<AppState>,
	Json(descriptor): Json<BatchDescriptor>,
) -> Result<impl IntoResponse, APIError> {
	match apis::batch::create_batch(&state.engine, descriptor).await {
		Ok(response) => Ok((StatusCode::CREATED, Json::<CreateBatchResponse>(response))),
		Err(e) => {
			tracing::warn!("Batch creation failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/batches/{id} requests.
async fn handle_get_batch(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<GetBatchResponse>, APIError> {
	match apis::batch::get_batch(&state.engine, &id).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Batch retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/batches/{id}/status requests.
async fn handle_batch_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<BatchStatusRequest>,
) -> Result<Json<BulkResult>, APIError> {
	match apis::batch::apply_status(&state.engine, &id, request).await {
		Ok(result) => Ok(Json(result)),
		Err(e) => {
			tracing::warn!("Batch status update failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/exceptions requests.
async fn handle_list_exceptions(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, APIError> {
	match apis::order::list_exceptions(&state.engine, query).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Exception listing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/exceptions/{id}/analyze requests.
async fn handle_analyze_exception(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<AnalyzeExceptionResponse>, APIError> {
	match apis::order::analyze_exception(&state.engine, &id).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Exception analysis failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/exceptions/{id}/resolve requests.
async fn handle_resolve_exception(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<ResolveExceptionRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	match apis::order::resolve_exception(&state.engine, &id, request).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Exception resolution failed: {}", e);
			Err(e)
		},
	}
}
