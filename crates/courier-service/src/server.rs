//! HTTP server for the courier API.
//!
//! Routes map one-to-one onto engine operations. Every response, success or
//! failure, uses the [`ApiResponse`] envelope.

use crate::apis::{self, payload::RequestPayload};
use axum::{
	extract::{DefaultBodyLimit, Request, State},
	http::{HeaderName, HeaderValue, Method, StatusCode},
	response::Json,
	routing::{get, post},
	Router, ServiceExt,
};
use courier_config::{ApiConfig, CorsConfig};
use courier_core::{OrderEngine, OrderError};
use courier_types::{APIError, ApiResponse};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::{Layer, ServiceBuilder};
use tower_http::{
	cors::{Any, CorsLayer},
	normalize_path::{NormalizePath, NormalizePathLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine handling every order operation.
	pub engine: OrderEngine,
}

type ApiResult = Result<Json<ApiResponse>, APIError>;

/// Converts an engine failure, logging anything that is not the client's fault.
fn into_api_error(operation: &str, err: OrderError) -> APIError {
	let kind = err.kind();
	if kind.is_client_error() {
		tracing::debug!(operation, kind = kind.as_str(), error = %err, "Request rejected");
	} else {
		tracing::error!(operation, kind = kind.as_str(), error = %err, "Request failed");
	}
	APIError::from(err)
}

/// Builds the router with all routes and middleware.
///
/// Trailing slashes are stripped before routing, so `/orders/new/` and
/// `/orders/new` are the same endpoint.
pub fn build_router(state: AppState, api_config: &ApiConfig) -> NormalizePath<Router> {
	let router = Router::new()
		.route("/health", get(handle_health))
		.route("/orders/new", post(handle_create_order))
		.route("/orders/update", post(handle_update_order))
		.route("/orders/status", get(handle_order_status).post(handle_order_status))
		.route("/orders/uncompleted", get(handle_oldest_pending))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(TimeoutLayer::with_status_code(
					StatusCode::REQUEST_TIMEOUT,
					Duration::from_secs(api_config.timeout_seconds),
				))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state);

	NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Permissive unless origins are configured.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let mut layer = CorsLayer::new();
	layer = if cors.allowed_origins.iter().any(|o| o == "*") {
		layer.allow_origin(Any)
	} else {
		let origins: Vec<HeaderValue> = cors
			.allowed_origins
			.iter()
			.filter_map(|o| HeaderValue::from_str(o).ok())
			.collect();
		layer.allow_origin(origins)
	};

	let methods: Vec<Method> = cors
		.allowed_methods
		.iter()
		.filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
		.collect();
	layer = if methods.is_empty() {
		layer.allow_methods([Method::GET, Method::POST])
	} else {
		layer.allow_methods(methods)
	};

	let headers: Vec<HeaderName> = cors
		.allowed_headers
		.iter()
		.filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
		.collect();
	if headers.is_empty() {
		layer.allow_headers(Any)
	} else {
		layer.allow_headers(headers)
	}
}

/// Starts the HTTP server and serves until ctrl-c.
pub async fn start_server(
	api_config: ApiConfig,
	engine: OrderEngine,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(AppState { engine }, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Courier API server starting on {}", bind_address);

	axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::warn!(error = %e, "Failed to listen for shutdown signal");
		std::future::pending::<()>().await;
	}
	tracing::info!("Shutdown signal received");
}

async fn handle_health() -> Json<ApiResponse> {
	Json(ApiResponse::ok(json!({ "status": "ok" })))
}

/// Handles POST /orders/new requests.
async fn handle_create_order(
	State(state): State<AppState>,
	RequestPayload(payload): RequestPayload,
) -> ApiResult {
	apis::order::create_order(&state.engine, &payload)
		.await
		.map(Json)
		.map_err(|e| into_api_error("create_order", e))
}

/// Handles POST /orders/update requests.
async fn handle_update_order(
	State(state): State<AppState>,
	RequestPayload(payload): RequestPayload,
) -> ApiResult {
	apis::order::update_order(&state.engine, &payload)
		.await
		.map(Json)
		.map_err(|e| into_api_error("update_order", e))
}

/// Handles GET and POST /orders/status requests.
async fn handle_order_status(
	State(state): State<AppState>,
	RequestPayload(payload): RequestPayload,
) -> ApiResult {
	apis::order::order_status(&state.engine, &payload)
		.await
		.map(Json)
		.map_err(|e| into_api_error("order_status", e))
}

/// Handles GET /orders/uncompleted requests.
async fn handle_oldest_pending(State(state): State<AppState>) -> ApiResult {
	apis::order::oldest_pending(&state.engine)
		.await
		.map(Json)
		.map_err(|e| into_api_error("oldest_pending", e))
}
