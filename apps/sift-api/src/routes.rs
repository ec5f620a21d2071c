use axum::{
	Json, Router,
	extract::{
		Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::{HeaderValue, StatusCode, header::RETRY_AFTER},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use sift_service::{
	ContinueScanRequest, ContinueScanResponse, Error, ProgressRequest, ProgressResponse,
	ResultsRequest, ResultsResponse, StartScanRequest, StartScanResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/scans", post(start_scan))
		.route("/v1/scans/continue", post(continue_scan))
		.route("/v1/scans/progress", get(progress))
		.route("/v1/scans/results", get(results))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn start_scan(
	State(state): State<AppState>,
	payload: Result<Json<StartScanRequest>, JsonRejection>,
) -> Result<Json<StartScanResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.start_scan(payload).await?;

	Ok(Json(response))
}

async fn continue_scan(
	State(state): State<AppState>,
	payload: Result<Json<ContinueScanRequest>, JsonRejection>,
) -> Result<Json<ContinueScanResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.continue_scan(payload).await?;

	Ok(Json(response))
}

async fn progress(
	State(state): State<AppState>,
	query: Result<Query<ProgressRequest>, QueryRejection>,
) -> Result<Json<ProgressResponse>, ApiError> {
	let Query(query) = query?;
	let response = state.service.get_progress(query).await?;

	Ok(Json(response))
}

async fn results(
	State(state): State<AppState>,
	query: Result<Query<ResultsRequest>, QueryRejection>,
) -> Result<Json<ResultsResponse>, ApiError> {
	let Query(query) = query?;
	let response = state.service.get_results(query).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	success: bool,
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	retry_after_secs: Option<u64>,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), retry_after_secs: None }
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } => {
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
			},
			Error::NotFound { message } => json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			Error::Busy { message, retry_after_secs } => ApiError {
				retry_after_secs: Some(retry_after_secs),
				..json_error(StatusCode::CONFLICT, "BUSY", message)
			},
			Error::Provider { message } => {
				tracing::error!(error = %message, "Provider error.");

				json_error(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message)
			},
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage error.");

				json_error(StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR", message)
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(err: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.body_text())
	}
}

impl From<QueryRejection> for ApiError {
	fn from(err: QueryRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.body_text())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { success: false, error_code: self.error_code, message: self.message };
		let mut response = (self.status, Json(body)).into_response();

		if let Some(secs) = self.retry_after_secs {
			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn busy_maps_to_conflict_with_retry_after() {
		let response = ApiError::from(Error::Busy {
			message: "Scan s is being continued by another caller.".to_string(),
			retry_after_secs: 42,
		})
		.into_response();

		assert_eq!(response.status(), StatusCode::CONFLICT);
		assert_eq!(response.headers().get(RETRY_AFTER).expect("Missing Retry-After."), "42");
	}

	#[test]
	fn storage_maps_to_service_unavailable() {
		let response =
			ApiError::from(Error::Storage { message: "store is unreachable".to_string() })
				.into_response();

		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
		assert!(response.headers().get(RETRY_AFTER).is_none());
	}
}
