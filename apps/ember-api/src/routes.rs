use std::convert::Infallible;

use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{
		IntoResponse, Response,
		sse::{Event, Sse},
	},
	routing::{get, post},
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;
use ember_domain::query::Mode;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
	pub query: String,
	#[serde(default)]
	pub mode: Option<String>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(root))
		.route("/health", get(health))
		.route("/query-stream", post(query_stream))
		.route("/get-suggestions", get(suggestions))
		.with_state(state)
}

async fn root() -> Json<Value> {
	Json(serde_json::json!({ "status": "online" }))
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn query_stream(
	State(state): State<AppState>,
	payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
	let Json(payload) = payload.map_err(|err| {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text(), None)
	})?;
	let mode = match payload.mode.as_deref() {
		None => Mode::default(),
		Some(raw) => raw.parse::<Mode>().map_err(|message| {
			json_error(
				StatusCode::UNPROCESSABLE_ENTITY,
				"invalid_request",
				message,
				Some(vec!["$.mode".to_string()]),
			)
		})?,
	};

	if payload.query.trim().is_empty() {
		return Err(json_error(
			StatusCode::UNPROCESSABLE_ENTITY,
			"invalid_request",
			"query must be non-empty.",
			Some(vec!["$.query".to_string()]),
		));
	}

	tracing::info!(mode = mode.as_str(), "Query stream opened.");

	let events = state
		.service
		.stream(payload.query, mode)
		.map(|event| Ok::<_, Infallible>(Event::default().data(event.to_data())));

	Ok(Sse::new(events))
}

async fn suggestions(State(state): State<AppState>) -> Json<Vec<String>> {
	Json(state.service.suggestions().await)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into(), fields }
}
