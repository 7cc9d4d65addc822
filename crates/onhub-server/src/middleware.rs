use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderName, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use onhub_types::api::ErrorBody;

use crate::routes::AppState;

/// Auth header carried by every OnHub API client.
pub const API_KEY_HEADER_NAME: HeaderName = HeaderName::from_static("x-onhub-key");

/// Gate: the static API key must match. There is no per-user record
/// authorization behind it.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorBody>)> {
    let provided = req
        .headers()
        .get(&API_KEY_HEADER_NAME)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.api_key => Ok(next.run(req).await),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("invalid or missing API key")),
        )),
    }
}
