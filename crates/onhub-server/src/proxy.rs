use axum::Json;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::warn;

use onhub_store::remote::API_KEY_HEADER;
use onhub_types::api::{ErrorBody, ProxyRequest};

use crate::routes::AppState;

/// POST /api/wp-proxy — forward a request to a WordPress-hosted OnHub API
/// server-side, so browser clients sidestep CORS. Returns the upstream JSON
/// body verbatim, or a normalized `{error, details}` on failure. Preflight
/// OPTIONS is answered by the router's CORS layer.
pub async fn wp_proxy(
    State(state): State<AppState>,
    Json(req): Json<ProxyRequest>,
) -> Response {
    let method = match Method::from_bytes(req.method.to_uppercase().as_bytes()) {
        Ok(method) => method,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::with_details("unsupported method", req.method)),
            )
                .into_response();
        }
    };

    let url = format!(
        "{}/wp-json/onhub/v1/{}",
        req.wp_url.trim_end_matches('/'),
        req.endpoint.trim_start_matches('/')
    );

    let mut upstream = state
        .http
        .request(method, &url)
        .header(API_KEY_HEADER, &req.wp_api_key);
    if let Some(data) = &req.data {
        upstream = upstream.json(data);
    }

    match upstream.send().await {
        Ok(resp) => {
            let status = resp.status();
            match resp.json::<Value>().await {
                Ok(body) => (status, Json(body)).into_response(),
                Err(err) => {
                    warn!("Proxy to {} returned a non-JSON body: {}", url, err);
                    (
                        StatusCode::BAD_GATEWAY,
                        Json(ErrorBody::with_details(
                            "upstream returned a non-JSON body",
                            err.to_string(),
                        )),
                    )
                        .into_response()
                }
            }
        }
        Err(err) => {
            warn!("Proxy to {} failed: {}", url, err);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody::with_details(
                    "proxy request failed",
                    err.to_string(),
                )),
            )
                .into_response()
        }
    }
}
