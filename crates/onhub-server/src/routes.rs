use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use onhub_store::error::StoreError;
use onhub_store::generate_id;
use onhub_store::local::LocalStore;
use onhub_types::api::{
    DeleteResponse, ErrorBody, LoginRequest, LoginResponse, SyncRequest, SyncResponse,
};
use onhub_types::{ActiveSession, EntityKind, Meta};

use crate::middleware;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LocalStore>,
    pub api_key: String,
    pub admin_user: String,
    pub admin_password: String,
    pub http: reqwest::Client,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Everything under `/wp-json/onhub/v1`. Ping and login are public; entity
/// CRUD and sync sit behind the API-key check.
pub fn api_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/sync", post(sync))
        .route("/{entity}", get(list_records).post(create_record))
        .route(
            "/{entity}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::require_api_key,
        ));

    Router::new()
        .route("/ping", get(ping))
        .route("/auth/login", post(login))
        .merge(protected)
}

// ── Error helpers ───────────────────────────────────────────────────────

fn internal(err: StoreError) -> ApiError {
    error!("Store error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("internal error")),
    )
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message)))
}

fn resolve_kind(segment: &str) -> Result<EntityKind, ApiError> {
    EntityKind::from_path_segment(segment).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::with_details("unknown entity", segment)),
        )
    })
}

fn now_value() -> Value {
    serde_json::to_value(Utc::now()).unwrap_or(Value::Null)
}

/// Assign an id and timestamps where the client left them out.
fn stamp_new(fields: &mut Map<String, Value>) {
    let has_id = fields
        .get("id")
        .and_then(Value::as_str)
        .map(|id| !id.is_empty())
        .unwrap_or(false);
    if !has_id {
        fields.insert("id".into(), Value::String(generate_id()));
    }
    for key in ["created_at", "updated_at"] {
        let missing = fields.get(key).map(Value::is_null).unwrap_or(true);
        if missing {
            fields.insert(key.into(), now_value());
        }
    }
}

// ── Entity CRUD ─────────────────────────────────────────────────────────

/// GET /{entity} — list, with query parameters as exact-match filters.
/// Filtering is the server's responsibility for remote clients.
pub async fn list_records(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let kind = resolve_kind(&entity)?;
    let records = state.store.list(kind, &Map::new()).map_err(internal)?;
    let filtered = records
        .into_iter()
        .filter(|record| params.iter().all(|(k, v)| query_matches(record, k, v)))
        .collect();
    Ok(Json(filtered))
}

/// A query parameter matches when the record field equals it: strings
/// verbatim, other JSON values by their serialized form.
fn query_matches(record: &Value, key: &str, raw: &str) -> bool {
    match record.get(key) {
        Some(Value::String(s)) => s == raw,
        Some(other) => other.to_string() == raw,
        None => false,
    }
}

/// POST /{entity} — insert a record, stamping id/timestamps if absent.
pub async fn create_record(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(mut record): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = resolve_kind(&entity)?;
    let Some(fields) = record.as_object_mut() else {
        return Err(bad_request("record must be a JSON object"));
    };
    stamp_new(fields);

    let id = fields["id"].as_str().unwrap_or_default().to_string();
    if state.store.get(kind, &id).map_err(internal)?.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorBody::with_details("duplicate id", id.as_str())),
        ));
    }

    state.store.insert(kind, &record).map_err(internal)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /{entity}/{id}
pub async fn get_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let kind = resolve_kind(&entity)?;
    match state.store.get(kind, &id).map_err(internal)? {
        Some(record) => Ok(Json(record)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody::with_details("record not found", id.as_str())),
        )),
    }
}

/// PUT /{entity}/{id} — field-merge update. A PUT to an unknown id creates
/// the record (upsert); local clients never get this behavior, remote ones
/// rely on it.
pub async fn update_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = resolve_kind(&entity)?;
    let Value::Object(patch) = patch else {
        return Err(bad_request("patch must be a JSON object"));
    };

    match state.store.get(kind, &id).map_err(internal)? {
        Some(Value::Object(mut fields)) => {
            for (key, value) in patch {
                fields.insert(key, value);
            }
            fields.insert("updated_at".into(), now_value());
            let merged = Value::Object(fields);
            state.store.replace(kind, &id, &merged).map_err(internal)?;
            Ok((StatusCode::OK, Json(merged)))
        }
        Some(_) => {
            error!("Stored {} record {} is not a JSON object", entity, id);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("stored record is malformed")),
            ))
        }
        None => {
            let mut fields = patch;
            fields.insert("id".into(), Value::String(id.clone()));
            stamp_new(&mut fields);
            let record = Value::Object(fields);
            state.store.insert(kind, &record).map_err(internal)?;
            info!("Upserted {} {}", entity, id);
            Ok((StatusCode::CREATED, Json(record)))
        }
    }
}

/// DELETE /{entity}/{id} — physical removal.
pub async fn delete_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let kind = resolve_kind(&entity)?;
    let deleted = state.store.delete(kind, &id).map_err(internal)?;
    Ok(Json(DeleteResponse { deleted }))
}

// ── Bulk sync ───────────────────────────────────────────────────────────

/// POST /sync — bulk upsert of one collection. Records without an id are
/// counted as errors, everything else is upserted individually.
pub async fn sync(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    let kind = resolve_table(&req.table)?;
    let total = req.data.len();
    let mut synced = 0;
    let mut errors = 0;

    for record in req.data {
        match upsert_record(&state.store, kind, &record) {
            Ok(()) => synced += 1,
            Err(err) => {
                warn!("Sync into {} failed: {}", req.table, err);
                errors += 1;
            }
        }
    }

    info!(
        "Synced {}/{} records into {} ({} errors)",
        synced, total, req.table, errors
    );
    Ok(Json(SyncResponse {
        synced,
        errors,
        total,
    }))
}

/// The sync body names its collection by storage key or path segment.
fn resolve_table(table: &str) -> Result<EntityKind, ApiError> {
    EntityKind::ALL
        .into_iter()
        .find(|k| k.collection() == table || k.path_segment() == table)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::with_details("unknown table", table)),
            )
        })
}

fn upsert_record(
    store: &LocalStore,
    kind: EntityKind,
    record: &Value,
) -> Result<(), StoreError> {
    let id = record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::Invalid {
            kind,
            source: serde::de::Error::custom("record has no id"),
        })?;

    if store.get(kind, id)?.is_some() {
        store.replace(kind, id, record)
    } else {
        store.insert(kind, record)
    }
}

// ── Auth & health ───────────────────────────────────────────────────────

/// POST /auth/login — static admin credentials, uuid session token. The
/// session is recorded as an ActiveSession entity.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if req.username != state.admin_user || req.password != state.admin_password {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("invalid credentials")),
        ));
    }

    let token = Uuid::new_v4().to_string();
    let mut session = ActiveSession {
        meta: Meta::default(),
        user: req.username.clone(),
        token: token.clone(),
    };
    session.meta.id = generate_id();

    let record = serde_json::to_value(&session).map_err(|err| {
        error!("Session encode failed: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new("internal error")),
        )
    })?;
    state
        .store
        .insert(EntityKind::ActiveSession, &record)
        .map_err(internal)?;

    info!("User {} logged in", req.username);
    Ok(Json(LoginResponse {
        user: req.username,
        token,
    }))
}

/// GET /ping — liveness check (no auth).
pub async fn ping() -> &'static str {
    "ok"
}

/// GET /health — same as ping, outside the API prefix.
pub async fn health() -> &'static str {
    "ok"
}
