use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;

use onhub_types::api::{LoginRequest, LoginResponse, SyncRequest, SyncResponse};
use onhub_types::EntityKind;

use crate::config::RemoteConfig;
use crate::error::{Result, StoreError};

/// Auth header expected by the OnHub REST API.
pub const API_KEY_HEADER: &str = "X-OnHub-Key";

const API_BASE: &str = "wp-json/onhub/v1";

/// HTTP backend talking to a remote OnHub REST API. Built fresh from the
/// stored config on every operation; never caches connection state.
/// A failed call surfaces as an error with no retry and no local fallback.
pub struct RemoteStore {
    client: Client,
    base: String,
    api_key: String,
}

impl RemoteStore {
    pub fn new(client: Client, config: &RemoteConfig) -> Self {
        RemoteStore {
            base: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base, API_BASE, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(API_KEY_HEADER, &self.api_key)
    }

    /// Filters become query parameters; the server does the matching.
    pub async fn list(&self, kind: EntityKind, filters: &Map<String, Value>) -> Result<Vec<Value>> {
        let query: Vec<(String, String)> = filters
            .iter()
            .map(|(k, v)| (k.clone(), query_value(v)))
            .collect();
        let req = self
            .authed(self.client.get(self.url(kind.path_segment())))
            .query(&query);
        let body = check(req.send().await?).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// 404 is normalized to `None` to match the local backend.
    pub async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let path = format!("{}/{}", kind.path_segment(), id);
        let resp = self.authed(self.client.get(self.url(&path))).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(resp).await?))
    }

    pub async fn create(&self, kind: EntityKind, record: &Value) -> Result<Value> {
        let req = self
            .authed(self.client.post(self.url(kind.path_segment())))
            .json(record);
        check(req.send().await?).await
    }

    /// PUT merges the patch server-side and upserts when the id is absent —
    /// unlike the local backend, which fails with `NotFound`.
    pub async fn update(&self, kind: EntityKind, id: &str, patch: &Value) -> Result<Value> {
        let path = format!("{}/{}", kind.path_segment(), id);
        let req = self.authed(self.client.put(self.url(&path))).json(patch);
        check(req.send().await?).await
    }

    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let path = format!("{}/{}", kind.path_segment(), id);
        let resp = self
            .authed(self.client.delete(self.url(&path)))
            .send()
            .await?;
        let body = check(resp).await?;
        Ok(body
            .get("deleted")
            .and_then(Value::as_bool)
            .unwrap_or(true))
    }

    /// Health probe: true iff `/ping` answers 2xx.
    pub async fn ping(&self) -> bool {
        match self.client.get(self.url("ping")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!("Ping failed: {}", err);
                false
            }
        }
    }

    /// Bulk-push one whole collection to the remote `/sync` endpoint.
    pub async fn sync(&self, table: &str, data: Vec<Value>) -> Result<SyncResponse> {
        let req = self.authed(self.client.post(self.url("sync"))).json(&SyncRequest {
            table: table.to_string(),
            data,
        });
        let body = check(req.send().await?).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let req = self.client.post(self.url("auth/login")).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        });
        let resp = req.send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(StoreError::Unauthorized);
        }
        let body = check(resp).await?;
        Ok(serde_json::from_value(body)?)
    }
}

/// Map a non-2xx response to `StoreError::Http`, preferring the body's
/// `message`/`error` field, falling back to the numeric status.
async fn check(resp: Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let message = error_message(&text).unwrap_or_else(|| status.as_u16().to_string());
        return Err(StoreError::Http {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.json().await?)
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Query-string rendering of a filter value: strings verbatim, everything
/// else in its JSON form.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let config = RemoteConfig {
            url: "https://wp.example.com/".into(),
            api_key: "k".into(),
        };
        let remote = RemoteStore::new(Client::new(), &config);
        assert_eq!(
            remote.url("folders"),
            "https://wp.example.com/wp-json/onhub/v1/folders"
        );
    }

    #[test]
    fn error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"message":"no such table"}"#).as_deref(),
            Some("no such table")
        );
        assert_eq!(
            error_message(r#"{"error":"bad key"}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(error_message("<html>502</html>"), None);
    }

    #[test]
    fn query_values_render_strings_verbatim() {
        assert_eq!(query_value(&Value::String("a@x.com".into())), "a@x.com");
        assert_eq!(query_value(&Value::Bool(true)), "true");
        assert_eq!(query_value(&serde_json::json!(3)), "3");
    }
}
