//! User sessions in the hosted backend.
//!
//! A `UserSession` is the explicit handle to one signed-in user; the
//! `SessionStore` trait loads and saves it. `LeanCloudStore` talks to the
//! LeanCloud REST API, `MemoryStore` keeps users in process.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::config::BackendConfig;
use crate::error::LyreError;
use crate::history::HistoryEntry;

const HISTORY_FIELD: &str = "history";

/// LeanCloud error code for an unknown session token.
const USER_NOT_FOUND: i64 = 211;

#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub object_id: String,
    pub session_token: String,
    fields: Map<String, Value>,
}

impl UserSession {
    pub fn new(
        object_id: impl Into<String>,
        session_token: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            session_token: session_token.into(),
            fields,
        }
    }

    /// Build a session from a user object as returned by `/users/me`.
    pub fn from_user_object(user: Value, session_token: &str) -> Result<Self, LyreError> {
        let Value::Object(fields) = user else {
            return Err(LyreError::Backend {
                code: 0,
                message: "user object is not a JSON object".to_string(),
            });
        };

        let object_id = fields
            .get("objectId")
            .and_then(Value::as_str)
            .ok_or_else(|| LyreError::Backend {
                code: 0,
                message: "user object has no objectId".to_string(),
            })?
            .to_string();

        Ok(Self::new(object_id, session_token, fields))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Decoded `history` field; unset or `null` is an empty history.
    ///
    /// Entries that do not decode are skipped here but stay in the stored
    /// array; see [`UserSession::append_history`].
    pub fn history(&self) -> Result<Vec<HistoryEntry>, LyreError> {
        let items = match self.fields.get(HISTORY_FIELD) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => return Err(malformed_history(other)),
        };

        let mut history = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match serde_json::from_value::<HistoryEntry>(item.clone()) {
                Ok(entry) => history.push(entry),
                Err(e) => tracing::warn!(
                    user = %self.object_id,
                    index,
                    error = %e,
                    "Skipping unreadable history entry"
                ),
            }
        }
        Ok(history)
    }

    /// Replace the whole `history` field.
    pub fn set_history(&mut self, history: &[HistoryEntry]) -> Result<(), LyreError> {
        self.fields
            .insert(HISTORY_FIELD.to_string(), serde_json::to_value(history)?);
        Ok(())
    }

    /// Add one entry to the stored array, leaving existing values untouched.
    pub fn append_history(&mut self, entry: &HistoryEntry) -> Result<(), LyreError> {
        let encoded = serde_json::to_value(entry)?;
        match self.fields.get_mut(HISTORY_FIELD) {
            None | Some(Value::Null) => {
                self.fields
                    .insert(HISTORY_FIELD.to_string(), Value::Array(vec![encoded]));
            }
            Some(Value::Array(items)) => items.push(encoded),
            Some(other) => return Err(malformed_history(other)),
        }
        Ok(())
    }

    fn history_value(&self) -> Value {
        self.fields.get(HISTORY_FIELD).cloned().unwrap_or(Value::Null)
    }
}

fn malformed_history(value: &Value) -> LyreError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    LyreError::MalformedHistory(format!("expected an array, found {}", kind))
}

// ============================================================================
// SessionStore trait
// ============================================================================

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve the user owning `session_token`.
    async fn current_user(&self, session_token: &str) -> Result<UserSession, LyreError>;

    /// Persist the session's history field.
    async fn save(&self, session: &UserSession) -> Result<(), LyreError>;
}

// ============================================================================
// LeanCloudStore
// ============================================================================

#[derive(Debug, Deserialize)]
struct LeanCloudError {
    code: i64,
    error: String,
}

/// LeanCloud REST API 1.1 user store.
#[derive(Debug, Clone)]
pub struct LeanCloudStore {
    client: Client,
    config: BackendConfig,
}

impl LeanCloudStore {
    pub fn new(config: BackendConfig) -> Result<Self, LyreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/1.1{}", self.config.server_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder, session_token: &str) -> RequestBuilder {
        request
            .header("X-LC-Id", &self.config.app_id)
            .header("X-LC-Key", &self.config.app_key)
            .header("X-LC-Session", session_token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, LyreError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<LeanCloudError>(&body) {
                Ok(e) => {
                    tracing::error!(code = e.code, message = %e.error, "LeanCloud error");
                    LyreError::Backend {
                        code: e.code,
                        message: e.error,
                    }
                }
                Err(_) => LyreError::Api {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SessionStore for LeanCloudStore {
    async fn current_user(&self, session_token: &str) -> Result<UserSession, LyreError> {
        if session_token.is_empty() {
            return Err(LyreError::MissingSession);
        }

        tracing::debug!("Fetching current user from LeanCloud");
        let request = self.authorized(self.client.get(self.url("/users/me")), session_token);
        let user = self.send(request).await?;
        UserSession::from_user_object(user, session_token)
    }

    async fn save(&self, session: &UserSession) -> Result<(), LyreError> {
        let path = format!("/users/{}", session.object_id);
        let body = serde_json::json!({ HISTORY_FIELD: session.history_value() });
        let request = self
            .authorized(self.client.put(self.url(&path)), &session.session_token)
            .json(&body);

        self.send(request).await?;
        tracing::info!(user = %session.object_id, "Saved history to LeanCloud");
        Ok(())
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store keyed by session token.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: UserSession) {
        self.users
            .lock()
            .await
            .insert(session.session_token.clone(), session);
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn current_user(&self, session_token: &str) -> Result<UserSession, LyreError> {
        if session_token.is_empty() {
            return Err(LyreError::MissingSession);
        }

        self.users
            .lock()
            .await
            .get(session_token)
            .cloned()
            .ok_or_else(|| LyreError::Backend {
                code: USER_NOT_FOUND,
                message: "Could not find user.".to_string(),
            })
    }

    async fn save(&self, session: &UserSession) -> Result<(), LyreError> {
        self.users
            .lock()
            .await
            .insert(session.session_token.clone(), session.clone());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
