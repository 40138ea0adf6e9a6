use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

// Postgres SQLSTATE for unique_violation, surfaced verbatim by PostgREST.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl SupabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, SupabaseError::UniqueViolation(_))
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("PostgREST error ({}): {}", status, error_text);
            return Err(Self::classify_error(status.as_u16(), &error_text));
        }

        let data = response
            .json::<T>()
            .await
            .map_err(|e| SupabaseError::Decode(e.to_string()))?;
        Ok(data)
    }

    // PostgREST relays the Postgres SQLSTATE in the error body's "code"
    // field; 23505 is the only one the core reacts to structurally.
    fn classify_error(status: u16, body: &str) -> SupabaseError {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(String::from));

        if code.as_deref() == Some(UNIQUE_VIOLATION) {
            return SupabaseError::UniqueViolation(body.to_string());
        }

        match status {
            401 | 403 => SupabaseError::Auth(body.to_string()),
            404 => SupabaseError::NotFound(body.to_string()),
            _ => SupabaseError::Api {
                status,
                message: body.to_string(),
            },
        }
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_classified_from_sqlstate() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"appointments_slot_key\""}"#;
        let err = SupabaseClient::classify_error(409, body);
        assert!(err.is_unique_violation());
    }

    #[test]
    fn plain_conflict_without_sqlstate_is_api_error() {
        let err = SupabaseClient::classify_error(409, r#"{"message":"conflict"}"#);
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn auth_statuses_map_to_auth() {
        let err = SupabaseClient::classify_error(401, "jwt expired");
        assert!(matches!(err, SupabaseError::Auth(_)));
    }
}
