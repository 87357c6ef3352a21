//! REST adapter for the portal backend.

use async_trait::async_trait;
use domain::models::{AttendanceRequest, EventSummary, RegisterRequest, RemoteRegistration};
use domain::ports::{RegistrationBackend, RemoteError};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::BackendConfig;

/// Errors building the HTTP client.
#[derive(Debug, Error)]
pub enum HttpBackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// List endpoints answer either with a bare array or with `{"value": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped { value: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) | ListResponse::Wrapped { value: items } => items,
        }
    }
}

/// Talks to the portal's `/api/v1` endpoints.
#[derive(Debug, Clone)]
pub struct HttpRegistrationBackend {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpRegistrationBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, HttpBackendError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Unavailable("request timed out".to_string())
                } else {
                    RemoteError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), RemoteError> {
        debug!(path, "POST");
        self.send(self.client.post(self.url(path)).json(body)).await?;
        Ok(())
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RemoteError> {
        debug!(path, "GET");
        let response = self.send(self.client.get(self.url(path))).await?;
        let list: ListResponse<T> = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        Ok(list.into_vec())
    }
}

#[async_trait]
impl RegistrationBackend for HttpRegistrationBackend {
    async fn register(&self, event_id: i64, request: &RegisterRequest) -> Result<(), RemoteError> {
        self.post(&format!("/events/{}/register", event_id), request)
            .await
    }

    async fn mark_attendance(
        &self,
        event_id: i64,
        request: &AttendanceRequest,
    ) -> Result<(), RemoteError> {
        self.post(&format!("/events/{}/attendance", event_id), request)
            .await
    }

    async fn fetch_registrations(&self) -> Result<Vec<RemoteRegistration>, RemoteError> {
        self.get_list("/registrations").await
    }

    async fn fetch_events(&self) -> Result<Vec<EventSummary>, RemoteError> {
        self.get_list("/events").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            api_token: Some(String::new()),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpRegistrationBackend::new(&config("http://localhost:8000/api/v1/")).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000/api/v1");
        assert_eq!(
            backend.url("/events/3/register"),
            "http://localhost:8000/api/v1/events/3/register"
        );
        assert!(backend.api_token.is_none());
    }

    #[test]
    fn test_list_response_shapes() {
        let bare: ListResponse<i64> = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(bare.into_vec(), vec![1, 2]);

        let wrapped: ListResponse<i64> = serde_json::from_str(r#"{"value": [3]}"#).unwrap();
        assert_eq!(wrapped.into_vec(), vec![3]);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let backend = HttpRegistrationBackend::new(&BackendConfig {
            timeout_secs: 1,
            ..config("http://127.0.0.1:1")
        })
        .unwrap();

        let result = backend.fetch_events().await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
    }
}
