use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::{DomainError, MultipartForm};

/// Raw HTTP response, whatever the status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body is declared as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// HTTP client port for all network requests.
///
/// Transport failures are `DomainError::Network`; non-2xx statuses are
/// returned as responses so callers can read error payloads.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request.
    async fn get(&self, url: &str) -> Result<HttpResponse, DomainError>;

    /// POST a multipart/form-data body.
    async fn post_multipart(
        &self,
        url: &str,
        form: MultipartForm,
    ) -> Result<HttpResponse, DomainError>;
}
