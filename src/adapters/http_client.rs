use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::domain::generation::FormPart;
use crate::domain::{DomainError, MultipartForm};
use crate::ports::{HttpClient, HttpResponse};

/// reqwest-backed HTTP client used for the generation and result endpoints.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("PromptVision/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Network(format!("Failed to create HTTP client: {}", e)))?;

        info!(timeout_secs = timeout.as_secs(), "HTTP client initialized");
        Ok(Self { client })
    }

    fn build_form(form: MultipartForm) -> Result<Form, DomainError> {
        let mut out = Form::new();
        for part in form.into_parts() {
            out = match part {
                FormPart::Text { name, value } => out.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    content_type,
                    bytes,
                } => {
                    let part = Part::bytes(bytes)
                        .file_name(filename)
                        .mime_str(content_type)
                        .map_err(|e| DomainError::Network(e.to_string()))?;
                    out.part(name, part)
                }
            };
        }
        Ok(out)
    }

    async fn read_response(url: &str, response: Response) -> Result<HttpResponse, DomainError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::Network(e.to_string()))?
            .to_vec();

        if status.is_success() {
            debug!(url = url, status = status.as_u16(), bytes = body.len(), "HTTP response");
        } else {
            warn!(url = url, status = status.as_u16(), "HTTP request returned an error status");
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, DomainError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DomainError::Network(e.to_string()))?;

        Self::read_response(url, response).await
    }

    async fn post_multipart(
        &self,
        url: &str,
        form: MultipartForm,
    ) -> Result<HttpResponse, DomainError> {
        let parts = form.parts().len();
        let form = Self::build_form(form)?;

        info!(url = url, parts, "Submitting multipart request");
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Network(e.to_string()))?;

        Self::read_response(url, response).await
    }
}
