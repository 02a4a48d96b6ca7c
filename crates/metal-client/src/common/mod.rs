//! Common utilities for the metal-api client
//!
//! Provides the authenticated request helpers shared by all endpoints.

use crate::error::MetalError;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTTP client wrapper with bearer authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Map a non-success response onto the error taxonomy
    async fn check(method: &str, path: &str, response: Response) -> Result<Response, MetalError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                MetalError::Authentication(format!("{} {}: {} - {}", method, path, status, body))
            }
            StatusCode::NOT_FOUND => {
                MetalError::NotFound(format!("Resource not found: {} - {}", path, body))
            }
            _ => MetalError::Api(format!("{} {} failed: {} - {}", method, path, status, body)),
        })
    }

    /// Decode a JSON body, keeping a prefix of the raw text for diagnostics
    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, MetalError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            MetalError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, MetalError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::decode(Self::check("GET", path, response).await?).await
    }

    /// Make a POST request
    pub async fn post<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, MetalError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        Self::decode(Self::check("POST", path, response).await?).await
    }

    /// Make a DELETE request, discarding the response body
    pub async fn delete(&self, path: &str) -> Result<(), MetalError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::check("DELETE", path, response).await?;
        Ok(())
    }
}

/// Encode a single path segment (machine IDs, network IDs, IP addresses)
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
