//! HTTP transport to the queue engine.
//!
//! Every response carries a correlation id and a protocol version header.
//! Both are surfaced to the caller for operator-facing traceability and
//! default to [`UNKNOWN_META`] when the server leaves them out.

use std::time::Duration;

use reqwest::{header::HeaderMap, Client, Method, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::error::ApiErrorBody;
use tracing::debug;

use crate::error::RequestError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_VERSION_HEADER: &str = "x-api-version";
pub const UNKNOWN_META: &str = "unknown";

/// Placeholder body for requests that send none.
pub const NO_BODY: Option<&()> = None;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub api_version: String,
}

impl ResponseMeta {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: header_text(headers, REQUEST_ID_HEADER)
                .unwrap_or_else(|| UNKNOWN_META.to_string()),
            api_version: header_text(headers, API_VERSION_HEADER)
                .unwrap_or_else(|| UNKNOWN_META.to_string()),
        }
    }
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            request_id: UNKNOWN_META.to_string(),
            api_version: UNKNOWN_META.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T> ApiResponse<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: f(self.data),
            meta: self.meta,
        }
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    server_url: String,
}

impl HttpTransport {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: normalize_server_url(server_url.into()),
        }
    }

    pub fn with_timeout(
        server_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RequestError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            server_url: normalize_server_url(server_url.into()),
        })
    }

    /// Issues one round trip and decodes a 2xx body into `T`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, path, body, query).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        decode_success(response).await
    }

    /// Like [`HttpTransport::request`] but any non-success status is `None`.
    /// Network failures still surface as errors.
    pub async fn request_optional<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<ApiResponse<T>>, RequestError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, NO_BODY, query).await?;
        if !response.status().is_success() {
            debug!(path, status = response.status().as_u16(), "optional read returned no data");
            return Ok(None);
        }
        decode_success(response).await.map(Some)
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<Response, RequestError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.server_url);
        let mut builder = self.http.request(method.clone(), url.as_str());
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;
        debug!(
            method = %method,
            path,
            status = response.status().as_u16(),
            request_id = header_text(response.headers(), REQUEST_ID_HEADER)
                .as_deref()
                .unwrap_or(UNKNOWN_META),
            "queue engine responded"
        );
        Ok(response)
    }
}

fn normalize_server_url(raw: String) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

async fn decode_success<T: DeserializeOwned>(
    response: Response,
) -> Result<ApiResponse<T>, RequestError> {
    let meta = ResponseMeta::from_headers(response.headers());
    let bytes = response.bytes().await?;
    let data = serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode(e.to_string()))?;
    Ok(ApiResponse { data, meta })
}

async fn status_error(response: Response) -> RequestError {
    let status = response.status().as_u16();
    let request_id = header_text(response.headers(), REQUEST_ID_HEADER);
    let body = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ApiErrorBody>(&bytes).unwrap_or_default(),
        Err(_) => ApiErrorBody::default(),
    };

    RequestError::Status {
        status,
        message: body.display_message(),
        validation: body.has_validation_errors(),
        rule_code: body.rule_code,
        request_id,
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
