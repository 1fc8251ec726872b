//! Shared HTTP transport for the rpc surfaces.
//!
//! Two clients share one connection pool: idempotent GETs go through the
//! retry middleware (transient network errors, 5xx, 429), while mutating
//! requests are sent exactly once — a middleware-retried POST could open or
//! commit a transaction twice. Structured remote errors are decoded from the
//! response body and surfaced unmodified; they are never retried.

use std::time::Instant;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    policies::ExponentialBackoff, RetryTransientMiddleware, Retryable, RetryableStrategy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result, RpcError};

pub(crate) struct Transport {
    /// Retrying client for idempotent requests.
    read: ClientWithMiddleware,
    /// Non-retrying client for mutating requests.
    write: reqwest::Client,
    config: ClientConfig,
}

enum Payload {
    Empty,
    Json(Vec<u8>),
    Octets(Bytes),
}

impl Transport {
    pub(crate) fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("atlas-catalog-client")),
        );
        if let Some(ref token) = config.token {
            let value = format!("Bearer {token}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value)
                    .map_err(|_| ClientError::Config("invalid token format".to_string()))?,
            );
        }

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(config.retry_initial_delay, config.retry_max_delay)
            .build_with_max_retries(config.max_retries);

        let read = ClientBuilder::new(inner.clone())
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                AtlasRetryStrategy,
            ))
            .build();

        Ok(Self {
            read,
            write: inner,
            config,
        })
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET returning deserialized JSON.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, Payload::Empty, true).await?;
        let response = Self::check(path, response).await?;
        Self::decode_json(response).await
    }

    /// GET where 204 (or a bare 404) means "no such value".
    pub(crate) async fn get_json_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.send(Method::GET, path, Payload::Empty, true).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::NOT_FOUND => match Self::fail_from(path, response).await {
                ClientError::NotFound(_) => Ok(None),
                structured => Err(structured),
            },
            _ => {
                let response = Self::check(path, response).await?;
                Ok(Some(Self::decode_json(response).await?))
            }
        }
    }

    /// GET returning the raw response body.
    pub(crate) async fn get_bytes(&self, path: &str) -> Result<Bytes> {
        let response = self.send(Method::GET, path, Payload::Empty, true).await?;
        let response = Self::check(path, response).await?;
        Ok(response.bytes().await?)
    }

    /// POST a JSON body, returning deserialized JSON.
    pub(crate) async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let payload = Payload::Json(serde_json::to_vec(body)?);
        let response = self.send(Method::POST, path, payload, false).await?;
        let response = Self::check(path, response).await?;
        Self::decode_json(response).await
    }

    /// POST a JSON body, discarding any response body.
    pub(crate) async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let payload = Payload::Json(serde_json::to_vec(body)?);
        let response = self.send(Method::POST, path, payload, false).await?;
        Self::check(path, response).await?;
        Ok(())
    }

    /// POST an opaque byte payload (file content).
    pub(crate) async fn post_bytes(&self, path: &str, body: Bytes) -> Result<()> {
        let response = self
            .send(Method::POST, path, Payload::Octets(body), false)
            .await?;
        Self::check(path, response).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        idempotent: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.base_url, path);
        let start = Instant::now();

        tracing::debug!(method = %method, path = %path, "sending request");

        let response = if idempotent {
            let mut request = self.read.request(method.clone(), &url);
            request = match payload {
                Payload::Empty => request,
                Payload::Json(body) => request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body),
                Payload::Octets(body) => request
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(body),
            };
            request.send().await?
        } else {
            let mut request = self.write.request(method.clone(), &url);
            request = match payload {
                Payload::Empty => request,
                Payload::Json(body) => request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body),
                Payload::Octets(body) => request
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(body),
            };
            request.send().await?
        };

        tracing::debug!(
            method = %method,
            path = %path,
            status = %response.status().as_u16(),
            duration_ms = %start.elapsed().as_millis(),
            "received response"
        );

        Ok(response)
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::fail_from(path, response).await)
        }
    }

    /// Convert a non-success response into an error, preferring the
    /// structured remote error body when one is present.
    async fn fail_from(path: &str, response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.bytes().await.ok();

        if let Some(ref bytes) = body {
            if let Ok(mut rpc) = serde_json::from_slice::<RpcError>(bytes) {
                rpc.status = status.as_u16();
                tracing::warn!(
                    path = %path,
                    status = %status.as_u16(),
                    error_name = %rpc.error_name,
                    error_instance_id = ?rpc.error_instance_id,
                    "request failed with remote error"
                );
                return ClientError::Rpc(rpc);
            }
        }

        let message = body
            .map(|b| String::from_utf8_lossy(&b).to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| status.to_string());

        tracing::warn!(
            path = %path,
            status = %status.as_u16(),
            error = %message,
            "request failed"
        );

        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            s => ClientError::ServerError {
                status: s.as_u16(),
                message,
            },
        }
    }

    async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            ClientError::InvalidResponse(format!(
                "failed to parse response: {} (body: {})",
                e,
                String::from_utf8_lossy(&body)
            ))
        })
    }
}

/// Retry strategy for idempotent requests.
///
/// Retries transient network errors, 5xx, and 429. Everything else —
/// including every 4xx carrying a structured remote error — is fatal.
struct AtlasRetryStrategy;

impl RetryableStrategy for AtlasRetryStrategy {
    fn handle(&self, res: &reqwest_middleware::Result<reqwest::Response>) -> Option<Retryable> {
        match res {
            Ok(response) => {
                let status = response.status();
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    Some(Retryable::Transient)
                } else if status.is_success() {
                    None
                } else {
                    Some(Retryable::Fatal)
                }
            }
            Err(error) => {
                if error.is_timeout() || error.is_connect() {
                    Some(Retryable::Transient)
                } else {
                    Some(Retryable::Fatal)
                }
            }
        }
    }
}
