//! The HTTP client shared by every upstream call.

use std::time::Duration;

use serde_json::Value;

use crate::error::TransportError;
use crate::retry::{with_retry, RetryPolicy};
use crate::sse::SseStream;

/// A file part for a multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartFile {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// HTTP client with the shared retry policy.
///
/// No global timeout is set on the inner client; every call carries its own
/// per-operation timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(policy: RetryPolicy) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self { inner, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST a JSON body and decode a JSON response, with retries.
    pub async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &Value,
        timeout: Duration,
        operation: &str,
    ) -> Result<Value, TransportError> {
        with_retry(&self.policy, operation, || async move {
            let mut request = self.inner.post(url).timeout(timeout).json(body);
            if !api_key.is_empty() {
                request = request.bearer_auth(api_key);
            }
            let response = request.send().await.map_err(TransportError::from)?;
            let response = check_status(response).await?;
            response
                .json::<Value>()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()))
        })
        .await
    }

    /// POST a JSON body without retries, returning the raw status and body.
    ///
    /// Used by the validation preflight, which interprets statuses itself.
    pub async fn post_json_raw(
        &self,
        url: &str,
        api_key: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<(u16, String), TransportError> {
        let mut request = self.inner.post(url).timeout(timeout).json(body);
        if !api_key.is_empty() {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(TransportError::from)?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// Multipart POST (STT upload), with retries. The form is rebuilt from
    /// the owned parts on every attempt.
    pub async fn post_multipart(
        &self,
        url: &str,
        api_key: &str,
        fields: &[(String, String)],
        file: &MultipartFile,
        timeout: Duration,
        operation: &str,
    ) -> Result<Value, TransportError> {
        with_retry(&self.policy, operation, || async move {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime)
                .map_err(|e| TransportError::Decode(e.to_string()))?;
            let mut form = reqwest::multipart::Form::new().part(file.field.clone(), part);
            for (key, value) in fields {
                form = form.text(key.clone(), value.clone());
            }

            let mut request = self.inner.post(url).timeout(timeout).multipart(form);
            if !api_key.is_empty() {
                request = request.bearer_auth(api_key);
            }
            let response = request.send().await.map_err(TransportError::from)?;
            let response = check_status(response).await?;
            response
                .json::<Value>()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()))
        })
        .await
    }

    /// Multipart POST without retries, returning raw status and body
    /// (preflight probe).
    pub async fn post_multipart_raw(
        &self,
        url: &str,
        api_key: &str,
        fields: &[(String, String)],
        file: &MultipartFile,
        timeout: Duration,
    ) -> Result<(u16, String), TransportError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new().part(file.field.clone(), part);
        for (key, value) in fields {
            form = form.text(key.clone(), value.clone());
        }

        let mut request = self.inner.post(url).timeout(timeout).multipart(form);
        if !api_key.is_empty() {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(TransportError::from)?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// Open a streaming POST and hand back the SSE reader.
    ///
    /// The retry loop covers connection and status failures only; once the
    /// stream is open, mid-stream errors belong to the caller's task.
    pub async fn post_sse(
        &self,
        url: &str,
        api_key: &str,
        body: &Value,
        timeout: Duration,
        operation: &str,
    ) -> Result<SseStream, TransportError> {
        let response = with_retry(&self.policy, operation, || async move {
            let mut request = self
                .inner
                .post(url)
                .timeout(timeout)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .json(body);
            if !api_key.is_empty() {
                request = request.bearer_auth(api_key);
            }
            let response = request.send().await.map_err(TransportError::from)?;
            check_status(response).await
        })
        .await?;
        Ok(SseStream::new(response))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}
