//! HTTP transport for the remote command boundary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::InvokeRequest,
};
use thiserror::Error;
use url::Url;

use crate::remote::RemoteCommands;

const INVOKE_PATH: &str = "invoke";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Sends each command as `POST {backend}/invoke` with a JSON envelope.
pub struct HttpCommandTransport {
    http: Client,
    endpoint: Url,
}

impl HttpCommandTransport {
    pub fn new(backend_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: invoke_endpoint(backend_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteCommands for HttpCommandTransport {
    async fn invoke(&self, command: &str, args: Map<String, Value>) -> Result<Value, ApiError> {
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(&InvokeRequest::new(command, args))
            .send()
            .await
            .map_err(|err| ApiError::transport(format!("failed to reach backend: {err}")))?;

        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|err| ApiError::transport(format!("failed to read backend reply: {err}")))?;

        if status.is_success() {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&body).map_err(|err| {
                ApiError::malformed_response(format!("backend reply is not valid json: {err}"))
            });
        }

        Err(serde_json::from_slice::<ApiError>(&body)
            .unwrap_or_else(|_| error_from_status(status, &body)))
    }
}

fn invoke_endpoint(backend_url: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(backend_url.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(INVOKE_PATH)
}

fn error_from_status(status: StatusCode, body: &[u8]) -> ApiError {
    let code = match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorCode::Unauthorized,
        _ => ErrorCode::Internal,
    };
    let text = String::from_utf8_lossy(body);
    let message = if text.trim().is_empty() {
        format!("backend answered with status {status}")
    } else {
        format!("backend answered with status {status}: {}", text.trim())
    };
    ApiError::new(code, message)
}
