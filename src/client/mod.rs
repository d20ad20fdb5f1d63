pub mod sequence;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::render::payload::{self, PayloadError, SubmissionResult};
use crate::render::{INVALID_RESPONSE, UNKNOWN_ERROR};

pub use sequence::{RequestSequencer, RequestToken};

/// Path of the stock data endpoint, relative to the configured base URL
pub const STOCK_DATA_PATH: &str = "/get-stock-data";

/// Form submitted to the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockForm {
    pub symbol: String,
}

impl StockForm {
    /// Build a form from user input, normalizing the symbol
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no ticker symbol given")]
    EmptySymbol,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {0}")]
    HttpStatus(StatusCode),
    #[error("server error: {0}")]
    Server(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<PayloadError> for ClientError {
    fn from(e: PayloadError) -> Self {
        ClientError::InvalidResponse(e.to_string())
    }
}

impl ClientError {
    /// Text shown in the display region for this error
    pub fn user_message(&self) -> String {
        match self {
            ClientError::EmptySymbol => "Enter a ticker symbol".to_string(),
            ClientError::Transport(e) => {
                let reason = if e.is_timeout() {
                    "timed out"
                } else if e.is_connect() {
                    "could not connect to server"
                } else {
                    "network error"
                };
                format!("Request failed: {}", reason)
            }
            ClientError::HttpStatus(status) => format!("Request failed: HTTP {}", status.as_u16()),
            ClientError::Server(msg) if msg.is_empty() => UNKNOWN_ERROR.to_string(),
            ClientError::Server(msg) => msg.clone(),
            ClientError::InvalidResponse(_) => INVALID_RESPONSE.to_string(),
        }
    }
}

/// HTTP transport for form submissions
#[derive(Debug, Clone)]
pub struct StockClient {
    http: reqwest::Client,
    url: String,
}

impl StockClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::ClientBuilder::new()
            .user_agent(concat!("tickerpane/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            url: format!("{}{}", endpoint.trim_end_matches('/'), STOCK_DATA_PATH),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submit the form and classify the response. Exactly one request is
    /// made; nothing is retried.
    pub async fn submit(&self, form: &StockForm) -> Result<SubmissionResult, ClientError> {
        if form.symbol.is_empty() {
            return Err(ClientError::EmptySymbol);
        }

        tracing::info!("Submitting {} to {}", form.symbol, self.url);
        let response = self.http.post(&self.url).form(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        tracing::debug!("Received HTTP {} ({} bytes)", status.as_u16(), body.len());

        classify(status, &body)
    }
}

/// Map a status and body onto the submission outcome
fn classify(status: StatusCode, body: &[u8]) -> Result<SubmissionResult, ClientError> {
    let json = serde_json::from_slice::<Value>(body);

    if !status.is_success() {
        // Structured error bodies on error statuses are still shown verbatim
        if let Ok(Value::Object(obj)) = &json {
            if let Some(Value::String(msg)) = obj.get("error") {
                return Err(ClientError::Server(msg.clone()));
            }
        }
        return Err(ClientError::HttpStatus(status));
    }

    let json = json.map_err(|e| ClientError::InvalidResponse(format!("body is not JSON: {}", e)))?;
    Ok(payload::decode(&json)?)
}
