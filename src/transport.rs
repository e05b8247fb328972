//! Transport for XML-RPC calls.

use crate::error::ConnectionError;
use crate::protocol::{decode_response, encode_call};
use crate::types::Value;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Default timeout for one remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can carry one XML-RPC call to an endpoint and bring back
/// the decoded result. Every call is a single blocking round trip.
pub trait Transport {
    fn call(&mut self, url: &str, method: &str, params: Vec<Value>) -> Result<Value, ConnectionError>;
}

/// XML-RPC over HTTP(S).
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ConnectionError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("odootools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn call(&mut self, url: &str, method: &str, params: Vec<Value>) -> Result<Value, ConnectionError> {
        let body = encode_call(method, &params)?;
        log::debug!("POST {} {}", url, method);

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectionError::Transport(format!("{} returned HTTP {}", url, status)));
        }

        let text = response
            .text()
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        decode_response(&text)
    }
}
