//! Remote text-generation client
//!
//! One operation over a fixed HTTP endpoint: POST `{"message": "<text>"}`,
//! expect `{"answer": "<text>"}`. Any non-2xx status or malformed body is a
//! hard failure with no retry or fallback. Certificate validation is
//! standard reqwest behavior; there is deliberately no knob to disable it.

use async_trait::async_trait;

use crate::providers::ReplyGenerator;
use crate::{Error, Result};

/// Request body for the generate endpoint
#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    message: &'a str,
}

/// Response body from the generate endpoint
#[derive(serde::Deserialize)]
struct GenerateResponse {
    answer: String,
}

/// Client for the remote text-generation endpoint
#[derive(Clone)]
pub struct GenerateClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GenerateClient {
    /// Create a new client for the given endpoint URL
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| Error::Generate(format!("invalid endpoint {endpoint}: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl ReplyGenerator for GenerateClient {
    async fn generate(&self, message: &str) -> Result<String> {
        tracing::debug!(chars = message.len(), "dispatching generate request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { message })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "generate request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "generate endpoint error");
            return Err(Error::Generate(format!(
                "generate endpoint returned {status}"
            )));
        }

        let decoded: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse generate response");
            Error::Generate(format!("malformed generate response: {e}"))
        })?;

        tracing::info!(chars = decoded.answer.len(), "reply received");
        Ok(decoded.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let body = serde_json::to_value(GenerateRequest {
            message: "hello world",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"message": "hello world"}));
    }

    #[test]
    fn response_wire_shape() {
        let decoded: GenerateResponse =
            serde_json::from_str(r#"{"answer": "hi there"}"#).unwrap();
        assert_eq!(decoded.answer, "hi there");
    }

    #[test]
    fn response_missing_answer_is_error() {
        let decoded = serde_json::from_str::<GenerateResponse>(r#"{"reply": "hi"}"#);
        assert!(decoded.is_err());
    }

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(GenerateClient::new("not a url").is_err());
    }
}
