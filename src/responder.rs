//! Remote responder client
//!
//! Forwards text the interpreter could not answer locally to the configured
//! chat endpoint. Every failure is absorbed into a fixed spoken sentence;
//! `ask` never propagates an error to the interaction loop.

use std::time::Duration;

use url::Url;

use crate::interaction::{Utterance, UtteranceSource};

/// Spoken when the responder answered but not with a usable reply
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't understand that.";

/// Spoken when the responder could not be reached at all
pub const ERROR_REPLY: &str = "There was an error reaching my brain server.";

/// Request timeout for a single chat call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    success: bool,
    response: Option<String>,
}

/// Client for the remote chat endpoint
#[derive(Debug, Clone)]
pub struct ResponderClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl ResponderClient {
    /// Create a client for the given chat endpoint
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self { client, endpoint }
    }

    /// Send recognized text and return the utterance to speak.
    ///
    /// Success maps to a `RemoteReply`; a non-success or malformed body maps
    /// to the fixed fallback sentence; transport failure maps to the fixed
    /// error sentence. Infallible by design.
    pub async fn ask(&self, text: &str) -> Utterance {
        tracing::debug!(endpoint = %self.endpoint, query = %text, "dispatching to responder");

        let response = match self
            .client
            .post(self.endpoint.clone())
            .json(&ChatRequest { message: text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "responder request failed");
                return Utterance::new(ERROR_REPLY, UtteranceSource::ErrorReply);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "responder returned error status");
            return Utterance::new(ERROR_REPLY, UtteranceSource::ErrorReply);
        }

        match response.json::<ChatResponse>().await {
            Ok(body) => reply_from_body(&body),
            Err(e) => {
                tracing::error!(error = %e, "responder body was not valid JSON");
                Utterance::new(ERROR_REPLY, UtteranceSource::ErrorReply)
            }
        }
    }
}

/// Map a parsed responder body to the utterance to speak
fn reply_from_body(body: &ChatResponse) -> Utterance {
    if body.success {
        if let Some(reply) = &body.response {
            tracing::info!(reply = %reply, "responder reply received");
            return Utterance::new(reply.clone(), UtteranceSource::RemoteReply);
        }
    }

    tracing::warn!("responder reported no usable reply");
    Utterance::new(FALLBACK_REPLY, UtteranceSource::ErrorReply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_body_becomes_remote_reply() {
        let body = ChatResponse {
            success: true,
            response: Some("Hello there".to_string()),
        };
        let utterance = reply_from_body(&body);
        assert_eq!(utterance.text, "Hello there");
        assert_eq!(utterance.source, UtteranceSource::RemoteReply);
    }

    #[test]
    fn test_unsuccessful_body_becomes_fallback() {
        let body = ChatResponse {
            success: false,
            response: None,
        };
        let utterance = reply_from_body(&body);
        assert_eq!(utterance.text, FALLBACK_REPLY);
        assert_eq!(utterance.source, UtteranceSource::ErrorReply);
    }

    #[test]
    fn test_success_without_response_field_becomes_fallback() {
        let body = ChatResponse {
            success: true,
            response: None,
        };
        assert_eq!(reply_from_body(&body).text, FALLBACK_REPLY);
    }
}
