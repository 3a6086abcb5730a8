//! Twilio REST transport.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::chunker::chunk;
use super::{Message, MessageTransport};
use crate::config::TwilioConfig;
use crate::error::TransportError;

/// A US number: ten digits with an optional leading country code.
static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"1?[0-9]{10}").expect("valid phone regex"));

/// Error document Twilio returns alongside a 400.
#[derive(Debug, Deserialize)]
struct TwilioException {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    more_info: String,
}

/// Sends messages through the Twilio Messages API.
pub struct TwilioTransport {
    account_sid: String,
    auth_token: SecretString,
    messages_url: String,
    messaging_service_sid: Option<String>,
    segment_throttle: std::time::Duration,
    client: reqwest::Client,
}

impl TwilioTransport {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            account_sid: config.account_sid,
            auth_token: config.auth_token,
            messages_url: config.messages_url,
            messaging_service_sid: config.messaging_service_sid,
            segment_throttle: config.segment_throttle,
            client: reqwest::Client::new(),
        }
    }

    async fn send_segment(&self, message: &Message, body: &str) -> Result<u16, TransportError> {
        let mut form = vec![
            ("To", message.to.as_str()),
            ("From", message.from.as_str()),
            ("Body", body),
        ];
        if let Some(sid) = &self.messaging_service_sid {
            form.push(("MessagingServiceSid", sid.as_str()));
        }

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => map_response(status, &text),
            Err(e) => {
                warn!(status, error = %e, "Unable to read Twilio response body");
                unreadable_response(status, &e.to_string())
            }
        }
    }
}

/// Whether both ends of a message look like dialable US numbers.
pub fn valid_numbers(message: &Message) -> bool {
    PHONE_NUMBER.is_match(&message.to) && PHONE_NUMBER.is_match(&message.from)
}

/// Translate a Twilio HTTP response into a status or a typed error.
fn map_response(status: u16, body: &str) -> Result<u16, TransportError> {
    match status {
        200 | 201 => Ok(status),
        400 => {
            let exception: TwilioException =
                serde_json::from_str(body).unwrap_or(TwilioException {
                    status,
                    message: body.to_string(),
                    code: 0,
                    more_info: String::new(),
                });
            Err(TransportError::Rejected {
                status: if exception.status == 0 { status } else { exception.status },
                message: exception.message,
                code: exception.code,
                more_info: exception.more_info,
            })
        }
        401 => Err(TransportError::Unauthorized),
        404 => Err(TransportError::NotFound),
        405 => Err(TransportError::MethodNotAllowed),
        429 => Err(TransportError::RateLimited),
        other => Err(TransportError::UnexpectedResponse(other)),
    }
}

/// A response whose body could not be read. Success statuses still count
/// as sent; anything else carries the read failure.
fn unreadable_response(status: u16, reason: &str) -> Result<u16, TransportError> {
    match status {
        200 | 201 => Ok(status),
        _ => Err(TransportError::Http(format!(
            "status {status} with unreadable body: {reason}"
        ))),
    }
}

#[async_trait]
impl MessageTransport for TwilioTransport {
    async fn send(&self, message: &Message) -> Result<u16, TransportError> {
        if !valid_numbers(message) {
            return Err(TransportError::InvalidNumber {
                to: message.to.clone(),
                from: message.from.clone(),
            });
        }

        let segments = chunk(&message.body);
        let count = segments.len();
        let mut status = 0;

        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.segment_throttle).await;
            }
            status = self.send_segment(message, segment).await.inspect_err(|e| {
                warn!(to = %message.to, segment = i, status = e.status(), error = %e, "SMS segment failed");
            })?;
            debug!(to = %message.to, segment = i, of = count, status, "SMS segment sent");
        }

        info!(to = %message.to, segments = count, "SMS sent");
        Ok(status)
    }
}
