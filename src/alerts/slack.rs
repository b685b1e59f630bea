use crate::alerts::notifier::{Notifier, NotifyFuture};
use crate::error::AlertError;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://slack.com/api/chat.postMessage";

/// Slack's recommended upper bound for message text
const MAX_MESSAGE_LENGTH: usize = 4000;

/// Slack Web API client posting plain-text messages
pub struct SlackNotifier {
    client: Client,
    token: String,
    endpoint: String,
}

/// Request body for `chat.postMessage`
#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: String,
}

/// Response body from `chat.postMessage`
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    /// Create a notifier authenticated with a bot token
    pub fn new(token: String) -> Result<Self, AlertError> {
        Self::with_endpoint(token, DEFAULT_ENDPOINT.to_string())
    }

    /// Create a notifier posting to a custom endpoint
    pub fn with_endpoint(token: String, endpoint: String) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            token,
            endpoint,
        })
    }

    /// Truncate text to a maximum length without splitting a UTF-8 character
    fn truncate_text(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            return text.to_string();
        }

        let mut truncate_at = max_length.saturating_sub(3);
        while truncate_at > 0 && !text.is_char_boundary(truncate_at) {
            truncate_at -= 1;
        }
        format!("{}...", &text[..truncate_at])
    }

    fn check_response(response: PostMessageResponse) -> Result<(), AlertError> {
        if response.ok {
            Ok(())
        } else {
            Err(AlertError::NotificationFailed(format!(
                "Slack rejected message: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }
}

impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    fn notify<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            let request = PostMessageRequest {
                channel,
                text: Self::truncate_text(message, MAX_MESSAGE_LENGTH),
            };

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.token)
                .json(&request)
                .send()
                .await?
                .error_for_status()?;

            let body: PostMessageResponse = response.json().await?;
            match Self::check_response(body) {
                Ok(()) => {
                    debug!("Posted message to Slack channel {}", channel);
                    Ok(())
                }
                Err(e) => {
                    error!("Slack delivery to {} failed: {}", channel, e);
                    Err(e)
                }
            }
        })
    }
}
