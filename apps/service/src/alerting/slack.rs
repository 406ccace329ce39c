//! Slack incoming-webhook notifier.

use serde::Serialize;
use std::time::Duration;

use super::{DeliveryError, Notifier};
use crate::monitoring::transport::USER_AGENT;

pub const DEFAULT_USERNAME: &str = "Pill Pusher";
pub const DEFAULT_ICON: &str = ":pill:";

#[derive(Debug, Serialize)]
struct Payload<'a> {
    channel: &'a str,
    username: &'a str,
    text: &'a str,
    icon_emoji: &'a str,
}

pub struct SlackNotifier {
    client: reqwest::Client,
    webhook: String,
    username: String,
    icon_emoji: String,
}

impl SlackNotifier {
    pub fn new(
        webhook: impl Into<String>,
        username: impl Into<String>,
        icon_emoji: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            webhook: webhook.into(),
            username: username.into(),
            icon_emoji: icon_emoji.into(),
        })
    }

    fn payload<'a>(&'a self, channel: &'a str, message: &'a str) -> Payload<'a> {
        Payload { channel, username: &self.username, text: message, icon_emoji: &self.icon_emoji }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn deliver(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(&self.payload(channel, message))?;

        let response = self
            .client
            .post(&self.webhook)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}
