//! Generic webhook notifier plus thin scheme-specific adapters standing in
//! for the out-of-core message-service URL library. Each adapter turns a
//! switch's `scheme://...` notifier URL into a concrete HTTP endpoint and
//! posts a JSON payload.

use async_trait::async_trait;
use serde_json::json;

use super::Notifier;
use crate::error::{Error, Result};

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

async fn post_json(client: &reqwest::Client, target: &str, body: serde_json::Value) -> Result<()> {
    let response = client
        .post(target)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::notify(format!("request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(Error::notify(format!("webhook returned {status}")));
    }
    Ok(())
}

/// `webhook://host/path` and `webhooks://host/path` — stripped of the
/// scheme and posted to as plain `http`/`https`.
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self { client: client() }
    }

    fn to_http_url(url: &str) -> Result<String> {
        if let Some(rest) = url.strip_prefix("webhooks://") {
            Ok(format!("https://{rest}"))
        } else if let Some(rest) = url.strip_prefix("webhook://") {
            Ok(format!("http://{rest}"))
        } else {
            Err(Error::validation(format!("not a webhook URL: {url}")))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, url: &str, body: &str) -> Result<()> {
        let target = Self::to_http_url(url)?;
        post_json(&self.client, &target, json!({ "message": body })).await
    }
}

/// `discord://token@webhook_id` — reconstructs a Discord incoming-webhook
/// URL and posts `{content: body}`.
pub struct DiscordNotifier {
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new() -> Self {
        Self { client: client() }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, url: &str, body: &str) -> Result<()> {
        let parsed = url::Url::parse(url).map_err(|e| Error::validation(format!("bad discord URL: {e}")))?;
        let token = parsed.username();
        let webhook_id = parsed.host_str().unwrap_or_default();
        if token.is_empty() || webhook_id.is_empty() {
            return Err(Error::validation("discord URL must be discord://token@webhook_id"));
        }
        let target = format!("https://discord.com/api/webhooks/{webhook_id}/{token}");
        post_json(&self.client, &target, json!({ "content": body })).await
    }
}

/// `slack://token@channel` — reconstructs an Incoming Webhooks URL
/// (`channel` carries the `T.../B.../token` triple joined by `/`).
pub struct SlackNotifier {
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new() -> Self {
        Self { client: client() }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, url: &str, body: &str) -> Result<()> {
        let parsed = url::Url::parse(url).map_err(|e| Error::validation(format!("bad slack URL: {e}")))?;
        let token = parsed.username();
        let path = parsed.host_str().unwrap_or_default();
        if token.is_empty() || path.is_empty() {
            return Err(Error::validation("slack URL must be slack://token@path"));
        }
        let target = format!("https://hooks.slack.com/services/{path}/{token}");
        post_json(&self.client, &target, json!({ "text": body })).await
    }
}

/// `telegram://bot_token@chat_id` — posts through the Bot API's
/// `sendMessage` method.
pub struct TelegramNotifier {
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new() -> Self {
        Self { client: client() }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, url: &str, body: &str) -> Result<()> {
        let parsed = url::Url::parse(url).map_err(|e| Error::validation(format!("bad telegram URL: {e}")))?;
        let bot_token = parsed.username();
        let chat_id = parsed.host_str().unwrap_or_default();
        if bot_token.is_empty() || chat_id.is_empty() {
            return Err(Error::validation("telegram URL must be telegram://bot_token@chat_id"));
        }
        let target = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
        post_json(
            &self.client,
            &target,
            json!({ "chat_id": chat_id, "text": body }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_url_translates_scheme_to_transport() {
        assert_eq!(
            WebhookNotifier::to_http_url("webhook://example.com/hook").unwrap(),
            "http://example.com/hook"
        );
        assert_eq!(
            WebhookNotifier::to_http_url("webhooks://example.com/hook").unwrap(),
            "https://example.com/hook"
        );
        assert!(WebhookNotifier::to_http_url("logger://").is_err());
    }
}
