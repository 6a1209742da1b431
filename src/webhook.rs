use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::Serialize;
use url::Url;

use crate::detect::UpdateRecord;
use crate::error::{Error, Result};

pub const WEBHOOK_USERNAME: &str = "Mangadex";
pub const WEBHOOK_USER_AGENT: &str = "Mangadex-Discord-Notification/1.0";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, update: &UpdateRecord) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookMessage {
    pub username: String,
    pub avatar_url: String,
    pub content: String,
}

/// `**<title> | Ch. <chapter>**` followed by the chapter link.
pub fn render_content(update: &UpdateRecord) -> String {
    format!("**{} | Ch. {}**\n{}", update.title, update.chapter, update.url)
}

#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    http: reqwest::Client,
    endpoint: Url,
    avatar_url: String,
}

impl DiscordWebhook {
    pub fn new(http: reqwest::Client, endpoint: Url, avatar_url: impl Into<String>) -> Self {
        Self {
            http,
            endpoint,
            avatar_url: avatar_url.into(),
        }
    }

    pub fn message(&self, update: &UpdateRecord) -> WebhookMessage {
        WebhookMessage {
            username: WEBHOOK_USERNAME.to_owned(),
            avatar_url: self.avatar_url.clone(),
            content: render_content(update),
        }
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn deliver(&self, update: &UpdateRecord) -> Result<()> {
        let message = self.message(update);

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(USER_AGENT, WEBHOOK_USER_AGENT)
            .json(&message)
            .send()
            .await
            .map_err(|err| Error::transport("send discord webhook", err))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Delivery { status, body });
        }

        tracing::debug!(manga_id = %update.manga_id, %status, "webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> UpdateRecord {
        UpdateRecord {
            manga_id: "m-1".to_owned(),
            title: "Foo - Ch1 Special".to_owned(),
            chapter: "1".to_owned(),
            url: "https://mangadex.org/chapter/c-1".to_owned(),
        }
    }

    #[test]
    fn content_layout() {
        assert_eq!(
            render_content(&update()),
            "**Foo - Ch1 Special | Ch. 1**\nhttps://mangadex.org/chapter/c-1"
        );
    }

    #[test]
    fn message_json_shape() {
        let webhook = DiscordWebhook::new(
            reqwest::Client::new(),
            Url::parse("https://discord.example/api/webhooks/1/token").unwrap(),
            "https://img.example/cat.jpg",
        );
        let value = serde_json::to_value(webhook.message(&update())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "username": "Mangadex",
                "avatar_url": "https://img.example/cat.jpg",
                "content": "**Foo - Ch1 Special | Ch. 1**\nhttps://mangadex.org/chapter/c-1",
            })
        );
    }
}
