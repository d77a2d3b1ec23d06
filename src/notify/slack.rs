use serde::Serialize;
use url::Url;

use super::{Note, Notifier, NotifyError};

#[derive(Serialize)]
struct WebhookPost<'a> {
    text: &'a str,
    username: &'a str,
}

/// Posts notes to a Slack incoming webhook.
pub struct SlackWebhook {
    client: reqwest::Client,
    url: Url,
    username: String,
}

impl SlackWebhook {
    pub fn new(client: reqwest::Client, url: Url, username: Option<String>) -> Self {
        Self {
            client,
            url,
            username: username.unwrap_or_else(|| "toi-review-watcher".to_owned()),
        }
    }
}

fn message(note: &Note) -> String {
    format!("*{}*\n{}", note.title, note.body)
}

impl Notifier for SlackWebhook {
    /// The webhook URL is the credential and can only be checked by posting.
    async fn verify(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send(&self, note: &Note) -> Result<(), NotifyError> {
        let text = message(note);
        let response = self
            .client
            .post(self.url.clone())
            .json(&WebhookPost {
                text: &text,
                username: &self.username,
            })
            .send()
            .await?;
        NotifyError::check_response(response).await?;
        Ok(())
    }
}
