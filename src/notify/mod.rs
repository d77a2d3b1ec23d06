use std::time::Duration;

use log::warn;
use tokio::time::sleep;

use crate::record::Record;

pub mod pushbullet;
pub mod slack;

pub use pushbullet::Pushbullet;
pub use slack::SlackWebhook;

/// A push message: a short title line and a longer body.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Note {
    pub title: String,
    pub body: String,
}

impl Note {
    pub fn for_record(record: &Record) -> Self {
        Self {
            title: format!("This movie got a good rating on TOI: {}", record.title()),
            body: format!(
                "Check out this movie: {} that got a rating of {}\nLink: {}",
                record.title(),
                record.display_rating(),
                record.link()
            ),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Notifier {
    /// Checks the credentials before any real work is done.
    async fn verify(&self) -> Result<(), NotifyError>;

    async fn send(&self, note: &Note) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("The notification service rejected the API key")]
    InvalidKey,
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Notification service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl NotifyError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidKey)
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, Self> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Self::InvalidKey);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::Status { status, body });
        }
        Ok(response)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

/// Sends `note`, retrying with exponential backoff.
/// A rejected API key is returned immediately.
pub async fn send_with_retry<N: Notifier>(
    notifier: &N,
    note: &Note,
    policy: RetryPolicy,
) -> Result<(), NotifyError> {
    let mut backoff = Duration::from_millis(policy.initial_backoff_ms);
    let mut attempt = 1;
    loop {
        match notifier.send(note).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    "Attempt {attempt}/{} to send {:?} failed: {e}.  Retrying in {backoff:?}.",
                    policy.max_attempts, note.title
                );
                sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// The notifier chosen in the configuration.
pub enum AnyNotifier {
    Pushbullet(Pushbullet),
    Slack(SlackWebhook),
}

impl Notifier for AnyNotifier {
    async fn verify(&self) -> Result<(), NotifyError> {
        match self {
            Self::Pushbullet(n) => n.verify().await,
            Self::Slack(n) => n.verify().await,
        }
    }

    async fn send(&self, note: &Note) -> Result<(), NotifyError> {
        match self {
            Self::Pushbullet(n) => n.send(note).await,
            Self::Slack(n) => n.send(note).await,
        }
    }
}
