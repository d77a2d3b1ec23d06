use std::{fmt::Debug, path::PathBuf, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use url::Url;

use crate::{
    notify::{pushbullet::ApiKey, AnyNotifier, Pushbullet, RetryPolicy, SlackWebhook},
    record::Rating,
    seen_store::{CorruptPolicy, SeenStore},
};

pub const DEFAULT_BASE_URL: &str = "https://timesofindia.indiatimes.com/entertainment/";

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Language slugs, each selecting one review listing.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_threshold")]
    pub threshold: Rating,
    #[serde(default = "default_seen_store_path")]
    pub seen_store_path: PathBuf,
    #[serde(default)]
    pub on_corrupt: CorruptPolicy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("the default base URL is valid")
}

fn default_sources() -> Vec<String> {
    ["tamil", "telugu", "malayalam", "hindi"]
        .map(str::to_owned)
        .into()
}

fn default_threshold() -> Rating {
    Rating::from_tenths(35)
}

fn default_seen_store_path() -> PathBuf {
    "seen-reviews.jsonl".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    pub pushbullet: Option<PushbulletConfig>,
    pub slack: Option<SlackConfig>,
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_initial_backoff_ms() -> u64 {
    RetryPolicy::default().initial_backoff_ms
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            pushbullet: None,
            slack: None,
        }
    }
}

impl NotifyConfig {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff_ms: self.initial_backoff_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PushbulletConfig {
    pub api_key: ApiKey,
}

#[derive(Debug, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: Url,
    pub username: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No notifier is configured; add a [notify.pushbullet] or [notify.slack] table")]
    NoNotifier,
    #[error("Both [notify.pushbullet] and [notify.slack] are configured; keep only one")]
    TwoNotifiers,
    #[error("The Pushbullet API key is empty")]
    BlankApiKey,
    #[error("No sources are configured")]
    NoSources,
    #[error("The base URL must end with '/': {0}")]
    BaseUrlWithoutSlash(Url),
    #[error("max_attempts must be at least 1")]
    NoAttempts,
}

impl Config {
    pub fn load<P: Into<PathBuf> + Debug>(path: P) -> anyhow::Result<Self> {
        let path = path.into();
        (|| toml::from_str(&fs_err::read_to_string(&path)?).map_err(anyhow::Error::new))()
            .with_context(|| format!("While trying to load the configuration from {path:?}"))
    }

    /// Checks everything that can be checked without the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if !self.base_url.path().ends_with('/') {
            return Err(ConfigError::BaseUrlWithoutSlash(self.base_url.clone()));
        }
        if self.notify.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        match (&self.notify.pushbullet, &self.notify.slack) {
            (None, None) => Err(ConfigError::NoNotifier),
            (Some(_), Some(_)) => Err(ConfigError::TwoNotifiers),
            (Some(pushbullet), None) if pushbullet.api_key.is_blank() => {
                Err(ConfigError::BlankApiKey)
            }
            _ => Ok(()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn seen_store(&self) -> SeenStore {
        SeenStore::open(&self.seen_store_path, self.on_corrupt)
    }

    pub fn notifier(&self, client: reqwest::Client) -> anyhow::Result<AnyNotifier> {
        self.validate()?;
        Ok(match (&self.notify.pushbullet, &self.notify.slack) {
            (Some(pushbullet), _) => {
                AnyNotifier::Pushbullet(Pushbullet::new(client, pushbullet.api_key.clone())?)
            }
            (None, Some(slack)) => AnyNotifier::Slack(SlackWebhook::new(
                client,
                slack.webhook_url.clone(),
                slack.username.clone(),
            )),
            (None, None) => return Err(ConfigError::NoNotifier.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;

    use super::{Config, ConfigError, DEFAULT_BASE_URL};
    use crate::{record::Rating, seen_store::CorruptPolicy};

    fn parse(s: &str) -> Config {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(
            r#"
[notify.pushbullet]
api_key = "o.abc"
"#,
        );
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.sources, ["tamil", "telugu", "malayalam", "hindi"]);
        assert_eq!(config.threshold, Rating::from_tenths(35));
        assert_eq!(config.seen_store_path, Path::new("seen-reviews.jsonl"));
        assert_eq!(config.on_corrupt, CorruptPolicy::Truncate);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.notify.max_attempts, 3);
        assert_eq!(config.notify.initial_backoff_ms, 500);
        config.validate().unwrap();
    }

    #[test]
    fn everything_set() {
        let config = parse(
            r#"
base_url = "https://example.com/reviews/"
sources = ["tamil"]
threshold = "4"
seen_store_path = "state/seen.jsonl"
on_corrupt = "fail"
request_timeout_secs = 5

[notify]
max_attempts = 5
initial_backoff_ms = 10

[notify.slack]
webhook_url = "https://hooks.slack.com/services/x"
"#,
        );
        assert_eq!(config.threshold, Rating::from_tenths(40));
        assert_eq!(config.on_corrupt, CorruptPolicy::Fail);
        assert_eq!(config.notify.max_attempts, 5);
        assert!(config.notify.slack.is_some());
        config.validate().unwrap();
    }

    #[test]
    fn invalid_configurations() {
        assert!(matches!(
            parse("").validate(),
            Err(ConfigError::NoNotifier)
        ));
        assert!(matches!(
            parse("[notify.pushbullet]\napi_key = \"  \"\n").validate(),
            Err(ConfigError::BlankApiKey)
        ));
        assert!(matches!(
            parse("sources = []\n[notify.pushbullet]\napi_key = \"k\"\n").validate(),
            Err(ConfigError::NoSources)
        ));
        assert!(matches!(
            parse(
                "base_url = \"https://example.com/x\"\n[notify.pushbullet]\napi_key = \"k\"\n"
            )
            .validate(),
            Err(ConfigError::BaseUrlWithoutSlash(_))
        ));
        assert!(matches!(
            parse(
                r#"
[notify.pushbullet]
api_key = "k"
[notify.slack]
webhook_url = "https://hooks.slack.com/services/x"
"#
            )
            .validate(),
            Err(ConfigError::TwoNotifiers)
        ));
        assert!(toml::from_str::<Config>("threshold = \"3.75\"").is_err());
        assert!(toml::from_str::<Config>("unknown_key = 1").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs_err::write(&path, "sources = [\"hindi\"]\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().sources, ["hindi"]);

        let error = Config::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(format!("{error:#}").contains("missing.toml"));
    }
}
