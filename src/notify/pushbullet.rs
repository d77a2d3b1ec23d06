use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use url::Url;

use super::{Note, Notifier, NotifyError};

pub const API_BASE: &str = "https://api.pushbullet.com/v2/";

/// Pushbullet access token.  Never printed.
#[derive(Clone, derive_more::From, Deserialize)]
pub struct ApiKey(String);

impl Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

impl ApiKey {
    fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Serialize)]
struct PushNote<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'a str,
    body: &'a str,
}

impl<'a> From<&'a Note> for PushNote<'a> {
    fn from(note: &'a Note) -> Self {
        Self {
            kind: "note",
            title: &note.title,
            body: &note.body,
        }
    }
}

pub struct Pushbullet {
    client: reqwest::Client,
    api_key: ApiKey,
    users_me: Url,
    pushes: Url,
}

impl Pushbullet {
    pub fn new(client: reqwest::Client, api_key: ApiKey) -> Result<Self, url::ParseError> {
        let api_base = Url::parse(API_BASE)?;
        Ok(Self {
            client,
            api_key,
            users_me: api_base.join("users/me")?,
            pushes: api_base.join("pushes")?,
        })
    }
}

impl Notifier for Pushbullet {
    async fn verify(&self) -> Result<(), NotifyError> {
        let response = self
            .client
            .get(self.users_me.clone())
            .header("Access-Token", self.api_key.as_str())
            .send()
            .await?;
        NotifyError::check_response(response).await?;
        Ok(())
    }

    async fn send(&self, note: &Note) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.pushes.clone())
            .header("Access-Token", self.api_key.as_str())
            .json(&PushNote::from(note))
            .send()
            .await?;
        NotifyError::check_response(response).await?;
        Ok(())
    }
}
