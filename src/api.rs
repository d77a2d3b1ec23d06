use std::time::Duration;

use anyhow::bail;
use log::debug;
use reqwest::redirect;
use url::Url;

/// Something that can download a listing page.
#[allow(async_fn_in_trait)]
pub trait ListingFetcher {
    async fn fetch(&self, url: &Url) -> anyhow::Result<String>;
}

pub fn reqwest_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(redirect::Policy::limited(5))
        .build()
}

pub struct ReviewClient {
    client: reqwest::Client,
}

impl ReviewClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ListingFetcher for ReviewClient {
    async fn fetch(&self, url: &Url) -> anyhow::Result<String> {
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            bail!(
                "Unexpected error code: server returned {:?} for {url}",
                response.status()
            );
        }
        Ok(response.text().await?)
    }
}
