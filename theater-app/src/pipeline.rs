use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use theater_common::credentials::load_cookie_store;
use theater_config::TheaterConfig;
use theater_drivers::theater_browser::driver::TheaterDriver;
use theater_engine::{HarvestReport, HarvestSession, Harvester};
use theater_http::HttpClient;
use tracing::warn;
use url::Url;

/// Runs one post end to end into a fresh session under `download_root`.
#[async_trait]
pub trait PostHarvester: Send + Sync {
    async fn harvest(&self, post_url: &str, download_root: &Path) -> Result<HarvestReport>;
}

/// Harvests through a dedicated WebDriver browser session per post.
pub struct BrowserHarvester {
    config: TheaterConfig,
}

impl BrowserHarvester {
    pub fn new(config: TheaterConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PostHarvester for BrowserHarvester {
    async fn harvest(&self, post_url: &str, download_root: &Path) -> Result<HarvestReport> {
        let target = Url::parse(post_url).with_context(|| format!("invalid post URL: {post_url}"))?;
        let cookies = match &self.config.session.cookie_file {
            Some(path) => load_cookie_store(path).await?,
            None => Vec::new(),
        };
        let harvester = Harvester::new(
            self.config.clone(),
            HttpClient::from_config(&self.config.download)?,
        )?;
        let session = HarvestSession::create(download_root).await?;

        let driver = TheaterDriver::connect(&self.config.browser).await?;
        if let Err(e) = driver.install_cookies(&target, &cookies).await {
            warn!(target: "app.pipeline", error = %format!("{e:#}"), "continuing without cookies");
        }
        let result = harvester.run(&driver.page(), post_url, session).await;

        if let Err(e) = driver.close().await {
            warn!(target: "app.pipeline", error = %e, "browser session did not close cleanly");
        }
        result
    }
}
