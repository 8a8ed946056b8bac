use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use fantoccini::cookies::Cookie;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use theater_common::credentials::CookieRecord;
use theater_config::{BrowserConfig, BrowserKind};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use url::Url;
use webdriver::capabilities::Capabilities;

use crate::theater_browser::{
    fingerprint::{UserAgentManager, UserAgentProfile},
    page::TheaterPage,
    stealth::{
        build_chrome_arguments, build_firefox_arguments, build_firefox_preferences,
        StealthProfile,
    },
};

/// Thin wrapper around a `fantoccini` WebDriver client.
///
/// One driver is one browser session; it is owned by exactly one harvest run
/// and closed when the run finishes.
pub struct TheaterDriver {
    pub client: Client,
    pub stealth_profile: StealthProfile,
    pub user_agent_profile: UserAgentProfile,
    navigation_timeout: Duration,
}

/// WebDriver capabilities for the configured browser.
pub fn build_capabilities(
    config: &BrowserConfig,
    stealth: StealthProfile,
    profile: &UserAgentProfile,
) -> Capabilities {
    let mut caps = Capabilities::new();
    // Return control at DOMContentLoaded; the harvester waits out the rest.
    caps.insert("pageLoadStrategy".to_string(), json!("eager"));

    match config.kind {
        BrowserKind::Chrome => {
            let args = build_chrome_arguments(stealth, profile, config.headless);
            caps.insert("browserName".to_string(), json!("chrome"));
            caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        }
        BrowserKind::Firefox => {
            let args = build_firefox_arguments(profile, config.headless);
            let prefs = build_firefox_preferences(stealth, profile);
            caps.insert("browserName".to_string(), json!("firefox"));
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({ "args": args, "prefs": prefs }),
            );
        }
    }
    caps
}

impl TheaterDriver {
    /// Open a new browser session on the configured WebDriver endpoint.
    pub async fn connect(config: &BrowserConfig) -> Result<Self> {
        let stealth_profile = StealthProfile::from(config.stealth);
        let user_agent_profile = UserAgentManager::new().session_profile(config);
        let caps = build_capabilities(config, stealth_profile, &user_agent_profile);

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .with_context(|| format!("failed to connect to WebDriver at {}", config.webdriver_url))?;

        let (width, height) = user_agent_profile.viewport;
        if let Err(e) = client.set_window_size(width, height).await {
            warn!(target: "browser.driver", error = %e, "could not resize browser window");
        }

        info!(
            target: "browser.driver",
            endpoint = %config.webdriver_url,
            kind = ?config.kind,
            headless = config.headless,
            "browser session started"
        );

        Ok(Self {
            client,
            stealth_profile,
            user_agent_profile,
            navigation_timeout: config.navigation_timeout(),
        })
    }

    /// Inject session cookies for the site hosting `target`.
    ///
    /// WebDriver only accepts cookies for the current document's domain, so
    /// the target's origin is loaded first. Expired cookies and cookies for
    /// other domains are skipped; individual failures are logged and skipped.
    /// Returns the number of cookies installed.
    pub async fn install_cookies(&self, target: &Url, cookies: &[CookieRecord]) -> Result<usize> {
        if cookies.is_empty() {
            return Ok(0);
        }
        let host = target.host_str().unwrap_or_default().to_string();
        let origin = target.origin().ascii_serialization();

        tokio::time::timeout(self.navigation_timeout, self.client.goto(&origin))
            .await
            .with_context(|| format!("loading {origin} for cookie injection timed out"))??;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        let mut installed = 0;
        for record in cookies {
            if record.is_expired(now) {
                debug!(target: "browser.cookies", name = %record.name, "skipping expired cookie");
                continue;
            }
            if !record.applies_to(&host) {
                debug!(
                    target: "browser.cookies",
                    name = %record.name,
                    domain = %record.domain,
                    "skipping cookie for another domain"
                );
                continue;
            }
            match self.client.add_cookie(to_webdriver_cookie(record)).await {
                Ok(()) => installed += 1,
                Err(e) => warn!(
                    target: "browser.cookies",
                    name = %record.name,
                    error = %e,
                    "cookie rejected"
                ),
            }
        }
        info!(target: "browser.cookies", installed, total = cookies.len(), "cookies installed");
        Ok(installed)
    }

    /// The document interface for this session's current tab.
    pub fn page(&self) -> TheaterPage {
        TheaterPage::new(
            self.client.clone(),
            self.stealth_profile,
            self.navigation_timeout,
        )
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

fn to_webdriver_cookie(record: &CookieRecord) -> Cookie<'static> {
    let mut cookie = Cookie::new(record.name.clone(), record.value.clone());
    cookie.set_domain(record.domain.clone());
    cookie.set_path(record.path.clone());
    cookie.set_secure(record.secure);
    cookie.set_http_only(record.http_only);
    if !record.is_session() {
        if let Ok(at) = OffsetDateTime::from_unix_timestamp(record.expires) {
            cookie.set_expires(at);
        }
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use theater_common::credentials::SESSION_EXPIRY;

    fn profile() -> UserAgentProfile {
        UserAgentProfile {
            user_agent: "UA/1".into(),
            viewport: (1366, 768),
            platform: "Win32".into(),
            languages: vec!["en-US".into()],
        }
    }

    #[test]
    fn firefox_capabilities() {
        let cfg = BrowserConfig::default();
        let caps = build_capabilities(&cfg, StealthProfile::Lightweight, &profile());
        assert_eq!(caps["pageLoadStrategy"], json!("eager"));
        assert_eq!(caps["browserName"], json!("firefox"));
        let args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("-headless")));
        assert_eq!(
            caps["moz:firefoxOptions"]["prefs"]["general.useragent.override"],
            json!("UA/1")
        );
    }

    #[test]
    fn chrome_capabilities() {
        let mut cfg = BrowserConfig::default();
        cfg.kind = BrowserKind::Chrome;
        cfg.headless = false;
        let caps = build_capabilities(&cfg, StealthProfile::Balanced, &profile());
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--user-agent=UA/1")));
    }

    #[test]
    fn cookie_conversion_keeps_attributes() {
        let record = CookieRecord {
            name: "c_user".into(),
            value: "42".into(),
            domain: ".facebook.com".into(),
            path: "/".into(),
            secure: true,
            expires: 1_893_456_000,
            http_only: true,
        };
        let cookie = to_webdriver_cookie(&record);
        assert_eq!(cookie.name(), "c_user");
        assert_eq!(cookie.value(), "42");
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert!(cookie.expires().is_some());

        let session = CookieRecord {
            expires: SESSION_EXPIRY,
            ..record
        };
        assert!(to_webdriver_cookie(&session).expires().is_none());
    }
}
