use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use theater_config::{BrowserConfig, BrowserKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Snapshot of user agent, viewport, and locale characteristics.
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone)]
/// Small pool of plausible desktop profiles per browser engine.
pub struct UserAgentManager {
    firefox_profiles: Vec<UserAgentProfile>,
    chrome_profiles: Vec<UserAgentProfile>,
}

impl Default for UserAgentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAgentManager {
    pub fn new() -> Self {
        let en = || vec!["en-US".to_string(), "en".to_string()];
        Self {
            firefox_profiles: vec![
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0".to_string(),
                    viewport: (1366, 768),
                    platform: "Win32".to_string(),
                    languages: en(),
                },
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:128.0) Gecko/20100101 Firefox/128.0".to_string(),
                    viewport: (1440, 900),
                    platform: "MacIntel".to_string(),
                    languages: en(),
                },
            ],
            chrome_profiles: vec![
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1366, 768),
                    platform: "Win32".to_string(),
                    languages: en(),
                },
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1440, 900),
                    platform: "MacIntel".to_string(),
                    languages: en(),
                },
            ],
        }
    }

    /// Pick a profile for the configured browser, then apply explicit
    /// overrides. The configured viewport always wins so layout-dependent
    /// heuristics see the size they were tuned for.
    pub fn session_profile(&self, config: &BrowserConfig) -> UserAgentProfile {
        let pool = match config.kind {
            BrowserKind::Firefox => &self.firefox_profiles,
            BrowserKind::Chrome => &self.chrome_profiles,
        };
        let mut profile = pool
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.firefox_profiles[0].clone());

        if let Some(ua) = &config.user_agent {
            profile.user_agent = ua.clone();
        }
        profile.viewport = (config.viewport.width, config.viewport.height);
        profile
    }
}
