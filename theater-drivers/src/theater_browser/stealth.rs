use serde_json::{json, Map, Value};
use theater_config::StealthLevel;

use super::fingerprint::UserAgentProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Levels of stealth applied to the browser session.
pub enum StealthProfile {
    Lightweight,
    Balanced,
    Maximum,
}

impl From<StealthLevel> for StealthProfile {
    fn from(level: StealthLevel) -> Self {
        match level {
            StealthLevel::Lightweight => Self::Lightweight,
            StealthLevel::Balanced => Self::Balanced,
            StealthLevel::Maximum => Self::Maximum,
        }
    }
}

/// Chrome command-line arguments for a given stealth profile and fingerprint.
pub fn build_chrome_arguments(
    profile: StealthProfile,
    user_profile: &UserAgentProfile,
    headless: bool,
) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        format!("--user-agent={}", user_profile.user_agent),
        format!(
            "--window-size={},{}",
            user_profile.viewport.0, user_profile.viewport.1
        ),
        format!("--lang={}", user_profile.languages.join(",")),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    if headless || profile == StealthProfile::Maximum {
        args.push("--disable-gpu".to_string());
    }
    args
}

/// Firefox arguments; the window size is set after the session starts.
pub fn build_firefox_arguments(user_profile: &UserAgentProfile, headless: bool) -> Vec<String> {
    let mut args = vec![
        format!("--width={}", user_profile.viewport.0),
        format!("--height={}", user_profile.viewport.1),
    ];
    if headless {
        args.push("-headless".to_string());
    }
    args
}

/// Firefox `prefs` block for `moz:firefoxOptions`.
pub fn build_firefox_preferences(
    profile: StealthProfile,
    user_profile: &UserAgentProfile,
) -> Map<String, Value> {
    let mut prefs = Map::new();
    prefs.insert(
        "general.useragent.override".into(),
        json!(user_profile.user_agent),
    );
    prefs.insert(
        "intl.accept_languages".into(),
        json!(user_profile.languages.join(", ")),
    );
    if profile != StealthProfile::Lightweight {
        prefs.insert("dom.webdriver.enabled".into(), json!(false));
        prefs.insert("useAutomationExtension".into(), json!(false));
    }
    prefs
}

/// JavaScript evasions applied after each navigation.
pub struct StealthScripts;

impl StealthScripts {
    pub fn get_core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            Object.defineProperty(navigator, 'languages', {
                get: () => ['en-US', 'en']
            });
        "#
    }

    pub fn get_canvas_evasions() -> &'static str {
        r#"
            const getContext = HTMLCanvasElement.prototype.getContext;
            HTMLCanvasElement.prototype.getContext = function(type, ...args) {
                const ctx = getContext.call(this, type, ...args);
                if (type === '2d' && ctx) {
                    const origToDataURL = this.toDataURL;
                    this.toDataURL = function(...a) {
                        const img = ctx.getImageData(0, 0, this.width, this.height);
                        for (let i = 0; i < img.data.length; i += 4) {
                            if (Math.random() < 0.001) img.data[i] += Math.random() < 0.5 ? -1 : 1;
                        }
                        ctx.putImageData(img, 0, 0);
                        return origToDataURL.call(this, ...a);
                    };
                }
                return ctx;
            };
        "#
    }

    /// Scripts to run for `profile`, in order.
    pub fn for_profile(profile: StealthProfile) -> Vec<&'static str> {
        match profile {
            StealthProfile::Lightweight => vec![],
            StealthProfile::Balanced => vec![Self::get_core_evasions()],
            StealthProfile::Maximum => {
                vec![Self::get_core_evasions(), Self::get_canvas_evasions()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserAgentProfile {
        UserAgentProfile {
            user_agent: "UA/1".into(),
            viewport: (1366, 768),
            platform: "Win32".into(),
            languages: vec!["en-US".into(), "en".into()],
        }
    }

    #[test]
    fn chrome_headless_arguments() {
        let args = build_chrome_arguments(StealthProfile::Lightweight, &profile(), true);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1366,768".to_string()));
        assert!(args.contains(&"--user-agent=UA/1".to_string()));
    }

    #[test]
    fn firefox_prefs_carry_user_agent() {
        let prefs = build_firefox_preferences(StealthProfile::Balanced, &profile());
        assert_eq!(prefs["general.useragent.override"], json!("UA/1"));
        assert_eq!(prefs["dom.webdriver.enabled"], json!(false));

        let light = build_firefox_preferences(StealthProfile::Lightweight, &profile());
        assert!(!light.contains_key("dom.webdriver.enabled"));
    }

    #[test]
    fn lightweight_runs_no_scripts() {
        assert!(StealthScripts::for_profile(StealthProfile::Lightweight).is_empty());
        assert_eq!(StealthScripts::for_profile(StealthProfile::Maximum).len(), 2);
    }
}
