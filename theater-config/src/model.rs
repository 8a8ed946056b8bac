//! Typed configuration tree.
//!
//! Every section carries defaults tuned against the photo viewer this tool was
//! built for; an empty document deserialises into a working configuration.
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use theater_common::observability::{LogConfig, LogFormat};

use crate::ValidationError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TheaterConfig {
    pub browser: BrowserConfig,
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
    pub traversal: TraversalConfig,
    pub matchers: MatcherConfig,
    pub download: DownloadConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl TheaterConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let s = &self.scoring;
        if s.min_candidate_width < 0.0 || s.min_candidate_height < 0.0 || s.min_display_area < 0.0
        {
            return Err(ValidationError::Negative("scoring thresholds"));
        }
        if s.max_entry_attempts == 0 {
            return Err(ValidationError::Zero("scoring.max_entry_attempts"));
        }
        if self.traversal.stall_threshold == 0 {
            return Err(ValidationError::Zero("traversal.stall_threshold"));
        }
        let fc = &self.traversal.fallback_click;
        for (name, ratio) in [("x_ratio", fc.x_ratio), ("y_ratio", fc.y_ratio)] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ValidationError::Ratio { name, value: ratio });
            }
        }
        let m = &self.matchers;
        if m.next_controls.is_empty() {
            return Err(ValidationError::Empty("matchers.next_controls"));
        }
        if m.close_controls.is_empty() {
            return Err(ValidationError::Empty("matchers.close_controls"));
        }
        if m.image_selector.trim().is_empty() || m.dialog_selector.trim().is_empty() {
            return Err(ValidationError::Empty("matchers.image_selector/dialog_selector"));
        }
        self.matchers.position_regex()?;
        Ok(())
    }
}

// ------------------------------
// Browser
// ------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Firefox,
    Chrome,
}

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    #[default]
    Lightweight,
    Balanced,
    Maximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint (geckodriver / chromedriver).
    pub webdriver_url: String,
    pub kind: BrowserKind,
    pub headless: bool,
    pub viewport: ViewportConfig,
    /// Overrides the fingerprint profile's user agent.
    pub user_agent: Option<String>,
    pub stealth: StealthLevel,
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".into(),
            kind: BrowserKind::Firefox,
            headless: true,
            viewport: ViewportConfig {
                width: 1366,
                height: 768,
            },
            user_agent: None,
            stealth: StealthLevel::Lightweight,
            navigation_timeout_secs: 60,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

// ------------------------------
// Session
// ------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Parent of every per-session output directory.
    pub download_root: PathBuf,
    /// Cookie store injected before navigation; absence is non-fatal.
    pub cookie_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let download_root = dirs::data_dir()
            .map(|d| d.join("theater").join("downloads"))
            .unwrap_or_else(|| PathBuf::from("downloads"));
        Self {
            download_root,
            cookie_file: None,
        }
    }
}

// ------------------------------
// Scoring
// ------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Candidates must be strictly wider than this.
    pub min_candidate_width: f64,
    /// Candidates must be strictly taller than this.
    pub min_candidate_height: f64,
    /// The displayed photo must cover strictly more than this many square pixels.
    pub min_display_area: f64,
    /// How many of the largest candidates the entry sequencer tries.
    pub max_entry_attempts: usize,
    pub click_timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_candidate_width: 70.0,
            min_candidate_height: 70.0,
            min_display_area: 20_000.0,
            max_entry_attempts: 5,
            click_timeout_ms: 5_000,
        }
    }
}

impl ScoringConfig {
    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }
}

// ------------------------------
// Traversal
// ------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackClick {
    pub x_ratio: f64,
    pub y_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Consecutive iterations without a new image before the loop stops.
    pub stall_threshold: u32,
    /// Last-resort click position, as fractions of the viewport.
    pub fallback_click: FallbackClick,
    pub advance_key: String,
    pub pauses: Pauses,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            stall_threshold: 8,
            fallback_click: FallbackClick {
                x_ratio: 0.95,
                y_ratio: 0.5,
            },
            advance_key: "ArrowRight".into(),
            pauses: Pauses::default(),
        }
    }
}

/// Fixed settle times, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pauses {
    pub after_navigation_ms: u64,
    pub scroll_settle_ms: u64,
    pub after_entry_click_ms: u64,
    pub iteration_ms: u64,
    pub no_progress_ms: u64,
    pub after_advance_ms: u64,
    pub after_key_ms: u64,
}

impl Default for Pauses {
    fn default() -> Self {
        Self {
            after_navigation_ms: 5_000,
            scroll_settle_ms: 1_000,
            after_entry_click_ms: 3_000,
            iteration_ms: 1_000,
            no_progress_ms: 1_000,
            after_advance_ms: 2_000,
            after_key_ms: 1_000,
        }
    }
}

impl Pauses {
    /// All pauses disabled; used by tests and dry runs.
    pub fn none() -> Self {
        Self {
            after_navigation_ms: 0,
            scroll_settle_ms: 0,
            after_entry_click_ms: 0,
            iteration_ms: 0,
            no_progress_ms: 0,
            after_advance_ms: 0,
            after_key_ms: 0,
        }
    }

    pub fn after_navigation(&self) -> Duration {
        Duration::from_millis(self.after_navigation_ms)
    }
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
    pub fn after_entry_click(&self) -> Duration {
        Duration::from_millis(self.after_entry_click_ms)
    }
    pub fn iteration(&self) -> Duration {
        Duration::from_millis(self.iteration_ms)
    }
    pub fn no_progress(&self) -> Duration {
        Duration::from_millis(self.no_progress_ms)
    }
    pub fn after_advance(&self) -> Duration {
        Duration::from_millis(self.after_advance_ms)
    }
    pub fn after_key(&self) -> Duration {
        Duration::from_millis(self.after_key_ms)
    }
}

// ------------------------------
// Matchers
// ------------------------------

/// How a UI control is recognised.
///
/// ```
/// use theater_config::ControlMatcher;
///
/// assert_eq!(ControlMatcher::label("Next").css(), r#"[aria-label="Next"]"#);
/// assert_eq!(ControlMatcher::selector("button.next").css(), "button.next");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMatcher {
    /// Accessible label, matched exactly.
    Label(String),
    /// Raw CSS selector.
    Selector(String),
}

impl ControlMatcher {
    pub fn label(text: impl Into<String>) -> Self {
        Self::Label(text.into())
    }

    pub fn selector(css: impl Into<String>) -> Self {
        Self::Selector(css.into())
    }

    pub fn css(&self) -> String {
        match self {
            Self::Label(text) => format!(
                "[aria-label=\"{}\"]",
                text.replace('\\', "\\\\").replace('"', "\\\"")
            ),
            Self::Selector(css) => css.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Image selectors inside plausible post containers.
    pub content_selectors: Vec<String>,
    /// Unscoped query used when no content container matches.
    pub fallback_selector: String,
    /// Image-like elements inside the viewer.
    pub image_selector: String,
    pub dialog_selector: String,
    pub close_controls: Vec<ControlMatcher>,
    /// Tried in order; the first visible one wins.
    pub next_controls: Vec<ControlMatcher>,
    /// Location substrings that mean the viewer is open.
    pub viewer_url_markers: Vec<String>,
    /// Lower-case title substrings that mean a login wall.
    pub login_title_markers: Vec<String>,
    /// First capture group becomes the position identifier.
    pub position_pattern: String,
    /// Attribute holding the image URL.
    pub source_attribute: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            content_selectors: vec![
                r#"div[role="main"] img"#.into(),
                r#"div[role="feed"] img"#.into(),
                r#"div[role="article"] img"#.into(),
            ],
            fallback_selector: "img".into(),
            image_selector: "img".into(),
            dialog_selector: r#"[role="dialog"]"#.into(),
            close_controls: vec![ControlMatcher::label("Close"), ControlMatcher::label("Đóng")],
            next_controls: vec![
                ControlMatcher::label("Next photo"),
                ControlMatcher::label("Next"),
                ControlMatcher::label("Ảnh tiếp theo"),
                ControlMatcher::label("Tiếp"),
            ],
            viewer_url_markers: vec!["photo".into(), "theater".into()],
            login_title_markers: vec!["log in".into(), "đăng nhập".into()],
            position_pattern: r"[?&]fbid=(\d+)".into(),
            source_attribute: "src".into(),
        }
    }
}

impl MatcherConfig {
    /// Content selectors as one selector list, so nested containers do not
    /// yield the same element twice.
    pub fn content_selector(&self) -> Option<String> {
        if self.content_selectors.is_empty() {
            None
        } else {
            Some(self.content_selectors.join(", "))
        }
    }

    pub fn position_regex(&self) -> Result<Regex, ValidationError> {
        Regex::new(&self.position_pattern).map_err(|e| ValidationError::Pattern(e.to_string()))
    }
}

// ------------------------------
// Download / server / logging
// ------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: usize,
    pub file_prefix: String,
    pub extension: String,
    /// Zero-padding width of the image counter.
    pub pad_width: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into(),
            timeout_secs: 60,
            retries: 2,
            file_prefix: "image".into(),
            extension: "jpg".into(),
            pad_width: 3,
        }
    }
}

impl DownloadConfig {
    /// File name for the `n`-th image, e.g. `image_007.jpg`.
    pub fn file_name(&self, n: usize) -> String {
        format!(
            "{}_{:0width$}.{}",
            self.file_prefix,
            n,
            self.extension,
            width = self.pad_width
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: true,
            filter: "info".into(),
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self, app_name: &str) -> LogConfig {
        LogConfig {
            app_name: app_name.to_string(),
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}
