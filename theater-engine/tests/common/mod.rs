#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use theater_common::document::{BoundingBox, ClickOptions, Document, Viewport};
use theater_common::fetch::ImageFetcher;
use theater_common::observability::{LogConfig, LogFormat};
use theater_config::{Pauses, TheaterConfig};

static INIT_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "theater-tests".into(),
            emit_stderr: true,
            format: LogFormat::Text,
            default_filter: "debug".into(),
            ..LogConfig::default()
        };
        theater_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// Default configuration with every pause removed.
pub fn fast_config() -> TheaterConfig {
    let mut config = TheaterConfig::default();
    config.traversal.pauses = Pauses::none();
    config
}

pub const POST_URL: &str = "https://www.facebook.com/groups/1/posts/2";

/// Handles into the scripted page.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeElement {
    PageImage(usize),
    Dialog,
    Close,
    Next,
    Slide(usize),
    /// Small decorative image shown next to every slide.
    Badge,
}

#[derive(Debug, Clone)]
pub struct PageImage {
    pub width: f64,
    pub height: f64,
    pub visible: bool,
    pub opens_viewer: bool,
    pub click_fails: bool,
}

impl PageImage {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            visible: true,
            opens_viewer: false,
            click_fails: false,
        }
    }

    pub fn opening(mut self) -> Self {
        self.opens_viewer = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.click_fails = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Slide {
    pub location: String,
    /// `(src, width, height)` of the displayed photo.
    pub image: Option<(String, f64, f64)>,
}

impl Slide {
    pub fn photo(fbid: u64, src: &str) -> Self {
        Self {
            location: format!("https://www.facebook.com/photo/?fbid={fbid}&set=pcb.2"),
            image: Some((src.to_string(), 960.0, 720.0)),
        }
    }

    pub fn empty(fbid: u64) -> Self {
        Self {
            location: format!("https://www.facebook.com/photo/?fbid={fbid}&set=pcb.2"),
            image: None,
        }
    }
}

#[derive(Debug)]
pub struct FakeState {
    pub title: String,
    pub page_location: String,
    pub page_images: Vec<PageImage>,
    /// Whether the content-container selector matches anything.
    pub content_scoped: bool,
    pub viewer_open: bool,
    pub dialog: bool,
    pub close_button: bool,
    /// Accessible label the close control answers to.
    pub close_label: &'static str,
    pub next_button: bool,
    pub next_label: &'static str,
    pub keyboard_advances: bool,
    pub edge_click_advances: bool,
    pub slides: Vec<Slide>,
    pub current: usize,
    pub navigation_fails: bool,
    pub title_fails: bool,
    pub location_fails_after: Option<usize>,

    pub queries: Vec<String>,
    pub element_clicks: Vec<FakeElement>,
    pub key_presses: Vec<String>,
    pub mouse_clicks: Vec<(f64, f64)>,
    pub screenshots: Vec<PathBuf>,
    pub navigations: Vec<String>,
    pub location_reads: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            title: "Facebook".into(),
            page_location: POST_URL.into(),
            page_images: Vec::new(),
            content_scoped: true,
            viewer_open: false,
            dialog: true,
            close_button: true,
            close_label: "Close",
            next_button: true,
            next_label: "Next photo",
            keyboard_advances: false,
            edge_click_advances: false,
            slides: Vec::new(),
            current: 0,
            navigation_fails: false,
            title_fails: false,
            location_fails_after: None,
            queries: Vec::new(),
            element_clicks: Vec::new(),
            key_presses: Vec::new(),
            mouse_clicks: Vec::new(),
            screenshots: Vec::new(),
            navigations: Vec::new(),
            location_reads: 0,
        }
    }
}

impl FakeState {
    fn advance(&mut self) {
        if !self.slides.is_empty() {
            self.current = (self.current + 1) % self.slides.len();
        }
    }

    fn slide(&self) -> Option<&Slide> {
        self.slides.get(self.current)
    }
}

/// An in-memory post page with a scripted photo viewer.
pub struct FakeDocument {
    state: Mutex<FakeState>,
}

impl FakeDocument {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// A post whose largest image opens a viewer over `slides`.
    pub fn carousel(slides: Vec<Slide>) -> Self {
        Self::new(FakeState {
            page_images: vec![PageImage::new(40.0, 40.0), PageImage::new(600.0, 400.0).opening()],
            slides,
            ..FakeState::default()
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

fn is_label(selector: &str, labels: &[&str]) -> bool {
    labels
        .iter()
        .any(|label| selector == format!("[aria-label=\"{label}\"]"))
}

#[async_trait]
impl Document for FakeDocument {
    type Element = FakeElement;

    async fn query(&self, selector: &str, _scope: Option<&FakeElement>) -> Result<Vec<FakeElement>> {
        let mut s = self.lock();
        s.queries.push(selector.to_string());
        let page_images = || (0..s.page_images.len()).map(FakeElement::PageImage).collect::<Vec<_>>();

        if selector.contains("role=\"main\"") {
            if s.content_scoped && !s.viewer_open {
                return Ok(page_images());
            }
            return Ok(vec![]);
        }
        if selector == "img" {
            if s.viewer_open {
                let mut found = vec![FakeElement::Badge];
                if s.slide().is_some_and(|slide| slide.image.is_some()) {
                    found.push(FakeElement::Slide(s.current));
                }
                return Ok(found);
            }
            return Ok(page_images());
        }
        if selector == "[role=\"dialog\"]" {
            return Ok(if s.viewer_open && s.dialog {
                vec![FakeElement::Dialog]
            } else {
                vec![]
            });
        }
        if is_label(selector, &[s.close_label]) {
            return Ok(if s.viewer_open && s.close_button {
                vec![FakeElement::Close]
            } else {
                vec![]
            });
        }
        if is_label(selector, &[s.next_label]) {
            return Ok(if s.viewer_open && s.next_button {
                vec![FakeElement::Next]
            } else {
                vec![]
            });
        }
        Ok(vec![])
    }

    async fn is_visible(&self, element: &FakeElement) -> Result<bool> {
        let s = self.lock();
        Ok(match element {
            FakeElement::PageImage(i) => s.page_images.get(*i).is_some_and(|p| p.visible),
            _ => true,
        })
    }

    async fn bounding_box(&self, element: &FakeElement) -> Result<Option<BoundingBox>> {
        let s = self.lock();
        Ok(match element {
            FakeElement::PageImage(i) => s
                .page_images
                .get(*i)
                .map(|p| BoundingBox::new(p.width, p.height)),
            FakeElement::Slide(i) => s
                .slides
                .get(*i)
                .and_then(|slide| slide.image.as_ref())
                .map(|(_, w, h)| BoundingBox::new(*w, *h)),
            FakeElement::Badge => Some(BoundingBox::new(40.0, 40.0)),
            FakeElement::Dialog => Some(BoundingBox::new(1366.0, 768.0)),
            FakeElement::Close | FakeElement::Next => Some(BoundingBox::new(48.0, 48.0)),
        })
    }

    async fn click(&self, element: &FakeElement, _options: ClickOptions) -> Result<()> {
        let mut s = self.lock();
        s.element_clicks.push(element.clone());
        match element {
            FakeElement::PageImage(i) => {
                let image = s.page_images[*i].clone();
                if image.click_fails {
                    return Err(anyhow!("element click intercepted"));
                }
                if image.opens_viewer {
                    s.viewer_open = true;
                    s.current = 0;
                }
            }
            FakeElement::Next => s.advance(),
            _ => {}
        }
        Ok(())
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        let s = self.lock();
        if name != "src" {
            return Ok(None);
        }
        Ok(match element {
            FakeElement::Slide(i) => s
                .slides
                .get(*i)
                .and_then(|slide| slide.image.as_ref())
                .map(|(src, _, _)| src.clone()),
            FakeElement::PageImage(i) => Some(format!("https://cdn.test/thumb_{i}.jpg")),
            FakeElement::Badge => Some("https://cdn.test/badge.png".into()),
            _ => None,
        })
    }

    async fn scroll_into_view(&self, _element: &FakeElement) -> Result<()> {
        Ok(())
    }

    async fn current_location(&self) -> Result<String> {
        let mut s = self.lock();
        s.location_reads += 1;
        if let Some(limit) = s.location_fails_after {
            if s.location_reads > limit {
                return Err(anyhow!("browser session lost"));
            }
        }
        if s.viewer_open {
            if let Some(slide) = s.slide() {
                return Ok(slide.location.clone());
            }
        }
        Ok(s.page_location.clone())
    }

    async fn viewport_size(&self) -> Result<Viewport> {
        Ok(Viewport {
            width: 1366.0,
            height: 768.0,
        })
    }

    async fn keyboard_press(&self, key: &str) -> Result<()> {
        let mut s = self.lock();
        s.key_presses.push(key.to_string());
        if s.keyboard_advances {
            s.advance();
        }
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
        let mut s = self.lock();
        s.mouse_clicks.push((x, y));
        if s.edge_click_advances {
            s.advance();
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.lock().screenshots.push(path.to_path_buf());
        tokio::fs::write(path, b"\x89PNG").await?;
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        let s = self.lock();
        if s.title_fails {
            return Err(anyhow!("no such window"));
        }
        Ok(s.title.clone())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut s = self.lock();
        s.navigations.push(url.to_string());
        if s.navigation_fails {
            return Err(anyhow!("navigation timed out"));
        }
        Ok(())
    }
}

/// Records every fetch and writes a placeholder file.
#[derive(Default)]
pub struct RecordingFetcher {
    pub fetched: Mutex<Vec<(String, PathBuf)>>,
    pub failing: HashSet<String>,
}

impl RecordingFetcher {
    pub fn failing_on(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl ImageFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        self.fetched
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        if self.failing.contains(url) {
            return Err(anyhow!("HTTP 403 for {url}"));
        }
        tokio::fs::write(destination, url.as_bytes()).await?;
        Ok(url.len() as u64)
    }
}
