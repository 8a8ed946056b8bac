//! The interactive document interface consumed by the harvesting engine.
//!
//! A [`Document`] is a live page in some browser. The engine never assumes
//! anything about how it is driven; the WebDriver implementation lives in
//! `theater-drivers` and the engine tests use a scripted in-memory page.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Rendered size of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Plain `width * height` product.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// True when both dimensions are strictly greater than the floor.
    pub fn exceeds(&self, min_width: f64, min_height: f64) -> bool {
        self.width > min_width && self.height > min_height
    }
}

/// Size of the visible browser viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Absolute point for the given fractional position.
    pub fn point_at(&self, x_ratio: f64, y_ratio: f64) -> (f64, f64) {
        (self.width * x_ratio, self.height * y_ratio)
    }
}

/// How a click should be delivered.
#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
    /// Bypass pointer-interception checks (overlays, actionability).
    pub force: bool,
    /// Upper bound for the whole click operation.
    pub timeout: Duration,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            force: false,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Capability set of a headless-browser page.
///
/// Element handles are opaque to callers; they are only ever passed back into
/// the same document. A `scope` of `None` means the whole document.
#[async_trait]
pub trait Document: Send + Sync {
    type Element: Clone + Send + Sync;

    /// All elements matching `selector`, in document order.
    async fn query(
        &self,
        selector: &str,
        scope: Option<&Self::Element>,
    ) -> Result<Vec<Self::Element>>;

    async fn is_visible(&self, element: &Self::Element) -> Result<bool>;

    /// `None` when the element has no layout box.
    async fn bounding_box(&self, element: &Self::Element) -> Result<Option<BoundingBox>>;

    async fn click(&self, element: &Self::Element, options: ClickOptions) -> Result<()>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<()>;

    async fn current_location(&self) -> Result<String>;

    async fn viewport_size(&self) -> Result<Viewport>;

    /// Press and release a named key (`ArrowRight`, `Escape`, ...).
    async fn keyboard_press(&self, key: &str) -> Result<()>;

    /// Click whatever is rendered at the viewport coordinate.
    async fn mouse_click(&self, x: f64, y: f64) -> Result<()>;

    /// Write a PNG of the current viewport to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    async fn title(&self) -> Result<String>;

    async fn navigate(&self, url: &str) -> Result<()>;
}
