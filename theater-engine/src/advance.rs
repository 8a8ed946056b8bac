//! Ordered ladder of ways to move the carousel forward.
//!
//! Each strategy reports whether it believes the viewer advanced; the ladder
//! stops at the first one that does. New strategies slot in without touching
//! the traversal loop.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use theater_common::document::{ClickOptions, Document};
use theater_config::{ControlMatcher, FallbackClick, TheaterConfig};
use tracing::debug;

use crate::pause;
use crate::viewer::first_visible;

#[async_trait]
pub trait AdvanceStrategy<D: Document>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Try to advance; `scope` is the viewer dialog when one is visible.
    async fn advance(&self, doc: &D, scope: Option<&D::Element>) -> Result<bool>;
}

/// Clicks the first visible localized "next" control.
pub struct NextControl {
    controls: Vec<ControlMatcher>,
    click_timeout: Duration,
    settle: Duration,
}

impl NextControl {
    pub fn new(controls: Vec<ControlMatcher>, click_timeout: Duration, settle: Duration) -> Self {
        Self {
            controls,
            click_timeout,
            settle,
        }
    }
}

#[async_trait]
impl<D: Document> AdvanceStrategy<D> for NextControl {
    fn name(&self) -> &'static str {
        "next_control"
    }

    async fn advance(&self, doc: &D, scope: Option<&D::Element>) -> Result<bool> {
        for control in &self.controls {
            let css = control.css();
            if let Some(button) = first_visible(doc, &css, scope).await? {
                debug!(target: "engine.advance", control = %css, "clicking next control");
                doc.click(
                    &button,
                    ClickOptions {
                        force: false,
                        timeout: self.click_timeout,
                    },
                )
                .await?;
                pause(self.settle).await;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Presses the advance key; counts as progress only if the location moved.
pub struct KeyboardNudge {
    key: String,
    settle: Duration,
}

impl KeyboardNudge {
    pub fn new(key: impl Into<String>, settle: Duration) -> Self {
        Self {
            key: key.into(),
            settle,
        }
    }
}

#[async_trait]
impl<D: Document> AdvanceStrategy<D> for KeyboardNudge {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    async fn advance(&self, doc: &D, _scope: Option<&D::Element>) -> Result<bool> {
        let before = doc.current_location().await?;
        doc.keyboard_press(&self.key).await?;
        pause(self.settle).await;
        let after = doc.current_location().await?;
        Ok(after != before)
    }
}

/// Unconditional click at a fixed fraction of the viewport.
pub struct EdgeClick {
    target: FallbackClick,
    settle: Duration,
}

impl EdgeClick {
    pub fn new(target: FallbackClick, settle: Duration) -> Self {
        Self { target, settle }
    }
}

#[async_trait]
impl<D: Document> AdvanceStrategy<D> for EdgeClick {
    fn name(&self) -> &'static str {
        "edge_click"
    }

    async fn advance(&self, doc: &D, _scope: Option<&D::Element>) -> Result<bool> {
        let viewport = doc.viewport_size().await?;
        let (x, y) = viewport.point_at(self.target.x_ratio, self.target.y_ratio);
        debug!(target: "engine.advance", x, y, "clicking viewport edge");
        doc.mouse_click(x, y).await?;
        pause(self.settle).await;
        Ok(true)
    }
}

pub struct AdvanceLadder<D: Document> {
    strategies: Vec<Box<dyn AdvanceStrategy<D>>>,
}

impl<D: Document> AdvanceLadder<D> {
    pub fn new(strategies: Vec<Box<dyn AdvanceStrategy<D>>>) -> Self {
        Self { strategies }
    }

    /// Next control, then keyboard, then edge click.
    pub fn from_config(config: &TheaterConfig) -> Self {
        let pauses = &config.traversal.pauses;
        Self::new(vec![
            Box::new(NextControl::new(
                config.matchers.next_controls.clone(),
                config.scoring.click_timeout(),
                pauses.after_advance(),
            )),
            Box::new(KeyboardNudge::new(
                config.traversal.advance_key.clone(),
                pauses.after_key(),
            )),
            Box::new(EdgeClick::new(
                config.traversal.fallback_click,
                pauses.after_advance(),
            )),
        ])
    }

    /// Name of the strategy that advanced, or `None` if every rung declined.
    pub async fn advance(&self, doc: &D, scope: Option<&D::Element>) -> Result<Option<&'static str>> {
        for strategy in &self.strategies {
            if strategy.advance(doc, scope).await? {
                return Ok(Some(strategy.name()));
            }
            debug!(target: "engine.advance", strategy = strategy.name(), "strategy did not advance");
        }
        Ok(None)
    }
}
