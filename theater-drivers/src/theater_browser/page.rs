use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use fantoccini::actions::{InputSource, KeyAction, KeyActions};
use fantoccini::elements::Element;
use fantoccini::key::Key;
use fantoccini::{Client, Locator};
use serde_json::Value;
use theater_common::document::{BoundingBox, ClickOptions, Document, Viewport};
use theater_common::TheaterError;
use tracing::{debug, info};

use super::stealth::{StealthProfile, StealthScripts};

const FORCE_CLICK_JS: &str = "arguments[0].click();";

const SCROLL_INTO_VIEW_JS: &str =
    "arguments[0].scrollIntoView({block: 'center', inline: 'center'});";

const VIEWPORT_JS: &str = "return [window.innerWidth, window.innerHeight];";

// Synthesised pointer sequence on whatever sits at the coordinate.
const POINT_CLICK_JS: &str = r#"
    const x = arguments[0], y = arguments[1];
    const target = document.elementFromPoint(x, y);
    if (!target) return false;
    for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup', 'click']) {
        target.dispatchEvent(new MouseEvent(type, {
            bubbles: true, cancelable: true, view: window,
            clientX: x, clientY: y, button: 0
        }));
    }
    return true;
"#;

/// A live WebDriver page exposed through the [`Document`] interface.
pub struct TheaterPage {
    pub(crate) client: Client,
    pub(crate) stealth_profile: StealthProfile,
    pub(crate) navigation_timeout: Duration,
}

impl TheaterPage {
    pub fn new(client: Client, stealth_profile: StealthProfile, navigation_timeout: Duration) -> Self {
        Self {
            client,
            stealth_profile,
            navigation_timeout,
        }
    }

    async fn apply_stealth(&self) -> Result<()> {
        for script in StealthScripts::for_profile(self.stealth_profile) {
            self.client.execute(script, vec![]).await?;
        }
        Ok(())
    }

    fn element_arg(element: &Element) -> Result<Value> {
        serde_json::to_value(element).context("element is not serialisable as a script argument")
    }
}

fn key_for(name: &str) -> Result<char> {
    let key = match name {
        "ArrowRight" => Key::Right,
        "ArrowLeft" => Key::Left,
        "ArrowUp" => Key::Up,
        "ArrowDown" => Key::Down,
        "Escape" => Key::Escape,
        "Enter" => Key::Enter,
        "Space" => Key::Space,
        "PageDown" => Key::PageDown,
        other => {
            let mut chars = other.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => bail!("unsupported key name: {other}"),
            };
        }
    };
    Ok(key.into())
}

#[async_trait]
impl Document for TheaterPage {
    type Element = Element;

    async fn query(&self, selector: &str, scope: Option<&Element>) -> Result<Vec<Element>> {
        let found = match scope {
            Some(root) => root.find_all(Locator::Css(selector)).await,
            None => self.client.find_all(Locator::Css(selector)).await,
        };
        found.with_context(|| format!("query failed for selector {selector}"))
    }

    async fn is_visible(&self, element: &Element) -> Result<bool> {
        // Detached or stale elements count as not visible.
        match element.is_displayed().await {
            Ok(visible) => Ok(visible),
            Err(e) => {
                debug!(target: "browser.element", error = %e, "visibility check failed");
                Ok(false)
            }
        }
    }

    async fn bounding_box(&self, element: &Element) -> Result<Option<BoundingBox>> {
        let (_, _, width, height) = element.rectangle().await?;
        if width <= 0.0 || height <= 0.0 {
            return Ok(None);
        }
        Ok(Some(BoundingBox::new(width, height)))
    }

    async fn click(&self, element: &Element, options: ClickOptions) -> Result<()> {
        let attempt = async {
            if options.force {
                self.client
                    .execute(FORCE_CLICK_JS, vec![Self::element_arg(element)?])
                    .await?;
            } else {
                element.click().await?;
            }
            Ok::<(), anyhow::Error>(())
        };
        tokio::time::timeout(options.timeout, attempt)
            .await
            .map_err(|_| anyhow::Error::new(TheaterError::Timeout))?
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        element.attr(name).await.map_err(anyhow::Error::from)
    }

    async fn scroll_into_view(&self, element: &Element) -> Result<()> {
        self.client
            .execute(SCROLL_INTO_VIEW_JS, vec![Self::element_arg(element)?])
            .await?;
        Ok(())
    }

    async fn current_location(&self) -> Result<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(anyhow::Error::from)
    }

    async fn viewport_size(&self) -> Result<Viewport> {
        let value = self.client.execute(VIEWPORT_JS, vec![]).await?;
        let dims = value
            .as_array()
            .filter(|a| a.len() == 2)
            .and_then(|a| Some((a[0].as_f64()?, a[1].as_f64()?)));
        match dims {
            Some((width, height)) => Ok(Viewport { width, height }),
            None => {
                let (width, height) = self.client.get_window_size().await?;
                Ok(Viewport {
                    width: width as f64,
                    height: height as f64,
                })
            }
        }
    }

    async fn keyboard_press(&self, key: &str) -> Result<()> {
        let value = key_for(key)?;
        let actions = KeyActions::new("keyboard".to_string())
            .then(KeyAction::Down { value })
            .then(KeyAction::Up { value });
        self.client.perform_actions(actions).await?;
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
        let hit = self
            .client
            .execute(POINT_CLICK_JS, vec![Value::from(x), Value::from(y)])
            .await?;
        if hit != Value::Bool(true) {
            debug!(target: "browser.input", x, y, "no element at click coordinate");
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let png = self.client.screenshot().await?;
        tokio::fs::write(path, png)
            .await
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        info!(target: "browser.page", path = %path.display(), "screenshot written");
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        self.client.title().await.map_err(anyhow::Error::from)
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        tokio::time::timeout(self.navigation_timeout, self.client.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {url} timed out"))??;
        self.apply_stealth().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_map_to_webdriver_keys() {
        assert_eq!(key_for("ArrowRight").unwrap(), char::from(Key::Right));
        assert_eq!(key_for("x").unwrap(), 'x');
        assert!(key_for("Hyper").is_err());
    }
}
