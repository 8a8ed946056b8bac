//! Photo-viewer detection and entry.

use std::time::Duration;

use anyhow::Result;
use theater_common::document::{ClickOptions, Document};
use theater_config::{MatcherConfig, Pauses, ScoringConfig};
use tracing::{debug, info, warn};

use crate::pause;
use crate::scorer::{Candidate, CandidateScorer};

/// Derives the viewer's open state from the live document. Never cached:
/// the viewer can open or close outside the engine's control.
#[derive(Debug, Clone, Copy)]
pub struct ViewerProbe<'a> {
    matchers: &'a MatcherConfig,
}

impl<'a> ViewerProbe<'a> {
    pub fn new(matchers: &'a MatcherConfig) -> Self {
        Self { matchers }
    }

    /// True when any signal fires: a visible dialog, a visible close control
    /// in any configured locale, or a viewer marker in the location.
    pub async fn is_open<D: Document>(&self, doc: &D) -> Result<bool> {
        if self.visible_dialog(doc).await?.is_some() {
            return Ok(true);
        }
        for control in &self.matchers.close_controls {
            if first_visible(doc, &control.css(), None).await?.is_some() {
                return Ok(true);
            }
        }
        let location = doc.current_location().await?;
        Ok(self
            .matchers
            .viewer_url_markers
            .iter()
            .any(|marker| location.contains(marker.as_str())))
    }

    /// The first visible dialog element, if any.
    pub async fn visible_dialog<D: Document>(&self, doc: &D) -> Result<Option<D::Element>> {
        first_visible(doc, &self.matchers.dialog_selector, None).await
    }
}

/// The first element matching `selector` that is currently visible.
pub(crate) async fn first_visible<D: Document>(
    doc: &D,
    selector: &str,
    scope: Option<&D::Element>,
) -> Result<Option<D::Element>> {
    for element in doc.query(selector, scope).await? {
        if doc.is_visible(&element).await? {
            return Ok(Some(element));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// The viewer was open before any click.
    AlreadyOpen,
    /// The `attempt`-th candidate (1-based) opened the viewer.
    Opened { attempt: usize, area: f64 },
    NotOpened { attempts: usize },
}

impl EntryOutcome {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::NotOpened { .. })
    }
}

/// Clicks through ranked candidates until the viewer opens.
pub struct EntrySequencer<'a> {
    scorer: &'a CandidateScorer,
    matchers: &'a MatcherConfig,
    pauses: &'a Pauses,
    max_attempts: usize,
    click_timeout: Duration,
}

impl<'a> EntrySequencer<'a> {
    pub fn new(
        scorer: &'a CandidateScorer,
        scoring: &ScoringConfig,
        matchers: &'a MatcherConfig,
        pauses: &'a Pauses,
    ) -> Self {
        Self {
            scorer,
            matchers,
            pauses,
            max_attempts: scoring.max_entry_attempts,
            click_timeout: scoring.click_timeout(),
        }
    }

    pub async fn enter<D: Document>(&self, doc: &D) -> Result<EntryOutcome> {
        let candidates = self.candidates(doc).await?;
        let probe = ViewerProbe::new(self.matchers);

        if probe.is_open(doc).await? {
            info!(target: "engine.entry", "viewer already open");
            return Ok(EntryOutcome::AlreadyOpen);
        }

        info!(
            target: "engine.entry",
            candidates = candidates.len(),
            max_attempts = self.max_attempts,
            "entering viewer"
        );

        let mut attempts = 0;
        for candidate in candidates.iter().take(self.max_attempts) {
            attempts += 1;
            match self.try_candidate(doc, &probe, candidate).await {
                Ok(true) => {
                    info!(target: "engine.entry", attempt = attempts, area = candidate.area(), "viewer opened");
                    return Ok(EntryOutcome::Opened {
                        attempt: attempts,
                        area: candidate.area(),
                    });
                }
                Ok(false) => {
                    debug!(target: "engine.entry", attempt = attempts, "click did not open the viewer");
                }
                Err(e) => {
                    warn!(target: "engine.entry", attempt = attempts, error = %e, "candidate click failed");
                }
            }
        }

        warn!(target: "engine.entry", attempts, "no candidate opened the viewer");
        Ok(EntryOutcome::NotOpened { attempts })
    }

    /// Ranked candidates inside content containers, else over the whole page.
    async fn candidates<D: Document>(&self, doc: &D) -> Result<Vec<Candidate<D::Element>>> {
        if let Some(scoped) = self.matchers.content_selector() {
            let ranked = self.scorer.rank(doc, &scoped, None).await?;
            if !ranked.is_empty() {
                return Ok(ranked);
            }
            debug!(target: "engine.entry", "no content candidates, falling back to unscoped query");
        }
        self.scorer
            .rank(doc, &self.matchers.fallback_selector, None)
            .await
    }

    async fn try_candidate<D: Document>(
        &self,
        doc: &D,
        probe: &ViewerProbe<'_>,
        candidate: &Candidate<D::Element>,
    ) -> Result<bool> {
        if probe.is_open(doc).await? {
            return Ok(true);
        }
        doc.scroll_into_view(&candidate.element).await?;
        pause(self.pauses.scroll_settle()).await;
        doc.click(
            &candidate.element,
            ClickOptions {
                force: true,
                timeout: self.click_timeout,
            },
        )
        .await?;
        pause(self.pauses.after_entry_click()).await;
        probe.is_open(doc).await
    }
}
