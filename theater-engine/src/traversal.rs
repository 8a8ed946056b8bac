//! The carousel traversal state machine.
//!
//! `Scanning -> Extracting -> Advancing -> (Scanning | Terminated)`. Each
//! iteration checks the viewer position for a revisit, extracts the single
//! largest displayed photo, downloads it when its URL is new, and advances.
//! Any error inside an iteration ends the loop: a half-observed viewer is
//! more dangerous than stopping early.

use regex::Regex;
use serde::Serialize;
use theater_common::document::Document;
use theater_common::fetch::ImageFetcher;
use theater_config::TheaterConfig;
use tracing::{debug, info, warn};

use crate::advance::AdvanceLadder;
use crate::detector::PositionId;
use crate::pause;
use crate::scorer::CandidateScorer;
use crate::session::HarvestSession;
use crate::viewer::ViewerProbe;

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The viewer came back to an already visited position.
    CycleDetected { position: String },
    /// This many consecutive iterations produced no new image.
    Stalled { iterations: u32 },
    LoopError { message: String },
}

#[derive(Debug)]
pub enum TraversalState<E> {
    Scanning,
    Extracting,
    /// Carries the viewer scope resolved during extraction.
    Advancing { scope: Option<E> },
    Terminated(Termination),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalSummary {
    pub termination: Termination,
    pub iterations: usize,
}

pub struct CarouselTraversal<'a, F: ?Sized> {
    config: &'a TheaterConfig,
    scorer: &'a CandidateScorer,
    position_pattern: &'a Regex,
    fetcher: &'a F,
}

impl<'a, F: ImageFetcher + ?Sized> CarouselTraversal<'a, F> {
    pub fn new(
        config: &'a TheaterConfig,
        scorer: &'a CandidateScorer,
        position_pattern: &'a Regex,
        fetcher: &'a F,
    ) -> Self {
        Self {
            config,
            scorer,
            position_pattern,
            fetcher,
        }
    }

    /// Traverse with the configured advancement ladder.
    pub async fn run<D: Document>(&self, doc: &D, session: &mut HarvestSession) -> TraversalSummary {
        let ladder = AdvanceLadder::from_config(self.config);
        self.run_with(doc, session, &ladder).await
    }

    pub async fn run_with<D: Document>(
        &self,
        doc: &D,
        session: &mut HarvestSession,
        ladder: &AdvanceLadder<D>,
    ) -> TraversalSummary {
        let mut state = TraversalState::Scanning;
        let mut iterations = 0usize;

        let termination = loop {
            let step = match state {
                TraversalState::Scanning => {
                    iterations += 1;
                    pause(self.config.traversal.pauses.iteration()).await;
                    self.scan(doc, session, iterations).await
                }
                TraversalState::Extracting => self.extract(doc, session, iterations).await,
                TraversalState::Advancing { scope } => {
                    match ladder.advance(doc, scope.as_ref()).await {
                        Ok(Some(strategy)) => {
                            debug!(target: "engine.traversal", iteration = iterations, strategy, "advanced");
                            Ok(TraversalState::Scanning)
                        }
                        Ok(None) => {
                            debug!(target: "engine.traversal", iteration = iterations, "no strategy advanced");
                            Ok(TraversalState::Scanning)
                        }
                        Err(e) => Err(e),
                    }
                }
                TraversalState::Terminated(termination) => break termination,
            };
            state = step.unwrap_or_else(|e| {
                warn!(
                    target: "engine.traversal",
                    session_id = %session.id(),
                    iteration = iterations,
                    error = %format!("{e:#}"),
                    "traversal aborted"
                );
                TraversalState::Terminated(Termination::LoopError {
                    message: format!("{e:#}"),
                })
            });
        };

        info!(
            target: "engine.traversal",
            session_id = %session.id(),
            iterations,
            images = session.image_count(),
            termination = ?termination,
            "traversal finished"
        );
        TraversalSummary {
            termination,
            iterations,
        }
    }

    /// Cycle check; runs before extraction so a revisit never refetches.
    async fn scan<D: Document>(
        &self,
        doc: &D,
        session: &mut HarvestSession,
        iteration: usize,
    ) -> anyhow::Result<TraversalState<D::Element>> {
        let location = doc.current_location().await?;
        let position = PositionId::from_location(&location, self.position_pattern);
        if session.visit_position(position.clone()) {
            debug!(target: "engine.traversal", iteration, %position, "new position");
            return Ok(TraversalState::Extracting);
        }
        info!(target: "engine.traversal", iteration, %position, "cycle detected");
        Ok(TraversalState::Terminated(Termination::CycleDetected {
            position: position.to_string(),
        }))
    }

    async fn extract<D: Document>(
        &self,
        doc: &D,
        session: &mut HarvestSession,
        iteration: usize,
    ) -> anyhow::Result<TraversalState<D::Element>> {
        let matchers = &self.config.matchers;
        let scope = ViewerProbe::new(matchers).visible_dialog(doc).await?;
        let displayed = self
            .scorer
            .largest(doc, &matchers.image_selector, scope.as_ref())
            .await?;

        let source = match &displayed {
            Some(candidate) => doc
                .attribute(&candidate.element, &matchers.source_attribute)
                .await?
                .filter(|src| !src.is_empty()),
            None => None,
        };

        if let Some(url) = source {
            if let Some(number) = session.record_image(&url) {
                self.download(session, &url, number).await;
                return Ok(TraversalState::Advancing { scope });
            }
            debug!(target: "engine.traversal", iteration, "displayed image already seen");
        } else {
            debug!(target: "engine.traversal", iteration, "no qualifying image displayed");
        }

        let misses = session.note_no_progress();
        if misses >= self.config.traversal.stall_threshold {
            info!(target: "engine.traversal", iteration, misses, "no new image for too long");
            return Ok(TraversalState::Terminated(Termination::Stalled { iterations: misses }));
        }
        pause(self.config.traversal.pauses.no_progress()).await;
        Ok(TraversalState::Advancing { scope })
    }

    /// Inline fetch; a failure is counted and logged, never propagated.
    async fn download(&self, session: &mut HarvestSession, url: &str, number: usize) {
        let destination = session.image_path(&self.config.download, number);
        let without_query = url.split('?').next().unwrap_or(url);
        info!(
            target: "engine.download",
            session_id = %session.id(),
            image = number,
            url = without_query,
            "downloading image"
        );
        match self.fetcher.fetch(url, &destination).await {
            Ok(bytes) => debug!(target: "engine.download", image = number, bytes, "image saved"),
            Err(e) => {
                session.note_failed_download();
                warn!(target: "engine.download", image = number, error = %e, "image download failed");
            }
        }
    }
}
