use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use theater_common::document::Document;
use theater_common::fetch::ImageFetcher;
use theater_config::{TheaterConfig, ValidationError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::pause;
use crate::scorer::CandidateScorer;
use crate::session::HarvestSession;
use crate::traversal::{CarouselTraversal, Termination};
use crate::viewer::{EntryOutcome, EntrySequencer};

pub const LOGIN_WALL_SCREENSHOT: &str = "debug_login_wall.png";
pub const FAILED_ENTRY_SCREENSHOT: &str = "debug_failed_click.png";
pub const UNREADABLE_PAGE_SCREENSHOT: &str = "debug_unreadable_page.png";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HarvestOutcome {
    /// The viewer opened and traversal ran to a terminal state.
    Completed { termination: Termination },
    /// The page asked for a login; nothing was scanned.
    AuthWall,
    ViewerNotOpened { attempts: usize },
}

/// What one run produced. Zero images is a normal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub session_id: Uuid,
    pub post_url: String,
    pub output_dir: PathBuf,
    pub image_count: usize,
    pub failed_downloads: usize,
    pub positions_visited: usize,
    pub iterations: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: HarvestOutcome,
}

impl HarvestReport {
    pub fn found_images(&self) -> bool {
        self.image_count > 0
    }
}

/// Drives one post from navigation to a terminal outcome.
pub struct Harvester<F> {
    config: TheaterConfig,
    scorer: CandidateScorer,
    position_pattern: Regex,
    fetcher: F,
}

impl<F: ImageFetcher> Harvester<F> {
    pub fn new(config: TheaterConfig, fetcher: F) -> Result<Self, ValidationError> {
        config.validate()?;
        let position_pattern = config.matchers.position_regex()?;
        Ok(Self {
            scorer: CandidateScorer::from_config(&config.scoring),
            config,
            position_pattern,
            fetcher,
        })
    }

    /// Navigate to `post_url`, enter the viewer and traverse it.
    ///
    /// `Err` is reserved for failures that leave nothing to report, such as
    /// an unreadable page title. A diagnostic screenshot is attempted first.
    pub async fn run<D: Document>(
        &self,
        doc: &D,
        post_url: &str,
        mut session: HarvestSession,
    ) -> Result<HarvestReport> {
        let started_at = Utc::now();
        let pauses = &self.config.traversal.pauses;
        info!(
            target: "engine.harvest",
            session_id = %session.id(),
            output_dir = %session.output_dir().display(),
            "harvest started"
        );

        if let Err(e) = doc.navigate(post_url).await {
            warn!(target: "engine.harvest", error = %format!("{e:#}"), "navigation did not settle, continuing");
        }
        pause(pauses.after_navigation()).await;

        let mut iterations = 0;
        let behind_login_wall = match self.behind_login_wall(doc).await {
            Ok(walled) => walled,
            Err(e) => {
                warn!(target: "engine.harvest", error = %format!("{e:#}"), "page is not observable");
                self.diagnostic(doc, &session, UNREADABLE_PAGE_SCREENSHOT).await;
                return Err(e);
            }
        };
        let outcome = if behind_login_wall {
            warn!(target: "engine.harvest", "login wall detected; cookies may be missing or expired");
            self.diagnostic(doc, &session, LOGIN_WALL_SCREENSHOT).await;
            HarvestOutcome::AuthWall
        } else {
            let entry = EntrySequencer::new(
                &self.scorer,
                &self.config.scoring,
                &self.config.matchers,
                pauses,
            )
            .enter(doc)
            .await;
            match entry {
                Ok(EntryOutcome::NotOpened { attempts }) => {
                    self.diagnostic(doc, &session, FAILED_ENTRY_SCREENSHOT).await;
                    HarvestOutcome::ViewerNotOpened { attempts }
                }
                Ok(_) => {
                    let summary =
                        CarouselTraversal::new(&self.config, &self.scorer, &self.position_pattern, &self.fetcher)
                            .run(doc, &mut session)
                            .await;
                    iterations = summary.iterations;
                    HarvestOutcome::Completed {
                        termination: summary.termination,
                    }
                }
                Err(e) => {
                    warn!(target: "engine.harvest", error = %format!("{e:#}"), "viewer entry failed");
                    self.diagnostic(doc, &session, FAILED_ENTRY_SCREENSHOT).await;
                    HarvestOutcome::ViewerNotOpened { attempts: 0 }
                }
            }
        };

        let report = HarvestReport {
            session_id: session.id(),
            post_url: post_url.to_string(),
            output_dir: session.output_dir().to_path_buf(),
            image_count: session.image_count(),
            failed_downloads: session.failed_downloads(),
            positions_visited: session.positions_visited(),
            iterations,
            started_at,
            finished_at: Utc::now(),
            outcome,
        };
        info!(
            target: "engine.harvest",
            session_id = %report.session_id,
            images = report.image_count,
            failed = report.failed_downloads,
            outcome = ?report.outcome,
            "harvest finished"
        );
        Ok(report)
    }

    async fn behind_login_wall<D: Document>(&self, doc: &D) -> Result<bool> {
        let title = doc
            .title()
            .await
            .context("could not read the page title")?
            .to_lowercase();
        Ok(self
            .config
            .matchers
            .login_title_markers
            .iter()
            .any(|marker| title.contains(&marker.to_lowercase())))
    }

    async fn diagnostic<D: Document>(&self, doc: &D, session: &HarvestSession, name: &str) {
        let path = session.output_dir().join(name);
        if let Err(e) = doc.screenshot(&path).await {
            warn!(target: "engine.harvest", path = %path.display(), error = %e, "diagnostic screenshot failed");
        }
    }
}
