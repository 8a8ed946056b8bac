//! Carousel discovery and traversal.
//!
//! The engine drives any [`Document`](theater_common::document::Document)
//! through a post's photo viewer:
//!
//! - [`scorer`]: ranks displayed elements by rendered area
//! - [`viewer`]: detects the viewer and clicks candidates until it opens
//! - [`detector`] and [`session`]: revisit detection and per-run state
//! - [`advance`]: the ordered ladder of ways to move to the next photo
//! - [`traversal`]: the extraction/advancement state machine
//! - [`harvester`]: navigation, login-wall check, entry, traversal, report
//!
//! Everything is sequential; one run owns one document exclusively.

use std::time::Duration;

pub mod advance;
pub mod detector;
pub mod harvester;
pub mod scorer;
pub mod session;
pub mod traversal;
pub mod viewer;

pub use advance::{AdvanceLadder, AdvanceStrategy, EdgeClick, KeyboardNudge, NextControl};
pub use detector::{DuplicateDetector, PositionId};
pub use harvester::{HarvestOutcome, HarvestReport, Harvester};
pub use scorer::{Candidate, CandidateScorer};
pub use session::HarvestSession;
pub use traversal::{CarouselTraversal, Termination, TraversalState, TraversalSummary};
pub use viewer::{EntryOutcome, EntrySequencer, ViewerProbe};

/// Fixed settle wait; zero skips the timer entirely.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
