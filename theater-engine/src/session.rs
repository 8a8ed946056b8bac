use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use theater_config::DownloadConfig;
use uuid::Uuid;

use crate::detector::{DuplicateDetector, PositionId};

/// Mutable state of one post's harvest.
///
/// Created at the start of a run and consumed when it finishes; the output
/// directory outlives it for packaging.
#[derive(Debug)]
pub struct HarvestSession {
    id: Uuid,
    output_dir: PathBuf,
    detector: DuplicateDetector,
    image_count: usize,
    consecutive_no_progress: u32,
    failed_downloads: usize,
}

impl HarvestSession {
    /// New session in a fresh `<root>/<id>` directory.
    pub async fn create(root: &Path) -> Result<Self> {
        let id = Uuid::new_v4();
        let output_dir = root.join(id.to_string());
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("failed to create session directory {}", output_dir.display()))?;
        Ok(Self::with_dir(id, output_dir))
    }

    /// Session over an existing directory.
    pub fn with_dir(id: Uuid, output_dir: PathBuf) -> Self {
        Self {
            id,
            output_dir,
            detector: DuplicateDetector::new(),
            image_count: 0,
            consecutive_no_progress: 0,
            failed_downloads: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    pub fn consecutive_no_progress(&self) -> u32 {
        self.consecutive_no_progress
    }

    /// Images counted whose transfer failed.
    pub fn failed_downloads(&self) -> usize {
        self.failed_downloads
    }

    pub fn positions_visited(&self) -> usize {
        self.detector.positions_seen()
    }

    /// `false` when the position was already visited.
    pub fn visit_position(&mut self, position: PositionId) -> bool {
        self.detector.visit_position(position)
    }

    /// Record a displayed image URL. Returns the image's 1-based number when
    /// the URL is new; progress resets.
    pub fn record_image(&mut self, url: &str) -> Option<usize> {
        if !self.detector.record_image(url) {
            return None;
        }
        self.image_count += 1;
        self.consecutive_no_progress = 0;
        debug_assert_eq!(self.image_count, self.detector.images_seen());
        Some(self.image_count)
    }

    /// Count one iteration without a new image; returns the running total.
    pub fn note_no_progress(&mut self) -> u32 {
        self.consecutive_no_progress += 1;
        self.consecutive_no_progress
    }

    pub fn note_failed_download(&mut self) {
        self.failed_downloads += 1;
    }

    pub fn image_path(&self, download: &DownloadConfig, number: usize) -> PathBuf {
        self.output_dir.join(download.file_name(number))
    }
}
