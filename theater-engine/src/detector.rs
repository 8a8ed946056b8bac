//! Revisit detection for the carousel.
//!
//! Two independent identity sets: the viewer position (derived from the
//! location) and the displayed image URL. A location signal can be unstable or
//! absent for some photos, and some positions legitimately redisplay a cached
//! resource, so neither set is sufficient alone.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;

/// Identifier of the photo the viewer currently shows.
///
/// The first capture group of the position pattern when it matches, else the
/// raw location. Only meaningful within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PositionId(String);

impl PositionId {
    pub fn from_location(location: &str, pattern: &Regex) -> Self {
        let id = pattern
            .captures(location)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(location);
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exact-match membership sets; no normalization is applied.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    seen_image_urls: HashSet<String>,
    seen_position_ids: HashSet<PositionId>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a position; `false` when it was already visited.
    pub fn visit_position(&mut self, position: PositionId) -> bool {
        self.seen_position_ids.insert(position)
    }

    /// Record an image URL; `false` when it was already seen.
    pub fn record_image(&mut self, url: &str) -> bool {
        if self.seen_image_urls.contains(url) {
            return false;
        }
        self.seen_image_urls.insert(url.to_string())
    }

    pub fn images_seen(&self) -> usize {
        self.seen_image_urls.len()
    }

    pub fn positions_seen(&self) -> usize {
        self.seen_position_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fbid() -> Regex {
        Regex::new(r"[?&]fbid=(\d+)").unwrap()
    }

    #[test]
    fn position_prefers_embedded_id() {
        let id = PositionId::from_location(
            "https://www.facebook.com/photo/?fbid=1234567&set=pcb.42",
            &fbid(),
        );
        assert_eq!(id.as_str(), "1234567");

        let set_first = PositionId::from_location("https://x.test/photo.php?set=a&fbid=99", &fbid());
        assert_eq!(set_first.as_str(), "99");
    }

    #[test]
    fn position_falls_back_to_location() {
        let raw = "https://www.facebook.com/groups/1/posts/2";
        assert_eq!(PositionId::from_location(raw, &fbid()).as_str(), raw);
    }

    #[test]
    fn membership_is_exact() {
        let mut d = DuplicateDetector::new();
        assert!(d.record_image("https://cdn.test/A.jpg"));
        assert!(!d.record_image("https://cdn.test/A.jpg"));
        assert!(d.record_image("https://cdn.test/a.jpg"));
        assert_eq!(d.images_seen(), 2);

        assert!(d.visit_position(PositionId("1".into())));
        assert!(!d.visit_position(PositionId("1".into())));
        assert_eq!(d.positions_seen(), 1);
    }
}
