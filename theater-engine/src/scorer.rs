//! Geometric ranking of displayed elements.
//!
//! Small elements on a post page are reliably decorative (icons, emoji,
//! avatars), so the only signal used is rendered size: a width/height floor
//! for entry candidates and an area floor for the photo shown in the viewer.

use anyhow::Result;
use theater_common::document::{BoundingBox, Document};
use theater_config::ScoringConfig;

/// A displayed element together with its rendered size.
#[derive(Debug, Clone)]
pub struct Candidate<E> {
    pub element: E,
    pub bounds: BoundingBox,
}

impl<E> Candidate<E> {
    pub fn area(&self) -> f64 {
        self.bounds.area()
    }
}

#[derive(Debug, Clone)]
pub struct CandidateScorer {
    min_width: f64,
    min_height: f64,
    min_display_area: f64,
}

impl CandidateScorer {
    pub fn new(min_width: f64, min_height: f64, min_display_area: f64) -> Self {
        Self {
            min_width,
            min_height,
            min_display_area,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(
            config.min_candidate_width,
            config.min_candidate_height,
            config.min_display_area,
        )
    }

    /// Visible elements matching `selector` in `scope` that clear the size
    /// floor, largest first. Equal areas keep document order.
    pub async fn rank<D: Document>(
        &self,
        doc: &D,
        selector: &str,
        scope: Option<&D::Element>,
    ) -> Result<Vec<Candidate<D::Element>>> {
        let measured = measure(doc, doc.query(selector, scope).await?).await?;
        Ok(self.rank_measured(measured))
    }

    /// The single largest visible element whose area exceeds the display
    /// floor, or `None`.
    pub async fn largest<D: Document>(
        &self,
        doc: &D,
        selector: &str,
        scope: Option<&D::Element>,
    ) -> Result<Option<Candidate<D::Element>>> {
        let measured = measure(doc, doc.query(selector, scope).await?).await?;
        Ok(self.pick_largest(measured))
    }

    pub fn rank_measured<E>(&self, candidates: Vec<Candidate<E>>) -> Vec<Candidate<E>> {
        let mut ranked: Vec<_> = candidates
            .into_iter()
            .filter(|c| c.bounds.exceeds(self.min_width, self.min_height))
            .collect();
        // stable: ties stay in enumeration order
        ranked.sort_by(|a, b| b.area().total_cmp(&a.area()));
        ranked
    }

    pub fn pick_largest<E>(&self, candidates: Vec<Candidate<E>>) -> Option<Candidate<E>> {
        let mut best: Option<Candidate<E>> = None;
        for candidate in candidates {
            let larger = match &best {
                Some(current) => candidate.area() > current.area(),
                None => true,
            };
            if larger {
                best = Some(candidate);
            }
        }
        best.filter(|c| c.area() > self.min_display_area)
    }
}

impl Default for CandidateScorer {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

/// Visible elements with a layout box, in enumeration order.
async fn measure<D: Document>(
    doc: &D,
    elements: Vec<D::Element>,
) -> Result<Vec<Candidate<D::Element>>> {
    let mut measured = Vec::with_capacity(elements.len());
    for element in elements {
        if !doc.is_visible(&element).await? {
            continue;
        }
        if let Some(bounds) = doc.bounding_box(&element).await? {
            measured.push(Candidate { element, bounds });
        }
    }
    Ok(measured)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: u32, w: f64, h: f64) -> Candidate<u32> {
        Candidate {
            element: id,
            bounds: BoundingBox::new(w, h),
        }
    }

    #[test]
    fn ranking_drops_small_and_sorts_by_area() {
        let scorer = CandidateScorer::default();
        let ranked = scorer.rank_measured(vec![
            c(1, 60.0, 300.0),
            c(2, 100.0, 100.0),
            c(3, 400.0, 300.0),
            c(4, 71.0, 71.0),
        ]);
        let ids: Vec<_> = ranked.iter().map(|c| c.element).collect();
        assert_eq!(ids, vec![3, 2, 4]);
    }

    #[test]
    fn ranking_ties_keep_enumeration_order() {
        let scorer = CandidateScorer::default();
        let ranked = scorer.rank_measured(vec![c(1, 100.0, 200.0), c(2, 200.0, 100.0)]);
        assert_eq!(ranked[0].element, 1);
        assert_eq!(ranked[1].element, 2);
    }

    #[test]
    fn largest_requires_display_floor() {
        let scorer = CandidateScorer::default();
        assert!(scorer.pick_largest(vec![c(1, 100.0, 200.0)]).is_none());
        assert!(scorer.pick_largest(Vec::<Candidate<u32>>::new()).is_none());
        let best = scorer
            .pick_largest(vec![c(1, 100.0, 200.0), c(2, 800.0, 600.0), c(3, 40.0, 40.0)])
            .unwrap();
        assert_eq!(best.element, 2);
    }

    #[test]
    fn largest_tie_goes_to_first_seen() {
        let scorer = CandidateScorer::default();
        let best = scorer
            .pick_largest(vec![c(1, 600.0, 400.0), c(2, 400.0, 600.0)])
            .unwrap();
        assert_eq!(best.element, 1);
    }

    #[test]
    fn area_floor_is_strict() {
        let scorer = CandidateScorer::new(70.0, 70.0, 20_000.0);
        assert!(scorer.pick_largest(vec![c(1, 200.0, 100.0)]).is_none());
        assert!(scorer.pick_largest(vec![c(1, 200.0, 100.5)]).is_some());
    }
}
