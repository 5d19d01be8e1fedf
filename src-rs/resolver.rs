//! Match Resolver: narrows scored detections to exactly one click target
//! using positional constraints relative to landmark labels.

use tracing::debug;

use crate::error::NavError;
use crate::geometry::{BoundingBox, ResolvedLocation};
use crate::locator::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Left edge strictly left of the anchor's left edge.
    LeftOf { anchor_left: i32 },
    /// Center within `tolerance` pixels of the anchor's center row.
    AlignedWith { anchor_y: i32, tolerance: i32 },
}

impl Constraint {
    pub fn left_of(anchor: &BoundingBox) -> Self {
        Constraint::LeftOf {
            anchor_left: anchor.left(),
        }
    }

    pub fn aligned_with(anchor: &BoundingBox, tolerance: i32) -> Self {
        Constraint::AlignedWith {
            anchor_y: anchor.center().1,
            tolerance,
        }
    }

    pub fn admits(&self, bbox: &BoundingBox) -> bool {
        match *self {
            Constraint::LeftOf { anchor_left } => bbox.left() < anchor_left,
            Constraint::AlignedWith {
                anchor_y,
                tolerance,
            } => (bbox.center().1 - anchor_y).abs() <= tolerance,
        }
    }
}

/// Highest-scoring candidate that satisfies `constraint`; the earliest one wins ties.
pub fn resolve(
    target: &str,
    candidates: &[Detection],
    constraint: Option<Constraint>,
) -> Result<ResolvedLocation, NavError> {
    if candidates.is_empty() {
        return Err(NavError::not_found(target, "no text recognized on screen"));
    }

    let mut best: Option<&Detection> = None;
    for candidate in candidates {
        if let Some(c) = constraint {
            if !c.admits(&candidate.bbox) {
                continue;
            }
        }
        if best.map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    let chosen = best.ok_or_else(|| {
        NavError::not_found(
            target,
            format!(
                "{} candidate(s) rejected by {:?}",
                candidates.len(),
                constraint
            ),
        )
    })?;
    debug!(target_text = target, matched = %chosen.text, score = chosen.score, "resolved target");
    Ok(ResolvedLocation::at_center(chosen.bbox))
}

/// Landmark labels whose boxes are looked up once per population run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Chosen,
    Fortification,
    OnMap,
}

/// Cache slot for [`Anchor`] boxes. Nothing invalidates entries on screen
/// changes; callers clear it at the start of a run.
#[derive(Debug, Default, Clone)]
pub struct AnchorCache {
    chosen: Option<BoundingBox>,
    fortification: Option<BoundingBox>,
    on_map: Option<BoundingBox>,
}

impl AnchorCache {
    fn slot(&mut self, anchor: Anchor) -> &mut Option<BoundingBox> {
        match anchor {
            Anchor::Chosen => &mut self.chosen,
            Anchor::Fortification => &mut self.fortification,
            Anchor::OnMap => &mut self.on_map,
        }
    }

    #[cfg(test)]
    pub fn get(&self, anchor: Anchor) -> Option<BoundingBox> {
        match anchor {
            Anchor::Chosen => self.chosen,
            Anchor::Fortification => self.fortification,
            Anchor::OnMap => self.on_map,
        }
    }

    /// Cached box, or run `lookup` once and remember its result. A failed
    /// lookup leaves the slot empty.
    pub fn get_or_resolve(
        &mut self,
        anchor: Anchor,
        lookup: impl FnOnce() -> Result<BoundingBox, NavError>,
    ) -> Result<BoundingBox, NavError> {
        let slot = self.slot(anchor);
        if let Some(bbox) = *slot {
            return Ok(bbox);
        }
        let bbox = lookup()?;
        debug!(?anchor, ?bbox, "anchor cached");
        *slot = Some(bbox);
        Ok(bbox)
    }

    pub fn clear(&mut self) {
        *self = AnchorCache::default();
    }
}
