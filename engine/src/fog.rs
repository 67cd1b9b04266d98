use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geometry::{WorldPoint, world_distance};

/// A cosmetic reveal disc recorded alongside an identifier reveal. Only used
/// to soften the fog overlay; discovery logic never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevealCircle {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

impl RevealCircle {
    pub fn new(center: WorldPoint, radius: f64) -> Self {
        Self {
            x: center.x,
            y: center.y,
            r: radius,
        }
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    fn covers(&self, other: &RevealCircle) -> bool {
        world_distance(self.center(), other.center()) + other.r <= self.r
    }
}

/// Explored-area state. The identifier set is authoritative and only ever
/// grows until [`FogOfWar::reset`].
#[derive(Debug, Clone, Default)]
pub struct FogOfWar {
    explored: BTreeSet<String>,
    circles: Vec<RevealCircle>,
    max_circles: Option<usize>,
}

// The circle cap is a runtime setting, not part of the explored state.
impl PartialEq for FogOfWar {
    fn eq(&self, other: &Self) -> bool {
        self.explored == other.explored && self.circles == other.circles
    }
}

impl FogOfWar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of cosmetic reveal circles kept; further circles are
    /// dropped once the cap is reached.
    pub fn with_circle_limit(mut self, limit: usize) -> Self {
        self.max_circles = Some(limit);
        self
    }

    pub(crate) fn set_circle_limit(&mut self, limit: usize) {
        self.max_circles = Some(limit);
    }

    /// Mark `id` as explored. Returns `true` only if the state changed.
    pub fn reveal(&mut self, id: &str) -> bool {
        if id.is_empty() || self.explored.contains(id) {
            return false;
        }
        self.explored.insert(id.to_string())
    }

    /// Record a cosmetic reveal disc. Discs already covered by an existing
    /// disc are ignored. Returns `true` if a disc was added.
    pub fn reveal_area(&mut self, center: WorldPoint, radius: f64) -> bool {
        if !(radius > 0.0) || !center.x.is_finite() || !center.y.is_finite() {
            return false;
        }
        let circle = RevealCircle::new(center, radius);
        if self.circles.iter().any(|c| c.covers(&circle)) {
            return false;
        }
        if let Some(limit) = self.max_circles
            && self.circles.len() >= limit
        {
            return false;
        }
        self.circles.push(circle);
        true
    }

    pub fn is_discovered(&self, id: &str) -> bool {
        self.explored.contains(id)
    }

    pub fn discovered_ids(&self) -> impl Iterator<Item = &str> {
        self.explored.iter().map(String::as_str)
    }

    /// Owned copy of the explored set, for save-game collaborators.
    pub fn explored_set(&self) -> BTreeSet<String> {
        self.explored.clone()
    }

    pub fn circles(&self) -> &[RevealCircle] {
        &self.circles
    }

    pub fn len(&self) -> usize {
        self.explored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.explored.is_empty()
    }

    /// Clear all exploration. Only reachable from an explicit progress reset.
    pub fn reset(&mut self) {
        self.explored.clear();
        self.circles.clear();
    }

    pub(crate) fn from_parts(explored: BTreeSet<String>, circles: Vec<RevealCircle>) -> Self {
        Self {
            explored,
            circles,
            max_circles: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reveal_is_idempotent_and_reports_change_once() {
        let mut fog = FogOfWar::new();
        assert!(fog.reveal("northgate"));
        let once = fog.clone();
        assert!(!fog.reveal("northgate"));
        assert_eq!(fog, once);
        assert!(fog.is_discovered("northgate"));
        assert!(!fog.is_discovered("southmarsh"));
    }

    #[test]
    fn empty_id_is_ignored() {
        let mut fog = FogOfWar::new();
        assert!(!fog.reveal(""));
        assert!(fog.is_empty());
    }

    #[test]
    fn covered_circles_are_deduplicated() {
        let mut fog = FogOfWar::new();
        assert!(fog.reveal_area(WorldPoint::new(0.5, 0.5), 0.1));
        assert!(!fog.reveal_area(WorldPoint::new(0.52, 0.5), 0.05));
        assert!(fog.reveal_area(WorldPoint::new(0.9, 0.9), 0.05));
        assert!(!fog.reveal_area(WorldPoint::new(0.1, 0.1), 0.0));
        assert_eq!(fog.circles().len(), 2);
    }

    #[test]
    fn circle_limit_caps_growth() {
        let mut fog = FogOfWar::new().with_circle_limit(2);
        assert!(fog.reveal_area(WorldPoint::new(0.1, 0.1), 0.01));
        assert!(fog.reveal_area(WorldPoint::new(0.5, 0.5), 0.01));
        assert!(!fog.reveal_area(WorldPoint::new(0.9, 0.9), 0.01));
    }

    #[test]
    fn reset_clears_everything() {
        let mut fog = FogOfWar::new();
        fog.reveal("a");
        fog.reveal_area(WorldPoint::new(0.2, 0.2), 0.1);
        fog.reset();
        assert!(fog.is_empty());
        assert!(fog.circles().is_empty());
    }

    proptest! {
        #[test]
        fn explored_set_never_shrinks(ids in proptest::collection::vec("[a-e]{1,2}", 0..40)) {
            let mut fog = FogOfWar::new();
            let mut last = 0;
            for id in &ids {
                let changed = fog.reveal(id);
                prop_assert!(fog.len() >= last);
                prop_assert_eq!(changed, fog.len() > last);
                prop_assert!(fog.is_discovered(id));
                last = fog.len();
            }
        }
    }
}
