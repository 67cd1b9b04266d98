use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::fog::FogOfWar;
use crate::geometry::WorldPoint;
use crate::spatial::SpatialGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiKind {
    City,
    Shop,
    Quest,
    Dungeon,
    Npc,
    Waypoint,
    Danger,
}

impl PoiKind {
    pub const ALL: [PoiKind; 7] = [
        PoiKind::City,
        PoiKind::Shop,
        PoiKind::Quest,
        PoiKind::Dungeon,
        PoiKind::Npc,
        PoiKind::Waypoint,
        PoiKind::Danger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoiKind::City => "city",
            PoiKind::Shop => "shop",
            PoiKind::Quest => "quest",
            PoiKind::Dungeon => "dungeon",
            PoiKind::Npc => "npc",
            PoiKind::Waypoint => "waypoint",
            PoiKind::Danger => "danger",
        }
    }

    /// Map glyph drawn inside the marker.
    pub fn glyph(&self) -> &'static str {
        match self {
            PoiKind::City => "C",
            PoiKind::Shop => "$",
            PoiKind::Quest => "!",
            PoiKind::Dungeon => "D",
            PoiKind::Npc => "@",
            PoiKind::Waypoint => "W",
            PoiKind::Danger => "X",
        }
    }

    fn default_fast_travel(&self) -> bool {
        matches!(self, PoiKind::City | PoiKind::Waypoint)
    }
}

impl fmt::Display for PoiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoiKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoiKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown poi type: {s}"))
    }
}

/// Static catalog entry. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PoiKind,
    pub world_position: WorldPoint,
    pub priority_tier: u8,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub quest_linked: bool,
    #[serde(default)]
    pub fast_travel: Option<bool>,
    #[serde(default)]
    pub travel_cost: Option<u64>,
    #[serde(default)]
    pub reveal_radius: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    /// Known from the start of a new game (seeds the fog).
    #[serde(default)]
    pub discovered: bool,
}

impl PoiDef {
    pub fn is_fast_travel_eligible(&self) -> bool {
        self.fast_travel
            .unwrap_or_else(|| self.kind.default_fast_travel())
    }
}

/// Runtime overlay on top of the catalog. Only the reveal path writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoiState {
    pub discovered: bool,
    pub visited: bool,
}

/// Read-only view of a POI: catalog entry plus its current overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poi<'a> {
    pub def: &'a PoiDef,
    pub state: PoiState,
}

impl<'a> Poi<'a> {
    pub fn id(&self) -> &'a str {
        &self.def.id
    }

    pub fn position(&self) -> WorldPoint {
        self.def.world_position
    }

    pub fn tier(&self) -> u8 {
        self.def.priority_tier
    }

    pub fn is_discovered(&self) -> bool {
        self.state.discovered
    }

    pub fn is_visited(&self) -> bool {
        self.state.visited
    }
}

/// What the renderer is allowed to know about a marker. Undiscovered POIs
/// only expose a position and tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerView<'a> {
    Known {
        id: &'a str,
        name: &'a str,
        kind: PoiKind,
        position: WorldPoint,
        tier: u8,
        visited: bool,
        quest_linked: bool,
    },
    Unknown {
        position: WorldPoint,
        tier: u8,
    },
}

impl<'a> From<Poi<'a>> for MarkerView<'a> {
    fn from(poi: Poi<'a>) -> Self {
        if poi.is_discovered() {
            MarkerView::Known {
                id: &poi.def.id,
                name: &poi.def.name,
                kind: poi.def.kind,
                position: poi.def.world_position,
                tier: poi.def.priority_tier,
                visited: poi.state.visited,
                quest_linked: poi.def.quest_linked,
            }
        } else {
            MarkerView::Unknown {
                position: poi.def.world_position,
                tier: poi.def.priority_tier,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogIssue {
    #[error("duplicate poi id {0:?}, later entry skipped")]
    DuplicateId(String),
    #[error("poi with empty id skipped")]
    EmptyId,
    #[error("poi {id:?} position ({x}, {y}) outside the world, entry skipped")]
    OutOfBounds { id: String, x: f64, y: f64 },
    #[error("poi {id:?} priority tier {tier} outside 1..=3, clamped")]
    TierOutOfRange { id: String, tier: u8 },
    #[error("poi {id:?} connects to unknown poi {target:?}, edge dropped")]
    DanglingConnection { id: String, target: String },
    #[error("poi {0:?} connects to itself, edge dropped")]
    SelfConnection(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("catalog parse error: {0}")]
    Parse(String),
}

/// POI catalog with its discovery/visited overlay.
#[derive(Debug, Clone)]
pub struct PoiRegistry {
    defs: Vec<PoiDef>,
    states: Vec<PoiState>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    grid: SpatialGrid,
}

impl Default for PoiRegistry {
    fn default() -> Self {
        Self::build(Vec::new()).0
    }
}

impl PoiRegistry {
    /// Validate and index catalog entries. Problems are returned (and not
    /// fatal): bad entries are skipped or repaired.
    pub fn build(entries: Vec<PoiDef>) -> (Self, Vec<CatalogIssue>) {
        let mut issues = Vec::new();
        let mut defs: Vec<PoiDef> = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());

        for mut def in entries {
            if def.id.is_empty() {
                issues.push(CatalogIssue::EmptyId);
                continue;
            }
            if index.contains_key(&def.id) {
                issues.push(CatalogIssue::DuplicateId(def.id));
                continue;
            }
            let p = def.world_position;
            if !p.x.is_finite() || !p.y.is_finite() || !p.is_normalized() {
                issues.push(CatalogIssue::OutOfBounds {
                    id: def.id,
                    x: p.x,
                    y: p.y,
                });
                continue;
            }
            if !(1..=3).contains(&def.priority_tier) {
                issues.push(CatalogIssue::TierOutOfRange {
                    id: def.id.clone(),
                    tier: def.priority_tier,
                });
                def.priority_tier = def.priority_tier.clamp(1, 3);
            }
            index.insert(def.id.clone(), defs.len());
            defs.push(def);
        }

        // Connections form an undirected graph: an edge listed on either end counts.
        let mut adjacency: Vec<HashSet<usize>> = vec![HashSet::new(); defs.len()];
        for (idx, def) in defs.iter().enumerate() {
            for target in &def.connections {
                match index.get(target) {
                    Some(&t) if t == idx => {
                        issues.push(CatalogIssue::SelfConnection(def.id.clone()));
                    }
                    Some(&t) => {
                        adjacency[idx].insert(t);
                        adjacency[t].insert(idx);
                    }
                    None => issues.push(CatalogIssue::DanglingConnection {
                        id: def.id.clone(),
                        target: target.clone(),
                    }),
                }
            }
        }
        let adjacency = adjacency
            .into_iter()
            .map(|set| {
                let mut v: Vec<usize> = set.into_iter().collect();
                v.sort_unstable();
                v
            })
            .collect();

        let positions: Vec<WorldPoint> = defs.iter().map(|d| d.world_position).collect();
        let states = vec![PoiState::default(); defs.len()];
        let registry = Self {
            grid: SpatialGrid::build(&positions),
            defs,
            states,
            index,
            adjacency,
        };

        for issue in &issues {
            warn!(issue = %issue, "poi catalog issue");
        }
        (registry, issues)
    }

    /// Parse a JSON array of catalog entries.
    pub fn from_json(json: &str) -> Result<(Self, Vec<CatalogIssue>), CatalogError> {
        let entries: Vec<PoiDef> =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Ok(Self::build(entries))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Poi<'_>> {
        self.index.get(id).map(|&idx| self.at(idx))
    }

    pub(crate) fn at(&self, idx: usize) -> Poi<'_> {
        Poi {
            def: &self.defs[idx],
            state: self.states[idx],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Poi<'_>> {
        (0..self.defs.len()).map(|idx| self.at(idx))
    }

    /// Catalog entries flagged as known from the start.
    pub fn initially_discovered(&self) -> impl Iterator<Item = &str> {
        self.defs
            .iter()
            .filter(|d| d.discovered)
            .map(|d| d.id.as_str())
    }

    /// Undirected road edges, each reported once.
    pub fn edges(&self) -> impl Iterator<Item = (Poi<'_>, Poi<'_>)> {
        self.adjacency.iter().enumerate().flat_map(move |(a, targets)| {
            targets
                .iter()
                .filter(move |&&b| b > a)
                .map(move |&b| (self.at(a), self.at(b)))
        })
    }

    pub fn neighbors(&self, id: &str) -> Vec<Poi<'_>> {
        self.index
            .get(id)
            .map(|&idx| self.adjacency[idx].iter().map(|&n| self.at(n)).collect())
            .unwrap_or_default()
    }

    /// POIs within `radius` world units of `center`, nearest first.
    pub fn within(&self, center: WorldPoint, radius: f64) -> Vec<Poi<'_>> {
        self.grid
            .query_radius(center, radius)
            .into_iter()
            .map(|(idx, _)| self.at(idx))
            .collect()
    }

    pub fn nearest(&self, p: WorldPoint) -> Option<Poi<'_>> {
        self.grid.nearest(p).map(|idx| self.at(idx))
    }

    /// Bring the discovered overlay in line with the fog. Discovery is never
    /// written anywhere else.
    pub(crate) fn sync_discovery(&mut self, fog: &FogOfWar) {
        for (def, state) in self.defs.iter().zip(self.states.iter_mut()) {
            state.discovered = fog.is_discovered(&def.id);
        }
    }

    /// Mark POIs within `radius` of `position` as visited. Returns the ids
    /// newly visited.
    pub(crate) fn mark_visited_near(&mut self, position: WorldPoint, radius: f64) -> Vec<String> {
        let hits = self.grid.query_radius(position, radius);
        let mut newly = Vec::new();
        for (idx, _) in hits {
            if !self.states[idx].visited {
                self.states[idx].visited = true;
                newly.push(self.defs[idx].id.clone());
            }
        }
        newly
    }

    pub(crate) fn clear_overlay(&mut self) {
        for state in &mut self.states {
            *state = PoiState::default();
        }
    }

    pub fn discovered_count(&self) -> usize {
        self.states.iter().filter(|s| s.discovered).count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn def(id: &str, kind: PoiKind, x: f64, y: f64, tier: u8) -> PoiDef {
        PoiDef {
            id: id.to_string(),
            name: format!("{id} name"),
            kind,
            world_position: WorldPoint::new(x, y),
            priority_tier: tier,
            connections: Vec::new(),
            quest_linked: false,
            fast_travel: None,
            travel_cost: None,
            reveal_radius: None,
            description: None,
            discovered: false,
        }
    }

    #[test]
    fn parses_camel_case_catalog() {
        let json = r#"[
            {"id":"northgate","name":"Northgate","type":"city","worldPosition":{"x":0.4,"y":0.2},
             "priorityTier":2,"connections":["old-mill"],"questLinked":false},
            {"id":"old-mill","name":"Old Mill","type":"shop","worldPosition":{"x":0.45,"y":0.3},
             "priorityTier":3,"discovered":true}
        ]"#;
        let (registry, issues) = PoiRegistry::from_json(json).expect("catalog parses");
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(registry.len(), 2);
        let ng = registry.get("northgate").expect("northgate present");
        assert_eq!(ng.def.kind, PoiKind::City);
        assert!(ng.def.is_fast_travel_eligible());
        assert!(!registry.get("old-mill").expect("mill").def.is_fast_travel_eligible());
        assert_eq!(registry.initially_discovered().collect::<Vec<_>>(), vec!["old-mill"]);
        assert_eq!(registry.neighbors("old-mill").len(), 1);
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let json = r#"[{"id":"x","name":"X","type":"castle","worldPosition":{"x":0,"y":0},"priorityTier":1}]"#;
        assert!(PoiRegistry::from_json(json).is_err());
    }

    #[test]
    fn invalid_entries_are_reported_and_repaired() {
        let mut a = def("a", PoiKind::City, 0.1, 0.1, 1);
        a.connections = vec!["b".into(), "ghost".into(), "a".into()];
        let b = def("b", PoiKind::Npc, 0.2, 0.2, 7);
        let dup = def("a", PoiKind::Shop, 0.3, 0.3, 1);
        let outside = def("far", PoiKind::Danger, 1.5, 0.3, 1);
        let empty = def("", PoiKind::Danger, 0.5, 0.3, 1);

        let (registry, issues) = PoiRegistry::build(vec![a, b, dup, outside, empty]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("b").expect("b kept").tier(), 3);
        assert_eq!(registry.get("a").expect("first a kept").def.kind, PoiKind::City);
        assert!(issues.contains(&CatalogIssue::DuplicateId("a".into())));
        assert!(issues.contains(&CatalogIssue::EmptyId));
        assert!(issues.contains(&CatalogIssue::SelfConnection("a".into())));
        assert!(issues.contains(&CatalogIssue::TierOutOfRange {
            id: "b".into(),
            tier: 7
        }));
        assert!(issues.iter().any(|i| matches!(i, CatalogIssue::OutOfBounds { id, .. } if id == "far")));
        assert!(issues.iter().any(|i| matches!(i, CatalogIssue::DanglingConnection { target, .. } if target == "ghost")));
        assert_eq!(registry.edges().count(), 1);
    }

    #[test]
    fn edges_are_undirected_and_unique() {
        let mut a = def("a", PoiKind::City, 0.1, 0.1, 1);
        let mut b = def("b", PoiKind::City, 0.2, 0.1, 1);
        let c = def("c", PoiKind::City, 0.3, 0.1, 1);
        a.connections = vec!["b".into()];
        b.connections = vec!["a".into(), "c".into()];
        let (registry, _) = PoiRegistry::build(vec![a, b, c]);
        let edges: Vec<(&str, &str)> = registry.edges().map(|(x, y)| (x.id(), y.id())).collect();
        assert_eq!(edges, vec![("a", "b"), ("b", "c")]);
    }

    #[test]
    fn undiscovered_marker_view_hides_identity() {
        let (mut registry, _) = PoiRegistry::build(vec![def("crypt", PoiKind::Dungeon, 0.5, 0.5, 1)]);
        let view = MarkerView::from(registry.get("crypt").expect("crypt"));
        assert_eq!(
            view,
            MarkerView::Unknown {
                position: WorldPoint::new(0.5, 0.5),
                tier: 1
            }
        );

        let mut fog = FogOfWar::new();
        fog.reveal("crypt");
        registry.sync_discovery(&fog);
        let view = MarkerView::from(registry.get("crypt").expect("crypt"));
        assert!(matches!(view, MarkerView::Known { name: "crypt name", kind: PoiKind::Dungeon, .. }));
    }

    #[test]
    fn visited_marks_only_nearby_pois_once() {
        let (mut registry, _) = PoiRegistry::build(vec![
            def("inn", PoiKind::Shop, 0.5, 0.5, 1),
            def("tower", PoiKind::Danger, 0.9, 0.9, 1),
        ]);
        assert_eq!(registry.mark_visited_near(WorldPoint::new(0.501, 0.5), 0.01), vec!["inn"]);
        assert!(registry.mark_visited_near(WorldPoint::new(0.5, 0.5), 0.01).is_empty());
        assert!(registry.get("inn").expect("inn").is_visited());
        assert!(!registry.get("tower").expect("tower").is_visited());
        registry.clear_overlay();
        assert!(!registry.get("inn").expect("inn").is_visited());
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in PoiKind::ALL {
            assert_eq!(kind.as_str().parse::<PoiKind>(), Ok(kind));
        }
        assert!("castle".parse::<PoiKind>().is_err());
    }
}
