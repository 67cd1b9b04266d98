use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::LodConfig;
use crate::geometry::{
    Projection, ScreenPoint, screen_radius_to_world, screen_to_world, world_to_screen,
};
use crate::poi::{Poi, PoiKind, PoiRegistry};

/// Active marker filter chosen in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PoiFilter {
    #[default]
    All,
    Kind(PoiKind),
    QuestLinked,
    FastTravel,
}

impl PoiFilter {
    pub fn matches(&self, poi: &Poi<'_>) -> bool {
        match self {
            PoiFilter::All => true,
            PoiFilter::Kind(kind) => poi.def.kind == *kind,
            PoiFilter::QuestLinked => poi.def.quest_linked,
            PoiFilter::FastTravel => poi.def.is_fast_travel_eligible(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PoiFilter::All => "All",
            PoiFilter::Kind(PoiKind::City) => "Cities",
            PoiFilter::Kind(PoiKind::Shop) => "Shops",
            PoiFilter::Kind(PoiKind::Quest) => "Quests",
            PoiFilter::Kind(PoiKind::Dungeon) => "Dungeons",
            PoiFilter::Kind(PoiKind::Npc) => "NPCs",
            PoiFilter::Kind(PoiKind::Waypoint) => "Waypoints",
            PoiFilter::Kind(PoiKind::Danger) => "Danger",
            PoiFilter::QuestLinked => "Quest-linked",
            PoiFilter::FastTravel => "Fast travel",
        }
    }

    /// Every selectable filter, in toolbar order.
    pub fn options() -> Vec<PoiFilter> {
        let mut out = vec![PoiFilter::All];
        out.extend(PoiKind::ALL.into_iter().map(PoiFilter::Kind));
        out.push(PoiFilter::QuestLinked);
        out.push(PoiFilter::FastTravel);
        out
    }
}

impl fmt::Display for PoiFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoiFilter::All => f.write_str("all"),
            PoiFilter::Kind(kind) => f.write_str(kind.as_str()),
            PoiFilter::QuestLinked => f.write_str("quest-linked"),
            PoiFilter::FastTravel => f.write_str("fast-travel"),
        }
    }
}

impl FromStr for PoiFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "" => Ok(PoiFilter::All),
            "quest-linked" => Ok(PoiFilter::QuestLinked),
            "fast-travel" => Ok(PoiFilter::FastTravel),
            other => other
                .parse::<PoiKind>()
                .map(PoiFilter::Kind)
                .map_err(|_| format!("unknown filter: {other}")),
        }
    }
}

impl From<PoiFilter> for String {
    fn from(filter: PoiFilter) -> Self {
        filter.to_string()
    }
}

impl TryFrom<String> for PoiFilter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The single render/hit-test gate. Both paths go through [`VisibilityPolicy::should_render`].
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityPolicy {
    lod: LodConfig,
}

impl VisibilityPolicy {
    pub fn new(lod: LodConfig) -> Self {
        Self { lod }
    }

    pub fn lod(&self) -> &LodConfig {
        &self.lod
    }

    /// Whether a marker of `tier` passes the level-of-detail gate at `zoom`.
    pub fn tier_visible(&self, tier: u8, zoom: f64) -> bool {
        match tier {
            0 | 1 => true,
            2 => zoom > self.lod.medium,
            _ => zoom > self.lod.high,
        }
    }

    pub fn should_render(&self, poi: &Poi<'_>, projection: &Projection, filter: PoiFilter) -> bool {
        poi.is_discovered()
            && filter.matches(poi)
            && self.tier_visible(poi.tier(), projection.zoom())
    }

    pub fn should_label(&self, poi: &Poi<'_>, projection: &Projection) -> bool {
        poi.is_discovered() && (poi.tier() <= 1 || projection.zoom() > self.lod.label_detail)
    }

    /// The visible POI under a screen position, if any. Closest marker
    /// within the hit radius wins.
    pub fn poi_at<'r>(
        &self,
        registry: &'r PoiRegistry,
        projection: &Projection,
        filter: PoiFilter,
        screen: ScreenPoint,
    ) -> Option<Poi<'r>> {
        let radius_px = self.lod.hit_radius_px;
        let center = screen_to_world(screen, projection);
        let world_radius = screen_radius_to_world(radius_px, projection);

        registry
            .within(center, world_radius)
            .into_iter()
            .filter(|poi| self.should_render(poi, projection, filter))
            .map(|poi| {
                let d = world_to_screen(poi.position(), projection).distance_to(screen);
                (poi, d)
            })
            .filter(|(_, d)| *d <= radius_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(poi, _)| poi)
    }
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::new(LodConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::config::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};
    use crate::fog::FogOfWar;
    use crate::geometry::{Size, WorldPoint};
    use crate::poi::tests::def;

    fn projection_at(zoom: f64) -> Projection {
        Projection::new(
            zoom,
            ScreenPoint::new(0.0, 0.0),
            Size::new(2048.0, 1536.0),
            Size::new(1280.0, 800.0),
        )
        .expect("valid projection")
    }

    fn registry(discovered: &[&str]) -> PoiRegistry {
        let mut quest = def("shrine", PoiKind::Quest, 0.3, 0.3, 1);
        quest.quest_linked = true;
        let (mut registry, _) = PoiRegistry::build(vec![
            def("capital", PoiKind::City, 0.1, 0.1, 1),
            def("northgate", PoiKind::City, 0.2, 0.1, 2),
            def("hut", PoiKind::Npc, 0.25, 0.15, 3),
            quest,
        ]);
        let mut fog = FogOfWar::new();
        for id in discovered {
            fog.reveal(id);
        }
        registry.sync_discovery(&fog);
        registry
    }

    #[test]
    fn tier_three_needs_high_zoom() {
        let policy = VisibilityPolicy::default();
        assert!(!policy.tier_visible(3, 1.0));
        assert!(policy.tier_visible(3, 2.5));
        assert!(!policy.tier_visible(3, 2.0));
        assert!(!policy.tier_visible(2, 1.2));
        assert!(policy.tier_visible(2, 1.21));
        assert!(policy.tier_visible(1, 0.5));
    }

    #[test]
    fn undiscovered_never_renders() {
        let reg = registry(&[]);
        let policy = VisibilityPolicy::default();
        let capital = reg.get("capital").expect("capital");
        assert!(!policy.should_render(&capital, &projection_at(4.0), PoiFilter::All));
    }

    proptest! {
        #[test]
        fn undiscovered_quest_marker_stays_hidden(
            zoom in DEFAULT_MIN_ZOOM..=DEFAULT_MAX_ZOOM,
            filter in proptest::sample::select(PoiFilter::options()),
        ) {
            let reg = registry(&["capital", "northgate", "hut"]);
            let policy = VisibilityPolicy::default();
            let p = projection_at(zoom);
            let shrine = reg.get("shrine").expect("shrine");
            prop_assert!(!policy.should_render(&shrine, &p, filter));
            prop_assert!(!policy.should_label(&shrine, &p));
            let at = world_to_screen(shrine.position(), &p);
            let hit = policy.poi_at(&reg, &p, filter, at);
            prop_assert!(hit.is_none_or(|poi| poi.id() != "shrine"));
        }
    }

    #[test]
    fn filters_gate_by_type_and_flag() {
        let reg = registry(&["capital", "shrine"]);
        let policy = VisibilityPolicy::default();
        let p = projection_at(1.0);
        let capital = reg.get("capital").expect("capital");
        let shrine = reg.get("shrine").expect("shrine");
        assert!(policy.should_render(&capital, &p, PoiFilter::Kind(PoiKind::City)));
        assert!(!policy.should_render(&shrine, &p, PoiFilter::Kind(PoiKind::City)));
        assert!(policy.should_render(&shrine, &p, PoiFilter::QuestLinked));
        assert!(!policy.should_render(&capital, &p, PoiFilter::QuestLinked));
        assert!(policy.should_render(&capital, &p, PoiFilter::FastTravel));
        assert!(!policy.should_render(&shrine, &p, PoiFilter::FastTravel));
    }

    #[test]
    fn northgate_appears_past_medium_zoom_and_is_clickable() {
        let reg = registry(&["northgate"]);
        let policy = VisibilityPolicy::default();
        let northgate = reg.get("northgate").expect("northgate");

        let low = projection_at(1.0);
        assert!(!policy.should_render(&northgate, &low, PoiFilter::All));
        let at = world_to_screen(northgate.position(), &low);
        assert!(policy.poi_at(&reg, &low, PoiFilter::All, at).is_none());

        let high = projection_at(1.5);
        assert!(policy.should_render(&northgate, &high, PoiFilter::All));
        let at = world_to_screen(northgate.position(), &high);
        let hit = policy.poi_at(&reg, &high, PoiFilter::All, at).expect("hit");
        assert_eq!(hit.id(), "northgate");
    }

    #[test]
    fn closest_marker_wins() {
        let reg = registry(&["capital", "northgate", "hut"]);
        let policy = VisibilityPolicy::default();
        let p = projection_at(3.0);
        let hut = world_to_screen(WorldPoint::new(0.25, 0.15), &p);
        let near_hut = ScreenPoint::new(hut.x + 3.0, hut.y);
        let hit = policy.poi_at(&reg, &p, PoiFilter::All, near_hut).expect("hit");
        assert_eq!(hit.id(), "hut");
        let miss = ScreenPoint::new(hut.x + 40.0, hut.y + 40.0);
        assert!(policy.poi_at(&reg, &p, PoiFilter::All, miss).is_none());
    }

    #[test]
    fn labels_follow_detail_threshold() {
        let reg = registry(&["capital", "northgate"]);
        let policy = VisibilityPolicy::default();
        let northgate = reg.get("northgate").expect("northgate");
        let capital = reg.get("capital").expect("capital");
        assert!(policy.should_label(&capital, &projection_at(0.5)));
        assert!(!policy.should_label(&northgate, &projection_at(1.4)));
        assert!(policy.should_label(&northgate, &projection_at(1.6)));
    }

    #[test]
    fn filter_strings_round_trip() {
        for filter in PoiFilter::options() {
            assert_eq!(filter.to_string().parse::<PoiFilter>(), Ok(filter));
        }
        assert!("castles".parse::<PoiFilter>().is_err());
        let json = serde_json::to_string(&PoiFilter::FastTravel).expect("serializes");
        assert_eq!(json, "\"fast-travel\"");
    }
}
