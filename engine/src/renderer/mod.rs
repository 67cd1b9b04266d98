mod fog_layer;
pub mod minimap;
pub mod terrain;

use serde::Serialize;
use tracing::warn;

use crate::colors::{brighten, kind_color, pulse, rgba_css};
use crate::config::MapConfig;
use crate::fog::FogOfWar;
use crate::geometry::{
    Projection, ScreenPoint, Size, WorldPoint, WorldRect, visible_world_rect, world_to_screen,
};
use crate::poi::{MarkerView, PoiRegistry};
use crate::visibility::{PoiFilter, VisibilityPolicy};

pub use minimap::{MinimapLayout, minimap_hit};
pub use terrain::{Decoration, DecorationKind};

const BACKGROUND: &str = "#0c0e17";
const LAND: &str = "#1d2b24";
const COAST: &str = "rgba(120, 160, 140, 0.35)";
const ROAD: &str = "rgba(220, 200, 150, 0.55)";
const QUEST_PATH: &str = "rgba(168, 85, 247, 0.75)";
const LABEL: &str = "#e8e4d8";
const PLAYER: &str = "#f5c542";
const QUEST_PULSE_MS: f64 = 1600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
    /// Dash and gap length in pixels, solid when `None`.
    pub dash: Option<(f64, f64)>,
}

impl Stroke {
    pub fn solid(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
            dash: None,
        }
    }

    pub fn dashed(color: impl Into<String>, width: f64, dash: f64, gap: f64) -> Self {
        Self {
            color: color.into(),
            width,
            dash: Some((dash, gap)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: String,
    pub size_px: f64,
    pub bold: bool,
    pub align: TextAlign,
}

impl TextStyle {
    pub fn new(color: impl Into<String>, size_px: f64) -> Self {
        Self {
            color: color.into(),
            size_px,
            bold: false,
            align: TextAlign::Center,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn left(mut self) -> Self {
        self.align = TextAlign::Left;
        self
    }
}

/// Drawing surface. The browser client backs this with a 2D canvas context;
/// tests record the calls.
pub trait Painter {
    fn clear(&mut self, size: Size, color: &str);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, stroke: &Stroke);
    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, stroke: &Stroke);
    fn fill_circle(&mut self, center: ScreenPoint, radius: f64, color: &str);
    fn stroke_circle(&mut self, center: ScreenPoint, radius: f64, stroke: &Stroke);
    fn polygon(&mut self, points: &[ScreenPoint], color: &str);
    fn text(&mut self, text: &str, at: ScreenPoint, style: &TextStyle);
}

/// User-toggleable layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_labels: bool,
    pub show_paths: bool,
    pub show_minimap: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_labels: true,
            show_paths: true,
            show_minimap: true,
        }
    }
}

/// Immutable, frame-local scene input snapshot.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub projection: &'a Projection,
    pub registry: &'a PoiRegistry,
    pub fog: &'a FogOfWar,
    pub policy: &'a VisibilityPolicy,
    pub config: &'a MapConfig,
    pub filter: PoiFilter,
    pub player: WorldPoint,
    pub selected: Option<&'a str>,
    pub options: RenderOptions,
    pub now_ms: f64,
}

/// Per-frame counters for diagnostics and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub decorations_drawn: u32,
    pub edges_drawn: u32,
    pub markers_drawn: u32,
    pub labels_drawn: u32,
    pub placeholders_drawn: u32,
    pub quest_paths_drawn: u32,
    pub fog_cells: u32,
    pub minimap_drawn: bool,
}

#[derive(Debug, Default)]
pub struct MapRenderer {
    warned_missing_surface: bool,
    terrain: Vec<Decoration>,
    terrain_key: Option<(u32, usize)>,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw one frame. With no surface this is a no-op that logs once.
    pub fn render(&mut self, painter: Option<&mut dyn Painter>, scene: &Scene<'_>) -> Option<FrameStats> {
        let Some(painter) = painter else {
            if !self.warned_missing_surface {
                self.warned_missing_surface = true;
                warn!("map canvas unavailable, skipping render");
            }
            return None;
        };
        self.warned_missing_surface = false;

        let mut stats = FrameStats::default();
        let projection = scene.projection;
        let visible = visible_world_rect(projection).inflate(0.02);

        painter.clear(projection.viewport(), BACKGROUND);
        draw_land(painter, projection);
        stats.decorations_drawn = self.draw_terrain(painter, scene, &visible);

        if scene.options.show_paths {
            stats.edges_drawn = draw_edges(painter, scene, &visible);
        }
        let (markers, labels) = draw_markers(painter, scene, &visible);
        stats.markers_drawn = markers;
        stats.labels_drawn = labels;
        stats.quest_paths_drawn = draw_quest_paths(painter, scene);
        draw_player(painter, scene);

        stats.fog_cells = fog_layer::draw(painter, scene, &visible);
        stats.placeholders_drawn = draw_placeholders(painter, scene, &visible);

        if scene.options.show_minimap
            && let Some(layout) =
                MinimapLayout::place(projection.viewport(), &scene.config.minimap)
        {
            minimap::draw(painter, scene, &layout);
            stats.minimap_drawn = true;
        }
        Some(stats)
    }

    fn draw_terrain(&mut self, painter: &mut dyn Painter, scene: &Scene<'_>, visible: &WorldRect) -> u32 {
        let key = (scene.config.world.seed, scene.config.world.decoration_count);
        if self.terrain_key != Some(key) {
            self.terrain = terrain::generate(key.0, key.1);
            self.terrain_key = Some(key);
        }
        let mut drawn = 0;
        for deco in self.terrain.iter().filter(|d| visible.contains(d.position)) {
            terrain::draw(painter, deco, scene.projection);
            drawn += 1;
        }
        drawn
    }
}

fn draw_land(painter: &mut dyn Painter, projection: &Projection) {
    let tl = world_to_screen(WorldPoint::new(0.0, 0.0), projection);
    let br = world_to_screen(WorldPoint::new(1.0, 1.0), projection);
    painter.fill_rect(tl.x, tl.y, br.x - tl.x, br.y - tl.y, LAND);
    painter.stroke_rect(tl.x, tl.y, br.x - tl.x, br.y - tl.y, &Stroke::solid(COAST, 2.0));
}

fn segment_visible(a: WorldPoint, b: WorldPoint, visible: &WorldRect) -> bool {
    let bounds = WorldRect {
        min_x: a.x.min(b.x),
        min_y: a.y.min(b.y),
        max_x: a.x.max(b.x),
        max_y: a.y.max(b.y),
    };
    bounds.intersects(visible)
}

/// Roads are drawn only when both ends are discovered.
fn draw_edges(painter: &mut dyn Painter, scene: &Scene<'_>, visible: &WorldRect) -> u32 {
    let stroke = Stroke::dashed(ROAD, 2.0, 6.0, 4.0);
    let mut drawn = 0;
    for (a, b) in scene.registry.edges() {
        if !a.is_discovered() || !b.is_discovered() {
            continue;
        }
        if !segment_visible(a.position(), b.position(), visible) {
            continue;
        }
        painter.line(
            world_to_screen(a.position(), scene.projection),
            world_to_screen(b.position(), scene.projection),
            &stroke,
        );
        drawn += 1;
    }
    drawn
}

pub(crate) fn marker_radius(tier: u8) -> f64 {
    match tier {
        0 | 1 => 9.0,
        2 => 7.0,
        _ => 5.5,
    }
}

fn draw_markers(painter: &mut dyn Painter, scene: &Scene<'_>, visible: &WorldRect) -> (u32, u32) {
    let mut markers = 0;
    let mut labels = 0;
    let pulse_t = pulse(scene.now_ms, QUEST_PULSE_MS);

    for poi in scene.registry.iter() {
        if !scene.policy.should_render(&poi, scene.projection, scene.filter)
            || !visible.contains(poi.position())
        {
            continue;
        }
        let MarkerView::Known {
            id,
            name,
            kind,
            position,
            tier,
            visited,
            quest_linked,
        } = MarkerView::from(poi)
        else {
            continue;
        };
        let at = world_to_screen(position, scene.projection);
        let radius = marker_radius(tier);
        let (r, g, b) = kind_color(kind);
        let (r, g, b) = if visited { brighten(r, g, b, 1.25) } else { (r, g, b) };

        if quest_linked {
            let ring = radius + 4.0 + 6.0 * pulse_t;
            painter.stroke_circle(
                at,
                ring,
                &Stroke::solid(rgba_css(168, 85, 247, 0.9 * (1.0 - pulse_t)), 2.0),
            );
        }
        if scene.selected == Some(id) {
            painter.stroke_circle(at, radius + 3.0, &Stroke::solid(PLAYER, 2.0));
        }
        painter.fill_circle(at, radius, &rgba_css(r, g, b, 1.0));
        painter.stroke_circle(at, radius, &Stroke::solid("rgba(0, 0, 0, 0.6)", 1.5));
        painter.text(
            kind.glyph(),
            ScreenPoint::new(at.x, at.y + radius * 0.4),
            &TextStyle::new("#10131c", radius * 1.1).bold(),
        );
        markers += 1;

        if scene.options.show_labels && scene.policy.should_label(&poi, scene.projection) {
            painter.text(
                name,
                ScreenPoint::new(at.x, at.y + radius + 13.0),
                &TextStyle::new(LABEL, if tier <= 1 { 13.0 } else { 11.0 }),
            );
            labels += 1;
        }
    }
    (markers, labels)
}

/// Highlighted route from the player to every visible quest-linked marker.
fn draw_quest_paths(painter: &mut dyn Painter, scene: &Scene<'_>) -> u32 {
    let from = world_to_screen(scene.player, scene.projection);
    let stroke = Stroke::dashed(QUEST_PATH, 2.5, 10.0, 6.0);
    let mut drawn = 0;
    for poi in scene.registry.iter().filter(|p| p.def.quest_linked) {
        if !scene.policy.should_render(&poi, scene.projection, scene.filter) {
            continue;
        }
        painter.line(from, world_to_screen(poi.position(), scene.projection), &stroke);
        drawn += 1;
    }
    drawn
}

fn draw_player(painter: &mut dyn Painter, scene: &Scene<'_>) {
    let at = world_to_screen(scene.player, scene.projection);
    painter.fill_circle(at, 11.0, "rgba(245, 197, 66, 0.25)");
    painter.polygon(
        &[
            ScreenPoint::new(at.x, at.y - 8.0),
            ScreenPoint::new(at.x + 6.0, at.y + 6.0),
            ScreenPoint::new(at.x, at.y + 3.0),
            ScreenPoint::new(at.x - 6.0, at.y + 6.0),
        ],
        PLAYER,
    );
}

/// Undiscovered POIs connected to a discovered one show as unnamed "?"
/// markers above the fog. Nothing about them is interactive.
fn draw_placeholders(painter: &mut dyn Painter, scene: &Scene<'_>, visible: &WorldRect) -> u32 {
    let style = TextStyle::new("rgba(232, 228, 216, 0.8)", 11.0).bold();
    let mut drawn = 0;
    for poi in scene.registry.iter() {
        let MarkerView::Unknown { position, tier } = MarkerView::from(poi) else {
            continue;
        };
        if !visible.contains(position)
            || !scene.policy.tier_visible(tier, scene.projection.zoom())
            || !scene
                .registry
                .neighbors(poi.id())
                .iter()
                .any(|n| n.is_discovered())
        {
            continue;
        }
        let at = world_to_screen(position, scene.projection);
        painter.fill_circle(at, 7.0, "rgba(40, 44, 60, 0.85)");
        painter.stroke_circle(at, 7.0, &Stroke::dashed("rgba(232, 228, 216, 0.5)", 1.0, 2.0, 2.0));
        painter.text("?", ScreenPoint::new(at.x, at.y + 4.0), &style);
        drawn += 1;
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ScreenPoint;
    use crate::poi::PoiKind;
    use crate::poi::tests::def;
    use crate::testing::{PaintOp, RecordingPainter};

    struct World {
        registry: PoiRegistry,
        fog: FogOfWar,
        policy: VisibilityPolicy,
        config: MapConfig,
        projection: Projection,
    }

    impl World {
        fn new(discovered: &[&str], zoom: f64) -> Self {
            let mut a = def("alderton", PoiKind::City, 0.40, 0.40, 1);
            a.connections = vec!["brook".into(), "cairn".into()];
            let b = def("brook", PoiKind::Shop, 0.45, 0.42, 1);
            let mut c = def("cairn", PoiKind::Dungeon, 0.50, 0.38, 1);
            c.quest_linked = true;
            let (mut registry, _) = PoiRegistry::build(vec![a, b, c]);
            let mut fog = FogOfWar::new();
            for id in discovered {
                fog.reveal(id);
            }
            registry.sync_discovery(&fog);
            let config = MapConfig::default();
            let projection = Projection::new(
                zoom,
                ScreenPoint::new(-200.0, -100.0),
                Size::new(2048.0, 1536.0),
                Size::new(1280.0, 800.0),
            )
            .expect("valid projection");
            Self {
                registry,
                fog,
                policy: VisibilityPolicy::default(),
                config,
                projection,
            }
        }

        fn scene(&self) -> Scene<'_> {
            Scene {
                projection: &self.projection,
                registry: &self.registry,
                fog: &self.fog,
                policy: &self.policy,
                config: &self.config,
                filter: PoiFilter::All,
                player: WorldPoint::new(0.42, 0.41),
                selected: None,
                options: RenderOptions::default(),
                now_ms: 0.0,
            }
        }
    }

    #[test]
    fn missing_surface_is_a_no_op() {
        let world = World::new(&["alderton"], 1.0);
        let mut renderer = MapRenderer::new();
        assert_eq!(renderer.render(None, &world.scene()), None);
        assert_eq!(renderer.render(None, &world.scene()), None);
    }

    #[test]
    fn unknown_pois_never_leak_names() {
        let world = World::new(&["alderton"], 1.0);
        let mut painter = RecordingPainter::default();
        let stats = MapRenderer::new()
            .render(Some(&mut painter), &world.scene())
            .expect("frame drawn");
        let texts = painter.texts();
        assert!(texts.contains(&"alderton name".to_string()));
        assert!(!texts.iter().any(|t| t.contains("brook") || t.contains("cairn")));
        // Dungeon and shop glyphs must not appear for undiscovered POIs.
        assert!(!texts.contains(&"D".to_string()));
        assert!(!texts.contains(&"$".to_string()));
        assert_eq!(stats.markers_drawn, 1);
        assert_eq!(stats.placeholders_drawn, 2);
        assert_eq!(stats.edges_drawn, 0);
    }

    #[test]
    fn edges_need_both_ends_discovered() {
        let world = World::new(&["alderton", "brook"], 1.0);
        let mut painter = RecordingPainter::default();
        let stats = MapRenderer::new()
            .render(Some(&mut painter), &world.scene())
            .expect("frame drawn");
        assert_eq!(stats.edges_drawn, 1);
        assert_eq!(stats.markers_drawn, 2);
        assert_eq!(stats.placeholders_drawn, 1);
    }

    #[test]
    fn quest_markers_get_a_path_from_the_player() {
        let world = World::new(&["alderton", "cairn"], 1.0);
        let mut painter = RecordingPainter::default();
        let stats = MapRenderer::new()
            .render(Some(&mut painter), &world.scene())
            .expect("frame drawn");
        assert_eq!(stats.quest_paths_drawn, 1);
        let dashed_purple = painter.ops().iter().any(|op| {
            matches!(op, PaintOp::Line { stroke, .. } if stroke.color == QUEST_PATH && stroke.dash.is_some())
        });
        assert!(dashed_purple);
    }

    #[test]
    fn layers_can_be_switched_off() {
        let world = World::new(&["alderton", "brook"], 1.0);
        let mut scene = world.scene();
        scene.options = RenderOptions {
            show_labels: false,
            show_paths: false,
            show_minimap: false,
        };
        let mut painter = RecordingPainter::default();
        let stats = MapRenderer::new()
            .render(Some(&mut painter), &scene)
            .expect("frame drawn");
        assert_eq!(stats.labels_drawn, 0);
        assert_eq!(stats.edges_drawn, 0);
        assert!(!stats.minimap_drawn);
        assert!(stats.fog_cells > 0);
    }

    #[test]
    fn first_op_clears_the_viewport() {
        let world = World::new(&[], 1.0);
        let mut painter = RecordingPainter::default();
        MapRenderer::new().render(Some(&mut painter), &world.scene());
        assert!(matches!(painter.ops().first(), Some(PaintOp::Clear { .. })));
    }
}
