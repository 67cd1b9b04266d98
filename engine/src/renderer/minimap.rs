use crate::colors::{kind_color, rgba_css};
use crate::config::MinimapConfig;
use crate::geometry::{
    ScreenPoint, Size, WorldPoint, minimap_to_world, visible_world_rect, world_to_minimap,
};

use super::{Painter, Scene, Stroke, TextStyle};

/// Where the minimap sits on the canvas (bottom-left corner).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimapLayout {
    pub origin: ScreenPoint,
    pub size: Size,
}

impl MinimapLayout {
    /// `None` when the canvas is too small to fit the minimap and its margins.
    pub fn place(viewport: Size, config: &MinimapConfig) -> Option<Self> {
        let size = Size::new(config.width, config.height);
        if size.is_empty()
            || viewport.width < size.width + 2.0 * config.margin
            || viewport.height < size.height + 2.0 * config.margin
        {
            return None;
        }
        Some(Self {
            origin: ScreenPoint::new(config.margin, viewport.height - config.margin - size.height),
            size,
        })
    }

    pub fn contains(&self, p: ScreenPoint) -> bool {
        p.x >= self.origin.x
            && p.x <= self.origin.x + self.size.width
            && p.y >= self.origin.y
            && p.y <= self.origin.y + self.size.height
    }

    fn to_screen(&self, world: WorldPoint) -> ScreenPoint {
        let local = world_to_minimap(world, self.size);
        ScreenPoint::new(self.origin.x + local.x, self.origin.y + local.y)
    }
}

/// World point under a canvas position, if it falls on the minimap.
pub fn minimap_hit(layout: &MinimapLayout, screen: ScreenPoint) -> Option<WorldPoint> {
    if !layout.contains(screen) {
        return None;
    }
    let local = ScreenPoint::new(screen.x - layout.origin.x, screen.y - layout.origin.y);
    minimap_to_world(local, layout.size).map(|w| w.clamped())
}

pub(super) fn draw(painter: &mut dyn Painter, scene: &Scene<'_>, layout: &MinimapLayout) {
    let MinimapLayout { origin, size } = *layout;
    painter.fill_rect(origin.x, origin.y, size.width, size.height, "#13161f");

    // Known territory only; unexplored space stays blank.
    for poi in scene.registry.iter().filter(|p| p.is_discovered()) {
        let (r, g, b) = kind_color(poi.def.kind);
        let radius = if poi.tier() <= 1 { 2.5 } else { 1.5 };
        painter.fill_circle(layout.to_screen(poi.position()), radius, &rgba_css(r, g, b, 0.9));
    }

    painter.fill_circle(layout.to_screen(scene.player), 3.0, "#f5c542");

    // Viewport indicator, clipped to the minimap frame.
    let view = visible_world_rect(scene.projection);
    let tl = layout.to_screen(WorldPoint::new(view.min_x, view.min_y).clamped());
    let br = layout.to_screen(WorldPoint::new(view.max_x, view.max_y).clamped());
    if br.x > tl.x && br.y > tl.y {
        painter.stroke_rect(
            tl.x,
            tl.y,
            br.x - tl.x,
            br.y - tl.y,
            &Stroke::solid("rgba(245, 197, 66, 0.8)", 1.5),
        );
    }

    painter.stroke_rect(
        origin.x,
        origin.y,
        size.width,
        size.height,
        &Stroke::solid("#3a3f5c", 1.0),
    );
    painter.text(
        "MAP",
        ScreenPoint::new(origin.x + 8.0, origin.y + 14.0),
        &TextStyle::new("rgba(245, 197, 66, 0.5)", 10.0).left(),
    );
}
