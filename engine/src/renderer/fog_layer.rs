use crate::colors::{rgba_css, smoothstep};
use crate::geometry::{WorldPoint, WorldRect, world_to_screen};

use super::{Painter, Scene};

const FOG_DARK: f64 = 0.85;
const FOG_LIGHT: f64 = 0.25;
// Fraction of a reveal radius that is fully clear before the falloff starts.
const FALLOFF_INNER: f64 = 0.55;

#[derive(Debug, Clone, Copy)]
struct Reveal {
    center: WorldPoint,
    radius: f64,
}

impl Reveal {
    /// 1.0 fully revealed, 0.0 untouched.
    fn strength(&self, p: WorldPoint) -> f64 {
        let dx = (p.x - self.center.x).abs();
        let dy = (p.y - self.center.y).abs();
        if dx > self.radius || dy > self.radius {
            return 0.0;
        }
        let d = dx.hypot(dy);
        1.0 - smoothstep(self.radius * FALLOFF_INNER, self.radius, d)
    }
}

fn reveals(scene: &Scene<'_>) -> Vec<Reveal> {
    let fog_config = &scene.config.fog;
    let mut out: Vec<Reveal> = scene
        .fog
        .circles()
        .iter()
        .map(|c| Reveal {
            center: c.center(),
            radius: c.r,
        })
        .collect();
    out.extend(
        scene
            .registry
            .iter()
            .filter(|p| p.is_discovered())
            .map(|p| Reveal {
                center: p.position(),
                radius: p
                    .def
                    .reveal_radius
                    .unwrap_or(fog_config.default_reveal_radius),
            }),
    );
    out.push(Reveal {
        center: scene.player,
        radius: fog_config.player_radius,
    });
    out
}

/// Base darkness of a cell: heavy when the closest POI is still unknown.
fn base_alpha(scene: &Scene<'_>, p: WorldPoint) -> f64 {
    match scene.registry.nearest(p) {
        Some(poi) if poi.is_discovered() => FOG_LIGHT,
        _ => FOG_DARK,
    }
}

/// Paint the fog grid over the visible part of the world. Returns the number
/// of cells drawn.
pub(super) fn draw(painter: &mut dyn Painter, scene: &Scene<'_>, visible: &WorldRect) -> u32 {
    let cells = scene.config.fog.grid_cells.max(1);
    let step = 1.0 / cells as f64;
    let reveals = reveals(scene);
    let mut drawn = 0;

    let col_range = cell_range(visible.min_x, visible.max_x, cells);
    let row_range = cell_range(visible.min_y, visible.max_y, cells);

    for row in row_range {
        for col in col_range.clone() {
            let x0 = col as f64 * step;
            let y0 = row as f64 * step;
            let center = WorldPoint::new(x0 + step / 2.0, y0 + step / 2.0);

            let revealed = reveals
                .iter()
                .map(|r| r.strength(center))
                .fold(0.0_f64, f64::max);
            let alpha = base_alpha(scene, center) * (1.0 - revealed);
            if alpha < 0.01 {
                continue;
            }

            let tl = world_to_screen(WorldPoint::new(x0, y0), scene.projection);
            let br = world_to_screen(WorldPoint::new(x0 + step, y0 + step), scene.projection);
            // Half-pixel overlap hides seams between neighbouring cells.
            painter.fill_rect(
                tl.x - 0.5,
                tl.y - 0.5,
                br.x - tl.x + 1.0,
                br.y - tl.y + 1.0,
                &rgba_css(6, 8, 14, (alpha * 100.0).round() / 100.0),
            );
            drawn += 1;
        }
    }
    drawn
}

fn cell_range(min: f64, max: f64, cells: usize) -> std::ops::Range<usize> {
    let start = (min.max(0.0) * cells as f64).floor() as usize;
    let end = ((max.min(1.0) * cells as f64).ceil() as usize).min(cells);
    start.min(end)..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_strength_falls_off_to_zero() {
        let r = Reveal {
            center: WorldPoint::new(0.5, 0.5),
            radius: 0.1,
        };
        assert_eq!(r.strength(WorldPoint::new(0.5, 0.5)), 1.0);
        assert_eq!(r.strength(WorldPoint::new(0.53, 0.5)), 1.0);
        let mid = r.strength(WorldPoint::new(0.58, 0.5));
        assert!(mid > 0.0 && mid < 1.0);
        assert_eq!(r.strength(WorldPoint::new(0.61, 0.5)), 0.0);
    }

    #[test]
    fn cell_range_clips_to_world() {
        assert_eq!(cell_range(-0.5, 2.0, 10), 0..10);
        assert_eq!(cell_range(0.25, 0.5, 8), 2..4);
        assert_eq!(cell_range(1.2, 1.5, 8), 8..8);
        assert_eq!(cell_range(-1.0, -0.5, 8), 0..0);
    }
}
