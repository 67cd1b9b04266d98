use crate::colors::{rgba_css, seeded_hash, unit_from_hash};
use crate::geometry::{Projection, ScreenPoint, WorldPoint, world_to_screen};

use super::Painter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationKind {
    Forest,
    Hill,
    Lake,
}

/// A purely cosmetic terrain feature. Placement depends only on the world
/// seed, so every client draws the same map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoration {
    pub position: WorldPoint,
    pub kind: DecorationKind,
    /// Size in world units at zoom 1, scaled with the map.
    pub size: f64,
    /// Per-feature shade variation in `[0, 1)`.
    pub shade: f64,
}

pub fn generate(seed: u32, count: usize) -> Vec<Decoration> {
    (0..count as u32)
        .map(|i| {
            let x = unit_from_hash(seeded_hash(seed, i, "x"));
            let y = unit_from_hash(seeded_hash(seed, i, "y"));
            let roll = unit_from_hash(seeded_hash(seed, i, "kind"));
            let kind = if roll < 0.55 {
                DecorationKind::Forest
            } else if roll < 0.85 {
                DecorationKind::Hill
            } else {
                DecorationKind::Lake
            };
            let size = 0.004 + 0.010 * unit_from_hash(seeded_hash(seed, i, "size"));
            Decoration {
                position: WorldPoint::new(x, y),
                kind,
                size,
                shade: unit_from_hash(seeded_hash(seed, i, "shade")),
            }
        })
        .collect()
}

pub(super) fn draw(painter: &mut dyn Painter, deco: &Decoration, projection: &Projection) {
    let at = world_to_screen(deco.position, projection);
    let (sx, _) = projection.scale();
    let r = (deco.size * sx).max(1.5);
    let shade = deco.shade;
    match deco.kind {
        DecorationKind::Forest => {
            let g = 70 + (shade * 40.0) as u8;
            painter.fill_circle(at, r, &rgba_css(34, g, 48, 0.8));
            painter.fill_circle(
                ScreenPoint::new(at.x + r * 0.6, at.y + r * 0.3),
                r * 0.7,
                &rgba_css(28, g - 10, 40, 0.8),
            );
        }
        DecorationKind::Hill => {
            let v = 80 + (shade * 30.0) as u8;
            painter.polygon(
                &[
                    ScreenPoint::new(at.x - r, at.y + r * 0.6),
                    ScreenPoint::new(at.x, at.y - r * 0.8),
                    ScreenPoint::new(at.x + r, at.y + r * 0.6),
                ],
                &rgba_css(v, v - 10, v - 30, 0.7),
            );
        }
        DecorationKind::Lake => {
            let b = 120 + (shade * 50.0) as u8;
            painter.fill_circle(at, r * 1.2, &rgba_css(40, 70, b, 0.75));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_world() {
        assert_eq!(generate(42, 64), generate(42, 64));
        assert_ne!(generate(42, 64), generate(43, 64));
        assert_eq!(generate(42, 0).len(), 0);
    }

    #[test]
    fn decorations_stay_inside_world() {
        for deco in generate(0x5eed_a71a, 500) {
            assert!(deco.position.is_normalized());
            assert!(deco.size > 0.0 && deco.size < 0.02);
        }
    }

    #[test]
    fn all_kinds_appear_in_a_large_world() {
        let decos = generate(7, 400);
        for kind in [DecorationKind::Forest, DecorationKind::Hill, DecorationKind::Lake] {
            assert!(decos.iter().any(|d| d.kind == kind), "{kind:?} missing");
        }
    }
}
