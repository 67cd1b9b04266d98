use crate::poi::PoiKind;

/// Deterministic 32-bit hash of a seed and an index, used for cosmetic
/// placement (terrain decoration) so every client draws the same world.
pub fn seeded_hash(seed: u32, index: u32, salt: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(&index.to_le_bytes());
    hasher.update(salt.as_bytes());
    hasher.finalize()
}

/// Map a hash to a unit float in `[0, 1)`.
pub fn unit_from_hash(hash: u32) -> f64 {
    hash as f64 / (u32::MAX as f64 + 1.0)
}

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

/// Brighten a color by a factor (1.0 = no change, >1.0 = brighter).
pub fn brighten(r: u8, g: u8, b: u8, factor: f64) -> (u8, u8, u8) {
    (
        ((r as f64 * factor).min(255.0)) as u8,
        ((g as f64 * factor).min(255.0)) as u8,
        ((b as f64 * factor).min(255.0)) as u8,
    )
}

/// Marker color per POI type.
pub fn kind_color(kind: PoiKind) -> (u8, u8, u8) {
    match kind {
        PoiKind::City => (245, 197, 66),
        PoiKind::Shop => (102, 204, 102),
        PoiKind::Quest => (168, 85, 247),
        PoiKind::Dungeon => (235, 87, 87),
        PoiKind::Npc => (96, 165, 250),
        PoiKind::Waypoint => (94, 234, 212),
        PoiKind::Danger => (245, 120, 40),
    }
}

/// Cubic ease-out: decelerating to zero velocity.
pub fn cubic_ease_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0) - 1.0;
    t * t * t + 1.0
}

/// Pulse intensity (0.0..1.0) for quest markers, one cycle per `period_ms`.
pub fn pulse(now_ms: f64, period_ms: f64) -> f64 {
    if period_ms <= 0.0 {
        return 0.0;
    }
    let phase = (now_ms % period_ms) / period_ms;
    0.5 - 0.5 * (phase * std::f64::consts::TAU).cos()
}

#[inline]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge0 >= edge1 {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
