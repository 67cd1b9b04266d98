use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in normalized world space. The playable map spans `[0, 1] x [0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

/// A point in canvas pixel space (CSS pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Axis-aligned rectangle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("zoom must be a positive finite number, got {0}")]
    InvalidZoom(f64),
    #[error("world size must be positive, got {width}x{height}")]
    InvalidWorldSize { width: f64, height: f64 },
}

impl WorldPoint {
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    pub fn clamped(&self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width / 2.0, self.height / 2.0)
    }
}

impl WorldRect {
    pub const UNIT: Self = Self {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 1.0,
        max_y: 1.0,
    };

    pub fn contains(&self, p: WorldPoint) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Grow the rectangle by `margin` world units on every side.
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn intersects(&self, other: &WorldRect) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// The parameters of the world-to-screen transform: zoom, pan offset, and
/// the pixel extents the normalized world is projected onto.
///
/// `screen = world * world_size * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub(crate) zoom: f64,
    pub(crate) pan_x: f64,
    pub(crate) pan_y: f64,
    pub(crate) world_size: Size,
    pub(crate) viewport: Size,
}

impl Projection {
    /// Build a projection. Zero, negative and non-finite zoom is rejected here
    /// so the transform functions never divide by zero.
    pub fn new(
        zoom: f64,
        pan: ScreenPoint,
        world_size: Size,
        viewport: Size,
    ) -> Result<Self, GeometryError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(GeometryError::InvalidZoom(zoom));
        }
        if world_size.is_empty() || !world_size.width.is_finite() || !world_size.height.is_finite()
        {
            return Err(GeometryError::InvalidWorldSize {
                width: world_size.width,
                height: world_size.height,
            });
        }
        Ok(Self {
            zoom,
            pan_x: pan.x,
            pan_y: pan.y,
            world_size,
            viewport,
        })
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> ScreenPoint {
        ScreenPoint::new(self.pan_x, self.pan_y)
    }

    pub fn world_size(&self) -> Size {
        self.world_size
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Pixels per world unit along each axis at the current zoom.
    pub fn scale(&self) -> (f64, f64) {
        (
            self.world_size.width * self.zoom,
            self.world_size.height * self.zoom,
        )
    }

    /// Pan offset that places `world` at `screen` for the given zoom.
    pub fn pan_for(&self, world: WorldPoint, screen: ScreenPoint, zoom: f64) -> ScreenPoint {
        ScreenPoint::new(
            screen.x - world.x * self.world_size.width * zoom,
            screen.y - world.y * self.world_size.height * zoom,
        )
    }
}

/// Convert world coordinates to screen coordinates.
pub fn world_to_screen(world: WorldPoint, projection: &Projection) -> ScreenPoint {
    let (sx, sy) = projection.scale();
    ScreenPoint::new(
        world.x * sx + projection.pan_x,
        world.y * sy + projection.pan_y,
    )
}

/// Convert screen coordinates to world coordinates. Exact inverse of
/// [`world_to_screen`] for the same projection.
pub fn screen_to_world(screen: ScreenPoint, projection: &Projection) -> WorldPoint {
    let (sx, sy) = projection.scale();
    WorldPoint::new(
        (screen.x - projection.pan_x) / sx,
        (screen.y - projection.pan_y) / sy,
    )
}

/// Convert world coordinates to minimap-local pixel coordinates. The minimap
/// always shows the whole world, independent of the main camera.
pub fn world_to_minimap(world: WorldPoint, minimap: Size) -> ScreenPoint {
    ScreenPoint::new(world.x * minimap.width, world.y * minimap.height)
}

/// Inverse of [`world_to_minimap`]. Returns `None` for an empty minimap.
pub fn minimap_to_world(local: ScreenPoint, minimap: Size) -> Option<WorldPoint> {
    if minimap.is_empty() {
        return None;
    }
    Some(WorldPoint::new(
        local.x / minimap.width,
        local.y / minimap.height,
    ))
}

/// Euclidean distance in world units.
pub fn world_distance(a: WorldPoint, b: WorldPoint) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Convert a pixel radius to the largest equivalent world-space radius, so a
/// circle query in world space never misses a point within `px` on screen.
pub fn screen_radius_to_world(px: f64, projection: &Projection) -> f64 {
    let (sx, sy) = projection.scale();
    px / sx.min(sy)
}

/// The world rectangle currently covered by the viewport.
pub fn visible_world_rect(projection: &Projection) -> WorldRect {
    let top_left = screen_to_world(ScreenPoint::new(0.0, 0.0), projection);
    let bottom_right = screen_to_world(
        ScreenPoint::new(projection.viewport.width, projection.viewport.height),
        projection,
    );
    WorldRect {
        min_x: top_left.x.min(bottom_right.x),
        min_y: top_left.y.min(bottom_right.y),
        max_x: top_left.x.max(bottom_right.x),
        max_y: top_left.y.max(bottom_right.y),
    }
}
