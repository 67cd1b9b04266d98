use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_MIN_ZOOM: f64 = 0.5;
pub const DEFAULT_MAX_ZOOM: f64 = 4.0;
pub const DEFAULT_ZOOM: f64 = 1.0;
pub const ZOOM_BUTTON_STEP: f64 = 1.25;
pub const WHEEL_SENSITIVITY: f64 = 0.001;
pub const CAMERA_ANIMATION_MS: f64 = 450.0;
pub const DRAG_THRESHOLD_PX: f64 = 5.0;

// Priority-tier thresholds. Render and hit-test paths both read these.
pub const LOD_MEDIUM_ZOOM: f64 = 1.2;
pub const LOD_HIGH_ZOOM: f64 = 2.0;
pub const LABEL_DETAIL_ZOOM: f64 = 1.5;
pub const HIT_RADIUS_PX: f64 = 14.0;

pub const FOG_GRID_CELLS: usize = 48;
pub const FOG_PLAYER_RADIUS: f64 = 0.06;
pub const FOG_DEFAULT_REVEAL_RADIUS: f64 = 0.05;
pub const FOG_MAX_REVEAL_CIRCLES: usize = 512;
pub const DISCOVERY_RADIUS: f64 = 0.04;
pub const VISIT_RADIUS: f64 = 0.01;

pub const TRAVEL_BASE_COST: u64 = 10;
pub const TRAVEL_COST_PER_UNIT: f64 = 100.0;
pub const MAX_TRAVEL_COST_PER_UNIT: f64 = 1_000_000.0;

pub const MINIMAP_WIDTH: f64 = 200.0;
pub const MINIMAP_HEIGHT: f64 = 150.0;
pub const MINIMAP_MARGIN: f64 = 16.0;

pub const WORLD_WIDTH_PX: f64 = 2048.0;
pub const WORLD_HEIGHT_PX: f64 = 1536.0;
pub const WORLD_SEED: u32 = 0x5eed_a71a;
pub const DECORATION_COUNT: usize = 220;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid zoom bounds [{min}, {max}], using defaults")]
    ZoomBounds { min: f64, max: f64 },
    #[error("default zoom {0} outside zoom bounds, clamped")]
    DefaultZoom(f64),
    #[error("lod thresholds out of order (medium {medium}, high {high}), using defaults")]
    LodOrder { medium: f64, high: f64 },
    #[error("{field} must be positive, got {value}; using default")]
    NonPositive { field: &'static str, value: f64 },
    #[error("travel.cost_per_unit {0} out of range, using default")]
    TravelRate(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub default_zoom: f64,
    pub zoom_step: f64,
    pub wheel_sensitivity: f64,
    pub animation_ms: f64,
    pub drag_threshold_px: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            default_zoom: DEFAULT_ZOOM,
            zoom_step: ZOOM_BUTTON_STEP,
            wheel_sensitivity: WHEEL_SENSITIVITY,
            animation_ms: CAMERA_ANIMATION_MS,
            drag_threshold_px: DRAG_THRESHOLD_PX,
        }
    }
}

/// Level-of-detail thresholds. A tier-2 marker appears once zoom is strictly
/// greater than `medium`, tier 3 once strictly greater than `high`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub medium: f64,
    pub high: f64,
    pub label_detail: f64,
    pub hit_radius_px: f64,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            medium: LOD_MEDIUM_ZOOM,
            high: LOD_HIGH_ZOOM,
            label_detail: LABEL_DETAIL_ZOOM,
            hit_radius_px: HIT_RADIUS_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub grid_cells: usize,
    pub player_radius: f64,
    pub default_reveal_radius: f64,
    pub max_reveal_circles: usize,
    pub discovery_radius: f64,
    pub visit_radius: f64,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            grid_cells: FOG_GRID_CELLS,
            player_radius: FOG_PLAYER_RADIUS,
            default_reveal_radius: FOG_DEFAULT_REVEAL_RADIUS,
            max_reveal_circles: FOG_MAX_REVEAL_CIRCLES,
            discovery_radius: DISCOVERY_RADIUS,
            visit_radius: VISIT_RADIUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelConfig {
    pub base_cost: u64,
    pub cost_per_unit: f64,
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            base_cost: TRAVEL_BASE_COST,
            cost_per_unit: TRAVEL_COST_PER_UNIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimapConfig {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            width: MINIMAP_WIDTH,
            height: MINIMAP_HEIGHT,
            margin: MINIMAP_MARGIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width_px: f64,
    pub height_px: f64,
    pub seed: u32,
    pub decoration_count: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width_px: WORLD_WIDTH_PX,
            height_px: WORLD_HEIGHT_PX,
            seed: WORLD_SEED,
            decoration_count: DECORATION_COUNT,
        }
    }
}

/// Engine configuration. Every section falls back to its defaults when
/// missing from the JSON source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub camera: CameraConfig,
    pub lod: LodConfig,
    pub fog: FogConfig,
    pub travel: TravelConfig,
    pub minimap: MinimapConfig,
    pub world: WorldConfig,
}

impl MapConfig {
    /// Parse a config document and repair any invalid values. Repairs are
    /// logged; only an unparseable document is an error.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let parsed: MapConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let (config, issues) = parsed.validated();
        for issue in &issues {
            warn!(error = %issue, "map config repaired");
        }
        Ok(config)
    }

    /// Return a copy with invalid values replaced by defaults, plus the list
    /// of problems found.
    pub fn validated(mut self) -> (Self, Vec<ConfigError>) {
        let mut issues = Vec::new();

        let cam = &mut self.camera;
        if !(cam.min_zoom > 0.0 && cam.max_zoom >= cam.min_zoom && cam.max_zoom.is_finite()) {
            issues.push(ConfigError::ZoomBounds {
                min: cam.min_zoom,
                max: cam.max_zoom,
            });
            cam.min_zoom = DEFAULT_MIN_ZOOM;
            cam.max_zoom = DEFAULT_MAX_ZOOM;
        }
        if !(cam.min_zoom..=cam.max_zoom).contains(&cam.default_zoom) {
            issues.push(ConfigError::DefaultZoom(cam.default_zoom));
            cam.default_zoom = if cam.default_zoom.is_finite() {
                cam.default_zoom.clamp(cam.min_zoom, cam.max_zoom)
            } else {
                DEFAULT_ZOOM.clamp(cam.min_zoom, cam.max_zoom)
            };
        }
        if !(cam.zoom_step > 1.0) {
            issues.push(ConfigError::NonPositive {
                field: "camera.zoom_step",
                value: cam.zoom_step,
            });
            cam.zoom_step = ZOOM_BUTTON_STEP;
        }
        if !(cam.animation_ms >= 0.0) {
            issues.push(ConfigError::NonPositive {
                field: "camera.animation_ms",
                value: cam.animation_ms,
            });
            cam.animation_ms = CAMERA_ANIMATION_MS;
        }

        let lod = &mut self.lod;
        if !(lod.medium > 0.0 && lod.high >= lod.medium) {
            issues.push(ConfigError::LodOrder {
                medium: lod.medium,
                high: lod.high,
            });
            lod.medium = LOD_MEDIUM_ZOOM;
            lod.high = LOD_HIGH_ZOOM;
        }
        if !(lod.hit_radius_px > 0.0) {
            issues.push(ConfigError::NonPositive {
                field: "lod.hit_radius_px",
                value: lod.hit_radius_px,
            });
            lod.hit_radius_px = HIT_RADIUS_PX;
        }

        if self.fog.grid_cells == 0 {
            issues.push(ConfigError::NonPositive {
                field: "fog.grid_cells",
                value: 0.0,
            });
            self.fog.grid_cells = FOG_GRID_CELLS;
        }

        let travel = &mut self.travel;
        if !(0.0..=MAX_TRAVEL_COST_PER_UNIT).contains(&travel.cost_per_unit) {
            issues.push(ConfigError::TravelRate(travel.cost_per_unit));
            travel.cost_per_unit = TRAVEL_COST_PER_UNIT;
        }

        let world = &mut self.world;
        if !(world.width_px > 0.0 && world.height_px > 0.0) {
            issues.push(ConfigError::NonPositive {
                field: "world.width_px/height_px",
                value: world.width_px.min(world.height_px),
            });
            world.width_px = WORLD_WIDTH_PX;
            world.height_px = WORLD_HEIGHT_PX;
        }

        (self, issues)
    }
}
