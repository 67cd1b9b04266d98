pub mod camera;
pub mod colors;
pub mod config;
pub mod engine;
pub mod fog;
pub mod geometry;
pub mod persistence;
pub mod poi;
pub mod renderer;
pub mod spatial;
pub mod travel;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing;

pub use camera::{Camera, CameraState, InputEvent, ZoomDirection};
pub use config::{ConfigError, MapConfig};
pub use engine::{DiscoveryInbox, DiscoverySource, InputOutcome, MapEngine, fast_travel};
pub use fog::FogOfWar;
pub use geometry::{Projection, ScreenPoint, Size, WorldPoint};
pub use persistence::{FogStore, MemoryStore, PersistError, Persistence, SnapshotError};
pub use poi::{CatalogIssue, PoiDef, PoiKind, PoiRegistry};
pub use renderer::{FrameStats, Painter, RenderOptions, Stroke, TextAlign, TextStyle};
pub use travel::{PlayerLink, TravelAuthority, TravelError, TravelResponse};
pub use visibility::{PoiFilter, VisibilityPolicy};
