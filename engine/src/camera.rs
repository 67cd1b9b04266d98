use tracing::debug;

use crate::colors::cubic_ease_out;
use crate::config::CameraConfig;
use crate::geometry::{Projection, ScreenPoint, Size, WorldPoint, screen_to_world};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Device-independent input, produced by the client from DOM events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { at: ScreenPoint },
    PointerMove { at: ScreenPoint },
    PointerUp { at: ScreenPoint },
    PointerLeave,
    /// Wheel delta in pixels (positive scrolls down, zooms out).
    Wheel { delta: f64, at: ScreenPoint },
    /// Two-finger pinch, as a multiplicative zoom factor around `at`.
    Pinch { factor: f64, at: ScreenPoint },
    ZoomButton { direction: ZoomDirection },
}

/// What an input did to the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraResponse {
    Unchanged,
    Changed,
    /// Pointer released without exceeding the drag threshold.
    Click(ScreenPoint),
}

impl CameraResponse {
    pub fn changed(&self) -> bool {
        matches!(self, CameraResponse::Changed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    Panning,
    AnimatingTo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraAnimation {
    from_center: WorldPoint,
    from_zoom: f64,
    to_center: WorldPoint,
    to_zoom: f64,
    // Captured on the first tick so the animation starts on the frame it is drawn.
    start_ms: Option<f64>,
    duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CameraMode {
    Idle,
    Panning {
        origin: ScreenPoint,
        last: ScreenPoint,
        moved: bool,
    },
    AnimatingTo(CameraAnimation),
}

/// Pan/zoom state machine over a [`Projection`].
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Projection,
    config: CameraConfig,
    mode: CameraMode,
}

impl Camera {
    /// A camera showing the world centre at the default zoom.
    pub fn new(config: CameraConfig, world_size: Size, viewport: Size) -> Self {
        let zoom = config.default_zoom.clamp(config.min_zoom, config.max_zoom);
        let mut camera = Self {
            projection: Projection {
                zoom,
                pan_x: 0.0,
                pan_y: 0.0,
                world_size,
                viewport,
            },
            config,
            mode: CameraMode::Idle,
        };
        camera.place(WorldPoint::CENTER, zoom);
        camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn zoom(&self) -> f64 {
        self.projection.zoom
    }

    pub fn pan(&self) -> ScreenPoint {
        self.projection.pan()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> CameraState {
        match self.mode {
            CameraMode::Idle => CameraState::Idle,
            CameraMode::Panning { .. } => CameraState::Panning,
            CameraMode::AnimatingTo(_) => CameraState::AnimatingTo,
        }
    }

    /// Pointer held from `PointerDown` until `PointerUp`/`PointerLeave`,
    /// whether or not it has moved.
    pub fn is_pointer_down(&self) -> bool {
        matches!(self.mode, CameraMode::Panning { .. })
    }

    /// Pointer held and moved past the drag threshold. Until then a release
    /// still counts as a click, so this stays false for small jitter.
    pub fn is_dragging(&self) -> bool {
        matches!(self.mode, CameraMode::Panning { moved: true, .. })
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.mode, CameraMode::AnimatingTo(_))
    }

    /// World point currently at the centre of the viewport.
    pub fn center(&self) -> WorldPoint {
        screen_to_world(self.projection.viewport.center(), &self.projection)
    }

    pub fn handle(&mut self, event: InputEvent) -> CameraResponse {
        match event {
            InputEvent::PointerDown { at } => {
                // Grabbing the map cancels any running animation where it stands.
                self.mode = CameraMode::Panning {
                    origin: at,
                    last: at,
                    moved: false,
                };
                CameraResponse::Unchanged
            }
            InputEvent::PointerMove { at } => self.drag_to(at),
            InputEvent::PointerUp { at } => {
                let mode = std::mem::replace(&mut self.mode, CameraMode::Idle);
                match mode {
                    CameraMode::Panning { moved: false, .. } => CameraResponse::Click(at),
                    CameraMode::AnimatingTo(anim) => {
                        self.mode = CameraMode::AnimatingTo(anim);
                        CameraResponse::Unchanged
                    }
                    _ => CameraResponse::Unchanged,
                }
            }
            InputEvent::PointerLeave => {
                if matches!(self.mode, CameraMode::Panning { .. }) {
                    self.mode = CameraMode::Idle;
                }
                CameraResponse::Unchanged
            }
            InputEvent::Wheel { delta, at } => {
                let factor = (-delta * self.config.wheel_sensitivity).exp();
                self.cancel_animation();
                self.zoom_at(factor, at)
            }
            InputEvent::Pinch { factor, at } => {
                self.cancel_animation();
                self.zoom_at(factor, at)
            }
            InputEvent::ZoomButton { direction } => {
                let factor = match direction {
                    ZoomDirection::In => self.config.zoom_step,
                    ZoomDirection::Out => 1.0 / self.config.zoom_step,
                };
                self.cancel_animation();
                self.zoom_at(factor, self.projection.viewport.center())
            }
        }
    }

    fn drag_to(&mut self, at: ScreenPoint) -> CameraResponse {
        let CameraMode::Panning {
            origin,
            last,
            moved,
        } = self.mode
        else {
            return CameraResponse::Unchanged;
        };
        let moved = moved || at.distance_to(origin) > self.config.drag_threshold_px;
        if !moved {
            return CameraResponse::Unchanged;
        }
        self.mode = CameraMode::Panning {
            origin,
            last: at,
            moved: true,
        };
        self.pan_by(at.x - last.x, at.y - last.y)
    }

    /// Zoom by `factor` keeping the world point under `at` fixed. The result
    /// is clamped to the configured zoom range.
    pub fn zoom_at(&mut self, factor: f64, at: ScreenPoint) -> CameraResponse {
        if !factor.is_finite() || factor <= 0.0 {
            return CameraResponse::Unchanged;
        }
        let old = self.projection.zoom;
        let new_zoom = self.clamp_zoom(old * factor);
        if new_zoom == old {
            return CameraResponse::Unchanged;
        }
        let ratio = new_zoom / old;
        self.projection.pan_x = at.x - (at.x - self.projection.pan_x) * ratio;
        self.projection.pan_y = at.y - (at.y - self.projection.pan_y) * ratio;
        self.projection.zoom = new_zoom;
        CameraResponse::Changed
    }

    /// Set an absolute zoom around the viewport centre.
    pub fn set_zoom(&mut self, zoom: f64) -> CameraResponse {
        if !zoom.is_finite() || zoom <= 0.0 {
            return CameraResponse::Unchanged;
        }
        let factor = zoom / self.projection.zoom;
        self.zoom_at(factor, self.projection.viewport.center())
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> CameraResponse {
        if (dx == 0.0 && dy == 0.0) || !dx.is_finite() || !dy.is_finite() {
            return CameraResponse::Unchanged;
        }
        self.projection.pan_x += dx;
        self.projection.pan_y += dy;
        CameraResponse::Changed
    }

    /// Jump so `world` sits at the viewport centre.
    pub fn center_on(&mut self, world: WorldPoint, zoom: Option<f64>) {
        self.mode = CameraMode::Idle;
        let zoom = self.clamp_zoom(zoom.unwrap_or(self.projection.zoom));
        self.place(world, zoom);
    }

    /// Ease towards `world` (and optionally a new zoom) over the configured
    /// duration. Advanced by [`Camera::tick`].
    pub fn animate_to(&mut self, world: WorldPoint, zoom: Option<f64>) {
        let to_zoom = self.clamp_zoom(zoom.unwrap_or(self.projection.zoom));
        if self.config.animation_ms <= 0.0 {
            self.center_on(world, Some(to_zoom));
            return;
        }
        debug!(x = world.x, y = world.y, zoom = to_zoom, "camera animating");
        self.mode = CameraMode::AnimatingTo(CameraAnimation {
            from_center: self.center(),
            from_zoom: self.projection.zoom,
            to_center: world,
            to_zoom,
            start_ms: None,
            duration_ms: self.config.animation_ms,
        });
    }

    /// Back to the world centre at the default zoom.
    pub fn reset_view(&mut self) {
        self.animate_to(WorldPoint::CENTER, Some(self.config.default_zoom));
    }

    /// Advance a running animation. Returns `true` if the projection moved.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let CameraMode::AnimatingTo(mut anim) = self.mode else {
            return false;
        };
        let start = *anim.start_ms.get_or_insert(now_ms);
        let t = ((now_ms - start) / anim.duration_ms).clamp(0.0, 1.0);
        let eased = cubic_ease_out(t);

        let zoom = anim.from_zoom + (anim.to_zoom - anim.from_zoom) * eased;
        let center = WorldPoint::new(
            anim.from_center.x + (anim.to_center.x - anim.from_center.x) * eased,
            anim.from_center.y + (anim.to_center.y - anim.from_center.y) * eased,
        );
        self.place(center, zoom);

        self.mode = if t >= 1.0 {
            CameraMode::Idle
        } else {
            CameraMode::AnimatingTo(anim)
        };
        true
    }

    /// New canvas size; the world point at the centre stays at the centre.
    pub fn resize(&mut self, viewport: Size) -> CameraResponse {
        if viewport == self.projection.viewport || viewport.is_empty() {
            return CameraResponse::Unchanged;
        }
        let center = self.center();
        self.projection.viewport = viewport;
        self.place(center, self.projection.zoom);
        CameraResponse::Changed
    }

    /// Forget all session state: default zoom, world centre, idle.
    pub fn reset(&mut self) {
        self.mode = CameraMode::Idle;
        let zoom = self.clamp_zoom(self.config.default_zoom);
        self.place(WorldPoint::CENTER, zoom);
    }

    fn cancel_animation(&mut self) {
        if matches!(self.mode, CameraMode::AnimatingTo(_)) {
            self.mode = CameraMode::Idle;
        }
    }

    fn place(&mut self, world: WorldPoint, zoom: f64) {
        let pan = self
            .projection
            .pan_for(world, self.projection.viewport.center(), zoom);
        self.projection.zoom = zoom;
        self.projection.pan_x = pan.x;
        self.projection.pan_y = pan.y;
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.config.min_zoom, self.config.max_zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::world_to_screen;

    fn camera() -> Camera {
        Camera::new(
            CameraConfig::default(),
            Size::new(2048.0, 1536.0),
            Size::new(1280.0, 800.0),
        )
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn starts_centered_at_default_zoom() {
        let cam = camera();
        assert_eq!(cam.zoom(), 1.0);
        assert_eq!(cam.state(), CameraState::Idle);
        assert_close(cam.center().x, 0.5);
        assert_close(cam.center().y, 0.5);
    }

    #[test]
    fn wheel_zoom_keeps_cursor_point_fixed() {
        let mut cam = camera();
        let cursor = ScreenPoint::new(300.0, 200.0);
        let before = screen_to_world(cursor, cam.projection());
        let response = cam.handle(InputEvent::Wheel {
            delta: -300.0,
            at: cursor,
        });
        assert!(response.changed());
        assert!(cam.zoom() > 1.0);
        let after = world_to_screen(before, cam.projection());
        assert_close(after.x, cursor.x);
        assert_close(after.y, cursor.y);
    }

    #[test]
    fn zoom_is_clamped_silently() {
        let mut cam = camera();
        for _ in 0..50 {
            cam.handle(InputEvent::ZoomButton {
                direction: ZoomDirection::In,
            });
        }
        assert_eq!(cam.zoom(), 4.0);
        assert_eq!(
            cam.handle(InputEvent::ZoomButton {
                direction: ZoomDirection::In
            }),
            CameraResponse::Unchanged
        );
        cam.set_zoom(0.0001);
        assert_eq!(cam.zoom(), 0.5);
    }

    #[test]
    fn small_pointer_motion_is_a_click() {
        let mut cam = camera();
        let pan = cam.pan();
        cam.handle(InputEvent::PointerDown {
            at: ScreenPoint::new(100.0, 100.0),
        });
        cam.handle(InputEvent::PointerMove {
            at: ScreenPoint::new(102.0, 101.0),
        });
        assert!(!cam.is_dragging());
        assert!(cam.is_pointer_down());
        let up = cam.handle(InputEvent::PointerUp {
            at: ScreenPoint::new(102.0, 101.0),
        });
        assert_eq!(up, CameraResponse::Click(ScreenPoint::new(102.0, 101.0)));
        assert!(!cam.is_pointer_down());
        assert_eq!(cam.pan(), pan);
        assert_eq!(cam.state(), CameraState::Idle);
    }

    #[test]
    fn drag_pans_by_full_pointer_delta() {
        let mut cam = camera();
        let pan = cam.pan();
        cam.handle(InputEvent::PointerDown {
            at: ScreenPoint::new(100.0, 100.0),
        });
        assert_eq!(cam.state(), CameraState::Panning);
        let r = cam.handle(InputEvent::PointerMove {
            at: ScreenPoint::new(130.0, 90.0),
        });
        assert!(r.changed());
        assert!(cam.is_dragging());
        cam.handle(InputEvent::PointerMove {
            at: ScreenPoint::new(140.0, 90.0),
        });
        assert_close(cam.pan().x, pan.x + 40.0);
        assert_close(cam.pan().y, pan.y - 10.0);
        assert_eq!(
            cam.handle(InputEvent::PointerUp {
                at: ScreenPoint::new(140.0, 90.0)
            }),
            CameraResponse::Unchanged
        );
        assert!(!cam.is_dragging());
    }

    #[test]
    fn pointer_leave_ends_pan() {
        let mut cam = camera();
        cam.handle(InputEvent::PointerDown {
            at: ScreenPoint::new(10.0, 10.0),
        });
        assert!(cam.is_pointer_down());
        assert!(!cam.is_dragging());
        cam.handle(InputEvent::PointerLeave);
        assert!(!cam.is_pointer_down());
        assert_eq!(cam.state(), CameraState::Idle);
        assert_eq!(
            cam.handle(InputEvent::PointerMove {
                at: ScreenPoint::new(80.0, 80.0)
            }),
            CameraResponse::Unchanged
        );
    }

    #[test]
    fn animation_eases_to_target_then_idles() {
        let mut cam = camera();
        let target = WorldPoint::new(0.2, 0.7);
        cam.animate_to(target, Some(2.0));
        assert_eq!(cam.state(), CameraState::AnimatingTo);

        assert!(cam.tick(1000.0));
        assert_close(cam.zoom(), 1.0);
        assert!(cam.tick(1000.0 + 225.0));
        assert!(cam.zoom() > 1.5);
        assert!(cam.tick(1000.0 + 450.0));
        assert_eq!(cam.state(), CameraState::Idle);
        assert_close(cam.zoom(), 2.0);
        assert_close(cam.center().x, 0.2);
        assert_close(cam.center().y, 0.7);
        assert!(!cam.tick(2000.0));
    }

    #[test]
    fn pointer_down_cancels_animation() {
        let mut cam = camera();
        cam.animate_to(WorldPoint::new(0.9, 0.9), None);
        cam.tick(0.0);
        cam.handle(InputEvent::PointerDown {
            at: ScreenPoint::new(5.0, 5.0),
        });
        assert_eq!(cam.state(), CameraState::Panning);
        assert!(!cam.tick(100.0));
    }

    #[test]
    fn resize_keeps_center() {
        let mut cam = camera();
        cam.center_on(WorldPoint::new(0.3, 0.6), Some(2.0));
        assert!(cam.resize(Size::new(640.0, 480.0)).changed());
        assert_close(cam.center().x, 0.3);
        assert_close(cam.center().y, 0.6);
        assert_eq!(cam.resize(Size::new(640.0, 480.0)), CameraResponse::Unchanged);
    }

    #[test]
    fn reset_returns_to_defaults() {
        let mut cam = camera();
        cam.center_on(WorldPoint::new(0.1, 0.1), Some(3.0));
        cam.reset();
        assert_eq!(cam.zoom(), 1.0);
        assert_close(cam.center().x, 0.5);
    }
}
