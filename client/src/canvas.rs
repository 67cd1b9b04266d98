use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, PointerEvent, WheelEvent};

use wayfarer_engine::{InputEvent, InputOutcome, ScreenPoint, Size};

use crate::api;
use crate::app::{MapRevision, TravelTarget};
use crate::painter::CanvasPainter;
use crate::render_loop::{FrameLoop, NextFrame};

fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(1.0)
}

/// Backing-store size for a CSS size at a given pixel ratio.
pub(crate) fn backing_size(css: Size, dpr: f64) -> (u32, u32) {
    let w = (css.width * dpr).round().max(1.0) as u32;
    let h = (css.height * dpr).round().max(1.0) as u32;
    (w, h)
}

/// Distance between two touches, and their midpoint.
pub(crate) fn pinch_geometry(a: ScreenPoint, b: ScreenPoint) -> (f64, ScreenPoint) {
    (
        a.distance_to(b),
        ScreenPoint::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0),
    )
}

/// Canvas-local position of a client-space point.
fn local_point(canvas: Option<HtmlCanvasElement>, client_x: f64, client_y: f64) -> ScreenPoint {
    match canvas {
        Some(el) => {
            let rect = el.get_bounding_client_rect();
            ScreenPoint::new(client_x - rect.left(), client_y - rect.top())
        }
        None => ScreenPoint::new(client_x, client_y),
    }
}

fn set_cursor(canvas: Option<HtmlCanvasElement>, cursor: &str) {
    if let Some(el) = canvas {
        web_sys::HtmlElement::style(&el).set_property("cursor", cursor).ok();
    }
}

#[component]
pub fn MapCanvas() -> impl IntoView {
    let MapRevision(revision) = expect_context();
    let TravelTarget(travel_target) = expect_context();

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    // Only the first pointer pans; a second finger is a pinch.
    let active_pointer: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
    let pinch_dist = Rc::new(Cell::new(0.0f64));

    // Cached 2D context (same object across canvas resizes)
    let cached_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> = Rc::new(RefCell::new(None));

    let frames = FrameLoop::new(move |now_ms| {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return NextFrame::Idle;
        };
        let canvas: &HtmlCanvasElement = &canvas;
        let Some(parent) = canvas.parent_element() else {
            return NextFrame::Idle;
        };
        let css = Size::new(parent.client_width() as f64, parent.client_height() as f64);
        if css.is_empty() {
            return NextFrame::Idle;
        }
        let dpr = device_pixel_ratio();
        let (bw, bh) = backing_size(css, dpr);
        if canvas.width() != bw || canvas.height() != bh {
            canvas.set_width(bw);
            canvas.set_height(bh);
        }

        let ctx = {
            let mut cache = cached_ctx.borrow_mut();
            if cache.is_none() {
                *cache = canvas
                    .get_context("2d")
                    .ok()
                    .flatten()
                    .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok());
            }
            cache.clone()
        };

        let Some(engine) = api::engine() else {
            return NextFrame::Idle;
        };
        let Ok(mut engine) = engine.try_borrow_mut() else {
            // Busy this frame; try again on the next one.
            return NextFrame::Continue;
        };
        engine.set_viewport(css);
        engine.tick(now_ms);
        let stats = match ctx.as_ref() {
            Some(ctx) => {
                // All drawing stays in CSS pixel coords.
                ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();
                let mut painter = CanvasPainter::new(ctx);
                engine.render(Some(&mut painter))
            }
            None => engine.render(None),
        };
        if let Some(stats) = stats {
            tracing::trace!(
                markers = stats.markers_drawn,
                fog_cells = stats.fog_cells,
                "frame"
            );
        }
        NextFrame::from(engine.needs_animation_frame())
    });
    let frames = Rc::new(frames);

    // Any engine-side change (and window resizes, see `app`) repaints.
    let frames_rev = frames.clone();
    Effect::new(move || {
        revision.track();
        frames_rev.request();
    });

    let dispatch = {
        let frames = frames.clone();
        move |event: InputEvent| {
            let Some(outcome) = api::engine().and_then(|engine| {
                let mut engine = engine.try_borrow_mut().ok()?;
                Some(engine.handle_input(event))
            }) else {
                return;
            };
            match outcome {
                InputOutcome::Ignored => {}
                InputOutcome::Redraw => {
                    // A click on empty map clears the travel prompt.
                    let current = api::read(|e| e.travel_target().map(str::to_string)).flatten();
                    if current != travel_target.get_untracked() {
                        travel_target.set(current);
                    }
                    frames.request();
                }
                InputOutcome::Selected(id) => {
                    travel_target.set(Some(id));
                    frames.request();
                }
            }
        }
    };
    let dispatch = Rc::new(dispatch);

    let on_pointer_down = {
        let dispatch = dispatch.clone();
        let active_pointer = active_pointer.clone();
        move |e: PointerEvent| {
            if active_pointer.get().is_some() {
                return;
            }
            active_pointer.set(Some(e.pointer_id()));
            if let Some(el) = canvas_ref.get_untracked() {
                el.set_pointer_capture(e.pointer_id()).ok();
            }
            let at = local_point(canvas_ref.get_untracked(), e.client_x() as f64, e.client_y() as f64);
            dispatch(InputEvent::PointerDown { at });
        }
    };

    let on_pointer_move = {
        let dispatch = dispatch.clone();
        let active_pointer = active_pointer.clone();
        move |e: PointerEvent| {
            let at = local_point(canvas_ref.get_untracked(), e.client_x() as f64, e.client_y() as f64);
            match active_pointer.get() {
                Some(id) if id == e.pointer_id() => {
                    dispatch(InputEvent::PointerMove { at });
                    let dragging = api::read(|engine| engine.camera().is_dragging()).unwrap_or(false);
                    if dragging {
                        set_cursor(canvas_ref.get_untracked(), "grabbing");
                    }
                }
                Some(_) => {}
                None => {
                    let over_poi = api::read(|engine| engine.poi_at(at).is_some()).unwrap_or(false);
                    set_cursor(canvas_ref.get_untracked(), if over_poi { "pointer" } else { "grab" });
                }
            }
        }
    };

    let on_pointer_up = {
        let dispatch = dispatch.clone();
        let active_pointer = active_pointer.clone();
        move |e: PointerEvent| {
            if active_pointer.get() != Some(e.pointer_id()) {
                return;
            }
            active_pointer.set(None);
            let at = local_point(canvas_ref.get_untracked(), e.client_x() as f64, e.client_y() as f64);
            dispatch(InputEvent::PointerUp { at });
            set_cursor(canvas_ref.get_untracked(), "grab");
        }
    };

    let on_pointer_leave = {
        let dispatch = dispatch.clone();
        let active_pointer = active_pointer.clone();
        move |_: PointerEvent| {
            // Captured pointers keep reporting; only a free hover can leave.
            if active_pointer.get().is_none() {
                dispatch(InputEvent::PointerLeave);
            }
        }
    };

    let on_pointer_cancel = {
        let dispatch = dispatch.clone();
        let active_pointer = active_pointer.clone();
        move |_: PointerEvent| {
            active_pointer.set(None);
            dispatch(InputEvent::PointerLeave);
        }
    };

    let on_wheel = {
        let dispatch = dispatch.clone();
        move |e: WheelEvent| {
            e.prevent_default();
            let at = local_point(canvas_ref.get_untracked(), e.client_x() as f64, e.client_y() as f64);
            dispatch(InputEvent::Wheel {
                delta: e.delta_y(),
                at,
            });
        }
    };

    let touch_points = move |e: &web_sys::TouchEvent| -> Option<(ScreenPoint, ScreenPoint)> {
        let touches = e.touches();
        if touches.length() != 2 {
            return None;
        }
        let (t0, t1) = (touches.get(0)?, touches.get(1)?);
        let canvas = canvas_ref.get_untracked();
        Some((
            local_point(canvas.clone(), t0.client_x() as f64, t0.client_y() as f64),
            local_point(canvas, t1.client_x() as f64, t1.client_y() as f64),
        ))
    };

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            if let Some((a, b)) = touch_points(&e) {
                e.prevent_default();
                pinch_dist.set(pinch_geometry(a, b).0);
            }
        }
    };

    let on_touch_move = {
        let dispatch = dispatch.clone();
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let Some((a, b)) = touch_points(&e) else {
                return;
            };
            e.prevent_default();
            let (dist, mid) = pinch_geometry(a, b);
            let old = pinch_dist.get();
            if old > 0.0 && dist > 0.0 {
                dispatch(InputEvent::Pinch {
                    factor: dist / old,
                    at: mid,
                });
            }
            pinch_dist.set(dist);
        }
    };

    let on_touch_end = {
        let pinch_dist = pinch_dist.clone();
        move |_: web_sys::TouchEvent| {
            pinch_dist.set(0.0);
        }
    };

    frames.request();

    view! {
        <canvas
            node_ref=canvas_ref
            style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointerleave=on_pointer_leave
            on:pointercancel=on_pointer_cancel
            on:wheel=on_wheel
            on:touchstart=on_touch_start
            on:touchmove=on_touch_move
            on:touchend=on_touch_end
        />
    }
}
