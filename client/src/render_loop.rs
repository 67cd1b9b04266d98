use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;

/// What the frame callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFrame {
    Idle,
    /// Something is moving (camera animation, quest pulse).
    Continue,
}

impl From<bool> for NextFrame {
    fn from(more: bool) -> Self {
        if more {
            NextFrame::Continue
        } else {
            NextFrame::Idle
        }
    }
}

/// Coalesces redraw requests into at most one `requestAnimationFrame` per
/// vsync. Continuous frames run only while the callback asks for them.
pub struct FrameLoop {
    inner: Rc<Inner>,
}

struct Inner {
    window: Option<web_sys::Window>,
    dirty: Cell<bool>,
    raf_id: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl Inner {
    fn schedule(&self) {
        if self.raf_id.get().is_some() {
            return;
        }
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let callback = self.callback.borrow();
        let Some(cb) = callback.as_ref() else {
            return;
        };
        if let Ok(id) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
            self.raf_id.set(Some(id));
        }
    }

    fn cancel(&self) {
        if let Some(id) = self.raf_id.take()
            && let Some(window) = self.window.as_ref()
        {
            let _ = window.cancel_animation_frame(id);
        }
    }
}

impl FrameLoop {
    /// `frame_fn` receives the rAF timestamp in milliseconds.
    pub fn new(mut frame_fn: impl FnMut(f64) -> NextFrame + 'static) -> Self {
        let inner = Rc::new(Inner {
            window: web_sys::window(),
            dirty: Cell::new(false),
            raf_id: Cell::new(None),
            callback: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let cb = Closure::<dyn FnMut(f64)>::new(move |now_ms: f64| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.raf_id.set(None);
            if !inner.dirty.replace(false) {
                return;
            }
            if frame_fn(now_ms) == NextFrame::Continue {
                inner.dirty.set(true);
                inner.schedule();
            }
        });
        *inner.callback.borrow_mut() = Some(cb);

        Self { inner }
    }

    pub fn request(&self) {
        self.inner.dirty.set(true);
        self.inner.schedule();
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.inner.cancel();
        self.inner.dirty.set(false);
        self.inner.callback.borrow_mut().take();
    }
}
