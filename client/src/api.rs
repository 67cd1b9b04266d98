//! Page-level handle on the map and the JS-facing API other game screens use.
//!
//! Collaborators call the exported functions (`discover_location`,
//! `discovered_locations`, `open_map`, `close_map`, `toggle_map`) or dispatch
//! `CustomEvent("location-discovered", { detail: id })` on `window`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wayfarer_engine::{DiscoveryInbox, DiscoverySource, MapEngine};

pub const DISCOVERY_EVENT: &str = "location-discovered";

/// Signals the UI owns; the API writes them so Leptos effects follow.
#[derive(Debug, Clone, Copy)]
pub struct UiSignals {
    pub open: RwSignal<bool>,
    /// Bumped whenever engine state changed outside a signal.
    pub revision: RwSignal<u64>,
}

struct DiscoveryBinding {
    window: web_sys::Window,
    handler: Closure<dyn FnMut(web_sys::CustomEvent)>,
}

thread_local! {
    static UI: Cell<Option<UiSignals>> = const { Cell::new(None) };
    static ENGINE: RefCell<Option<Rc<RefCell<MapEngine>>>> = const { RefCell::new(None) };
    static ENGINE_INBOX: RefCell<Option<DiscoveryInbox>> = const { RefCell::new(None) };
    // Discoveries reported before the engine finished booting.
    static PENDING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static DISCOVERY_BINDINGS: RefCell<Vec<DiscoveryBinding>> = const { RefCell::new(Vec::new()) };
}

pub fn bind_ui(ui: UiSignals) {
    UI.with(|slot| slot.set(Some(ui)));
}

fn ui() -> Option<UiSignals> {
    UI.with(Cell::get)
}

/// Hand the booted engine to the page. Replays discoveries that arrived early.
pub fn install(engine: Rc<RefCell<MapEngine>>) {
    let pending: Vec<String> = PENDING.with(|p| p.borrow_mut().drain(..).collect());
    if let Ok(mut e) = engine.try_borrow_mut() {
        for id in &pending {
            e.discover_location(id);
        }
        ENGINE_INBOX.with(|slot| *slot.borrow_mut() = Some(e.inbox()));
    }
    ENGINE.with(|slot| *slot.borrow_mut() = Some(engine));
    request_redraw();
}

pub fn engine() -> Option<Rc<RefCell<MapEngine>>> {
    ENGINE.with(|slot| slot.borrow().clone())
}

/// Read the engine. `None` before boot or while a mutable borrow is live.
pub fn read<R>(f: impl FnOnce(&MapEngine) -> R) -> Option<R> {
    let engine = engine()?;
    let guard = engine.try_borrow().ok()?;
    Some(f(&guard))
}

/// Mutate the engine and schedule a repaint.
pub fn update<R>(f: impl FnOnce(&mut MapEngine) -> R) -> Option<R> {
    let engine = engine()?;
    let result = {
        let mut guard = engine.try_borrow_mut().ok()?;
        f(&mut guard)
    };
    request_redraw();
    Some(result)
}

pub fn request_redraw() {
    if let Some(ui) = ui() {
        ui.revision.update(|r| *r = r.wrapping_add(1));
    }
}

/// Mark a location discovered. Returns `true` if it was new; ids queued
/// while the engine is booting or busy report `false`.
#[wasm_bindgen]
pub fn discover_location(id: String) -> bool {
    let Some(engine) = engine() else {
        PENDING.with(|p| p.borrow_mut().push(id));
        return false;
    };
    let changed = match engine.try_borrow_mut() {
        Ok(mut e) => e.discover_location(&id),
        Err(_) => {
            // Busy: the engine drains its inbox before the next operation.
            let inbox = ENGINE_INBOX.with(|slot| slot.borrow().clone());
            if let Some(inbox) = inbox {
                inbox.borrow_mut().push_back(id);
            }
            false
        }
    };
    request_redraw();
    changed
}

/// Discovered location ids as a JS string array.
#[wasm_bindgen]
pub fn discovered_locations() -> Result<JsValue, JsValue> {
    let ids = match engine() {
        Some(engine) => match engine.try_borrow_mut() {
            Ok(mut e) => e.discovered_locations(),
            Err(_) => {
                tracing::warn!("discovered_locations called while the map is busy");
                Vec::new()
            }
        },
        None => PENDING.with(|p| p.borrow().clone()),
    };
    serde_wasm_bindgen::to_value(&ids).map_err(JsValue::from)
}

#[wasm_bindgen]
pub fn open_map() {
    if let Some(ui) = ui() {
        ui.open.set(true);
    }
}

#[wasm_bindgen]
pub fn close_map() {
    if let Some(ui) = ui() {
        ui.open.set(false);
    }
}

/// Returns the new open state.
#[wasm_bindgen]
pub fn toggle_map() -> bool {
    let Some(ui) = ui() else {
        return false;
    };
    ui.open.update(|open| *open = !*open);
    ui.open.get_untracked()
}

#[derive(Deserialize)]
struct DiscoveryDetail {
    id: String,
}

/// `detail` may be the id itself or `{ id }`.
fn discovery_id(detail: JsValue) -> Option<String> {
    if let Some(id) = detail.as_string() {
        return Some(id);
    }
    serde_wasm_bindgen::from_value::<DiscoveryDetail>(detail)
        .ok()
        .map(|d| d.id)
}

/// `location-discovered` events on `window`, as a [`DiscoverySource`].
pub struct WindowDiscoveryFeed;

impl DiscoverySource for WindowDiscoveryFeed {
    fn on_location_discovered(&self, mut callback: Box<dyn FnMut(String)>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let handler = Closure::<dyn FnMut(web_sys::CustomEvent)>::new(
            move |e: web_sys::CustomEvent| {
                let Some(id) = discovery_id(e.detail()) else {
                    tracing::warn!("location-discovered event without an id");
                    return;
                };
                callback(id);
                // Apply right away so the record is saved even while the map is closed.
                update(|engine| engine.apply_pending_discoveries());
            },
        );
        if window
            .add_event_listener_with_callback(DISCOVERY_EVENT, handler.as_ref().unchecked_ref())
            .is_ok()
        {
            DISCOVERY_BINDINGS.with(|slot| {
                slot.borrow_mut().push(DiscoveryBinding { window, handler });
            });
        }
    }
}

/// Subscribe the engine to the page's discovery events, replacing any
/// earlier subscription.
pub fn connect_discovery_feed(engine: &MapEngine) {
    disconnect_discovery_feed();
    engine.subscribe(&WindowDiscoveryFeed);
}

pub fn disconnect_discovery_feed() {
    DISCOVERY_BINDINGS.with(|slot| {
        for binding in slot.borrow_mut().drain(..) {
            let _ = binding.window.remove_event_listener_with_callback(
                DISCOVERY_EVENT,
                binding.handler.as_ref().unchecked_ref(),
            );
        }
    });
}
