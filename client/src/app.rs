use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use wayfarer_engine::{
    MapConfig, MapEngine, PlayerLink, PoiFilter, PoiRegistry, RenderOptions, Size, WorldPoint,
    ZoomDirection,
};

use crate::api::{self, UiSignals};
use crate::canvas::MapCanvas;
use crate::net;
use crate::player::SignalPlayerLink;
use crate::storage::{self, Settings};
use crate::travel_panel::{TravelPanel, TravelStatus, TravelStatusSignal};

const PLAYER_POLL_MS: u32 = 5_000;

pub(crate) fn canvas_dimensions() -> (f64, f64) {
    let Some(window) = web_sys::window() else {
        return (1200.0, 800.0);
    };
    let w = window
        .inner_width()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(1200.0);
    let h = window
        .inner_height()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(800.0);
    (w, h)
}

struct KeydownBinding {
    window: web_sys::Window,
    _handler: wasm_bindgen::closure::Closure<dyn Fn(web_sys::KeyboardEvent)>,
}

struct ResizeBinding {
    window: web_sys::Window,
    _handler: wasm_bindgen::closure::Closure<dyn Fn()>,
}

thread_local! {
    static RESIZE_BINDING: RefCell<Option<ResizeBinding>> = const { RefCell::new(None) };
    static KEYDOWN_BINDING: RefCell<Option<KeydownBinding>> = const { RefCell::new(None) };
    static PLAYER_POLL: RefCell<Option<gloo_timers::callback::Interval>> = const { RefCell::new(None) };
}

/// Whether the map overlay is showing.
#[derive(Clone, Copy)]
pub struct MapOpen(pub RwSignal<bool>);

/// Engine finished booting.
#[derive(Clone, Copy)]
pub struct MapReady(pub RwSignal<bool>);

/// Bumped on engine-side changes; read it to re-run views that query the engine.
#[derive(Clone, Copy)]
pub struct MapRevision(pub RwSignal<u64>);

/// POI the travel prompt is showing.
#[derive(Clone, Copy)]
pub struct TravelTarget(pub RwSignal<Option<String>>);

#[derive(Clone, Copy)]
pub struct ShowLabels(pub RwSignal<bool>);

#[derive(Clone, Copy)]
pub struct ShowPaths(pub RwSignal<bool>);

#[derive(Clone, Copy)]
pub struct ShowMinimap(pub RwSignal<bool>);

#[derive(Clone, Copy)]
pub struct ActiveFilter(pub RwSignal<PoiFilter>);

async fn boot(settings: Settings, player: SignalPlayerLink, ready: RwSignal<bool>) {
    let config = net::fetch_config().await.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "map config unavailable, using defaults");
        MapConfig::default()
    });
    let defs = net::load_catalog().await;
    match net::fetch_player().await {
        Ok(snapshot) => player.apply(&snapshot),
        Err(e) => tracing::warn!(error = %e, "player snapshot unavailable"),
    }

    let (registry, issues) = PoiRegistry::build(defs);
    if !issues.is_empty() {
        tracing::info!(issues = issues.len(), "poi catalog loaded with issues");
    }
    let (w, h) = canvas_dimensions();
    let mut engine = MapEngine::new(
        config,
        registry,
        storage::fog_persistence(),
        player.player_position(),
        Size::new(w, h),
    );
    engine.set_filter(settings.filter);
    engine.set_options(RenderOptions {
        show_labels: settings.show_labels,
        show_paths: settings.show_paths,
        show_minimap: settings.show_minimap,
    });
    api::connect_discovery_feed(&engine);
    api::install(Rc::new(RefCell::new(engine)));
    ready.set(true);
}

fn start_player_poll(player: SignalPlayerLink) {
    let interval = gloo_timers::callback::Interval::new(PLAYER_POLL_MS, move || {
        spawn_local(async move {
            match net::fetch_player().await {
                Ok(snapshot) => player.apply(&snapshot),
                Err(e) => tracing::debug!(error = %e, "player refresh failed"),
            }
        });
    });
    PLAYER_POLL.with(|slot| *slot.borrow_mut() = Some(interval));
}

fn stop_player_poll() {
    // Dropping the interval cancels it.
    PLAYER_POLL.with(|slot| slot.borrow_mut().take());
}

#[component]
pub fn App() -> impl IntoView {
    let open: RwSignal<bool> = RwSignal::new(false);
    let ready: RwSignal<bool> = RwSignal::new(false);
    let revision: RwSignal<u64> = RwSignal::new(0);
    let travel_target: RwSignal<Option<String>> = RwSignal::new(None);
    let travel_status: RwSignal<TravelStatus> = RwSignal::new(TravelStatus::Idle);
    let player = SignalPlayerLink::new(WorldPoint::CENTER, 0);

    let saved = storage::load_settings();
    let show_labels: RwSignal<bool> = RwSignal::new(saved.show_labels);
    let show_paths: RwSignal<bool> = RwSignal::new(saved.show_paths);
    let show_minimap: RwSignal<bool> = RwSignal::new(saved.show_minimap);
    let filter: RwSignal<PoiFilter> = RwSignal::new(saved.filter);

    provide_context(MapOpen(open));
    provide_context(MapReady(ready));
    provide_context(MapRevision(revision));
    provide_context(TravelTarget(travel_target));
    provide_context(TravelStatusSignal(travel_status));
    provide_context(ShowLabels(show_labels));
    provide_context(ShowPaths(show_paths));
    provide_context(ShowMinimap(show_minimap));
    provide_context(ActiveFilter(filter));
    provide_context(player);

    api::bind_ui(UiSignals { open, revision });
    spawn_local(boot(saved, player, ready));

    // Open/close drives the engine and the player refresh.
    Effect::new(move || {
        let is_open = open.get();
        if !ready.get() {
            return;
        }
        api::update(|engine| {
            if is_open {
                engine.open();
            } else {
                engine.close();
            }
        });
        if is_open {
            start_player_poll(player);
        } else {
            stop_player_poll();
            travel_target.set(None);
        }
    });

    // Persist preferences and push them into the engine.
    Effect::new(move || {
        let settings = Settings {
            show_labels: show_labels.get(),
            show_paths: show_paths.get(),
            show_minimap: show_minimap.get(),
            filter: filter.get(),
        };
        storage::save_settings(&settings);
        if !ready.get() {
            return;
        }
        api::update(|engine| {
            engine.set_filter(settings.filter);
            engine.set_options(RenderOptions {
                show_labels: settings.show_labels,
                show_paths: settings.show_paths,
                show_minimap: settings.show_minimap,
            });
        });
    });

    Effect::new(move || {
        let position = player.position.get();
        if !ready.get() {
            return;
        }
        api::update(|engine| engine.sync_player_position(position));
    });

    Effect::new(move || {
        let target = travel_target.get();
        if !ready.get() {
            return;
        }
        api::update(|engine| engine.select_travel_target(target));
    });

    // Window resizes repaint at the new size.
    Effect::new(move || {
        use wasm_bindgen::prelude::*;

        let Some(window) = web_sys::window() else {
            return;
        };
        RESIZE_BINDING.with(|slot| {
            if let Some(old) = slot.borrow_mut().take() {
                let _ = old.window.remove_event_listener_with_callback(
                    "resize",
                    old._handler.as_ref().unchecked_ref(),
                );
            }
        });
        let handler = Closure::<dyn Fn()>::new(api::request_redraw);
        if window
            .add_event_listener_with_callback("resize", handler.as_ref().unchecked_ref())
            .is_ok()
        {
            RESIZE_BINDING.with(|slot| {
                *slot.borrow_mut() = Some(ResizeBinding {
                    window: window.clone(),
                    _handler: handler,
                });
            });
        }
    });

    // Global keyboard shortcuts
    Effect::new(move || {
        use wasm_bindgen::prelude::*;

        let Some(window) = web_sys::window() else {
            return;
        };

        KEYDOWN_BINDING.with(|slot| {
            if let Some(old) = slot.borrow_mut().take() {
                let _ = old.window.remove_event_listener_with_callback(
                    "keydown",
                    old._handler.as_ref().unchecked_ref(),
                );
            }
        });

        let handler =
            Closure::<dyn Fn(web_sys::KeyboardEvent)>::new(move |e: web_sys::KeyboardEvent| {
                let target_tag = e
                    .target()
                    .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok())
                    .map(|el| el.tag_name())
                    .unwrap_or_default();
                if matches!(target_tag.as_str(), "INPUT" | "TEXTAREA" | "SELECT") {
                    return;
                }

                let key = e.key();
                if key == "m" || key == "M" {
                    open.update(|v| *v = !*v);
                    return;
                }
                if !open.get_untracked() {
                    return;
                }
                match key.as_str() {
                    "Escape" => {
                        if travel_target.get_untracked().is_some() {
                            travel_target.set(None);
                        } else {
                            open.set(false);
                        }
                    }
                    "+" | "=" => {
                        e.prevent_default();
                        api::update(|engine| engine.zoom(ZoomDirection::In));
                    }
                    "-" => {
                        e.prevent_default();
                        api::update(|engine| engine.zoom(ZoomDirection::Out));
                    }
                    "0" => {
                        api::update(|engine| engine.reset_view());
                    }
                    "c" | "C" => {
                        api::update(|engine| engine.center_on_player());
                    }
                    _ => {}
                }
            });

        if window
            .add_event_listener_with_callback("keydown", handler.as_ref().unchecked_ref())
            .is_ok()
        {
            KEYDOWN_BINDING.with(|slot| {
                *slot.borrow_mut() = Some(KeydownBinding {
                    window: window.clone(),
                    _handler: handler,
                });
            });
        }
    });

    view! {
        {move || {
            if open.get() {
                view! {
                    <div
                        class="wayfarer-map"
                        style="position: fixed; inset: 0; z-index: 50; background: #0c0e17; overflow: hidden;"
                    >
                        {move || {
                            if ready.get() {
                                view! { <MapCanvas /> }.into_any()
                            } else {
                                view! {
                                    <div style="position: absolute; inset: 0; display: flex; align-items: center; justify-content: center; color: #5a5860; font-family: 'JetBrains Mono', monospace;">
                                        "Charting the world\u{2026}"
                                    </div>
                                }
                                    .into_any()
                            }
                        }}
                        <Toolbar />
                        <TravelPanel />
                    </div>
                }
                    .into_any()
            } else {
                view! { <MapButton /> }.into_any()
            }
        }}
    }
}

/// Floating button shown while the map is closed.
#[component]
fn MapButton() -> impl IntoView {
    let MapOpen(open) = expect_context();

    view! {
        <button
            class="wayfarer-map-button"
            title="World map (M)"
            style="position: fixed; right: 16px; bottom: 16px; z-index: 40; padding: 8px 14px; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; color: #f5c542; font-family: 'JetBrains Mono', monospace; cursor: pointer;"
            on:click=move |_| open.set(true)
        >
            "Map"
        </button>
    }
}

const TOOL_BUTTON: &str = "width: 32px; height: 32px; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; color: #e8e4d8; font-family: 'JetBrains Mono', monospace; cursor: pointer;";

#[component]
fn Toolbar() -> impl IntoView {
    let MapOpen(open) = expect_context();
    let MapRevision(revision) = expect_context();
    let ShowLabels(show_labels) = expect_context();
    let ShowPaths(show_paths) = expect_context();
    let ShowMinimap(show_minimap) = expect_context();
    let ActiveFilter(filter) = expect_context();
    let player: SignalPlayerLink = expect_context();

    let progress = move || {
        revision.track();
        api::read(|engine| {
            let registry = engine.registry();
            format!("{}/{} discovered", registry.discovered_count(), registry.len())
        })
        .unwrap_or_default()
    };

    view! {
        <div
            class="wayfarer-toolbar"
            style="position: absolute; top: 16px; left: 16px; right: 16px; z-index: 10; display: flex; gap: 8px; align-items: center; flex-wrap: wrap; font-family: 'JetBrains Mono', monospace; font-size: 0.8rem; color: #9a968c;"
        >
            <button style=TOOL_BUTTON title="Zoom in (+)" on:click=move |_| { api::update(|e| e.zoom(ZoomDirection::In)); }>"+"</button>
            <button style=TOOL_BUTTON title="Zoom out (-)" on:click=move |_| { api::update(|e| e.zoom(ZoomDirection::Out)); }>"\u{2212}"</button>
            <button style=TOOL_BUTTON title="Reset view (0)" on:click=move |_| { api::update(|e| e.reset_view()); }>"\u{2302}"</button>
            <button style=TOOL_BUTTON title="Center on me (C)" on:click=move |_| { api::update(|e| e.center_on_player()); }>"\u{25CE}"</button>
            <select
                style="height: 32px; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; color: #e8e4d8; font-family: inherit;"
                prop:value=move || filter.get().to_string()
                on:change=move |ev| {
                    match event_target_value(&ev).parse::<PoiFilter>() {
                        Ok(f) => filter.set(f),
                        Err(e) => tracing::warn!(error = %e, "ignoring filter selection"),
                    }
                }
            >
                {PoiFilter::options()
                    .into_iter()
                    .map(|f| view! { <option value=f.to_string()>{f.label()}</option> })
                    .collect_view()}
            </select>
            <label>
                <input type="checkbox" prop:checked=move || show_labels.get() on:change=move |_| show_labels.update(|v| *v = !*v) />
                " Labels"
            </label>
            <label>
                <input type="checkbox" prop:checked=move || show_paths.get() on:change=move |_| show_paths.update(|v| *v = !*v) />
                " Paths"
            </label>
            <label>
                <input type="checkbox" prop:checked=move || show_minimap.get() on:change=move |_| show_minimap.update(|v| *v = !*v) />
                " Minimap"
            </label>
            <span style="margin-left: auto;">{progress}</span>
            <span style="color: #f5c542;">{move || format!("{} gold", player.gold.get())}</span>
            <button style=TOOL_BUTTON title="Close (M)" on:click=move |_| open.set(false)>"\u{00D7}"</button>
        </div>
    }
}
