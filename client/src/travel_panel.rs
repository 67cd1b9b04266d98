use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;
use wayfarer_engine::{TravelError, fast_travel};

use crate::api;
use crate::app::{MapRevision, TravelTarget};
use crate::net::HttpTravelAuthority;
use crate::player::SignalPlayerLink;

/// Last fast-travel attempt, as shown under the prompt.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TravelStatus {
    #[default]
    Idle,
    Travelling(String),
    Arrived { name: String, at: String },
    Failed(String),
}

impl TravelStatus {
    pub fn message(&self) -> Option<String> {
        match self {
            TravelStatus::Idle => None,
            TravelStatus::Travelling(name) => Some(format!("Travelling to {name}\u{2026}")),
            TravelStatus::Arrived { name, at } => Some(format!("Arrived at {name} ({at})")),
            TravelStatus::Failed(reason) => Some(reason.clone()),
        }
    }
}

#[derive(Clone, Copy)]
pub struct TravelStatusSignal(pub RwSignal<TravelStatus>);

/// What the prompt needs about the selected POI, read from the engine.
#[derive(Debug, Clone, PartialEq)]
struct Prompt {
    id: String,
    name: String,
    kind: &'static str,
    glyph: &'static str,
    description: Option<String>,
    visited: bool,
    cost: Option<u64>,
    affordable: bool,
    busy: bool,
    blocked: Option<String>,
}

fn prompt_for(id: &str, player: &SignalPlayerLink) -> Option<Prompt> {
    api::read(|engine| {
        let poi = engine.registry().get(id)?;
        let quote = engine.travel_quote(player, id);
        let (cost, affordable, blocked) = match quote {
            Ok(q) => (Some(q.cost), q.affordable, None),
            Err(e) => (None, false, Some(e.to_string())),
        };
        Some(Prompt {
            id: id.to_string(),
            name: poi.def.name.clone(),
            kind: poi.def.kind.as_str(),
            glyph: poi.def.kind.glyph(),
            description: poi.def.description.clone(),
            visited: poi.is_visited(),
            cost,
            affordable,
            busy: engine.is_travelling(),
            blocked,
        })
    })
    .flatten()
}

fn start_travel(
    destination: String,
    name: String,
    player: SignalPlayerLink,
    status: RwSignal<TravelStatus>,
    travel_target: RwSignal<Option<String>>,
) {
    let Some(engine) = api::engine() else {
        return;
    };
    status.set(TravelStatus::Travelling(name.clone()));
    spawn_local(async move {
        let result = fast_travel(&engine, &HttpTravelAuthority, &player, &destination).await;
        match result {
            Ok(outcome) => {
                player.position.set(outcome.position);
                status.set(TravelStatus::Arrived {
                    name,
                    at: chrono::Local::now().format("%H:%M").to_string(),
                });
                travel_target.set(None);
            }
            // A newer request owns the prompt now.
            Err(TravelError::Superseded) => {}
            Err(e) => status.set(TravelStatus::Failed(e.to_string())),
        }
        api::request_redraw();
    });
}

const PANEL: &str = "position: absolute; right: 16px; bottom: 16px; z-index: 12; width: 280px; padding: 14px; background: #13161f; border: 1px solid #282c3e; border-radius: 8px; color: #e8e4d8; font-family: 'JetBrains Mono', monospace; font-size: 0.8rem;";

#[component]
pub fn TravelPanel() -> impl IntoView {
    let TravelTarget(travel_target) = expect_context();
    let MapRevision(revision) = expect_context();
    let TravelStatusSignal(status) = expect_context();
    let player: SignalPlayerLink = expect_context();

    let prompt = move || {
        revision.track();
        player.gold.track();
        player.position.track();
        let id = travel_target.get()?;
        prompt_for(&id, &player)
    };

    // A new selection clears the previous outcome.
    Effect::new(move || {
        if travel_target.get().is_some() && !matches!(status.get_untracked(), TravelStatus::Travelling(_)) {
            status.set(TravelStatus::Idle);
        }
    });

    view! {
        {move || {
            let status_line = status.get().message();
            match prompt() {
                Some(p) => {
                    let can_travel = p.affordable && !p.busy && p.blocked.is_none();
                    let cost_line = match (p.cost, &p.blocked) {
                        (Some(cost), _) => format!("Fast travel: {cost} gold"),
                        (None, Some(reason)) => reason.clone(),
                        (None, None) => String::new(),
                    };
                    let Prompt { id, name, kind, glyph, description, visited, .. } = p;
                    let travel_name = name.clone();
                    view! {
                        <div class="wayfarer-travel" style=PANEL>
                            <div style="display: flex; justify-content: space-between; align-items: baseline;">
                                <strong style="color: #f5c542;">{format!("{glyph} {name}")}</strong>
                                <button
                                    title="Close (Esc)"
                                    style="background: none; border: none; color: #5a5860; cursor: pointer;"
                                    on:click=move |_| travel_target.set(None)
                                >
                                    "\u{00D7}"
                                </button>
                            </div>
                            <div style="color: #5a5860; margin-top: 2px;">
                                {kind}
                                {if visited { " \u{00B7} visited" } else { "" }}
                            </div>
                            {description.map(|d| view! { <p style="margin: 8px 0; color: #9a968c;">{d}</p> })}
                            <div style="margin-top: 8px;">{cost_line}</div>
                            <button
                                style="margin-top: 10px; width: 100%; height: 32px; background: #1a1d2a; border: 1px solid #f5c542; border-radius: 6px; color: #f5c542; font-family: inherit; cursor: pointer;"
                                prop:disabled=!can_travel
                                on:click=move |_| {
                                    start_travel(id.clone(), travel_name.clone(), player, status, travel_target);
                                }
                            >
                                "Travel"
                            </button>
                            {status_line.map(|s| view! { <div style="margin-top: 8px; color: #9a968c;">{s}</div> })}
                        </div>
                    }
                        .into_any()
                }
                None => match status_line {
                    Some(s) => view! { <div class="wayfarer-travel" style=PANEL>{s}</div> }.into_any(),
                    None => ().into_any(),
                },
            }
        }}
    }
}
