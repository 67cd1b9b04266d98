//! Test doubles shared by the engine's unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;

use crate::config::MapConfig;
use crate::engine::{DiscoverySource, MapEngine};
use crate::geometry::{ScreenPoint, Size, WorldPoint};
use crate::persistence::{MemoryStore, Persistence};
use crate::poi::{PoiDef, PoiKind, PoiRegistry};
use crate::renderer::{Painter, Stroke, TextStyle};
use crate::travel::{PlayerLink, TravelAuthority, TravelError, TravelResponse};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Clear { size: Size, color: String },
    FillRect { x: f64, y: f64, w: f64, h: f64, color: String },
    StrokeRect { x: f64, y: f64, w: f64, h: f64, stroke: Stroke },
    Line { from: ScreenPoint, to: ScreenPoint, stroke: Stroke },
    FillCircle { center: ScreenPoint, radius: f64, color: String },
    StrokeCircle { center: ScreenPoint, radius: f64, stroke: Stroke },
    Polygon { points: Vec<ScreenPoint>, color: String },
    Text { text: String, at: ScreenPoint, style: TextStyle },
}

#[derive(Debug, Default)]
pub struct RecordingPainter {
    ops: Vec<PaintOp>,
}

impl RecordingPainter {
    pub fn ops(&self) -> &[PaintOp] {
        &self.ops
    }

    pub fn texts(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                PaintOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Painter for RecordingPainter {
    fn clear(&mut self, size: Size, color: &str) {
        self.ops.push(PaintOp::Clear {
            size,
            color: color.into(),
        });
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.ops.push(PaintOp::FillRect {
            x,
            y,
            w,
            h,
            color: color.into(),
        });
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, stroke: &Stroke) {
        self.ops.push(PaintOp::StrokeRect {
            x,
            y,
            w,
            h,
            stroke: stroke.clone(),
        });
    }

    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, stroke: &Stroke) {
        self.ops.push(PaintOp::Line {
            from,
            to,
            stroke: stroke.clone(),
        });
    }

    fn fill_circle(&mut self, center: ScreenPoint, radius: f64, color: &str) {
        self.ops.push(PaintOp::FillCircle {
            center,
            radius,
            color: color.into(),
        });
    }

    fn stroke_circle(&mut self, center: ScreenPoint, radius: f64, stroke: &Stroke) {
        self.ops.push(PaintOp::StrokeCircle {
            center,
            radius,
            stroke: stroke.clone(),
        });
    }

    fn polygon(&mut self, points: &[ScreenPoint], color: &str) {
        self.ops.push(PaintOp::Polygon {
            points: points.to_vec(),
            color: color.into(),
        });
    }

    fn text(&mut self, text: &str, at: ScreenPoint, style: &TextStyle) {
        self.ops.push(PaintOp::Text {
            text: text.into(),
            at,
            style: style.clone(),
        });
    }
}

/// Travel authority that replays queued replies (default: success) and can
/// hold the next request open until released.
#[derive(Default)]
pub struct ScriptedAuthority {
    calls: Cell<usize>,
    last_destination: RefCell<Option<String>>,
    replies: RefCell<VecDeque<Result<TravelResponse, TravelError>>>,
    gate: RefCell<Option<oneshot::Receiver<()>>>,
}

impl ScriptedAuthority {
    pub fn push_reply(&self, reply: Result<TravelResponse, TravelError>) {
        self.replies.borrow_mut().push_back(reply);
    }

    pub fn hold_next(&self, gate: oneshot::Receiver<()>) {
        *self.gate.borrow_mut() = Some(gate);
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn last_destination(&self) -> Option<String> {
        self.last_destination.borrow().clone()
    }
}

impl TravelAuthority for ScriptedAuthority {
    async fn request_travel(&self, destination: &str) -> Result<TravelResponse, TravelError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_destination.borrow_mut() = Some(destination.to_string());
        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            gate.await
                .map_err(|_| TravelError::Network("request dropped".into()))?;
        }
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(TravelResponse {
                success: true,
                new_position: None,
                error: None,
            }))
    }
}

pub struct FixedWallet {
    position: Cell<WorldPoint>,
    gold: Cell<u64>,
    refuse_debits: Cell<bool>,
}

impl FixedWallet {
    pub fn new(position: WorldPoint, gold: u64) -> Self {
        Self {
            position: Cell::new(position),
            gold: Cell::new(gold),
            refuse_debits: Cell::new(false),
        }
    }

    pub fn gold(&self) -> u64 {
        self.gold.get()
    }

    pub fn refuse_debits(&self) {
        self.refuse_debits.set(true);
    }
}

impl PlayerLink for FixedWallet {
    fn player_position(&self) -> WorldPoint {
        self.position.get()
    }

    fn player_currency(&self) -> u64 {
        self.gold.get()
    }

    fn debit_currency(&self, amount: u64) -> bool {
        if self.refuse_debits.get() || amount > self.gold.get() {
            return false;
        }
        self.gold.set(self.gold.get() - amount);
        true
    }
}

#[derive(Default)]
pub struct TestDiscoveryFeed {
    listeners: RefCell<Vec<Box<dyn FnMut(String)>>>,
}

impl TestDiscoveryFeed {
    pub fn emit(&self, id: &str) {
        for listener in self.listeners.borrow_mut().iter_mut() {
            listener(id.to_string());
        }
    }
}

impl DiscoverySource for TestDiscoveryFeed {
    fn on_location_discovered(&self, callback: Box<dyn FnMut(String)>) {
        self.listeners.borrow_mut().push(callback);
    }
}

fn entry(id: &str, name: &str, kind: PoiKind, x: f64, y: f64, tier: u8) -> PoiDef {
    PoiDef {
        id: id.into(),
        name: name.into(),
        kind,
        world_position: WorldPoint::new(x, y),
        priority_tier: tier,
        connections: Vec::new(),
        quest_linked: false,
        fast_travel: None,
        travel_cost: None,
        reveal_radius: None,
        description: None,
        discovered: false,
    }
}

/// Small world around a starting capital. Only the capital starts discovered.
pub fn sample_catalog() -> Vec<PoiDef> {
    let mut capital = entry("capital", "Crown City", PoiKind::City, 0.5, 0.5, 1);
    capital.discovered = true;
    let mut harbor = entry("harbor", "Saltmere Harbor", PoiKind::City, 0.62, 0.35, 1);
    harbor.connections = vec!["capital".into()];
    let mut westwatch = entry("westwatch", "Westwatch", PoiKind::Waypoint, 0.2, 0.4, 1);
    westwatch.connections = vec!["capital".into()];
    let mut shrine = entry("shrine", "Moonlit Shrine", PoiKind::Quest, 0.7, 0.6, 1);
    shrine.quest_linked = true;
    vec![
        capital,
        entry("northgate", "Northgate", PoiKind::City, 0.45, 0.2, 2),
        harbor,
        westwatch,
        shrine,
        entry("market", "Lantern Market", PoiKind::Shop, 0.55, 0.45, 2),
        entry("sunken-crypt", "Sunken Crypt", PoiKind::Dungeon, 0.85, 0.8, 3),
    ]
}

/// An engine standing at the capital with `discovered` revealed, backed by an
/// inspectable memory store.
pub fn sample_engine(discovered: &[&str]) -> (MapEngine, Rc<MemoryStore>) {
    let store = Rc::new(MemoryStore::new());
    let (registry, issues) = PoiRegistry::build(sample_catalog());
    assert!(issues.is_empty(), "{issues:?}");
    let mut engine = MapEngine::new(
        MapConfig::default(),
        registry,
        Persistence::new(store.clone()),
        WorldPoint::new(0.5, 0.5),
        Size::new(1280.0, 800.0),
    );
    for id in discovered {
        engine.discover_location(id);
    }
    (engine, store)
}
