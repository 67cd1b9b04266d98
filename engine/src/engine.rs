use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::camera::{Camera, CameraResponse, InputEvent, ZoomDirection};
use crate::config::MapConfig;
use crate::fog::FogOfWar;
use crate::geometry::{ScreenPoint, Size, WorldPoint, visible_world_rect};
use crate::persistence::Persistence;
use crate::poi::{Poi, PoiRegistry};
use crate::renderer::{
    FrameStats, MapRenderer, MinimapLayout, Painter, RenderOptions, Scene, minimap_hit,
};
use crate::travel::{
    FastTravel, PlayerLink, TravelAuthority, TravelError, TravelOutcome, TravelQuote,
    TravelResponse, TravelTicket,
};
use crate::visibility::{PoiFilter, VisibilityPolicy};

/// Discovery ids pushed by collaborators, applied before the next operation
/// or frame.
pub type DiscoveryInbox = Rc<RefCell<VecDeque<String>>>;

/// A game-side feed of discovery events.
pub trait DiscoverySource {
    fn on_location_discovered(&self, callback: Box<dyn FnMut(String)>);
}

/// Result of routing one input event through the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Ignored,
    Redraw,
    /// A visible POI was clicked; the travel prompt now targets it.
    Selected(String),
}

/// Composition root: owns every piece of map state and is the only thing the
/// client talks to.
pub struct MapEngine {
    config: MapConfig,
    registry: PoiRegistry,
    fog: FogOfWar,
    policy: VisibilityPolicy,
    camera: Camera,
    player: WorldPoint,
    travel: FastTravel,
    persistence: Persistence,
    renderer: MapRenderer,
    filter: PoiFilter,
    options: RenderOptions,
    open: bool,
    travel_target: Option<String>,
    last_travel_error: Option<TravelError>,
    inbox: DiscoveryInbox,
    clock_ms: f64,
    dirty: bool,
}

impl MapEngine {
    /// Build the engine, restoring fog from `persistence` and seeding any
    /// catalog entries that start discovered.
    pub fn new(
        config: MapConfig,
        registry: PoiRegistry,
        persistence: Persistence,
        player: WorldPoint,
        viewport: Size,
    ) -> Self {
        let mut fog = persistence.load_fog();
        fog.set_circle_limit(config.fog.max_reveal_circles);

        let world_size = Size::new(config.world.width_px, config.world.height_px);
        let camera = Camera::new(config.camera.clone(), world_size, viewport);
        let travel = FastTravel::new(config.travel.clone(), config.fog.visit_radius);
        let policy = VisibilityPolicy::new(config.lod.clone());

        let mut engine = Self {
            config,
            registry,
            fog,
            policy,
            camera,
            player,
            travel,
            persistence,
            renderer: MapRenderer::new(),
            filter: PoiFilter::All,
            options: RenderOptions::default(),
            open: false,
            travel_target: None,
            last_travel_error: None,
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            clock_ms: 0.0,
            dirty: true,
        };

        if engine.seed_initial_discoveries() {
            engine.persist();
        }
        engine.registry.sync_discovery(&engine.fog);
        engine.sync_player_position(player);
        info!(
            pois = engine.registry.len(),
            discovered = engine.fog.len(),
            "map engine ready"
        );
        engine
    }

    fn seed_initial_discoveries(&mut self) -> bool {
        let seeds: Vec<String> = self
            .registry
            .initially_discovered()
            .map(str::to_string)
            .collect();
        let mut changed = false;
        for id in seeds {
            changed |= self.fog.reveal(&id);
        }
        changed
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn registry(&self) -> &PoiRegistry {
        &self.registry
    }

    pub fn fog(&self) -> &FogOfWar {
        &self.fog
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn player_position(&self) -> WorldPoint {
        self.player
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // --- discovery ---

    /// Shared inbox for collaborators that cannot borrow the engine directly.
    pub fn inbox(&self) -> DiscoveryInbox {
        self.inbox.clone()
    }

    /// Route a discovery feed into the inbox.
    pub fn subscribe(&self, source: &dyn DiscoverySource) {
        let inbox = self.inbox.clone();
        source.on_location_discovered(Box::new(move |id| {
            inbox.borrow_mut().push_back(id);
        }));
    }

    fn drain_inbox(&mut self) -> usize {
        let pending: Vec<String> = self.inbox.borrow_mut().drain(..).collect();
        pending.iter().filter(|id| self.reveal(id)).count()
    }

    /// Apply queued discovery events now. Returns how many were new.
    pub fn apply_pending_discoveries(&mut self) -> usize {
        self.drain_inbox()
    }

    /// Mark `id` discovered. Returns `true` if it was new.
    pub fn discover_location(&mut self, id: &str) -> bool {
        self.drain_inbox();
        self.reveal(id)
    }

    pub fn discovered_locations(&mut self) -> Vec<String> {
        self.drain_inbox();
        self.fog.discovered_ids().map(str::to_string).collect()
    }

    /// The single write path for discovery: fog first, then the registry
    /// overlay, then storage.
    fn reveal(&mut self, id: &str) -> bool {
        let changed = self.fog.reveal(id);
        if !changed {
            return false;
        }
        match self.registry.get(id) {
            Some(poi) => {
                let radius = poi
                    .def
                    .reveal_radius
                    .unwrap_or(self.config.fog.default_reveal_radius);
                self.fog.reveal_area(poi.position(), radius);
            }
            None => debug!(id, "discovered id is not in the poi catalog"),
        }
        self.registry.sync_discovery(&self.fog);
        self.persist();
        self.dirty = true;
        info!(id, discovered = self.fog.len(), "location discovered");
        true
    }

    fn persist(&self) {
        // Failures are logged by the adapter; in-memory fog stays authoritative.
        self.persistence.save_fog(&self.fog).ok();
    }

    /// Follow the player: nearby POIs become visited, slightly wider ones
    /// discovered.
    pub fn sync_player_position(&mut self, position: WorldPoint) {
        self.drain_inbox();
        if !position.x.is_finite() || !position.y.is_finite() {
            warn!(
                x = position.x,
                y = position.y,
                "ignoring non-finite player position"
            );
            return;
        }
        if position != self.player {
            self.player = position;
            self.dirty = true;
        }
        let visited = self
            .registry
            .mark_visited_near(position, self.config.fog.visit_radius);
        if !visited.is_empty() {
            debug!(?visited, "pois visited");
            self.dirty = true;
        }

        let nearby: Vec<String> = self
            .registry
            .within(position, self.config.fog.discovery_radius)
            .into_iter()
            .filter(|p| !p.is_discovered())
            .map(|p| p.id().to_string())
            .collect();
        let mut revealed_any = false;
        for id in &nearby {
            revealed_any |= self.reveal(id);
        }
        if self
            .fog
            .reveal_area(position, self.config.fog.player_radius)
            && !revealed_any
        {
            self.persist();
            self.dirty = true;
        }
    }

    /// Forget all exploration: fog, visited flags and the stored record.
    pub fn reset_progress(&mut self) {
        self.inbox.borrow_mut().clear();
        self.travel.abandon();
        self.fog.reset();
        self.registry.clear_overlay();
        self.persistence.clear().ok();
        self.seed_initial_discoveries();
        self.registry.sync_discovery(&self.fog);
        self.travel_target = None;
        self.last_travel_error = None;
        self.camera.reset();
        self.dirty = true;
        info!("map progress reset");
    }

    // --- open/close ---

    pub fn open(&mut self) {
        self.drain_inbox();
        if self.open {
            return;
        }
        self.open = true;
        self.camera.center_on(self.player, None);
        self.dirty = true;
        debug!("map opened");
    }

    /// Close the map. Camera state is session-local and discarded here.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.camera.reset();
        self.travel_target = None;
        self.dirty = true;
        debug!("map closed");
    }

    pub fn toggle(&mut self) -> bool {
        if self.open {
            self.close();
        } else {
            self.open();
        }
        self.open
    }

    // --- camera & input ---

    fn minimap_layout(&self) -> Option<MinimapLayout> {
        if !self.options.show_minimap {
            return None;
        }
        MinimapLayout::place(self.camera.projection().viewport(), &self.config.minimap)
    }

    pub fn handle_input(&mut self, event: InputEvent) -> InputOutcome {
        self.drain_inbox();
        if !self.open {
            return InputOutcome::Ignored;
        }

        // Pressing on the minimap jumps there instead of starting a pan.
        if let InputEvent::PointerDown { at } = event
            && let Some(layout) = self.minimap_layout()
            && let Some(world) = minimap_hit(&layout, at)
        {
            self.camera.center_on(world, None);
            self.dirty = true;
            return InputOutcome::Redraw;
        }

        match self.camera.handle(event) {
            CameraResponse::Unchanged => InputOutcome::Ignored,
            CameraResponse::Changed => {
                self.dirty = true;
                InputOutcome::Redraw
            }
            CameraResponse::Click(at) => self.click(at),
        }
    }

    fn click(&mut self, at: ScreenPoint) -> InputOutcome {
        let hit = self.poi_at(at).map(|p| p.id().to_string());
        match hit {
            Some(id) => {
                self.travel_target = Some(id.clone());
                self.last_travel_error = None;
                self.dirty = true;
                InputOutcome::Selected(id)
            }
            None if self.travel_target.take().is_some() => {
                self.dirty = true;
                InputOutcome::Redraw
            }
            None => InputOutcome::Ignored,
        }
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if self.camera.resize(viewport).changed() {
            self.dirty = true;
        }
    }

    pub fn zoom(&mut self, direction: ZoomDirection) {
        self.handle_camera(InputEvent::ZoomButton { direction });
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if self.camera.set_zoom(zoom).changed() {
            self.dirty = true;
        }
    }

    fn handle_camera(&mut self, event: InputEvent) {
        if self.camera.handle(event).changed() {
            self.dirty = true;
        }
    }

    pub fn center_on_player(&mut self) {
        self.camera.animate_to(self.player, None);
        self.dirty = true;
    }

    pub fn reset_view(&mut self) {
        self.camera.reset_view();
        self.dirty = true;
    }

    // --- visibility ---

    pub fn filter(&self) -> PoiFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: PoiFilter) {
        if filter != self.filter {
            self.filter = filter;
            self.dirty = true;
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        if options != self.options {
            self.options = options;
            self.dirty = true;
        }
    }

    pub fn should_render(&self, id: &str) -> bool {
        self.registry.get(id).is_some_and(|poi| {
            self.policy
                .should_render(&poi, self.camera.projection(), self.filter)
        })
    }

    pub fn poi_at(&self, screen: ScreenPoint) -> Option<Poi<'_>> {
        self.policy
            .poi_at(&self.registry, self.camera.projection(), self.filter, screen)
    }

    // --- frames ---

    /// Advance time-based state. Returns `true` if a redraw is due.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.drain_inbox();
        self.clock_ms = now_ms;
        if self.camera.tick(now_ms) {
            self.dirty = true;
        }
        self.dirty || self.needs_animation_frame()
    }

    /// Only while open, and only if something on screen is moving.
    pub fn needs_animation_frame(&self) -> bool {
        self.open && (self.camera.is_animating() || self.has_visible_quest_marker())
    }

    fn has_visible_quest_marker(&self) -> bool {
        let projection = self.camera.projection();
        let visible = visible_world_rect(projection);
        self.registry.iter().any(|poi| {
            poi.def.quest_linked
                && visible.contains(poi.position())
                && self.policy.should_render(&poi, projection, self.filter)
        })
    }

    /// Draw a frame. Nothing is drawn while the map is closed.
    pub fn render(&mut self, painter: Option<&mut dyn Painter>) -> Option<FrameStats> {
        self.drain_inbox();
        if !self.open {
            return None;
        }
        let scene = Scene {
            projection: self.camera.projection(),
            registry: &self.registry,
            fog: &self.fog,
            policy: &self.policy,
            config: &self.config,
            filter: self.filter,
            player: self.player,
            selected: self.travel_target.as_deref(),
            options: self.options,
            now_ms: self.clock_ms,
        };
        let stats = self.renderer.render(painter, &scene);
        if stats.is_some() {
            self.dirty = false;
        }
        stats
    }

    // --- fast travel ---

    pub fn travel_target(&self) -> Option<&str> {
        self.travel_target.as_deref()
    }

    pub fn select_travel_target(&mut self, id: Option<String>) {
        if id != self.travel_target {
            self.travel_target = id;
            self.last_travel_error = None;
            self.dirty = true;
        }
    }

    pub fn last_travel_error(&self) -> Option<&TravelError> {
        self.last_travel_error.as_ref()
    }

    pub fn is_travelling(&self) -> bool {
        self.travel.is_busy()
    }

    pub fn travel_quote(
        &self,
        player: &dyn PlayerLink,
        destination: &str,
    ) -> Result<TravelQuote, TravelError> {
        self.travel.quote(
            &self.registry,
            player.player_position(),
            player.player_currency(),
            destination,
        )
    }

    /// First half of a trip: local validation and ticket. No state changes
    /// besides the in-flight marker.
    pub fn begin_fast_travel(
        &mut self,
        player: &dyn PlayerLink,
        destination: &str,
    ) -> Result<TravelTicket, TravelError> {
        self.drain_inbox();
        self.travel
            .begin(
                &self.registry,
                player.player_position(),
                player.player_currency(),
                destination,
            )
            .inspect_err(|e| {
                info!(code = e.code(), destination, "fast travel rejected");
                self.last_travel_error = Some(e.clone());
                self.dirty = true;
            })
    }

    /// Second half: apply the authority's reply. Failures leave every piece of
    /// local state untouched.
    pub fn complete_fast_travel(
        &mut self,
        ticket: &TravelTicket,
        reply: Result<TravelResponse, TravelError>,
        player: &dyn PlayerLink,
    ) -> Result<TravelOutcome, TravelError> {
        let outcome = match self.travel.finish(ticket, reply) {
            Ok(outcome) => outcome,
            Err(TravelError::Superseded) => return Err(TravelError::Superseded),
            Err(e) => {
                warn!(
                    code = e.code(),
                    error = %e,
                    destination = %ticket.destination,
                    "fast travel failed"
                );
                self.last_travel_error = Some(e.clone());
                self.dirty = true;
                return Err(e);
            }
        };

        self.player = outcome.position;
        self.camera.animate_to(outcome.position, None);
        self.reveal(&outcome.destination);
        self.registry
            .mark_visited_near(outcome.position, self.config.fog.visit_radius);
        if self
            .fog
            .reveal_area(outcome.position, self.config.fog.player_radius)
        {
            self.persist();
        }
        self.travel_target = None;
        self.last_travel_error = None;
        self.dirty = true;

        if !player.debit_currency(outcome.cost) {
            warn!(
                cost = outcome.cost,
                destination = %outcome.destination,
                "travel committed but local wallet debit failed"
            );
        }
        Ok(outcome)
    }

    /// Give up on the in-flight request; its reply will be ignored.
    pub fn abandon_travel(&mut self) -> bool {
        self.travel.abandon().is_some()
    }
}

/// Fast travel round trip. The engine is borrowed only around the await,
/// never across it.
pub async fn fast_travel<A: TravelAuthority>(
    engine: &RefCell<MapEngine>,
    authority: &A,
    player: &dyn PlayerLink,
    destination: &str,
) -> Result<TravelOutcome, TravelError> {
    let ticket = engine.borrow_mut().begin_fast_travel(player, destination)?;
    let reply = authority.request_travel(&ticket.destination).await;
    engine
        .borrow_mut()
        .complete_fast_travel(&ticket, reply, player)
}
