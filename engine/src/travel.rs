use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TravelConfig;
use crate::geometry::{WorldPoint, world_distance};
use crate::poi::{Poi, PoiRegistry};

/// Why a fast-travel request did not happen. `Display` is the short
/// user-facing text; [`TravelError::code`] is the stable machine string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TravelError {
    #[error("Not enough gold ({cost} needed, {available} available)")]
    InsufficientFunds { cost: u64, available: u64 },
    #[error("You have not discovered this location yet")]
    NotDiscovered(String),
    #[error("Fast travel is not available here")]
    NotEligible(String),
    #[error("Unknown destination")]
    UnknownDestination(String),
    #[error("You are already here")]
    AlreadyThere(String),
    #[error("Travel failed: {0}")]
    Server(String),
    #[error("Could not reach the server")]
    Network(String),
    #[error("Already travelling")]
    InProgress,
    #[error("Travel request was cancelled")]
    Superseded,
}

impl TravelError {
    pub fn code(&self) -> &'static str {
        match self {
            TravelError::InsufficientFunds { .. } => "insufficient-funds",
            TravelError::NotDiscovered(_) => "not-discovered",
            TravelError::NotEligible(_) => "not-eligible",
            TravelError::UnknownDestination(_) => "unknown-destination",
            TravelError::AlreadyThere(_) => "already-there",
            TravelError::Server(_) => "server-error",
            TravelError::Network(_) => "network-error",
            TravelError::InProgress => "travel-in-progress",
            TravelError::Superseded => "superseded",
        }
    }

    /// Rejected before any request went out.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            TravelError::Server(_) | TravelError::Network(_) | TravelError::Superseded
        )
    }
}

/// Travel authority reply: `{success, newPosition?, error?}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_position: Option<WorldPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body sent to the travel authority. Only the destination id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelRequest {
    pub destination: String,
}

/// The server-side source of truth for travel commits.
#[allow(async_fn_in_trait)]
pub trait TravelAuthority {
    async fn request_travel(&self, destination: &str) -> Result<TravelResponse, TravelError>;
}

/// The game's player record, owned elsewhere.
pub trait PlayerLink {
    fn player_position(&self) -> WorldPoint;
    fn player_currency(&self) -> u64;
    /// Returns `false` if the debit could not be applied.
    fn debit_currency(&self, amount: u64) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelQuote {
    pub destination: String,
    pub cost: u64,
    pub distance: f64,
    pub affordable: bool,
}

/// The one outstanding request.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTicket {
    pub request_id: u64,
    pub destination: String,
    pub target: WorldPoint,
    pub cost: u64,
}

/// A committed trip, ready to apply locally.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelOutcome {
    pub destination: String,
    pub position: WorldPoint,
    pub cost: u64,
}

#[derive(Debug, Clone)]
pub struct FastTravel {
    config: TravelConfig,
    arrival_radius: f64,
    next_request_id: u64,
    in_flight: Option<TravelTicket>,
}

impl FastTravel {
    pub fn new(config: TravelConfig, arrival_radius: f64) -> Self {
        Self {
            config,
            arrival_radius,
            next_request_id: 1,
            in_flight: None,
        }
    }

    pub fn in_flight(&self) -> Option<&TravelTicket> {
        self.in_flight.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Explicit per-location price, else base cost plus distance.
    pub fn cost_to(&self, from: WorldPoint, destination: &Poi<'_>) -> u64 {
        if let Some(cost) = destination.def.travel_cost {
            return cost;
        }
        let units = world_distance(from, destination.position()) * self.config.cost_per_unit;
        // Strip float noise first so 0.3 units at 100/unit costs 30, not 31.
        let units = (units * 1e6).round() / 1e6;
        // `as` saturates; the sum must too.
        self.config.base_cost.saturating_add(units.ceil().max(0.0) as u64)
    }

    fn check_destination<'r>(
        &self,
        registry: &'r PoiRegistry,
        from: WorldPoint,
        destination: &str,
    ) -> Result<Poi<'r>, TravelError> {
        let Some(poi) = registry.get(destination) else {
            return Err(TravelError::UnknownDestination(destination.to_string()));
        };
        if !poi.is_discovered() {
            return Err(TravelError::NotDiscovered(destination.to_string()));
        }
        if !poi.def.is_fast_travel_eligible() {
            return Err(TravelError::NotEligible(destination.to_string()));
        }
        if world_distance(from, poi.position()) <= self.arrival_radius {
            return Err(TravelError::AlreadyThere(destination.to_string()));
        }
        Ok(poi)
    }

    /// Price for a discovered, eligible destination. Undiscovered places are
    /// never priced.
    pub fn quote(
        &self,
        registry: &PoiRegistry,
        from: WorldPoint,
        currency: u64,
        destination: &str,
    ) -> Result<TravelQuote, TravelError> {
        let poi = self.check_destination(registry, from, destination)?;
        let cost = self.cost_to(from, &poi);
        Ok(TravelQuote {
            destination: destination.to_string(),
            cost,
            distance: world_distance(from, poi.position()),
            affordable: currency >= cost,
        })
    }

    /// Validate locally and issue a ticket. Every rejection here happens
    /// before any request is sent.
    pub fn begin(
        &mut self,
        registry: &PoiRegistry,
        from: WorldPoint,
        currency: u64,
        destination: &str,
    ) -> Result<TravelTicket, TravelError> {
        if self.in_flight.is_some() {
            return Err(TravelError::InProgress);
        }
        let quote = self.quote(registry, from, currency, destination)?;
        if !quote.affordable {
            return Err(TravelError::InsufficientFunds {
                cost: quote.cost,
                available: currency,
            });
        }
        let target = registry
            .get(destination)
            .map(|p| p.position())
            .ok_or_else(|| TravelError::UnknownDestination(destination.to_string()))?;

        let ticket = TravelTicket {
            request_id: self.next_request_id,
            destination: quote.destination,
            target,
            cost: quote.cost,
        };
        self.next_request_id += 1;
        self.in_flight = Some(ticket.clone());
        debug!(
            request_id = ticket.request_id,
            destination = %ticket.destination,
            cost = ticket.cost,
            "fast travel requested"
        );
        Ok(ticket)
    }

    /// Resolve a ticket with the authority's reply. A ticket that is no longer
    /// the in-flight one resolves to [`TravelError::Superseded`] and changes
    /// nothing.
    pub fn finish(
        &mut self,
        ticket: &TravelTicket,
        reply: Result<TravelResponse, TravelError>,
    ) -> Result<TravelOutcome, TravelError> {
        match &self.in_flight {
            Some(current) if current.request_id == ticket.request_id => {}
            _ => {
                debug!(request_id = ticket.request_id, "stale travel response ignored");
                return Err(TravelError::Superseded);
            }
        }
        self.in_flight = None;

        let response = reply?;
        if !response.success {
            return Err(TravelError::Server(
                response
                    .error
                    .unwrap_or_else(|| "travel refused".to_string()),
            ));
        }
        let position = response
            .new_position
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .unwrap_or(ticket.target);
        info!(destination = %ticket.destination, "fast travel committed");
        Ok(TravelOutcome {
            destination: ticket.destination.clone(),
            position,
            cost: ticket.cost,
        })
    }

    /// Drop the in-flight ticket; its response will be ignored.
    pub fn abandon(&mut self) -> Option<TravelTicket> {
        let dropped = self.in_flight.take();
        if let Some(ticket) = &dropped {
            debug!(request_id = ticket.request_id, "fast travel abandoned");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fog::FogOfWar;
    use crate::poi::PoiKind;
    use crate::poi::tests::def;

    fn registry() -> PoiRegistry {
        let mut pricey = def("summit", PoiKind::Waypoint, 0.9, 0.9, 1);
        pricey.travel_cost = Some(500);
        let no_travel = def("bazaar", PoiKind::Shop, 0.4, 0.4, 1);
        let (mut registry, _) = PoiRegistry::build(vec![
            def("home", PoiKind::City, 0.1, 0.1, 1),
            def("harbor", PoiKind::City, 0.4, 0.1, 1),
            def("ruins", PoiKind::Waypoint, 0.7, 0.7, 2),
            pricey,
            no_travel,
        ]);
        let mut fog = FogOfWar::new();
        for id in ["home", "harbor", "summit", "bazaar"] {
            fog.reveal(id);
        }
        registry.sync_discovery(&fog);
        registry
    }

    fn coordinator() -> FastTravel {
        FastTravel::new(TravelConfig::default(), 0.01)
    }

    const HOME: WorldPoint = WorldPoint::new(0.1, 0.1);

    #[test]
    fn cost_is_base_plus_distance_or_override() {
        let reg = registry();
        let ft = coordinator();
        let quote = ft.quote(&reg, HOME, 100, "harbor").expect("quotable");
        // 0.3 world units at 100 per unit, rounded up, plus base 10.
        assert_eq!(quote.cost, 40);
        assert!(quote.affordable);
        let summit = ft.quote(&reg, HOME, 100, "summit").expect("quotable");
        assert_eq!(summit.cost, 500);
        assert!(!summit.affordable);
    }

    #[test]
    fn extreme_rates_saturate_instead_of_overflowing() {
        let reg = registry();
        let harbor = reg.get("harbor").expect("in catalog");
        let ft = FastTravel::new(
            TravelConfig {
                base_cost: u64::MAX - 5,
                cost_per_unit: 1e300,
            },
            0.01,
        );
        assert_eq!(ft.cost_to(HOME, &harbor), u64::MAX);

        let ft = FastTravel::new(
            TravelConfig {
                base_cost: 10,
                cost_per_unit: f64::INFINITY,
            },
            0.01,
        );
        assert_eq!(ft.cost_to(HOME, &harbor), u64::MAX);
        let quote = ft.quote(&reg, HOME, 1_000_000, "harbor").expect("quotable");
        assert!(!quote.affordable);
    }

    #[test]
    fn local_rejections_carry_stable_codes() {
        let reg = registry();
        let mut ft = coordinator();
        let code = |r: Result<TravelTicket, TravelError>| r.map(|_| "ok").unwrap_or_else(|e| e.code());
        assert_eq!(code(ft.begin(&reg, HOME, 1000, "ruins")), "not-discovered");
        assert_eq!(code(ft.begin(&reg, HOME, 1000, "bazaar")), "not-eligible");
        assert_eq!(code(ft.begin(&reg, HOME, 1000, "atlantis")), "unknown-destination");
        assert_eq!(code(ft.begin(&reg, HOME, 1000, "home")), "already-there");
        assert_eq!(code(ft.begin(&reg, HOME, 5, "harbor")), "insufficient-funds");
        assert!(!ft.is_busy());
    }

    #[test]
    fn second_request_is_rejected_while_in_flight() {
        let reg = registry();
        let mut ft = coordinator();
        let ticket = ft.begin(&reg, HOME, 1000, "harbor").expect("ticket");
        assert_eq!(ft.begin(&reg, HOME, 1000, "summit"), Err(TravelError::InProgress));
        let outcome = ft
            .finish(
                &ticket,
                Ok(TravelResponse {
                    success: true,
                    new_position: Some(WorldPoint::new(0.41, 0.1)),
                    error: None,
                }),
            )
            .expect("committed");
        assert_eq!(outcome.position, WorldPoint::new(0.41, 0.1));
        assert_eq!(outcome.cost, 40);
        assert!(!ft.is_busy());
    }

    #[test]
    fn abandoned_ticket_resolves_as_superseded() {
        let reg = registry();
        let mut ft = coordinator();
        let old = ft.begin(&reg, HOME, 1000, "harbor").expect("ticket");
        ft.abandon();
        let new = ft.begin(&reg, HOME, 1000, "summit").expect("ticket");
        assert!(new.request_id > old.request_id);
        let stale = ft.finish(
            &old,
            Ok(TravelResponse {
                success: true,
                ..Default::default()
            }),
        );
        assert_eq!(stale, Err(TravelError::Superseded));
        assert_eq!(ft.in_flight().map(|t| t.request_id), Some(new.request_id));
    }

    #[test]
    fn refusal_and_transport_errors_clear_the_ticket() {
        let reg = registry();
        let mut ft = coordinator();
        let t = ft.begin(&reg, HOME, 1000, "harbor").expect("ticket");
        let refused = ft.finish(
            &t,
            Ok(TravelResponse {
                success: false,
                new_position: None,
                error: Some("gate closed".into()),
            }),
        );
        assert_eq!(refused, Err(TravelError::Server("gate closed".into())));
        assert!(!ft.is_busy());

        let t = ft.begin(&reg, HOME, 1000, "harbor").expect("ticket");
        let failed = ft.finish(&t, Err(TravelError::Network("offline".into())));
        assert_eq!(failed.map_err(|e| e.code()), Err("network-error"));
        assert!(!ft.is_busy());
    }

    #[test]
    fn missing_position_falls_back_to_destination() {
        let reg = registry();
        let mut ft = coordinator();
        let t = ft.begin(&reg, HOME, 1000, "harbor").expect("ticket");
        let outcome = ft
            .finish(
                &t,
                Ok(TravelResponse {
                    success: true,
                    ..Default::default()
                }),
            )
            .expect("committed");
        assert_eq!(outcome.position, WorldPoint::new(0.4, 0.1));
    }

    #[test]
    fn response_json_is_camel_case() {
        let r: TravelResponse =
            serde_json::from_str(r#"{"success":true,"newPosition":{"x":0.2,"y":0.3}}"#)
                .expect("parses");
        assert_eq!(r.new_position, Some(WorldPoint::new(0.2, 0.3)));
        let r: TravelResponse =
            serde_json::from_str(r#"{"success":false,"error":"nope"}"#).expect("parses");
        assert_eq!(r.error.as_deref(), Some("nope"));
    }
}
