use gloo_net::http::Request;
use serde::Deserialize;
use wayfarer_engine::travel::TravelRequest;
use wayfarer_engine::{
    MapConfig, PoiDef, TravelAuthority, TravelError, TravelResponse, WorldPoint,
};

const CONFIG_URL: &str = "/api/map/config";
const CATALOG_URL: &str = "/api/map/catalog";
const PLAYER_URL: &str = "/api/player";
const TRAVEL_URL: &str = "/api/travel";

/// Bundled demo world, used when the catalog endpoint is unavailable.
const EMBEDDED_CATALOG: &str = include_str!("../assets/catalog.json");

/// Server-tuned map constants. Missing fields keep their defaults; invalid
/// values are repaired and logged by the engine.
pub async fn fetch_config() -> Result<MapConfig, String> {
    let resp = Request::get(CONFIG_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }
    let text = resp
        .text()
        .await
        .map_err(|e| format!("read error: {e}"))?;
    MapConfig::from_json(&text).map_err(|e| e.to_string())
}

pub async fn fetch_catalog() -> Result<Vec<PoiDef>, String> {
    let resp = Request::get(CATALOG_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }
    resp.json::<Vec<PoiDef>>()
        .await
        .map_err(|e| format!("parse error: {e}"))
}

pub fn embedded_catalog() -> Result<Vec<PoiDef>, String> {
    serde_json::from_str(EMBEDDED_CATALOG).map_err(|e| format!("embedded catalog: {e}"))
}

/// Live catalog, or the bundled one if the server has none.
pub async fn load_catalog() -> Vec<PoiDef> {
    match fetch_catalog().await {
        Ok(defs) => defs,
        Err(e) => {
            tracing::warn!(error = %e, "poi catalog unavailable, using bundled catalog");
            embedded_catalog().unwrap_or_else(|e| {
                tracing::error!(error = %e, "bundled catalog is invalid");
                Vec::new()
            })
        }
    }
}

/// Read-only player snapshot served by the game.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub gold: u64,
}

impl PlayerSnapshot {
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }
}

pub async fn fetch_player() -> Result<PlayerSnapshot, String> {
    let resp = Request::get(PLAYER_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }
    resp.json::<PlayerSnapshot>()
        .await
        .map_err(|e| format!("parse error: {e}"))
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Map an HTTP reply from the travel endpoint onto the engine's reply type.
pub fn interpret_travel_response(status: u16, body: &str) -> Result<TravelResponse, TravelError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(TravelError::Server(message));
    }
    serde_json::from_str::<TravelResponse>(body)
        .map_err(|e| TravelError::Server(format!("unreadable travel response: {e}")))
}

/// Travel authority backed by `POST /api/travel`.
#[derive(Debug, Clone, Default)]
pub struct HttpTravelAuthority;

async fn post_travel(destination: &str) -> Result<(u16, String), String> {
    let body = TravelRequest {
        destination: destination.to_string(),
    };
    let resp = Request::post(TRAVEL_URL)
        .json(&body)
        .map_err(|e| format!("encode error: {e}"))?
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| format!("read error: {e}"))?;
    Ok((status, text))
}

impl TravelAuthority for HttpTravelAuthority {
    async fn request_travel(&self, destination: &str) -> Result<TravelResponse, TravelError> {
        let (status, body) = post_travel(destination)
            .await
            .map_err(TravelError::Network)?;
        interpret_travel_response(status, &body)
    }
}
