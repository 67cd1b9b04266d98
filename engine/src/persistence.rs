use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fog::{FogOfWar, RevealCircle};

/// Current layout version of the persisted fog record.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The persisted fog record: `{ "exploredAreas": [..], "version": 1 }` plus
/// optional cosmetic reveal discs and a save timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FogSnapshot {
    pub explored_areas: Vec<String>,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explored_radius: Vec<RevealCircle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Malformed(String),
    #[error("snapshot is not a JSON object")]
    NotAnObject,
    #[error("snapshot has no exploredAreas list")]
    MissingExploredAreas,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistError {
    #[error("fog store unavailable: {0}")]
    Unavailable(String),
    #[error("fog store write failed: {0}")]
    Write(String),
    #[error("fog snapshot encode failed: {0}")]
    Encode(String),
}

/// Result of decoding a snapshot: the fog plus notes about anything that had
/// to be skipped or interpreted best-effort.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSnapshot {
    pub fog: FogOfWar,
    pub version: u32,
    pub skipped_entries: usize,
}

impl DecodedSnapshot {
    /// Versions other than the current one are read as version 1.
    pub fn is_best_effort(&self) -> bool {
        self.version != SNAPSHOT_VERSION
    }
}

/// Encode fog state into its persisted record.
pub fn serialize(fog: &FogOfWar) -> FogSnapshot {
    FogSnapshot {
        explored_areas: fog.discovered_ids().map(str::to_string).collect(),
        version: SNAPSHOT_VERSION,
        explored_radius: fog.circles().to_vec(),
        saved_at: None,
    }
}

/// Restore fog state from a record. `deserialize(&serialize(f)) == f`.
pub fn deserialize(snapshot: &FogSnapshot) -> FogOfWar {
    let explored: BTreeSet<String> = snapshot
        .explored_areas
        .iter()
        .filter(|id| !id.is_empty())
        .cloned()
        .collect();
    FogOfWar::from_parts(explored, snapshot.explored_radius.clone())
}

pub fn to_json(fog: &FogOfWar) -> Result<String, PersistError> {
    let mut snapshot = serialize(fog);
    snapshot.saved_at = Some(Utc::now());
    serde_json::to_string(&snapshot).map_err(|e| PersistError::Encode(e.to_string()))
}

/// Decode a persisted record leniently. Unknown versions are read as v1;
/// individual malformed entries are skipped. Only a record with no usable
/// `exploredAreas` list is an error.
pub fn decode(json: &str) -> Result<DecodedSnapshot, SnapshotError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
    let obj = value.as_object().ok_or(SnapshotError::NotAnObject)?;

    let version = obj
        .get("version")
        .and_then(|v| v.as_u64())
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(0);

    let areas = obj
        .get("exploredAreas")
        .and_then(|v| v.as_array())
        .ok_or(SnapshotError::MissingExploredAreas)?;

    let mut skipped_entries = 0usize;
    let mut explored = BTreeSet::new();
    for entry in areas {
        match entry.as_str() {
            Some(id) if !id.is_empty() => {
                explored.insert(id.to_string());
            }
            _ => skipped_entries += 1,
        }
    }

    let mut circles = Vec::new();
    if let Some(radius) = obj.get("exploredRadius").and_then(|v| v.as_array()) {
        for entry in radius {
            match serde_json::from_value::<RevealCircle>(entry.clone()) {
                Ok(c) if c.r > 0.0 && c.x.is_finite() && c.y.is_finite() => circles.push(c),
                _ => skipped_entries += 1,
            }
        }
    }

    Ok(DecodedSnapshot {
        fog: FogOfWar::from_parts(explored, circles),
        version,
        skipped_entries,
    })
}

/// Restore fog from a persisted record, failing closed: anything unreadable
/// yields an empty fog and a single warning.
pub fn restore(json: &str) -> FogOfWar {
    match decode(json) {
        Ok(decoded) => {
            if decoded.is_best_effort() {
                warn!(
                    version = decoded.version,
                    expected = SNAPSHOT_VERSION,
                    "fog snapshot version not recognized, reading as v1"
                );
            }
            if decoded.skipped_entries > 0 {
                warn!(
                    skipped = decoded.skipped_entries,
                    "fog snapshot had malformed entries"
                );
            }
            decoded.fog
        }
        Err(e) => {
            warn!(error = %e, "fog snapshot unreadable, starting with empty fog");
            FogOfWar::new()
        }
    }
}

/// Durable storage for the fog record.
pub trait FogStore {
    fn load(&self) -> Result<Option<String>, PersistError>;
    fn save(&self, snapshot_json: &str) -> Result<(), PersistError>;
    fn clear(&self) -> Result<(), PersistError>;
}

/// In-memory store. Used when no durable store is available and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: RefCell<Option<String>>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(json: impl Into<String>) -> Self {
        let store = Self::default();
        *store.slot.borrow_mut() = Some(json.into());
        store
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl FogStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, PersistError> {
        Ok(self.slot.borrow().clone())
    }

    fn save(&self, snapshot_json: &str) -> Result<(), PersistError> {
        if self.fail_writes.get() {
            return Err(PersistError::Write("memory store rejecting writes".into()));
        }
        *self.slot.borrow_mut() = Some(snapshot_json.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}

// Shared handles let the owner keep inspecting a store after handing it over.
impl<S: FogStore + ?Sized> FogStore for std::rc::Rc<S> {
    fn load(&self) -> Result<Option<String>, PersistError> {
        (**self).load()
    }

    fn save(&self, snapshot_json: &str) -> Result<(), PersistError> {
        (**self).save(snapshot_json)
    }

    fn clear(&self) -> Result<(), PersistError> {
        (**self).clear()
    }
}

/// Persistence adapter: the engine's only cross-session state goes through
/// here. Failures are logged and never roll back in-memory fog.
pub struct Persistence {
    store: Box<dyn FogStore>,
}

impl Persistence {
    pub fn new(store: impl FogStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Load fog at session start. A missing record is a fresh game; an
    /// unreadable store or record yields empty fog.
    pub fn load_fog(&self) -> FogOfWar {
        match self.store.load() {
            Ok(Some(json)) => restore(&json),
            Ok(None) => {
                debug!("no persisted fog, starting fresh");
                FogOfWar::new()
            }
            Err(e) => {
                warn!(error = %e, "fog store load failed, starting with empty fog");
                FogOfWar::new()
            }
        }
    }

    pub fn save_fog(&self, fog: &FogOfWar) -> Result<(), PersistError> {
        let json = to_json(fog)?;
        self.store.save(&json).inspect_err(|e| {
            warn!(error = %e, explored = fog.len(), "failed to persist fog");
        })
    }

    pub fn clear(&self) -> Result<(), PersistError> {
        self.store.clear().inspect_err(|e| {
            warn!(error = %e, "failed to clear persisted fog");
        })
    }
}
