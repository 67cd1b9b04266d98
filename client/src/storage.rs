use gloo_storage::{LocalStorage, Storage as _};
use serde::{Deserialize, Serialize};
use wayfarer_engine::{FogStore, PersistError, Persistence, PoiFilter};

pub const FOG_STORAGE_KEY: &str = "wayfarer_map_fog";
pub const SETTINGS_STORAGE_KEY: &str = "wayfarer_map_settings";

fn js_error(err: wasm_bindgen::JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

/// Fog record in `window.localStorage`, stored as the raw snapshot JSON.
pub struct LocalStorageFogStore {
    key: String,
}

impl LocalStorageFogStore {
    /// `None` when the browser has no usable localStorage (private mode,
    /// sandboxed iframe).
    pub fn open(key: impl Into<String>) -> Option<Self> {
        // `LocalStorage::raw` throws when storage is missing; probe first.
        web_sys::window()?.local_storage().ok().flatten()?;
        Some(Self { key: key.into() })
    }
}

impl FogStore for LocalStorageFogStore {
    fn load(&self) -> Result<Option<String>, PersistError> {
        LocalStorage::raw()
            .get_item(&self.key)
            .map_err(|e| PersistError::Unavailable(js_error(e)))
    }

    fn save(&self, snapshot_json: &str) -> Result<(), PersistError> {
        // Quota errors surface here.
        LocalStorage::raw()
            .set_item(&self.key, snapshot_json)
            .map_err(|e| PersistError::Write(js_error(e)))
    }

    fn clear(&self) -> Result<(), PersistError> {
        LocalStorage::raw()
            .remove_item(&self.key)
            .map_err(|e| PersistError::Write(js_error(e)))
    }
}

/// Durable fog persistence when the browser allows it, memory otherwise.
pub fn fog_persistence() -> Persistence {
    match LocalStorageFogStore::open(FOG_STORAGE_KEY) {
        Some(store) => Persistence::new(store),
        None => {
            tracing::warn!("localStorage unavailable; exploration will not survive a reload");
            Persistence::in_memory()
        }
    }
}

/// UI preferences. Unknown or missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub show_labels: bool,
    pub show_paths: bool,
    pub show_minimap: bool,
    pub filter: PoiFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_labels: true,
            show_paths: true,
            show_minimap: true,
            filter: PoiFilter::All,
        }
    }
}

pub fn load_settings() -> Settings {
    LocalStorage::get(SETTINGS_STORAGE_KEY).unwrap_or_default()
}

pub fn save_settings(settings: &Settings) {
    let _ = LocalStorage::set(SETTINGS_STORAGE_KEY, settings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_engine::PoiKind;

    #[test]
    fn settings_fill_missing_fields() {
        let s: Settings = serde_json::from_str(r#"{"show_labels": false}"#).expect("parses");
        assert!(!s.show_labels);
        assert!(s.show_paths && s.show_minimap);
        assert_eq!(s.filter, PoiFilter::All);
    }

    #[test]
    fn settings_keep_filter_as_string() {
        let s = Settings {
            filter: PoiFilter::Kind(PoiKind::Dungeon),
            ..Settings::default()
        };
        let json = serde_json::to_string(&s).expect("serializes");
        assert!(json.contains(r#""filter":"dungeon""#), "{json}");
        let back: Settings = serde_json::from_str(&json).expect("parses");
        assert_eq!(back, s);
    }
}
