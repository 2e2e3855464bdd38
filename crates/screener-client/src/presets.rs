//! Named screener presets persisted as a JSON array in the user's data
//! directory.

use screener_core::query::{QueryParams, ScreenerFilters, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ClientError, ClientResult};

pub const PRESETS_KEY: &str = "screener_presets";

/// Everything a preset restores: filters, sort and page size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetData {
    #[serde(flatten)]
    pub filters: ScreenerFilters,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PresetData {
    pub fn from_params(params: &QueryParams) -> Self {
        Self {
            filters: params.filters.clone(),
            page_size: params.page_size,
        }
    }

    /// Query parameters this preset selects, on the first page.
    pub fn to_params(&self) -> QueryParams {
        QueryParams {
            page: 1,
            page_size: self.page_size,
            filters: self.filters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub data: PresetData,
}

#[derive(Debug, Clone)]
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", PRESETS_KEY)),
        }
    }

    /// `STOCKVISION_PRESETS_DIR`, else `<data dir>/stockvision`.
    pub fn from_env() -> Self {
        let dir = std::env::var("STOCKVISION_PRESETS_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join("stockvision")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved presets in insertion order. A missing or unreadable file is an
    /// empty list.
    pub fn load(&self) -> Vec<Preset> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(presets) => presets,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Ignoring malformed presets file");
                Vec::new()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Preset> {
        let name = name.trim();
        self.load().into_iter().find(|p| p.name == name)
    }

    /// Stores `data` under the trimmed `name`, replacing any preset with the
    /// same name. Returns the updated list.
    pub fn save(&self, name: &str, data: PresetData) -> ClientResult<Vec<Preset>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::InvalidPreset("preset name is empty".to_string()));
        }

        let mut presets: Vec<Preset> = self.load().into_iter().filter(|p| p.name != name).collect();
        presets.push(Preset {
            name: name.to_string(),
            data,
        });

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&presets)?)?;

        tracing::debug!(name, count = presets.len(), "Preset saved");
        Ok(presets)
    }
}
