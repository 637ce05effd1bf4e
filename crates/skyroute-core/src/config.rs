use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Files with an older schema are upgraded on load. Stored values are kept;
/// fields the older schema lacked take their defaults.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Airport-name keywords identifying the home region. Routes with exactly one
/// endpoint matching these are cross-border routes.
pub const DEFAULT_REFERENCE_KEYWORDS: [&str; 10] = [
    "桃園", "臺北", "高雄", "臺中", "花蓮", "澎湖", "臺南", "台北", "台中", "台南",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    High,
    #[default]
    Balanced,
    Low,
}

impl std::str::FromStr for PerformanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(PerformanceMode::High),
            "balanced" => Ok(PerformanceMode::Balanced),
            "low" => Ok(PerformanceMode::Low),
            other => Err(format!("unknown performance mode '{}'", other)),
        }
    }
}

/// Render-side limits derived from a [`PerformanceMode`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderSettings {
    /// Cap on the per-period flight list; part of every derived-view cache key.
    pub max_visible_flights: usize,
    /// `numPoints` passed to the arc engine.
    pub arc_resolution: usize,
    pub animations_enabled: bool,
    pub frame_interval_ms: f64,
    pub playback_interval_ms: u64,
}

impl PerformanceMode {
    pub fn render_settings(self) -> RenderSettings {
        match self {
            PerformanceMode::High => RenderSettings {
                max_visible_flights: 500,
                arc_resolution: 100,
                animations_enabled: true,
                frame_interval_ms: 16.67,
                playback_interval_ms: 1500,
            },
            PerformanceMode::Balanced => RenderSettings {
                max_visible_flights: 250,
                arc_resolution: 50,
                animations_enabled: true,
                frame_interval_ms: 33.33,
                playback_interval_ms: 2000,
            },
            PerformanceMode::Low => RenderSettings {
                max_visible_flights: 100,
                arc_resolution: 20,
                animations_enabled: false,
                frame_interval_ms: 50.0,
                playback_interval_ms: 2500,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default = "default_keywords")]
    pub reference_keywords: Vec<String>,
    #[serde(default)]
    pub performance_mode: PerformanceMode,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_batch_size")]
    pub assignment_batch_size: usize,
    #[serde(default = "default_height_factor")]
    pub arc_height_factor: f64,
    #[serde(default = "default_cycle_ms")]
    pub animation_cycle_ms: u64,
    #[serde(default = "default_highlight")]
    pub highlight_color: [u8; 4],
    #[serde(default)]
    pub schema_version: u32,
}

fn default_keywords() -> Vec<String> {
    DEFAULT_REFERENCE_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_cache_capacity() -> usize {
    30
}

fn default_batch_size() -> usize {
    100
}

fn default_height_factor() -> f64 {
    0.5
}

fn default_cycle_ms() -> u64 {
    2000
}

fn default_highlight() -> [u8; 4] {
    [255, 255, 0, 255]
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            reference_keywords: default_keywords(),
            performance_mode: PerformanceMode::default(),
            cache_capacity: default_cache_capacity(),
            assignment_batch_size: default_batch_size(),
            arc_height_factor: default_height_factor(),
            animation_cycle_ms: default_cycle_ms(),
            highlight_color: default_highlight(),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

impl AtlasConfig {
    pub fn default_path() -> PathBuf {
        crate::get_config_root().join("settings.json")
    }

    pub fn render_settings(&self) -> RenderSettings {
        self.performance_mode.render_settings()
    }

    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AtlasConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if config.schema_version < CURRENT_SCHEMA_VERSION {
            // v1 stored an empty keyword list when the user never edited it.
            if config.schema_version <= 1 && config.reference_keywords.is_empty() {
                config.reference_keywords = default_keywords();
                log::info!("Settings v1->v2: restored default reference keywords");
            }
            config.schema_version = CURRENT_SCHEMA_VERSION;
        }

        if config.assignment_batch_size == 0 {
            log::warn!("assignment_batch_size=0 in {:?}, using 1", path);
            config.assignment_batch_size = 1;
        }

        log::debug!(
            "Loaded settings from {:?}: mode={:?} keywords={}",
            path,
            config.performance_mode,
            config.reference_keywords.len()
        );
        Ok(config)
    }

    /// Like [`AtlasConfig::load`], but a malformed file is logged and replaced by defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            log::error!("{}; falling back to default settings", e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)?;
        Ok(())
    }
}
