//! Render configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. stock defaults ([`RenderConfig::default`])
//! 2. an optional TOML file (`--config PATH`)
//! 3. command-line flags ([`CliOverrides`])
//!
//! The file is sparse; override just the values you want:
//!
//! ```toml
//! theme = "terminal"
//! mode = "auto-split"
//!
//! [settle]
//! load_ms = 800
//!
//! [themes.terminal]
//! background = "linear-gradient(135deg, #000 0%, #222 100%)"
//! ```
//!
//! Unknown keys are rejected to catch typos early. Run `cardstock
//! --gen-config` for a fully commented file with every key.

use crate::layout::SettleTimings;
use crate::theme::{Theme, ThemeOverride, ThemeTable};
use crate::types::{PagingMode, RenderSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Everything one render invocation needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub theme: Theme,
    pub mode: PagingMode,
    /// Card width in CSS pixels.
    pub width: u32,
    /// Base card height in CSS pixels.
    pub height: u32,
    /// Cap for `dynamic` cards.
    pub max_height: u32,
    /// Raster scale; a 1080 wide card at 2 is 2160 pixels wide.
    pub device_pixel_ratio: u32,
    /// Body cards rendered in parallel. 1 renders strictly in order.
    pub jobs: usize,
    pub settle: SettleConfig,
    pub browser: BrowserConfig,
    /// Per-theme gradient overrides, keyed by theme name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub themes: BTreeMap<String, ThemeOverride>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Default,
            mode: PagingMode::Separator,
            width: 1080,
            height: 1440,
            max_height: 4320,
            device_pixel_ratio: 2,
            jobs: 1,
            settle: SettleConfig::default(),
            browser: BrowserConfig::default(),
            themes: BTreeMap::new(),
        }
    }
}

/// Delays that let the page finish asynchronous layout, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettleConfig {
    pub load_ms: u64,
    pub adjust_ms: u64,
    pub probe_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            load_ms: 500,
            adjust_ms: 100,
            probe_ms: 200,
        }
    }
}

/// Headless Chrome launch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    /// Chrome/Chromium binary. Auto-detected when absent.
    pub path: Option<PathBuf>,
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            path: None,
            sandbox: true,
        }
    }
}

/// Values given on the command line. `None` keeps the config value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub theme: Option<Theme>,
    pub mode: Option<PagingMode>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_height: Option<u32>,
    pub device_pixel_ratio: Option<u32>,
    pub jobs: Option<usize>,
}

impl RenderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Validation(
                "width and height must be non-zero".into(),
            ));
        }
        if self.max_height < self.height {
            return Err(ConfigError::Validation(format!(
                "max_height ({}) must be at least height ({})",
                self.max_height, self.height
            )));
        }
        if self.device_pixel_ratio == 0 {
            return Err(ConfigError::Validation(
                "device_pixel_ratio must be non-zero".into(),
            ));
        }
        if self.jobs == 0 {
            return Err(ConfigError::Validation("jobs must be at least 1".into()));
        }
        if let Some(name) = self.themes.keys().find(|name| Theme::from_name(name).is_none()) {
            return Err(ConfigError::Validation(format!(
                "unknown theme in [themes.{name}], expected one of: {}",
                Theme::ALL.map(Theme::as_str).join(", ")
            )));
        }
        Ok(())
    }

    /// Layer command-line values on top.
    pub fn apply_overrides(&mut self, cli: &CliOverrides) {
        if let Some(theme) = cli.theme {
            self.theme = theme;
        }
        if let Some(mode) = cli.mode {
            self.mode = mode;
        }
        if let Some(width) = cli.width {
            self.width = width;
        }
        if let Some(height) = cli.height {
            self.height = height;
        }
        if let Some(max_height) = cli.max_height {
            self.max_height = max_height;
        }
        if let Some(dpr) = cli.device_pixel_ratio {
            self.device_pixel_ratio = dpr;
        }
        if let Some(jobs) = cli.jobs {
            self.jobs = jobs;
        }
    }

    /// The shared, read-only render settings. Call after [`validate`](Self::validate).
    pub fn render_spec(&self) -> RenderSpec {
        RenderSpec {
            theme: self.theme,
            mode: self.mode,
            width: self.width,
            height: self.height,
            max_height: self.max_height,
            device_pixel_ratio: self.device_pixel_ratio,
        }
    }

    pub fn settle_timings(&self) -> SettleTimings {
        SettleTimings {
            load: Duration::from_millis(self.settle.load_ms),
            adjust: Duration::from_millis(self.settle.adjust_ms),
            probe: Duration::from_millis(self.settle.probe_ms),
        }
    }

    /// Built-in theme assets with this config's gradient overrides applied.
    pub fn theme_table(&self) -> ThemeTable {
        let overrides: BTreeMap<Theme, ThemeOverride> = self
            .themes
            .iter()
            .filter_map(|(name, ov)| Some((Theme::from_name(name)?, ov.clone())))
            .collect();
        ThemeTable::builtin().with_overrides(&overrides)
    }
}

/// Resolve the effective worker count.
///
/// The user can constrain down, not up: `min(jobs, cores)`, at least 1.
pub fn effective_jobs(jobs: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    jobs.clamp(1, cores.max(1))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// The stock default config as a `toml::Value::Table`, the base layer for
/// merging user values on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RenderConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RenderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RenderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, or the stock defaults when there is none.
///
/// A path that was given but does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<RenderConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match path {
        None => None,
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            let content = fs::read_to_string(path)?;
            let value: toml::Value = toml::from_str(&content)?;
            log::info!("loaded config from {}", path.display());
            Some(value)
        }
    };
    resolve_config(base, overlay)
}

/// A fully-commented stock config file with all keys and explanations.
///
/// Used by `--gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# cardstock configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# Theme: default, playful-geometric, neo-brutalism, botanical,
#        professional, retro, terminal, sketch
theme = "default"

# Paging mode:
#   separator   split on --- lines, each card grows to fit
#   auto-fit    one fixed-size card, content scaled down to fit
#   auto-split  split between blocks by rendered height
#   dynamic     one card, height follows content up to max_height
mode = "separator"

# Card size in CSS pixels.
width = 1080
height = 1440

# Tallest card dynamic mode may produce.
max_height = 4320

# Output pixels per CSS pixel.
device_pixel_ratio = 2

# Body cards rendered in parallel (capped at the number of CPU cores).
jobs = 1

# ---------------------------------------------------------------------------
# Layout settling delays (milliseconds)
# ---------------------------------------------------------------------------
[settle]
# After a card document has loaded.
load_ms = 500
# After scaling auto-fit content.
adjust_ms = 100
# After loading an auto-split measurement probe.
probe_ms = 200

# ---------------------------------------------------------------------------
# Headless Chrome
# ---------------------------------------------------------------------------
[browser]
# Chrome/Chromium binary. Omit to auto-detect.
# path = "/usr/bin/chromium"

# Disable when running as root inside a container.
sandbox = true

# ---------------------------------------------------------------------------
# Theme gradient overrides
# ---------------------------------------------------------------------------
# [themes.botanical]
# background = "linear-gradient(135deg, #4A7C59 0%, #8FBC8F 100%)"
# cover_background = "linear-gradient(180deg, #4A7C59 0%, #8FBC8F 100%)"
# title_gradient = "linear-gradient(180deg, #1F2937 0%, #4A7C59 100%)"
"##
}
