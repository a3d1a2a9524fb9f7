//! Engine configuration.
//!
//! Every field has a default, so a missing `engine.ron` is not an error for
//! the demo. When present it is a RON document like the asset tables, and any
//! section or key may be left out:
//!
//! ```text
//! (
//!     window: (title: "kiln", width: 1280, height: 720),
//!     assets: (root: "assets", shaders: "shaders", techniques: "techs.ron"),
//!     renderer: (frames_in_flight: 2, hot_reload: true, vsync: true),
//!     log: (filter: "info,wgpu_hal=error"),
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::document;
use crate::error::{EntryKind, Error, Result};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "kiln".to_owned(),
            width: 1280,
            height: 720,
        }
    }
}

/// Where assets live. Document and shader paths are relative to `root`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub root: PathBuf,
    pub shaders: String,
    pub techniques: String,
    pub effects: String,
    pub materials: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            shaders: "shaders".to_owned(),
            techniques: "techs.ron".to_owned(),
            effects: "effects.ron".to_owned(),
            materials: "material.ron".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub frames_in_flight: usize,
    /// Watch the shader directory and rebuild techniques on change.
    pub hot_reload: bool,
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            hot_reload: true,
            vsync: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub assets: AssetConfig,
    pub renderer: RendererConfig,
    pub log: LogConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads configuration from a document on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::missing_file(path, Some(err)),
            _ => Error::Library(format!("failed to read '{}': {err}", path.display())),
        })?;
        Self::parse(&text)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path) {
            Err(Error::MissingFile { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Parses a configuration document. Absent keys keep their defaults.
    pub fn parse(source: &str) -> Result<Self> {
        let config: Self = document::parse(source)?;
        if config.renderer.frames_in_flight == 0 {
            return Err(Error::entry(
                EntryKind::Config,
                "renderer",
                "'frames_in_flight' must be at least 1",
            ));
        }
        Ok(config)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets.root = root.into();
        self
    }

    pub fn frames_in_flight(mut self, frames: usize) -> Self {
        self.renderer.frames_in_flight = frames.max(1);
        self
    }

    pub fn hot_reload(mut self, enabled: bool) -> Self {
        self.renderer.hot_reload = enabled;
        self
    }

    pub fn vsync(mut self, enabled: bool) -> Self {
        self.renderer.vsync = enabled;
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log.filter = filter.into();
        self
    }

    /// Full path of the shader directory.
    pub fn shader_root(&self) -> PathBuf {
        self.assets.root.join(&self.assets.shaders)
    }

    /// Installs the global logger. `RUST_LOG` takes precedence over `log.filter`.
    ///
    /// Safe to call more than once; later calls are ignored.
    pub fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(self.log.filter.as_str());
        if env_logger::Builder::from_env(env)
            .filter_module("wgpu_hal", log::LevelFilter::Error)
            .try_init()
            .is_ok()
        {
            log::debug!("logging initialized");
        }
    }
}
