//! Validated configuration snapshots and their hot-reload publication.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use shared::{
    domain::{Channel, Intensity, RangeError, TriggerCode, BUTTON_COUNT},
    protocol::ButtonView,
};
use tracing::{info, warn};

use crate::error::ConfigError;

const ENV_PREFIX: &str = "REMOTE_MIDI";
const DEFAULT_HOLD_MS: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub note: TriggerCode,
    pub label: String,
    pub velocity: Option<Intensity>,
}

impl Button {
    pub fn effective_velocity(&self, default: Intensity) -> Intensity {
        self.velocity.unwrap_or(default)
    }

    pub fn view(&self) -> ButtonView {
        ButtonView {
            note: self.note,
            label: self.label.clone(),
            velocity: self.velocity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiSettings {
    pub port_name: String,
    pub channel: Channel,
    pub velocity: Intensity,
    pub hold: Duration,
    /// Always exactly [`BUTTON_COUNT`] entries.
    pub buttons: Vec<Button>,
}

/// One immutable, fully validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub server: ServerSettings,
    pub midi: MidiSettings,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: RawServer,
    midi: RawMidi,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    host: String,
    port: i64,
    password: String,
    static_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawMidi {
    #[serde(default)]
    port_name: String,
    channel: i64,
    velocity: i64,
    hold_ms: i64,
    #[serde(default)]
    buttons: Vec<RawButton>,
}

#[derive(Debug, Deserialize)]
struct RawButton {
    note: i64,
    #[serde(default)]
    label: String,
    #[serde(default)]
    velocity: Option<i64>,
}

fn ranged<T>(location: impl Into<String>, value: i64) -> Result<T, ConfigError>
where
    T: TryFrom<i64, Error = RangeError>,
{
    T::try_from(value).map_err(|source| ConfigError::OutOfRange {
        location: location.into(),
        source,
    })
}

impl BridgeConfig {
    /// Reads and validates the YAML document at `path`, with
    /// `REMOTE_MIDI__SECTION__KEY` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    fn load_with_env_prefix(path: &Path, env_prefix: &str) -> Result<Self, ConfigError> {
        let read_err = |source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };
        let raw: RawConfig = Config::builder()
            .set_default("server.host", "0.0.0.0")
            .and_then(|b| b.set_default("server.port", 8080))
            .and_then(|b| b.set_default("server.password", "changeme"))
            .and_then(|b| b.set_default("server.static_dir", "web"))
            .and_then(|b| b.set_default("midi.velocity", 127))
            .and_then(|b| b.set_default("midi.channel", 0))
            .and_then(|b| b.set_default("midi.hold_ms", DEFAULT_HOLD_MS))
            .map_err(read_err)?
            .add_source(File::from(path).format(FileFormat::Yaml).required(true))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize::<RawConfig>)
            .map_err(read_err)?;
        raw.validate()
    }

    pub fn button(&self, index: usize) -> Option<&Button> {
        self.midi.buttons.get(index)
    }
}

impl RawConfig {
    fn validate(self) -> Result<BridgeConfig, ConfigError> {
        let port =
            u16::try_from(self.server.port).map_err(|_| ConfigError::Port(self.server.port))?;
        if self.server.password.is_empty() {
            return Err(ConfigError::Empty("server.password"));
        }
        if self.midi.port_name.trim().is_empty() {
            return Err(ConfigError::Empty("midi.port_name"));
        }
        if self.midi.buttons.len() != BUTTON_COUNT {
            return Err(ConfigError::ButtonCount {
                expected: BUTTON_COUNT,
                found: self.midi.buttons.len(),
            });
        }
        let hold_ms =
            u64::try_from(self.midi.hold_ms).map_err(|_| ConfigError::Hold(self.midi.hold_ms))?;

        let buttons = self
            .midi
            .buttons
            .into_iter()
            .enumerate()
            .map(|(i, raw)| -> Result<Button, ConfigError> {
                Ok(Button {
                    note: ranged(format!("midi.buttons[{i}].note"), raw.note)?,
                    label: raw.label,
                    velocity: raw
                        .velocity
                        .map(|v| ranged(format!("midi.buttons[{i}].velocity"), v))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BridgeConfig {
            server: ServerSettings {
                host: self.server.host,
                port,
                password: self.server.password,
                static_dir: self.server.static_dir,
            },
            midi: MidiSettings {
                port_name: self.midi.port_name,
                channel: ranged("midi.channel", self.midi.channel)?,
                velocity: ranged("midi.velocity", self.midi.velocity)?,
                hold: Duration::from_millis(hold_ms),
                buttons,
            },
        })
    }
}

type ChangeCallback = Arc<dyn Fn(&Arc<BridgeConfig>) + Send + Sync>;

/// Holds the published snapshot. Readers clone an `Arc` under a brief read
/// lock; reloads build a complete new snapshot before swapping it in.
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<BridgeConfig>>,
    callbacks: Mutex<Vec<ChangeCallback>>,
    reloading: Mutex<()>,
}

impl ConfigStore {
    /// Performs the initial load. Failure here is meant to abort startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let initial = BridgeConfig::load(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(initial)),
            callbacks: Mutex::new(Vec::new()),
            reloading: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Arc<BridgeConfig> {
        Arc::clone(&self.current.read())
    }

    /// Re-reads the source. On success the new snapshot is published and
    /// every callback runs, in registration order, on the calling thread. On
    /// failure the previous snapshot stays live.
    pub fn reload(&self) -> Result<Arc<BridgeConfig>, ConfigError> {
        let _serialized = self.reloading.lock();
        let next = match BridgeConfig::load(&self.path) {
            Ok(next) => Arc::new(next),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "config reload rejected, keeping previous config");
                return Err(error);
            }
        };

        *self.current.write() = Arc::clone(&next);
        info!(path = %self.path.display(), "config reloaded");

        let callbacks = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(&next);
        }
        Ok(next)
    }

    /// Registers `callback` for every successful reload. Callbacks run on the
    /// reload path and must return promptly; spawn a task for slow work.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&Arc<BridgeConfig>) + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Arc::new(callback));
    }
}

#[cfg(test)]
#[path = "tests/config_store_tests.rs"]
mod tests;
