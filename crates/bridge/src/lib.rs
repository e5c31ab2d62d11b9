//! Real-time event pipeline between authenticated live connections and the
//! output device.

pub mod clock;
pub mod config_store;
pub mod dispatcher;
pub mod error;
pub mod scheduler;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config_store::{BridgeConfig, Button, ConfigStore, MidiSettings, ServerSettings};
pub use dispatcher::{
    AuthorizedSession, CloseReason, ConnectionStats, EventDispatcher, Inbound, LiveChannel,
};
pub use error::{AuthError, ConfigError, DispatchError, ProtocolError, TransportError};
pub use scheduler::{DeviceFault, NoteScheduler};
pub use session::{Session, SessionStore};
pub use trigger::DeviceError;

#[cfg(test)]
mod test_support;
