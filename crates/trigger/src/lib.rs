//! Output-device boundary: the core emits note on/off events through
//! [`TriggerPort`] and never sees how the device is reached.

use async_trait::async_trait;
use shared::domain::{Channel, Intensity, TriggerCode};

mod discovery;
mod error;
mod message;
mod raw;
mod tracing_port;

pub use discovery::{discover_ports, open_port, PortInfo, SystemPaths};
pub use error::DeviceError;
pub use message::MidiMessage;
pub use raw::RawMidiPort;
pub use tracing_port::TracingPort;

/// A connected output device.
///
/// Implementations are shared by every activation on every connection, so
/// `emit_on`/`emit_off` may be called concurrently and must serialize access
/// to the underlying handle themselves.
#[async_trait]
pub trait TriggerPort: Send + Sync {
    /// Identifier the port was opened with.
    fn name(&self) -> &str;

    async fn emit_on(
        &self,
        channel: Channel,
        code: TriggerCode,
        intensity: Intensity,
    ) -> Result<(), DeviceError>;

    async fn emit_off(&self, channel: Channel, code: TriggerCode) -> Result<(), DeviceError>;

    /// Releases the device. Safe to call more than once.
    async fn close(&self) -> Result<(), DeviceError>;
}
