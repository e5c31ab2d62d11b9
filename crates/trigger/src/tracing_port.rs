use async_trait::async_trait;
use shared::domain::{Channel, Intensity, TriggerCode};
use tracing::info;

use crate::{DeviceError, TriggerPort};

/// Dry-run output that only logs the events it would have sent.
pub struct TracingPort {
    name: String,
}

impl TracingPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl TriggerPort for TracingPort {
    fn name(&self) -> &str {
        &self.name
    }

    async fn emit_on(
        &self,
        channel: Channel,
        code: TriggerCode,
        intensity: Intensity,
    ) -> Result<(), DeviceError> {
        info!(port = %self.name, %channel, note = %code, velocity = %intensity, "note on (dry run)");
        Ok(())
    }

    async fn emit_off(&self, channel: Channel, code: TriggerCode) -> Result<(), DeviceError> {
        info!(port = %self.name, %channel, note = %code, "note off (dry run)");
        Ok(())
    }

    async fn close(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}
