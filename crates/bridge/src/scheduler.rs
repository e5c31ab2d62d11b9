//! Two-phase note activation: immediate "on", deferred "off".

use std::{sync::Arc, time::Duration};

use shared::domain::{Channel, Intensity, TriggerCode};
use tokio::sync::broadcast;
use tracing::{debug, error};
use trigger::{DeviceError, TriggerPort};

const FAULT_CAPACITY: usize = 64;

/// A device failure that had no caller left to return to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFault {
    pub channel: Channel,
    pub note: TriggerCode,
    pub message: String,
}

pub struct NoteScheduler {
    port: Arc<dyn TriggerPort>,
    faults: broadcast::Sender<DeviceFault>,
}

impl NoteScheduler {
    pub fn new(port: Arc<dyn TriggerPort>) -> Self {
        let (faults, _) = broadcast::channel(FAULT_CAPACITY);
        Self { port, faults }
    }

    pub fn subscribe_faults(&self) -> broadcast::Receiver<DeviceFault> {
        self.faults.subscribe()
    }

    /// Sends "on" and returns once the device accepted it; the matching
    /// "off" is sent `hold` later on a detached task. Overlapping
    /// activations of the same note are independent, and the "off" always
    /// goes to the channel its "on" used.
    pub async fn activate(
        &self,
        channel: Channel,
        note: TriggerCode,
        velocity: Intensity,
        hold: Duration,
    ) -> Result<(), DeviceError> {
        self.port.emit_on(channel, note, velocity).await?;
        debug!(%channel, %note, %velocity, "note on");

        let port = Arc::clone(&self.port);
        let faults = self.faults.clone();
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            match port.emit_off(channel, note).await {
                Ok(()) => debug!(%channel, %note, "note off"),
                Err(err) => {
                    error!(%channel, %note, error = %err, "failed to send note off");
                    // no subscribers is fine
                    let _ = faults.send(DeviceFault {
                        channel,
                        note,
                        message: err.to_string(),
                    });
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
