use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shared::domain::{Channel, Intensity, TriggerCode};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, info};

use crate::{DeviceError, MidiMessage, TriggerPort};

/// Writes MIDI bytes to a raw character device (ALSA `midiC*D*`, OSS
/// `/dev/midi*`) or a FIFO read by another process.
pub struct RawMidiPort {
    name: String,
    path: PathBuf,
    handle: Mutex<Option<File>>,
}

impl RawMidiPort {
    pub async fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|source| DeviceError::Open {
                path: path.clone(),
                source,
            })?;
        let name = name.into();
        info!(port = %name, path = %path.display(), "midi output opened");
        Ok(Self {
            name,
            path,
            handle: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn send(&self, message: MidiMessage) -> Result<(), DeviceError> {
        let mut guard = self.handle.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| DeviceError::Closed(self.name.clone()))?;
        let send_err = |source| DeviceError::Send {
            port: self.name.clone(),
            kind: message.kind(),
            source,
        };
        file.write_all(&message.to_bytes()).await.map_err(send_err)?;
        file.flush().await.map_err(send_err)?;
        debug!(port = %self.name, ?message, "midi message written");
        Ok(())
    }
}

#[async_trait]
impl TriggerPort for RawMidiPort {
    fn name(&self) -> &str {
        &self.name
    }

    async fn emit_on(
        &self,
        channel: Channel,
        code: TriggerCode,
        intensity: Intensity,
    ) -> Result<(), DeviceError> {
        self.send(MidiMessage::NoteOn {
            channel,
            note: code,
            velocity: intensity,
        })
        .await
    }

    async fn emit_off(&self, channel: Channel, code: TriggerCode) -> Result<(), DeviceError> {
        self.send(MidiMessage::NoteOff {
            channel,
            note: code,
        })
        .await
    }

    async fn close(&self) -> Result<(), DeviceError> {
        let Some(mut file) = self.handle.lock().await.take() else {
            return Ok(());
        };
        file.flush().await.map_err(|source| DeviceError::Send {
            port: self.name.clone(),
            kind: "flush",
            source,
        })?;
        info!(port = %self.name, "midi output closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel::new(2).expect("channel")
    }

    fn note() -> TriggerCode {
        TriggerCode::new(60).expect("note")
    }

    #[tokio::test]
    async fn writes_note_on_and_off_bytes_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("midi0");
        tokio::fs::write(&path, b"").await.expect("create");

        let port = RawMidiPort::open("test", &path).await.expect("open");
        port.emit_on(channel(), note(), Intensity::new(100).expect("velocity"))
            .await
            .expect("on");
        port.emit_off(channel(), note()).await.expect("off");
        port.close().await.expect("close");

        let written = tokio::fs::read(&path).await.expect("read");
        assert_eq!(written, vec![0x92, 60, 100, 0x82, 60, 0]);
    }

    #[tokio::test]
    async fn emitting_after_close_fails_and_close_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("midi0");
        tokio::fs::write(&path, b"").await.expect("create");

        let port = RawMidiPort::open("test", &path).await.expect("open");
        port.close().await.expect("close");
        port.close().await.expect("second close");

        let err = port.emit_off(channel(), note()).await.expect_err("closed");
        assert!(matches!(err, DeviceError::Closed(name) if name == "test"));
    }

    #[tokio::test]
    async fn opening_missing_path_reports_open_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = RawMidiPort::open("missing", dir.path().join("nope").join("midi"))
            .await
            .err()
            .expect("open should fail");
        assert!(matches!(err, DeviceError::Open { .. }));
    }
}
