use std::{collections::VecDeque, io, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::domain::{Channel, Intensity, TriggerCode};
use tokio::{sync::mpsc, time::Instant};
use trigger::{DeviceError, TriggerPort};

use crate::{
    dispatcher::{Inbound, LiveChannel},
    error::TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Emitted {
    On {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    Off {
        channel: u8,
        note: u8,
    },
}

/// Records every emission with the (tokio) instant it happened.
#[derive(Default)]
pub(crate) struct RecordingPort {
    events: Mutex<Vec<(Instant, Emitted)>>,
    fail_on: Mutex<bool>,
    fail_off: Mutex<bool>,
}

impl RecordingPort {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_on(&self, fail: bool) {
        *self.fail_on.lock() = fail;
    }

    pub(crate) fn fail_off(&self, fail: bool) {
        *self.fail_off.lock() = fail;
    }

    pub(crate) fn events(&self) -> Vec<Emitted> {
        self.events.lock().iter().map(|(_, e)| *e).collect()
    }

    pub(crate) fn timed_events(&self) -> Vec<(Instant, Emitted)> {
        self.events.lock().clone()
    }

    fn failure(&self, kind: &'static str) -> DeviceError {
        DeviceError::Send {
            port: "recording".into(),
            kind,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"),
        }
    }
}

#[async_trait]
impl TriggerPort for RecordingPort {
    fn name(&self) -> &str {
        "recording"
    }

    async fn emit_on(
        &self,
        channel: Channel,
        code: TriggerCode,
        intensity: Intensity,
    ) -> Result<(), DeviceError> {
        if *self.fail_on.lock() {
            return Err(self.failure("note on"));
        }
        self.events.lock().push((
            Instant::now(),
            Emitted::On {
                channel: channel.get(),
                note: code.get(),
                velocity: intensity.get(),
            },
        ));
        Ok(())
    }

    async fn emit_off(&self, channel: Channel, code: TriggerCode) -> Result<(), DeviceError> {
        if *self.fail_off.lock() {
            return Err(self.failure("note off"));
        }
        self.events.lock().push((
            Instant::now(),
            Emitted::Off {
                channel: channel.get(),
                note: code.get(),
            },
        ));
        Ok(())
    }

    async fn close(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// In-memory live channel: the test feeds inbound frames through `inbound`
/// and reads acknowledgments from `outbound`.
pub(crate) struct ScriptedChannel {
    pub(crate) inbound: mpsc::UnboundedReceiver<Result<Inbound, TransportError>>,
    pub(crate) outbound: mpsc::UnboundedSender<String>,
    pub(crate) fail_writes: bool,
    pub(crate) closed: Arc<Mutex<usize>>,
}

pub(crate) struct ChannelHandle {
    inbound: Option<mpsc::UnboundedSender<Result<Inbound, TransportError>>>,
    pub(crate) outbound: mpsc::UnboundedReceiver<String>,
    pub(crate) closed: Arc<Mutex<usize>>,
}

impl ChannelHandle {
    pub(crate) fn send(&self, frame: Result<Inbound, TransportError>) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(frame);
        }
    }

    pub(crate) fn send_text(&self, text: &str) {
        self.send(Ok(Inbound::Text(text.to_string())));
    }

    /// Ends the inbound stream once already queued frames are consumed.
    pub(crate) fn end_input(&mut self) {
        self.inbound = None;
    }

    pub(crate) fn drain_outbound(&mut self) -> VecDeque<serde_json::Value> {
        let mut acks = VecDeque::new();
        while let Ok(text) = self.outbound.try_recv() {
            acks.push_back(serde_json::from_str(&text).expect("ack json"));
        }
        acks
    }
}

pub(crate) fn scripted_channel() -> (ScriptedChannel, ChannelHandle) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(Mutex::new(0));
    (
        ScriptedChannel {
            inbound: in_rx,
            outbound: out_tx,
            fail_writes: false,
            closed: Arc::clone(&closed),
        },
        ChannelHandle {
            inbound: Some(in_tx),
            outbound: out_rx,
            closed,
        },
    )
}

#[async_trait]
impl LiveChannel for ScriptedChannel {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        self.inbound.recv().await
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Write("socket closed".into()));
        }
        self.outbound
            .send(text)
            .map_err(|e| TransportError::Write(e.to_string().into()))
    }

    async fn close(&mut self) {
        *self.closed.lock() += 1;
    }
}
