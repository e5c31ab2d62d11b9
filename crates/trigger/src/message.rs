use shared::domain::{Channel, Intensity, TriggerCode};

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

/// Channel voice messages the bridge emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn {
        channel: Channel,
        note: TriggerCode,
        velocity: Intensity,
    },
    NoteOff {
        channel: Channel,
        note: TriggerCode,
    },
}

impl MidiMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoteOn { .. } => "note on",
            Self::NoteOff { .. } => "note off",
        }
    }

    /// Wire encoding: status byte with the channel in the low nibble, then
    /// the two 7-bit data bytes. Note off always carries velocity 0.
    pub fn to_bytes(self) -> [u8; 3] {
        match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => [NOTE_ON | channel.get(), note.get(), velocity.get()],
            Self::NoteOff { channel, note } => [NOTE_OFF | channel.get(), note.get(), 0],
        }
    }
}
