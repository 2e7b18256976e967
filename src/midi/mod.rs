mod display;

pub use display::*;

/// One MIDI message as read from an input device.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub status: u8,
    pub data: [Option<u8>; 2],
    /// Device relative time in milliseconds.
    pub timestamp: u64,
}

impl RawPacket {
    pub fn new(timestamp: u64, status: u8, data: &[u8]) -> Self {
        Self {
            status,
            data: [data.first().copied(), data.get(1).copied()],
            timestamp,
        }
    }

    /// Split a raw message into status and data bytes.
    /// Bytes past the second data byte are ignored.
    pub fn from_bytes(timestamp: u64, bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        Some(Self::new(timestamp, status, data))
    }

    #[inline]
    fn data_byte(&self, index: usize) -> u8 {
        self.data.get(index).copied().flatten().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteOff,
    NoteOn,
    ControlChange,
    ProgramChange,
    Aftertouch,
    PitchBend,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { note: u8, velocity: u8 },
    NoteOn { note: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    Aftertouch { value: u8 },
    /// 14 bit value, 8192 is the centre position.
    PitchBend { value: u16 },
    /// Status type nibble that is not decoded, e.g. `0xF0`.
    Unknown { raw_type: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    /// 1 to 16
    pub channel: u8,
    pub message: ChannelMessage,
    pub timestamp: u64,
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self.message {
            ChannelMessage::NoteOff { .. } => EventKind::NoteOff,
            ChannelMessage::NoteOn { .. } => EventKind::NoteOn,
            ChannelMessage::ControlChange { .. } => EventKind::ControlChange,
            ChannelMessage::ProgramChange { .. } => EventKind::ProgramChange,
            ChannelMessage::Aftertouch { .. } => EventKind::Aftertouch,
            ChannelMessage::PitchBend { .. } => EventKind::PitchBend,
            ChannelMessage::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// Payload as ordered `(name, value)` pairs.
    /// Always empty for unknown messages, see [`ChannelEvent::raw_type`].
    pub fn fields(&self) -> Vec<(&'static str, u16)> {
        match self.message {
            ChannelMessage::NoteOff { note, velocity } | ChannelMessage::NoteOn { note, velocity } => {
                vec![("note", note.into()), ("velocity", velocity.into())]
            }
            ChannelMessage::ControlChange { controller, value } => {
                vec![("controller", controller.into()), ("value", value.into())]
            }
            ChannelMessage::ProgramChange { program } => vec![("program", program.into())],
            ChannelMessage::Aftertouch { value } => vec![("value", value.into())],
            ChannelMessage::PitchBend { value } => vec![("value", value)],
            ChannelMessage::Unknown { .. } => vec![],
        }
    }

    pub fn field(&self, name: &str) -> Option<u16> {
        self.fields()
            .into_iter()
            .find_map(|(field, value)| (field == name).then_some(value))
    }

    pub fn raw_type(&self) -> Option<u8> {
        match self.message {
            ChannelMessage::Unknown { raw_type } => Some(raw_type),
            _ => None,
        }
    }
}

/// Decode a packet into a channel event.
///
/// Every status byte maps to an event. Missing data bytes read as zero,
/// anything outside of the six decoded channel messages is `Unknown`.
pub fn decode(packet: &RawPacket) -> ChannelEvent {
    let msg_type = packet.status & 0xF0;
    let channel = (packet.status & 0x0F) + 1;

    let d0 = packet.data_byte(0);
    let d1 = packet.data_byte(1);

    let message = match msg_type {
        0x80 => ChannelMessage::NoteOff {
            note: d0,
            velocity: d1,
        },
        0x90 => ChannelMessage::NoteOn {
            note: d0,
            velocity: d1,
        },
        0xB0 => ChannelMessage::ControlChange {
            controller: d0,
            value: d1,
        },
        0xC0 => ChannelMessage::ProgramChange { program: d0 },
        0xD0 => ChannelMessage::Aftertouch { value: d0 },
        0xE0 => ChannelMessage::PitchBend {
            value: u16::from(d0) + (u16::from(d1) << 7),
        },
        raw_type => ChannelMessage::Unknown { raw_type },
    };

    ChannelEvent {
        channel,
        message,
        timestamp: packet.timestamp,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use midly::{live::LiveEvent, MidiMessage};

    fn packet(status: u8, data: &[u8]) -> RawPacket {
        RawPacket::new(0, status, data)
    }

    #[test]
    fn channel_is_the_low_nibble_plus_one_for_every_status() {
        for status in 0..=u8::MAX {
            let event = decode(&packet(status, &[]));
            assert_eq!(event.channel, (status & 0x0F) + 1);
            assert!((1..=16).contains(&event.channel));
        }
    }

    #[test]
    fn missing_data_bytes_decode_as_zero() {
        for status in 0..=u8::MAX {
            let event = decode(&packet(status, &[]));
            assert!(event.fields().iter().all(|(_, value)| *value == 0));
        }

        let event = decode(&packet(0x90, &[64]));
        assert_eq!(
            event.message,
            ChannelMessage::NoteOn {
                note: 64,
                velocity: 0
            }
        );
    }

    #[test]
    fn kinds_are_mapped_from_the_high_nibble() {
        let expected = [
            (0x80, EventKind::NoteOff),
            (0x90, EventKind::NoteOn),
            (0xA0, EventKind::Unknown),
            (0xB0, EventKind::ControlChange),
            (0xC0, EventKind::ProgramChange),
            (0xD0, EventKind::Aftertouch),
            (0xE0, EventKind::PitchBend),
            (0xF0, EventKind::Unknown),
        ];

        for (msg_type, kind) in expected {
            for channel in 0..16 {
                assert_eq!(decode(&packet(msg_type | channel, &[1, 2])).kind(), kind);
            }
        }

        for status in 0..0x80 {
            assert_eq!(decode(&packet(status, &[1, 2])).kind(), EventKind::Unknown);
        }
    }

    #[test]
    fn pitch_bend_joins_two_seven_bit_halves() {
        let bend = |data: &[u8]| decode(&packet(0xE0, data)).field("value").unwrap();
        assert_eq!(bend(&[0, 64]), 8192);
        assert_eq!(bend(&[127, 127]), 16383);
        assert_eq!(bend(&[0, 0]), 0);
        assert_eq!(bend(&[1, 0]), 1);
        assert_eq!(bend(&[0, 1]), 128);
    }

    #[test]
    fn note_on_keeps_channel_fields_and_timestamp() {
        let event = decode(&RawPacket::new(1000, 0x91, &[60, 100]));
        assert_eq!(event.kind(), EventKind::NoteOn);
        assert_eq!(event.channel, 2);
        assert_eq!(event.fields(), vec![("note", 60), ("velocity", 100)]);
        assert_eq!(event.timestamp, 1000);
    }

    #[test]
    fn unknown_carries_the_raw_type_and_no_fields() {
        let event = decode(&RawPacket::new(0, 0xFF, &[]));
        assert_eq!(event.kind(), EventKind::Unknown);
        assert_eq!(event.channel, 16);
        assert_eq!(event.raw_type(), Some(0xF0));
        assert!(event.fields().is_empty());
        assert_eq!(event.timestamp, 0);

        let event = decode(&packet(0xA3, &[60, 10]));
        assert_eq!(event.raw_type(), Some(0xA0));
        assert!(event.fields().is_empty());
    }

    #[test]
    fn packets_are_split_from_raw_bytes() {
        assert_eq!(RawPacket::from_bytes(5, &[]), None);
        assert_eq!(
            RawPacket::from_bytes(5, &[0xC4]).unwrap(),
            RawPacket {
                status: 0xC4,
                data: [None, None],
                timestamp: 5
            }
        );
        assert_eq!(
            RawPacket::from_bytes(5, &[0x80, 1, 2, 3]).unwrap().data,
            [Some(1), Some(2)]
        );
    }

    #[test]
    fn agrees_with_midly_on_well_formed_channel_messages() {
        let messages: &[&[u8]] = &[
            &[0x80, 60, 0],
            &[0x9F, 127, 127],
            &[0xB3, 7, 100],
            &[0xC0, 42],
            &[0xD9, 33],
            &[0xE2, 0, 64],
            &[0xE2, 12, 99],
        ];

        for bytes in messages {
            let event = decode(&RawPacket::from_bytes(0, bytes).unwrap());
            let LiveEvent::Midi { channel, message } = LiveEvent::parse(bytes).unwrap() else {
                panic!("not a channel message : {bytes:?}");
            };

            assert_eq!(event.channel, channel.as_int() + 1);

            let expected = match message {
                MidiMessage::NoteOff { key, vel } => ChannelMessage::NoteOff {
                    note: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOn { key, vel } => ChannelMessage::NoteOn {
                    note: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::Controller { controller, value } => ChannelMessage::ControlChange {
                    controller: controller.as_int(),
                    value: value.as_int(),
                },
                MidiMessage::ProgramChange { program } => ChannelMessage::ProgramChange {
                    program: program.as_int(),
                },
                MidiMessage::ChannelAftertouch { vel } => ChannelMessage::Aftertouch {
                    value: vel.as_int(),
                },
                MidiMessage::PitchBend { bend } => ChannelMessage::PitchBend {
                    value: bend.0.as_int(),
                },
                MidiMessage::Aftertouch { .. } => ChannelMessage::Unknown { raw_type: 0xA0 },
            };

            assert_eq!(event.message, expected);
        }
    }
}
