use super::{ChannelEvent, ChannelMessage, EventKind};
use std::{fmt, time::SystemTime};

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::NoteOff => "Note Off",
            EventKind::NoteOn => "Note On",
            EventKind::ControlChange => "Control Change",
            EventKind::ProgramChange => "Program Change",
            EventKind::Aftertouch => "Aftertouch",
            EventKind::PitchBend => "Pitch Bend",
            EventKind::Unknown => "MIDI Message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Renders as `Note On - Channel 1, Note 60, Velocity 100`
/// or `MIDI Message - Type 0xf0, Channel 16` for unknown messages.
impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let ChannelMessage::Unknown { raw_type } = self.message {
            return write!(
                f,
                "{} - Type {raw_type:#x}, Channel {}",
                self.kind(),
                self.channel
            );
        }

        write!(f, "{} - Channel {}", self.kind(), self.channel)?;

        for (name, value) in self.fields() {
            write!(f, ", {} {value}", capitalized(name))?;
        }

        Ok(())
    }
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An event stamped with the wall clock time it was received at.
pub struct EventLine {
    pub received: SystemTime,
    pub event: ChannelEvent,
}

impl EventLine {
    pub fn now(event: ChannelEvent) -> Self {
        Self {
            received: SystemTime::now(),
            event,
        }
    }
}

impl fmt::Display for EventLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            humantime::format_rfc3339_seconds(self.received),
            self.event
        )
    }
}

#[cfg(test)]
mod test {
    use crate::midi::{decode, RawPacket};
    use std::time::{Duration, SystemTime};

    fn render(status: u8, data: &[u8]) -> String {
        decode(&RawPacket::new(0, status, data)).to_string()
    }

    #[test]
    fn channel_messages_render_with_their_fields() {
        assert_eq!(
            render(0x90, &[60, 100]),
            "Note On - Channel 1, Note 60, Velocity 100"
        );
        assert_eq!(
            render(0x85, &[60, 0]),
            "Note Off - Channel 6, Note 60, Velocity 0"
        );
        assert_eq!(
            render(0xBF, &[7, 127]),
            "Control Change - Channel 16, Controller 7, Value 127"
        );
        assert_eq!(render(0xC2, &[5]), "Program Change - Channel 3, Program 5");
        assert_eq!(render(0xD0, &[90]), "Aftertouch - Channel 1, Value 90");
        assert_eq!(render(0xE0, &[0, 64]), "Pitch Bend - Channel 1, Value 8192");
    }

    #[test]
    fn unknown_messages_render_their_type_in_hex() {
        assert_eq!(render(0xFF, &[]), "MIDI Message - Type 0xf0, Channel 16");
        assert_eq!(
            render(0xA1, &[60, 3]),
            "MIDI Message - Type 0xa0, Channel 2"
        );
    }

    #[test]
    fn event_lines_are_prefixed_with_the_reception_time() {
        let line = super::EventLine {
            received: SystemTime::UNIX_EPOCH + Duration::from_secs(3600),
            event: decode(&RawPacket::new(0, 0xC0, &[1])),
        };

        assert_eq!(
            line.to_string(),
            "[1970-01-01T01:00:00Z] Program Change - Channel 1, Program 1"
        );
    }
}
