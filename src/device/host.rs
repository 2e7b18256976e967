use super::{DeviceError, MidiDevice};
use crate::midi::RawPacket;
use crossbeam::channel::{Receiver, Sender, TryRecvError};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};

const CLIENT_NAME: &str = "midimon-in";
const BUFFER_CAPACITY: usize = 1_000;

/// Names of the MIDI inputs currently available on the system.
pub fn list_input_ports() -> anyhow::Result<Vec<String>> {
    let host = MidiInput::new(CLIENT_NAME)?;

    Ok(host
        .ports()
        .iter()
        .map(|port| host.port_name(port))
        .collect::<Result<Vec<_>, _>>()?)
}

/// MIDI input connected through the system MIDI API.
///
/// The backend delivers messages from its own thread, so they
/// are queued in a bounded buffer until the device is read.
pub struct HostMidiDevice {
    port_name: String,
    buffer: PacketBuffer,
    connection: Option<MidiInputConnection<Sender<RawPacket>>>,
}

impl HostMidiDevice {
    pub fn open_by_index(index: usize) -> anyhow::Result<Self> {
        let host = MidiInput::new(CLIENT_NAME)?;
        let ports = host.ports();

        let Some(port) = ports.get(index) else {
            anyhow::bail!("invalid port selection : {index}");
        };

        Self::connect(host, port)
    }

    pub fn open_by_name(port_name: &str) -> anyhow::Result<Self> {
        let host = MidiInput::new(CLIENT_NAME)?;
        let ports = host.ports();

        let Some(port) = ports
            .iter()
            .find(|&port| host.port_name(port).as_deref() == Ok(port_name))
        else {
            anyhow::bail!("port not found : {port_name}");
        };

        Self::connect(host, port)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn connect(mut host: MidiInput, port: &MidiInputPort) -> anyhow::Result<Self> {
        host.ignore(Ignore::Sysex);

        let port_name = host.port_name(port)?;
        let (sender, receiver) = crossbeam::channel::bounded(BUFFER_CAPACITY);

        let callback = |timestamp_us: u64, bytes: &[u8], sender: &mut Sender<RawPacket>| {
            let Some(packet) = RawPacket::from_bytes(timestamp_us / 1_000, bytes) else {
                return;
            };

            if let Err(e) = sender.try_send(packet) {
                log::error!("Failed to buffer midi message : {e}");
            }
        };

        let connection = host
            .connect(port, CLIENT_NAME, callback, sender)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        log::trace!("[ MIDI ] : connected to {port_name}");

        Ok(Self {
            port_name,
            buffer: PacketBuffer::new(receiver),
            connection: Some(connection),
        })
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        match self.connection {
            Some(_) => Ok(()),
            None => Err(DeviceError::Unavailable(format!(
                "{} has been closed",
                self.port_name
            ))),
        }
    }
}

impl MidiDevice for HostMidiDevice {
    fn poll(&mut self) -> Result<bool, DeviceError> {
        self.ensure_open()?;
        self.buffer.poll(&self.port_name)
    }

    fn read(&mut self, max_count: usize) -> Result<Vec<RawPacket>, DeviceError> {
        self.ensure_open()?;
        self.buffer.read(max_count, &self.port_name)
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
            log::trace!("[ MIDI ] : disconnected from {}", self.port_name);
        }
    }
}

/// Messages queued by the backend callback.
///
/// Polling an empty queue has to receive to tell an idle connection
/// from a dropped one, a message caught that way is kept in `pending`.
struct PacketBuffer {
    receiver: Receiver<RawPacket>,
    pending: Option<RawPacket>,
}

impl PacketBuffer {
    fn new(receiver: Receiver<RawPacket>) -> Self {
        Self {
            receiver,
            pending: None,
        }
    }

    fn poll(&mut self, port_name: &str) -> Result<bool, DeviceError> {
        if self.pending.is_some() || !self.receiver.is_empty() {
            return Ok(true);
        }

        match self.receiver.try_recv() {
            Ok(packet) => {
                self.pending = Some(packet);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(disconnected(port_name)),
        }
    }

    fn read(&mut self, max_count: usize, port_name: &str) -> Result<Vec<RawPacket>, DeviceError> {
        let mut packets = Vec::with_capacity(max_count.min(self.receiver.len() + 1));

        if max_count > 0 {
            packets.extend(self.pending.take());
        }

        while packets.len() < max_count {
            match self.receiver.try_recv() {
                Ok(packet) => packets.push(packet),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) if packets.is_empty() => {
                    return Err(disconnected(port_name))
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }

        Ok(packets)
    }
}

fn disconnected(port_name: &str) -> DeviceError {
    DeviceError::Unavailable(format!("{port_name} disconnected"))
}

impl Drop for HostMidiDevice {
    fn drop(&mut self) {
        self.close();
    }
}
