mod host;

pub use host::*;

use crate::midi::RawPacket;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// A single poll or read failed, the next one may succeed.
    #[error("transient read error : {0}")]
    Transient(String),
    /// The device was closed or disconnected.
    #[error("device unavailable : {0}")]
    Unavailable(String),
}

/// An opened MIDI input the monitor can poll.
///
/// `poll` and `read` must not block.
#[cfg_attr(test, mockall::automock)]
pub trait MidiDevice: Send {
    /// Is there buffered input ready to be read.
    fn poll(&mut self) -> Result<bool, DeviceError>;
    /// Read at most `max_count` buffered packets, oldest first.
    fn read(&mut self, max_count: usize) -> Result<Vec<RawPacket>, DeviceError>;
    /// Release the device. Calling this more than once is a no-op.
    fn close(&mut self);
}

impl<D: MidiDevice + ?Sized> MidiDevice for Box<D> {
    fn poll(&mut self) -> Result<bool, DeviceError> {
        (**self).poll()
    }

    fn read(&mut self, max_count: usize) -> Result<Vec<RawPacket>, DeviceError> {
        (**self).read(max_count)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
