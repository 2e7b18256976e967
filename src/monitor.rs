use crate::{
    device::{DeviceError, MidiDevice},
    midi::{decode, ChannelEvent, RawPacket},
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Pause between two poll cycles.
    pub poll_interval: Duration,
    /// Maximum number of packets read in a single cycle.
    pub batch_size: usize,
    /// Number of failed cycles in a row after which the device is given up on.
    pub max_consecutive_errors: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            batch_size: 10,
            max_consecutive_errors: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("transient read error : {0}")]
    Read(String),
    #[error("device unavailable : {0}")]
    DeviceUnavailable(String),
    #[error("giving up after {attempts} consecutive errors")]
    RetriesExhausted { attempts: u32 },
    #[error("monitor cycle panicked : {0}")]
    Panicked(String),
    #[error("monitor is already running")]
    AlreadyRunning,
    #[error("failed to spawn monitor worker : {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<DeviceError> for MonitorError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::Transient(reason) => Self::Read(reason),
            DeviceError::Unavailable(reason) => Self::DeviceUnavailable(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopping,
}

/// Polls a MIDI device on a dedicated thread and
/// hands every decoded event to a sink.
///
/// Both sinks are called from the worker thread.
pub struct Monitor<Device: MidiDevice + 'static> {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<Device>>,
}

impl<Device: MidiDevice + 'static> Default for Monitor<Device> {
    fn default() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl<Device: MidiDevice + 'static> Monitor<Device> {
    pub fn state(&self) -> MonitorState {
        match (&self.worker, self.is_running()) {
            (None, _) => MonitorState::Idle,
            (Some(_), true) => MonitorState::Running,
            (Some(_), false) => MonitorState::Stopping,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start polling `device`.
    ///
    /// Fails if a previous worker has not been joined yet, in which
    /// case `device` is dropped.
    pub fn start<OnEvent, OnError>(
        &mut self,
        mut device: Device,
        config: MonitorConfig,
        mut on_event: OnEvent,
        mut on_error: OnError,
    ) -> Result<(), MonitorError>
    where
        OnEvent: FnMut(ChannelEvent) + Send + 'static,
        OnError: FnMut(&MonitorError) + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::Release);
        let running = self.running.clone();

        let spawned = std::thread::Builder::new()
            .name("midimon-poll".into())
            .spawn(move || {
                log::trace!("monitor worker started");
                run(&running, &mut device, &config, &mut on_event, &mut on_error);
                log::trace!("monitor worker terminated");
                device
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Ask the worker to terminate. It exits at the start of its next cycle,
    /// so the events of one more batch may still be delivered.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Wait for the worker to exit and take the device back.
    pub fn join(&mut self) -> Option<Device> {
        let handle = self.worker.take()?;

        match handle.join() {
            Ok(device) => Some(device),
            Err(_) => {
                log::error!("Failed to join monitor worker thread");
                None
            }
        }
    }

    /// Stop the worker, wait for it, then close the device.
    pub fn shutdown(&mut self) {
        self.stop();

        if let Some(mut device) = self.join() {
            device.close();
        }
    }
}

impl<Device: MidiDevice + 'static> Drop for Monitor<Device> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `device` until `running` is cleared, by the caller or by the loop
/// itself when the device is gone.
///
/// Errors raised while `running` is still set are forwarded to `on_error`,
/// errors raised after it was cleared are shutdown noise and are dropped.
pub fn run<Device, OnEvent, OnError>(
    running: &AtomicBool,
    device: &mut Device,
    config: &MonitorConfig,
    mut on_event: OnEvent,
    mut on_error: OnError,
) where
    Device: MidiDevice + ?Sized,
    OnEvent: FnMut(ChannelEvent),
    OnError: FnMut(&MonitorError),
{
    let mut consecutive_errors = 0;
    let batch_size = config.batch_size.max(1);

    while running.load(Ordering::Acquire) {
        let errors = poll_cycle(device, batch_size, &mut on_event);

        if errors.is_empty() {
            consecutive_errors = 0;
        } else {
            if !running.load(Ordering::Acquire) {
                for error in &errors {
                    log::trace!("ignoring error raised during shutdown : {error}");
                }
                break;
            }

            consecutive_errors += 1;
            let device_gone = errors
                .iter()
                .any(|error| matches!(error, MonitorError::DeviceUnavailable(_)));

            for error in &errors {
                log::error!("{error}");
                report(&mut on_error, error);
            }

            if device_gone || consecutive_errors >= config.max_consecutive_errors {
                if !device_gone {
                    report(
                        &mut on_error,
                        &MonitorError::RetriesExhausted {
                            attempts: consecutive_errors,
                        },
                    );
                }

                running.store(false, Ordering::Release);
                break;
            }
        }

        std::thread::sleep(config.poll_interval);
    }
}

/// Read one batch and deliver it. A panicking sink only
/// costs the event it was handed.
fn poll_cycle<Device, OnEvent>(
    device: &mut Device,
    batch_size: usize,
    on_event: &mut OnEvent,
) -> Vec<MonitorError>
where
    Device: MidiDevice + ?Sized,
    OnEvent: FnMut(ChannelEvent),
{
    let batch = panic::catch_unwind(AssertUnwindSafe(|| read_batch(device, batch_size)));

    let packets = match batch {
        Ok(Ok(packets)) => packets,
        Ok(Err(e)) => return vec![e.into()],
        Err(panic) => return vec![MonitorError::Panicked(panic_message(&panic))],
    };

    packets
        .iter()
        .filter_map(|packet| {
            let event = decode(packet);
            panic::catch_unwind(AssertUnwindSafe(|| on_event(event)))
                .err()
                .map(|panic| MonitorError::Panicked(panic_message(&panic)))
        })
        .collect()
}

fn read_batch<Device>(device: &mut Device, batch_size: usize) -> Result<Vec<RawPacket>, DeviceError>
where
    Device: MidiDevice + ?Sized,
{
    if !device.poll()? {
        return Ok(vec![]);
    }

    device.read(batch_size)
}

fn report<OnError: FnMut(&MonitorError)>(on_error: &mut OnError, error: &MonitorError) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| on_error(error))) {
        log::error!("Error sink panicked : {}", panic_message(&panic));
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        format!("{panic:?}")
    }
}
