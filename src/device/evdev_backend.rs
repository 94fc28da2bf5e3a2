//! Raw evdev capture for Linux
//!
//! Enumerates `/dev/input/event*` nodes, classifies each by its key
//! capabilities, and captures key events on a background thread reading a
//! non-blocking device fd. Kernel event times are mapped onto the
//! monotonic [`Timestamp`] clock.

use super::{CaptureSource, DeviceCategory, DeviceInfo, InputBackend};
use crate::config::CaptureConfig;
use crate::error::{QueueError, Result};
use crate::keyboard::{KeyCode, KeyEventType, RawEvent, Timestamp};
use crate::queue::CaptureSink;
use evdev::{Device, InputEventKind, Key};
use nix::libc;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

const LETTER_KEYS: [Key; 4] = [Key::KEY_A, Key::KEY_Q, Key::KEY_Z, Key::KEY_SPACE];
const KEYPAD_KEYS: [Key; 4] = [Key::KEY_KP0, Key::KEY_KP1, Key::KEY_KP5, Key::KEY_KPENTER];

/// evdev value for an auto-repeat
const VALUE_REPEAT: i32 = 2;
const VALUE_RELEASE: i32 = 0;

/// Backend over the kernel's evdev interface
#[derive(Debug, Clone, Default)]
pub struct EvdevBackend {
    config: CaptureConfig,
}

impl EvdevBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

/// Numeric suffix of `/dev/input/eventN`, for stable ordering
fn event_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Classify a device by the keys it reports. `None` means no key capability.
fn classify(device: &Device) -> Option<DeviceCategory> {
    let keys = device.supported_keys()?;
    if keys.iter().next().is_none() {
        return None;
    }
    let has_all = |set: &[Key]| set.iter().all(|k| keys.contains(*k));

    if has_all(&LETTER_KEYS) {
        Some(DeviceCategory::Keyboard)
    } else if has_all(&KEYPAD_KEYS) {
        Some(DeviceCategory::Keypad)
    } else {
        Some(DeviceCategory::Other)
    }
}

impl InputBackend for EvdevBackend {
    fn name(&self) -> &'static str {
        "evdev"
    }

    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        let input_dir = Path::new("/dev/input");
        if !input_dir.exists() {
            return Err(QueueError::Enumeration(
                "/dev/input does not exist".to_string(),
            ));
        }

        let mut found: Vec<(u32, PathBuf, DeviceCategory, String)> = evdev::enumerate()
            .filter_map(|(path, device)| {
                let number = event_number(&path)?;
                let category = classify(&device)?;
                let name = device.name().unwrap_or("unknown").to_string();
                Some((number, path, category, name))
            })
            .collect();
        found.sort_by_key(|(number, ..)| *number);

        Ok(found
            .into_iter()
            .enumerate()
            .map(|(index, (_, path, category, name))| {
                DeviceInfo::new(index, category, name).with_path(path)
            })
            .collect())
    }

    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn CaptureSource>> {
        let path = device.path.clone().ok_or_else(|| {
            QueueError::Capture(format!("{} has no device node", device.handle))
        })?;
        Ok(Box::new(EvdevCapture::new(path, self.config.clone())))
    }
}

/// Map a kernel (wall-clock) event time onto the monotonic clock using a
/// paired reading of both clocks.
fn to_monotonic(event_time: SystemTime, now_wall: SystemTime, now_mono: Timestamp) -> Timestamp {
    let age = now_wall.duration_since(event_time).unwrap_or(Duration::ZERO);
    let age_us = age.as_micros().min(u64::MAX as u128) as u64;
    Timestamp::from_micros(now_mono.as_micros().saturating_sub(age_us))
}

/// Translate an evdev key value into an event type
fn event_type_for(value: i32, skip_repeats: bool) -> Option<KeyEventType> {
    match value {
        VALUE_RELEASE => Some(KeyEventType::Release),
        VALUE_REPEAT if skip_repeats => None,
        _ => Some(KeyEventType::Press),
    }
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    // SAFETY: fd is owned by `device` and stays open for the duration of both calls
    let rc = unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            flags
        } else {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK)
        }
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Background reader for one evdev node
struct EvdevCapture {
    path: PathBuf,
    config: CaptureConfig,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl EvdevCapture {
    fn new(path: PathBuf, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

fn read_loop(mut device: Device, sink: CaptureSink, shutdown: Arc<AtomicBool>, config: CaptureConfig) {
    let interval = config.poll_interval();

    while !shutdown.load(Ordering::SeqCst) {
        match device.fetch_events() {
            Ok(events) => {
                let now_wall = SystemTime::now();
                let now_mono = Timestamp::now();
                for event in events {
                    let InputEventKind::Key(key) = event.kind() else {
                        continue;
                    };
                    let Some(event_type) = event_type_for(event.value(), config.skip_repeats) else {
                        continue;
                    };
                    let timestamp = to_monotonic(event.timestamp(), now_wall, now_mono);
                    sink.push(RawEvent::new(KeyCode(key.code()), event_type, timestamp));
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(interval),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                sink.report_error(e.to_string());
                break;
            }
        }
    }
    log::debug!("{}: evdev reader exiting", sink.device());
}

impl CaptureSource for EvdevCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let device = Device::open(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                QueueError::Capture(format!(
                    "permission denied on {}; run with sudo or add user to 'input' group",
                    self.path.display()
                ))
            } else {
                QueueError::Capture(format!("{}: {}", self.path.display(), e))
            }
        })?;
        set_nonblocking(&device).map_err(|e| QueueError::Capture(e.to_string()))?;

        self.shutdown.store(false, Ordering::SeqCst);
        let shutdown = Arc::clone(&self.shutdown);
        let config = self.config.clone();

        let worker = thread::Builder::new()
            .name(format!("kbqueue-evdev-{}", sink.device().index()))
            .spawn(move || read_loop(device, sink, shutdown, config))
            .map_err(|e| QueueError::Capture(e.to_string()))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("evdev capture thread for {} panicked", self.path.display());
            }
        }
    }
}

impl Drop for EvdevCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Get a status message about evdev availability
pub fn evdev_status() -> String {
    match EvdevBackend::default().enumerate() {
        Ok(devices) if devices.is_empty() => {
            "No accessible input devices - run with sudo or add user to 'input' group".to_string()
        }
        Ok(devices) => format!("{} input device(s) found", devices.len()),
        Err(e) => format!("Error: {}", e),
    }
}
