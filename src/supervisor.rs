//! The concurrent controller provider: enumerates devices, owns one
//! [`WiimoteEngine`] per device, and runs the reader/writer thread pair.
//!
//! Grounded directly on
//! `original_source/WiimoteControllerProvider.cpp`: the enumeration
//! algorithm, reader loop, and writer loop are translations of
//! `get_controllers`/`reader_thread`/`writer_thread` into
//! `std::sync::{RwLock, Mutex, Condvar}`, the closest idiomatic Rust
//! equivalent to `std::shared_mutex`/`std::condition_variable`. Logging
//! follows the teacher's `eprintln!` style (`manager.rs`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::engine::{Queuer, WiimoteEngine};
use crate::hid::{HidDevice, HidEnumerator};
use crate::state::Snapshot;
use crate::wire::ids::RequestReportId;

const DEFAULT_PACKET_DELAY_MS: u32 = 25;
const ENUMERATION_INTERVAL: Duration = Duration::from_secs(2);
const WRITER_CONDVAR_TIMEOUT: Duration = Duration::from_millis(250);
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// One discovered device, exclusively owned by the supervisor.
struct DeviceRecord {
    device: Box<dyn HidDevice>,
    connected: AtomicBool,
    data_delay_ms: AtomicU32,
    last_write_at_millis: AtomicU64,
    engine: Mutex<WiimoteEngine>,
    state: RwLock<Snapshot>,
}

impl DeviceRecord {
    fn elapsed_since_last_write(&self, epoch: Instant) -> Duration {
        let millis = self.last_write_at_millis.load(Ordering::Relaxed);
        if millis == 0 {
            return Duration::MAX;
        }
        epoch.elapsed().saturating_sub(Duration::from_millis(millis))
    }

    fn mark_written(&self, epoch: Instant) {
        self.last_write_at_millis
            .store(epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
    }
}

/// `(device_index, encoded bytes)`, one pending outbound write.
struct QueuedWrite {
    device_index: usize,
    bytes: Vec<u8>,
}

struct WriterQueue {
    entries: Mutex<VecDeque<QueuedWrite>>,
    condvar: Condvar,
}

/// A [`Queuer`] that pushes onto the supervisor's writer queue,
/// capturing nothing but an `Arc` to it (`spec.md` §9 design note #2:
/// the engine never holds a back-pointer to the supervisor itself).
struct SupervisorQueuer {
    queue: Arc<WriterQueue>,
}

impl Queuer for SupervisorQueuer {
    fn enqueue(&self, device_index: usize, bytes: Vec<u8>) {
        let mut entries = self.queue.entries.lock().unwrap();
        entries.push_back(QueuedWrite { device_index, bytes });
        drop(entries);
        self.queue.condvar.notify_one();
    }
}

/// The controller provider. Owns the reader thread, the writer thread,
/// and the append-only device vector.
pub struct Supervisor {
    devices: Arc<RwLock<Vec<Arc<DeviceRecord>>>>,
    writer_queue: Arc<WriterQueue>,
    stop: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    writer_thread: Option<JoinHandle<()>>,
    enumerator: Arc<dyn HidEnumerator + Send + Sync>,
    epoch: Instant,
}

impl Supervisor {
    #[must_use]
    pub fn new(enumerator: Arc<dyn HidEnumerator + Send + Sync>) -> Self {
        let devices: Arc<RwLock<Vec<Arc<DeviceRecord>>>> = Arc::new(RwLock::new(Vec::new()));
        let writer_queue = Arc::new(WriterQueue { entries: Mutex::new(VecDeque::new()), condvar: Condvar::new() });
        let stop = Arc::new(AtomicBool::new(false));
        let epoch = Instant::now();

        let reader_thread = {
            let devices = Arc::clone(&devices);
            let writer_queue = Arc::clone(&writer_queue);
            let stop = Arc::clone(&stop);
            let enumerator = Arc::clone(&enumerator);
            std::thread::spawn(move || reader_loop(&devices, &writer_queue, &stop, enumerator.as_ref()))
        };
        let writer_thread = {
            let devices = Arc::clone(&devices);
            let writer_queue = Arc::clone(&writer_queue);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || writer_loop(&devices, &writer_queue, &stop, epoch))
        };

        Self {
            devices,
            writer_queue,
            stop,
            reader_thread: Some(reader_thread),
            writer_thread: Some(writer_thread),
            enumerator,
            epoch,
        }
    }

    /// Enumerates candidate devices and returns the current, stable
    /// index set (`spec.md` §4.D enumeration algorithm).
    pub fn get_controllers(&self) -> Vec<usize> {
        enumerate_once(&self.devices, &self.writer_queue, self.enumerator.as_ref());
        self.devices.read().unwrap().iter().enumerate().map(|(i, _)| i).collect()
    }

    #[must_use]
    pub fn is_connected(&self, index: usize) -> bool {
        let devices = self.devices.read().unwrap();
        devices.get(index).is_some_and(|d| d.connected.load(Ordering::SeqCst))
    }

    pub fn set_rumble(&self, index: usize, enabled: bool) {
        let devices = self.devices.read().unwrap();
        let Some(record) = devices.get(index) else { return };
        let queuer = SupervisorQueuer { queue: Arc::clone(&self.writer_queue) };
        record.engine.lock().unwrap().enable_rumble(&queuer, enabled);
    }

    /// `spec.md` §4.D: `(player_index / 4) * 0x10 | (1 << (player_index % 4))`.
    pub fn set_led(&self, index: usize, player_index: u8) {
        let devices = self.devices.read().unwrap();
        let Some(record) = devices.get(index) else { return };
        let mask = (player_index / 4) * 0x10 | (1 << (player_index % 4));
        let queuer = SupervisorQueuer { queue: Arc::clone(&self.writer_queue) };
        record.engine.lock().unwrap().set_led(&queuer, mask);
    }

    #[must_use]
    pub fn get_packet_delay(&self, index: usize) -> u32 {
        let devices = self.devices.read().unwrap();
        devices.get(index).map_or(DEFAULT_PACKET_DELAY_MS, |d| d.data_delay_ms.load(Ordering::Relaxed))
    }

    pub fn set_packet_delay(&self, index: usize, delay_ms: u32) {
        let devices = self.devices.read().unwrap();
        if let Some(record) = devices.get(index) {
            record.data_delay_ms.store(delay_ms, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn get_state(&self, index: usize) -> Option<Snapshot> {
        let devices = self.devices.read().unwrap();
        devices.get(index).map(|d| d.state.read().unwrap().clone())
    }

    pub fn set_ir_camera(&self, index: usize, enabled: bool) {
        let devices = self.devices.read().unwrap();
        let Some(record) = devices.get(index) else { return };
        let queuer = SupervisorQueuer { queue: Arc::clone(&self.writer_queue) };
        record.engine.lock().unwrap().enable_ir(&queuer, enabled);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.writer_queue.condvar.notify_all();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}

fn status_probe_bytes() -> Vec<u8> {
    vec![RequestReportId::Status as u8, 0x00]
}

/// `spec.md` §4.D enumeration algorithm.
fn enumerate_once(
    devices: &RwLock<Vec<Arc<DeviceRecord>>>,
    writer_queue: &Arc<WriterQueue>,
    enumerator: &(dyn HidEnumerator + Send + Sync),
) {
    let mut devices = devices.write().unwrap();

    let mut reclaimable = VecDeque::new();
    for (i, record) in devices.iter().enumerate() {
        let ok = record.device.write_output(&status_probe_bytes());
        record.connected.store(ok, Ordering::SeqCst);
        if !ok {
            reclaimable.push_back(i);
        }
    }

    for candidate in enumerator.enumerate() {
        let writeable = candidate.write_output(&status_probe_bytes());
        if !writeable {
            continue;
        }
        let already_owned = devices.iter().any(|record| {
            record.connected.load(Ordering::SeqCst) && record.device.identity_eq(candidate.as_ref())
        });
        if already_owned {
            continue;
        }

        let index = reclaimable.pop_front().unwrap_or(devices.len());
        let queuer = SupervisorQueuer { queue: Arc::clone(writer_queue) };
        let engine = WiimoteEngine::new(index, &queuer);
        let record = Arc::new(DeviceRecord {
            device: candidate,
            connected: AtomicBool::new(true),
            data_delay_ms: AtomicU32::new(DEFAULT_PACKET_DELAY_MS),
            last_write_at_millis: AtomicU64::new(0),
            engine: Mutex::new(engine),
            state: RwLock::new(Snapshot {
                buttons: 0,
                flags: crate::wire::input::StatusFlags::empty(),
                battery: 0,
                roll: 0.0,
                motion: crate::state::MotionSample::default(),
                ir_camera: crate::state::IrCamera::default(),
                extension: crate::state::Extension::None,
            }),
        });
        if index < devices.len() {
            devices[index] = record;
        } else {
            devices.push(record);
        }
    }
}

fn reader_loop(
    devices: &Arc<RwLock<Vec<Arc<DeviceRecord>>>>,
    writer_queue: &Arc<WriterQueue>,
    stop: &AtomicBool,
    enumerator: &(dyn HidEnumerator + Send + Sync),
) {
    let mut last_enumeration = Instant::now() - ENUMERATION_INTERVAL;
    while !stop.load(Ordering::SeqCst) {
        if last_enumeration.elapsed() > ENUMERATION_INTERVAL {
            enumerate_once(devices, writer_queue, enumerator);
            last_enumeration = Instant::now();
        }

        let mut received_any = false;
        {
            let devices = devices.read().unwrap();
            for record in devices.iter() {
                if !record.connected.load(Ordering::SeqCst) {
                    continue;
                }
                let Some(bytes) = record.device.read_input() else { continue };
                if bytes.is_empty() {
                    continue;
                }
                received_any = true;

                let queuer = SupervisorQueuer { queue: Arc::clone(writer_queue) };
                let mut engine = record.engine.lock().unwrap();
                if engine.parse(&bytes, &queuer) {
                    let snapshot = engine.snapshot();
                    drop(engine);
                    *record.state.write().unwrap() = snapshot;
                } else {
                    eprintln!("wiimote: dropped malformed report ({} bytes)", bytes.len());
                }
            }
        }

        if !received_any {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}

fn writer_loop(devices: &Arc<RwLock<Vec<Arc<DeviceRecord>>>>, writer_queue: &Arc<WriterQueue>, stop: &AtomicBool, epoch: Instant) {
    while !stop.load(Ordering::SeqCst) {
        let mut entries = writer_queue.entries.lock().unwrap();
        while entries.is_empty() {
            let (guard, timeout) = writer_queue
                .condvar
                .wait_timeout(entries, WRITER_CONDVAR_TIMEOUT)
                .unwrap();
            entries = guard;
            if timeout.timed_out() && stop.load(Ordering::SeqCst) {
                return;
            }
            if stop.load(Ordering::SeqCst) {
                return;
            }
        }

        let devices_guard = devices.read().unwrap();
        let mut selected: Option<(usize, usize)> = None; // (queue position, device index)
        for (position, entry) in entries.iter().enumerate() {
            let Some(record) = devices_guard.get(entry.device_index) else { continue };
            let delay = Duration::from_millis(u64::from(record.data_delay_ms.load(Ordering::Relaxed)));
            if record.elapsed_since_last_write(epoch) >= delay {
                selected = Some((position, entry.device_index));
                break;
            }
        }

        let Some((position, device_index)) = selected else {
            drop(entries);
            drop(devices_guard);
            std::thread::sleep(IDLE_SLEEP);
            continue;
        };
        let entry = entries.remove(position).unwrap();
        drop(entries);

        if let Some(record) = devices_guard.get(device_index) {
            let ok = record.device.write_output(&entry.bytes);
            record.connected.store(ok, Ordering::SeqCst);
            if ok {
                record.mark_written(epoch);
            }
        }
        drop(devices_guard);

        std::thread::sleep(IDLE_SLEEP);
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mock::{MockDevice, MockEnumerator};

    #[test]
    fn enumeration_assigns_stable_indices() {
        let device = Arc::new(MockDevice::new(0));
        let enumerator = Arc::new(MockEnumerator::new());
        enumerator.plug_in(Arc::clone(&device));
        let supervisor = Supervisor::new(enumerator);
        let indices = supervisor.get_controllers();
        assert_eq!(indices, vec![0]);
        assert!(supervisor.is_connected(0));
    }

    #[test]
    fn disconnected_slot_is_reclaimed_by_a_new_device() {
        let first = Arc::new(MockDevice::new(0));
        let enumerator = Arc::new(MockEnumerator::new());
        enumerator.plug_in(Arc::clone(&first));
        let supervisor = Supervisor::new(Arc::clone(&enumerator) as Arc<dyn HidEnumerator + Send + Sync>);
        assert_eq!(supervisor.get_controllers(), vec![0]);

        first.disconnect();
        let second = Arc::new(MockDevice::new(1));
        enumerator.plug_in(Arc::clone(&second));
        let indices = supervisor.get_controllers();
        assert_eq!(indices, vec![0]);
        assert!(supervisor.is_connected(0));
    }

    #[test]
    fn led_mapping_matches_spec_formula() {
        let mask = |player_index: u8| (player_index / 4) * 0x10 | (1 << (player_index % 4));
        assert_eq!(mask(5), 0x12);
    }

    #[test]
    fn packet_delay_defaults_and_is_tunable() {
        let device = Arc::new(MockDevice::new(0));
        let enumerator = Arc::new(MockEnumerator::new());
        enumerator.plug_in(Arc::clone(&device));
        let supervisor = Supervisor::new(enumerator);
        supervisor.get_controllers();
        assert_eq!(supervisor.get_packet_delay(0), DEFAULT_PACKET_DELAY_MS);
        supervisor.set_packet_delay(0, 50);
        assert_eq!(supervisor.get_packet_delay(0), 50);
    }
}
