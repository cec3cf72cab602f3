//! The HID capability the supervisor consumes. `spec.md` §1 treats the
//! real transport as an external collaborator; this module defines only
//! the trait shape (§6.1) plus an in-memory mock used by the engine and
//! supervisor test suites, in the spirit of the teacher's
//! `native::null` no-op backend for platforms without a real driver.

/// One opened Wiimote-class HID endpoint. Implementations do not retain
/// per-report state; all protocol state lives in the owning
/// `WiimoteEngine`/`DeviceRecord`. `Sync` is required because the
/// supervisor shares one `Arc<DeviceRecord>` between its reader and
/// writer threads.
pub trait HidDevice: Send + Sync {
    /// Reads one report, blocking up to an implementation-defined short
    /// interval. `None` on timeout, `Some(vec![])` on a benign empty
    /// read, `Some(bytes)` otherwise.
    fn read_input(&self) -> Option<Vec<u8>>;

    /// Writes one fully-encoded report. Returns whether the transport
    /// accepted it.
    fn write_output(&self, bytes: &[u8]) -> bool;

    /// Whether `other` refers to the same physical device as `self`,
    /// used by the supervisor to deduplicate across enumerations.
    fn identity_eq(&self, other: &dyn HidDevice) -> bool;
}

/// Enumerates every Wiimote-class HID device currently exposed by the OS.
pub trait HidEnumerator {
    fn enumerate(&self) -> Vec<Box<dyn HidDevice>>;
}

/// A scriptable in-memory [`HidDevice`]/[`HidEnumerator`] pair for tests.
pub mod mock {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{HidDevice, HidEnumerator};

    /// A mock device identified by an opaque id, with a scripted queue
    /// of inbound reports and a log of outbound writes.
    pub struct MockDevice {
        id: usize,
        connected: AtomicBool,
        inbound: Mutex<Vec<Vec<u8>>>,
        outbound: Mutex<Vec<Vec<u8>>>,
    }

    impl MockDevice {
        #[must_use]
        pub fn new(id: usize) -> Self {
            Self {
                id,
                connected: AtomicBool::new(true),
                inbound: Mutex::new(Vec::new()),
                outbound: Mutex::new(Vec::new()),
            }
        }

        #[must_use]
        pub fn id(&self) -> usize {
            self.id
        }

        /// Appends a report to the queue `read_input` will return, in order.
        pub fn script(&self, report: Vec<u8>) {
            self.inbound.lock().unwrap().push(report);
        }

        /// Simulates the physical device dropping off; subsequent writes fail.
        pub fn disconnect(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }

        #[must_use]
        pub fn written_reports(&self) -> Vec<Vec<u8>> {
            self.outbound.lock().unwrap().clone()
        }
    }

    impl HidDevice for MockDevice {
        fn read_input(&self) -> Option<Vec<u8>> {
            let mut queue = self.inbound.lock().unwrap();
            if queue.is_empty() {
                return None;
            }
            Some(queue.remove(0))
        }

        fn write_output(&self, bytes: &[u8]) -> bool {
            if !self.connected.load(Ordering::SeqCst) {
                return false;
            }
            self.outbound.lock().unwrap().push(bytes.to_vec());
            true
        }

        fn identity_eq(&self, other: &dyn HidDevice) -> bool {
            std::ptr::eq(self as *const Self as *const (), other as *const dyn HidDevice as *const ())
        }
    }

    /// Shares one `MockDevice` between the enumerator's `dyn HidDevice`
    /// return value and a test's own `Arc` handle used for scripting and
    /// inspection.
    struct SharedDevice(Arc<MockDevice>);

    impl HidDevice for SharedDevice {
        fn read_input(&self) -> Option<Vec<u8>> {
            self.0.read_input()
        }

        fn write_output(&self, bytes: &[u8]) -> bool {
            self.0.write_output(bytes)
        }

        fn identity_eq(&self, other: &dyn HidDevice) -> bool {
            self.0.identity_eq(other)
        }
    }

    /// An enumerator over a caller-managed set of mock devices. Tests
    /// hold the `Arc<MockDevice>` handles to script reads and disconnect
    /// devices; `enumerate()` hands out thin wrappers around the same
    /// devices so the supervisor's `identity_eq` dedup sees a stable
    /// identity across enumerations.
    #[derive(Default)]
    pub struct MockEnumerator {
        devices: Mutex<Vec<Arc<MockDevice>>>,
    }

    impl MockEnumerator {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds a device the next `enumerate()` call will report.
        pub fn plug_in(&self, device: Arc<MockDevice>) {
            self.devices.lock().unwrap().push(device);
        }
    }

    impl HidEnumerator for MockEnumerator {
        fn enumerate(&self) -> Vec<Box<dyn HidDevice>> {
            self.devices
                .lock()
                .unwrap()
                .iter()
                .map(|device| Box::new(SharedDevice(Arc::clone(device))) as Box<dyn HidDevice>)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockDevice;
    use super::HidDevice;

    #[test]
    fn scripted_reads_are_returned_in_order() {
        let device = MockDevice::new(0);
        device.script(vec![0x20, 0x00]);
        device.script(vec![0x21, 0x01]);
        assert_eq!(device.read_input(), Some(vec![0x20, 0x00]));
        assert_eq!(device.read_input(), Some(vec![0x21, 0x01]));
        assert_eq!(device.read_input(), None);
    }

    #[test]
    fn disconnect_fails_subsequent_writes() {
        let device = MockDevice::new(0);
        assert!(device.write_output(&[0x11, 0x00]));
        device.disconnect();
        assert!(!device.write_output(&[0x11, 0x00]));
    }

    #[test]
    fn identity_eq_is_reflexive_and_distinguishes_instances() {
        let a = MockDevice::new(0);
        let b = MockDevice::new(1);
        assert!(a.identity_eq(&a));
        assert!(!a.identity_eq(&b));
    }
}
