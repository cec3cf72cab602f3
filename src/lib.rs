#![allow(clippy::module_name_repetitions)]

mod calibration;
pub mod engine;
pub mod error;
pub mod hid;
pub mod state;
pub mod supervisor;
pub mod wire;

pub mod prelude {
    pub use crate::engine::{Queuer, WiimoteEngine};
    pub use crate::error::{WiimoteError, WiimoteResult};
    pub use crate::hid::{HidDevice, HidEnumerator};
    pub use crate::state::{Extension, Snapshot};
    pub use crate::supervisor::Supervisor;
}
