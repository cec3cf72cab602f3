/// Errors raised while decoding a calibration block or other framed data
/// read from the Wii remote.
///
/// These never escape the [`crate::supervisor::Supervisor`]: a failed
/// calibration read is logged and the extension is left unidentified,
/// per the error handling design (protocol-malformed data is dropped,
/// not propagated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiimoteError {
    /// The device was disconnected while a multi-step conversation (e.g.
    /// extension identification) was in progress.
    Disconnected,
    /// A calibration block's checksum did not match its contents.
    InvalidChecksum,
    /// A report or calibration block had an unexpected shape.
    InvalidData,
}

pub type WiimoteResult<T> = Result<T, WiimoteError>;
