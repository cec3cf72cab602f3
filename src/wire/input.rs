//! Inbound (device -> host) report decoding.
//!
//! Grounded on the teacher's `input.rs` (struct shapes, bitflags usage)
//! and on `original_source/WiimoteHandler.cpp`'s `Messages::*` structs
//! for the exact per-report-id body layouts.

use bitflags::bitflags;

use crate::wire::ids::ResponseReportId;

bitflags! {
    /// Byte index 2 of a `Status` report (`spec.md` §4.A).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u8 {
        const BATTERY_LOW             = 0b0000_0001;
        const EXTENSION_CONNECTED     = 0b0000_0010;
        const SPEAKER_ENABLED         = 0b0000_0100;
        const IR_CAMERA_ENABLED       = 0b0000_1000;
        const LED_1                   = 0b0001_0000;
        const LED_2                   = 0b0010_0000;
        const LED_3                   = 0b0100_0000;
        const LED_4                   = 0b1000_0000;
    }
}

/// `Status` input report (id `0x20`, 6-byte body).
#[derive(Debug, Clone, Copy)]
pub struct StatusBody {
    pub core: u16,
    pub flags: StatusFlags,
    pub battery: u8,
}

/// `MemoryRead` input report (id `0x21`, 21-byte body).
#[derive(Debug, Clone, Copy)]
pub struct MemoryReadBody {
    pub core: u16,
    pub size: u8,
    pub error: u8,
    pub address: u16,
    pub data: [u8; 16],
}

/// `Acknowledgement` input report (id `0x22`).
#[derive(Debug, Clone, Copy)]
pub struct AcknowledgementBody {
    pub core: u16,
    pub report_id: u8,
    pub result: u8,
}

/// One continuous data report (ids `0x30..=0x37`), shaped by the report
/// mode currently selected with `ReportMode`.
#[derive(Debug, Clone, Copy)]
pub enum DataBody<'a> {
    Core,
    CoreAcc { accel: (u8, u8, u8) },
    CoreExt8 { ext: &'a [u8] },
    CoreAccIr12 { accel: (u8, u8, u8), ir: &'a [u8] },
    CoreExt19 { ext: &'a [u8] },
    CoreAccExt16 { accel: (u8, u8, u8), ext: &'a [u8] },
    CoreIr10Ext9 { ir: &'a [u8], ext: &'a [u8] },
    CoreAccIr10Ext6 { accel: (u8, u8, u8), ir: &'a [u8], ext: &'a [u8] },
}

fn read_u16_le(body: &[u8]) -> u16 {
    u16::from_le_bytes([body[0], body[1]])
}

/// Decodes a `Status` body. Returns `None` if shorter than 6 bytes.
#[must_use]
pub fn decode_status(body: &[u8]) -> Option<StatusBody> {
    if body.len() < 6 {
        return None;
    }
    Some(StatusBody {
        core: read_u16_le(body),
        flags: StatusFlags::from_bits_truncate(body[2]),
        battery: body[5],
    })
}

/// Decodes a `MemoryRead` body. Returns `None` if shorter than 21 bytes.
#[must_use]
pub fn decode_memory_read(body: &[u8]) -> Option<MemoryReadBody> {
    if body.len() < 21 {
        return None;
    }
    let mut data = [0u8; 16];
    data.copy_from_slice(&body[5..21]);
    Some(MemoryReadBody {
        core: read_u16_le(body),
        size: (body[2] >> 4) + 1,
        error: body[2] & 0x0F,
        address: u16::from_be_bytes([body[3], body[4]]),
        data,
    })
}

/// Decodes an `Acknowledgement` body. Returns `None` if shorter than 4 bytes.
#[must_use]
pub fn decode_acknowledgement(body: &[u8]) -> Option<AcknowledgementBody> {
    if body.len() < 4 {
        return None;
    }
    Some(AcknowledgementBody {
        core: read_u16_le(body),
        report_id: body[2],
        result: body[3],
    })
}

/// Combines a core+accelerometer byte triple into the three 10-bit raw
/// accelerometer readings, folding in the low bits packed into the core
/// button word.
///
/// Grounded on the teacher's verified
/// `AccelerometerData::from_normal_reporting`, not the hand-derived bit
/// indices in `spec.md` §9 (see `DESIGN.md` open question #1).
#[must_use]
pub const fn decode_accel_raw(core: u16, accel: (u8, u8, u8)) -> (u16, u16, u16) {
    let bb1 = core & 0x00FF;
    let bb2 = (core >> 8) & 0x00FF;
    let x = ((accel.0 as u16) << 2) | ((bb1 >> 5) & 0b11);
    let y = ((accel.1 as u16) << 2) | ((bb2 >> 5) & 0b10);
    let z = ((accel.2 as u16) << 2) | ((bb2 >> 6) & 0b10);
    (x, y, z)
}

/// Decodes a continuous data report body given its report id and the
/// bytes following the 2-byte core button word. Returns `None` if the
/// body is shorter than the report id's documented layout requires.
#[must_use]
pub fn decode_data_body<'a>(id: ResponseReportId, rest: &'a [u8]) -> Option<DataBody<'a>> {
    match id {
        ResponseReportId::DataCore => Some(DataBody::Core),
        ResponseReportId::DataCoreAcc => {
            (rest.len() >= 3).then(|| DataBody::CoreAcc { accel: (rest[0], rest[1], rest[2]) })
        }
        ResponseReportId::DataCoreExt8 => {
            (rest.len() >= 8).then(|| DataBody::CoreExt8 { ext: &rest[..8] })
        }
        ResponseReportId::DataCoreAccIr12 => (rest.len() >= 15).then(|| DataBody::CoreAccIr12 {
            accel: (rest[0], rest[1], rest[2]),
            ir: &rest[3..15],
        }),
        ResponseReportId::DataCoreExt19 => {
            (rest.len() >= 19).then(|| DataBody::CoreExt19 { ext: &rest[..19] })
        }
        ResponseReportId::DataCoreAccExt16 => (rest.len() >= 19).then(|| DataBody::CoreAccExt16 {
            accel: (rest[0], rest[1], rest[2]),
            ext: &rest[3..19],
        }),
        ResponseReportId::DataCoreIr10Ext9 => (rest.len() >= 19).then(|| DataBody::CoreIr10Ext9 {
            ir: &rest[..10],
            ext: &rest[10..19],
        }),
        ResponseReportId::DataCoreAccIr10Ext6 => {
            (rest.len() >= 19).then(|| DataBody::CoreAccIr10Ext6 {
                accel: (rest[0], rest[1], rest[2]),
                ir: &rest[3..13],
                ext: &rest[13..19],
            })
        }
        ResponseReportId::Status
        | ResponseReportId::Read
        | ResponseReportId::Acknowledge
        | ResponseReportId::DataExt21 => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_status_and_mask() {
        let body = [0x00, 0x0F, 0x02, 0x00, 0x00, 0xC8];
        let status = decode_status(&body).unwrap();
        assert_eq!(status.core, 0x000F);
        assert!(status.flags.contains(StatusFlags::EXTENSION_CONNECTED));
        assert_eq!(status.battery, 0xC8);
    }

    #[test]
    fn s3_accel_zero_point() {
        let (x, y, z) = decode_accel_raw(0x0000, (128, 128, 128));
        assert_eq!((x, y, z), (512, 512, 512));
    }

    #[test]
    fn memory_read_address_is_big_endian() {
        let mut body = [0u8; 21];
        body[2] = 0xF7; // size=16(0xF), error=7
        body[3] = 0x12;
        body[4] = 0xAB;
        body[5..21].copy_from_slice(b"1234567890123456");
        let decoded = decode_memory_read(&body).unwrap();
        assert_eq!(decoded.size, 16);
        assert_eq!(decoded.error, 7);
        assert_eq!(decoded.address, 0x12AB);
        assert_eq!(&decoded.data, b"1234567890123456");
    }

    #[test]
    fn data_report_rejects_short_buffers() {
        assert!(decode_data_body(ResponseReportId::DataCoreAcc, &[]).is_none());
        assert!(decode_data_body(ResponseReportId::DataCoreAccIr10Ext6, &[0; 5]).is_none());
    }
}
