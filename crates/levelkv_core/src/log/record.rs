//! Log record envelope.

use crate::coding::{crc32, put_u16, put_u32};
use crate::error::{CoreError, CoreResult};

/// Magic bytes opening every log record.
pub(crate) const LOG_MAGIC: [u8; 4] = *b"LKVL";

/// Current log format version.
pub(crate) const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// Type of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RecordType {
    /// An encoded write batch.
    Batch = 1,
}

impl RecordType {
    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            _ => None,
        }
    }

    pub(crate) const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Wraps `payload` in the record envelope.
pub(crate) fn encode_record(record_type: RecordType, payload: &[u8]) -> CoreResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_argument("log record payload exceeds 4 GiB"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    put_u16(&mut data, LOG_VERSION);
    data.push(record_type.as_byte());
    put_u32(&mut data, len);
    data.extend_from_slice(payload);
    let crc = crc32(&data);
    put_u32(&mut data, crc);
    Ok(data)
}
