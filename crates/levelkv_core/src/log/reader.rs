//! Log reader used by recovery and repair.

use crate::coding::{crc32, u32_at};
use crate::error::{CoreError, CoreResult};
use crate::log::record::{RecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION};

/// How the reader reacts to a corrupted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecoveryMode {
    /// Return the corruption as an error.
    Strict,
    /// Drop everything from the corrupted record to the end of the log.
    TolerateTail,
    /// Skip ahead to the next record magic and keep reading.
    Resync,
}

enum Parsed {
    Record { payload_start: usize, len: usize },
    Truncated,
}

/// Sequential reader over the bytes of one log file.
pub(crate) struct LogReader {
    data: Vec<u8>,
    pos: usize,
    mode: RecoveryMode,
    finished: bool,
    dropped_bytes: u64,
    corruptions: Vec<String>,
}

impl LogReader {
    pub(crate) fn new(data: Vec<u8>, mode: RecoveryMode) -> Self {
        Self {
            data,
            pos: 0,
            mode,
            finished: false,
            dropped_bytes: 0,
            corruptions: Vec::new(),
        }
    }

    /// Bytes skipped because they were truncated or corrupt.
    pub(crate) fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Descriptions of the corruption skipped so far.
    pub(crate) fn corruptions(&self) -> &[String] {
        &self.corruptions
    }

    /// Returns the next record payload, or `None` at the end of the log.
    pub(crate) fn next_record(&mut self) -> CoreResult<Option<Vec<u8>>> {
        loop {
            if self.finished || self.pos >= self.data.len() {
                self.finished = true;
                return Ok(None);
            }

            let start = self.pos;
            match self.parse_at(start) {
                Ok(Parsed::Record { payload_start, len }) => {
                    self.pos = payload_start + len + CRC_SIZE;
                    return Ok(Some(self.data[payload_start..payload_start + len].to_vec()));
                }
                Ok(Parsed::Truncated) => {
                    if self.mode == RecoveryMode::Resync {
                        if let Some(next) = self.find_magic(start + 1) {
                            self.skip(start, next, format!("truncated record at offset {start}"));
                            continue;
                        }
                    }
                    self.dropped_bytes += (self.data.len() - start) as u64;
                    self.finished = true;
                    return Ok(None);
                }
                Err(err) => match self.mode {
                    RecoveryMode::Strict => {
                        self.finished = true;
                        return Err(err);
                    }
                    RecoveryMode::TolerateTail => {
                        let end = self.data.len();
                        self.skip(start, end, err.to_string());
                        self.finished = true;
                        return Ok(None);
                    }
                    RecoveryMode::Resync => {
                        let next = self.find_magic(start + 1).unwrap_or(self.data.len());
                        self.skip(start, next, err.to_string());
                    }
                },
            }
        }
    }

    fn skip(&mut self, from: usize, to: usize, reason: String) {
        self.dropped_bytes += (to - from) as u64;
        self.corruptions.push(reason);
        self.pos = to;
    }

    fn find_magic(&self, from: usize) -> Option<usize> {
        if from >= self.data.len() {
            return None;
        }
        self.data[from..]
            .windows(LOG_MAGIC.len())
            .position(|window| window == LOG_MAGIC)
            .map(|offset| from + offset)
    }

    fn parse_at(&self, start: usize) -> CoreResult<Parsed> {
        let data = &self.data;
        if data.len() - start < HEADER_SIZE {
            return Ok(Parsed::Truncated);
        }
        let header = &data[start..start + HEADER_SIZE];

        if header[..4] != LOG_MAGIC {
            return Err(CoreError::corruption(format!(
                "log: invalid magic at offset {start}"
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version == 0 || version > LOG_VERSION {
            return Err(CoreError::corruption(format!(
                "log: unsupported version {version} at offset {start}"
            )));
        }
        if RecordType::from_byte(header[6]).is_none() {
            return Err(CoreError::corruption(format!(
                "log: unknown record type {} at offset {start}",
                header[6]
            )));
        }
        let len = u32_at(header, 7).unwrap_or(0) as usize;

        let payload_start = start + HEADER_SIZE;
        let end = payload_start.saturating_add(len).saturating_add(CRC_SIZE);
        if end > data.len() {
            return Ok(Parsed::Truncated);
        }

        let expected = u32_at(data, payload_start + len).unwrap_or(0);
        let actual = crc32(&data[start..payload_start + len]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                context: "log record",
                expected,
                actual,
            });
        }

        Ok(Parsed::Record { payload_start, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::record::encode_record;

    fn log_of(payloads: &[&[u8]]) -> Vec<u8> {
        payloads
            .iter()
            .flat_map(|p| encode_record(RecordType::Batch, p).unwrap())
            .collect()
    }

    fn read_all(reader: &mut LogReader) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            out.push(record);
        }
        out
    }

    #[test]
    fn empty_log() {
        let mut reader = LogReader::new(Vec::new(), RecoveryMode::Strict);
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.dropped_bytes(), 0);
    }

    #[test]
    fn truncated_tail_is_clean_end() {
        let mut data = log_of(&[b"one", b"two"]);
        data.truncate(data.len() - 2);

        let mut reader = LogReader::new(data, RecoveryMode::Strict);
        assert_eq!(read_all(&mut reader), vec![b"one".to_vec()]);
        assert!(reader.corruptions().is_empty());
        assert!(reader.dropped_bytes() > 0);
    }

    #[test]
    fn partial_header_is_clean_end() {
        let mut data = log_of(&[b"one"]);
        data.extend_from_slice(b"LKV");

        let mut reader = LogReader::new(data, RecoveryMode::Strict);
        assert_eq!(read_all(&mut reader).len(), 1);
    }

    #[test]
    fn strict_mode_fails_on_checksum_mismatch() {
        let mut data = log_of(&[b"one", b"two"]);
        let second = HEADER_SIZE + 3 + CRC_SIZE;
        data[second + HEADER_SIZE] ^= 0xFF;

        let mut reader = LogReader::new(data, RecoveryMode::Strict);
        assert_eq!(reader.next_record().unwrap().unwrap(), b"one");
        let err = reader.next_record().unwrap_err();
        assert!(err.is_corruption());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn tolerate_tail_drops_rest_of_log() {
        let mut data = log_of(&[b"one", b"two", b"three"]);
        let second = HEADER_SIZE + 3 + CRC_SIZE;
        data[second] = b'X';

        let mut reader = LogReader::new(data, RecoveryMode::TolerateTail);
        assert_eq!(read_all(&mut reader), vec![b"one".to_vec()]);
        assert_eq!(reader.corruptions().len(), 1);
        assert!(reader.corruptions()[0].contains("invalid magic"));
    }

    #[test]
    fn resync_skips_to_next_record() {
        let mut data = log_of(&[b"one", b"two", b"three"]);
        let second = HEADER_SIZE + 3 + CRC_SIZE;
        data[second + HEADER_SIZE + 1] ^= 0x55;

        let mut reader = LogReader::new(data, RecoveryMode::Resync);
        assert_eq!(
            read_all(&mut reader),
            vec![b"one".to_vec(), b"three".to_vec()]
        );
        assert_eq!(reader.corruptions().len(), 1);
        assert_eq!(
            reader.dropped_bytes(),
            (HEADER_SIZE + 3 + CRC_SIZE) as u64
        );
    }

    #[test]
    fn resync_recovers_after_garbage_prefix() {
        let mut data = b"garbage".to_vec();
        data.extend(log_of(&[b"kept"]));

        let mut reader = LogReader::new(data, RecoveryMode::Resync);
        assert_eq!(read_all(&mut reader), vec![b"kept".to_vec()]);
        assert_eq!(reader.dropped_bytes(), 7);
    }
}
