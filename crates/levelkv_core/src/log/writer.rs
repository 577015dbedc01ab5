//! Log writer.

use crate::error::CoreResult;
use crate::log::record::{encode_record, RecordType};
use levelkv_storage::StorageBackend;

/// Appends batch records to one numbered log file.
pub(crate) struct LogWriter {
    backend: Box<dyn StorageBackend>,
    number: u64,
}

impl LogWriter {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, number: u64) -> Self {
        Self { backend, number }
    }

    pub(crate) fn number(&self) -> u64 {
        self.number
    }

    /// Appends one record. The bytes reach the OS on [`flush`](Self::flush)
    /// and stable storage on [`sync`](Self::sync).
    pub(crate) fn add_record(&mut self, payload: &[u8]) -> CoreResult<u64> {
        let record = encode_record(RecordType::Batch, payload)?;
        Ok(self.backend.append(&record)?)
    }

    pub(crate) fn flush(&mut self) -> CoreResult<()> {
        Ok(self.backend.flush()?)
    }

    pub(crate) fn sync(&mut self) -> CoreResult<()> {
        Ok(self.backend.sync()?)
    }

    /// Read access for in-memory databases that replay their own log.
    #[cfg(test)]
    pub(crate) fn contents(&self) -> CoreResult<Vec<u8>> {
        Ok(self.backend.read_all()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogReader, RecoveryMode};
    use levelkv_storage::InMemoryBackend;

    #[test]
    fn appended_records_read_back() {
        let mut writer = LogWriter::new(Box::new(InMemoryBackend::new()), 5);
        assert_eq!(writer.number(), 5);
        assert_eq!(writer.add_record(b"first").unwrap(), 0);
        writer.add_record(b"second").unwrap();
        writer.flush().unwrap();
        writer.sync().unwrap();

        let mut reader = LogReader::new(writer.contents().unwrap(), RecoveryMode::Strict);
        assert_eq!(reader.next_record().unwrap().unwrap(), b"first");
        assert_eq!(reader.next_record().unwrap().unwrap(), b"second");
        assert!(reader.next_record().unwrap().is_none());
    }
}
