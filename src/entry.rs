use crate::compression::CompressionResult;
use crate::compressor::PendingCompression;
use crate::error::ArchiveError;
use crate::types::CentralDirectoryHeader;

/// Where an entry's compressed payload currently lives.
pub(crate) enum EntryData {
    /// Compression outstanding on the worker pool.
    Pending(PendingCompression),
    /// Compressed bytes in memory; on disk too once the entry is placed.
    Loaded(CompressionResult),
    /// Payload only exists in the backing file (entry read from an
    /// existing archive).
    Disk { data_offset: u64 },
    /// The compression job failed. The payload is gone; the entry can only
    /// report the failure again.
    Failed(String),
}

/// One archive member: its central directory record plus the state of its
/// payload. Content is write-once; replacing it means delete + add.
///
/// The entry does not point back at its archive. The archive owns its
/// entries through an index table and is the only mutator (the
/// compression workers never touch entry state).
pub struct StoredEntry {
    header: CentralDirectoryHeader,
    data: EntryData,
    /// False until the entry's local header and payload sit in the file
    /// at `header.offset`.
    placed: bool,
}

impl StoredEntry {
    /// A freshly added entry whose compression is still running.
    pub(crate) fn pending(
        header: CentralDirectoryHeader,
        pending: PendingCompression,
    ) -> StoredEntry {
        StoredEntry {
            header,
            data: EntryData::Pending(pending),
            placed: false,
        }
    }

    /// An entry loaded from an existing archive; everything already final.
    pub(crate) fn on_disk(header: CentralDirectoryHeader, data_offset: u64) -> StoredEntry {
        StoredEntry {
            header,
            data: EntryData::Disk { data_offset },
            placed: true,
        }
    }

    pub fn file_name(&self) -> String {
        self.header.file_name()
    }

    /// The entry's metadata record. Sizes, CRC and method are unset while
    /// compression is pending; use
    /// [`compression_info_with_wait`](Self::compression_info_with_wait)
    /// for finalized fields.
    pub fn header(&self) -> &CentralDirectoryHeader {
        &self.header
    }

    pub(crate) fn is_placed(&self) -> bool {
        self.placed
    }

    pub(crate) fn mark_placed(&mut self, offset: u64) {
        self.header.offset = offset;
        self.placed = true;
    }

    /// Offset of the first payload byte in the backing file. Only valid
    /// for placed entries.
    pub(crate) fn data_offset(&self) -> u64 {
        match &self.data {
            EntryData::Disk { data_offset } => *data_offset,
            _ => self.header.offset + self.header.local_size(),
        }
    }

    /// End of the entry's byte span (local header through payload) in the
    /// backing file. Only valid for placed entries.
    pub(crate) fn span_end(&self) -> u64 {
        self.data_offset() + self.header.compressed_size
    }

    /// Block until the entry's compression resolves, finalizing the header
    /// fields. Cheap once resolved. This is the engine's with-wait
    /// synchronization point.
    pub fn compression_info_with_wait(
        &mut self,
    ) -> Result<&CentralDirectoryHeader, ArchiveError> {
        self.resolve_with_wait()?;
        Ok(&self.header)
    }

    /// Pending → Loaded, filling sizes, CRC and method from the
    /// compression outcome. A failed job poisons the entry: the error
    /// reaches the caller now and on every later attempt, and the archive
    /// stays dirty.
    pub(crate) fn resolve_with_wait(&mut self) -> Result<(), ArchiveError> {
        match &self.data {
            EntryData::Pending(_) => {}
            EntryData::Failed(detail) => {
                return Err(ArchiveError::CompressionJob(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    detail.clone(),
                )))
            }
            _ => return Ok(()),
        }

        let pending = match std::mem::replace(&mut self.data, EntryData::Failed(String::new())) {
            EntryData::Pending(pending) => pending,
            _ => unreachable!(),
        };

        match pending.wait_result() {
            Ok(result) => {
                self.header.crc32 = result.crc32;
                self.header.compressed_size = result.compressed_size();
                self.header.uncompressed_size = result.uncompressed_size;
                self.header.set_compressor(result.method);

                self.data = EntryData::Loaded(result);
                Ok(())
            }
            Err(e) => {
                self.data = EntryData::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// The compressed payload when it is held in memory.
    pub(crate) fn loaded_data(&self) -> Option<&CompressionResult> {
        match &self.data {
            EntryData::Loaded(result) => Some(result),
            _ => None,
        }
    }
}
