use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use crc32fast::Hasher;

use crate::compression::{inflate_bytes, CompressionMethod};
use crate::compressor::{CompressionStrategy, DEFAULT_STORE_RATIO};
use crate::descriptor::ArchiveDescriptor;
use crate::directory::{
    build_central_directory_entry, build_end_of_central_directory, build_local_file_header,
    parse_central_directory, CentralDirectoryEnd, LocalFileHeaderFixed,
};
use crate::entry::StoredEntry;
use crate::error::ArchiveError;
use crate::executor::JobPool;
use crate::ranges::FreeRangeTracker;
use crate::tools::normalize_entry_path;
use crate::types::{CentralDirectoryHeader, FileDateTime};

/// Configuration for a [`ZipArchive`]. There is no process-wide state: the
/// pool width, the compression strategy and the store-is-best threshold all
/// travel with the archive that uses them.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// How entry payloads are compressed.
    pub compression_strategy: CompressionStrategy,

    /// Width of the compression worker pool. 0 runs compression inline on
    /// the calling thread, which test fixtures use for determinism.
    pub worker_threads: usize,

    /// See [`DEFAULT_STORE_RATIO`].
    pub store_ratio_threshold: f64,

    /// Timestamp stamped on new entries.
    pub timestamp: FileDateTime,
}

impl ArchiveOptions {
    /// Set the compression strategy for new entries.
    pub fn compression_strategy(mut self, strategy: CompressionStrategy) -> ArchiveOptions {
        self.compression_strategy = strategy;
        self
    }

    /// Set the worker pool width. 0 means same-thread compression.
    pub fn worker_threads(mut self, worker_threads: usize) -> ArchiveOptions {
        self.worker_threads = worker_threads;
        self
    }

    /// Set the ratio a deflate result must beat for the archive to keep it
    /// over STORE.
    pub fn store_ratio_threshold(mut self, ratio: f64) -> ArchiveOptions {
        self.store_ratio_threshold = ratio;
        self
    }

    /// Set the timestamp for new entries.
    ///
    /// The default is [`FileDateTime::Zero`] so that a fixed entry set
    /// produces byte-identical archives.
    pub fn timestamp(mut self, timestamp: FileDateTime) -> ArchiveOptions {
        self.timestamp = timestamp;
        self
    }
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression_strategy: CompressionStrategy::default(),
            worker_threads: JobPool::default_worker_count(),
            store_ratio_threshold: DEFAULT_STORE_RATIO,
            timestamp: FileDateTime::Zero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveState {
    /// In-memory and on-disk state agree.
    Clean,
    /// At least one add or delete since the last flush; the on-disk
    /// central directory is stale.
    Dirty,
    Closed,
}

/// An incrementally updatable ZIP archive over a seekable backing file.
///
/// Entries are keyed by normalized path. Adds enqueue compression on the
/// worker pool and return immediately; deletes leave a hole that later
/// adds reuse (best fit) instead of growing the file. Nothing touches the
/// on-disk directory until [`update`](Self::update) or
/// [`close`](Self::close) flushes: entry data first, directory last, then
/// the file is truncated past the directory.
///
/// One mutator at a time: the archive hands out no synchronization, the
/// only cross-thread piece is the compression pool behind it.
pub struct ZipArchive {
    file: Option<File>,
    entries: Vec<Option<StoredEntry>>,
    index: HashMap<String, usize>,
    free: FreeRangeTracker,
    /// End of the last live byte of entry data; the directory goes here.
    data_end: u64,
    state: ArchiveState,
    options: ArchiveOptions,
    pool: JobPool,
    archive_comment: Option<Vec<u8>>,
}

impl ZipArchive {
    /// Create a new, empty archive at `path`, truncating anything there.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<ZipArchive, ArchiveError> {
        Self::create_with_options(path, ArchiveOptions::default())
    }

    pub fn create_with_options<P: AsRef<Path>>(
        path: P,
        options: ArchiveOptions,
    ) -> Result<ZipArchive, ArchiveError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let pool = JobPool::new(options.worker_threads);

        Ok(ZipArchive {
            file: Some(file),
            entries: Vec::new(),
            index: HashMap::new(),
            free: FreeRangeTracker::new(),
            data_end: 0,
            // the empty directory has not been written yet
            state: ArchiveState::Dirty,
            options,
            pool,
            archive_comment: None,
        })
    }

    /// Open an existing archive for incremental modification.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ZipArchive, ArchiveError> {
        Self::open_with_options(path, ArchiveOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(
        path: P,
        options: ArchiveOptions,
    ) -> Result<ZipArchive, ArchiveError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let (central_directory_end, headers) = parse_central_directory(&mut file)?;

        let mut entries: Vec<Option<StoredEntry>> = Vec::with_capacity(headers.len());
        let mut index: HashMap<String, usize> = HashMap::with_capacity(headers.len());
        let mut spans: Vec<(u64, u64, bool)> = Vec::with_capacity(headers.len());

        for header in headers {
            let name = normalize_entry_path(&header.file_name())?;
            if index.contains_key(&name) {
                return Err(ArchiveError::BadArchiveStructure(format!(
                    "duplicate entry '{}' in the central directory",
                    name
                )));
            }

            // the local header carries its own name/extra lengths, which
            // need not match the central record
            file.seek(SeekFrom::Start(header.offset))?;
            let mut local_buffer = [0u8; crate::constants::FILE_HEADER_BASE_SIZE];
            file.read_exact(&mut local_buffer).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ArchiveError::BadArchiveStructure(format!(
                        "local header of '{}' lies past end of file",
                        name
                    ))
                } else {
                    ArchiveError::IoError(e)
                }
            })?;
            let local = LocalFileHeaderFixed::parse(&local_buffer)?;

            let data_offset = header.offset + local.size();
            spans.push((
                header.offset,
                data_offset + header.compressed_size,
                header.has_data_descriptor(),
            ));

            index.insert(name, entries.len());
            entries.push(Some(StoredEntry::on_disk(header, data_offset)));
        }

        spans.sort_unstable();

        let mut free = FreeRangeTracker::new();
        let mut previous_end = 0u64;
        let mut previous_has_descriptor = false;
        for &(start, end, has_descriptor) in &spans {
            if start < previous_end {
                return Err(ArchiveError::BadArchiveStructure(format!(
                    "entry data overlaps at offset {:}",
                    start
                )));
            }
            // a gap behind a descriptor-flagged entry holds its data
            // descriptor, of unstated size; leave it alone
            if start > previous_end && !previous_has_descriptor {
                free.release(previous_end, start - previous_end);
            }
            previous_end = end;
            previous_has_descriptor = has_descriptor;
        }

        let mut data_end = previous_end;
        if previous_has_descriptor {
            // keep the tail entry's data descriptor out of the directory's way
            data_end = data_end.max(central_directory_end.offset_of_start_of_central_directory);
        }

        let pool = JobPool::new(options.worker_threads);

        Ok(ZipArchive {
            file: Some(file),
            entries,
            index,
            free,
            data_end,
            state: ArchiveState::Clean,
            options,
            pool,
            archive_comment: central_directory_end.archive_comment,
        })
    }

    /// Append a new entry with the payload read from `payload`. The source
    /// is drained and hashed here; compression is handed to the worker
    /// pool and this returns without waiting for it.
    ///
    /// Fails with [`ArchiveError::DuplicateEntry`] when the normalized
    /// path is already taken.
    pub fn add<R: Read>(&mut self, file_name: &str, payload: &mut R) -> Result<(), ArchiveError> {
        self.ensure_open()?;

        let name = normalize_entry_path(file_name)?;
        if name.len() > u16::MAX as usize {
            return Err(ArchiveError::ZipFormatLimit(format!(
                "entry name of {:} bytes does not fit a ZIP name field",
                name.len()
            )));
        }
        if self.index.contains_key(&name) {
            return Err(ArchiveError::DuplicateEntry(name));
        }

        let mut raw: Vec<u8> = Vec::new();
        let mut hasher = Hasher::new();
        let mut buf = vec![0; 4096];

        loop {
            let read = payload.read(&mut buf)?;
            if read == 0 {
                break;
            }

            hasher.update(&buf[..read]);
            raw.extend_from_slice(&buf[..read]);
        }

        let crc32 = hasher.finalize();
        let source = Arc::new(raw);

        let header = CentralDirectoryHeader::new(&name, &self.options.timestamp);
        let pending = self.options.compression_strategy.submit(
            &self.pool,
            source,
            crc32,
            self.options.store_ratio_threshold,
        );

        self.index.insert(name, self.entries.len());
        self.entries.push(Some(StoredEntry::pending(header, pending)));
        self.state = ArchiveState::Dirty;

        Ok(())
    }

    /// Remove an entry. Its byte span becomes a free range that later adds
    /// can reuse; the file itself shrinks no earlier than the next flush.
    pub fn delete(&mut self, file_name: &str) -> Result<(), ArchiveError> {
        self.ensure_open()?;

        let name = normalize_entry_path(file_name)?;
        let idx = match self.index.remove(&name) {
            Some(idx) => idx,
            None => return Err(ArchiveError::EntryNotFound(name)),
        };

        let entry = self.entries[idx].take().expect("index points at a live entry");

        if entry.is_placed() {
            let span_start = entry.header().offset;
            let span_end = entry.span_end();

            if span_end == self.data_end {
                self.data_end = self.free.trim_tail(span_start);
            } else {
                self.free.release(span_start, span_end - span_start);
            }
        }

        self.state = ArchiveState::Dirty;

        Ok(())
    }

    /// Read back an entry's payload, decompressed and CRC-checked. Blocks
    /// if the entry's compression is still running.
    pub fn read(&mut self, file_name: &str) -> Result<Vec<u8>, ArchiveError> {
        self.ensure_open()?;

        let name = normalize_entry_path(file_name)?;
        let idx = match self.index.get(&name) {
            Some(&idx) => idx,
            None => return Err(ArchiveError::EntryNotFound(name)),
        };

        let entry = self.entries[idx].as_mut().expect("index points at a live entry");
        entry.resolve_with_wait()?;

        let compressed: Vec<u8> = match entry.loaded_data() {
            Some(result) => result.data.as_ref().clone(),
            None => {
                let data_offset = entry.data_offset();
                let size = entry.header().compressed_size as usize;

                let file = match self.file.as_mut() {
                    Some(file) => file,
                    None => return Err(ArchiveError::ArchiveClosed),
                };
                file.seek(SeekFrom::Start(data_offset))?;
                let mut data = vec![0; size];
                file.read_exact(&mut data)?;
                data
            }
        };

        let entry = self.entries[idx].as_ref().expect("index points at a live entry");
        let raw = match entry.header().compressor {
            CompressionMethod::Store() => compressed,
            CompressionMethod::Deflate() => inflate_bytes(&compressed).map_err(|e| {
                ArchiveError::BadArchiveStructure(format!(
                    "entry '{}' does not inflate: {:}",
                    name, e
                ))
            })?,
            CompressionMethod::Unknown(code) => {
                return Err(ArchiveError::UnsupportedCompressionMethodCode(code))
            }
        };

        let mut hasher = Hasher::new();
        hasher.update(&raw);
        if hasher.finalize() != entry.header().crc32 {
            return Err(ArchiveError::BadArchiveStructure(format!(
                "CRC mismatch for entry '{}'",
                name
            )));
        }

        Ok(raw)
    }

    /// Block until the entry's compression resolves and return its
    /// finalized metadata record.
    pub fn compression_info_with_wait(
        &mut self,
        file_name: &str,
    ) -> Result<&CentralDirectoryHeader, ArchiveError> {
        self.ensure_open()?;

        let name = normalize_entry_path(file_name)?;
        let idx = match self.index.get(&name) {
            Some(&idx) => idx,
            None => return Err(ArchiveError::EntryNotFound(name)),
        };

        let entry = self.entries[idx].as_mut().expect("index points at a live entry");
        entry.compression_info_with_wait()
    }

    /// Make the on-disk file consistent with the in-memory state: wait for
    /// outstanding compressions, place new entries (best-fit into free
    /// ranges, else append), then rewrite the central directory and
    /// truncate trailing waste.
    ///
    /// A no-op when nothing changed since the last flush, so calling it
    /// twice in a row leaves the file byte-identical. On a write failure
    /// the state stays dirty and the flush can be retried.
    pub fn update(&mut self) -> Result<(), ArchiveError> {
        match self.state {
            ArchiveState::Closed => Err(ArchiveError::ArchiveClosed),
            ArchiveState::Clean => Ok(()),
            ArchiveState::Dirty => self.flush(),
        }
    }

    /// Flush pending changes, drain the worker pool and release the
    /// backing file. In-flight compression jobs are always waited out,
    /// never cancelled. Every operation after this fails with
    /// [`ArchiveError::ArchiveClosed`].
    pub fn close(&mut self) -> Result<(), ArchiveError> {
        self.update()?;

        self.pool.shutdown();
        self.file = None;
        self.state = ArchiveState::Closed;

        Ok(())
    }

    /// Set the archive comment, truncated to 0xFFFF bytes.
    pub fn set_archive_comment(&mut self, comment: &str) {
        let bytes = comment.as_bytes();
        let len = std::cmp::min(bytes.len(), u16::MAX as usize);
        self.archive_comment = Some(bytes[0..len].to_owned());

        if self.state == ArchiveState::Clean {
            self.state = ArchiveState::Dirty;
        }
    }

    /// Live entry names, in the order the entries joined the archive.
    pub fn entry_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .flatten()
            .map(StoredEntry::file_name)
            .collect()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        match normalize_entry_path(file_name) {
            Ok(name) => self.index.contains_key(&name),
            Err(_) => false,
        }
    }

    pub fn entry(&self, file_name: &str) -> Option<&StoredEntry> {
        let name = normalize_entry_path(file_name).ok()?;
        let idx = *self.index.get(&name)?;
        self.entries[idx].as_ref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn ensure_open(&self) -> Result<(), ArchiveError> {
        if self.state == ArchiveState::Closed {
            return Err(ArchiveError::ArchiveClosed);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ArchiveError> {
        // all sizes must be final before anything is placed
        for entry in self.entries.iter_mut().flatten() {
            entry.resolve_with_wait()?;
        }

        if self.index.len() > u16::MAX as usize {
            return Err(ArchiveError::ZipFormatLimit(format!(
                "{:} entries exceed the ZIP entry count field",
                self.index.len()
            )));
        }

        // data first: every new entry lands before the directory moves
        for idx in 0..self.entries.len() {
            let (record_size, needs_placement) = match &self.entries[idx] {
                Some(entry) if !entry.is_placed() => {
                    let header = entry.header();
                    if header.compressed_size >= u32::MAX as u64
                        || header.uncompressed_size >= u32::MAX as u64
                    {
                        return Err(ArchiveError::ZipFormatLimit(format!(
                            "entry '{}' is too large for a classic ZIP record",
                            entry.file_name()
                        )));
                    }
                    (header.local_size() + header.compressed_size, true)
                }
                _ => (0, false),
            };

            if !needs_placement {
                continue;
            }

            let offset = match self.free.allocate(record_size) {
                Some(offset) => offset,
                None => {
                    let offset = self.data_end;
                    self.data_end += record_size;
                    offset
                }
            };

            if offset + record_size > u32::MAX as u64 {
                return Err(ArchiveError::ZipFormatLimit(
                    "archive grew past the 4 GiB classic ZIP limit".to_owned(),
                ));
            }

            let (local_header, data) = {
                let entry = self.entries[idx].as_ref().expect("placement checked the slot");
                let result = entry
                    .loaded_data()
                    .expect("unplaced entries hold their payload in memory");
                (build_local_file_header(entry.header()), result.data.clone())
            };

            let file = match self.file.as_mut() {
                Some(file) => file,
                None => return Err(ArchiveError::ArchiveClosed),
            };

            file.seek(SeekFrom::Start(offset))
                .map_err(ArchiveError::FlushFailed)?;
            file.write_all(local_header.buffer())
                .map_err(ArchiveError::FlushFailed)?;
            file.write_all(&data).map_err(ArchiveError::FlushFailed)?;

            // only a fully written entry gets an offset; a failed write
            // leaves it unplaced for the retry
            self.entries[idx]
                .as_mut()
                .expect("placement checked the slot")
                .mark_placed(offset);
        }

        // directory last, past the last live byte
        let central_directory_offset = self.data_end;
        if central_directory_offset > u32::MAX as u64 {
            return Err(ArchiveError::ZipFormatLimit(
                "central directory offset does not fit a classic ZIP field".to_owned(),
            ));
        }

        let mut live: Vec<&StoredEntry> = self.entries.iter().flatten().collect();
        live.sort_by_key(|entry| entry.header().offset);

        let mut central_directory = ArchiveDescriptor::new(512);
        for entry in &live {
            build_central_directory_entry(&mut central_directory, entry.header());
        }

        let end = CentralDirectoryEnd {
            number_of_this_disk: 0,
            number_of_the_disk_with_central_directory: 0,
            total_number_of_entries_on_this_disk: live.len() as u16,
            total_number_of_entries_in_the_central_directory: live.len() as u16,
            central_directory_size: central_directory.len() as u64,
            offset_of_start_of_central_directory: central_directory_offset,
            archive_comment: self.archive_comment.clone(),
        };

        let mut end_of_central_directory = ArchiveDescriptor::new(64);
        build_end_of_central_directory(&mut end_of_central_directory, &end);

        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(ArchiveError::ArchiveClosed),
        };

        file.seek(SeekFrom::Start(central_directory_offset))
            .map_err(ArchiveError::FlushFailed)?;
        file.write_all(central_directory.buffer())
            .map_err(ArchiveError::FlushFailed)?;
        file.write_all(end_of_central_directory.buffer())
            .map_err(ArchiveError::FlushFailed)?;

        let file_end = central_directory_offset
            + central_directory.len() as u64
            + end_of_central_directory.len() as u64;
        file.set_len(file_end).map_err(ArchiveError::FlushFailed)?;

        self.state = ArchiveState::Clean;

        Ok(())
    }
}
