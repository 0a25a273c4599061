use std::fmt::{self, Debug, Display};

pub enum ArchiveError {
    IoError(std::io::Error),
    /// The archive bytes do not form a structurally valid ZIP file.
    BadArchiveStructure(String),
    /// An entry with the same normalized path already exists.
    DuplicateEntry(String),
    /// The entry path is empty or escapes the archive root.
    InvalidEntryName(String),
    /// No entry with that path.
    EntryNotFound(String),
    /// The archive was closed; no further operation is possible.
    ArchiveClosed,
    /// A compression job failed; surfaced to whoever waits on the result.
    CompressionJob(std::io::Error),
    /// Disk write failure while flushing. The in-memory state stays dirty
    /// so the flush can be retried.
    FlushFailed(std::io::Error),
    UnsupportedCompressionMethodCode(u16),
    /// A size, count or offset does not fit the classic ZIP field widths.
    ZipFormatLimit(String),
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchiveError::IoError(e) => {
                write!(f, "Archive error {:}", e)
            }
            ArchiveError::BadArchiveStructure(detail) => {
                write!(f, "Bad archive structure : {}", detail)
            }
            ArchiveError::DuplicateEntry(name) => {
                write!(f, "An entry named '{}' already exists", name)
            }
            ArchiveError::InvalidEntryName(name) => {
                write!(f, "Invalid entry name '{}'", name)
            }
            ArchiveError::EntryNotFound(name) => {
                write!(f, "No entry named '{}'", name)
            }
            ArchiveError::ArchiveClosed => {
                write!(f, "The archive is closed")
            }
            ArchiveError::CompressionJob(e) => {
                write!(f, "Compression job failed : {}", e)
            }
            ArchiveError::FlushFailed(e) => {
                write!(f, "Flush failed : {}", e)
            }
            ArchiveError::UnsupportedCompressionMethodCode(val) => {
                write!(f, "The compression method code '{:}' is not supported", val)
            }
            ArchiveError::ZipFormatLimit(detail) => {
                write!(f, "ZIP format limit exceeded : {}", detail)
            }
        }
    }
}

impl Debug for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchiveError::IoError(e) => {
                write!(f, "Archive error {:?}", e)
            }
            ArchiveError::CompressionJob(e) => {
                write!(f, "Compression job failed : {:?}", e)
            }
            ArchiveError::FlushFailed(e) => {
                write!(f, "Flush failed : {:?}", e)
            }
            _ => (self as &dyn Display).fmt(f),
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        ArchiveError::IoError(value)
    }
}
