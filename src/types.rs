use core::fmt;

use crate::compression::CompressionMethod;
use crate::constants::{
    CENTRAL_DIRECTORY_ENTRY_BASE_SIZE, EXTENDED_LOCAL_HEADER_FLAG, FILE_HEADER_BASE_SIZE,
    UTF8_NAME_FLAG, VERSION_MADE_BY, VERSION_NEEDED_TO_EXTRACT,
};
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};

/// The serializable metadata record for one archive member. Field for
/// field this is what the central directory stores on disk; the local file
/// header echoes a prefix of it.
///
/// Sizes and CRC are only meaningful once the entry's compression has
/// resolved; until then they hold zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub general_purpose_flags: u16,
    pub compression_method: u16,
    pub last_mod_file_time: u16,
    pub last_mod_file_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_as_bytes: Vec<u8>,
    pub extra_field: Vec<u8>,
    pub file_comment: Option<Vec<u8>>,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    /// Offset of the local file header from the start of the archive.
    pub offset: u64,
    pub compressor: CompressionMethod,
}

impl CentralDirectoryHeader {
    pub fn new(file_name: &str, date_time: &FileDateTime) -> CentralDirectoryHeader {
        let (date, time) = date_time.ms_dos();

        CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_NEEDED_TO_EXTRACT,
            general_purpose_flags: UTF8_NAME_FLAG,
            compression_method: CompressionMethod::Store().zip_code(),
            last_mod_file_time: time,
            last_mod_file_date: date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name_as_bytes: file_name.as_bytes().to_owned(),
            extra_field: Vec::new(),
            file_comment: None,
            internal_file_attributes: 0,
            external_file_attributes: 0,
            offset: 0,
            compressor: CompressionMethod::Store(),
        }
    }

    pub fn file_name(&self) -> String {
        String::from_utf8_lossy(&self.file_name_as_bytes).to_string()
    }

    pub fn file_name_len(&self) -> u16 {
        self.file_name_as_bytes.len() as u16
    }

    pub fn extra_field_length(&self) -> u16 {
        self.extra_field.len() as u16
    }

    pub fn file_comment_length(&self) -> u16 {
        match &self.file_comment {
            Some(comment) => comment.len() as u16,
            None => 0,
        }
    }

    pub fn set_compressor(&mut self, compressor: CompressionMethod) {
        self.compressor = compressor;
        self.compression_method = compressor.zip_code();
    }

    /// Streaming writers follow the payload with a data descriptor whose
    /// size the central record does not state.
    pub fn has_data_descriptor(&self) -> bool {
        self.general_purpose_flags & EXTENDED_LOCAL_HEADER_FLAG != 0
    }

    /// Size of this record in the central directory.
    pub fn central_size(&self) -> u64 {
        CENTRAL_DIRECTORY_ENTRY_BASE_SIZE as u64
            + self.file_name_as_bytes.len() as u64
            + self.extra_field.len() as u64
            + self.file_comment_length() as u64
    }

    /// Size of the matching local file header.
    pub fn local_size(&self) -> u64 {
        FILE_HEADER_BASE_SIZE as u64
            + self.file_name_as_bytes.len() as u64
            + self.extra_field.len() as u64
    }

    fn pretty_version(zip_version: u16) -> (u16, u16) {
        let major = zip_version / 10;
        let minor = zip_version % 10;

        (major, minor)
    }
}

impl fmt::Display for CentralDirectoryHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let padding = 48;

        writeln!(f, "{: <padding$}{}", "entry name:", self.file_name())?;

        writeln!(
            f,
            "{: <padding$}{}",
            "offset of local header from start of archive:", self.offset
        )?;

        let (major, minor) = CentralDirectoryHeader::pretty_version(self.version_needed);
        writeln!(
            f,
            "{: <padding$}{}.{}",
            "minimum software version required to extract:", major, minor
        )?;

        writeln!(
            f,
            "{: <padding$}{:#016b}",
            "general purpose bit flag:", self.general_purpose_flags
        )?;

        writeln!(
            f,
            "{: <padding$}{}",
            "compression method:",
            self.compressor.label()
        )?;

        let date_time = DateTimeCS::from_msdos(self.last_mod_file_date, self.last_mod_file_time);
        writeln!(
            f,
            "{: <padding$}{}",
            "file last modified on (DOS date/time):", date_time
        )?;

        writeln!(
            f,
            "{: <padding$}{:x}",
            "32-bit CRC value (hex):", self.crc32
        )?;

        writeln!(
            f,
            "{: <padding$}{} bytes",
            "compressed size:", self.compressed_size
        )?;
        writeln!(
            f,
            "{: <padding$}{:} bytes",
            "uncompressed size:", self.uncompressed_size
        )
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DateTimeCS {
    year: u16,
    month: u16,
    day: u16,
    hour: u16,
    minute: u16,
    second: u16,
}

impl Default for DateTimeCS {
    fn default() -> Self {
        Self {
            year: 1980,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTimeCS {
    pub fn from_chrono_datetime<Tz: TimeZone>(datetime: DateTime<Tz>) -> Self {
        Self {
            year: datetime.year() as u16,
            month: datetime.month() as u16,
            day: datetime.day() as u16,
            hour: datetime.hour() as u16,
            minute: datetime.minute() as u16,
            second: datetime.second() as u16,
        }
    }

    pub fn now() -> Self {
        Self::from_chrono_datetime(Local::now())
    }

    pub fn from_msdos(datepart: u16, timepart: u16) -> Self {
        let seconds = (timepart & 0b0000000000011111) << 1;
        let minutes = (timepart & 0b0000011111100000) >> 5;
        let hours = (timepart & 0b1111100000000000) >> 11;
        let days = datepart & 0b0000000000011111;
        let months = (datepart & 0b0000000111100000) >> 5;
        let years = (datepart & 0b1111111000000000) >> 9;

        Self {
            year: years + 1980,
            month: months,
            day: days,
            hour: hours,
            minute: minutes,
            second: seconds,
        }
    }

    pub fn to_time(&self) -> chrono::NaiveDateTime {
        let date = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)
            .unwrap_or_else(|| {
                let zero = DateTimeCS::default();
                NaiveDate::from_ymd_opt(zero.year as i32, zero.month as u32, zero.day as u32)
                    .unwrap()
            });

        date.and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            .unwrap_or_default()
    }

    pub fn ms_dos(&self) -> (u16, u16) {
        let date = self.day | (self.month << 5) | self.year.saturating_sub(1980) << 9;
        let time = (self.second / 2) | (self.minute << 5) | self.hour << 11;
        (date, time)
    }
}

impl fmt::Display for DateTimeCS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date_time = self.to_time();
        write!(f, "{:}", date_time)
    }
}

/// The (timezone-less) date and time written in the archive alongside each
/// file.
///
/// [`FileDateTime::Zero`] is the DOS epoch (1980, January 1st, 12AM) and the
/// default: the archive bytes then depend only on the entry set, which is
/// what reproducible-build callers want. Use [`FileDateTime::Now`] or
/// [`FileDateTime::Custom`] when wall-clock stamps matter more.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FileDateTime {
    /// 1980, January 1st, 12AM.
    Zero,
    Custom(DateTimeCS),
    Now,
}

impl FileDateTime {
    fn tuple(&self) -> DateTimeCS {
        match self {
            FileDateTime::Zero => DateTimeCS::default(),
            FileDateTime::Custom(date_time) => *date_time,
            FileDateTime::Now => DateTimeCS::now(),
        }
    }

    pub fn ms_dos(&self) -> (u16, u16) {
        self.tuple().ms_dos()
    }

    pub fn to_time(&self) -> chrono::NaiveDateTime {
        self.tuple().to_time()
    }
}

impl Default for FileDateTime {
    fn default() -> Self {
        FileDateTime::Zero
    }
}
