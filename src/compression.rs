use std::fmt::Display;
use std::io::Error as IoError;
use std::io::{Read, Write};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

pub const STORE: u16 = 0;
pub const DEFLATE: u16 = 8;

/// A ZIP compression method. The engine only produces [`Store`] and
/// [`Deflate`] entries; anything else read from a foreign archive is kept
/// as [`Unknown`] and rejected when its content is requested.
///
/// [`Store`]: CompressionMethod::Store
/// [`Deflate`]: CompressionMethod::Deflate
/// [`Unknown`]: CompressionMethod::Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store(),
    Deflate(),
    Unknown(u16),
}

impl CompressionMethod {
    pub fn zip_code(&self) -> u16 {
        match self {
            CompressionMethod::Store() => STORE,
            CompressionMethod::Deflate() => DEFLATE,
            CompressionMethod::Unknown(compression_method) => *compression_method,
        }
    }

    pub fn from_compression_method(compression_method: u16) -> CompressionMethod {
        match compression_method {
            STORE => CompressionMethod::Store(),
            DEFLATE => CompressionMethod::Deflate(),
            _ => CompressionMethod::Unknown(compression_method),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CompressionMethod::Store() => "store",
            CompressionMethod::Deflate() => "deflate",
            CompressionMethod::Unknown(_) => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, CompressionMethod::Unknown(_))
    }
}

impl Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Deflate quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Fastest,
    Default,
    Best,
    Precise(u32),
}

impl From<Level> for Compression {
    fn from(level: Level) -> Self {
        match level {
            Level::Fastest => Compression::fast(),
            Level::Best => Compression::best(),
            Level::Default => Compression::default(),
            Level::Precise(val) => Compression::new(val),
        }
    }
}

/// The finalized outcome of one entry's compression: the method that won,
/// the CRC of the raw payload and the bytes that will land in the file.
///
/// STORE results alias the source buffer, so falling back to store after a
/// losing deflate attempt costs no copy.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub method: CompressionMethod,
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub data: Arc<Vec<u8>>,
}

impl CompressionResult {
    pub fn compressed_size(&self) -> u64 {
        self.data.len() as u64
    }
}

pub(crate) fn deflate_bytes(input: &[u8], level: Level) -> Result<Vec<u8>, IoError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), level.into());
    encoder.write_all(input)?;
    encoder.finish()
}

pub(crate) fn inflate_bytes(input: &[u8]) -> Result<Vec<u8>, IoError> {
    let mut decoder = DeflateDecoder::new(input);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(raw)
}
