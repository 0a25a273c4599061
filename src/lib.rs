//! A library for building and incrementally updating ZIP archives in
//! place. Instead of streaming a whole archive out in one pass, a
//! [`ZipArchive`](archive::ZipArchive) keeps a live map of its entries over
//! a seekable backing file: entries can be added and deleted across many
//! sessions, deleted space is reused, and only [`update`] or [`close`]
//! rewrites the central directory.
//!
//! ZIP is an archive file format that supports lossless data compression.
//! The implementation follows
//! [PKWARE's APPNOTE.TXT v6.3.10](https://pkware.cachefly.net/webdocs/casestudies/APPNOTE.TXT)
//! and the produced files open with any standard unzip tool.
//!
//! Compression runs on a worker pool: `add` hands the payload to the pool
//! and returns, and the archive only blocks when something needs the
//! finalized sizes (a flush, or an explicit
//! [`compression_info_with_wait`]). The default strategy deflates at two
//! quality levels concurrently, keeps the smaller output and falls back to
//! STORE whenever deflate does not actually shrink the payload.
//!
//! ## Example
//!
//!```no_run
//! use packflow::archive::ZipArchive;
//! use packflow::error::ArchiveError;
//!
//! fn main() -> Result<(), ArchiveError> {
//!     let mut archive = ZipArchive::create("archive.zip")?;
//!
//!     archive.add("file1.txt", &mut b"hello\n".as_ref())?;
//!     archive.add("file2.txt", &mut b"world\n".as_ref())?;
//!     archive.update()?;
//!
//!     // later sessions pick the file back up
//!     let mut archive = ZipArchive::open("archive.zip")?;
//!     archive.delete("file1.txt")?;
//!     archive.add("file3.txt", &mut b"again\n".as_ref())?;
//!     archive.close()?;
//!
//!     Ok(())
//! }
//!```
//!
//! Archives are deterministic: a fixed add order and entry set produces
//! byte-identical output (entry timestamps default to the DOS epoch for
//! that reason).
//!
//! [`update`]: archive::ZipArchive::update
//! [`close`]: archive::ZipArchive::close
//! [`compression_info_with_wait`]: archive::ZipArchive::compression_info_with_wait

mod constants;

pub mod archive;
pub mod compression;
pub mod compressor;
pub mod descriptor;
pub mod directory;
pub mod entry;
pub mod error;
pub mod executor;
pub mod ranges;
pub mod tools;
pub mod types;
