//! Serialization of the three ZIP record kinds the engine deals in: local
//! file headers, central directory entries and the end-of-central-directory
//! record. Writing goes through [`ArchiveDescriptor`]; parsing through
//! [`ArchiveDescriptorReader`] and fails with
//! [`ArchiveError::BadArchiveStructure`] on any structural inconsistency.
//!
//! Field widths and order follow PKWARE's APPNOTE.TXT, all little-endian.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::compression::CompressionMethod;
use crate::constants::{
    CENTRAL_DIRECTORY_END_SIGNATURE, CENTRAL_DIRECTORY_ENTRY_SIGNATURE,
    END_OF_CENTRAL_DIRECTORY_SIZE, FILE_HEADER_BASE_SIZE, LOCAL_FILE_HEADER_SIGNATURE,
};
use crate::descriptor::{ArchiveDescriptor, ArchiveDescriptorReader};
use crate::error::ArchiveError;
use crate::types::CentralDirectoryHeader;

/// End-of-central-directory record, minus the signature.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEnd {
    pub number_of_this_disk: u16,
    pub number_of_the_disk_with_central_directory: u16,
    pub total_number_of_entries_on_this_disk: u16,
    pub total_number_of_entries_in_the_central_directory: u16,
    pub central_directory_size: u64,
    pub offset_of_start_of_central_directory: u64,
    pub archive_comment: Option<Vec<u8>>,
}

impl CentralDirectoryEnd {
    pub fn zip_file_comment_length(&self) -> u16 {
        match &self.archive_comment {
            Some(comment) => comment.len() as u16,
            None => 0,
        }
    }

    /// Set the raw bytes of the archive comment, truncated to 0xFFFF bytes.
    pub fn set_archive_comment(&mut self, comment: &str) {
        let bytes = comment.as_bytes();
        let len = std::cmp::min(bytes.len(), u16::MAX as usize);
        self.archive_comment = Some(bytes[0..len].to_owned());
    }
}

pub fn build_local_file_header(entry: &CentralDirectoryHeader) -> ArchiveDescriptor {
    let mut desc = ArchiveDescriptor::new(entry.local_size());

    desc.write_u32(LOCAL_FILE_HEADER_SIGNATURE);
    desc.write_u16(entry.version_needed);
    desc.write_u16(entry.general_purpose_flags);
    desc.write_u16(entry.compression_method);
    desc.write_u16(entry.last_mod_file_time);
    desc.write_u16(entry.last_mod_file_date);
    desc.write_u32(entry.crc32);
    desc.write_u32(entry.compressed_size as u32);
    desc.write_u32(entry.uncompressed_size as u32);
    desc.write_u16(entry.file_name_len());
    desc.write_u16(entry.extra_field_length());
    desc.write_bytes(&entry.file_name_as_bytes);
    desc.write_bytes(&entry.extra_field);

    desc
}

/// The fixed 30-byte prefix of a local file header. Enough to locate the
/// entry payload; the variable name/extra tail is skipped by length.
#[derive(Debug)]
pub struct LocalFileHeaderFixed {
    pub version_needed: u16,
    pub general_purpose_flags: u16,
    pub compression_method: u16,
    pub last_mod_file_time: u16,
    pub last_mod_file_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_len: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeaderFixed {
    pub fn parse(stream: &[u8]) -> Result<LocalFileHeaderFixed, ArchiveError> {
        let mut indexer = ArchiveDescriptorReader::new();

        let signature = indexer.read_u32(stream)?;
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(ArchiveError::BadArchiveStructure(format!(
                "local file header signature not found, got {:0X}",
                signature
            )));
        }

        Ok(LocalFileHeaderFixed {
            version_needed: indexer.read_u16(stream)?,
            general_purpose_flags: indexer.read_u16(stream)?,
            compression_method: indexer.read_u16(stream)?,
            last_mod_file_time: indexer.read_u16(stream)?,
            last_mod_file_date: indexer.read_u16(stream)?,
            crc32: indexer.read_u32(stream)?,
            compressed_size: indexer.read_u32(stream)?,
            uncompressed_size: indexer.read_u32(stream)?,
            file_name_len: indexer.read_u16(stream)?,
            extra_field_length: indexer.read_u16(stream)?,
        })
    }

    /// Total size of the local header including its variable tail.
    pub fn size(&self) -> u64 {
        FILE_HEADER_BASE_SIZE as u64 + self.file_name_len as u64 + self.extra_field_length as u64
    }
}

pub fn build_central_directory_entry(
    central_directory: &mut ArchiveDescriptor,
    entry: &CentralDirectoryHeader,
) {
    central_directory.write_u32(CENTRAL_DIRECTORY_ENTRY_SIGNATURE);
    central_directory.write_u16(entry.version_made_by);
    central_directory.write_u16(entry.version_needed);
    central_directory.write_u16(entry.general_purpose_flags);
    central_directory.write_u16(entry.compression_method);
    central_directory.write_u16(entry.last_mod_file_time);
    central_directory.write_u16(entry.last_mod_file_date);
    central_directory.write_u32(entry.crc32);
    central_directory.write_u32(entry.compressed_size as u32);
    central_directory.write_u32(entry.uncompressed_size as u32);
    central_directory.write_u16(entry.file_name_len());
    central_directory.write_u16(entry.extra_field_length());
    central_directory.write_u16(entry.file_comment_length());
    central_directory.write_u16(0); // disk number start
    central_directory.write_u16(entry.internal_file_attributes);
    central_directory.write_u32(entry.external_file_attributes);
    central_directory.write_u32(entry.offset as u32);
    central_directory.write_bytes(&entry.file_name_as_bytes);
    central_directory.write_bytes(&entry.extra_field);
    if let Some(comment) = &entry.file_comment {
        central_directory.write_bytes(comment);
    }
}

pub fn parse_central_directory_entry(
    indexer: &mut ArchiveDescriptorReader,
    stream: &[u8],
) -> Result<CentralDirectoryHeader, ArchiveError> {
    let signature = indexer.read_u32(stream)?;
    if signature != CENTRAL_DIRECTORY_ENTRY_SIGNATURE {
        return Err(ArchiveError::BadArchiveStructure(format!(
            "central directory signature not found, got {:0X}",
            signature
        )));
    }

    let version_made_by = indexer.read_u16(stream)?;
    let version_needed = indexer.read_u16(stream)?;
    let general_purpose_flags = indexer.read_u16(stream)?;
    let compression_method = indexer.read_u16(stream)?;
    let last_mod_file_time = indexer.read_u16(stream)?;
    let last_mod_file_date = indexer.read_u16(stream)?;
    let crc32 = indexer.read_u32(stream)?;
    let compressed_size = indexer.read_u32(stream)? as u64;
    let uncompressed_size = indexer.read_u32(stream)? as u64;
    let file_name_len = indexer.read_u16(stream)?;
    let extra_field_length = indexer.read_u16(stream)?;
    let file_comment_length = indexer.read_u16(stream)?;
    let disk_number_start = indexer.read_u16(stream)?;
    let internal_file_attributes = indexer.read_u16(stream)?;
    let external_file_attributes = indexer.read_u32(stream)?;
    let offset = indexer.read_u32(stream)? as u64;
    let file_name_as_bytes = indexer.read_bytes(stream, file_name_len as usize)?;
    let extra_field = indexer.read_bytes(stream, extra_field_length as usize)?;
    let file_comment = if file_comment_length != 0 {
        Some(indexer.read_bytes(stream, file_comment_length as usize)?)
    } else {
        None
    };

    if disk_number_start != 0 {
        return Err(ArchiveError::BadArchiveStructure(
            "multi-disk archives are not supported".to_owned(),
        ));
    }

    Ok(CentralDirectoryHeader {
        version_made_by,
        version_needed,
        general_purpose_flags,
        compression_method,
        last_mod_file_time,
        last_mod_file_date,
        crc32,
        compressed_size,
        uncompressed_size,
        file_name_as_bytes,
        extra_field,
        file_comment,
        internal_file_attributes,
        external_file_attributes,
        offset,
        compressor: CompressionMethod::from_compression_method(compression_method),
    })
}

pub fn build_end_of_central_directory(
    end_of_central_directory: &mut ArchiveDescriptor,
    end: &CentralDirectoryEnd,
) {
    end_of_central_directory.write_u32(CENTRAL_DIRECTORY_END_SIGNATURE);
    end_of_central_directory.write_u16(end.number_of_this_disk);
    end_of_central_directory.write_u16(end.number_of_the_disk_with_central_directory);
    end_of_central_directory.write_u16(end.total_number_of_entries_on_this_disk);
    end_of_central_directory.write_u16(end.total_number_of_entries_in_the_central_directory);
    end_of_central_directory.write_u32(end.central_directory_size as u32);
    end_of_central_directory.write_u32(end.offset_of_start_of_central_directory as u32);

    if let Some(comment) = &end.archive_comment {
        end_of_central_directory.write_u16(comment.len() as u16);
        end_of_central_directory.write_bytes(comment);
    } else {
        end_of_central_directory.write_u16(0);
    }
}

/// Parse the record found at the end-of-central-directory signature.
/// `stream` starts right after the signature and runs to end-of-file.
fn parse_end_of_central_directory(stream: &[u8]) -> Result<CentralDirectoryEnd, ArchiveError> {
    let mut indexer = ArchiveDescriptorReader::new();

    let number_of_this_disk = indexer.read_u16(stream)?;
    let number_of_the_disk_with_central_directory = indexer.read_u16(stream)?;
    let total_number_of_entries_on_this_disk = indexer.read_u16(stream)?;
    let total_number_of_entries_in_the_central_directory = indexer.read_u16(stream)?;
    let central_directory_size = indexer.read_u32(stream)? as u64;
    let offset_of_start_of_central_directory = indexer.read_u32(stream)? as u64;
    let comment_length = indexer.read_u16(stream)?;

    if number_of_this_disk != 0 || number_of_the_disk_with_central_directory != 0 {
        return Err(ArchiveError::BadArchiveStructure(
            "multi-disk archives are not supported".to_owned(),
        ));
    }

    if total_number_of_entries_on_this_disk != total_number_of_entries_in_the_central_directory {
        return Err(ArchiveError::BadArchiveStructure(
            "entry counts of the end of central directory disagree".to_owned(),
        ));
    }

    let remaining = stream.len() - indexer.get_index();
    if comment_length as usize != remaining {
        return Err(ArchiveError::BadArchiveStructure(format!(
            "archive comment length {:} does not match the {:} trailing bytes",
            comment_length, remaining
        )));
    }

    let archive_comment = if comment_length != 0 {
        Some(indexer.read_bytes(stream, comment_length as usize)?)
    } else {
        None
    };

    Ok(CentralDirectoryEnd {
        number_of_this_disk,
        number_of_the_disk_with_central_directory,
        total_number_of_entries_on_this_disk,
        total_number_of_entries_in_the_central_directory,
        central_directory_size,
        offset_of_start_of_central_directory,
        archive_comment,
    })
}

/// Scan backward from end-of-file for the end-of-central-directory
/// signature, tolerating a trailing archive comment of up to 0xFFFF bytes.
/// Returns the signature position and the parsed record.
pub fn find_end_of_central_directory<R: Read + Seek>(
    reader: &mut R,
) -> Result<(u64, CentralDirectoryEnd), ArchiveError> {
    let file_length = reader.seek(SeekFrom::End(0))?;

    let mut position: u64 = match file_length.checked_sub(END_OF_CENTRAL_DIRECTORY_SIZE as u64) {
        Some(p) => p,
        None => {
            return Err(ArchiveError::BadArchiveStructure(
                "Archive too small".to_owned(),
            ))
        }
    };

    let search_upper_bound =
        file_length.saturating_sub(END_OF_CENTRAL_DIRECTORY_SIZE as u64 + u16::MAX as u64);

    loop {
        if position < search_upper_bound {
            return Err(ArchiveError::BadArchiveStructure(
                "end of central directory signature not found".to_owned(),
            ));
        }

        reader.seek(SeekFrom::Start(position))?;

        let val = reader.read_u32::<LittleEndian>()?;
        if val == CENTRAL_DIRECTORY_END_SIGNATURE {
            break;
        }

        position = match position.checked_sub(1) {
            Some(p) => p,
            None => {
                return Err(ArchiveError::BadArchiveStructure(
                    "end of central directory signature not found".to_owned(),
                ));
            }
        };
    }

    let central_end_size = (file_length - position - 4) as usize;
    let mut central_end_buffer: Vec<u8> = vec![0; central_end_size];

    reader.seek(SeekFrom::Start(position + 4))?;
    reader.read_exact(&mut central_end_buffer)?;

    let central_directory_end = parse_end_of_central_directory(&central_end_buffer)?;

    Ok((position, central_directory_end))
}

/// Read and validate the whole central directory of an existing archive.
pub fn parse_central_directory<R: Read + Seek>(
    reader: &mut R,
) -> Result<(CentralDirectoryEnd, Vec<CentralDirectoryHeader>), ArchiveError> {
    let (end_position, central_directory_end) = find_end_of_central_directory(reader)?;

    let cd_offset = central_directory_end.offset_of_start_of_central_directory;
    let cd_size = central_directory_end.central_directory_size;

    if cd_offset + cd_size > end_position {
        return Err(ArchiveError::BadArchiveStructure(
            "central directory overlaps its end record".to_owned(),
        ));
    }

    reader.seek(SeekFrom::Start(cd_offset))?;

    let mut central_directory_buffer: Vec<u8> = vec![0; cd_size as usize];
    reader.read_exact(&mut central_directory_buffer).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ArchiveError::BadArchiveStructure("central directory is truncated".to_owned())
        } else {
            ArchiveError::IoError(e)
        }
    })?;

    let mut indexer = ArchiveDescriptorReader::new();
    let mut entries: Vec<CentralDirectoryHeader> = Vec::new();

    for _ in 0..central_directory_end.total_number_of_entries_in_the_central_directory {
        let entry = parse_central_directory_entry(&mut indexer, &central_directory_buffer)?;
        entries.push(entry);
    }

    if indexer.get_index() != cd_size as usize {
        return Err(ArchiveError::BadArchiveStructure(format!(
            "central directory size mismatch, {:} bytes declared but {:} consumed",
            cd_size,
            indexer.get_index()
        )));
    }

    Ok((central_directory_end, entries))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::CompressionMethod;
    use crate::types::FileDateTime;
    use std::io::Cursor;

    fn sample_header(name: &str, offset: u64) -> CentralDirectoryHeader {
        let mut header = CentralDirectoryHeader::new(name, &FileDateTime::Zero);
        header.set_compressor(CompressionMethod::Deflate());
        header.crc32 = 0xC0FFEE42;
        header.compressed_size = 120;
        header.uncompressed_size = 300;
        header.offset = offset;
        header
    }

    #[test]
    fn central_entry_round_trip() {
        let mut header = sample_header("dir/file1.txt", 77);
        header.extra_field = vec![0x55, 0x54, 0x01, 0x00, 0xAA];
        header.file_comment = Some(b"a comment".to_vec());

        let mut desc = ArchiveDescriptor::new(100);
        build_central_directory_entry(&mut desc, &header);

        let stream = desc.finish();
        let mut indexer = ArchiveDescriptorReader::new();
        let parsed = parse_central_directory_entry(&mut indexer, &stream).unwrap();

        assert_eq!(parsed, header);
        assert_eq!(indexer.get_index(), stream.len());
    }

    #[test]
    fn local_header_round_trip() {
        let header = sample_header("file1.txt", 0);

        let desc = build_local_file_header(&header);
        let parsed = LocalFileHeaderFixed::parse(desc.buffer()).unwrap();

        assert_eq!(parsed.compression_method, 8);
        assert_eq!(parsed.crc32, 0xC0FFEE42);
        assert_eq!(parsed.compressed_size, 120);
        assert_eq!(parsed.uncompressed_size, 300);
        assert_eq!(parsed.size(), desc.len() as u64);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut desc = ArchiveDescriptor::new(100);
        build_central_directory_entry(&mut desc, &sample_header("x", 0));

        let mut stream = desc.finish();
        stream[0] = 0x51;

        let mut indexer = ArchiveDescriptorReader::new();
        let result = parse_central_directory_entry(&mut indexer, &stream);

        assert!(matches!(
            result,
            Err(ArchiveError::BadArchiveStructure(_))
        ));
    }

    fn minimal_archive_bytes(comment: Option<&str>) -> Vec<u8> {
        let mut end = CentralDirectoryEnd::default();
        if let Some(comment) = comment {
            end.set_archive_comment(comment);
        }

        let mut desc = ArchiveDescriptor::new(64);
        build_end_of_central_directory(&mut desc, &end);
        desc.finish()
    }

    #[test]
    fn find_eocd_without_comment() {
        let bytes = minimal_archive_bytes(None);
        let mut cursor = Cursor::new(bytes);

        let (position, end) = find_end_of_central_directory(&mut cursor).unwrap();
        assert_eq!(position, 0);
        assert_eq!(end.total_number_of_entries_in_the_central_directory, 0);
    }

    #[test]
    fn find_eocd_behind_comment() {
        let bytes = minimal_archive_bytes(Some("built by packflow"));
        let mut cursor = Cursor::new(bytes);

        let (position, end) = find_end_of_central_directory(&mut cursor).unwrap();
        assert_eq!(position, 0);
        assert_eq!(
            end.archive_comment.as_deref(),
            Some(b"built by packflow".as_ref())
        );
    }

    #[test]
    fn missing_eocd_is_rejected() {
        let bytes = vec![0u8; 64];
        let mut cursor = Cursor::new(bytes);

        let result = find_end_of_central_directory(&mut cursor);
        assert!(matches!(
            result,
            Err(ArchiveError::BadArchiveStructure(_))
        ));
    }

    #[test]
    fn directory_size_mismatch_is_rejected() {
        let mut cd = ArchiveDescriptor::new(256);
        build_central_directory_entry(&mut cd, &sample_header("file1.txt", 0));
        let cd_bytes = cd.finish();

        let mut end = CentralDirectoryEnd {
            total_number_of_entries_on_this_disk: 1,
            total_number_of_entries_in_the_central_directory: 1,
            // one byte short
            central_directory_size: cd_bytes.len() as u64 - 1,
            offset_of_start_of_central_directory: 0,
            ..Default::default()
        };
        end.archive_comment = None;

        let mut tail = ArchiveDescriptor::new(64);
        build_end_of_central_directory(&mut tail, &end);

        let mut bytes = cd_bytes;
        // the EOCD offset math needs the truncated directory actually gone
        bytes.pop();
        bytes.extend_from_slice(tail.buffer());

        let mut cursor = Cursor::new(bytes);
        let result = parse_central_directory(&mut cursor);

        assert!(matches!(
            result,
            Err(ArchiveError::BadArchiveStructure(_))
        ));
    }
}
