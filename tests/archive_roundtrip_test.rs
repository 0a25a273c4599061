use packflow::archive::ZipArchive;
use packflow::compression::CompressionMethod;

mod common;
use common::{create_new_clean_path, create_synchronous_archive, synchronous_options};

#[test]
fn surviving_entries_round_trip() {
    let path = create_new_clean_path("roundtrip_survivors.zip");

    let text = "some reasonably compressible text\n".repeat(64);
    let binary: Vec<u8> = (0u32..2048).map(|i| (i * 7 + 13) as u8).collect();

    let mut archive = create_synchronous_archive(&path);
    archive.add("file1.txt", &mut text.as_bytes()).unwrap();
    archive.add("data/blob.bin", &mut binary.as_slice()).unwrap();
    archive.add("empty.txt", &mut b"".as_ref()).unwrap();
    archive.add("doomed.txt", &mut b"temporary\n".as_ref()).unwrap();
    archive.delete("doomed.txt").unwrap();
    archive.close().unwrap();

    let mut reopened = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();

    let mut names = reopened.entry_names();
    names.sort();
    assert_eq!(names, vec!["data/blob.bin", "empty.txt", "file1.txt"]);

    assert_eq!(reopened.read("file1.txt").unwrap(), text.as_bytes());
    assert_eq!(reopened.read("data/blob.bin").unwrap(), binary);
    assert_eq!(reopened.read("empty.txt").unwrap(), b"");
    assert!(!reopened.contains("doomed.txt"));

    let entry = reopened.entry("file1.txt").unwrap();
    assert_eq!(entry.file_name(), "file1.txt");
    println!("{}", entry.header());
}

#[test]
fn reopened_archive_takes_more_edits() {
    let path = create_new_clean_path("roundtrip_incremental.zip");

    let mut archive = create_synchronous_archive(&path);
    archive.add("first.txt", &mut b"first session\n".as_ref()).unwrap();
    archive.add("second.txt", &mut b"also first session\n".as_ref()).unwrap();
    archive.close().unwrap();

    let mut archive = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();
    archive.delete("first.txt").unwrap();
    archive
        .add("third.txt", &mut b"second session\n".as_ref())
        .unwrap();
    archive.close().unwrap();

    let mut reopened = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();
    let mut names = reopened.entry_names();
    names.sort();
    assert_eq!(names, vec!["second.txt", "third.txt"]);
    assert_eq!(reopened.read("second.txt").unwrap(), b"also first session\n");
    assert_eq!(reopened.read("third.txt").unwrap(), b"second session\n");
}

#[test]
fn empty_archive_round_trips() {
    let path = create_new_clean_path("roundtrip_empty.zip");

    let mut archive = create_synchronous_archive(&path);
    archive.close().unwrap();

    let reopened = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();
    assert!(reopened.is_empty());
}

#[test]
fn archive_comment_round_trips() {
    let path = create_new_clean_path("roundtrip_comment.zip");

    let mut archive = create_synchronous_archive(&path);
    archive.add("file1.txt", &mut b"hello\n".as_ref()).unwrap();
    archive.set_archive_comment("built by packflow");
    archive.close().unwrap();

    let mut reopened = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();
    assert_eq!(reopened.read("file1.txt").unwrap(), b"hello\n");
}

#[test]
fn compression_methods_survive_the_trip() {
    let path = create_new_clean_path("roundtrip_methods.zip");

    let compressible = "again and again and again\n".repeat(128);
    // xorshift bytes deflate cannot shrink
    let mut state = 0x9E3779B97F4A7C15u64;
    let incompressible: Vec<u8> = (0..4096)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect();

    let mut archive = create_synchronous_archive(&path);
    archive
        .add("text.txt", &mut compressible.as_bytes())
        .unwrap();
    archive
        .add("noise.bin", &mut incompressible.as_slice())
        .unwrap();
    archive.close().unwrap();

    let mut reopened = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();

    let text_header = reopened.compression_info_with_wait("text.txt").unwrap();
    assert_eq!(text_header.compressor, CompressionMethod::Deflate());

    let noise_header = reopened.compression_info_with_wait("noise.bin").unwrap();
    assert_eq!(noise_header.compressor, CompressionMethod::Store());
    assert_eq!(noise_header.compressed_size, noise_header.uncompressed_size);

    assert_eq!(reopened.read("text.txt").unwrap(), compressible.as_bytes());
    assert_eq!(reopened.read("noise.bin").unwrap(), incompressible);
}

#[test]
fn garbage_does_not_open() {
    let path = create_new_clean_path("roundtrip_garbage.zip");
    std::fs::write(&path, vec![0xA5u8; 256]).unwrap();

    let result = ZipArchive::open_with_options(&path, synchronous_options());
    assert!(result.is_err());
}
