use packflow::archive::{ArchiveOptions, ZipArchive};

mod common;
use common::{create_new_clean_path, synchronous_options};

fn pooled_options() -> ArchiveOptions {
    ArchiveOptions::default().worker_threads(4)
}

fn payload(i: usize) -> Vec<u8> {
    format!("entry number {} says {}\n", i, "something ".repeat(i + 1))
        .into_bytes()
        .repeat(8)
}

#[test]
fn parallel_adds_land_on_distinct_ranges() {
    let path = create_new_clean_path("concurrency_distinct.zip");

    let count = 16;

    let mut archive = ZipArchive::create_with_options(&path, pooled_options()).unwrap();
    for i in 0..count {
        let name = format!("file{}.txt", i);
        archive.add(&name, &mut payload(i).as_slice()).unwrap();
    }
    archive.update().unwrap();

    // every entry occupies its own, non-overlapping span
    let mut spans: Vec<(u64, u64)> = (0..count)
        .map(|i| {
            let name = format!("file{}.txt", i);
            let header = archive.compression_info_with_wait(&name).unwrap();
            let record = header.local_size() + header.compressed_size;
            (header.offset, header.offset + record)
        })
        .collect();

    spans.sort_unstable();

    for window in spans.windows(2) {
        let (a_start, a_end) = window[0];
        let (b_start, _) = window[1];
        assert_ne!(a_start, b_start, "two entries share an offset");
        assert!(
            a_end <= b_start,
            "entry spans overlap: [{}, {}) and [{}, ..)",
            a_start,
            a_end,
            b_start
        );
    }

    archive.close().unwrap();

    let mut reopened = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();
    for i in 0..count {
        let name = format!("file{}.txt", i);
        assert_eq!(reopened.read(&name).unwrap(), payload(i));
    }
}

#[test]
fn close_waits_for_inflight_compression() {
    let path = create_new_clean_path("concurrency_close.zip");

    let big = "wait for me ".repeat(100_000);

    let mut archive = ZipArchive::create_with_options(&path, pooled_options()).unwrap();
    archive.add("big.txt", &mut big.as_bytes()).unwrap();
    // close immediately: the pending job must complete, not be cancelled
    archive.close().unwrap();

    let mut reopened = ZipArchive::open_with_options(&path, synchronous_options()).unwrap();
    assert_eq!(reopened.read("big.txt").unwrap(), big.as_bytes());
}

#[test]
fn metadata_wait_can_happen_before_update() {
    let path = create_new_clean_path("concurrency_wait.zip");

    let mut archive = ZipArchive::create_with_options(&path, pooled_options()).unwrap();
    let text = "blocking read ".repeat(5000);
    archive.add("file1.txt", &mut text.as_bytes()).unwrap();

    // resolves the future without any flush having happened
    let header = archive.compression_info_with_wait("file1.txt").unwrap();
    assert_eq!(header.uncompressed_size, text.len() as u64);
    assert!(header.compressed_size > 0);

    archive.close().unwrap();
}

#[test]
fn pooled_and_synchronous_agree_on_bytes() {
    let pooled_path = create_new_clean_path("concurrency_pooled.zip");
    let sync_path = create_new_clean_path("concurrency_sync.zip");

    let build = |path: &std::path::Path, options: ArchiveOptions| {
        let mut archive = ZipArchive::create_with_options(path, options).unwrap();
        for i in 0..8 {
            let name = format!("file{}.txt", i);
            archive.add(&name, &mut payload(i).as_slice()).unwrap();
        }
        archive.close().unwrap();
        std::fs::read(path).unwrap()
    };

    let pooled = build(&pooled_path, pooled_options());
    let synchronous = build(&sync_path, synchronous_options());

    assert_eq!(pooled, synchronous);
}
