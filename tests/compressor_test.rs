use packflow::archive::{ArchiveOptions, ZipArchive};
use packflow::compression::{CompressionMethod, Level};
use packflow::compressor::CompressionStrategy;

mod common;
use common::{create_new_clean_path, synchronous_options};

/// Compress one payload with the given strategy and report the finalized
/// header fields.
fn compress_one(
    file_name: &str,
    payload: &[u8],
    options: ArchiveOptions,
) -> (CompressionMethod, u64, u64) {
    let path = create_new_clean_path(file_name);
    let mut archive = ZipArchive::create_with_options(&path, options).unwrap();
    archive.add("payload.bin", &mut &payload[..]).unwrap();

    let header = archive.compression_info_with_wait("payload.bin").unwrap();
    let summary = (
        header.compressor,
        header.compressed_size,
        header.uncompressed_size,
    );

    archive.close().unwrap();
    summary
}

#[test]
fn empty_payload_is_always_stored() {
    let (method, compressed, uncompressed) =
        compress_one("strategy_empty.zip", b"", synchronous_options());

    assert_eq!(method, CompressionMethod::Store());
    assert_eq!(compressed, 0);
    assert_eq!(uncompressed, 0);
}

#[test]
fn incompressible_payload_is_stored_at_input_size() {
    let mut state = 0x853C49E6748FEA9Bu64;
    let noise: Vec<u8> = (0..8192)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect();

    let (method, compressed, uncompressed) =
        compress_one("strategy_noise.zip", &noise, synchronous_options());

    assert_eq!(method, CompressionMethod::Store());
    assert_eq!(compressed, noise.len() as u64);
    assert_eq!(uncompressed, noise.len() as u64);
}

#[test]
fn twelve_zero_bytes_prefer_deflate() {
    let (method, compressed, _) =
        compress_one("strategy_zeros.zip", &[0u8; 12], synchronous_options());

    assert_eq!(method, CompressionMethod::Deflate());
    assert!(compressed < 12);
}

#[test]
fn best_of_never_loses_to_its_own_candidates() {
    let text = "a mildly repetitive sentence with some variety 0123456789\n"
        .repeat(400)
        .into_bytes();

    let (_, default_size, _) = compress_one(
        "strategy_default_only.zip",
        &text,
        synchronous_options()
            .compression_strategy(CompressionStrategy::Deflate(Level::Default)),
    );
    let (_, best_size, _) = compress_one(
        "strategy_best_only.zip",
        &text,
        synchronous_options().compression_strategy(CompressionStrategy::Deflate(Level::Best)),
    );
    let (method, winner_size, _) = compress_one(
        "strategy_best_of.zip",
        &text,
        synchronous_options().compression_strategy(CompressionStrategy::BestOf(vec![
            Level::Default,
            Level::Best,
        ])),
    );

    assert_eq!(method, CompressionMethod::Deflate());
    assert!(winner_size <= default_size);
    assert!(winner_size <= best_size);
}

#[test]
fn strict_ratio_threshold_forces_store() {
    let text = "deflate would love this line\n".repeat(200).into_bytes();

    // sanity: the payload compresses under the default policy
    let (method, _, _) = compress_one("strategy_ratio_relaxed.zip", &text, synchronous_options());
    assert_eq!(method, CompressionMethod::Deflate());

    // a winner that cannot beat 1% of the input loses to STORE
    let (method, compressed, uncompressed) = compress_one(
        "strategy_ratio_strict.zip",
        &text,
        synchronous_options().store_ratio_threshold(0.01),
    );

    assert_eq!(method, CompressionMethod::Store());
    assert_eq!(compressed, uncompressed);
}

#[test]
fn store_strategy_skips_compression_entirely() {
    let text = "this would deflate nicely\n".repeat(100).into_bytes();

    let (method, compressed, uncompressed) = compress_one(
        "strategy_store.zip",
        &text,
        synchronous_options().compression_strategy(CompressionStrategy::Store),
    );

    assert_eq!(method, CompressionMethod::Store());
    assert_eq!(compressed, text.len() as u64);
    assert_eq!(uncompressed, text.len() as u64);
}
