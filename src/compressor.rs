//! Entry compression strategies. A strategy turns one entry's raw bytes
//! into a [`CompressionResult`], possibly racing several deflate attempts
//! on the worker pool and always subject to the store-is-best rule: a
//! "compressed" payload that is not smaller than the raw bytes is thrown
//! away in favour of STORE.

use std::sync::Arc;

use crate::compression::{deflate_bytes, CompressionMethod, CompressionResult, Level};
use crate::error::ArchiveError;
use crate::executor::{JobHandle, JobPool};

/// Keep a deflate result only when `compressed < ratio * uncompressed`.
/// At 1.0 a deflate output must be strictly smaller than the raw payload;
/// equality at the boundary falls back to STORE.
pub const DEFAULT_STORE_RATIO: f64 = 1.0;

/// How an entry's payload gets compressed.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionStrategy {
    /// Raw bytes, method STORE.
    Store,
    Deflate(Level),
    /// One concurrent deflate attempt per level; the smallest output wins
    /// and ties keep the earlier candidate. List the cheap level first.
    BestOf(Vec<Level>),
}

impl CompressionStrategy {
    fn candidate_levels(&self) -> &[Level] {
        match self {
            CompressionStrategy::Store => &[],
            CompressionStrategy::Deflate(level) => std::slice::from_ref(level),
            CompressionStrategy::BestOf(levels) => levels,
        }
    }

    /// Submit the compression attempts for one entry. The payload has
    /// already been drained from the caller's reader and hashed; this
    /// returns immediately, compression runs on the pool.
    pub(crate) fn submit(
        &self,
        pool: &JobPool,
        source: Arc<Vec<u8>>,
        crc32: u32,
        store_ratio: f64,
    ) -> PendingCompression {
        let attempts = self
            .candidate_levels()
            .iter()
            .map(|&level| {
                let input = source.clone();
                pool.submit(move || {
                    deflate_bytes(&input, level).map_err(ArchiveError::CompressionJob)
                })
            })
            .collect();

        PendingCompression {
            source,
            crc32,
            attempts,
            store_ratio,
        }
    }
}

impl Default for CompressionStrategy {
    /// Dual attempt: deflate at the default level and at best quality,
    /// keep whichever is smaller.
    fn default() -> Self {
        CompressionStrategy::BestOf(vec![Level::Default, Level::Best])
    }
}

/// The in-flight side of one entry's compression. Dropping it abandons the
/// results but never the jobs; the pool runs them to completion regardless.
pub(crate) struct PendingCompression {
    source: Arc<Vec<u8>>,
    crc32: u32,
    attempts: Vec<JobHandle<Result<Vec<u8>, ArchiveError>>>,
    store_ratio: f64,
}

impl PendingCompression {
    /// Block until every attempt finishes, then pick the winner. Worker
    /// failures surface here, to the waiting reader.
    pub(crate) fn wait_result(self) -> Result<CompressionResult, ArchiveError> {
        let mut winner: Option<Vec<u8>> = None;

        for handle in self.attempts {
            let candidate = handle.wait()?;
            match &winner {
                Some(best) if best.len() <= candidate.len() => {}
                _ => winner = Some(candidate),
            }
        }

        let uncompressed_size = self.source.len() as u64;

        match winner {
            Some(deflated) if beats_store(deflated.len(), self.source.len(), self.store_ratio) => {
                Ok(CompressionResult {
                    method: CompressionMethod::Deflate(),
                    crc32: self.crc32,
                    uncompressed_size,
                    data: Arc::new(deflated),
                })
            }
            _ => Ok(CompressionResult {
                method: CompressionMethod::Store(),
                crc32: self.crc32,
                uncompressed_size,
                data: self.source,
            }),
        }
    }
}

fn beats_store(compressed: usize, uncompressed: usize, ratio: f64) -> bool {
    (compressed as f64) < ratio * (uncompressed as f64)
}
