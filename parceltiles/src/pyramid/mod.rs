//! Bulk pyramid builder.
//!
//! Pre-computes every tile covering a bounding box across a zoom span and
//! persists the results into the tile store. Tiles are independent, so
//! generation is fanned out to a semaphore-bounded set of tasks; the bound
//! should match the database pool's safe concurrent-query capacity, which
//! is the binding resource, not CPU.
//!
//! A transient per-tile failure is retried a bounded number of times and
//! then skipped: one bad tile must never abort a multi-hour build. An
//! external cancellation leaves the store valid-if-incomplete.

use crate::coord::{pyramid_coverage, BoundingBox, CoordError, TileCoord};
use crate::encoder::TileEncoder;
use crate::store::TileStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for a pyramid build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Area to cover
    pub bbox: BoundingBox,
    /// Coarsest zoom level, inclusive
    pub min_zoom: u8,
    /// Finest zoom level, inclusive
    pub max_zoom: u8,
    /// Maximum concurrent encode operations
    pub concurrency: usize,
    /// Additional encode attempts after the first failure
    pub retry_attempts: u32,
    /// Delay between encode attempts for one tile
    pub retry_backoff: Duration,
}

impl BuildConfig {
    /// Create a build config with standard concurrency and retry budget.
    pub fn new(bbox: BoundingBox, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            bbox,
            min_zoom,
            max_zoom,
            concurrency: 8,
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Errors that can abort a build before any tile work starts.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The bounding box or zoom span cannot be covered
    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// Summary of a finished (or interrupted) build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Tiles encoded and persisted
    pub written: u64,
    /// Subset of written tiles that carried no features
    pub empty: u64,
    /// Tiles skipped after exhausting the retry budget
    pub failed: u64,
    /// True when the build was interrupted before completing
    pub cancelled: bool,
    /// Wall-clock build duration
    pub elapsed: Duration,
}

enum TileOutcome {
    Written { empty: bool },
    Failed,
}

/// Orchestrates bulk tile pre-computation.
pub struct PyramidBuilder {
    encoder: Arc<dyn TileEncoder>,
    store: TileStore,
    config: BuildConfig,
}

impl PyramidBuilder {
    /// Create a builder over an encoder and a store.
    pub fn new(encoder: Arc<dyn TileEncoder>, store: TileStore, config: BuildConfig) -> Self {
        Self {
            encoder,
            store,
            config,
        }
    }

    /// Run the build to completion or cancellation.
    ///
    /// Zoom levels are processed low-to-high. Per-tile failures are logged
    /// and counted, never propagated.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configured zoom span cannot be
    /// covered; tile-level failures end up in the report instead.
    pub async fn run(&self, cancellation: CancellationToken) -> Result<BuildReport, BuildError> {
        let coverage = pyramid_coverage(&self.config.bbox, self.config.min_zoom, self.config.max_zoom)?;
        let total = coverage.total();

        info!(
            total_tiles = total,
            min_zoom = self.config.min_zoom,
            max_zoom = self.config.max_zoom,
            concurrency = self.config.concurrency,
            "Starting pyramid build"
        );

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let (result_tx, mut result_rx) = mpsc::channel::<(TileCoord, TileOutcome)>(32);

        // Iteration and result collection run concurrently: the result
        // channel is bounded and tasks block on send() when it fills, so
        // draining must not wait for submission to finish.
        let iteration_task = tokio::spawn({
            let semaphore = Arc::clone(&semaphore);
            let cancellation = cancellation.clone();
            let encoder = Arc::clone(&self.encoder);
            let store = self.store.clone();
            let retry_attempts = self.config.retry_attempts;
            let retry_backoff = self.config.retry_backoff;

            async move {
                let mut current_zoom = None;
                for tile in coverage {
                    if cancellation.is_cancelled() {
                        debug!("Build cancelled during tile iteration");
                        break;
                    }

                    if current_zoom != Some(tile.zoom) {
                        current_zoom = Some(tile.zoom);
                        info!(zoom = tile.zoom, "Building zoom level");
                    }

                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(p) => p,
                        Err(_) => break,
                    };

                    let result_tx = result_tx.clone();
                    let encoder = Arc::clone(&encoder);
                    let store = store.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let outcome =
                            build_tile(&*encoder, &store, &tile, retry_attempts, retry_backoff)
                                .await;
                        let _ = result_tx.send((tile, outcome)).await;
                    });
                }
            }
        });

        let mut report = BuildReport::default();
        let mut interrupted = false;

        loop {
            tokio::select! {
                result = result_rx.recv() => {
                    match result {
                        Some((_tile, TileOutcome::Written { empty })) => {
                            report.written += 1;
                            if empty {
                                report.empty += 1;
                            }
                        }
                        Some((_tile, TileOutcome::Failed)) => {
                            report.failed += 1;
                        }
                        None => break,
                    }
                }
                _ = cancellation.cancelled() => {
                    interrupted = true;
                    iteration_task.abort();
                    break;
                }
            }
        }

        if !interrupted {
            // The channel only closes once the iteration task and every
            // in-flight tile task have dropped their senders, so a None
            // recv means all results were collected.
            let _ = iteration_task.await;
        }

        report.cancelled = cancellation.is_cancelled() && report.written + report.failed < total;
        report.elapsed = start.elapsed();

        if report.cancelled {
            warn!(
                written = report.written,
                failed = report.failed,
                "Pyramid build cancelled"
            );
        } else {
            info!(
                written = report.written,
                empty = report.empty,
                failed = report.failed,
                elapsed_secs = report.elapsed.as_secs(),
                "Pyramid build complete"
            );
        }

        Ok(report)
    }
}

/// Encode one tile with a bounded retry budget, then persist it.
async fn build_tile(
    encoder: &dyn TileEncoder,
    store: &TileStore,
    tile: &TileCoord,
    retry_attempts: u32,
    retry_backoff: Duration,
) -> TileOutcome {
    let mut attempt = 0;
    let payload = loop {
        match encoder.encode(tile).await {
            Ok(payload) => break payload,
            Err(e) if attempt < retry_attempts => {
                attempt += 1;
                warn!(tile = %tile, attempt, error = %e, "Encode failed, retrying");
                tokio::time::sleep(retry_backoff).await;
            }
            Err(e) => {
                error!(tile = %tile, error = %e, "Encode failed, skipping tile");
                return TileOutcome::Failed;
            }
        }
    };

    let empty = payload.is_empty();
    match store.write(tile, &payload) {
        Ok(()) => TileOutcome::Written { empty },
        Err(e) => {
            error!(tile = %tile, error = %e, "Failed to persist tile");
            TileOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Encoder that derives payloads from the tile address and can be
    /// told to fail specific tiles.
    struct ScriptedEncoder {
        fail_always: HashSet<TileCoord>,
        fail_once: Mutex<HashSet<TileCoord>>,
        calls: AtomicU32,
    }

    impl ScriptedEncoder {
        fn new() -> Self {
            Self {
                fail_always: HashSet::new(),
                fail_once: Mutex::new(HashSet::new()),
                calls: AtomicU32::new(0),
            }
        }

        fn failing_always(mut self, tile: TileCoord) -> Self {
            self.fail_always.insert(tile);
            self
        }

        fn failing_once(self, tile: TileCoord) -> Self {
            self.fail_once.lock().unwrap().insert(tile);
            self
        }
    }

    #[async_trait]
    impl TileEncoder for ScriptedEncoder {
        async fn encode(&self, tile: &TileCoord) -> Result<Vec<u8>, EncoderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_always.contains(tile) || self.fail_once.lock().unwrap().remove(tile) {
                return Err(EncoderError::Timeout {
                    tile: *tile,
                    timeout_secs: 0,
                });
            }
            Ok(format!("tile:{}", tile).into_bytes())
        }
    }

    fn philly_bbox() -> BoundingBox {
        BoundingBox::new(-75.2, 39.9, -75.1, 40.0).unwrap()
    }

    fn fast_config(bbox: BoundingBox, min_zoom: u8, max_zoom: u8) -> BuildConfig {
        let mut config = BuildConfig::new(bbox, min_zoom, max_zoom);
        config.retry_backoff = Duration::from_millis(1);
        config
    }

    #[tokio::test]
    async fn test_build_writes_every_covering_tile() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::new(temp.path()).unwrap();
        let config = fast_config(philly_bbox(), 12, 13);
        let expected = pyramid_coverage(&config.bbox, 12, 13).unwrap();

        let builder =
            PyramidBuilder::new(Arc::new(ScriptedEncoder::new()), store.clone(), config);
        let report = builder.run(CancellationToken::new()).await.unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(report.written, expected.total());
        for tile in expected {
            assert!(store.contains(&tile), "missing tile {}", tile);
        }
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::new(temp.path()).unwrap();
        let config = fast_config(philly_bbox(), 13, 14);

        let first = PyramidBuilder::new(
            Arc::new(ScriptedEncoder::new()),
            store.clone(),
            config.clone(),
        );
        first.run(CancellationToken::new()).await.unwrap();
        let snapshot: Vec<(TileCoord, Vec<u8>)> = pyramid_coverage(&config.bbox, 13, 14)
            .unwrap()
            .map(|t| (t, store.read(&t).unwrap().unwrap()))
            .collect();

        let second =
            PyramidBuilder::new(Arc::new(ScriptedEncoder::new()), store.clone(), config);
        second.run(CancellationToken::new()).await.unwrap();

        for (tile, bytes) in snapshot {
            assert_eq!(store.read(&tile).unwrap().unwrap(), bytes);
        }
    }

    #[tokio::test]
    async fn test_one_failing_tile_does_not_abort_the_build() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::new(temp.path()).unwrap();
        let config = fast_config(philly_bbox(), 13, 13);

        let coverage: Vec<TileCoord> =
            pyramid_coverage(&config.bbox, 13, 13).unwrap().collect();
        assert!(coverage.len() >= 2, "scenario needs at least two tiles");
        let doomed = coverage[0];

        let encoder = ScriptedEncoder::new().failing_always(doomed);
        let builder = PyramidBuilder::new(Arc::new(encoder), store.clone(), config);
        let report = builder.run(CancellationToken::new()).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.written as usize, coverage.len() - 1);
        assert!(!store.contains(&doomed));
        for tile in coverage.iter().skip(1) {
            assert!(store.contains(tile), "missing tile {}", tile);
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::new(temp.path()).unwrap();
        let config = fast_config(philly_bbox(), 13, 13);

        let flaky = pyramid_coverage(&config.bbox, 13, 13)
            .unwrap()
            .next()
            .unwrap();
        let encoder = ScriptedEncoder::new().failing_once(flaky);

        let builder = PyramidBuilder::new(Arc::new(encoder), store.clone(), config);
        let report = builder.run(CancellationToken::new()).await.unwrap();

        assert_eq!(report.failed, 0);
        assert!(store.contains(&flaky));
    }

    #[tokio::test]
    async fn test_empty_payloads_are_written_and_counted() {
        struct EmptyEncoder;

        #[async_trait]
        impl TileEncoder for EmptyEncoder {
            async fn encode(&self, _tile: &TileCoord) -> Result<Vec<u8>, EncoderError> {
                Ok(Vec::new())
            }
        }

        let temp = TempDir::new().unwrap();
        let store = TileStore::new(temp.path()).unwrap();
        let config = fast_config(philly_bbox(), 13, 13);

        let builder = PyramidBuilder::new(Arc::new(EmptyEncoder), store.clone(), config);
        let report = builder.run(CancellationToken::new()).await.unwrap();

        assert_eq!(report.empty, report.written);
        assert!(report.written > 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_build_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::new(temp.path()).unwrap();
        let config = fast_config(philly_bbox(), 13, 13);

        let token = CancellationToken::new();
        token.cancel();

        let builder = PyramidBuilder::new(Arc::new(ScriptedEncoder::new()), store, config);
        let report = builder.run(token).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.written, 0);
    }

    #[tokio::test]
    async fn test_invalid_zoom_span_is_a_build_error() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::new(temp.path()).unwrap();
        let config = fast_config(philly_bbox(), 14, 10);

        let builder = PyramidBuilder::new(Arc::new(ScriptedEncoder::new()), store, config);
        let result = builder.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(BuildError::Coord(_))));
    }
}
