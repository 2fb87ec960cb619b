//! `build` command: bulk pyramid pre-computation.

use crate::error::CliError;
use clap::Args;
use parceltiles::coord::BoundingBox;
use parceltiles::encoder::{EncoderConfig, PostgisEncoder};
use parceltiles::pyramid::{BuildConfig, PyramidBuilder};
use parceltiles::store::TileStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// PostgreSQL connection string
    #[arg(long)]
    pub database_url: String,

    /// Source table or view holding the parcel geometry
    #[arg(long, default_value = "parcels")]
    pub table: String,

    /// Geometry column within the source table
    #[arg(long, default_value = "geom")]
    pub geometry_column: String,

    /// SRID of the source geometry column
    #[arg(long, default_value_t = 4326)]
    pub srid: i32,

    /// Layer name written into tiles (defaults to the table name)
    #[arg(long)]
    pub layer: Option<String>,

    /// Bounding box to cover: minLon,minLat,maxLon,maxLat
    #[arg(long, value_parser = parse_bbox)]
    pub bbox: BoundingBox,

    /// Coarsest zoom level to build, inclusive
    #[arg(long)]
    pub min_zoom: u8,

    /// Finest zoom level to build, inclusive
    #[arg(long)]
    pub max_zoom: u8,

    /// Output directory for the tile archive
    #[arg(long, default_value = "tiles")]
    pub output: PathBuf,

    /// Concurrent encode operations (also the database pool size)
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Per-tile encode timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Additional encode attempts after a transient failure
    #[arg(long, default_value_t = 2)]
    pub retries: u32,
}

/// Run a pyramid build to completion or Ctrl-C.
pub async fn run(args: BuildArgs) -> Result<(), CliError> {
    let pool = PostgisEncoder::connect(&args.database_url, args.concurrency as u32)
        .await
        .map_err(|e| CliError::Database(e.to_string()))?;

    let mut encoder_config = EncoderConfig::new(&args.table);
    encoder_config.geometry_column = args.geometry_column.clone();
    encoder_config.source_srid = args.srid;
    encoder_config.query_timeout = Duration::from_secs(args.timeout_secs);
    if let Some(layer) = &args.layer {
        encoder_config.layer_name = layer.clone();
    }

    let encoder = Arc::new(PostgisEncoder::new(pool, encoder_config));
    let store = TileStore::new(&args.output)?;

    let mut build_config = BuildConfig::new(args.bbox, args.min_zoom, args.max_zoom);
    build_config.concurrency = args.concurrency;
    build_config.retry_attempts = args.retries;

    info!(
        table = %args.table,
        output = %args.output.display(),
        "Starting build"
    );

    // Ctrl-C interrupts the build; the archive stays valid-if-incomplete.
    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after in-flight tiles");
                cancellation.cancel();
            }
        }
    });

    let builder = PyramidBuilder::new(encoder, store, build_config);
    let report = builder.run(cancellation).await?;

    if report.cancelled {
        warn!(
            written = report.written,
            "Build interrupted; archive is a valid partial pyramid"
        );
    }

    Ok(())
}

/// Parse a `minLon,minLat,maxLon,maxLat` bounding box argument.
fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!(
            "expected minLon,minLat,maxLon,maxLat (got {} components)",
            parts.len()
        ));
    }

    let mut values = [0.0f64; 4];
    for (i, part) in parts.iter().enumerate() {
        values[i] = part
            .parse()
            .map_err(|_| format!("invalid coordinate: {part:?}"))?;
    }

    BoundingBox::new(values[0], values[1], values[2], values[3]).map_err(|e| e.to_string())
}
