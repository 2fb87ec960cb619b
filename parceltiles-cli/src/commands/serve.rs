//! `serve` command: HTTP tile delivery.

use crate::error::CliError;
use clap::Args;
use parceltiles::encoder::{EncoderConfig, PostgisEncoder};
use parceltiles::server::{router, serve, ServeMode};
use parceltiles::store::TileStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Directory holding the pre-built tile archive
    #[arg(long, default_value = "tiles")]
    pub tiles: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Encode missing tiles on demand instead of returning no-content
    #[arg(long, default_value_t = false)]
    pub live_fallback: bool,

    /// PostgreSQL connection string (required with --live-fallback)
    #[arg(long, required_if_eq("live_fallback", "true"))]
    pub database_url: Option<String>,

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

    /// Database pool size for live fallback encoding
    #[arg(long, default_value_t = 4)]
    pub max_connections: u32,

    /// Per-request encode timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Run the tile server until the process is stopped.
pub async fn run(args: ServeArgs) -> Result<(), CliError> {
    let store = TileStore::new(&args.tiles)?;

    let mode = if args.live_fallback {
        let database_url = args
            .database_url
            .as_deref()
            .ok_or_else(|| CliError::InvalidArgs("--live-fallback requires --database-url".into()))?;

        let pool = PostgisEncoder::connect(database_url, args.max_connections)
            .await
            .map_err(|e| CliError::Database(e.to_string()))?;

        let mut encoder_config = EncoderConfig::new(&args.table);
        encoder_config.geometry_column = args.geometry_column.clone();
        encoder_config.source_srid = args.srid;
        encoder_config.query_timeout = Duration::from_secs(args.timeout_secs);
        if let Some(layer) = &args.layer {
            encoder_config.layer_name = layer.clone();
        }

        ServeMode::LiveFallback(Arc::new(PostgisEncoder::new(pool, encoder_config)))
    } else {
        ServeMode::CacheOnly
    };

    info!(
        tiles = %args.tiles.display(),
        mode = ?mode,
        "Starting tile server"
    );

    let app = router(store, mode);
    serve(args.listen, app).await.map_err(CliError::Serve)
}
