//! PostGIS-backed vector tile encoder.
//!
//! One query per tile: the database clips and re-projects every
//! intersecting feature into the tile's local coordinate space and
//! serializes the result with `ST_AsMVT`. The intersection test runs
//! against the source geometry column in its native SRID so the spatial
//! index is used.

use super::{EncoderError, TileEncoder};
use crate::coord::TileCoord;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::debug;

/// Standard vector-tile extent: a 4096-unit local grid per tile.
pub const DEFAULT_EXTENT: u16 = 4096;

/// Clip buffer around the tile edge, in extent units.
pub const DEFAULT_BUFFER: u16 = 64;

/// Configuration for the PostGIS encoder.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Source table or view holding the parcel geometry
    pub table: String,
    /// Geometry column within the source table
    pub geometry_column: String,
    /// SRID of the source geometry column
    pub source_srid: i32,
    /// Layer name written into the tile; defaults to the table name
    pub layer_name: String,
    /// Local coordinate grid size per tile
    pub extent: u16,
    /// Clip buffer around the tile edge, in extent units
    pub buffer: u16,
    /// Per-encode time budget
    pub query_timeout: Duration,
}

impl EncoderConfig {
    /// Create a config for the given source table with standard defaults.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            layer_name: table.clone(),
            table,
            geometry_column: "geom".to_string(),
            source_srid: 4326,
            extent: DEFAULT_EXTENT,
            buffer: DEFAULT_BUFFER,
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Vector tile encoder backed by a PostGIS connection pool.
///
/// The pool's max-connections setting is the binding resource constraint
/// for bulk builds; size the builder's concurrency to match it.
pub struct PostgisEncoder {
    pool: PgPool,
    config: EncoderConfig,
    query: String,
}

impl PostgisEncoder {
    /// Create an encoder over an existing pool.
    pub fn new(pool: PgPool, config: EncoderConfig) -> Self {
        let query = build_tile_query(&config);
        Self {
            pool,
            config,
            query,
        }
    }

    /// Connect a new pool with the given connection limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
    }

    /// The encoder configuration.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

#[async_trait]
impl TileEncoder for PostgisEncoder {
    async fn encode(&self, tile: &TileCoord) -> Result<Vec<u8>, EncoderError> {
        let query = sqlx::query_scalar::<_, Option<Vec<u8>>>(&self.query)
            .bind(i32::from(tile.zoom))
            .bind(tile.x as i32)
            .bind(tile.y as i32)
            .fetch_one(&self.pool);

        let payload = match tokio::time::timeout(self.config.query_timeout, query).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EncoderError::Timeout {
                    tile: *tile,
                    timeout_secs: self.config.query_timeout.as_secs(),
                })
            }
        };

        // ST_AsMVT aggregates to NULL over zero rows; a tile with no
        // intersecting features is a valid empty payload, not an error.
        let payload = payload.unwrap_or_default();

        debug!(
            tile = %tile,
            bytes = payload.len(),
            layer = %self.config.layer_name,
            "Encoded tile"
        );

        Ok(payload)
    }
}

/// Build the per-tile MVT query for a config.
///
/// `$1`/`$2`/`$3` bind zoom/x/y. The source geometry is transformed to
/// EPSG:3857 and clipped against `ST_TileEnvelope`; the intersection
/// filter transforms the envelope into the source SRID instead so the
/// index on the geometry column applies. The raw geometry column is a
/// non-encodable attribute type and is dropped by `ST_AsMVT`, so `t.*`
/// carries exactly the non-geometry columns through.
fn build_tile_query(config: &EncoderConfig) -> String {
    format!(
        "WITH mvtgeom AS ( \
           SELECT ST_AsMVTGeom( \
                    ST_Transform(t.{geom}, 3857), \
                    ST_TileEnvelope($1, $2, $3), \
                    {extent}, {buffer}, true \
                  ) AS mvt_geom, \
                  t.* \
           FROM {table} t \
           WHERE t.{geom} && ST_Transform(ST_TileEnvelope($1, $2, $3), {srid}) \
         ) \
         SELECT ST_AsMVT(mvtgeom.*, '{layer}', {extent}, 'mvt_geom') \
         FROM mvtgeom \
         WHERE mvt_geom IS NOT NULL",
        geom = config.geometry_column,
        table = config.table,
        srid = config.source_srid,
        layer = config.layer_name,
        extent = config.extent,
        buffer = config.buffer,
    )
}
