//! Parceltiles - Vector tile pipeline for the parcel explorer
//!
//! This library converts parcel geometry stored in PostGIS into Mapbox
//! vector tiles, pre-computes zoom pyramids into a filesystem archive, and
//! serves tiles over HTTP with a cache-first read path.
//!
//! # Architecture
//!
//! ```text
//! PyramidBuilder ──> TileEncoder ──> TileStore   (bulk build path)
//!
//! TileServer ──> TileStore ──> TileEncoder       (serve path, fallback
//!                                                 only in live mode)
//! ```
//!
//! # High-Level API
//!
//! ```ignore
//! use parceltiles::coord::BoundingBox;
//! use parceltiles::encoder::{EncoderConfig, PostgisEncoder};
//! use parceltiles::pyramid::{BuildConfig, PyramidBuilder};
//! use parceltiles::store::TileStore;
//!
//! let pool = PostgisEncoder::connect("postgres://localhost/parcels", 8).await?;
//! let encoder = PostgisEncoder::new(pool, EncoderConfig::new("parcels"));
//! let store = TileStore::new("tiles")?;
//!
//! let bbox = BoundingBox::new(-75.28, 39.86, -74.95, 40.14)?;
//! let builder = PyramidBuilder::new(encoder, store, BuildConfig::new(bbox, 10, 16));
//! let report = builder.run(cancellation_token).await?;
//! ```

pub mod coord;
pub mod encoder;
pub mod logging;
pub mod pyramid;
pub mod server;
pub mod store;

/// Version of the parceltiles library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
