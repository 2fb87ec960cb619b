//! Tile encoding abstraction layer.
//!
//! This module provides the `TileEncoder` trait and the PostGIS-backed
//! implementation that produces Mapbox vector tile payloads.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        PyramidBuilder / TileServer                  │
//! │        (depend on Arc<dyn TileEncoder>)             │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                TileEncoder Trait                    │
//! │          encode(&TileCoord) -> Vec<u8>              │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 PostgisEncoder                      │
//! │   (ST_TileEnvelope / ST_AsMVTGeom / ST_AsMVT)       │
//! └─────────────────────────────────────────────────────┘
//! ```

mod postgis;

pub use postgis::{EncoderConfig, PostgisEncoder};

use crate::coord::TileCoord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while encoding a tile.
///
/// A query or connection failure is transient: the pyramid builder retries
/// it a bounded number of times, while the serve path surfaces it as a
/// server error without retrying. A tile with zero intersecting features
/// is *not* an error; it yields a valid empty-layer payload.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Query or connection failure from the database driver
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The encode query exceeded its time budget
    #[error("encode timed out after {timeout_secs}s for tile {tile}")]
    Timeout { tile: TileCoord, timeout_secs: u64 },
}

/// Trait for producing a vector tile payload for one tile address.
///
/// The payload contains every feature from the source dataset whose
/// geometry intersects the tile's Mercator envelope, clipped and expressed
/// in the tile's local integer coordinate space, with all non-geometry
/// columns carried through as feature attributes.
///
/// Implementors only read from the dataset; they never touch the tile
/// store.
#[async_trait]
pub trait TileEncoder: Send + Sync {
    /// Encodes a single tile.
    ///
    /// # Errors
    ///
    /// Returns an error for backend failures only; an empty tile is a
    /// valid, empty payload.
    async fn encode(&self, tile: &TileCoord) -> Result<Vec<u8>, EncoderError>;
}
