//! HTTP tile server.
//!
//! Serves `GET /tiles/{z}/{x}/{y}` with a cache-first read path. A miss
//! either returns 204 (cache-only deployments) or falls back to a live
//! encode against the database, depending on the [`ServeMode`] injected at
//! construction. The mode is an explicit strategy value, never inferred
//! from ambient configuration.
//!
//! Malformed tile addresses are rejected at this boundary with a client
//! error; they never reach the encoder or the store.

use crate::coord::{TileCoord, MAX_ZOOM};
use crate::encoder::TileEncoder;
use crate::store::TileStore;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Content type for Mapbox vector tile payloads.
pub const TILE_CONTENT_TYPE: &str = "application/vnd.mapbox-vector-tile";

/// Serving strategy for cache misses.
///
/// The two-variant strategy keeps the one runtime decision point of the
/// subsystem in a single injected value instead of a conditional scattered
/// through request handling.
#[derive(Clone)]
pub enum ServeMode {
    /// Only pre-built tiles are returned; misses yield empty responses.
    CacheOnly,
    /// A miss triggers an on-demand encode against the source dataset.
    LiveFallback(Arc<dyn TileEncoder>),
}

impl std::fmt::Debug for ServeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeMode::CacheOnly => f.write_str("CacheOnly"),
            ServeMode::LiveFallback(_) => f.write_str("LiveFallback"),
        }
    }
}

#[derive(Clone)]
struct ServerState {
    store: TileStore,
    mode: ServeMode,
}

/// Build the tile router over a store and a serving strategy.
pub fn router(store: TileStore, mode: ServeMode) -> Router {
    Router::new()
        .route("/tiles/{z}/{x}/{y}", get(tile_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ServerState { store, mode })
}

/// Bind and serve the router until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Tile server listening");
    axum::serve(listener, router).await
}

async fn tile_handler(
    State(state): State<ServerState>,
    Path((z, x, y)): Path<(String, String, String)>,
) -> Response {
    // Requests are stateless and independent: one read-or-encode each.
    let tile = match parse_tile_address(&z, &x, &y) {
        Ok(tile) => tile,
        Err(reason) => {
            debug!(z = %z, x = %x, y = %y, reason = %reason, "Rejected tile address");
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    match state.store.read(&tile) {
        Ok(Some(payload)) => {
            debug!(tile = %tile, bytes = payload.len(), "Tile cache hit");
            tile_response(payload)
        }
        Ok(None) => match &state.mode {
            ServeMode::CacheOnly => {
                // Absence outside the built pyramid is benign, not an
                // error.
                debug!(tile = %tile, "Tile cache miss, cache-only mode");
                StatusCode::NO_CONTENT.into_response()
            }
            ServeMode::LiveFallback(encoder) => match encoder.encode(&tile).await {
                Ok(payload) => {
                    debug!(tile = %tile, bytes = payload.len(), "Tile encoded live");
                    tile_response(payload)
                }
                // The request path bounds latency: no retry here.
                Err(e) => {
                    error!(tile = %tile, error = %e, "Live tile encode failed");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
        },
        Err(e) => {
            error!(tile = %tile, error = %e, "Tile store read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn tile_response(payload: Vec<u8>) -> Response {
    (
        [(header::CONTENT_TYPE, TILE_CONTENT_TYPE)],
        Body::from(Bytes::from(payload)),
    )
        .into_response()
}

/// Parse and validate the three path components of a tile address.
///
/// All three must be well-formed non-negative integers, the zoom must be
/// supported, and `x`/`y` must lie inside the `2^zoom` grid.
fn parse_tile_address(z: &str, x: &str, y: &str) -> Result<TileCoord, String> {
    let zoom: u8 = z
        .parse()
        .map_err(|_| format!("invalid zoom component: {z:?}"))?;
    if zoom > MAX_ZOOM {
        return Err(format!("zoom {zoom} exceeds maximum {MAX_ZOOM}"));
    }

    let x: u32 = x
        .parse()
        .map_err(|_| format!("invalid x component: {x:?}"))?;
    let y: u32 = y
        .parse()
        .map_err(|_| format!("invalid y component: {y:?}"))?;

    let grid = 1u64 << zoom;
    if u64::from(x) >= grid || u64::from(y) >= grid {
        return Err(format!("tile {zoom}/{x}/{y} is outside the zoom {zoom} grid"));
    }

    Ok(TileCoord { zoom, x, y })
}
