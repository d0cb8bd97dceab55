//! Streaming connection to the chat gateway and the frame dispatcher that
//! keeps the cache in sync with it.

pub mod connection;
pub mod dispatcher;
pub mod frames;
pub mod ws;

pub use connection::{Connection, ConnectionState, GatewayConfig, ReconnectPolicy};
pub use dispatcher::{Dispatcher, Handled};
pub use frames::ClientFrame;

use crate::cache::CacheError;
use crate::http::HttpError;

/// A frame the dispatcher could not apply. The connection logs these and
/// carries on with the next frame.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("frame has no type discriminant")]
    MissingType,
    #[error("malformed {kind} frame: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("follow-up request failed: {0}")]
    Http(#[from] HttpError),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to connect: {0:#}")]
    Connect(anyhow::Error),
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("not connected")]
    NotConnected,
    #[error("gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),
}
