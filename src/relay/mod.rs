//! Live quote relay.
//!
//! One relay session pairs a caller connection with one upstream ticker
//! stream and forwards upstream frames to the caller verbatim until either
//! side closes or fails. Both connections are always closed together.
//!
//! Connections are abstracted as a [`Duplex`] of frame sink and frame stream
//! so the session logic is independent of the WebSocket implementations on
//! either side.

mod registry;
mod session;
mod upstream;

pub use registry::{RelayRegistration, RelayRegistry, RelaySessionInfo};
pub use session::{CloseReason, RelayOutcome, RelayState};
pub use upstream::{TungsteniteConnector, UpstreamConnector};

use crate::models::UserId;
use futures::Sink;
use futures::stream::BoxStream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A single relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// UTF-8 payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Close notification.
    Close,
}

/// Relay errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The upstream stream could not be opened.
    #[error("failed to connect upstream: {0}")]
    Dial(String),

    /// Reading from the upstream failed.
    #[error("upstream read failed: {0}")]
    UpstreamRead(String),

    /// Writing to the upstream failed.
    #[error("upstream write failed: {0}")]
    UpstreamWrite(String),

    /// Reading from the caller failed.
    #[error("client read failed: {0}")]
    ClientRead(String),

    /// Writing to the caller failed.
    #[error("client write failed: {0}")]
    ClientWrite(String),
}

/// Incoming half of a connection.
pub type FrameStream = BoxStream<'static, Result<RelayFrame, RelayError>>;

/// Outgoing half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<RelayFrame, Error = RelayError> + Send>>;

/// Both halves of one connection.
pub struct Duplex {
    /// Frames written to the peer.
    pub sink: FrameSink,
    /// Frames read from the peer.
    pub stream: FrameStream,
}

impl Duplex {
    /// Pairs a sink and a stream.
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the upstream ticker stream, e.g. `wss://stream.binance.com:9443/ws`.
    pub stream_base_url: String,
    /// Upper bound for the upstream dial.
    pub connect_timeout: Duration,
}

/// Runs relay sessions and tracks the live ones.
pub struct QuoteRelay {
    registry: Arc<RelayRegistry>,
    connector: Arc<dyn UpstreamConnector>,
    config: RelayConfig,
}

impl QuoteRelay {
    /// Creates a relay over the given connector.
    #[must_use]
    pub fn new(
        registry: Arc<RelayRegistry>,
        connector: Arc<dyn UpstreamConnector>,
        config: RelayConfig,
    ) -> Self {
        Self {
            registry,
            connector,
            config,
        }
    }

    /// Registry of live sessions.
    #[must_use]
    pub fn registry(&self) -> &Arc<RelayRegistry> {
        &self.registry
    }

    /// Upstream ticker stream URL for a normalized symbol.
    #[must_use]
    pub fn stream_url(&self, symbol: &str) -> String {
        format!(
            "{}/{}@ticker",
            self.config.stream_base_url.trim_end_matches('/'),
            symbol.to_lowercase()
        )
    }

    /// Relays `symbol` ticks to `client` until either side ends.
    ///
    /// The caller connection is already upgraded. Returns once both
    /// connections are closed.
    pub async fn run(&self, symbol: String, user_id: Option<UserId>, client: Duplex) -> RelayOutcome {
        let registration = self.registry.register(symbol.clone(), user_id);
        let session_id = registration.session_id();
        let url = self.stream_url(&symbol);
        let mut lifecycle = session::Lifecycle::new();
        lifecycle.advance(RelayState::Upgrading);

        info!("Relay session {} opening upstream {}", session_id, url);

        let upstream = match tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(&url),
        )
        .await
        {
            Ok(Ok(upstream)) => upstream,
            Ok(Err(e)) => {
                warn!("Relay session {} dial failed: {}", session_id, e);
                session::reject(client).await;
                return RelayOutcome::dial_failed(session_id, lifecycle, e.to_string());
            }
            Err(_) => {
                warn!(
                    "Relay session {} dial timed out after {:?}",
                    session_id, self.config.connect_timeout
                );
                session::reject(client).await;
                return RelayOutcome::dial_failed(
                    session_id,
                    lifecycle,
                    format!("timed out after {:?}", self.config.connect_timeout),
                );
            }
        };

        let outcome = session::pump(session_id, lifecycle, client, upstream).await;
        info!(
            "Relay session {} closed after {} frames: {}",
            session_id, outcome.frames_forwarded, outcome.reason
        );
        drop(registration);
        outcome
    }
}
