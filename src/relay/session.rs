//! Relay session state machine and pump loop.

use super::{Duplex, RelayFrame};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Bound on closing both connections at the end of a session.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Relay session lifecycle: `Idle -> Upgrading -> Relaying -> Closed`.
///
/// `Upgrading` may also go straight to `Closed` when the caller upgrade or the
/// upstream dial fails. There is no reconnecting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Created, nothing opened yet.
    Idle,
    /// Caller upgrade and upstream dial in progress.
    Upgrading,
    /// Forwarding frames.
    Relaying,
    /// Both connections released.
    Closed,
}

impl RelayState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: RelayState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Upgrading)
                | (Self::Upgrading, Self::Relaying)
                | (Self::Upgrading, Self::Closed)
                | (Self::Relaying, Self::Closed)
        )
    }
}

/// Records the states a session passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Lifecycle {
    states: Vec<RelayState>,
}

impl Lifecycle {
    pub(super) fn new() -> Self {
        Self {
            states: vec![RelayState::Idle],
        }
    }

    pub(super) fn current(&self) -> RelayState {
        self.states.last().copied().unwrap_or(RelayState::Idle)
    }

    /// Moves to `next`; an illegal transition is logged and ignored.
    pub(super) fn advance(&mut self, next: RelayState) {
        let current = self.current();
        if current.can_transition_to(next) {
            self.states.push(next);
        } else {
            warn!("Ignoring relay transition {:?} -> {:?}", current, next);
        }
    }

    pub(super) fn into_states(self) -> Vec<RelayState> {
        self.states
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Upstream could not be dialed.
    DialFailed(String),
    /// Upstream sent a close frame or ended.
    UpstreamClosed,
    /// Reading from upstream failed.
    UpstreamError(String),
    /// Caller sent a close frame or went away.
    ClientClosed,
    /// Reading from or writing to the caller failed.
    ClientError(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DialFailed(e) => write!(f, "upstream dial failed: {}", e),
            Self::UpstreamClosed => write!(f, "upstream closed"),
            Self::UpstreamError(e) => write!(f, "upstream error: {}", e),
            Self::ClientClosed => write!(f, "client closed"),
            Self::ClientError(e) => write!(f, "client error: {}", e),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Session identifier.
    pub session_id: Uuid,
    /// Frames delivered to the caller.
    pub frames_forwarded: u64,
    /// Why the session ended.
    pub reason: CloseReason,
    /// States visited, in order.
    pub states: Vec<RelayState>,
}

impl RelayOutcome {
    pub(super) fn dial_failed(session_id: Uuid, mut lifecycle: Lifecycle, error: String) -> Self {
        lifecycle.advance(RelayState::Closed);
        Self {
            session_id,
            frames_forwarded: 0,
            reason: CloseReason::DialFailed(error),
            states: lifecycle.into_states(),
        }
    }
}

/// Closes a caller whose upstream could not be opened.
pub(super) async fn reject(mut client: Duplex) {
    let _ = tokio::time::timeout(TEARDOWN_TIMEOUT, async {
        let _ = client.sink.send(RelayFrame::Close).await;
        let _ = client.sink.close().await;
    })
    .await;
}

/// Forwards upstream frames to the caller until either side ends, then closes both.
pub(super) async fn pump(
    session_id: Uuid,
    mut lifecycle: Lifecycle,
    mut client: Duplex,
    mut upstream: Duplex,
) -> RelayOutcome {
    lifecycle.advance(RelayState::Relaying);
    let mut frames_forwarded = 0u64;

    let reason = loop {
        tokio::select! {
            frame = upstream.stream.next() => match frame {
                Some(Ok(RelayFrame::Close)) | None => break CloseReason::UpstreamClosed,
                Some(Ok(frame)) => {
                    if let Err(e) = client.sink.send(frame).await {
                        break CloseReason::ClientError(e.to_string());
                    }
                    frames_forwarded += 1;
                }
                Some(Err(e)) => break CloseReason::UpstreamError(e.to_string()),
            },
            frame = client.stream.next() => match frame {
                Some(Ok(RelayFrame::Close)) | None => break CloseReason::ClientClosed,
                // Caller messages are not forwarded upstream.
                Some(Ok(_)) => {}
                Some(Err(e)) => break CloseReason::ClientError(e.to_string()),
            },
        }
    };

    debug!("Relay session {} tearing down: {}", session_id, reason);

    let _ = tokio::time::timeout(TEARDOWN_TIMEOUT, async {
        if !matches!(reason, CloseReason::ClientClosed | CloseReason::ClientError(_)) {
            let _ = client.sink.send(RelayFrame::Close).await;
        }
        let _ = client.sink.close().await;
        if !matches!(reason, CloseReason::UpstreamClosed | CloseReason::UpstreamError(_)) {
            let _ = upstream.sink.send(RelayFrame::Close).await;
        }
        let _ = upstream.sink.close().await;
    })
    .await;
    lifecycle.advance(RelayState::Closed);

    RelayOutcome {
        session_id,
        frames_forwarded,
        reason,
        states: lifecycle.into_states(),
    }
}
