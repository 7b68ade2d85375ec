//! WebSocket endpoint for the live quote relay.

use crate::api::middleware::RelayIdentity;
use crate::error::{ApiError, ErrorResponse};
use crate::market::normalize_symbol;
use crate::relay::{Duplex, RelayError, RelayFrame};
use crate::state::AppState;
use axum::Extension;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use futures::{SinkExt, StreamExt, future};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::IntoParams;

/// Query parameters of the relay endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MarketDataQuery {
    /// Symbol to stream, e.g. `btc` or `ETHUSDT`. Defaults to the configured symbol.
    pub symbol: Option<String>,
    /// Access token, for clients that cannot set headers.
    pub token: Option<String>,
}

/// Live ticker relay.
///
/// Upgrades the connection and forwards every upstream ticker frame for the
/// requested symbol verbatim until either side closes.
#[utoipa::path(
    get,
    path = "/api/market-data",
    params(MarketDataQuery),
    responses(
        (status = 101, description = "WebSocket connection established"),
        (status = 400, description = "Invalid symbol", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Market Data"
)]
pub async fn market_data(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RelayIdentity>,
    Query(query): Query<MarketDataQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let symbol = match resolve_symbol(&state, query.symbol.as_deref()) {
        Ok(symbol) => symbol,
        Err(e) => return e.into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!("Relay request for {} is not an upgrade: {}", symbol, rejection);
            return rejection.into_response();
        }
    };

    info!("Relay upgrade for {} (user {:?})", symbol, identity.0);

    ws.on_failed_upgrade(|e| warn!("Relay upgrade failed: {}", e))
        .on_upgrade(move |socket| async move {
            let outcome = state
                .relay
                .run(symbol, identity.0, into_duplex(socket))
                .await;
            debug!(
                "Relay session {} finished in state {:?}",
                outcome.session_id,
                outcome.states.last()
            );
        })
}

/// Browser page that renders the live ticker stream.
#[utoipa::path(
    get,
    path = "/api/market-live",
    responses(
        (status = 200, description = "Live ticker page", content_type = "text/html")
    ),
    tag = "Market Data"
)]
pub async fn market_live() -> Html<&'static str> {
    Html(include_str!("../../static/market_live.html"))
}

fn resolve_symbol(state: &AppState, requested: Option<&str>) -> Result<String, ApiError> {
    let raw = requested
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&state.config.relay.default_symbol);

    normalize_symbol(raw, &state.config.market.quote_currency)
        .ok_or_else(|| ApiError::InvalidRequest(format!("Invalid symbol: {}", raw)))
}

/// Adapts an upgraded caller socket to the relay's frame interface.
fn into_duplex(socket: WebSocket) -> Duplex {
    let (sink, stream) = socket.split();

    let sink = sink
        .sink_map_err(|e| RelayError::ClientWrite(e.to_string()))
        .with(|frame: RelayFrame| future::ready(Ok::<_, RelayError>(to_message(frame))));

    // Pings are answered by axum.
    let stream = stream
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(RelayFrame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(bytes)) => Some(Ok(RelayFrame::Binary(bytes.to_vec()))),
                Ok(Message::Close(_)) => Some(Ok(RelayFrame::Close)),
                Ok(_) => None,
                Err(e) => Some(Err(RelayError::ClientRead(e.to_string()))),
            })
        })
        .boxed();

    Duplex::new(Box::pin(sink), stream)
}

fn to_message(frame: RelayFrame) -> Message {
    match frame {
        RelayFrame::Text(text) => Message::Text(text.into()),
        RelayFrame::Binary(bytes) => Message::Binary(bytes.into()),
        RelayFrame::Close => Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::market::MockQuoteProvider;
    use crate::relay::{RelayError, UpstreamConnector};
    use crate::state::Collaborators;
    use async_trait::async_trait;

    struct NoUpstream;

    #[async_trait]
    impl UpstreamConnector for NoUpstream {
        async fn connect(&self, _url: &str) -> Result<Duplex, RelayError> {
            Err(RelayError::Dial("offline".to_string()))
        }
    }

    fn state() -> AppState {
        let mut config = Config::default();
        config.auth.user_secret = "relay-test-secret".to_string();
        AppState::from_parts(
            config,
            Collaborators::in_memory(Arc::new(MockQuoteProvider::new()), Arc::new(NoUpstream)),
            None,
        )
    }

    #[test]
    fn test_resolve_symbol_default() {
        let state = state();
        let expected = normalize_symbol(
            &state.config.relay.default_symbol,
            &state.config.market.quote_currency,
        )
        .unwrap();

        assert_eq!(resolve_symbol(&state, None).unwrap(), expected);
        assert_eq!(resolve_symbol(&state, Some("  ")).unwrap(), expected);
    }

    #[test]
    fn test_resolve_symbol_requested() {
        let state = state();
        assert_eq!(resolve_symbol(&state, Some("eth")).unwrap(), "ETHUSDT");
        assert_eq!(resolve_symbol(&state, Some("solusdt")).unwrap(), "SOLUSDT");
    }

    #[test]
    fn test_resolve_symbol_invalid() {
        let state = state();
        let err = resolve_symbol(&state, Some("btc/usdt")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_to_message() {
        assert_eq!(
            to_message(RelayFrame::Text("{\"e\":\"24hrTicker\"}".to_string())),
            Message::Text("{\"e\":\"24hrTicker\"}".into())
        );
        assert_eq!(to_message(RelayFrame::Close), Message::Close(None));
    }

    #[tokio::test]
    async fn test_market_live_page() {
        let Html(page) = market_live().await;
        assert!(page.contains("/api/market-data"));
    }
}
