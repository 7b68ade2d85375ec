//! Upstream ticker stream connector.

use super::{Duplex, RelayError, RelayFrame};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Opens upstream ticker streams.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Connects to `url`.
    async fn connect(&self, url: &str) -> Result<Duplex, RelayError>;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl UpstreamConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Duplex, RelayError> {
        let (ws, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RelayError::Dial(e.to_string()))?;
        debug!("Upstream {} answered {}", url, response.status());

        let (sink, stream) = ws.split();

        let sink = sink
            .sink_map_err(|e| RelayError::UpstreamWrite(e.to_string()))
            .with(|frame: RelayFrame| future::ready(Ok::<_, RelayError>(to_message(frame))));

        // Ping/pong is answered by tungstenite itself and never relayed.
        let stream = stream
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(RelayFrame::Text(text.as_str().to_owned()))),
                    Ok(Message::Binary(bytes)) => Some(Ok(RelayFrame::Binary(bytes.to_vec()))),
                    Ok(Message::Close(_)) => Some(Ok(RelayFrame::Close)),
                    Ok(_) => None,
                    Err(e) => Some(Err(RelayError::UpstreamRead(e.to_string()))),
                })
            })
            .boxed();

        Ok(Duplex::new(Box::pin(sink), stream))
    }
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

    #[test]
    fn test_to_message() {
        assert_eq!(
            to_message(RelayFrame::Text("tick".to_string())),
            Message::Text("tick".into())
        );
        assert_eq!(
            to_message(RelayFrame::Binary(vec![1, 2, 3])),
            Message::Binary(vec![1, 2, 3].into())
        );
        assert_eq!(to_message(RelayFrame::Close), Message::Close(None));
    }

    #[tokio::test]
    async fn test_dial_failure() {
        let err = TungsteniteConnector
            .connect("ws://127.0.0.1:1/ws/btcusdt@ticker")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Dial(_)));
    }
}
