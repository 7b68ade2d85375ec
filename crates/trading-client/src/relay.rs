//! WebSocket client for the live quote relay.

use crate::error::Error;
use crate::types::Ticker;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Frame received from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Text payload, normally a ticker event.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
}

impl RelayMessage {
    /// Decodes the payload as a ticker event.
    #[must_use]
    pub fn ticker(&self) -> Option<Ticker> {
        match self {
            Self::Text(text) => serde_json::from_str(text).ok(),
            Self::Binary(bytes) => serde_json::from_slice(bytes).ok(),
        }
    }
}

/// WebSocket client receiving relayed ticker frames.
pub struct RelayClient {
    rx: mpsc::Receiver<RelayMessage>,
    close_tx: Option<mpsc::Sender<()>>,
}

impl RelayClient {
    /// Connects to the relay.
    ///
    /// # Arguments
    /// * `url` - Relay URL (e.g., "ws://localhost:8080/api/market-data?symbol=btc")
    ///
    /// # Errors
    /// Returns error if the connection or upgrade fails.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let (ws_stream, _) = connect_async(url).await.map_err(Box::new)?;
        let (mut write, mut read) = ws_stream.split();

        let (msg_tx, msg_rx) = mpsc::channel::<RelayMessage>(100);
        let (close_tx, mut close_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if msg_tx.send(RelayMessage::Text(text.as_str().to_owned())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            if msg_tx.send(RelayMessage::Binary(bytes.to_vec())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    _ = close_rx.recv() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        Ok(Self {
            rx: msg_rx,
            close_tx: Some(close_tx),
        })
    }

    /// Receives the next relayed frame.
    ///
    /// Returns `None` once the relay is closed.
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        self.rx.recv().await
    }

    /// Closes the session.
    ///
    /// # Errors
    /// Returns `ConnectionClosed` if the connection is already gone.
    pub async fn close(&mut self) -> Result<(), Error> {
        let tx = self.close_tx.take().ok_or(Error::ConnectionClosed)?;
        tx.send(()).await.map_err(|_| Error::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_from_text() {
        let message = RelayMessage::Text(
            r#"{"e":"24hrTicker","E":1,"s":"ETHUSDT","P":"1.2","c":"2000","b":"1999.9","a":"2000.1"}"#
                .to_string(),
        );
        let ticker = message.ticker().unwrap();
        assert_eq!(ticker.symbol, "ETHUSDT");
        assert_eq!(ticker.last_price, "2000");
    }

    #[test]
    fn test_ticker_from_non_ticker() {
        assert!(RelayMessage::Text("hello".to_string()).ticker().is_none());
        assert!(RelayMessage::Binary(vec![0, 1, 2]).ticker().is_none());
    }
}
