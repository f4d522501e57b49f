//! Frame stream receiver
//!
//! Keeps a WebSocket connection to the capture device open for the lifetime
//! of the process. Every text message is one frame; a message that fails to
//! decode is reported and skipped without dropping the connection. When the
//! connection closes the receiver reconnects according to its
//! [`ReconnectPolicy`].

use crate::config::ReconnectPolicy;
use can_monitor_core::{wire, FrameEvent};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Events delivered to the console
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connected,
    Disconnected,
    Frame(FrameEvent),
    /// A message that could not be decoded, with the reason
    Malformed(String),
}

pub struct StreamReceiver {
    url: String,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<StreamEvent>,
}

impl StreamReceiver {
    pub fn new(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            policy,
            events,
        }
    }

    /// Run the receiver as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Connect, pump messages, reconnect. Returns only once nobody listens
    /// for events anymore.
    pub async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    failures = 0;
                    log::info!("Connected to {}", self.url);
                    if self.events.send(StreamEvent::Connected).is_err() {
                        return;
                    }

                    if !self.pump(stream).await {
                        return;
                    }

                    log::info!("Disconnected from {}", self.url);
                    if self.events.send(StreamEvent::Disconnected).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    if failures == 1 {
                        log::warn!("Cannot reach {}: {}", self.url, err);
                    } else {
                        log::trace!("Connection attempt {} failed: {}", failures, err);
                    }
                }
            }

            if self.events.is_closed() {
                return;
            }

            let delay = self.policy.delay(failures);
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Forward messages until the connection ends. Returns false when the
    /// event channel is closed.
    async fn pump(&self, mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> bool {
        while let Some(message) = stream.next().await {
            let event = match message {
                Ok(Message::Text(text)) => match wire::decode_message(&text) {
                    Ok(frame) => StreamEvent::Frame(frame),
                    Err(err) => {
                        log::warn!("Skipping malformed frame message: {}", err);
                        StreamEvent::Malformed(err.to_string())
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    log::warn!("Frame stream error: {}", err);
                    break;
                }
            };

            if self.events.send(event).is_err() {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    async fn next_event(events: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_reconnects_after_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut events) = mpsc::unbounded_channel();
        let handle = StreamReceiver::new(
            format!("ws://{}/frames.ws", addr),
            ReconnectPolicy::Immediate,
            tx,
        )
        .spawn();

        let (tcp, _) = listener.accept().await.unwrap();
        let mut server = accept_async(tcp).await.unwrap();
        server
            .send(Message::Text(
                r#"{"t": 1700000000.5, "i": 2024, "e": false, "r": false, "l": 1, "d": "ff"}"#
                    .to_string(),
            ))
            .await
            .unwrap();
        server.send(Message::Text("{not json".to_string())).await.unwrap();
        server
            .send(Message::Text(
                r#"{"t": 1700000001.0, "i": 1, "e": true, "r": false, "l": 0, "d": ""}"#.to_string(),
            ))
            .await
            .unwrap();
        server.close(None).await.unwrap();

        assert_eq!(next_event(&mut events).await, StreamEvent::Connected);
        match next_event(&mut events).await {
            StreamEvent::Frame(frame) => assert_eq!(frame.identifier, 2024),
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(matches!(next_event(&mut events).await, StreamEvent::Malformed(_)));
        match next_event(&mut events).await {
            StreamEvent::Frame(frame) => assert_eq!(frame.identifier, 1),
            other => panic!("expected frame, got {:?}", other),
        }
        assert_eq!(next_event(&mut events).await, StreamEvent::Disconnected);

        // No manual intervention: the receiver dials again on its own
        let (tcp, _) = timeout(Duration::from_secs(5), listener.accept())
            .await
            .unwrap()
            .unwrap();
        let _second = accept_async(tcp).await.unwrap();
        assert_eq!(next_event(&mut events).await, StreamEvent::Connected);

        handle.abort();
    }

    #[tokio::test]
    async fn test_stops_when_events_are_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, events) = mpsc::unbounded_channel();
        drop(events);
        let receiver = StreamReceiver::new(
            format!("ws://{}/frames.ws", addr),
            ReconnectPolicy::Immediate,
            tx,
        );

        timeout(Duration::from_secs(5), receiver.run())
            .await
            .expect("receiver returns once the console is gone");
    }
}
