//! Signaling client against a loopback WebSocket relay.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use rover_signal::{
    ConnectionState, IceCandidate, ReconnectPolicy, SdpKind, SessionDescription,
    SignalingClient, SignalingConfig, SignalingConsumer,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq)]
enum Seen {
    Connected,
    Disconnected,
    Description(SessionDescription),
    Candidate(IceCandidate),
}

struct ChannelConsumer(mpsc::UnboundedSender<Seen>);

impl SignalingConsumer for ChannelConsumer {
    fn on_connected(&self) {
        let _ = self.0.send(Seen::Connected);
    }

    fn on_disconnected(&self) {
        let _ = self.0.send(Seen::Disconnected);
    }

    fn on_remote_description(&self, description: SessionDescription) {
        let _ = self.0.send(Seen::Description(description));
    }

    fn on_remote_candidate(&self, candidate: IceCandidate) {
        let _ = self.0.send(Seen::Candidate(candidate));
    }
}

/// Accepts WebSocket connections and hands each one to the test.
async fn relay() -> (String, mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = accept_async(stream).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });

    (format!("ws://{addr}"), rx)
}

fn client_for(
    address: &str,
    policy: ReconnectPolicy,
) -> (
    SignalingClient,
    Arc<ChannelConsumer>,
    mpsc::UnboundedReceiver<Seen>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let consumer = Arc::new(ChannelConsumer(tx));
    let config = SignalingConfig::new(address)
        .unwrap()
        .with_reconnect(policy);
    let client = SignalingClient::websocket(config, &consumer);
    (client, consumer, rx)
}

async fn next_seen(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    timeout(WAIT, rx.recv())
        .await
        .expect("consumer notification")
        .expect("consumer channel open")
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("frame from client")
            .expect("client connection open")
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

#[tokio::test]
async fn exchanges_handshake_messages() {
    let (address, mut accepted) = relay().await;
    let (client, _consumer, mut seen) = client_for(&address, ReconnectPolicy::default());

    client.connect().unwrap();
    let mut ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    assert_eq!(next_seen(&mut seen).await, Seen::Connected);
    assert_eq!(client.state(), ConnectionState::Connected);

    ws.send(Message::Text(
        r#"{"type":"sdp","payload":"{\"type\":\"offer\",\"sdp\":\"v=0...\"}"}"#.to_string(),
    ))
    .await
    .unwrap();
    assert_eq!(
        next_seen(&mut seen).await,
        Seen::Description(SessionDescription {
            kind: SdpKind::Offer,
            sdp: "v=0...".to_string(),
        })
    );

    // Noise that must not reach the consumer.
    ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    ws.send(Message::Text("not json".to_string())).await.unwrap();
    ws.send(Message::Text(
        r#"{"type":"candidate","payload":"{\"candidate\":\"candidate:1 1 UDP 2122260223 10.0.0.2 5000 typ host\",\"sdpMid\":\"0\",\"sdpMLineIndex\":0}"}"#
            .to_string(),
    ))
    .await
    .unwrap();
    assert_eq!(
        next_seen(&mut seen).await,
        Seen::Candidate(IceCandidate {
            candidate: "candidate:1 1 UDP 2122260223 10.0.0.2 5000 typ host".to_string(),
            sdp_mid: "0".to_string(),
            sdp_m_line_index: 0,
        })
    );

    client
        .send_description(&SessionDescription::answer("v=0 answer"))
        .unwrap();
    let text = next_text(&mut ws).await;
    let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(raw["type"], "sdp");
    let payload: serde_json::Value =
        serde_json::from_str(raw["payload"].as_str().expect("string payload")).unwrap();
    assert_eq!(payload["type"], "answer");
    assert_eq!(payload["sdp"], "v=0 answer");

    client
        .send_candidate(&IceCandidate {
            candidate: "candidate:9 1 udp 1 10.0.0.9 9 typ host".to_string(),
            sdp_mid: "audio".to_string(),
            sdp_m_line_index: 2,
        })
        .unwrap();
    let text = next_text(&mut ws).await;
    let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(raw["type"], "candidate");
    let payload: serde_json::Value =
        serde_json::from_str(raw["payload"].as_str().expect("string payload")).unwrap();
    assert_eq!(payload["sdpMid"], "audio");
    assert_eq!(payload["sdpMLineIndex"], 2);

    client.shutdown();
}

#[tokio::test]
async fn reconnects_after_relay_drops_connection() {
    let (address, mut accepted) = relay().await;
    let (client, _consumer, mut seen) =
        client_for(&address, ReconnectPolicy::fixed(Duration::from_millis(50)));

    client.connect().unwrap();
    let mut first = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    assert_eq!(next_seen(&mut seen).await, Seen::Connected);

    first.close(None).await.unwrap();
    drop(first);
    assert_eq!(next_seen(&mut seen).await, Seen::Disconnected);

    let _second = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    assert_eq!(next_seen(&mut seen).await, Seen::Connected);
    client
        .wait_for_state(ConnectionState::Connected)
        .await
        .unwrap();

    client.shutdown();
}

#[tokio::test]
async fn answers_relay_close_frame() {
    let (address, mut accepted) = relay().await;
    let (client, _consumer, mut seen) = client_for(&address, ReconnectPolicy::default());

    client.connect().unwrap();
    let mut ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    assert_eq!(next_seen(&mut seen).await, Seen::Connected);

    ws.send(Message::Close(None)).await.unwrap();

    let mut replied = false;
    while let Ok(Some(frame)) = timeout(WAIT, ws.next()).await {
        match frame {
            Ok(Message::Close(_)) => {
                replied = true;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    assert!(replied, "client did not complete the close handshake");
    assert_eq!(next_seen(&mut seen).await, Seen::Disconnected);

    client.shutdown();
}

#[tokio::test]
async fn send_before_connect_is_dropped() {
    let (address, mut accepted) = relay().await;
    let (client, _consumer, mut seen) = client_for(&address, ReconnectPolicy::default());

    client
        .send_description(&SessionDescription::offer("v=0 early"))
        .unwrap();

    client.connect().unwrap();
    let mut ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    assert_eq!(next_seen(&mut seen).await, Seen::Connected);

    client
        .send_description(&SessionDescription::offer("v=0 late"))
        .unwrap();
    let text = next_text(&mut ws).await;
    assert!(text.contains("v=0 late"), "{text}");
    assert!(!text.contains("early"));

    client.shutdown();
}
