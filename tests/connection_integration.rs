//! Integration tests for the gateway connection: dial, send, the single-shot
//! error listener, and close semantics, all over in-memory transports.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use apns_push_client::connection::{
    ApnsConnection, BoxedTransport, ConnectionConfig, Dialer,
};
use apns_push_client::entry::{
    Aps, BinaryCodec, ErrorResponse, Message, NotificationCodec, Payload, ERROR_RESPONSE_LEN,
};
use apns_push_client::error::{ApnsError, Result};

/// Hands out a pre-built transport once.
struct DuplexDialer {
    transport: Mutex<Option<DuplexStream>>,
}

impl DuplexDialer {
    fn new(transport: DuplexStream) -> Arc<Self> {
        Arc::new(Self {
            transport: Mutex::new(Some(transport)),
        })
    }
}

#[async_trait]
impl Dialer for DuplexDialer {
    async fn dial(&self, _endpoint: &str) -> Result<BoxedTransport> {
        let transport = self
            .transport
            .lock()
            .await
            .take()
            .expect("dialer used more than once");
        Ok(Box::new(transport))
    }
}

/// Never completes the dial; exercises the handshake timeout path.
struct PendingDialer;

#[async_trait]
impl Dialer for PendingDialer {
    async fn dial(&self, _endpoint: &str) -> Result<BoxedTransport> {
        futures::future::pending().await
    }
}

struct FailingDialer;

#[async_trait]
impl Dialer for FailingDialer {
    async fn dial(&self, _endpoint: &str) -> Result<BoxedTransport> {
        Err(ApnsError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        )))
    }
}

/// Transport whose writes always fail while reads stay pending, isolating
/// the write-failure path from the listener's read-failure path.
struct FailWriteTransport;

impl AsyncRead for FailWriteTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for FailWriteTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

struct FailWriteDialer;

#[async_trait]
impl Dialer for FailWriteDialer {
    async fn dial(&self, _endpoint: &str) -> Result<BoxedTransport> {
        Ok(Box::new(FailWriteTransport))
    }
}

fn test_message(identifier: u32) -> Message {
    let payload = Payload::new(Aps {
        alert: Some("hello".to_string()),
        badge: Some(1),
        sound: None,
    });
    Message::enhanced(identifier, "0a0b0c0d", payload, 1_900_000_000)
}

async fn open_over_duplex(
    id: u32,
    config: ConnectionConfig,
) -> (Arc<ApnsConnection>, DuplexStream, mpsc::Receiver<ErrorResponse>) {
    let (client, gateway) = tokio::io::duplex(4096);
    let (tx, rx) = mpsc::channel(16);
    let connection = ApnsConnection::open(
        id,
        config,
        DuplexDialer::new(client),
        Arc::new(BinaryCodec),
        tx,
    )
    .await
    .expect("open failed");
    (connection, gateway, rx)
}

async fn wait_until_closed(connection: &ApnsConnection) {
    timeout(Duration::from_secs(2), async {
        while connection.is_alive() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection never closed");
}

#[tokio::test]
async fn successful_send_stamps_connection_id_and_writes_full_frame() {
    let (connection, mut gateway, _rx) =
        open_over_duplex(7, ConnectionConfig::new("gateway:2195")).await;
    assert!(connection.is_alive());

    let mut message = test_message(1);
    let expected = BinaryCodec.encode(&message).unwrap();

    connection.send_message(&mut message).await.unwrap();
    assert_eq!(message.connection_id, Some(7));

    let mut received = vec![0u8; expected.len()];
    gateway.read_exact(&mut received).await.unwrap();
    assert_eq!(received, expected);
}

#[tokio::test]
async fn sends_are_ordered_on_one_transport() {
    let (connection, mut gateway, _rx) =
        open_over_duplex(1, ConnectionConfig::new("gateway:2195")).await;

    let mut first = test_message(1);
    let mut second = test_message(2);
    let expected: Vec<u8> = [
        BinaryCodec.encode(&first).unwrap(),
        BinaryCodec.encode(&second).unwrap(),
    ]
    .concat();

    connection.send_message(&mut first).await.unwrap();
    connection.send_message(&mut second).await.unwrap();

    let mut received = vec![0u8; expected.len()];
    gateway.read_exact(&mut received).await.unwrap();
    assert_eq!(received, expected);
}

#[tokio::test]
async fn send_on_closed_connection_fails_without_touching_transport() {
    let (connection, mut gateway, _rx) =
        open_over_duplex(1, ConnectionConfig::new("gateway:2195")).await;

    connection.close().await;
    assert!(!connection.is_alive());

    let mut message = test_message(1);
    let err = connection.send_message(&mut message).await.unwrap_err();
    assert!(matches!(err, ApnsError::ConnectionClosed));
    assert!(message.connection_id.is_none());

    // Nothing was ever written: the gateway side sees a clean EOF.
    let mut leftover = Vec::new();
    gateway.read_to_end(&mut leftover).await.unwrap();
    assert!(leftover.is_empty());
}

#[tokio::test]
async fn listener_publishes_stamped_error_frame_then_closes() {
    let (connection, mut gateway, mut rx) =
        open_over_duplex(3, ConnectionConfig::new("gateway:2195")).await;

    // command 8, status 8 (invalid token), identifier 42
    gateway.write_all(&[8, 8, 0, 0, 0, 42]).await.unwrap();

    let response = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.command, 8);
    assert_eq!(response.status, 8);
    assert_eq!(response.identifier, 42);
    assert_eq!(response.connection_id, 3);

    // One diagnostic per connection lifetime: the listener closes afterwards.
    wait_until_closed(&connection).await;

    // A second frame is never consumed or published.
    let _ = gateway.write_all(&[8, 1, 0, 0, 0, 43]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn short_read_closes_without_publishing() {
    let (connection, mut gateway, mut rx) =
        open_over_duplex(1, ConnectionConfig::new("gateway:2195")).await;

    // Fewer bytes than a full error frame, then peer close.
    gateway.write_all(&[8, 8, 0]).await.unwrap();
    drop(gateway);

    wait_until_closed(&connection).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn peer_close_tears_down_connection() {
    let (connection, gateway, mut rx) =
        open_over_duplex(1, ConnectionConfig::new("gateway:2195")).await;

    drop(gateway);
    wait_until_closed(&connection).await;
    assert!(rx.try_recv().is_err());

    let mut message = test_message(1);
    assert!(matches!(
        connection.send_message(&mut message).await,
        Err(ApnsError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn open_times_out_when_handshake_never_completes() {
    let mut config = ConnectionConfig::new("gateway:2195");
    config.handshake_timeout = Duration::from_millis(50);

    let (tx, _rx) = mpsc::channel(1);
    let err = ApnsConnection::open(1, config, Arc::new(PendingDialer), Arc::new(BinaryCodec), tx)
        .await
        .unwrap_err();
    assert!(matches!(err, ApnsError::HandshakeTimeout(_)));
}

#[tokio::test]
async fn dial_failure_propagates() {
    let (tx, _rx) = mpsc::channel(1);
    let err = ApnsConnection::open(
        1,
        ConnectionConfig::new("gateway:2195"),
        Arc::new(FailingDialer),
        Arc::new(BinaryCodec),
        tx,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApnsError::Io(_)));
}

#[tokio::test]
async fn write_failure_keeps_connection_open_by_default() {
    let (tx, _rx) = mpsc::channel(1);
    let connection = ApnsConnection::open(
        1,
        ConnectionConfig::new("gateway:2195"),
        Arc::new(FailWriteDialer),
        Arc::new(BinaryCodec),
        tx,
    )
    .await
    .unwrap();

    let mut message = test_message(1);
    assert!(matches!(
        connection.send_message(&mut message).await,
        Err(ApnsError::Io(_))
    ));
    assert!(connection.is_alive());

    // Still open: the next send reaches the transport again.
    let mut next = test_message(2);
    assert!(matches!(
        connection.send_message(&mut next).await,
        Err(ApnsError::Io(_))
    ));
}

#[tokio::test]
async fn write_failure_closes_connection_when_policy_enabled() {
    let mut config = ConnectionConfig::new("gateway:2195");
    config.close_on_write_failure = true;

    let (tx, _rx) = mpsc::channel(1);
    let connection = ApnsConnection::open(
        1,
        config,
        Arc::new(FailWriteDialer),
        Arc::new(BinaryCodec),
        tx,
    )
    .await
    .unwrap();

    let mut message = test_message(1);
    assert!(matches!(
        connection.send_message(&mut message).await,
        Err(ApnsError::Io(_))
    ));
    assert!(!connection.is_alive());

    let mut next = test_message(2);
    assert!(matches!(
        connection.send_message(&mut next).await,
        Err(ApnsError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn close_is_idempotent() {
    let (connection, _gateway, _rx) =
        open_over_duplex(1, ConnectionConfig::new("gateway:2195")).await;

    connection.close().await;
    connection.close().await;
    assert!(!connection.is_alive());
}

/// Round trip bounding the codec contract: encode, transmit, let a mock
/// gateway reject the message by identifier, decode, correlate.
#[tokio::test]
async fn gateway_rejection_round_trip() {
    let (connection, mut gateway, mut rx) =
        open_over_duplex(9, ConnectionConfig::new("gateway:2195")).await;

    let mut message = test_message(0x0102_0304);
    let frame = BinaryCodec.encode(&message).unwrap();
    connection.send_message(&mut message).await.unwrap();

    let mut received = vec![0u8; frame.len()];
    gateway.read_exact(&mut received).await.unwrap();

    // Enhanced frame: identifier sits right after the command byte.
    let identifier = [received[1], received[2], received[3], received[4]];
    let mut rejection = vec![8u8, 7u8];
    rejection.extend_from_slice(&identifier);
    assert_eq!(rejection.len(), ERROR_RESPONSE_LEN);
    gateway.write_all(&rejection).await.unwrap();

    let response = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.identifier, message.identifier);
    assert_eq!(response.connection_id, message.connection_id.unwrap());
    assert_eq!(response.status_description(), "invalid payload size");
}
