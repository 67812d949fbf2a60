//! One encrypted transport to the push gateway.
//!
//! An [`ApnsConnection`] owns exactly one transport for its whole lifetime.
//! Sends go out on the write half; a single background listener performs one
//! blocking read of the gateway's fixed-size error frame on the read half.
//! The two directions are independent: a send never waits on the listener.
//! Once closed, a connection is never reused; reconnecting means opening a
//! new one.

mod dialer;
mod tls;

pub use dialer::{BoxedTransport, Dialer, Transport};
pub use tls::TlsDialer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::entry::{ErrorResponse, Message, NotificationCodec, ERROR_RESPONSE_LEN};
use crate::error::{ApnsError, Result};
use crate::metrics::{CONNECTIONS_ALIVE, ERROR_FRAMES_TOTAL, SEND_FAILURES_TOTAL};

/// Immutable per-connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Gateway endpoint as `host:port`
    pub endpoint: String,
    /// Budget for dial plus TLS handshake
    pub handshake_timeout: Duration,
    /// Whether a write failure closes the connection, in addition to the
    /// read-failure path that always does
    pub close_on_write_failure: bool,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            handshake_timeout: Duration::from_secs(60),
            close_on_write_failure: false,
        }
    }
}

/// A live connection to the push gateway.
///
/// The sender is the sole writer and the listener the sole reader of the
/// transport, so no ordering exists between them: a send can race with the
/// listener tearing the connection down, and callers must treat a post-send
/// `is_alive() == false` as expected.
pub struct ApnsConnection {
    id: u32,
    config: ConnectionConfig,
    codec: Arc<dyn NotificationCodec>,
    response_tx: mpsc::Sender<ErrorResponse>,
    writer: Mutex<WriteHalf<BoxedTransport>>,
    alive: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for ApnsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApnsConnection")
            .field("id", &self.id)
            .field("alive", &self.alive)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ApnsConnection {
    /// Dial the gateway and start the background error listener.
    ///
    /// The dial runs on its own task bounded by the handshake budget. If the
    /// budget elapses first the task is aborted, so a late dial result cannot
    /// leak a live transport.
    pub async fn open(
        id: u32,
        config: ConnectionConfig,
        dialer: Arc<dyn Dialer>,
        codec: Arc<dyn NotificationCodec>,
        response_tx: mpsc::Sender<ErrorResponse>,
    ) -> Result<Arc<Self>> {
        let endpoint = config.endpoint.clone();
        let mut dial = tokio::spawn(async move { dialer.dial(&endpoint).await });

        let transport = match timeout(config.handshake_timeout, &mut dial).await {
            Err(_) => {
                dial.abort();
                tracing::warn!(
                    connection_id = id,
                    endpoint = %config.endpoint,
                    timeout = ?config.handshake_timeout,
                    "Handshake not completed in time, dial aborted"
                );
                return Err(ApnsError::HandshakeTimeout(config.handshake_timeout));
            }
            Ok(Err(join_err)) => {
                return Err(ApnsError::Internal(format!("dial task failed: {join_err}")));
            }
            Ok(Ok(Err(dial_err))) => {
                tracing::warn!(
                    connection_id = id,
                    endpoint = %config.endpoint,
                    error = %dial_err,
                    "Dial failed"
                );
                return Err(dial_err);
            }
            Ok(Ok(Ok(transport))) => transport,
        };

        let (reader, writer) = tokio::io::split(transport);
        let connection = Arc::new(Self {
            id,
            config,
            codec,
            response_tx,
            writer: Mutex::new(writer),
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        });

        CONNECTIONS_ALIVE.inc();
        tokio::spawn(Arc::clone(&connection).listen(reader));

        tracing::info!(
            connection_id = id,
            endpoint = %connection.config.endpoint,
            "Connection opened"
        );
        Ok(connection)
    }

    /// Encode and transmit one message.
    ///
    /// On a successful encode the message is stamped with this connection's
    /// identifier before the write, so an error frame arriving later can be
    /// correlated back to it. A write failure is reported to the caller; it
    /// closes the connection only when `close_on_write_failure` is set.
    pub async fn send_message(&self, message: &mut Message) -> Result<()> {
        if !self.is_alive() {
            return Err(ApnsError::ConnectionClosed);
        }

        let frame = self.codec.encode(message)?;
        message.connection_id = Some(self.id);

        let mut writer = self.writer.lock().await;
        let written = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;
        drop(writer);

        match written {
            Ok(()) => {
                tracing::debug!(
                    connection_id = self.id,
                    message_identifier = message.identifier,
                    frame_len = frame.len(),
                    "Message sent"
                );
                Ok(())
            }
            Err(e) => {
                SEND_FAILURES_TOTAL.inc();
                tracing::warn!(
                    connection_id = self.id,
                    message_identifier = message.identifier,
                    error = %e,
                    "Send failed"
                );
                if self.config.close_on_write_failure {
                    self.close().await;
                }
                Err(e.into())
            }
        }
    }

    /// Point-in-time liveness snapshot; the connection may close immediately
    /// after this returns true.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Close the connection. Idempotent: the first caller wins, later calls
    /// (including the listener's own final close) are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.alive.store(false, Ordering::SeqCst);

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(connection_id = self.id, error = %e, "Transport shutdown error");
        }
        drop(writer);

        CONNECTIONS_ALIVE.dec();
        tracing::info!(connection_id = self.id, "Connection closed");
    }

    /// Single-shot error listener.
    ///
    /// The gateway delivers at most one error frame per connection before the
    /// connection must be considered dead, so this reads exactly one frame
    /// and then closes. Publishing may wait on a full response channel; that
    /// stalls this task only, never the sender.
    async fn listen(self: Arc<Self>, mut reader: ReadHalf<BoxedTransport>) {
        let mut frame = [0u8; ERROR_RESPONSE_LEN];
        match reader.read_exact(&mut frame).await {
            Err(e) => {
                tracing::info!(
                    connection_id = self.id,
                    error = %e,
                    "Error-frame read failed, closing connection"
                );
            }
            Ok(_) => match self.codec.decode_error_frame(&frame) {
                Ok(mut response) => {
                    response.connection_id = self.id;
                    ERROR_FRAMES_TOTAL.inc();
                    tracing::info!(
                        connection_id = self.id,
                        status = response.status,
                        description = response.status_description(),
                        message_identifier = response.identifier,
                        "Gateway error frame received"
                    );
                    if self.response_tx.send(response).await.is_err() {
                        tracing::warn!(
                            connection_id = self.id,
                            "Response channel dropped, error frame discarded"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = self.id,
                        error = %e,
                        "Error frame could not be decoded"
                    );
                }
            },
        }

        self.close().await;
    }
}
