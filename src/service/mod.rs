//! Notification dispatch and feedback retrieval.
//!
//! [`ApnsService`] builds payloads from request parameters, validates their
//! shape, selects the wire variant, and delegates transmission to a
//! connection checked out from a [`ConnectionProvider`]. It also drains
//! bounded batches of undeliverable-token feedback from a shared channel.

mod feedback;
mod provider;

pub use feedback::{FeedbackBatch, FeedbackFetcher};
pub use provider::{ConnectionProvider, SingleConnectionProvider};

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::entry::{Aps, Feedback, Message, Payload};
use crate::error::{ApnsError, Result};
use crate::metrics::{FEEDBACK_RECORDS_TOTAL, MESSAGES_SENT_TOTAL};

/// Upper bound on records per feedback query.
pub const MAX_FEEDBACK_LIMIT: usize = 100;

lazy_static! {
    /// Word-character runs; everything else in a token is discarded.
    static ref WORD_RUNS: Regex = Regex::new(r"\w+").unwrap();
}

/// The two wire variants of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushVariant {
    /// Fire-and-forget, no expiration, no delivery-status error frame
    Simple,
    /// Carries an expiration and is eligible for an asynchronous error frame
    Enhanced,
}

impl TryFrom<u8> for PushVariant {
    type Error = ApnsError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PushVariant::Simple),
            1 => Ok(PushVariant::Enhanced),
            other => Err(ApnsError::InvalidVariant(other)),
        }
    }
}

/// Parameters of one send request, as delivered by the external RPC surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApnsParams {
    /// Per-send expiration override in seconds; applied only when positive
    pub expired_seconds: u32,
    /// Device token; embedded whitespace and punctuation are stripped
    pub token: String,
    pub sound: String,
    /// Applied only when positive
    pub badge: i64,
    pub body: String,
    /// Extension keys; values must be scalar
    pub ext_args: HashMap<String, Value>,
}

/// Notification dispatch service.
pub struct ApnsService {
    provider: Arc<dyn ConnectionProvider>,
    fetcher: Arc<dyn FeedbackFetcher>,
    feedback_rx: Mutex<mpsc::Receiver<Option<Feedback>>>,
    default_expiry_seconds: u32,
    sequence: AtomicU32,
}

impl ApnsService {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        fetcher: Arc<dyn FeedbackFetcher>,
        feedback_rx: mpsc::Receiver<Option<Feedback>>,
        default_expiry_seconds: u32,
    ) -> Self {
        Self {
            provider,
            fetcher,
            feedback_rx: Mutex::new(feedback_rx),
            default_expiry_seconds,
            sequence: AtomicU32::new(0),
        }
    }

    /// Build, validate and transmit one notification.
    ///
    /// Success means the message was written to the transport, not that the
    /// gateway accepted it; a rejection arrives later as an error frame on
    /// the shared response channel. This method never panics the caller: the
    /// transmission path runs under a single top-level guard that converts an
    /// unexpected fault into an error result.
    pub async fn send_notification(&self, variant: PushVariant, params: ApnsParams) -> Result<()> {
        let message = self.build_message(variant, params)?;
        let identifier = message.identifier;

        let send = AssertUnwindSafe(self.transmit(message)).catch_unwind();
        let result = match send.await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_reason(panic);
                tracing::error!(
                    message_identifier = identifier,
                    reason = %reason,
                    "Send path panicked, converted to error"
                );
                Err(ApnsError::Internal(reason))
            }
        };

        if result.is_ok() {
            MESSAGES_SENT_TOTAL.inc();
        }
        result
    }

    /// Retrieve up to `limit` feedback records, bounded by `deadline`.
    ///
    /// Drains the shared feedback channel until `limit` records have been
    /// collected or the producer signals end-of-stream with a `None`
    /// sentinel. Deadline expiry is a partial success: whatever was collected
    /// is returned with `timed_out` set.
    pub async fn query_feedback(&self, limit: usize, deadline: Duration) -> Result<FeedbackBatch> {
        if limit > MAX_FEEDBACK_LIMIT {
            return Err(ApnsError::FeedbackLimit(limit));
        }

        self.fetcher.fetch(limit).await?;

        let mut rx = self.feedback_rx.lock().await;
        let deadline = tokio::time::Instant::now() + deadline;
        let mut batch = FeedbackBatch::default();

        while batch.records.len() < limit {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => {
                    batch.timed_out = true;
                    break;
                }
                // Producer side dropped, or end-of-stream sentinel
                Ok(None) | Ok(Some(None)) => break,
                Ok(Some(Some(record))) => batch.records.push(record),
            }
        }
        drop(rx);

        FEEDBACK_RECORDS_TOTAL.inc_by(batch.records.len() as u64);
        tracing::debug!(
            collected = batch.records.len(),
            limit = limit,
            timed_out = batch.timed_out,
            "Feedback query completed"
        );
        Ok(batch)
    }

    fn build_message(&self, variant: PushVariant, params: ApnsParams) -> Result<Message> {
        let badge = params.badge.clamp(0, u32::MAX as i64) as u32;
        let mut payload = Payload::new(Aps {
            alert: (!params.body.is_empty()).then(|| params.body.clone()),
            badge: (badge > 0).then_some(badge),
            sound: (!params.sound.is_empty()).then(|| params.sound.clone()),
        });
        for (key, value) in params.ext_args {
            payload.try_insert_ext(key, value)?;
        }

        let token = normalize_token(&params.token);
        let identifier = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        Ok(match variant {
            PushVariant::Simple => Message::simple(identifier, token, payload),
            PushVariant::Enhanced => {
                let seconds = if params.expired_seconds > 0 {
                    params.expired_seconds
                } else {
                    self.default_expiry_seconds
                };
                let expiration = (Utc::now().timestamp() as u32).saturating_add(seconds);
                Message::enhanced(identifier, token, payload, expiration)
            }
        })
    }

    async fn transmit(&self, mut message: Message) -> Result<()> {
        let connection = self.provider.checkout().await?;
        connection.send_message(&mut message).await
    }
}

/// Strip a device token down to its word characters, dropping embedded
/// whitespace and punctuation.
fn normalize_token(token: &str) -> String {
    WORD_RUNS
        .find_iter(token)
        .map(|m| m.as_str())
        .collect::<String>()
}

fn panic_reason(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
