use async_trait::async_trait;

use crate::entry::Feedback;
use crate::error::Result;

/// Triggers a pull of up to `limit` feedback records from the feedback
/// service. Records arrive asynchronously on the shared feedback channel as
/// `Some(record)`, terminated by a `None` end-of-stream sentinel.
#[async_trait]
pub trait FeedbackFetcher: Send + Sync {
    async fn fetch(&self, limit: usize) -> Result<()>;
}

/// Result of one feedback query.
#[derive(Debug, Clone, Default)]
pub struct FeedbackBatch {
    /// Records collected, in receipt order
    pub records: Vec<Feedback>,
    /// True when the deadline expired before `limit` records or the
    /// end-of-stream sentinel arrived; `records` holds what was collected
    pub timed_out: bool,
}
