use serde::{Deserialize, Serialize};

/// One feedback record: a device token the gateway reports as undeliverable.
///
/// Tokens reported here should be pruned from future sends unless the device
/// has re-registered after `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// When the gateway determined the token was no longer deliverable
    /// (epoch seconds)
    pub timestamp: u32,
    /// The undeliverable device token, hex-encoded
    pub token: String,
}
