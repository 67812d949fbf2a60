use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApnsError, Result};

/// The `aps` dictionary of a notification payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aps {
    /// Alert text shown to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    /// Badge count for the application icon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    /// Sound file to play on delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// Notification body prior to wire encoding.
///
/// Serializes to the APNs JSON shape: the `aps` dictionary plus extension
/// keys flattened at the top level. Extension values must be scalar; nested
/// dictionaries are rejected before encoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payload {
    pub aps: Aps,
    #[serde(flatten)]
    ext: HashMap<String, Value>,
}

impl Payload {
    pub fn new(aps: Aps) -> Self {
        Self {
            aps,
            ext: HashMap::new(),
        }
    }

    /// Add an extension key. Fails if the value is itself a mapping.
    pub fn try_insert_ext(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if value.is_object() {
            return Err(ApnsError::NestedPayload(key));
        }
        self.ext.insert(key, value);
        Ok(())
    }

    pub fn ext(&self, key: &str) -> Option<&Value> {
        self.ext.get(key)
    }

    pub fn ext_len(&self) -> usize {
        self.ext.len()
    }
}
