use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Path to the PEM client certificate
    #[serde(default)]
    pub cert_path: String,
    /// Path to the PEM client private key
    #[serde(default)]
    pub key_path: String,
    /// Transport-level dial timeout in seconds
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: u64,
    /// Outer dial-plus-handshake budget in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Whether a write failure closes the connection (a read failure
    /// always does)
    #[serde(default)]
    pub close_on_write_failure: bool,
    /// Capacity of the shared error-response channel
    #[serde(default = "default_response_capacity")]
    pub response_channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_host")]
    pub host: String,
    #[serde(default = "default_feedback_port")]
    pub port: u16,
    /// Capacity of the shared feedback channel
    #[serde(default = "default_feedback_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Default expiration for enhanced sends, in seconds
    #[serde(default = "default_expiry_seconds")]
    pub default_expiry_seconds: u32,
}

fn default_gateway_host() -> String {
    "gateway.push.apple.com".to_string()
}

fn default_gateway_port() -> u16 {
    2195
}

fn default_feedback_host() -> String {
    "feedback.push.apple.com".to_string()
}

fn default_feedback_port() -> u16 {
    2196
}

fn default_dial_timeout() -> u64 {
    30
}

fn default_handshake_timeout() -> u64 {
    60
}

fn default_response_capacity() -> usize {
    100
}

fn default_feedback_capacity() -> usize {
    1000
}

fn default_expiry_seconds() -> u32 {
    6 * 3600
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // GATEWAY_HOST, GATEWAY_CERT_PATH, PUSH_DEFAULT_EXPIRY_SECONDS, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn gateway_endpoint(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    pub fn feedback_endpoint(&self) -> String {
        format!("{}:{}", self.feedback.host, self.feedback.port)
    }
}

impl GatewayConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            cert_path: String::new(),
            key_path: String::new(),
            dial_timeout_secs: default_dial_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            close_on_write_failure: false,
            response_channel_capacity: default_response_capacity(),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            host: default_feedback_host(),
            port: default_feedback_port(),
            channel_capacity: default_feedback_capacity(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            default_expiry_seconds: default_expiry_seconds(),
        }
    }
}
