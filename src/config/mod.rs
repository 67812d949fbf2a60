mod settings;

pub use settings::{FeedbackConfig, GatewayConfig, PushConfig, Settings};
