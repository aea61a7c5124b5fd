//! Defaults used when the configuration leaves a value out.

/// Client name announced in the `client` packet.
pub const DEFAULT_CLIENT_NAME: &str = "torchat-rs";

/// Client version announced in the `version` packet.
pub const DEFAULT_CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds a proxied dial may take before it is abandoned.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
