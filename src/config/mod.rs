//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, BRIDGE_* env overrides)
//!     → validation.rs (semantic checks)
//!     → BridgeConfig (validated, immutable)
//!     → handed to the bridge and the HTTP layer at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_default, ConfigError, IgnoredOverride, LoadedConfig};
pub use schema::{
    BridgeConfig, HeartbeatConfig, ListenerConfig, ObservabilityConfig, ReconnectConfig,
    RequestConfig, RetryConfig, SecurityConfig, SweepConfig, UpstreamConfig,
};
