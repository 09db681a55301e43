//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → sections handed to each component at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, parse_config, ConfigError};
pub use schema::{
    ActionsConfig, BridgeConfig, ClientConfig, ConfirmationConfig, GraphQlConfig, MonitorConfig,
    ObservabilityConfig, ReconcilerConfig, RpcConfig, TransactionConfig,
};
