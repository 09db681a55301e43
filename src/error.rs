//! Crate-level error type.

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::chain::ChainError;
use crate::config::ConfigError;
use crate::monitor::MonitorError;
use crate::state::{ActionError, StateError};

/// Any failure surfaced by the client core.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
