//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs and value ranges (timeouts > 0, multipliers >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "rpc.url", &config.rpc.url, &["http", "https"]);
    check_url(&mut errors, "graphql.url", &config.graphql.url, &["http", "https"]);
    check_url(&mut errors, "monitor.ws_url", &config.monitor.ws_url, &["ws", "wss"]);

    let positive = [
        ("bridge.info_timeout_ms", config.bridge.info_timeout_ms),
        ("bridge.sign_timeout_ms", config.bridge.sign_timeout_ms),
        ("bridge.transaction_timeout_ms", config.bridge.transaction_timeout_ms),
        ("rpc.timeout_secs", config.rpc.timeout_secs),
        ("graphql.timeout_secs", config.graphql.timeout_secs),
        ("graphql.page_size", u64::from(config.graphql.page_size)),
        ("confirmation.max_attempts", u64::from(config.confirmation.max_attempts)),
        ("monitor.reconnect_initial_ms", config.monitor.reconnect_initial_ms),
        ("monitor.dedup_capacity", config.monitor.dedup_capacity as u64),
        ("reconciler.interval_secs", config.reconciler.interval_secs),
        ("reconciler.overlay_capacity", config.reconciler.overlay_capacity as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    let multipliers = [
        ("transactions.result_multiplier", config.transactions.result_multiplier),
        ("confirmation.multiplier", config.confirmation.multiplier),
        ("monitor.reconnect_multiplier", config.monitor.reconnect_multiplier),
    ];
    for (field, value) in multipliers {
        if !value.is_finite() || value < 1.0 {
            errors.push(ValidationError::new(field, "must be a finite number >= 1.0"));
        }
    }

    if config.confirmation.max_delay_ms < config.confirmation.initial_delay_ms {
        errors.push(ValidationError::new(
            "confirmation.max_delay_ms",
            "must not be below confirmation.initial_delay_ms",
        ));
    }
    if config.monitor.reconnect_max_ms < config.monitor.reconnect_initial_ms {
        errors.push(ValidationError::new(
            "monitor.reconnect_max_ms",
            "must not be below monitor.reconnect_initial_ms",
        ));
    }

    for (field, contract) in [
        ("confirmation.contract", &config.confirmation.contract),
        ("monitor.contract", &config.monitor.contract),
        ("reconciler.contract", &config.reconciler.contract),
        ("actions.contract", &config.actions.contract),
        ("actions.default_token_contract", &config.actions.default_token_contract),
    ] {
        if contract.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, raw: &str, schemes: &[&str]) {
    match Url::parse(raw) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}', expected one of {:?}", url.scheme(), schemes),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}
