use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Queue capacity is at least 1
/// - Backoff range is not inverted
/// - Resolver pool floor is at least 1
/// - Maximum hostname length is at least 1
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.queue.capacity == 0 {
        return Err(ConfigError::ValidationError(
            "queue.capacity must be at least 1".to_string(),
        ));
    }

    let backoff = &config.queue.backoff;
    if backoff.max_micros < backoff.min_micros {
        return Err(ConfigError::ValidationError(format!(
            "queue.backoff.max_micros ({}) is below min_micros ({})",
            backoff.max_micros, backoff.min_micros
        )));
    }

    if config.workers.min_resolver_threads == 0 {
        return Err(ConfigError::ValidationError(
            "workers.min_resolver_threads must be at least 1".to_string(),
        ));
    }

    if config.input.max_name_length == 0 {
        return Err(ConfigError::ValidationError(
            "input.max_name_length must be at least 1".to_string(),
        ));
    }

    Ok(())
}
