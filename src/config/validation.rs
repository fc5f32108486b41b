use super::models::Config;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No devices configured")]
    NoDevicesConfigured,

    #[error("Device {0} is listed more than once")]
    DuplicateDevice(u32),

    #[error("Invalid transport endpoint scheme '{endpoint}', expected 'http://' or 'https://'")]
    InvalidEndpointScheme { endpoint: String },

    #[error("Transport topic must not be empty")]
    EmptyTopic,

    #[error("Duration must be positive: {field}")]
    ZeroDuration { field: &'static str },

    #[error("cycle_timeout ({timeout}) must be shorter than the cycle interval ({interval})")]
    CycleTimeoutTooLong { timeout: String, interval: String },

    #[error("max_age ({max_age}) must be longer than the cycle interval ({interval})")]
    RetentionShorterThanInterval { max_age: String, interval: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_devices(config)?;
    validate_transport(config)?;
    validate_schedule(config)?;
    validate_retention(config)?;
    Ok(())
}

/// Ensure at least one device is polled and none twice
fn validate_devices(config: &Config) -> Result<(), ValidationError> {
    if config.devices.ids.is_empty() {
        return Err(ValidationError::NoDevicesConfigured);
    }

    let mut seen = HashSet::new();
    for id in &config.devices.ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateDevice(id.0));
        }
    }

    Ok(())
}

fn validate_transport(config: &Config) -> Result<(), ValidationError> {
    let endpoint = &config.transport.endpoint;
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(ValidationError::InvalidEndpointScheme {
            endpoint: endpoint.clone(),
        });
    }

    if config.transport.topic.trim().is_empty() {
        return Err(ValidationError::EmptyTopic);
    }

    if config.transport.publish_timeout.as_duration().is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "transport.publish_timeout",
        });
    }

    if config.transport.probe_interval.as_duration().is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "transport.probe_interval",
        });
    }

    Ok(())
}

/// A cycle must finish before the next one is due
fn validate_schedule(config: &Config) -> Result<(), ValidationError> {
    let schedule = &config.schedule;

    if schedule.interval.as_duration().is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "schedule.interval",
        });
    }

    if schedule.cycle_timeout.as_duration().is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "schedule.cycle_timeout",
        });
    }

    if schedule.cycle_timeout >= schedule.interval {
        return Err(ValidationError::CycleTimeoutTooLong {
            timeout: schedule.cycle_timeout.to_string(),
            interval: schedule.interval.to_string(),
        });
    }

    Ok(())
}

/// Readings must survive at least one cycle to get a resend attempt
fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    let max_age = config.retention.max_age;

    if max_age.as_duration().is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "retention.max_age",
        });
    }

    if max_age <= config.schedule.interval {
        return Err(ValidationError::RetentionShorterThanInterval {
            max_age: max_age.to_string(),
            interval: config.schedule.interval.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::HumanDuration;
    use crate::reading::DeviceId;

    fn create_test_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_no_devices() {
        let mut config = create_test_config();
        config.devices.ids.clear();

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::NoDevicesConfigured)));
    }

    #[test]
    fn test_duplicate_device() {
        let mut config = create_test_config();
        config.devices.ids = vec![DeviceId(7), DeviceId(8), DeviceId(7)];

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::DuplicateDevice(7))));
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = create_test_config();
        config.transport.endpoint = "mqtt://broker:1883".to_string();

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidEndpointScheme { .. })
        ));
    }

    #[test]
    fn test_empty_topic() {
        let mut config = create_test_config();
        config.transport.topic = "  ".to_string();

        assert!(matches!(validate(&config), Err(ValidationError::EmptyTopic)));
    }

    #[test]
    fn test_cycle_timeout_must_fit_interval() {
        let mut config = create_test_config();
        config.schedule.cycle_timeout = HumanDuration::from_secs(300);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::CycleTimeoutTooLong { .. })
        ));
    }

    #[test]
    fn test_zero_interval() {
        let mut config = create_test_config();
        config.schedule.interval = HumanDuration::from_secs(0);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::ZeroDuration { field: "schedule.interval" })
        ));
    }

    #[test]
    fn test_retention_shorter_than_interval() {
        let mut config = create_test_config();
        config.retention.max_age = HumanDuration::from_secs(60);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::RetentionShorterThanInterval { .. })
        ));
    }
}
