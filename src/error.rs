use thiserror::Error;

/// Errors that can occur while fetching a snapshot from the data source
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Data source returned status {0}")]
    UnexpectedStatus(u16),

    #[error("Failed to decode snapshot: {0}")]
    DecodeError(String),
}

/// Errors that can occur when delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    UnexpectedStatus(u16),
}

/// Reasons an entity record in a snapshot cannot be evaluated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not numeric: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display() {
        assert_eq!(
            RecordError::MissingField("cooldown").to_string(),
            "missing field `cooldown`"
        );
        assert_eq!(
            RecordError::InvalidField {
                field: "lastDeath",
                value: "\"soon\"".to_string()
            }
            .to_string(),
            "field `lastDeath` is not numeric: \"soon\""
        );
    }

    #[test]
    fn test_status_errors_display() {
        assert_eq!(
            FetchError::UnexpectedStatus(503).to_string(),
            "Data source returned status 503"
        );
        assert_eq!(
            NotifyError::UnexpectedStatus(429).to_string(),
            "Webhook returned status 429"
        );
    }

    #[test]
    fn test_config_error_from_toml() {
        let err: ConfigError = toml::from_str::<toml::Value>("[source").unwrap_err().into();
        assert!(matches!(err, ConfigError::TomlError(_)));
        assert!(err.to_string().starts_with("TOML parse error"));
    }
}
