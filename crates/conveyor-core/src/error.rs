use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    #[error("Invalid value for setting {key}: {value:?}")]
    InvalidSetting { key: String, value: String },

    // State errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Command errors
    #[error("Unknown output device: {0}")]
    UnknownDevice(String),

    #[error("Unsupported action {action} for device {device}")]
    UnsupportedAction { device: String, action: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid-setting error for `key` holding `value`.
    pub fn invalid_setting(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_setting_display() {
        let error = Error::invalid_setting("batch_target", "abc");
        assert_eq!(
            error.to_string(),
            "Invalid value for setting batch_target: \"abc\""
        );
    }

    #[test]
    fn test_transition_display() {
        let error = Error::InvalidStateTransition {
            from: "Waiting".to_string(),
            to: "Counting".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid state transition from Waiting to Counting"
        );
    }
}
