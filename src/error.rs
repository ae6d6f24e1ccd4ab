//! Error types for the tempopitch crate.

use thiserror::Error;

/// Errors reported by the stream processor and its settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StretchError {
    /// Channel count or sample rate has not been set yet.
    #[error("stream not configured: channel count and sample rate must be set first")]
    NotConfigured,
    /// A ratio, setting value or buffer shape was out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The numeric setting id is not recognised.
    #[error("unknown setting id: {0}")]
    UnknownSetting(i32),
}

impl StretchError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StretchError::InvalidParameter(msg.into())
    }
}

impl From<serde_json::Error> for StretchError {
    fn from(err: serde_json::Error) -> Self {
        StretchError::InvalidParameter(format!("settings JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert!(StretchError::NotConfigured.to_string().contains("not configured"));
        assert!(StretchError::UnknownSetting(42).to_string().contains("42"));
        let err = StretchError::invalid("tempo must be positive");
        assert_eq!(err.to_string(), "invalid parameter: tempo must be positive");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: StretchError = json_err.into();
        assert!(matches!(err, StretchError::InvalidParameter(_)));
    }
}
