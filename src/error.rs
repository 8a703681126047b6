/// Error type shared by the rumble core, the sinks and the host bridge.
///
/// Nothing here is fatal to the scheduler: tick errors are logged and the loop
/// keeps running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RumbleError {
    /// Negative/NaN delta or scale, unknown channel name, bad channel parameters.
    /// State is left unchanged.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No controller is attached, or the last report could not be written.
    #[error("no controller available for rumble output")]
    ActuationUnavailable,

    /// Controller discovery or open failed.
    #[cfg(windows)]
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// A host message line could not be decoded.
    #[error("malformed host message: {0}")]
    Protocol(#[from] serde_json::Error),
}

impl RumbleError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        RumbleError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RumbleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = RumbleError::invalid("delta must be >= 0, got -1");
        assert_eq!(err.to_string(), "invalid input: delta must be >= 0, got -1");
        assert_eq!(
            RumbleError::ActuationUnavailable.to_string(),
            "no controller available for rumble output"
        );
    }

    #[cfg(windows)]
    #[test]
    fn hid_errors_keep_their_source() {
        use std::error::Error as _;
        let err: RumbleError = hidapi::HidError::HidApiError { message: "gone".into() }.into();
        assert!(matches!(err, RumbleError::Hid(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn json_errors_convert() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: RumbleError = parse.unwrap_err().into();
        assert!(matches!(err, RumbleError::Protocol(_)));
    }
}
