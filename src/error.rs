// src/error.rs
//
// Error types shared by the scheduler, the practice engine and the config
// loader.

use std::fmt;

/// Error returned by engine operations that can actually fail.
///
/// Out-of-range tempo, subdivision and practice inputs are not errors here:
/// they are clamped at the setter and logged.
#[derive(Debug)]
pub enum EngineError {
    /// The platform clock or audio device could not be acquired or resumed.
    AudioUnavailable { reason: String },

    /// A configuration document could not be read.
    ConfigIo { path: String, source: std::io::Error },

    /// A configuration document was not valid JSON for the expected shape.
    ConfigParse { source: serde_json::Error },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AudioUnavailable { reason } => {
                write!(f, "Audio clock unavailable: {}", reason)
            }
            EngineError::ConfigIo { path, source } => {
                write!(f, "Failed to read config {}: {}", path, source)
            }
            EngineError::ConfigParse { source } => {
                write!(f, "Invalid config document: {}", source)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::AudioUnavailable { .. } => None,
            EngineError::ConfigIo { source, .. } => Some(source),
            EngineError::ConfigParse { source } => Some(source),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(source: serde_json::Error) -> Self {
        EngineError::ConfigParse { source }
    }
}

/// Result of engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure raised by an observer hook or a renderer.
///
/// These never propagate: the caller logs and discards them.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single hook or render call.
pub type HookResult = Result<(), HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_unavailable_message() {
        let err = EngineError::AudioUnavailable {
            reason: "device busy".into(),
        };
        assert_eq!(err.to_string(), "Audio clock unavailable: device busy");
    }

    #[test]
    fn test_parse_error_has_source() {
        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: EngineError = parse.into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
