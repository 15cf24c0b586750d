//! Error types for simulator initialization and runtime failures.

use std::fmt;
use std::io;

/// Errors raised while building or running a simulation.
///
/// Every variant is fatal: initialization errors are reported before the
/// first dispatch step, and runtime thread-creation failures terminate the
/// simulation.
#[derive(Debug)]
pub enum SimError {
    /// A configuration, metadata, or log file could not be opened.
    ConfigIo { path: String, source: io::Error },
    /// Structural problem in the configuration file (missing header or
    /// footer, unparseable line).
    ConfigFormat(String),
    /// A recognized configuration option was never given a value.
    ConfigMissing(String),
    /// A configuration value is out of range or unrecognized.
    ConfigValue(String),
    /// A metadata token does not match the event grammar.
    MetadataSyntax(String),
    /// A well-formed metadata event is invalid where it appears in the
    /// stream.
    MetadataSemantic(String),
    /// A thread or synchronization primitive could not be created.
    ResourceInit(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::ConfigIo { path, source } => {
                write!(f, "unable to open {path}: {source}")
            }
            SimError::ConfigFormat(msg) => write!(f, "{msg}"),
            SimError::ConfigMissing(label) => {
                write!(f, "{label:?} config option is not initialized")
            }
            SimError::ConfigValue(msg) => write!(f, "{msg}"),
            SimError::MetadataSyntax(msg) => write!(f, "{msg}"),
            SimError::MetadataSemantic(msg) => write!(f, "{msg}"),
            SimError::ResourceInit(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::ConfigIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_path_and_cause() {
        let err = SimError::ConfigIo {
            path: "missing.conf".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing.conf"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_missing_option_names_the_label() {
        let err = SimError::ConfigMissing("Processor cycle time (msec)".into());
        assert!(err.to_string().contains("Processor cycle time (msec)"));
    }
}
