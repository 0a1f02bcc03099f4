use thiserror::Error;

/// Failure of a `connect` attempt. Surfaced to the caller, who decides
/// whether to retry. A missing PONG is not an error: the link degrades.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnError {
    #[error("port {port} not found; available ports: {}", list_or_none(.available))]
    PortNotFound { port: String, available: Vec<String> },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("handshake error: {0}")]
    HandshakeError(String),
}

fn list_or_none(ports: &[String]) -> String {
    if ports.is_empty() {
        "(none)".to_string()
    } else {
        ports.join(", ")
    }
}

/// Schedule state could not be loaded or saved. Always recovered locally.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("schedule file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("schedule file is malformed: {0}")]
    Decode(#[from] toml::de::Error),
    #[error("schedule could not be encoded: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// A telemetry line matched a numeric rule but its value did not parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot parse {field} value from {line:?}")]
pub struct ParseError {
    pub field: &'static str,
    pub line: String,
}
