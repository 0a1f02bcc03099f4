use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("no such device: {0}")]
    NoDevice(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("serial read timeout")]
    Timeout,
    #[error("device disconnected")]
    Disconnected,
    #[error("serial: {0}")]
    Serial(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
