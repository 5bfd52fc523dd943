use thiserror::Error;

/// TermLink unified error type
#[derive(Error, Debug)]
pub enum TermLinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Transport write side closed")]
    SinkClosed,
}

pub type TermLinkResult<T> = Result<T, TermLinkError>;
