use std::io;

#[derive(Debug, thiserror::Error)]
pub enum EarshotError {
    #[error("audio error: {0}")]
    Audio(String),

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EarshotError>;
