use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("allocation size must be greater than zero")]
    InvalidSize,

    #[error("invalid alignment {0}: must be a nonzero power of two")]
    InvalidAlignment(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("out of memory: requested {requested} bytes with {available} available")]
    OutOfMemory { requested: usize, available: usize },

    #[error("virtual memory operation failed: {0}")]
    Platform(#[from] std::io::Error),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, ArenaError>;
