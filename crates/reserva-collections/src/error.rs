use reserva_core::ArenaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VecError {
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

pub type Result<T> = std::result::Result<T, VecError>;
