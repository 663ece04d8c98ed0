//! Arena-backed vectors.
//!
//! Two vector types over `reserva-core`'s bump arena:
//! - [`ArenaVec`]: borrows a caller-supplied arena
//! - [`OwnedArenaVec`]: owns a private arena, released on drop
//!
//! Growth re-bumps the arena and copies; old regions stay allocated until
//! the arena itself is reset or dropped.

pub mod error;
mod raw;
pub mod owned;
pub mod vec;

pub use error::{Result, VecError};
pub use owned::OwnedArenaVec;
pub use vec::ArenaVec;
