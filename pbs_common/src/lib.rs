mod cents;
pub mod helpers;
pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, MAX_DOLLARS};
pub use secret::Secret;
