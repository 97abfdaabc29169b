pub mod color;
pub mod editor;
pub mod error;
pub mod subprocess;
pub mod term;

// Re-export core types at crate root for convenience
pub use bstr::{BStr, BString, ByteSlice, ByteVec};
pub use error::UtilError;

pub type Result<T> = std::result::Result<T, UtilError>;
