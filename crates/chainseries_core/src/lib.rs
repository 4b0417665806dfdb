//! Core functionality for chain series collection
//! Contains shared types, the read/storage/warehouse traits, and series and window arithmetic

pub mod traits;
pub mod types;
pub mod impls;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;


pub use traits::*;
pub use types::*;
pub use impls::*;
