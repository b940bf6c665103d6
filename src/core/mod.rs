/// Core Module for dbquery
///
/// This module contains the database layer and the shared error type.
/// Everything a caller needs to run a statement lives under `core::db`.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbQueryError, Result};
