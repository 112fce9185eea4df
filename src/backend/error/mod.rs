/**
 * Backend Error Module
 *
 * Error types for the backend server and their HTTP conversions.
 */

pub mod conversion;
pub mod types;

pub use types::BackendError;
