//! Error types for the archive subsystem.
//!
//! `ArchiveError` enumerates the failure modes of export and import;
//! `CoreError` is the kind-classified boundary error handed to callers
//! (HTTP or UI layers map its kind to a status).

mod archive_error;
mod core_error;

pub use archive_error::ArchiveError;
pub use core_error::{CoreError, CoreErrorKind};

pub type CoreResult<T> = Result<T, CoreError>;
