//! Upload handling: extension whitelisting and storage backends.

mod extensions;
mod storage;

pub use extensions::{ExtensionRegistry, file_extension};
pub use storage::{LocalUploadStore, UploadAttempt, UploadStore};
