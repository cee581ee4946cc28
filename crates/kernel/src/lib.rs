//! Campo Form-Builder Kernel
//!
//! Field-type plumbing for custom forms: per-field configuration, the
//! pluggable [`field::FieldType`] seam, upload validation and storage, and
//! the declarative form definitions used by the field settings editor.

pub mod config;
pub mod error;
pub mod field;
pub mod file;
pub mod form;
