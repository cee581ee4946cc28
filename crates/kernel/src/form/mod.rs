//! Declarative form definitions.
//!
//! Field types describe their settings editor as a [`Form`] of typed
//! elements; the surrounding framework renders the structure and posts the
//! submission back for parsing.

mod types;

pub use types::{ElementType, Form, FormElement};
