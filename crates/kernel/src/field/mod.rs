//! Pluggable field types for custom forms.
//!
//! A field type renders itself for the admin editor and the end-user form,
//! validates its slice of a submission, and converts the post-processed
//! result into the value handed to the persistence layer.

mod file_upload;

pub use file_upload::FileUploadField;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FieldResult, ValidationError};
use crate::file::UploadAttempt;
use crate::form::Form;

/// Per-instance configuration of one field within a form.
///
/// Built once when the field is loaded and immutable afterwards; rendering
/// and validation never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Unique field name within its form.
    pub name: String,

    /// Display label.
    pub label: String,

    /// Help text displayed beneath the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    /// Whether a value must be present after resolution. Enforced by the
    /// generic form validation pass, not by individual field types.
    #[serde(default)]
    pub required: bool,

    /// Allowed file extensions, in configuration order. Empty means no
    /// restriction.
    #[serde(default)]
    pub filetypes: Vec<String>,

    /// Display width (rendering only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
}

impl FieldConfig {
    /// Create a configuration with the given name and label.
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            help: None,
            required: false,
            filetypes: Vec::new(),
            width: None,
        }
    }

    /// Set the help text.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Mark the field required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the allowed file extensions.
    pub fn filetypes<I, S>(mut self, filetypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filetypes = filetypes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the display width.
    pub fn width(mut self, width: impl Into<String>) -> Self {
        self.width = Some(width.into());
        self
    }
}

/// Decoded form submission, provided by the surrounding HTTP layer.
///
/// Field types read their named inputs through this trait rather than an
/// ambient request object, so tests can substitute a canned submission.
pub trait FormInput: Send + Sync {
    /// Value of a named text input, if submitted.
    fn text(&self, name: &str) -> Option<&str>;

    /// Genuine uploaded file part for a named file input, if any.
    fn file(&self, name: &str) -> Option<&UploadAttempt>;
}

/// Owned form submission backed by maps. The usual [`FormInput`] carrier
/// for both production decoding layers and tests.
#[derive(Debug, Default)]
pub struct SubmittedForm {
    texts: HashMap<String, String>,
    files: HashMap<String, UploadAttempt>,
}

impl SubmittedForm {
    /// Create an empty submission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text input value.
    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.texts.insert(name.into(), value.into());
        self
    }

    /// Add an uploaded file part.
    pub fn with_file(mut self, name: impl Into<String>, attempt: UploadAttempt) -> Self {
        self.files.insert(name.into(), attempt);
        self
    }
}

impl FormInput for SubmittedForm {
    fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    fn file(&self, name: &str) -> Option<&UploadAttempt> {
        self.files.get(name)
    }
}

/// Parsed submission of a field type's settings form, in the shape the
/// field store persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSettings {
    /// Field name.
    pub name: String,

    /// Field type name.
    pub field_type: String,

    /// Help text.
    pub help: String,

    /// Whether the field is required.
    pub required: bool,

    /// Allowed file extensions.
    pub filetypes: Vec<String>,
}

/// A pluggable field type.
#[async_trait]
pub trait FieldType: Send + Sync {
    /// Machine name of this field type (e.g., "file_upload").
    fn type_name(&self) -> &'static str;

    /// Human-readable name shown when listing available field types.
    fn type_label(&self) -> &'static str;

    /// Short description shown when listing available field types.
    fn description(&self) -> &'static str;

    /// SQL column definition for values of this type.
    fn db_column(&self) -> &'static str;

    /// Render the field for the admin form, label and wrapper included.
    fn render_admin(&self, config: &FieldConfig, value: &str) -> Result<String>;

    /// Render the isolated field for the end-user form.
    fn render_frontend(&self, config: &FieldConfig, value: &str) -> Result<String>;

    /// The settings form used when adding or editing a field of this type,
    /// pre-filled from an existing configuration when editing.
    fn settings_form(&self, existing: Option<&FieldConfig>) -> Form;

    /// Parse the settings form submission back into persistable settings.
    fn parse_settings(&self, input: &dyn FormInput) -> FieldSettings;

    /// Field-specific validation, run after the generic validation pass.
    async fn validate(
        &self,
        config: &FieldConfig,
        input: &dyn FormInput,
    ) -> Result<(), ValidationError>;

    /// Resolve the submitted value into the string handed to the
    /// persistence layer.
    async fn resolve(&self, config: &FieldConfig, input: &dyn FormInput) -> FieldResult<String>;
}

/// Registry of available field types, keyed by type name.
#[derive(Default)]
pub struct FieldTypeRegistry {
    types: HashMap<&'static str, Arc<dyn FieldType>>,
}

impl FieldTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field type under its own type name.
    pub fn register(&mut self, field_type: Arc<dyn FieldType>) {
        self.types.insert(field_type.type_name(), field_type);
    }

    /// Look up a field type by name.
    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn FieldType>> {
        self.types.get(type_name)
    }

    /// List registered types as (name, label) pairs, sorted by name.
    pub fn list(&self) -> Vec<(&'static str, &'static str)> {
        let mut entries: Vec<_> = self
            .types
            .values()
            .map(|t| (t.type_name(), t.type_label()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }
}

impl std::fmt::Debug for FieldTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldTypeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}
