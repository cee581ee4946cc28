//! File-upload field type.
//!
//! Stores a single uploaded file in the managed directory and persists its
//! application-relative path. A hidden companion input named
//! `<field>_uploaded` echoes the current stored value so that editing a
//! record without choosing a new file keeps the existing one.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tera::Tera;
use tracing::debug;

use crate::error::{FieldResult, ValidationError};
use crate::field::{FieldConfig, FieldSettings, FieldType, FormInput};
use crate::file::{ExtensionRegistry, UploadAttempt, UploadStore};
use crate::form::{Form, FormElement};

const ADMIN_TEMPLATE: &str = "field/file-admin.html";
const FRONTEND_TEMPLATE: &str = "field/file-frontend.html";

const DEFAULT_WIDTH: &str = "275px";

const FILETYPES_HELP: &str = "Enter the filetypes (e.g., \"jpg\", \"gif\", \"pdf\", and \"doc\") \
    that can be uploaded here. Though not a foolproof mechanism for validating filetypes, \
    validating the file extension will help make sure people upload proper files here. If someone \
    does upload a malicious file by renaming the file, the file will still be non-executable as \
    all filenames are encrypted and securely stored.";

const HELP_HELP: &str = "This help text will be displayed beneath the field. Use it to guide the \
    user in responding correctly.";

const REQUIRED_HELP: &str = "If checked, a file must be uploaded here for the form to be \
    processed.";

/// The file-upload field type.
pub struct FileUploadField {
    store: Arc<dyn UploadStore>,
    templates: Tera,
}

impl FileUploadField {
    /// Create the field type backed by the given upload store.
    pub fn new(store: Arc<dyn UploadStore>) -> Result<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates([
                (
                    ADMIN_TEMPLATE,
                    include_str!("../../templates/field/file-admin.html"),
                ),
                (
                    FRONTEND_TEMPLATE,
                    include_str!("../../templates/field/file-frontend.html"),
                ),
            ])
            .context("failed to load file-upload field templates")?;

        Ok(Self { store, templates })
    }

    /// Name of the hidden input carrying the previously stored value.
    fn carrier_name(config: &FieldConfig) -> String {
        format!("{}_uploaded", config.name)
    }

    fn registry(config: &FieldConfig) -> ExtensionRegistry {
        ExtensionRegistry::new(&config.filetypes)
    }

    /// Check one upload attempt against the field's extension whitelist.
    ///
    /// Pure: reads only the attempt's metadata, never the filesystem.
    fn check_attempt(config: &FieldConfig, attempt: &UploadAttempt) -> Result<(), ValidationError> {
        let registry = Self::registry(config);
        let extension = attempt.extension().unwrap_or_default();

        if registry.is_allowed(&extension) {
            Ok(())
        } else {
            Err(ValidationError::DisallowedFiletype {
                label: config.label.clone(),
            })
        }
    }

    fn render(&self, template: &str, config: &FieldConfig, value: &str) -> Result<String> {
        let mut context = tera::Context::new();
        context.insert("name", &config.name);
        context.insert("label", &config.label);
        context.insert("value", value);
        context.insert("help", &config.help);
        context.insert("width", config.width.as_deref().unwrap_or(DEFAULT_WIDTH));
        context.insert("classes", &css_classes(config));

        self.templates
            .render(template, &context)
            .with_context(|| format!("failed to render {template}"))
    }
}

#[async_trait]
impl FieldType for FileUploadField {
    fn type_name(&self) -> &'static str {
        "file_upload"
    }

    fn type_label(&self) -> &'static str {
        "File Upload"
    }

    fn description(&self) -> &'static str {
        "Upload a file."
    }

    fn db_column(&self) -> &'static str {
        "VARCHAR(150)"
    }

    fn render_admin(&self, config: &FieldConfig, value: &str) -> Result<String> {
        self.render(ADMIN_TEMPLATE, config, value)
    }

    fn render_frontend(&self, config: &FieldConfig, value: &str) -> Result<String> {
        self.render(FRONTEND_TEMPLATE, config, value)
    }

    fn settings_form(&self, existing: Option<&FieldConfig>) -> Form {
        let mut filetypes = FormElement::textfield()
            .title("Allowed Filetypes")
            .description(FILETYPES_HELP)
            .weight(10);

        let mut help = FormElement::textarea(4)
            .title("Help Text")
            .description(HELP_HELP)
            .weight(20);

        let mut required = FormElement::checkbox()
            .title("Required Field")
            .description(REQUIRED_HELP)
            .weight(30);

        if let Some(config) = existing {
            filetypes = filetypes.default_value(config.filetypes.join(" "));
            if let Some(text) = &config.help {
                help = help.default_value(text.clone());
            }
            required = required.default_value(config.required);
        }

        Form::new("field_settings_file_upload")
            .element("filetypes", filetypes)
            .element("help", help)
            .element("required", required)
    }

    fn parse_settings(&self, input: &dyn FormInput) -> FieldSettings {
        let filetypes = input
            .text("filetypes")
            .unwrap_or_default()
            .split_whitespace()
            .map(ToString::to_string)
            .collect();

        FieldSettings {
            name: input.text("name").unwrap_or_default().to_string(),
            field_type: input.text("type").unwrap_or(self.type_name()).to_string(),
            help: input.text("help").unwrap_or_default().to_string(),
            required: input
                .text("required")
                .is_some_and(|v| !v.is_empty() && v != "0"),
            filetypes,
        }
    }

    async fn validate(
        &self,
        config: &FieldConfig,
        input: &dyn FormInput,
    ) -> Result<(), ValidationError> {
        // Required-ness is the generic validation pass's concern; with no
        // file part there is nothing for this field type to check.
        match input.file(&config.name) {
            Some(attempt) => Self::check_attempt(config, attempt),
            None => Ok(()),
        }
    }

    async fn resolve(&self, config: &FieldConfig, input: &dyn FormInput) -> FieldResult<String> {
        // Exactly one of three branches, in priority order. A rejected
        // upload returns the error: falling through would silently erase a
        // previously stored file.
        if let Some(attempt) = input.file(&config.name) {
            Self::check_attempt(config, attempt)?;
            let stored = self.store.store(attempt).await?;
            debug!(field = %config.name, path = %stored, "field upload stored");
            return Ok(stored);
        }

        let previous = input
            .text(&Self::carrier_name(config))
            .filter(|v| !v.is_empty());
        if let Some(previous) = previous {
            // Edit without re-upload: keep the existing file untouched.
            return Ok(previous.to_string());
        }

        Ok(String::new())
    }
}

impl std::fmt::Debug for FileUploadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUploadField").finish()
    }
}

/// CSS classes for the rendered input.
fn css_classes(config: &FieldConfig) -> String {
    if config.required {
        "required file text".to_string()
    } else {
        "file text".to_string()
    }
}
