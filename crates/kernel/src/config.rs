//! Configuration loaded from environment variables.

use std::env;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// Form-builder configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application root; stored file paths are expressed relative to it
    /// (default: ".").
    pub app_root: PathBuf,

    /// Managed directory for field uploads. Required: a field type that
    /// stores files is unusable without it.
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let app_root = env::var("APP_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .context("UPLOADS_DIR environment variable is required")?;

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/files".to_string());

        Ok(Self {
            app_root,
            uploads_dir,
            files_url,
        })
    }

    /// The uploads directory re-expressed relative to the application root,
    /// slash-separated, suitable as the prefix of a stored value.
    pub fn upload_prefix(&self) -> String {
        let relative = self
            .uploads_dir
            .strip_prefix(&self.app_root)
            .unwrap_or(&self.uploads_dir);
        path_to_prefix(relative)
    }
}

/// Join a path's normal components with forward slashes.
fn path_to_prefix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_prefix_strips_app_root() {
        let config = Config {
            app_root: PathBuf::from("/srv/app"),
            uploads_dir: PathBuf::from("/srv/app/uploads/custom_fields"),
            files_url: "/files".to_string(),
        };
        assert_eq!(config.upload_prefix(), "uploads/custom_fields");
    }

    #[test]
    fn test_upload_prefix_outside_app_root() {
        let config = Config {
            app_root: PathBuf::from("/srv/app"),
            uploads_dir: PathBuf::from("uploads"),
            files_url: "/files".to_string(),
        };
        assert_eq!(config.upload_prefix(), "uploads");
    }
}
