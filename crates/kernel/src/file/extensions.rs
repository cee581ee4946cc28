//! Per-field whitelist of acceptable file extensions.

use serde::{Deserialize, Serialize};

/// Ordered set of allowed file extensions for one field instance.
///
/// Extensions are lowercased and deduplicated at construction. An empty
/// registry places no restriction on uploads: extension filtering is opt-in,
/// the obfuscated on-disk filename is the actual safety mechanism against
/// execution of uploaded content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionRegistry {
    extensions: Vec<String>,
}

impl ExtensionRegistry {
    /// Build a registry from configured extensions.
    ///
    /// Filetype naming for JPEG images is inconsistent in the wild, so a
    /// registry listing "jpg" also accepts "jpeg" and vice versa. The
    /// counterpart is added once here, at normalization time.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().to_lowercase();
            if !ext.is_empty() && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }

        if normalized.iter().any(|e| e.as_str() == "jpg") {
            if !normalized.iter().any(|e| e.as_str() == "jpeg") {
                normalized.push("jpeg".to_string());
            }
        } else if normalized.iter().any(|e| e.as_str() == "jpeg") {
            normalized.push("jpg".to_string());
        }

        Self {
            extensions: normalized,
        }
    }

    /// Parse a space-separated extension list as entered in the field
    /// settings form (e.g. `"jpg gif pdf"`).
    pub fn parse(input: &str) -> Self {
        Self::new(input.split_whitespace())
    }

    /// Whether the given extension is acceptable. Matching is
    /// case-insensitive; an empty registry allows everything.
    pub fn is_allowed(&self, extension: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let extension = extension.to_lowercase();
        self.extensions.iter().any(|e| *e == extension)
    }

    /// Whether any restriction is configured.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// The normalized extension list, in configuration order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

/// Extract the extension from a client-supplied filename: the substring
/// after the last `.`, lowercased. `None` when the name has no extension.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        let registry = ExtensionRegistry::parse("jpg pdf");
        assert_eq!(registry.is_allowed("JPG"), registry.is_allowed("jpg"));
        assert!(registry.is_allowed("PDF"));
        assert!(!registry.is_allowed("exe"));
    }

    #[test]
    fn test_empty_allows_everything() {
        let registry = ExtensionRegistry::parse("");
        assert!(registry.is_empty());
        assert!(registry.is_allowed("exe"));
        assert!(registry.is_allowed(""));
    }

    #[test]
    fn test_jpg_implies_jpeg() {
        let registry = ExtensionRegistry::new(["jpg"]);
        assert!(registry.is_allowed("jpeg"));
        assert!(registry.is_allowed("jpg"));
    }

    #[test]
    fn test_jpeg_implies_jpg() {
        let registry = ExtensionRegistry::new(["jpeg"]);
        assert!(registry.is_allowed("jpg"));
        assert!(registry.is_allowed("jpeg"));
    }

    #[test]
    fn test_both_present_no_duplicates() {
        let registry = ExtensionRegistry::new(["jpg", "jpeg"]);
        assert_eq!(registry.extensions(), ["jpg", "jpeg"]);
    }

    #[test]
    fn test_normalization_preserves_order() {
        let registry = ExtensionRegistry::parse("PDF doc Doc");
        assert_eq!(registry.extensions(), ["pdf", "doc"]);
    }

    #[test]
    fn test_non_jpeg_sets_untouched() {
        let registry = ExtensionRegistry::new(["png", "gif"]);
        assert_eq!(registry.extensions(), ["png", "gif"]);
        assert!(!registry.is_allowed("jpeg"));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("resume.doc"), Some("doc".to_string()));
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
    }
}
