//! Upload storage backends.
//!
//! Writes accepted uploads into the managed directory under generated,
//! non-guessable names and hands back the application-relative path that
//! becomes the field's stored value.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::file::extensions::file_extension;

/// How many fresh names to try when a generated name already exists on disk.
const NAME_ATTEMPTS: u32 = 8;

/// A genuine file part received with the current submission.
///
/// The client-supplied filename is kept only to derive the extension; it is
/// never used to name anything on disk.
#[derive(Debug, Clone)]
pub struct UploadAttempt {
    original_filename: String,
    data: Vec<u8>,
}

impl UploadAttempt {
    /// Create an attempt from a decoded multipart file part.
    pub fn new(original_filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            original_filename: original_filename.into(),
            data,
        }
    }

    /// The client-supplied filename.
    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    /// Lowercased extension of the client-supplied filename, if any.
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.original_filename)
    }

    /// The buffered upload body.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Storage backend for field uploads.
///
/// An explicit collaborator rather than ambient state so field types can be
/// exercised against a fake in tests.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Persist an accepted upload and return its application-relative path.
    async fn store(&self, attempt: &UploadAttempt) -> Result<String, StorageError>;

    /// Check whether a previously stored path still exists.
    async fn exists(&self, relative: &str) -> Result<bool, StorageError>;

    /// Delete a stored file.
    async fn delete(&self, relative: &str) -> Result<(), StorageError>;

    /// Public URL for a stored path.
    fn public_url(&self, relative: &str) -> String;
}

/// Local filesystem storage under the managed uploads directory.
pub struct LocalUploadStore {
    /// Absolute (or process-relative) path of the managed directory.
    base_path: PathBuf,
    /// Application-relative prefix recorded in stored values.
    prefix: String,
    /// Base URL for public file access.
    base_url: String,
}

impl LocalUploadStore {
    /// Create a new local upload store.
    pub fn new(
        base_path: impl Into<PathBuf>,
        prefix: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            base_url: base_url.into(),
        }
    }

    /// Build from loaded configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.uploads_dir.clone(),
            config.upload_prefix(),
            config.files_url.clone(),
        )
    }

    /// Generate a destination filename for one attempt.
    ///
    /// The name is a UUIDv7 simple encoding, unguessable and unique across
    /// concurrent writers. The original extension is retained (sanitized) so
    /// static file servers can infer the MIME type; everything else about
    /// the client filename is discarded.
    fn generate_name(extension: Option<&str>) -> String {
        let id = uuid::Uuid::now_v7().simple();
        match extension.map(sanitize_extension) {
            Some(ext) if !ext.is_empty() => format!("{id}.{ext}"),
            _ => id.to_string(),
        }
    }

    /// Resolve a stored relative path to an on-disk path.
    ///
    /// Rejects paths outside the configured prefix and any `..` components:
    /// stored values come back from a hidden form field and cross a trust
    /// boundary on the way in.
    fn disk_path(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let trimmed = relative.trim_start_matches('/');
        let under_prefix = strip_path_prefix(trimmed, &self.prefix).unwrap_or(trimmed);

        for component in Path::new(under_prefix).components() {
            if matches!(component, Component::ParentDir) {
                return Err(StorageError::WriteFailed(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "directory traversal not allowed in stored path",
                )));
            }
        }

        Ok(self.base_path.join(under_prefix))
    }
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    async fn store(&self, attempt: &UploadAttempt) -> Result<String, StorageError> {
        // Shard by year/month so the managed directory stays browsable.
        let now = chrono::Utc::now();
        let shard = format!("{}/{}", now.format("%Y"), now.format("%m"));

        let dir = self.base_path.join(&shard);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::DirectoryUnwritable {
                path: dir.clone(),
                source,
            })?;

        let extension = attempt.extension();

        let (file, name, path) =
            create_exclusive(&dir, || Self::generate_name(extension.as_deref())).await?;

        write_upload(file, &path, attempt.data()).await?;

        let relative = if self.prefix.is_empty() {
            format!("{shard}/{name}")
        } else {
            format!("{}/{shard}/{name}", self.prefix)
        };

        debug!(
            path = %relative,
            size = attempt.data().len(),
            "upload stored"
        );

        Ok(relative)
    }

    async fn exists(&self, relative: &str) -> Result<bool, StorageError> {
        let path = self.disk_path(relative)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let path = self.disk_path(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "stored file deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "stored file not found for deletion");
                Ok(())
            }
            Err(source) => Err(StorageError::WriteFailed(source)),
        }
    }

    fn public_url(&self, relative: &str) -> String {
        let path = strip_path_prefix(relative, &self.prefix).unwrap_or(relative);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl std::fmt::Debug for LocalUploadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUploadStore")
            .field("base_path", &self.base_path)
            .field("prefix", &self.prefix)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Strip `prefix` from `value` only on a path-component boundary, so a
/// prefix of `uploads/custom_fields` does not match
/// `uploads/custom_fieldsX/...`.
fn strip_path_prefix<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(value);
    }
    let rest = value.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

/// Open a uniquely named destination in `dir` with create-exclusive
/// semantics, keeping concurrent writers collision-safe without locks.
///
/// On the (vanishingly rare) name collision, asks `next_name` for a fresh
/// one rather than overwriting.
async fn create_exclusive<F>(
    dir: &Path,
    mut next_name: F,
) -> Result<(fs::File, String, PathBuf), StorageError>
where
    F: FnMut() -> String,
{
    let mut attempts = 0;
    loop {
        let name = next_name();
        let path = dir.join(&name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, name, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                attempts += 1;
                if attempts >= NAME_ATTEMPTS {
                    return Err(StorageError::WriteFailed(e));
                }
                debug!(path = %path.display(), "generated name collided, retrying");
            }
            Err(source) => return Err(StorageError::WriteFailed(source)),
        }
    }
}

/// Write the upload body through to disk.
///
/// On failure the partial file at `path` is removed before the error is
/// returned, so a returned path never references a half-written file.
async fn write_upload<W>(mut writer: W, path: &Path, data: &[u8]) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let result = async {
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    }
    .await;

    drop(writer);

    if let Err(source) = result {
        if let Err(e) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove partial upload");
        }
        return Err(StorageError::WriteFailed(source));
    }

    Ok(())
}

/// Keep only characters safe in a generated filename's extension.
fn sanitize_extension(extension: &str) -> String {
    extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(10)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::ops::Deref;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// RAII guard for test directories. Automatically removes the directory
    /// on drop, guaranteeing cleanup even if the test panics.
    struct TestDir(PathBuf);

    impl TestDir {
        fn new(name: &str) -> Self {
            let n = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir()
                .join(format!("campo_test_{name}_{n}_{}", std::process::id()));
            // Remove leftovers from a previous run, if any
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }
    }

    impl Deref for TestDir {
        type Target = Path;
        fn deref(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn store_in(dir: &Path) -> LocalUploadStore {
        LocalUploadStore::new(dir.to_path_buf(), "uploads/custom_fields", "/files")
    }

    #[tokio::test]
    async fn test_store_returns_relative_path() {
        let dir = TestDir::new("store");
        let store = store_in(&dir);

        let attempt = UploadAttempt::new("resume.doc", b"contents".to_vec());
        let relative = store.store(&attempt).await.unwrap();

        assert!(relative.starts_with("uploads/custom_fields/"));
        assert!(relative.ends_with(".doc"));
        assert!(!relative.contains(".."));
        assert!(!relative.contains("resume"));
        assert!(store.exists(&relative).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_writes_body() {
        let dir = TestDir::new("body");
        let store = store_in(&dir);

        let attempt = UploadAttempt::new("notes.txt", b"hello world".to_vec());
        let relative = store.store(&attempt).await.unwrap();

        let on_disk = store.disk_path(&relative).unwrap();
        assert_eq!(std::fs::read(on_disk).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_store_without_extension() {
        let dir = TestDir::new("noext");
        let store = store_in(&dir);

        let attempt = UploadAttempt::new("README", b"text".to_vec());
        let relative = store.store(&attempt).await.unwrap();

        let name = relative.rsplit('/').next().unwrap();
        assert!(!name.contains('.'));
    }

    #[tokio::test]
    async fn test_directory_unwritable() {
        let dir = TestDir::new("unwritable");
        // A file where the shard directory should go makes create_dir_all fail.
        let blocked = dir.join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let store = LocalUploadStore::new(blocked, "uploads", "/files");

        let attempt = UploadAttempt::new("a.txt", b"x".to_vec());
        let err = store.store(&attempt).await.unwrap_err();
        assert!(matches!(err, StorageError::DirectoryUnwritable { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_stores_never_collide() {
        let dir = TestDir::new("concurrent");
        let store = Arc::new(store_in(&dir));

        let mut handles = Vec::new();
        for i in 0..100 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let attempt = UploadAttempt::new("photo.png", vec![i as u8]);
                store.store(&attempt).await.unwrap()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let relative = handle.await.unwrap();
            assert!(seen.insert(relative), "duplicate stored path");
        }
    }

    #[tokio::test]
    async fn test_generated_names_unique_across_tasks() {
        let mut handles = Vec::new();
        for _ in 0..10 {
            handles.push(tokio::spawn(async {
                (0..100)
                    .map(|_| LocalUploadStore::generate_name(Some("png")))
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for name in handle.await.unwrap() {
                assert!(name.ends_with(".png"));
                assert!(seen.insert(name), "duplicate generated name");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[tokio::test]
    async fn test_create_exclusive_retries_past_existing_name() {
        let dir = TestDir::new("collide");
        std::fs::write(dir.join("taken"), b"").unwrap();

        let mut names = vec!["fresh".to_string(), "taken".to_string()];
        let (_file, name, path) = create_exclusive(&dir, || names.pop().unwrap())
            .await
            .unwrap();

        assert_eq!(name, "fresh");
        assert!(path.ends_with("fresh"));
    }

    #[tokio::test]
    async fn test_create_exclusive_gives_up_after_repeated_collisions() {
        let dir = TestDir::new("exhausted");
        std::fs::write(dir.join("taken"), b"").unwrap();

        let err = create_exclusive(&dir, || "taken".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed(_)));
    }

    #[tokio::test]
    async fn test_write_failure_removes_partial_file() {
        use std::pin::Pin;
        use std::task::{Context, Poll};

        /// Writer whose first write fails, standing in for a full disk.
        struct FailingWriter;

        impl AsyncWrite for FailingWriter {
            fn poll_write(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &[u8],
            ) -> Poll<std::io::Result<usize>> {
                Poll::Ready(Err(std::io::Error::other("disk full")))
            }

            fn poll_flush(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
            ) -> Poll<std::io::Result<()>> {
                Poll::Ready(Ok(()))
            }

            fn poll_shutdown(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
            ) -> Poll<std::io::Result<()>> {
                Poll::Ready(Ok(()))
            }
        }

        let dir = TestDir::new("partial");
        let path = dir.join("partial.bin");
        std::fs::write(&path, b"half-written").unwrap();

        let err = write_upload(FailingWriter, &path, b"body").await.unwrap_err();

        assert!(matches!(err, StorageError::WriteFailed(_)));
        assert!(!path.exists(), "partial file should be removed");
    }

    #[test]
    fn test_generated_name_not_client_derived() {
        let attempt = UploadAttempt::new("../../etc/passwd.php", Vec::new());
        let name = LocalUploadStore::generate_name(attempt.extension().as_deref());
        assert!(!name.contains("passwd"));
        assert!(!name.contains('/'));
        assert!(name.ends_with(".php"));
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("png"), "png");
        assert_eq!(sanitize_extension("p?h/p"), "php");
        assert_eq!(sanitize_extension("verylongextension"), "verylongex");
    }

    #[test]
    fn test_disk_path_rejects_traversal() {
        let store = LocalUploadStore::new("/srv/uploads", "uploads", "/files");
        assert!(store.disk_path("uploads/../../etc/passwd").is_err());
        assert!(store.disk_path("uploads/2026/08/abc.png").is_ok());
    }

    #[test]
    fn test_disk_path_prefix_matches_whole_component() {
        let store = LocalUploadStore::new("/srv/uploads", "uploads/custom_fields", "/files");

        // A lookalike prefix must not be stripped as if it were in-prefix.
        let path = store
            .disk_path("uploads/custom_fieldsX/2026/08/abc.png")
            .unwrap();
        assert_eq!(
            path,
            Path::new("/srv/uploads/uploads/custom_fieldsX/2026/08/abc.png")
        );

        let path = store.disk_path("uploads/custom_fields/2026/08/abc.png").unwrap();
        assert_eq!(path, Path::new("/srv/uploads/2026/08/abc.png"));
    }

    #[test]
    fn test_public_url_prefix_matches_whole_component() {
        let store = LocalUploadStore::new("/srv/uploads", "uploads/custom_fields", "/files");
        assert_eq!(
            store.public_url("uploads/custom_fieldsX/a.png"),
            "/files/uploads/custom_fieldsX/a.png"
        );
    }

    #[test]
    fn test_public_url() {
        let store = LocalUploadStore::new("/srv/uploads", "uploads/custom_fields", "/files");
        assert_eq!(
            store.public_url("uploads/custom_fields/2026/08/abc.png"),
            "/files/2026/08/abc.png"
        );
    }
}
