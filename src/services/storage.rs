//! Local filesystem storage for exam templates, answer keys, fonts and
//! generated papers. Keys are data-dir relative paths; writes return the
//! byte size and a sha256 digest for content auditing.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("storage i/o failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct StorageService {
    data_dir: PathBuf,
    font_path: PathBuf,
}

impl StorageService {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            data_dir: PathBuf::from(&settings.storage().data_dir),
            font_path: PathBuf::from(&settings.storage().font_path),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_dirs(data_dir: PathBuf, font_path: PathBuf) -> Self {
        Self { data_dir, font_path }
    }

    pub(crate) fn resolve(&self, key: &str) -> PathBuf {
        self.data_dir.join(key)
    }

    pub(crate) async fn exists(&self, key: &str) -> bool {
        fs::try_exists(self.resolve(key)).await.unwrap_or(false)
    }

    pub(crate) async fn read_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(err) => Err(StorageError::Io { key: key.to_string(), source: err }),
        }
    }

    pub(crate) async fn upload_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(i64, String), StorageError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::Io { key: key.to_string(), source: err })?;
        }

        let size = bytes.len() as i64;
        let hash_hex = hex::encode(Sha256::digest(&bytes));

        fs::write(&path, bytes)
            .await
            .map_err(|err| StorageError::Io { key: key.to_string(), source: err })?;

        Ok((size, hash_hex))
    }

    /// The name-stamp font lives at a fixed well-known path outside the
    /// data dir; papers with shaped names cannot be produced without it.
    pub(crate) async fn read_font(&self) -> Result<Vec<u8>, StorageError> {
        match fs::read(&self.font_path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(self.font_path.display().to_string()))
            }
            Err(err) => Err(StorageError::Io {
                key: self.font_path.display().to_string(),
                source: err,
            }),
        }
    }

    pub(crate) async fn font_exists(&self) -> bool {
        fs::try_exists(&self.font_path).await.unwrap_or(false)
    }

    pub(crate) fn template_key(exam_title_slug: &str, extension: &str) -> String {
        format!("templates/{exam_title_slug}.{extension}")
    }

    pub(crate) fn answer_key_key(exam_id: i32) -> String {
        format!("answer_keys/exam_{exam_id}.json")
    }

    pub(crate) fn papers_key(exam_id: i32, class_id: i32) -> String {
        format!("papers/exam_{exam_id}_class_{class_id}.pdf")
    }
}

pub(crate) fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_dash = true;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("exam");
    }
    slug
}

pub(crate) fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (tempdir::TempDirGuard, StorageService) {
        let dir = tempdir::TempDirGuard::new("examscan-storage-test");
        let storage =
            StorageService::with_dirs(dir.path().to_path_buf(), dir.path().join("font.ttf"));
        (dir, storage)
    }

    // Minimal temp-dir helper; std has no stable tempdir and the suite
    // needs isolated directories per test.
    mod tempdir {
        use std::path::{Path, PathBuf};
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub(super) struct TempDirGuard {
            path: PathBuf,
        }

        impl TempDirGuard {
            pub(super) fn new(prefix: &str) -> Self {
                let unique = format!(
                    "{prefix}-{}-{}",
                    std::process::id(),
                    COUNTER.fetch_add(1, Ordering::Relaxed)
                );
                let path = std::env::temp_dir().join(unique);
                std::fs::create_dir_all(&path).expect("create temp dir");
                Self { path }
            }

            pub(super) fn path(&self) -> &Path {
                &self.path
            }
        }

        impl Drop for TempDirGuard {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.path);
            }
        }
    }

    #[tokio::test]
    async fn upload_then_read_roundtrip_with_hash() {
        let (_dir, storage) = temp_storage();
        let (size, hash) =
            storage.upload_bytes("templates/t.pdf", b"%PDF-1.5 test".to_vec()).await.unwrap();
        assert_eq!(size, 13);
        assert_eq!(hash.len(), 64);

        let bytes = storage.read_bytes("templates/t.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.5 test");
        assert!(storage.exists("templates/t.pdf").await);
    }

    #[tokio::test]
    async fn missing_key_reports_not_found() {
        let (_dir, storage) = temp_storage();
        let err = storage.read_bytes("missing.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(!storage.font_exists().await);
    }

    #[test]
    fn slugify_flattens_titles() {
        assert_eq!(slugify("Math Final 2026"), "math-final-2026");
        assert_eq!(slugify("  weird -- title!! "), "weird-title");
        assert_eq!(slugify("!!!"), "exam");
    }

    #[test]
    fn extension_extraction_is_lowercased() {
        assert_eq!(extension_of("Scan.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("photo.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(extension_of("noext"), None);
    }
}
