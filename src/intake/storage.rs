use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Blob store for accepted payloads, sharded into `YYYY/MM/DD` directories.
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// `base_dir` may start with `~`.
    pub fn new(base_dir: &str) -> Self {
        let expanded = shellexpand::tilde(base_dir).to_string();
        Self {
            base_dir: PathBuf::from(expanded),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Store payload bytes under the upload id, returns (relative_path, absolute_path).
    pub async fn store(
        &self,
        upload_id: &str,
        original_filename: &str,
        data: &[u8],
    ) -> Result<(String, PathBuf)> {
        let date_dir = Utc::now().format("%Y/%m/%d").to_string();
        let abs_dir = self.base_dir.join(&date_dir);
        fs::create_dir_all(&abs_dir)
            .await
            .with_context(|| format!("Failed to create blob directory {}", abs_dir.display()))?;

        let ext = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let stored_name = format!("{}.{}", upload_id, ext);

        let abs_path = abs_dir.join(&stored_name);
        fs::write(&abs_path, data)
            .await
            .with_context(|| format!("Failed to write blob for upload {upload_id}"))?;

        tracing::debug!(upload_id, path = %abs_path.display(), bytes = data.len(), "stored blob");

        let rel_path = format!("{}/{}", date_dir, stored_name);
        Ok((rel_path, abs_path))
    }

    pub async fn read(&self, rel_path: &str) -> Result<Vec<u8>> {
        let abs = self.base_dir.join(rel_path);
        fs::read(&abs).await.context("Failed to read blob")
    }

    /// Delete a blob; a missing blob is not an error.
    pub async fn delete(&self, rel_path: &str) -> Result<()> {
        let abs = self.base_dir.join(rel_path);
        match fs::remove_file(&abs).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete blob"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_read_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path().to_str().unwrap());

        let (rel, abs) = storage
            .store("abc123", "Quarterly Report.PDF", b"%PDF-1.4")
            .await
            .unwrap();
        assert!(rel.ends_with("/abc123.pdf"));
        assert_eq!(rel.matches('/').count(), 3);
        assert!(abs.starts_with(tmp.path()));

        assert_eq!(storage.read(&rel).await.unwrap(), b"%PDF-1.4");

        storage.delete(&rel).await.unwrap();
        assert!(storage.read(&rel).await.is_err());
        storage.delete(&rel).await.unwrap();
    }

    #[tokio::test]
    async fn missing_or_odd_extension_becomes_bin() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path().to_str().unwrap());

        let (rel, _) = storage.store("id1", "scan", b"x").await.unwrap();
        assert!(rel.ends_with("id1.bin"));

        let (rel, _) = storage.store("id2", "notes.t-x", b"x").await.unwrap();
        assert!(rel.ends_with("id2.bin"));
    }
}
