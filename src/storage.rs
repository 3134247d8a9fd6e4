use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

/// Stores item images under a fixed folder, referenced by filename.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, filename: &str, body: Bytes) -> anyhow::Result<()>;
    async fn delete(&self, filename: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create images dir {}", root.display()))?;
        Ok(Self { root })
    }
}

#[async_trait]
impl ImageStore for DiskStore {
    async fn save(&self, filename: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.root.join(filename);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write image {}", path.display()))?;
        Ok(())
    }

    async fn delete(&self, filename: &str) -> anyhow::Result<()> {
        let path = self.root.join(filename);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove image {}", path.display()))?;
        Ok(())
    }
}

/// Best-effort bulk delete. Failures are logged per file and never propagate;
/// the record deletion that precedes this call is authoritative.
pub async fn delete_files(store: &dyn ImageStore, filenames: &[String]) {
    for filename in filenames {
        if let Err(e) = store.delete(filename).await {
            warn!(filename = %filename, error = %e, "image delete failed");
        }
    }
}
