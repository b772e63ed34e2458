use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Local storage for uploaded and generated images. Files are written
/// whole-buffer; no integrity check is performed on them afterwards.
#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.root.join("generated")
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.uploads_dir()).await?;
        tokio::fs::create_dir_all(self.generated_dir()).await?;
        Ok(())
    }

    /// Stores an uploaded image under a fresh uuid name, preserving the
    /// original extension. Returns the stored filename.
    pub async fn save_upload(
        &self,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> std::io::Result<String> {
        let ext = original_name
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        self.ensure_dirs().await?;
        tokio::fs::write(self.uploads_dir().join(&filename), bytes).await?;
        debug!(%filename, bytes = bytes.len(), "upload stored");
        Ok(filename)
    }

    /// Stores a generated illustration. Returns the stored filename.
    pub async fn save_generated(&self, bytes: &[u8]) -> std::io::Result<String> {
        let tag = Uuid::new_v4().simple().to_string();
        let filename = format!("story_image_{}.png", &tag[..8]);
        self.ensure_dirs().await?;
        tokio::fs::write(self.generated_dir().join(&filename), bytes).await?;
        Ok(filename)
    }

    /// Best-effort removal; a missing or stubborn file is logged, never an
    /// error for the caller.
    pub async fn remove_upload(&self, filename: &str) -> bool {
        Self::remove(self.uploads_dir().join(filename)).await
    }

    pub async fn remove_generated(&self, filename: &str) -> bool {
        Self::remove(self.generated_dir().join(filename)).await
    }

    async fn remove(path: PathBuf) -> bool {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove media file");
                false
            }
        }
    }
}
