use super::SegmentStorage;
use crate::{error::AbrResult, util::path::SegmentPathExt};
use bytes::Bytes;
use std::path::PathBuf;

/// Writes every segment to `<output_dir>/<name>`.
pub struct FileStorage {
    output_dir: PathBuf,
}

impl FileStorage {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn segment_path(&self, name: &str) -> PathBuf {
        self.output_dir.join_segment_name(name)
    }
}

impl SegmentStorage for FileStorage {
    async fn write(&self, name: &str, data: Bytes) -> AbrResult<()> {
        let path = self.segment_path(name);
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        if path.exists() {
            tracing::debug!("Overwriting {}", path.display());
        }
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    fn location_hint(&self) -> Option<String> {
        Some(self.output_dir.display().to_string())
    }
}
