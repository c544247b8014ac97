use crate::domain::ports::FrameSource;
use crate::utils::error::{AgentError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Reads the screenshot an external capture tool keeps writing to disk.
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn capture(&self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Err(AgentError::VisionError {
                message: format!("frame file {} is empty", self.path.display()),
            });
        }
        tracing::debug!(bytes = bytes.len(), path = %self.path.display(), "frame captured");
        Ok(bytes)
    }
}
