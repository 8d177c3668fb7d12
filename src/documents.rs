use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),
}

/// Storage holding journey attachments. Paths are relative to the store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Removes the document. A missing file is not an error.
    async fn delete(&self, path: &str) -> Result<(), DocumentError>;

    async fn exists(&self, path: &str) -> Result<bool, DocumentError>;
}

pub struct LocalDocumentStore {
    base_path: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, DocumentError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(DocumentError::InvalidPath(path.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn delete(&self, path: &str) -> Result<(), DocumentError> {
        match tokio::fs::remove_file(self.resolve(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, DocumentError> {
        Ok(tokio::fs::try_exists(self.resolve(path)?).await?)
    }
}
