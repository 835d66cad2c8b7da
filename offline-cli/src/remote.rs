//! A JSON file standing in for the remote data store.
//!
//! Each commit reads the document, applies the updates and writes it back
//! through a temporary file. Accounts are not supported. The file is
//! always reachable, so the connectivity watcher reports online once.

use async_trait::async_trait;
use offline_first_client::{DataTree, NetworkHandler, Subscription, Tools};
use offline_first_types::{
    Entry, EventType, NetworkStatus, QueryParams, ToolError, UpdateMap, UploadPayload, UserRecord,
};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Remote store backed by one JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileRemote {
    path: PathBuf,
}

impl FileRemote {
    /// Use the document at `path`. A missing file is an empty tree.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the whole document.
    pub async fn load(&self) -> Result<DataTree, ToolError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(DataTree::new()),
            Ok(text) => serde_json::from_str(&text).map(DataTree::from_value).map_err(|e| {
                ToolError::Failed(format!("{} is not valid JSON: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DataTree::new()),
            Err(e) => Err(unavailable(&self.path, e)),
        }
    }

    async fn save(&self, tree: &DataTree) -> Result<(), ToolError> {
        let text = serde_json::to_string_pretty(tree.root())
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(parent, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))
    }

    fn uploads_dir(&self) -> PathBuf {
        self.path.with_extension("uploads")
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> ToolError {
    ToolError::Unavailable(format!("{}: {}", path.display(), e))
}

fn no_accounts() -> ToolError {
    ToolError::Failed("the file remote has no accounts".to_string())
}

#[async_trait]
impl Tools for FileRemote {
    async fn fetch_collection(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<Vec<Entry>, ToolError> {
        Ok(self.load().await?.query(path, query))
    }

    async fn fetch_item(
        &self,
        path: &str,
        _query: &QueryParams,
    ) -> Result<Option<Value>, ToolError> {
        Ok(self.load().await?.get(path).cloned())
    }

    /// Delivers the current value once; the file is not watched.
    async fn subscribe(
        &self,
        path: &str,
        _event: EventType,
        _query: &QueryParams,
    ) -> Result<Subscription, ToolError> {
        let tree = self.load().await?;
        let (tx, sub) = Subscription::channel();
        let key = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default();
        tx.send(Ok(Entry::new(
            key,
            tree.get(path).cloned().unwrap_or(Value::Null),
        )));
        Ok(sub)
    }

    async fn commit(&self, updates: &UpdateMap) -> Result<(), ToolError> {
        let mut tree = self.load().await?;
        tree.apply(updates);
        self.save(&tree).await?;
        tracing::debug!(
            "Committed {} paths to {}",
            updates.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn data_upload(&self, path: &str, payload: UploadPayload) -> Result<String, ToolError> {
        let bytes = payload.into_bytes()?;
        let relative = path.trim_matches('/');
        if relative.is_empty() || relative.split('/').any(|s| s == "..") {
            return Err(ToolError::InvalidArgument(format!(
                "invalid upload path '{path}'"
            )));
        }
        let target = self.uploads_dir().join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(parent, e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| unavailable(&target, e))?;
        Ok(format!("file://{}", target.display()))
    }

    async fn create_user_with_email_and_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<UserRecord, ToolError> {
        Err(no_accounts())
    }

    async fn sign_in_with_email_and_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<UserRecord, ToolError> {
        Err(no_accounts())
    }

    async fn logout(&self) -> Result<(), ToolError> {
        Ok(())
    }

    fn detect_network_changes(&self, handler: NetworkHandler) {
        handler(NetworkStatus::ONLINE);
    }
}
