//! Mock tools for testing.
//!
//! Keeps an in-memory data tree, records commits and lets tests force
//! failures and flip connectivity.

use super::tree::DataTree;
use super::{NetworkHandler, Subscription, SubscriptionSender, Tools};
use async_trait::async_trait;
use offline_first_types::{
    Entry, EventType, NetworkStatus, QueryParams, ToolError, UpdateMap, UploadPayload, UserRecord,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Mock tools for testing.
///
/// Clones share state, so a test can keep one handle while the queue owns
/// another.
#[derive(Default, Clone)]
pub struct MockTools {
    inner: Arc<Mutex<MockToolsInner>>,
}

#[derive(Default)]
struct MockToolsInner {
    tree: DataTree,
    commits: Vec<UpdateMap>,
    fail_next_commit: Option<String>,
    fail_all_commits: Option<String>,
    uploads: BTreeMap<String, Vec<u8>>,
    users: BTreeMap<String, (String, UserRecord)>,
    current_user: Option<UserRecord>,
    subscribers: Vec<(String, SubscriptionSender)>,
    network_handlers: Vec<NetworkHandler>,
}

impl MockTools {
    /// Create mock tools with an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create mock tools over an existing document.
    pub fn with_data(root: Value) -> Self {
        let tools = Self::new();
        tools.inner.lock().unwrap().tree = DataTree::from_value(root);
        tools
    }

    /// Every successful commit, in order.
    pub fn commits(&self) -> Vec<UpdateMap> {
        self.inner.lock().unwrap().commits.clone()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.inner.lock().unwrap().commits.len()
    }

    /// The current document.
    pub fn data(&self) -> Value {
        self.inner.lock().unwrap().tree.root().clone()
    }

    /// Bytes uploaded to `path`.
    pub fn upload(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().uploads.get(path).cloned()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<UserRecord> {
        self.inner.lock().unwrap().current_user.clone()
    }

    /// Cause the next commit() to fail with the given error.
    pub fn fail_next_commit(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_commit = Some(error.to_string());
    }

    /// Fail every commit until cleared with `None`.
    pub fn fail_commits(&self, error: Option<&str>) {
        self.inner.lock().unwrap().fail_all_commits = error.map(str::to_string);
    }

    /// Number of registered connectivity handlers.
    pub fn network_handler_count(&self) -> usize {
        self.inner.lock().unwrap().network_handlers.len()
    }

    /// Report a connectivity transition to every registered handler.
    pub fn set_network(&self, status: NetworkStatus) {
        let handlers = self.inner.lock().unwrap().network_handlers.clone();
        for handler in handlers {
            handler(status);
        }
    }
}

impl fmt::Debug for MockTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MockTools")
            .field("commits", &inner.commits.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

fn snapshot(tree: &DataTree, path: &str) -> Entry {
    let key = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default();
    Entry::new(key, tree.get(path).cloned().unwrap_or(Value::Null))
}

fn overlaps(a: &str, b: &str) -> bool {
    let a = a.trim_matches('/');
    let b = b.trim_matches('/');
    a.is_empty()
        || b.is_empty()
        || a == b
        || a.starts_with(&format!("{b}/"))
        || b.starts_with(&format!("{a}/"))
}

#[async_trait]
impl Tools for MockTools {
    async fn fetch_collection(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<Vec<Entry>, ToolError> {
        Ok(self.inner.lock().unwrap().tree.query(path, query))
    }

    async fn fetch_item(
        &self,
        path: &str,
        _query: &QueryParams,
    ) -> Result<Option<Value>, ToolError> {
        Ok(self.inner.lock().unwrap().tree.get(path).cloned())
    }

    /// Every event type receives full value snapshots of `path`.
    async fn subscribe(
        &self,
        path: &str,
        _event: EventType,
        _query: &QueryParams,
    ) -> Result<Subscription, ToolError> {
        let mut inner = self.inner.lock().unwrap();
        let (tx, sub) = Subscription::channel();
        tx.send(Ok(snapshot(&inner.tree, path)));
        inner.subscribers.push((path.to_string(), tx));
        Ok(sub)
    }

    async fn commit(&self, updates: &UpdateMap) -> Result<(), ToolError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_commit.take() {
            return Err(ToolError::Unavailable(error));
        }
        if let Some(error) = &inner.fail_all_commits {
            return Err(ToolError::Unavailable(error.clone()));
        }

        inner.tree.apply(updates);
        inner.commits.push(updates.clone());

        let MockToolsInner {
            tree, subscribers, ..
        } = &mut *inner;
        subscribers.retain(|(path, tx)| {
            if updates.keys().any(|changed| overlaps(changed, path)) {
                tx.send(Ok(snapshot(tree, path)))
            } else {
                !tx.is_closed()
            }
        });
        Ok(())
    }

    async fn data_upload(&self, path: &str, payload: UploadPayload) -> Result<String, ToolError> {
        let bytes = payload.into_bytes()?;
        self.inner
            .lock()
            .unwrap()
            .uploads
            .insert(path.to_string(), bytes);
        Ok(format!("mock://{}", path.trim_matches('/')))
    }

    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, ToolError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.contains_key(email) {
            return Err(ToolError::Auth(format!("{email} is already registered")));
        }
        let user = UserRecord {
            uid: format!("uid-{}", inner.users.len() + 1),
            email: email.to_string(),
        };
        inner
            .users
            .insert(email.to_string(), (password.to_string(), user.clone()));
        inner.current_user = Some(user.clone());
        Ok(user)
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, ToolError> {
        let mut inner = self.inner.lock().unwrap();
        let user = match inner.users.get(email) {
            Some((stored, user)) if stored == password => user.clone(),
            _ => return Err(ToolError::Auth("invalid email or password".into())),
        };
        inner.current_user = Some(user.clone());
        Ok(user)
    }

    async fn logout(&self) -> Result<(), ToolError> {
        self.inner.lock().unwrap().current_user = None;
        Ok(())
    }

    async fn update_password(&self, password: &str) -> Result<(), ToolError> {
        let mut inner = self.inner.lock().unwrap();
        let email = match &inner.current_user {
            Some(user) => user.email.clone(),
            None => return Err(ToolError::Auth("not signed in".into())),
        };
        if let Some((stored, _)) = inner.users.get_mut(&email) {
            *stored = password.to_string();
        }
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), ToolError> {
        if self.inner.lock().unwrap().users.contains_key(email) {
            Ok(())
        } else {
            Err(ToolError::Auth(format!("no account for {email}")))
        }
    }

    fn detect_network_changes(&self, handler: NetworkHandler) {
        self.inner.lock().unwrap().network_handlers.push(handler);
    }
}
