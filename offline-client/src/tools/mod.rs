//! Tool adapter: the remote data-access capabilities an action may use.
//!
//! Every operation is async and fallible. The queue only ever calls
//! [`Tools::commit`] and [`Tools::detect_network_changes`]; the rest are
//! handed to action stages through a [`ToolSet`].
//!
//! Implementations:
//! - [`CallbackTools`] wraps host callbacks with fixed arity
//! - [`MockTools`] keeps an in-memory tree for tests

mod callback;
mod mock;
mod tree;

pub use callback::{CallbackTools, OPTIONAL_TOOLS, REQUIRED_TOOLS};
pub use mock::MockTools;
pub use tree::DataTree;

use async_trait::async_trait;
use offline_first_core::PushKeyGenerator;
use offline_first_types::{
    Entry, EventType, NetworkStatus, QueryParams, ToolError, UpdateMap, UploadPayload, UserRecord,
};
use serde_json::Value;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Connectivity callback. Registered once per process, never removed.
pub type NetworkHandler = Arc<dyn Fn(NetworkStatus) + Send + Sync>;

/// Remote data-access capabilities.
#[async_trait]
pub trait Tools: Send + Sync {
    /// Read the children under `path`.
    async fn fetch_collection(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<Vec<Entry>, ToolError>;

    /// Read the value at `path`. `None` if nothing is stored there.
    async fn fetch_item(&self, path: &str, query: &QueryParams)
        -> Result<Option<Value>, ToolError>;

    /// Listen for changes under `path` until the subscription is dropped.
    async fn subscribe(
        &self,
        path: &str,
        event: EventType,
        query: &QueryParams,
    ) -> Result<Subscription, ToolError>;

    /// Atomically write every path in `updates`. `Null` deletes.
    async fn commit(&self, updates: &UpdateMap) -> Result<(), ToolError>;

    /// Upload a file and return its locator.
    async fn data_upload(&self, path: &str, payload: UploadPayload) -> Result<String, ToolError>;

    /// Register a new account.
    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, ToolError>;

    /// Sign in to an existing account.
    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, ToolError>;

    /// End the current session.
    async fn logout(&self) -> Result<(), ToolError>;

    /// Change the signed-in user's password.
    async fn update_password(&self, _password: &str) -> Result<(), ToolError> {
        Err(ToolError::Failed("update_password is not supported".into()))
    }

    /// Ask the backend to mail a password reset link.
    async fn send_password_reset_email(&self, _email: &str) -> Result<(), ToolError> {
        Err(ToolError::Failed(
            "send_password_reset_email is not supported".into(),
        ))
    }

    /// Report every connectivity transition to `handler`.
    fn detect_network_changes(&self, handler: NetworkHandler);
}

/// Receiving end of a subscription. Dropping it cancels the listener.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Entry, ToolError>>,
}

/// Sending end of a subscription, held by the tool implementation.
#[derive(Debug, Clone)]
pub struct SubscriptionSender {
    tx: mpsc::UnboundedSender<Result<Entry, ToolError>>,
}

impl Subscription {
    /// Create a connected sender/subscription pair.
    pub fn channel() -> (SubscriptionSender, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SubscriptionSender { tx }, Subscription { rx })
    }

    /// Wait for the next snapshot. `None` once the source has stopped.
    pub async fn next(&mut self) -> Option<Result<Entry, ToolError>> {
        self.rx.recv().await
    }

    /// Take a snapshot if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<Result<Entry, ToolError>> {
        self.rx.try_recv().ok()
    }
}

impl SubscriptionSender {
    /// Deliver a snapshot. Returns false once the subscriber is gone.
    pub fn send(&self, item: Result<Entry, ToolError>) -> bool {
        self.tx.send(item).is_ok()
    }

    /// True once the subscription has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The tool set handed to extensions and action stages.
///
/// Derefs to [`Tools`] and adds the local helpers that need no backend.
#[derive(Clone)]
pub struct ToolSet {
    tools: Arc<dyn Tools>,
    push_keys: Arc<Mutex<PushKeyGenerator>>,
}

impl ToolSet {
    /// Wrap a tool implementation.
    pub fn new(tools: Arc<dyn Tools>) -> Self {
        Self {
            tools,
            push_keys: Arc::new(Mutex::new(PushKeyGenerator::new())),
        }
    }

    /// A new chronologically sortable 20-character key.
    pub fn generate_push_key(&self) -> String {
        self.push_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate(now_millis())
    }

    /// Current time in Unix milliseconds.
    pub fn generate_timestamp(&self) -> u64 {
        now_millis()
    }
}

impl Deref for ToolSet {
    type Target = dyn Tools;

    fn deref(&self) -> &Self::Target {
        self.tools.as_ref()
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ToolSet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keys_from_one_tool_set_are_strictly_increasing() {
        let tools = ToolSet::new(Arc::new(MockTools::new()));
        let keys: Vec<String> = (0..50).map(|_| tools.generate_push_key()).collect();

        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert!(keys.iter().all(|k| k.len() == offline_first_core::PUSH_KEY_LEN));
    }

    #[test]
    fn timestamp_is_recent() {
        let tools = ToolSet::new(Arc::new(MockTools::new()));
        // 2020-01-01
        assert!(tools.generate_timestamp() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn tool_set_derefs_to_tools() {
        let mock = MockTools::new();
        let tools = ToolSet::new(Arc::new(mock.clone()));

        let mut updates = UpdateMap::new();
        updates.insert("a".into(), Value::from(1));
        tools.commit(&updates).await.unwrap();

        assert_eq!(mock.commits(), vec![updates]);
    }

    #[tokio::test]
    async fn dropping_subscription_closes_sender() {
        let (tx, sub) = Subscription::channel();
        assert!(!tx.is_closed());
        drop(sub);
        assert!(tx.is_closed());
        assert!(!tx.send(Ok(Entry::new("k", Value::Null))));
    }
}
