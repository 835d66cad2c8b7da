//! Tools backed by host callbacks.

use super::{NetworkHandler, Subscription, Tools};
use crate::callback::{Args, CallbackFn, CapabilityTable, Completion, TableKind};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use offline_first_types::{
    ConfigurationError, Entry, EventType, NetworkStatus, QueryParams, ToolError, UpdateMap,
    UploadPayload, UserRecord,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Capabilities every tool table must provide, with their data arity.
pub const REQUIRED_TOOLS: [(&str, usize); 9] = [
    ("fetchCollection", 2),
    ("fetchItem", 2),
    ("subscribe", 3),
    ("commit", 1),
    ("dataUpload", 2),
    ("createUserWithEmailAndPassword", 2),
    ("signInWithEmailAndPassword", 2),
    ("logout", 0),
    ("detectNetworkChanges", 0),
];

/// Capabilities a tool table may provide, with their data arity.
pub const OPTIONAL_TOOLS: [(&str, usize); 2] =
    [("updatePassword", 1), ("sendPasswordResetEmail", 1)];

/// [`Tools`] over a table of callback-style host functions.
///
/// Each call is normalized to the capability's declared arity. Structured
/// arguments are passed as JSON; uploads are passed as base64 text.
#[derive(Debug, Clone)]
pub struct CallbackTools {
    fetch_collection: CallbackFn,
    fetch_item: CallbackFn,
    subscribe: CallbackFn,
    commit: CallbackFn,
    data_upload: CallbackFn,
    create_user: CallbackFn,
    sign_in: CallbackFn,
    logout: CallbackFn,
    detect_network_changes: CallbackFn,
    update_password: Option<CallbackFn>,
    send_password_reset_email: Option<CallbackFn>,
}

impl CallbackTools {
    /// Bind every capability, failing on the first missing or non-callable one.
    pub fn from_table(table: &CapabilityTable) -> Result<Self, ConfigurationError> {
        let [
            fetch_collection,
            fetch_item,
            subscribe,
            commit,
            data_upload,
            create_user,
            sign_in,
            logout,
            detect_network_changes,
        ] = REQUIRED_TOOLS.map(|(name, arity)| table.require(TableKind::Tools, name, arity));
        let [update_password, send_password_reset_email] =
            OPTIONAL_TOOLS.map(|(name, arity)| table.optional(TableKind::Tools, name, arity));

        Ok(Self {
            fetch_collection: fetch_collection?,
            fetch_item: fetch_item?,
            subscribe: subscribe?,
            commit: commit?,
            data_upload: data_upload?,
            create_user: create_user?,
            sign_in: sign_in?,
            logout: logout?,
            detect_network_changes: detect_network_changes?,
            update_password: update_password?,
            send_password_reset_email: send_password_reset_email?,
        })
    }
}

fn arg(value: impl Serialize) -> Result<Option<Value>, ToolError> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| ToolError::InvalidArgument(e.to_string()))
}

fn parse<T: DeserializeOwned>(tool: &str, value: Value) -> Result<T, ToolError> {
    serde_json::from_value(value)
        .map_err(|e| ToolError::Failed(format!("{tool} returned an unexpected shape: {e}")))
}

fn parse_status(value: &Value) -> Option<NetworkStatus> {
    match value {
        Value::Bool(online) => Some(NetworkStatus { online: *online }),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

#[async_trait]
impl Tools for CallbackTools {
    async fn fetch_collection(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<Vec<Entry>, ToolError> {
        let args: Args = vec![arg(path)?, arg(query)?];
        match self.fetch_collection.call(args).await? {
            Value::Null => Ok(Vec::new()),
            value => parse("fetchCollection", value),
        }
    }

    async fn fetch_item(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<Option<Value>, ToolError> {
        let value = self.fetch_item.call(vec![arg(path)?, arg(query)?]).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn subscribe(
        &self,
        path: &str,
        event: EventType,
        query: &QueryParams,
    ) -> Result<Subscription, ToolError> {
        let args = vec![arg(path)?, arg(event)?, arg(query)?];
        let (tx, sub) = Subscription::channel();
        let completion = Completion::new(move |result| {
            tx.send(result.and_then(|value| parse::<Entry>("subscribe", value)));
        });
        self.subscribe.invoke(args, completion);
        Ok(sub)
    }

    async fn commit(&self, updates: &UpdateMap) -> Result<(), ToolError> {
        self.commit.call(vec![arg(updates)?]).await.map(|_| ())
    }

    async fn data_upload(&self, path: &str, payload: UploadPayload) -> Result<String, ToolError> {
        let encoded = match payload {
            UploadPayload::Base64(text) => text,
            UploadPayload::Bytes(bytes) => STANDARD.encode(bytes),
        };
        let value = self
            .data_upload
            .call(vec![arg(path)?, Some(Value::String(encoded))])
            .await?;
        parse("dataUpload", value)
    }

    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, ToolError> {
        let value = self.create_user.call(vec![arg(email)?, arg(password)?]).await?;
        parse("createUserWithEmailAndPassword", value)
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, ToolError> {
        let value = self.sign_in.call(vec![arg(email)?, arg(password)?]).await?;
        parse("signInWithEmailAndPassword", value)
    }

    async fn logout(&self) -> Result<(), ToolError> {
        self.logout.call(Vec::new()).await.map(|_| ())
    }

    async fn update_password(&self, password: &str) -> Result<(), ToolError> {
        match &self.update_password {
            Some(f) => f.call(vec![arg(password)?]).await.map(|_| ()),
            None => Err(ToolError::Failed("updatePassword is not supported".into())),
        }
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), ToolError> {
        match &self.send_password_reset_email {
            Some(f) => f.call(vec![arg(email)?]).await.map(|_| ()),
            None => Err(ToolError::Failed(
                "sendPasswordResetEmail is not supported".into(),
            )),
        }
    }

    fn detect_network_changes(&self, handler: NetworkHandler) {
        let completion = Completion::new(move |result| match result {
            Ok(value) => match parse_status(&value) {
                Some(status) => handler(status),
                None => warn!(%value, "ignoring malformed network status"),
            },
            Err(error) => warn!(%error, "network detection reported an error"),
        });
        self.detect_network_changes.invoke(Vec::new(), completion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn full_table(seen: Arc<Mutex<Vec<(String, Args)>>>) -> CapabilityTable {
        REQUIRED_TOOLS
            .iter()
            .chain(OPTIONAL_TOOLS.iter())
            .fold(CapabilityTable::new(), |table, (name, _)| {
                let seen = seen.clone();
                let name = name.to_string();
                table.callback(&name.clone(), move |args, done| {
                    seen.lock().unwrap().push((name.clone(), args));
                    done.ok(match name.as_str() {
                        "fetchCollection" => json!([{ "key": "a", "value": 1 }]),
                        "dataUpload" => json!("https://files/x"),
                        "createUserWithEmailAndPassword" | "signInWithEmailAndPassword" => {
                            json!({ "uid": "u1", "email": "a@b.c" })
                        }
                        "detectNetworkChanges" => json!({ "online": true }),
                        "subscribe" => json!({ "key": "count", "value": 3 }),
                        _ => Value::Null,
                    });
                })
            })
    }

    #[tokio::test]
    async fn every_call_gets_declared_arity() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tools = CallbackTools::from_table(&full_table(seen.clone())).unwrap();

        tools.fetch_collection("todos", &QueryParams::new()).await.unwrap();
        tools.fetch_item("todos/1", &QueryParams::new()).await.unwrap();
        tools.commit(&UpdateMap::new()).await.unwrap();
        tools.logout().await.unwrap();
        tools.update_password("pw").await.unwrap();

        let seen = seen.lock().unwrap();
        let arity_of = |name: &str| {
            REQUIRED_TOOLS
                .iter()
                .chain(OPTIONAL_TOOLS.iter())
                .find(|(n, _)| *n == name)
                .map(|(_, a)| *a)
                .unwrap()
        };
        assert_eq!(seen.len(), 5);
        for (name, args) in seen.iter() {
            assert_eq!(args.len(), arity_of(name), "{name}");
        }
    }

    #[tokio::test]
    async fn results_are_decoded() {
        let tools = CallbackTools::from_table(&full_table(Default::default())).unwrap();

        let entries = tools.fetch_collection("x", &QueryParams::new()).await.unwrap();
        assert_eq!(entries, vec![Entry::new("a", json!(1))]);

        assert_eq!(tools.fetch_item("x", &QueryParams::new()).await.unwrap(), None);

        let user = tools
            .sign_in_with_email_and_password("a@b.c", "pw")
            .await
            .unwrap();
        assert_eq!(user.uid, "u1");
    }

    #[tokio::test]
    async fn upload_bytes_are_sent_as_base64() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tools = CallbackTools::from_table(&full_table(seen.clone())).unwrap();

        let locator = tools
            .data_upload("files/x", UploadPayload::Bytes(b"hello".to_vec()))
            .await
            .unwrap();

        assert_eq!(locator, "https://files/x");
        let (_, args) = seen.lock().unwrap()[0].clone();
        assert_eq!(args[1], Some(json!("aGVsbG8=")));
    }

    #[tokio::test]
    async fn subscription_receives_entries() {
        let tools = CallbackTools::from_table(&full_table(Default::default())).unwrap();
        let mut sub = tools
            .subscribe("count", EventType::Value, &QueryParams::new())
            .await
            .unwrap();

        let entry = sub.next().await.unwrap().unwrap();
        assert_eq!(entry, Entry::new("count", json!(3)));
    }

    #[test]
    fn network_handler_receives_status() {
        let tools = CallbackTools::from_table(&full_table(Default::default())).unwrap();
        let got = Arc::new(Mutex::new(None));
        let sink = got.clone();
        tools.detect_network_changes(Arc::new(move |status: NetworkStatus| {
            *sink.lock().unwrap() = Some(status);
        }));
        assert_eq!(*got.lock().unwrap(), Some(NetworkStatus::ONLINE));
    }

    #[tokio::test]
    async fn missing_optional_capability_is_unsupported() {
        let table = full_table(Default::default()).without("sendPasswordResetEmail");
        let tools = CallbackTools::from_table(&table).unwrap();

        let err = tools.send_password_reset_email("a@b.c").await.unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
    }

    #[test]
    fn missing_required_capability_is_rejected() {
        let table = full_table(Default::default()).without("commit");
        assert_eq!(
            CallbackTools::from_table(&table).unwrap_err(),
            ConfigurationError::MissingTool("commit".into())
        );
    }
}
