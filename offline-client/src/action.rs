//! Action compilation and invocation.
//!
//! An action is a chain of stages: an optional validation step, the
//! pre-middleware in declaration order, then the handler. Every stage has
//! the same shape ([`Stage`]) and sees the current parameters, the tool set
//! and the dispatch context.
//!
//! # Example
//!
//! ```ignore
//! let add_todo = ActionDefinition::new()
//!     .validate(Schema::new().field("title", Field::string().required()))
//!     .handler(stage(|params, tools, _ctx| async move {
//!         let key = tools.generate_push_key();
//!         Ok(Outcome::Effect(Effect::new().set(format!("todos/{key}"), params["title"].clone())))
//!     }));
//! ```

use crate::queue::{Disposition, OfflineQueue};
use crate::store::{Store, StoreEvent};
use crate::tools::ToolSet;
use async_trait::async_trait;
use offline_first_core::{Schema, ValidateOptions};
use offline_first_types::{ActionError, CompilationError, Effect, Params};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing; the next stage sees the same parameters.
    Continue,
    /// Replacement parameters for the following stages.
    Params(Params),
    /// A result value. From the handler, a value shaped like
    /// `{"updates": {...}}` is also emitted as an effect.
    Value(Value),
    /// A remote mutation for the offline queue.
    Effect(Effect),
}

/// One step of an action chain.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Run the step. An error aborts the chain and reaches the caller unchanged.
    async fn run(
        &self,
        params: &Params,
        tools: &ToolSet,
        ctx: &DispatchContext,
    ) -> Result<Outcome, ActionError>;
}

/// A [`Stage`] made from an async closure. See [`stage`].
pub struct FnStage<F>(F);

/// Turn an async closure into a stage.
pub fn stage<F, Fut>(f: F) -> FnStage<F>
where
    F: Fn(Params, ToolSet, DispatchContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Outcome, ActionError>> + Send,
{
    FnStage(f)
}

#[async_trait]
impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Params, ToolSet, DispatchContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Outcome, ActionError>> + Send,
{
    async fn run(
        &self,
        params: &Params,
        tools: &ToolSet,
        ctx: &DispatchContext,
    ) -> Result<Outcome, ActionError> {
        (self.0)(params.clone(), tools.clone(), ctx.clone()).await
    }
}

/// Checks parameters against a schema and passes on the normalized result.
struct ValidationStage {
    schema: Schema,
    options: ValidateOptions,
}

#[async_trait]
impl Stage for ValidationStage {
    async fn run(
        &self,
        params: &Params,
        _tools: &ToolSet,
        _ctx: &DispatchContext,
    ) -> Result<Outcome, ActionError> {
        let normalized = self.schema.validate(params.clone(), &self.options)?;
        Ok(Outcome::Params(normalized))
    }
}

/// What stages may reach besides tools: the store and the queue.
#[derive(Clone, Debug)]
pub struct DispatchContext {
    store: Arc<Store>,
    queue: OfflineQueue,
}

impl DispatchContext {
    /// Bind a store and a queue.
    pub fn new(store: Arc<Store>, queue: OfflineQueue) -> Self {
        Self { store, queue }
    }

    /// Apply an event to the store.
    pub async fn dispatch(&self, event: StoreEvent) {
        self.store.dispatch(event).await
    }

    /// Snapshot of the store state.
    pub async fn state(&self) -> Map<String, Value> {
        self.store.state().await
    }

    /// Run a named selector.
    pub async fn select(&self, name: &str) -> Option<Value> {
        self.store.select(name).await
    }

    /// Hand an effect to the queue directly.
    pub async fn emit(&self, effect: Effect) -> Disposition {
        self.queue.submit(effect).await
    }

    /// Last reported connectivity.
    pub fn is_online(&self) -> bool {
        self.queue.is_online()
    }
}

/// An action as registered, before compilation.
#[derive(Clone, Default)]
pub struct ActionDefinition {
    validate: Option<Schema>,
    pre: Vec<Arc<dyn Stage>>,
    handler: Option<Arc<dyn Stage>>,
}

impl ActionDefinition {
    /// An empty definition. A handler must be added before compiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate parameters against `schema` before any stage runs.
    pub fn validate(mut self, schema: Schema) -> Self {
        self.validate = Some(schema);
        self
    }

    /// Append a pre-middleware stage.
    pub fn pre(mut self, stage: impl Stage + 'static) -> Self {
        self.pre.push(Arc::new(stage));
        self
    }

    /// Set the terminal handler.
    pub fn handler(mut self, stage: impl Stage + 'static) -> Self {
        self.handler = Some(Arc::new(stage));
        self
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("validate", &self.validate.is_some())
            .field("pre", &self.pre.len())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutput {
    /// The handler's value, if it produced one.
    pub value: Option<Value>,
    /// What the queue did with the handler's effect, if it emitted one.
    pub disposition: Option<Disposition>,
}

/// A compiled, callable action.
#[derive(Clone)]
pub struct CompiledAction {
    name: Arc<str>,
    chain: Arc<[Arc<dyn Stage>]>,
    tools: ToolSet,
    ctx: DispatchContext,
}

impl CompiledAction {
    /// Check a definition and bind it to its chain.
    pub fn compile(
        name: &str,
        definition: ActionDefinition,
        options: &ValidateOptions,
        tools: ToolSet,
        ctx: DispatchContext,
    ) -> Result<Self, CompilationError> {
        if name.is_empty() {
            return Err(CompilationError::EmptyName);
        }
        let handler = definition
            .handler
            .ok_or_else(|| CompilationError::MissingHandler {
                action: name.to_string(),
            })?;

        let mut chain: Vec<Arc<dyn Stage>> = Vec::with_capacity(definition.pre.len() + 2);
        if let Some(schema) = definition.validate {
            schema
                .check()
                .map_err(|reason| CompilationError::InvalidSchema {
                    action: name.to_string(),
                    reason,
                })?;
            chain.push(Arc::new(ValidationStage {
                schema,
                options: options.clone(),
            }));
        }
        chain.extend(definition.pre);
        chain.push(handler);

        Ok(Self {
            name: name.into(),
            chain: chain.into(),
            tools,
            ctx,
        })
    }

    /// Registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stages, validation and handler included.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: every action has a handler.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Invoke the action. Missing parameters default to an empty object.
    ///
    /// Stages run strictly in order, each awaited before the next starts.
    /// Only the handler's outcome becomes the result; earlier stages may
    /// replace the parameters. Failures after an effect has been handed to
    /// the queue are the queue's business and never show up here.
    pub async fn call(&self, params: Option<Params>) -> Result<ActionOutput, ActionError> {
        let mut params = params.unwrap_or_default();
        let last = self.chain.len().saturating_sub(1);
        tracing::debug!("Action {} invoked", self.name);

        for (index, stage) in self.chain.iter().enumerate() {
            let outcome = match stage.run(&params, &self.tools, &self.ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::debug!("Action {} failed at stage {}: {}", self.name, index, e);
                    return Err(e);
                }
            };
            if index == last {
                return Ok(self.finish(outcome).await);
            }
            match outcome {
                Outcome::Params(next) => params = next,
                Outcome::Continue => {}
                other => tracing::debug!(
                    "Action {}: ignoring {:?} from middleware stage {}",
                    self.name,
                    other,
                    index
                ),
            }
        }
        Ok(ActionOutput::default())
    }

    async fn finish(&self, outcome: Outcome) -> ActionOutput {
        match outcome {
            Outcome::Continue => ActionOutput::default(),
            Outcome::Params(params) => ActionOutput {
                value: Some(Value::Object(params)),
                disposition: None,
            },
            Outcome::Value(value) => {
                let disposition = match Effect::from_value(&value) {
                    Some(effect) => Some(self.ctx.emit(effect).await),
                    None => None,
                };
                ActionOutput {
                    value: Some(value),
                    disposition,
                }
            }
            Outcome::Effect(effect) => ActionOutput {
                value: None,
                disposition: Some(self.ctx.emit(effect).await),
            },
        }
    }
}

impl fmt::Debug for CompiledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledAction")
            .field("name", &self.name)
            .field("stages", &self.chain.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::tools::MockTools;
    use offline_first_core::Field;
    use offline_first_types::{NetworkStatus, ToolError};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct Harness {
        tools: MockTools,
        queue: OfflineQueue,
        tool_set: ToolSet,
        ctx: DispatchContext,
    }

    fn harness() -> Harness {
        let tools = MockTools::new();
        let queue = OfflineQueue::new(Arc::new(tools.clone()), Arc::new(MemoryStorage::new()));
        let store = Arc::new(Store::new(BTreeMap::new(), BTreeMap::new()));
        Harness {
            tool_set: ToolSet::new(Arc::new(tools.clone())),
            ctx: DispatchContext::new(store, queue.clone()),
            tools,
            queue,
        }
    }

    fn compile(
        h: &Harness,
        definition: ActionDefinition,
    ) -> Result<CompiledAction, CompilationError> {
        CompiledAction::compile(
            "test",
            definition,
            &ValidateOptions::default(),
            h.tool_set.clone(),
            h.ctx.clone(),
        )
    }

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        label: &'static str,
        outcome: Outcome,
    ) -> impl Stage {
        let log = log.clone();
        stage(move |_params, _tools, _ctx| {
            let log = log.clone();
            let outcome = outcome.clone();
            async move {
                log.lock().unwrap().push(label.to_string());
                Ok(outcome)
            }
        })
    }

    /// Records its start, suspends, then records its end.
    fn suspending(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> impl Stage {
        let log = log.clone();
        stage(move |_params, _tools, _ctx| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{label}:start"));
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                log.lock().unwrap().push(format!("{label}:end"));
                Ok(Outcome::Continue)
            }
        })
    }

    fn params(value: Value) -> Option<Params> {
        value.as_object().cloned()
    }

    // ===========================================
    // Compilation
    // ===========================================

    #[test]
    fn missing_handler_fails() {
        let h = harness();
        let err = compile(&h, ActionDefinition::new()).unwrap_err();
        assert_eq!(
            err,
            CompilationError::MissingHandler {
                action: "test".into()
            }
        );
    }

    #[test]
    fn contradictory_schema_fails() {
        let h = harness();
        let definition = ActionDefinition::new()
            .validate(Schema::new().field("n", Field::number().min(5.0).max(1.0)))
            .handler(recorder(&Default::default(), "H", Outcome::Continue));
        let err = compile(&h, definition).unwrap_err();
        assert!(matches!(err, CompilationError::InvalidSchema { .. }));
    }

    #[test]
    fn chain_includes_validation_pre_and_handler() {
        let h = harness();
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = ActionDefinition::new()
            .validate(Schema::new())
            .pre(recorder(&log, "A", Outcome::Continue))
            .pre(recorder(&log, "B", Outcome::Continue))
            .handler(recorder(&log, "H", Outcome::Continue));
        assert_eq!(compile(&h, definition).unwrap().len(), 4);
    }

    // ===========================================
    // Invocation order
    // ===========================================

    #[tokio::test]
    async fn stages_run_in_order_after_validation() {
        let h = harness();
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = ActionDefinition::new()
            .validate(Schema::new().field("title", Field::string().required()))
            .pre(recorder(&log, "A", Outcome::Continue))
            .pre(recorder(&log, "B", Outcome::Continue))
            .handler(recorder(&log, "H", Outcome::Value(json!("done"))));
        let action = compile(&h, definition).unwrap();

        let output = action.call(params(json!({ "title": "milk" }))).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "H"]);
        assert_eq!(output.value, Some(json!("done")));
        assert_eq!(output.disposition, None);
    }

    #[tokio::test]
    async fn each_stage_resolves_before_the_next_starts() {
        let h = harness();
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = ActionDefinition::new()
            .pre(suspending(&log, "A"))
            .pre(suspending(&log, "B"))
            .handler(recorder(&log, "H", Outcome::Continue));
        let action = compile(&h, definition).unwrap();

        action.call(None).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["A:start", "A:end", "B:start", "B:end", "H"]
        );
    }

    #[tokio::test]
    async fn invalid_params_run_no_stage() {
        let h = harness();
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = ActionDefinition::new()
            .validate(Schema::new().field("title", Field::string().required()))
            .pre(recorder(&log, "A", Outcome::Continue))
            .handler(recorder(&log, "H", Outcome::Continue));
        let action = compile(&h, definition).unwrap();

        let err = action.call(None).await.unwrap_err();

        match err {
            ActionError::Validation(e) => assert!(e.has_path("title")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_params_default_to_empty_object() {
        let h = harness();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let definition = ActionDefinition::new().handler(stage(move |params, _tools, _ctx| {
            *sink.lock().unwrap() = Some(params);
            async { Ok(Outcome::Continue) }
        }));
        let action = compile(&h, definition).unwrap();

        action.call(None).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(Params::new()));
    }

    #[tokio::test]
    async fn validated_params_reach_handler() {
        let h = harness();
        let definition = ActionDefinition::new()
            .validate(Schema::new().field("count", Field::integer().default_value(1)))
            .handler(stage(|params, _tools, _ctx| async move {
                Ok(Outcome::Value(params["count"].clone()))
            }));
        let action = compile(&h, definition).unwrap();

        let output = action.call(None).await.unwrap();
        assert_eq!(output.value, Some(json!(1)));
    }

    #[tokio::test]
    async fn middleware_can_replace_params() {
        let h = harness();
        let definition = ActionDefinition::new()
            .pre(stage(|mut params: Params, _tools, _ctx| async move {
                params.insert("stamped".into(), json!(true));
                Ok(Outcome::Params(params))
            }))
            .handler(stage(|params, _tools, _ctx| async move {
                Ok(Outcome::Value(Value::Object(params)))
            }));
        let action = compile(&h, definition).unwrap();

        let output = action.call(params(json!({ "a": 1 }))).await.unwrap();
        assert_eq!(output.value, Some(json!({ "a": 1, "stamped": true })));
    }

    // ===========================================
    // Failures
    // ===========================================

    #[tokio::test]
    async fn middleware_error_aborts_chain_unchanged() {
        let h = harness();
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = ActionDefinition::new()
            .pre(stage(|_params, _tools, _ctx| async {
                Err(ActionError::handler("not allowed"))
            }))
            .handler(recorder(&log, "H", Outcome::Continue));
        let action = compile(&h, definition).unwrap();

        let err = action.call(None).await.unwrap_err();

        assert_eq!(err, ActionError::Handler("not allowed".into()));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_error_in_handler_propagates_and_queues_nothing() {
        let h = harness();
        let definition =
            ActionDefinition::new().handler(stage(|_params, tools: ToolSet, _ctx| async move {
                tools.sign_in_with_email_and_password("a@b.c", "pw").await?;
                Ok(Outcome::Effect(Effect::new().set("a", 1)))
            }));
        let action = compile(&h, definition).unwrap();

        let err = action.call(None).await.unwrap_err();

        assert!(matches!(err, ActionError::Tool(ToolError::Auth(_))));
        assert!(h.queue.snapshot().await.is_empty());
    }

    // ===========================================
    // Effects
    // ===========================================

    #[tokio::test]
    async fn handler_effect_is_committed_when_online() {
        let h = harness();
        h.queue.set_network(NetworkStatus::ONLINE).await;
        let definition = ActionDefinition::new().handler(stage(|_params, _tools, _ctx| async {
            Ok(Outcome::Effect(Effect::new().set("a/b", 1)))
        }));
        let action = compile(&h, definition).unwrap();

        let output = action.call(None).await.unwrap();

        assert_eq!(output.disposition, Some(Disposition::Committed));
        assert_eq!(h.tools.commit_count(), 1);
    }

    #[tokio::test]
    async fn commit_failure_does_not_reach_caller() {
        let h = harness();
        h.queue.set_network(NetworkStatus::ONLINE).await;
        h.tools.fail_next_commit("timeout");
        let definition = ActionDefinition::new().handler(stage(|_params, _tools, _ctx| async {
            Ok(Outcome::Effect(Effect::new().set("a", 1)))
        }));
        let action = compile(&h, definition).unwrap();

        let output = action.call(None).await.unwrap();

        assert_eq!(output.disposition, Some(Disposition::Queued));
    }

    #[tokio::test]
    async fn value_shaped_like_effect_is_emitted() {
        let h = harness();
        let definition = ActionDefinition::new().handler(stage(|_params, _tools, _ctx| async {
            Ok(Outcome::Value(json!({ "updates": { "a": 1 } })))
        }));
        let action = compile(&h, definition).unwrap();

        let output = action.call(None).await.unwrap();

        assert_eq!(output.disposition, Some(Disposition::Queued));
        assert_eq!(h.queue.snapshot().await.get("a"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn effect_from_middleware_is_ignored() {
        let h = harness();
        let definition = ActionDefinition::new()
            .pre(stage(|_params, _tools, _ctx| async {
                Ok(Outcome::Effect(Effect::new().set("ignored", 1)))
            }))
            .handler(stage(|_params, _tools, _ctx| async { Ok(Outcome::Continue) }));
        let action = compile(&h, definition).unwrap();

        action.call(None).await.unwrap();

        assert!(h.queue.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn context_reaches_store() {
        let tools = MockTools::new();
        let queue = OfflineQueue::new(Arc::new(tools.clone()), Arc::new(MemoryStorage::new()));
        let mut reducers: BTreeMap<String, Arc<dyn crate::store::Reducer>> = BTreeMap::new();
        reducers.insert(
            "last".into(),
            Arc::new(|state: Option<&Value>, event: &StoreEvent| match event.kind.as_str() {
                "saved" => event.payload.clone(),
                _ => state.cloned().unwrap_or(Value::Null),
            }),
        );
        let ctx = DispatchContext::new(Arc::new(Store::new(reducers, BTreeMap::new())), queue);
        let definition = ActionDefinition::new().handler(stage(
            |params, _tools, ctx: DispatchContext| async move {
                ctx.dispatch(StoreEvent::new("saved", Value::Object(params)))
                    .await;
                Ok(Outcome::Continue)
            },
        ));
        let action = CompiledAction::compile(
            "save",
            definition,
            &ValidateOptions::default(),
            ToolSet::new(Arc::new(tools)),
            ctx.clone(),
        )
        .unwrap();

        action.call(params(json!({ "x": 1 }))).await.unwrap();

        assert_eq!(ctx.state().await.get("last"), Some(&json!({ "x": 1 })));
    }
}
