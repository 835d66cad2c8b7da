//! Application builder and extension host.
//!
//! Extensions register actions, reducers and selectors on an [`AppBuilder`].
//! [`AppBuilder::compile`] consumes the builder, so the registry is frozen
//! and cannot be compiled twice.

use crate::action::{ActionDefinition, ActionOutput, CompiledAction, DispatchContext};
use crate::queue::{OfflineQueue, QueueError};
use crate::settings::Settings;
use crate::store::{Reducer, Selector, Store};
use crate::tools::ToolSet;
use offline_first_types::{ActionError, CompilationError, Params, Platform};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Something that registers actions, reducers or selectors.
///
/// Installation is a synchronous call-through with full builder access.
pub trait Extension {
    /// Register on `app`, with `tools` available for setup.
    fn install(self, app: &mut AppBuilder, tools: &ToolSet);
}

impl<F> Extension for F
where
    F: FnOnce(&mut AppBuilder, &ToolSet),
{
    fn install(self, app: &mut AppBuilder, tools: &ToolSet) {
        self(app, tools)
    }
}

/// Registry of action definitions, reducers and selectors.
pub struct AppBuilder {
    settings: Settings,
    tools: ToolSet,
    queue: OfflineQueue,
    actions: BTreeMap<String, ActionDefinition>,
    reducers: BTreeMap<String, Arc<dyn Reducer>>,
    selectors: BTreeMap<String, Arc<dyn Selector>>,
}

impl AppBuilder {
    /// A builder with a queue built from `settings`.
    pub fn new(settings: Settings) -> Self {
        let queue = OfflineQueue::from_settings(&settings);
        Self::with_queue(settings, queue)
    }

    /// A builder using an existing queue.
    pub fn with_queue(settings: Settings, queue: OfflineQueue) -> Self {
        Self {
            tools: ToolSet::new(Arc::clone(&settings.tools)),
            settings,
            queue,
            actions: BTreeMap::new(),
            reducers: BTreeMap::new(),
            selectors: BTreeMap::new(),
        }
    }

    /// Let `extension` register on this builder.
    pub fn use_extension(&mut self, extension: impl Extension) -> &mut Self {
        let tools = self.tools.clone();
        extension.install(self, &tools);
        self
    }

    /// Register an action. A later registration under the same name wins.
    pub fn register_action(
        &mut self,
        name: impl Into<String>,
        definition: ActionDefinition,
    ) -> &mut Self {
        let name = name.into();
        if self.actions.insert(name.clone(), definition).is_some() {
            tracing::warn!("Action {} registered twice, keeping the later one", name);
        }
        self
    }

    /// Register a reducer owning the state slice `name`.
    pub fn register_reducer(
        &mut self,
        name: impl Into<String>,
        reducer: impl Reducer + 'static,
    ) -> &mut Self {
        self.reducers.insert(name.into(), Arc::new(reducer));
        self
    }

    /// Register a named selector.
    pub fn register_selector(
        &mut self,
        name: impl Into<String>,
        selector: impl Selector + 'static,
    ) -> &mut Self {
        self.selectors.insert(name.into(), Arc::new(selector));
        self
    }

    /// True if an action is registered under `name`.
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Compile every action and freeze the registry.
    ///
    /// Fails as a whole if any single definition is malformed. The builder
    /// is consumed, so a second compile does not type-check:
    ///
    /// ```compile_fail
    /// # fn demo(builder: offline_first_client::AppBuilder) {
    /// let app = builder.compile();
    /// let again = builder.compile();
    /// # }
    /// ```
    pub fn compile(self) -> Result<App, CompilationError> {
        let store = Arc::new(Store::new(self.reducers, self.selectors));
        let ctx = DispatchContext::new(Arc::clone(&store), self.queue.clone());

        let actions = self
            .actions
            .into_iter()
            .map(|(name, definition)| {
                let action = CompiledAction::compile(
                    &name,
                    definition,
                    &self.settings.validate,
                    self.tools.clone(),
                    ctx.clone(),
                )?;
                Ok((name, action))
            })
            .collect::<Result<BTreeMap<_, _>, CompilationError>>()?;
        tracing::info!("Compiled {} actions", actions.len());

        Ok(App {
            platform: self.settings.platform,
            actions,
            store,
            queue: self.queue,
            tools: self.tools,
        })
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("actions", &self.actions)
            .field("reducers", &self.reducers.keys().collect::<Vec<_>>())
            .field("selectors", &self.selectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A compiled application.
pub struct App {
    platform: Platform,
    actions: BTreeMap<String, CompiledAction>,
    store: Arc<Store>,
    queue: OfflineQueue,
    tools: ToolSet,
}

impl App {
    /// Rehydrate the outbox and start watching connectivity.
    pub async fn start(&self) -> Result<(), QueueError> {
        self.queue.hydrate().await?;
        self.queue.watch_network();
        Ok(())
    }

    /// Look up a compiled action.
    pub fn action(&self, name: &str) -> Option<&CompiledAction> {
        self.actions.get(name)
    }

    /// Invoke the action registered under `name`.
    pub async fn call(
        &self,
        name: &str,
        params: Option<Params>,
    ) -> Result<ActionOutput, ActionError> {
        let action = self
            .action(name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;
        action.call(params).await
    }

    /// Registered action names, sorted.
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Host platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// True on ios and android.
    pub fn is_native(&self) -> bool {
        self.platform.is_native()
    }

    /// The offline effect queue.
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// The reducer/selector store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The tool set handed to actions.
    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("platform", &self.platform)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
