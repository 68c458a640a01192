//! The fetch collaborator: how a missing module's source is obtained.
//!
//! The loader never performs I/O itself. When a pending module needs a name that has
//! no registry entry, it hands a [`FetchRequest`] and a [`FetchCompletion`] to the
//! [`ModuleSource`]. The source finishes the completion whenever it is done, from any
//! thread; the result is queued on the system's event channel and processed by
//! [`ModuleSystem::pump`] or [`ModuleSystem::run`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::ModuleSystem;

/// Runs the fetched source against the system. Usually declares the fetched module.
pub type Installer = Box<dyn FnOnce(&mut ModuleSystem) -> anyhow::Result<()> + Send>;

/// Reusable module source, such as a bundled table entry.
pub type SourceFn = dyn Fn(&mut ModuleSystem) -> anyhow::Result<()> + Send + Sync;

/// A dependency the loader wants fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub module: String,
    pub requested_by: String,
    pub path: String,
}

pub(crate) enum LoaderEvent {
    Fetched {
        request: FetchRequest,
        outcome: Result<Installer, String>,
    },
    EnvironmentReady,
}

/// Callback pair for one fetch. Consuming it reports the outcome exactly once.
///
/// Dropping a completion without calling either method leaves the fetch in flight.
pub struct FetchCompletion {
    request: FetchRequest,
    events: Sender<LoaderEvent>,
}

impl FetchCompletion {
    pub(crate) fn new(request: FetchRequest, events: Sender<LoaderEvent>) -> Self {
        Self { request, events }
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    pub fn succeed<F>(self, installer: F)
    where
        F: FnOnce(&mut ModuleSystem) -> anyhow::Result<()> + Send + 'static,
    {
        self.send(Ok(Box::new(installer)));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.send(Err(reason.into()));
    }

    fn send(self, outcome: Result<Installer, String>) {
        let module = self.request.module.clone();
        let event = LoaderEvent::Fetched {
            request: self.request,
            outcome,
        };
        if self.events.send(event).is_err() {
            tracing::warn!("Module system dropped before fetch of '{}' completed", module);
        }
    }
}

impl fmt::Debug for FetchCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCompletion")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Pluggable source of module code.
pub trait ModuleSource: Send {
    fn fetch(&mut self, request: FetchRequest, completion: FetchCompletion);
}

/// Modules compiled into the host, looked up by name.
///
/// Unknown names go to the fallback source if one is set, and fail otherwise.
#[derive(Default)]
pub struct BundledSource {
    modules: HashMap<String, Arc<SourceFn>>,
    fallback: Option<Box<dyn ModuleSource>>,
}

impl BundledSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module<F>(mut self, name: impl Into<String>, source: F) -> Self
    where
        F: Fn(&mut ModuleSystem) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert(name, source);
        self
    }

    pub fn with_fallback(mut self, fallback: impl ModuleSource + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, source: F)
    where
        F: Fn(&mut ModuleSystem) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.modules.insert(name.into(), Arc::new(source));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Bundled names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }
}

impl ModuleSource for BundledSource {
    fn fetch(&mut self, request: FetchRequest, completion: FetchCompletion) {
        if let Some(source) = self.modules.get(&request.module) {
            let source = source.clone();
            completion.succeed(move |system| (*source)(system));
            return;
        }

        match self.fallback.as_mut() {
            Some(fallback) => fallback.fetch(request, completion),
            None => completion.fail(format!("no bundled module named '{}'", request.module)),
        }
    }
}

/// Source that only records requests. The caller finishes them later, in any order.
///
/// Clones share state, so one clone can be handed to the system while the other is kept
/// to inspect and complete requests.
#[derive(Clone, Default)]
pub struct DeferredSource {
    inner: Arc<Mutex<DeferredState>>,
}

#[derive(Default)]
struct DeferredState {
    history: Vec<FetchRequest>,
    pending: Vec<FetchCompletion>,
}

impl DeferredSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far, in order, including completed ones.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.inner.lock().history.clone()
    }

    /// Names with an unfinished completion.
    pub fn pending(&self) -> Vec<String> {
        self.inner
            .lock()
            .pending
            .iter()
            .map(|completion| completion.request().module.clone())
            .collect()
    }

    /// Remove the oldest unfinished completion for `module`.
    pub fn take(&self, module: &str) -> Option<FetchCompletion> {
        let mut state = self.inner.lock();
        let index = state
            .pending
            .iter()
            .position(|completion| completion.request().module == module)?;
        Some(state.pending.remove(index))
    }
}

impl ModuleSource for DeferredSource {
    fn fetch(&mut self, request: FetchRequest, completion: FetchCompletion) {
        let mut state = self.inner.lock();
        state.history.push(request);
        state.pending.push(completion);
    }
}
