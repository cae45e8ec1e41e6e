use std::{any::TypeId, collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    TRACE_TARGET,
    error::{Error, Result},
    native::NativeBoundary,
};

#[derive(Debug, Default)]
struct State {
    initialized: bool,
    live_isolates: usize,
}

type LibraryKey = (TypeId, usize);

/// Init state of every engine library in the process, shared by all
/// runtimes over the same library.
static LIBRARIES: Mutex<BTreeMap<LibraryKey, Arc<Mutex<State>>>> = Mutex::new(BTreeMap::new());

fn library_state<B: NativeBoundary>(boundary: &B) -> Arc<Mutex<State>> {
    let key = (TypeId::of::<B>(), boundary.library_id());
    Arc::clone(LIBRARIES.lock().entry(key).or_default())
}

struct Inner<B> {
    boundary: B,
    state: Arc<Mutex<State>>,
}

/// Process-wide engine state.
///
/// The `initialized` flag and the live-isolate count belong to the engine
/// library, not to this object: every runtime built over the same library
/// sees the same state. Native init runs once per init/cleanup cycle and
/// native cleanup runs only once every isolate of the library is gone.
/// Clones share the same boundary.
pub struct ProcessRuntime<B: NativeBoundary> {
    inner: Arc<Inner<B>>,
}

impl<B: NativeBoundary> Clone for ProcessRuntime<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: NativeBoundary> ProcessRuntime<B> {
    #[must_use]
    pub fn new(boundary: B) -> Self {
        let state = library_state(&boundary);
        Self {
            inner: Arc::new(Inner { boundary, state }),
        }
    }

    /// Creates the runtime and initializes the engine in one step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if native init fails.
    pub fn initialize(boundary: B) -> Result<Self> {
        let runtime = Self::new(boundary);
        runtime.init()?;
        Ok(runtime)
    }

    /// Runs native init unless the library is already initialized.
    ///
    /// # Errors
    ///
    /// [`Error::Initialization`] if the engine refuses to start.
    pub fn init(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.initialized {
            return Ok(());
        }
        if !self.inner.boundary.init() {
            return Err(Error::Initialization(
                "native engine init returned false".to_string(),
            ));
        }
        state.initialized = true;
        debug!(target: TRACE_TARGET, "engine initialized");
        Ok(())
    }

    /// Releases native global resources. A no-op when the library is not
    /// initialized.
    ///
    /// # Errors
    ///
    /// [`Error::Misuse`] while isolates of the library are still alive,
    /// whichever runtime created them. No native call is made in that case.
    pub fn cleanup(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.live_isolates > 0 {
            return Err(Error::Misuse("cleanup while isolates are alive"));
        }
        if state.initialized {
            self.inner.boundary.cleanup();
            state.initialized = false;
            debug!(target: TRACE_TARGET, "engine cleaned up");
        }
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().initialized
    }

    /// Isolates alive in the library, across all runtimes.
    #[must_use]
    pub fn live_isolates(&self) -> usize {
        self.inner.state.lock().live_isolates
    }

    #[must_use]
    pub fn boundary(&self) -> &B {
        &self.inner.boundary
    }

    /// Runs `create` and counts the isolate it returns, holding off cleanup
    /// meanwhile.
    pub(crate) fn register_isolate<T>(&self, create: impl FnOnce(&B) -> Result<T>) -> Result<T> {
        let mut state = self.inner.state.lock();
        if !state.initialized {
            return Err(Error::NotInitialized("engine runtime is not initialized"));
        }
        let value = create(&self.inner.boundary)?;
        state.live_isolates += 1;
        Ok(value)
    }

    pub(crate) fn unregister_isolate(&self) {
        let mut state = self.inner.state.lock();
        state.live_isolates = state.live_isolates.saturating_sub(1);
    }
}
