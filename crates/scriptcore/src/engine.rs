use tracing::{debug, warn};

use crate::{
    TRACE_TARGET,
    context::ExecutionContext,
    error::{Error, Result},
    isolate::Isolate,
    marshal::materialize,
    native::{NativeBoundary, NativeChar},
    runtime::ProcessRuntime,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    IsolateReady,
    ContextReady,
    Entered,
    Destroyed,
}

/// One isolate with its context, driven through enter / eval / leave.
///
/// Teardown runs on [`Engine::close`] or on drop, whichever comes first, and
/// always destroys the context before the isolate.
pub struct Engine<B: NativeBoundary> {
    context: Option<ExecutionContext>,
    isolate: Option<Isolate<B>>,
    state: EngineState,
}

impl<B: NativeBoundary> Engine<B> {
    /// Creates an isolate and its context. The engine is left not entered.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] if `runtime` is not initialized,
    /// [`Error::Initialization`] if the engine fails to allocate. Anything
    /// acquired before the failure is released first.
    pub fn new(runtime: &ProcessRuntime<B>) -> Result<Self> {
        let mut engine = Self {
            context: None,
            isolate: None,
            state: EngineState::Uninitialized,
        };
        engine.isolate = Some(Isolate::create(runtime)?);
        engine.state = EngineState::IsolateReady;

        let isolate = engine.isolate()?;
        isolate.enter()?;
        let context = ExecutionContext::create(isolate)?;
        isolate.leave()?;
        engine.context = Some(context);
        engine.state = EngineState::ContextReady;
        debug!(target: TRACE_TARGET, "engine ready");
        Ok(engine)
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Enters the isolate, then the context.
    ///
    /// # Errors
    ///
    /// [`Error::Misuse`] if already entered, [`Error::NotInitialized`] after
    /// teardown.
    pub fn enter(&mut self) -> Result<()> {
        match self.state {
            EngineState::ContextReady => {}
            EngineState::Entered => return Err(Error::Misuse("engine is already entered")),
            _ => return Err(Error::NotInitialized("engine has no context")),
        }
        let isolate = self.isolate()?;
        let context = self.context()?;
        isolate.enter()?;
        if let Err(err) = context.enter(isolate) {
            _ = isolate.leave();
            return Err(err);
        }
        self.state = EngineState::Entered;
        Ok(())
    }

    /// Leaves the context, then the isolate.
    ///
    /// # Errors
    ///
    /// [`Error::Misuse`] if the engine is not entered. No native call is
    /// made in that case.
    pub fn leave(&mut self) -> Result<()> {
        if self.state != EngineState::Entered {
            return Err(Error::Misuse("engine is not entered"));
        }
        let isolate = self.isolate()?;
        self.context()?.leave(isolate)?;
        isolate.leave()?;
        self.state = EngineState::ContextReady;
        Ok(())
    }

    /// Enters the engine for the lifetime of the returned guard.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::enter`].
    pub fn scope(&mut self) -> Result<EngineScope<'_, B>> {
        self.enter()?;
        Ok(EngineScope { engine: self })
    }

    /// Evaluates `code` and returns its result as text.
    ///
    /// `Ok(None)` means the evaluation produced nothing printable. Unless
    /// the engine reports error kinds, a script that threw also ends up as
    /// `Ok(None)`; callers cannot tell the two apart.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] if the engine is not entered,
    /// [`Error::InvalidArgument`] if `code` contains a NUL character,
    /// [`Error::Script`] if the engine reports a script error.
    pub fn eval(&self, code: &str) -> Result<Option<String>> {
        if self.state != EngineState::Entered {
            return Err(Error::NotInitialized("engine is not entered"));
        }
        let isolate = self.isolate()?;
        let isolate_handle = isolate.live_handle()?;
        let context_handle = self.context()?.live_handle()?;

        let mut source: Vec<NativeChar> = code.encode_utf16().collect();
        if source.contains(&0) {
            return Err(Error::InvalidArgument("source contains a NUL character"));
        }
        source.push(0);

        let boundary = isolate.boundary();
        let result = unsafe {
            let raw = boundary.eval_as_string(isolate_handle, context_handle, source.as_ptr());
            materialize(boundary, raw)
        };
        match result {
            Some(text) => Ok(Some(text)),
            None => match unsafe { boundary.last_error(isolate_handle) } {
                Some(kind) => Err(Error::Script { kind }),
                None => Ok(None),
            },
        }
    }

    /// Tears the engine down. Safe to call in any state and more than once.
    pub fn close(&mut self) {
        if self.state == EngineState::Destroyed {
            return;
        }
        if let Some(isolate) = self.isolate.take() {
            if let Some(context) = self.context.take() {
                if context.is_entered() {
                    _ = context.leave(&isolate);
                }
                if !isolate.is_entered() {
                    _ = isolate.enter();
                }
                if let Err((context, err)) = context.destroy(&isolate) {
                    warn!(target: TRACE_TARGET, %err, "failed to destroy context");
                    drop(context);
                }
            }
            if isolate.is_entered() {
                _ = isolate.leave();
            }
            if let Err((isolate, err)) = isolate.destroy() {
                warn!(target: TRACE_TARGET, %err, "failed to destroy isolate");
                drop(isolate);
            }
        }
        self.state = EngineState::Destroyed;
        debug!(target: TRACE_TARGET, "engine destroyed");
    }

    /// Prepares the engine for a move to another thread.
    ///
    /// # Errors
    ///
    /// Hands the engine back with [`Error::Misuse`] if it is entered.
    pub fn detach(self) -> Result<DetachedEngine<B>, (Self, Error)> {
        if self.state == EngineState::Entered {
            return Err((self, Error::Misuse("cannot hand off an entered engine")));
        }
        Ok(DetachedEngine { engine: self })
    }

    fn isolate(&self) -> Result<&Isolate<B>> {
        self.isolate
            .as_ref()
            .ok_or(Error::NotInitialized("engine has no isolate"))
    }

    fn context(&self) -> Result<&ExecutionContext> {
        self.context
            .as_ref()
            .ok_or(Error::NotInitialized("engine has no context"))
    }
}

impl<B: NativeBoundary> Drop for Engine<B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An entered [`Engine`]; leaves it on drop.
pub struct EngineScope<'a, B: NativeBoundary> {
    engine: &'a mut Engine<B>,
}

impl<B: NativeBoundary> EngineScope<'_, B> {
    /// # Errors
    ///
    /// See [`Engine::eval`].
    pub fn eval(&self, code: &str) -> Result<Option<String>> {
        self.engine.eval(code)
    }
}

impl<B: NativeBoundary> Drop for EngineScope<'_, B> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.leave() {
            warn!(target: TRACE_TARGET, %err, "failed to leave engine scope");
        }
    }
}

/// An [`Engine`] that is not entered and may cross threads.
pub struct DetachedEngine<B: NativeBoundary> {
    engine: Engine<B>,
}

// SAFETY: the engine is not entered, so no thread holds the isolate. The
// whole engine moves with its handles and its runtime reference.
unsafe impl<B: NativeBoundary + Send + Sync> Send for DetachedEngine<B> {}

impl<B: NativeBoundary> DetachedEngine<B> {
    #[must_use]
    pub fn attach(self) -> Engine<B> {
        self.engine
    }
}
