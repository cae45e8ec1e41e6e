use std::{cell::Cell, ptr::NonNull};

use tracing::{debug, warn};

use crate::{
    TRACE_TARGET,
    error::{Error, Result},
    isolate::Isolate,
    native::{ContextHandle, IsolateHandle, NativeBoundary},
};

/// A native context bound to the isolate it was created in.
///
/// Every operation takes the owning isolate, which must be entered. A
/// context must be destroyed through [`ExecutionContext::destroy`]; dropping
/// it only logs the leak because the engine cannot release it without its
/// isolate.
pub struct ExecutionContext {
    handle: Option<NonNull<ContextHandle>>,
    owner: NonNull<IsolateHandle>,
    entered: Cell<bool>,
}

impl ExecutionContext {
    /// Creates the isolate's context.
    ///
    /// # Errors
    ///
    /// [`Error::Misuse`] if `isolate` is not entered or already owns a
    /// context, [`Error::Initialization`] if the engine returns null.
    pub fn create<B: NativeBoundary>(isolate: &Isolate<B>) -> Result<Self> {
        let owner = isolate.live_handle()?;
        if !isolate.is_entered() {
            return Err(Error::Misuse("context creation requires an entered isolate"));
        }
        if isolate.has_context() {
            return Err(Error::Misuse("isolate already owns a context"));
        }
        let handle = NonNull::new(unsafe { isolate.boundary().new_context(owner) })
            .ok_or_else(|| {
                Error::Initialization("native context allocation returned null".to_string())
            })?;
        isolate.set_has_context(true);
        debug!(target: TRACE_TARGET, context = ?handle, isolate = ?owner, "context created");
        Ok(Self {
            handle: Some(handle),
            owner,
            entered: Cell::new(false),
        })
    }

    /// Makes this context the evaluation target.
    ///
    /// # Errors
    ///
    /// [`Error::Misuse`] if `isolate` is not the entered owner or the
    /// context is already entered.
    pub fn enter<B: NativeBoundary>(&self, isolate: &Isolate<B>) -> Result<()> {
        let handle = self.checked_handle(isolate)?;
        if self.entered.get() {
            return Err(Error::Misuse("context is already entered"));
        }
        unsafe { isolate.boundary().enter_context(handle) };
        self.entered.set(true);
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::Misuse`] if `isolate` is not the entered owner or the
    /// context is not entered.
    pub fn leave<B: NativeBoundary>(&self, isolate: &Isolate<B>) -> Result<()> {
        let handle = self.checked_handle(isolate)?;
        if !self.entered.get() {
            return Err(Error::Misuse("context is not entered"));
        }
        unsafe { isolate.boundary().leave_context(handle) };
        self.entered.set(false);
        Ok(())
    }

    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.entered.get()
    }

    /// Destroys the context. Must run before its isolate is destroyed.
    ///
    /// # Errors
    ///
    /// Hands the context back with [`Error::Misuse`] if `isolate` is not
    /// its entered owner or the context is still entered.
    pub fn destroy<B: NativeBoundary>(
        mut self,
        isolate: &Isolate<B>,
    ) -> Result<(), (Self, Error)> {
        let handle = match self.checked_handle(isolate) {
            Ok(handle) => handle,
            Err(err) => return Err((self, err)),
        };
        if self.entered.get() {
            return Err((self, Error::Misuse("cannot destroy an entered context")));
        }
        unsafe { isolate.boundary().destroy_context(handle) };
        self.handle = None;
        isolate.set_has_context(false);
        debug!(target: TRACE_TARGET, context = ?handle, "context destroyed");
        Ok(())
    }

    pub(crate) fn live_handle(&self) -> Result<NonNull<ContextHandle>> {
        self.handle
            .ok_or(Error::NotInitialized("context has been destroyed"))
    }

    fn checked_handle<B: NativeBoundary>(
        &self,
        isolate: &Isolate<B>,
    ) -> Result<NonNull<ContextHandle>> {
        let handle = self.live_handle()?;
        if isolate.live_handle()? != self.owner {
            return Err(Error::Misuse("context used with a foreign isolate"));
        }
        if !isolate.is_entered() {
            return Err(Error::Misuse("owning isolate is not entered"));
        }
        Ok(handle)
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            warn!(
                target: TRACE_TARGET,
                context = ?handle,
                "context leaked: dropped without destroy"
            );
        }
    }
}
