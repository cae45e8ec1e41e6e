use std::{cell::Cell, ptr::NonNull};

use tracing::{debug, warn};

use crate::{
    TRACE_TARGET,
    error::{Error, Result},
    native::{IsolateHandle, NativeBoundary},
    runtime::ProcessRuntime,
};

/// An owned native isolate.
///
/// Tracks whether it is entered and whether it owns a context, and rejects
/// out-of-order calls with [`Error::Misuse`] before the engine sees them.
/// Not `Send`: an isolate belongs to the thread that entered it.
pub struct Isolate<B: NativeBoundary> {
    runtime: ProcessRuntime<B>,
    handle: Option<NonNull<IsolateHandle>>,
    entered: Cell<bool>,
    has_context: Cell<bool>,
}

impl<B: NativeBoundary> Isolate<B> {
    /// Allocates a new isolate under `runtime`.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] if the runtime is not initialized,
    /// [`Error::Initialization`] if the engine returns a null isolate.
    pub fn create(runtime: &ProcessRuntime<B>) -> Result<Self> {
        let handle = runtime.register_isolate(|boundary| {
            NonNull::new(boundary.new_isolate()).ok_or_else(|| {
                Error::Initialization("native isolate allocation returned null".to_string())
            })
        })?;
        debug!(target: TRACE_TARGET, isolate = ?handle, "isolate created");
        Ok(Self {
            runtime: runtime.clone(),
            handle: Some(handle),
            entered: Cell::new(false),
            has_context: Cell::new(false),
        })
    }

    /// # Errors
    ///
    /// [`Error::Misuse`] if the isolate is already entered.
    pub fn enter(&self) -> Result<()> {
        let handle = self.live_handle()?;
        if self.entered.get() {
            return Err(Error::Misuse("isolate is already entered"));
        }
        unsafe { self.boundary().enter_isolate(handle) };
        self.entered.set(true);
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::Misuse`] if the isolate is not entered.
    pub fn leave(&self) -> Result<()> {
        let handle = self.live_handle()?;
        if !self.entered.get() {
            return Err(Error::Misuse("isolate is not entered"));
        }
        unsafe { self.boundary().leave_isolate(handle) };
        self.entered.set(false);
        Ok(())
    }

    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.entered.get()
    }

    #[must_use]
    pub fn has_context(&self) -> bool {
        self.has_context.get()
    }

    /// Destroys the isolate.
    ///
    /// # Errors
    ///
    /// Hands the isolate back with [`Error::Misuse`] if it is entered or
    /// still owns a context.
    pub fn destroy(mut self) -> Result<(), (Self, Error)> {
        if self.entered.get() {
            return Err((self, Error::Misuse("cannot destroy an entered isolate")));
        }
        if self.has_context.get() {
            return Err((
                self,
                Error::Misuse("cannot destroy an isolate that still owns a context"),
            ));
        }
        self.release();
        Ok(())
    }

    pub(crate) fn boundary(&self) -> &B {
        self.runtime.boundary()
    }

    pub(crate) fn live_handle(&self) -> Result<NonNull<IsolateHandle>> {
        self.handle
            .ok_or(Error::NotInitialized("isolate has been destroyed"))
    }

    pub(crate) fn set_has_context(&self, value: bool) {
        self.has_context.set(value);
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { self.runtime.boundary().destroy_isolate(handle) };
            self.runtime.unregister_isolate();
            debug!(target: TRACE_TARGET, isolate = ?handle, "isolate destroyed");
        }
    }
}

impl<B: NativeBoundary> Drop for Isolate<B> {
    fn drop(&mut self) {
        let Some(handle) = self.handle else {
            return;
        };
        if self.entered.get() {
            unsafe { self.runtime.boundary().leave_isolate(handle) };
            self.entered.set(false);
        }
        if self.has_context.get() {
            // The context cannot be released from here; destroying the
            // isolate under it is undefined in the engine.
            warn!(
                target: TRACE_TARGET,
                isolate = ?handle,
                "isolate leaked: context still alive"
            );
            return;
        }
        self.release();
    }
}
