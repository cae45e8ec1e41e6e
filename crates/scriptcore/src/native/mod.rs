//! The boundary to the native script engine.
//!
//! Everything on the other side of this module is a black box reached
//! through opaque handles. The engine library itself is supplied by the
//! integrator, either as a Rust type implementing [`NativeBoundary`] or as a
//! [`NativeApi`] table of C entry points.

use std::{
    ffi::{c_int, c_void},
    ptr::NonNull,
};

mod api;
#[cfg(test)]
pub(crate) mod mock;

pub use api::NativeApi;

/// A text unit as exchanged with the engine. Engine strings are UTF-16.
pub type NativeChar = u16;

/// Callback signature for host functions exposed to evaluated script.
///
/// Declared for integrators only: the boundary has no registration entry
/// point, so nothing in this crate invokes it.
pub type FunctionCallback = unsafe extern "C" fn(info: *mut c_void);

/// Native isolate. Only ever seen behind a pointer.
#[repr(C)]
pub struct IsolateHandle {
    _data: [u8; 0],
    _marker: core::marker::PhantomData<*mut u8>,
}

/// Native context, bound to one isolate at creation.
#[repr(C)]
pub struct ContextHandle {
    _data: [u8; 0],
    _marker: core::marker::PhantomData<*mut u8>,
}

/// Native evaluation result rendered as text. Single release.
#[repr(C)]
pub struct StringHandle {
    _data: [u8; 0],
    _marker: core::marker::PhantomData<*mut u8>,
}

/// Script-level error categories in the engine's vocabulary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    GenericError = 0,
    RangeError = 1,
    ReferenceError = 2,
    SyntaxError = 3,
    TypeError = 4,
}

impl ErrorKind {
    #[must_use]
    pub const fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(Self::GenericError),
            1 => Some(Self::RangeError),
            2 => Some(Self::ReferenceError),
            3 => Some(Self::SyntaxError),
            4 => Some(Self::TypeError),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> c_int {
        self as c_int
    }
}

/// The native engine's entry points.
///
/// Ordering rules (init before isolates, enter before context work, context
/// destroyed before its isolate, cleanup after every isolate) are *not*
/// checked here. The owning types in this crate enforce them before any of
/// these methods is reached.
///
/// # Safety
///
/// Implementations must behave according to the documented contract of each
/// method: non-null handles they return stay valid until the matching
/// destroy call, and `string_info` returns a pointer to at least `*len`
/// readable units.
pub unsafe trait NativeBoundary: 'static {
    /// Identifies the engine library behind this boundary.
    ///
    /// Boundaries of the same type with the same id share one process-wide
    /// init/cleanup state in [`ProcessRuntime`](crate::ProcessRuntime).
    fn library_id(&self) -> usize {
        0
    }

    /// Global engine initialization. `false` is fatal.
    fn init(&self) -> bool;

    /// Releases global engine resources.
    fn cleanup(&self);

    /// Allocates an isolate; null on failure.
    fn new_isolate(&self) -> *mut IsolateHandle;

    /// # Safety
    ///
    /// `isolate` is live, not entered and has no live context.
    unsafe fn destroy_isolate(&self, isolate: NonNull<IsolateHandle>);

    /// # Safety
    ///
    /// `isolate` is live and not entered.
    unsafe fn enter_isolate(&self, isolate: NonNull<IsolateHandle>);

    /// # Safety
    ///
    /// `isolate` is live and entered.
    unsafe fn leave_isolate(&self, isolate: NonNull<IsolateHandle>);

    /// Allocates a context; null on failure.
    ///
    /// # Safety
    ///
    /// `isolate` is live and entered.
    unsafe fn new_context(&self, isolate: NonNull<IsolateHandle>) -> *mut ContextHandle;

    /// # Safety
    ///
    /// `context` is live and its isolate is entered.
    unsafe fn enter_context(&self, context: NonNull<ContextHandle>);

    /// # Safety
    ///
    /// `context` is live and entered.
    unsafe fn leave_context(&self, context: NonNull<ContextHandle>);

    /// # Safety
    ///
    /// `context` is live and its isolate is entered.
    unsafe fn destroy_context(&self, context: NonNull<ContextHandle>);

    /// Evaluates NUL-terminated UTF-16 `source`. Null means "no result".
    ///
    /// # Safety
    ///
    /// Both handles are live and entered; `source` points to a
    /// NUL-terminated buffer.
    unsafe fn eval_as_string(
        &self,
        isolate: NonNull<IsolateHandle>,
        context: NonNull<ContextHandle>,
        source: *const NativeChar,
    ) -> *mut StringHandle;

    /// Returns the text of `string` and writes its length in units to `len`.
    ///
    /// # Safety
    ///
    /// `string` is live; `len` is writable.
    unsafe fn string_info(
        &self,
        string: NonNull<StringHandle>,
        len: *mut c_int,
    ) -> *const NativeChar;

    /// # Safety
    ///
    /// `string` is live and is never used again.
    unsafe fn destroy_string(&self, string: NonNull<StringHandle>);

    /// Error kind of the last failed evaluation on `isolate`, when the
    /// engine reports one.
    ///
    /// # Safety
    ///
    /// `isolate` is live.
    unsafe fn last_error(&self, isolate: NonNull<IsolateHandle>) -> Option<ErrorKind> {
        _ = isolate;
        None
    }
}
