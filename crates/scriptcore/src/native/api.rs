use std::{ffi::c_int, ptr::NonNull};

use super::{ContextHandle, ErrorKind, IsolateHandle, NativeBoundary, NativeChar, StringHandle};

/// Function table of a native engine library exposing the C entry points.
///
/// How the table is filled (static linking, a loaded shared object) is up to
/// the integrator.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct NativeApi {
    pub init: unsafe extern "C" fn() -> bool,
    pub cleanup: unsafe extern "C" fn(),
    pub new_isolate: unsafe extern "C" fn() -> *mut IsolateHandle,
    pub destroy_isolate: unsafe extern "C" fn(*mut IsolateHandle),
    pub enter_isolate: unsafe extern "C" fn(*mut IsolateHandle),
    pub leave_isolate: unsafe extern "C" fn(*mut IsolateHandle),
    pub new_context: unsafe extern "C" fn(*mut IsolateHandle) -> *mut ContextHandle,
    pub enter_context: unsafe extern "C" fn(*mut ContextHandle),
    pub leave_context: unsafe extern "C" fn(*mut ContextHandle),
    pub destroy_context: unsafe extern "C" fn(*mut ContextHandle),
    pub eval_as_string: unsafe extern "C" fn(
        *mut IsolateHandle,
        *mut ContextHandle,
        *const NativeChar,
    ) -> *mut StringHandle,
    pub string_info: unsafe extern "C" fn(*mut StringHandle, *mut c_int) -> *const NativeChar,
    pub destroy_string: unsafe extern "C" fn(*mut StringHandle),
    /// Optional: returns the raw [`ErrorKind`] of the last failed evaluation,
    /// or a negative value when there is none.
    pub last_error_kind: Option<unsafe extern "C" fn(*mut IsolateHandle) -> c_int>,
}

impl std::fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field("last_error_kind", &self.last_error_kind.is_some())
            .finish_non_exhaustive()
    }
}

// SAFETY: the table's functions are the engine's own entry points; the
// contract of `NativeBoundary` is the contract of the C functions.
unsafe impl NativeBoundary for NativeApi {
    fn library_id(&self) -> usize {
        self.init as usize
    }

    fn init(&self) -> bool {
        unsafe { (self.init)() }
    }

    fn cleanup(&self) {
        unsafe { (self.cleanup)() }
    }

    fn new_isolate(&self) -> *mut IsolateHandle {
        unsafe { (self.new_isolate)() }
    }

    unsafe fn destroy_isolate(&self, isolate: NonNull<IsolateHandle>) {
        unsafe { (self.destroy_isolate)(isolate.as_ptr()) }
    }

    unsafe fn enter_isolate(&self, isolate: NonNull<IsolateHandle>) {
        unsafe { (self.enter_isolate)(isolate.as_ptr()) }
    }

    unsafe fn leave_isolate(&self, isolate: NonNull<IsolateHandle>) {
        unsafe { (self.leave_isolate)(isolate.as_ptr()) }
    }

    unsafe fn new_context(&self, isolate: NonNull<IsolateHandle>) -> *mut ContextHandle {
        unsafe { (self.new_context)(isolate.as_ptr()) }
    }

    unsafe fn enter_context(&self, context: NonNull<ContextHandle>) {
        unsafe { (self.enter_context)(context.as_ptr()) }
    }

    unsafe fn leave_context(&self, context: NonNull<ContextHandle>) {
        unsafe { (self.leave_context)(context.as_ptr()) }
    }

    unsafe fn destroy_context(&self, context: NonNull<ContextHandle>) {
        unsafe { (self.destroy_context)(context.as_ptr()) }
    }

    unsafe fn eval_as_string(
        &self,
        isolate: NonNull<IsolateHandle>,
        context: NonNull<ContextHandle>,
        source: *const NativeChar,
    ) -> *mut StringHandle {
        unsafe { (self.eval_as_string)(isolate.as_ptr(), context.as_ptr(), source) }
    }

    unsafe fn string_info(
        &self,
        string: NonNull<StringHandle>,
        len: *mut c_int,
    ) -> *const NativeChar {
        unsafe { (self.string_info)(string.as_ptr(), len) }
    }

    unsafe fn destroy_string(&self, string: NonNull<StringHandle>) {
        unsafe { (self.destroy_string)(string.as_ptr()) }
    }

    unsafe fn last_error(&self, isolate: NonNull<IsolateHandle>) -> Option<ErrorKind> {
        let last_error_kind = self.last_error_kind?;
        ErrorKind::from_raw(unsafe { last_error_kind(isolate.as_ptr()) })
    }
}
