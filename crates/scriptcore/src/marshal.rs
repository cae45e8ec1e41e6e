use std::{ffi::c_int, ptr::NonNull};

use crate::native::{NativeBoundary, StringHandle};

/// A native evaluation result that has not been copied out yet.
///
/// Owns the native handle; dropping it performs the one release call, so the
/// handle is freed on every path out of [`materialize`].
pub struct EvaluatedString<'a, B: NativeBoundary> {
    boundary: &'a B,
    handle: NonNull<StringHandle>,
}

impl<'a, B: NativeBoundary> EvaluatedString<'a, B> {
    /// Takes ownership of `handle`. Null means "no result".
    ///
    /// # Safety
    ///
    /// A non-null `handle` must be a live string handle produced by
    /// `boundary` and not owned by anything else.
    pub unsafe fn from_raw(boundary: &'a B, handle: *mut StringHandle) -> Option<Self> {
        NonNull::new(handle).map(|handle| Self { boundary, handle })
    }

    /// Copies the text into host memory, releasing the native handle.
    #[must_use]
    pub fn into_string(self) -> String {
        let mut len: c_int = 0;
        let ptr = unsafe { self.boundary.string_info(self.handle, &raw mut len) };
        let Ok(len) = usize::try_from(len) else {
            return String::new();
        };
        if ptr.is_null() || len == 0 {
            return String::new();
        }
        // SAFETY: the boundary guarantees `len` readable units at `ptr` until
        // the handle is released, which happens when `self` drops below.
        let units = unsafe { std::slice::from_raw_parts(ptr, len) };
        String::from_utf16_lossy(units)
    }
}

impl<B: NativeBoundary> Drop for EvaluatedString<'_, B> {
    fn drop(&mut self) {
        unsafe { self.boundary.destroy_string(self.handle) };
    }
}

/// Converts a native evaluation result into host-owned text.
///
/// A null handle yields `None` without any native call.
///
/// # Safety
///
/// Same contract as [`EvaluatedString::from_raw`]. The handle must not be
/// used after this call.
pub unsafe fn materialize<B: NativeBoundary>(
    boundary: &B,
    handle: *mut StringHandle,
) -> Option<String> {
    unsafe { EvaluatedString::from_raw(boundary, handle) }.map(EvaluatedString::into_string)
}
