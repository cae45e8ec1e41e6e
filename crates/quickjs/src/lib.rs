//! Native engine library built on QuickJS.
//!
//! Exposes the C entry points expected by [`scriptcore`] (isolates, contexts,
//! evaluation to string) and a ready-made [`NativeApi`] table for Rust
//! callers. Engine state is process-global: call [`scq_init`] once before
//! creating isolates and [`scq_cleanup`] after the last one is destroyed.

use std::{
    ffi::{CStr, c_char, c_int},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use scriptcore::{
    NativeApi, TRACE_TARGET,
    native::{ContextHandle, IsolateHandle, NativeChar, StringHandle},
};
use tracing::{debug, warn};

use crate::{
    error::{Error, ErrorCode, set_last_error},
    state::{ContextState, IsolateState, NO_ERROR, TextBuffer},
};

pub use config::QuickJsConfig;
pub use error::scq_last_error;

macro_rules! c_try {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => {
                let code = $crate::error::ErrorCode::from(&e);
                $crate::error::set_last_error(e);
                return code;
            }
        }
    };
}

pub mod config;
pub mod error;
mod state;

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static LIVE_ISOLATES: AtomicUsize = AtomicUsize::new(0);
static CONFIG: Mutex<QuickJsConfig> = Mutex::new(QuickJsConfig::DEFAULT);

/// The entry points of this library as a function table.
#[must_use]
pub fn api() -> NativeApi {
    NativeApi {
        init: scq_init,
        cleanup: scq_cleanup,
        new_isolate: scq_new_isolate,
        destroy_isolate: scq_destroy_isolate,
        enter_isolate: scq_enter_isolate,
        leave_isolate: scq_leave_isolate,
        new_context: scq_new_context,
        enter_context: scq_enter_context,
        leave_context: scq_leave_context,
        destroy_context: scq_destroy_context,
        eval_as_string: scq_eval_as_string,
        string_info: scq_string_info,
        destroy_string: scq_destroy_string,
        last_error_kind: Some(scq_last_error_kind),
    }
}

/// Current configuration. Changes made after init do not apply.
#[must_use]
pub fn config() -> QuickJsConfig {
    *CONFIG.lock()
}

/// Sets a configuration value. Only allowed before [`scq_init`].
///
/// # Safety
///
/// The caller must ensure that both `key` and `value` are valid,
/// null-terminated C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_config_set(key: *const c_char, value: *const c_char) -> ErrorCode {
    if key.is_null() || value.is_null() {
        set_last_error(Error::InvalidArgument("null configuration key or value"));
        return ErrorCode::InvalidArgument;
    }
    let key = unsafe { CStr::from_ptr(key) };
    let value = unsafe { CStr::from_ptr(value) };
    let key = c_try!(
        key.to_str()
            .map_err(|_| Error::InvalidArgument("Invalid key string"))
    );
    let value = c_try!(
        value
            .to_str()
            .map_err(|_| Error::InvalidArgument("Invalid value string"))
    );
    if INITIALIZED.load(Ordering::Acquire) {
        set_last_error(Error::InvalidArgument("configuration is fixed after init"));
        return ErrorCode::InvalidArgument;
    }
    c_try!(CONFIG.lock().set(key, value));
    ErrorCode::Ok
}

/// Initializes the engine. Returns `false` if the configuration from the
/// environment is invalid. Calling it again after success is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn scq_init() -> bool {
    let mut config = CONFIG.lock();
    if INITIALIZED.load(Ordering::Acquire) {
        return true;
    }
    if let Err(err) = config.apply_env() {
        set_last_error(err);
        return false;
    }
    INITIALIZED.store(true, Ordering::Release);
    debug!(target: TRACE_TARGET, config = ?*config, "quickjs initialized");
    true
}

/// Releases global engine state. Refused while isolates are alive; the
/// reason is left in [`scq_last_error`].
#[unsafe(no_mangle)]
pub extern "C" fn scq_cleanup() {
    let _config = CONFIG.lock();
    let live = LIVE_ISOLATES.load(Ordering::Acquire);
    if live > 0 {
        warn!(target: TRACE_TARGET, live, "quickjs cleanup refused: isolates alive");
        set_last_error(Error::InvalidArgument("cleanup while isolates are alive"));
        return;
    }
    if INITIALIZED.swap(false, Ordering::AcqRel) {
        debug!(target: TRACE_TARGET, "quickjs cleaned up");
    }
}

/// Creates an isolate, or returns null before init or on allocation
/// failure.
#[unsafe(no_mangle)]
pub extern "C" fn scq_new_isolate() -> *mut IsolateHandle {
    if !INITIALIZED.load(Ordering::Acquire) {
        set_last_error(Error::NotInitialized);
        return std::ptr::null_mut();
    }
    match IsolateState::new(&config()) {
        Ok(state) => {
            LIVE_ISOLATES.fetch_add(1, Ordering::AcqRel);
            Box::into_raw(Box::new(state)).cast()
        }
        Err(err) => {
            set_last_error(err);
            std::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `isolate` is null or a live isolate from [`scq_new_isolate`] whose
/// context has been destroyed. It must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_destroy_isolate(isolate: *mut IsolateHandle) {
    if !isolate.is_null() {
        drop(unsafe { Box::from_raw(isolate.cast::<IsolateState>()) });
        LIVE_ISOLATES.fetch_sub(1, Ordering::AcqRel);
    }
}

/// # Safety
///
/// `isolate` is null or a live isolate.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_enter_isolate(isolate: *mut IsolateHandle) {
    if let Some(isolate) = unsafe { isolate.cast::<IsolateState>().as_ref() } {
        isolate.entered.set(true);
    }
}

/// # Safety
///
/// `isolate` is null or a live isolate.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_leave_isolate(isolate: *mut IsolateHandle) {
    if let Some(isolate) = unsafe { isolate.cast::<IsolateState>().as_ref() } {
        isolate.entered.set(false);
    }
}

/// Creates a context in `isolate`, or returns null on failure.
///
/// # Safety
///
/// `isolate` is null or a live isolate.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_new_context(isolate: *mut IsolateHandle) -> *mut ContextHandle {
    let Some(isolate) = (unsafe { isolate.cast::<IsolateState>().as_ref() }) else {
        set_last_error(Error::InvalidArgument("null isolate"));
        return std::ptr::null_mut();
    };
    match ContextState::new(isolate) {
        Ok(state) => Box::into_raw(Box::new(state)).cast(),
        Err(err) => {
            set_last_error(err);
            std::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `context` is null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_enter_context(context: *mut ContextHandle) {
    if let Some(context) = unsafe { context.cast::<ContextState>().as_ref() } {
        context.entered.set(true);
    }
}

/// # Safety
///
/// `context` is null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_leave_context(context: *mut ContextHandle) {
    if let Some(context) = unsafe { context.cast::<ContextState>().as_ref() } {
        context.entered.set(false);
    }
}

/// # Safety
///
/// `context` is null or a live context; it must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_destroy_context(context: *mut ContextHandle) {
    if !context.is_null() {
        drop(unsafe { Box::from_raw(context.cast::<ContextState>()) });
    }
}

/// Evaluates NUL-terminated UTF-16 `source` in `context`.
///
/// Returns null when the result is `undefined` or the script throws; in the
/// latter case [`scq_last_error_kind`] reports the error kind.
///
/// # Safety
///
/// `isolate` and `context` are null or live handles, `context` belongs to
/// `isolate`, and `source` is null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_eval_as_string(
    isolate: *mut IsolateHandle,
    context: *mut ContextHandle,
    source: *const NativeChar,
) -> *mut StringHandle {
    let (Some(isolate), Some(context)) = (unsafe {
        (
            isolate.cast::<IsolateState>().as_ref(),
            context.cast::<ContextState>().as_ref(),
        )
    }) else {
        set_last_error(Error::InvalidArgument("null isolate or context"));
        return std::ptr::null_mut();
    };
    isolate.last_error.set(NO_ERROR);
    if !isolate.entered.get() || !context.entered.get() {
        set_last_error(Error::InvalidArgument("isolate and context must be entered"));
        return std::ptr::null_mut();
    }
    if source.is_null() {
        set_last_error(Error::InvalidArgument("null source"));
        return std::ptr::null_mut();
    }

    let code = String::from_utf16_lossy(unsafe { wide_str(source) });
    match context.eval(code) {
        Ok(Some(text)) => Box::into_raw(Box::new(TextBuffer::new(&text))).cast(),
        Ok(None) => std::ptr::null_mut(),
        Err(err) => {
            if let Error::Script { kind, message } = &err {
                debug!(target: TRACE_TARGET, ?kind, %message, "script raised");
                isolate.last_error.set(kind.as_raw());
            }
            set_last_error(err);
            std::ptr::null_mut()
        }
    }
}

/// Returns the text of `string` and stores its length in UTF-16 units in
/// `len`. The pointer is valid until [`scq_destroy_string`].
///
/// # Safety
///
/// `string` is null or a live string handle; `len` is null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_string_info(
    string: *mut StringHandle,
    len: *mut c_int,
) -> *const NativeChar {
    let buffer = unsafe { string.cast::<TextBuffer>().as_ref() };
    let (ptr, units) = buffer.map_or((std::ptr::null(), 0), |buffer| {
        (buffer.units.as_ptr(), buffer.units.len())
    });
    if !len.is_null() {
        unsafe { len.write(c_int::try_from(units).unwrap_or(c_int::MAX)) };
    }
    ptr
}

/// # Safety
///
/// `string` is null or a live string handle; it must not be used
/// afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_destroy_string(string: *mut StringHandle) {
    if !string.is_null() {
        drop(unsafe { Box::from_raw(string.cast::<TextBuffer>()) });
    }
}

/// Error kind of the last failed evaluation in `isolate`, or `-1`.
///
/// # Safety
///
/// `isolate` is null or a live isolate.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn scq_last_error_kind(isolate: *mut IsolateHandle) -> c_int {
    unsafe { isolate.cast::<IsolateState>().as_ref() }
        .map_or(NO_ERROR, |isolate| isolate.last_error.get())
}

/// The units of a NUL-terminated wide string, without the terminator.
unsafe fn wide_str<'a>(source: *const NativeChar) -> &'a [NativeChar] {
    let mut len = 0;
    while unsafe { *source.add(len) } != 0 {
        len += 1;
    }
    unsafe { std::slice::from_raw_parts(source, len) }
}
