use std::{
    borrow::Cow,
    cell::RefCell,
    ffi::{CStr, CString, c_char},
};

use scriptcore::ErrorKind;

thread_local! {
    static LAST_ERROR: RefCell<Option<Error>> = const { RefCell::new(None) };
}

/// Message of the last error raised on the calling thread, or null.
///
/// The pointer stays valid until the next failing call on this thread.
#[unsafe(no_mangle)]
pub extern "C" fn scq_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow_mut()
            .as_mut()
            .map_or(std::ptr::null(), Error::c_error)
    })
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Unknown configuration key: {0}")]
    UnknownConfig(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{kind:?}: {message}")]
    Script { kind: ErrorKind, message: String },

    #[error("C Error")]
    C(ErrorCode, Cow<'static, CStr>),
}

pub type Result<T> = std::result::Result<T, Error>;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    InvalidArgument = 1,
    Internal = 2,
    NotInitialized = 3,
    Script = 4,
}

trait IntoCStr {
    fn into_cstr(self) -> Cow<'static, CStr>;
}

impl IntoCStr for String {
    fn into_cstr(self) -> Cow<'static, CStr> {
        CString::new(self).map_or_else(
            |_| c"invalid utf-8 error string".into(),
            std::convert::Into::into,
        )
    }
}

impl Error {
    fn c_error(&mut self) -> *const c_char {
        if let Self::C(_, msg) = self {
            return msg.as_ptr();
        }
        let code = ErrorCode::from(&*self);
        let msg = self.to_string().into_cstr();
        *self = Self::C(code, msg);
        self.c_error()
    }
}

pub fn set_last_error(err: Error) {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(err);
    });
}

impl From<&Error> for ErrorCode {
    fn from(result: &Error) -> Self {
        match &result {
            Error::InvalidArgument(_) | Error::UnknownConfig(_) | Error::InvalidConfig { .. } => {
                Self::InvalidArgument
            }
            Error::Internal(_) => Self::Internal,
            Error::NotInitialized => Self::NotInitialized,
            Error::Script { .. } => Self::Script,
            Error::C(code, _) => *code,
        }
    }
}
