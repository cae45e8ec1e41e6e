use std::{cell::Cell, ffi::c_int};

use rquickjs::{Context, Ctx, Exception, Function, Runtime, Value};
use scriptcore::ErrorKind;

use crate::{
    config::QuickJsConfig,
    error::{Error, Result},
};

pub const NO_ERROR: c_int = -1;

pub struct IsolateState {
    runtime: Runtime,
    pub entered: Cell<bool>,
    pub last_error: Cell<c_int>,
}

impl IsolateState {
    pub fn new(config: &QuickJsConfig) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| Error::Internal(format!("failed to create QuickJS runtime: {e}")))?;
        runtime.set_memory_limit(config.memory_limit);
        runtime.set_max_stack_size(config.max_stack_size);
        if config.gc_threshold > 0 {
            runtime.set_gc_threshold(config.gc_threshold);
        }
        Ok(Self {
            runtime,
            entered: Cell::new(false),
            last_error: Cell::new(NO_ERROR),
        })
    }
}

pub struct ContextState {
    context: Context,
    pub entered: Cell<bool>,
}

impl ContextState {
    pub fn new(isolate: &IsolateState) -> Result<Self> {
        let context = Context::full(&isolate.runtime)
            .map_err(|e| Error::Internal(format!("failed to create QuickJS context: {e}")))?;
        Ok(Self {
            context,
            entered: Cell::new(false),
        })
    }

    /// Evaluates `code` and renders the completion value with `String()`.
    /// `undefined` yields `None`.
    pub fn eval(&self, code: String) -> Result<Option<String>> {
        self.context.with(|ctx| -> Result<Option<String>> {
            let value: Value<'_> = ctx.eval(code).map_err(|_| from_js_catch(&ctx))?;
            if value.is_undefined() {
                return Ok(None);
            }
            let to_string: Function<'_> = ctx
                .globals()
                .get("String")
                .map_err(|_| from_js_catch(&ctx))?;
            let text: String = to_string
                .call((value,))
                .map_err(|_| from_js_catch(&ctx))?;
            Ok(Some(text))
        })
    }
}

/// An evaluation result handed out as a string handle.
pub struct TextBuffer {
    pub units: Box<[u16]>,
}

impl TextBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            units: text.encode_utf16().collect(),
        }
    }
}

fn from_js_catch(ctx: &Ctx<'_>) -> Error {
    let caught = ctx.catch();
    let name = caught
        .as_object()
        .and_then(|obj| obj.get::<_, String>("name").ok());
    let message = caught
        .as_exception()
        .and_then(Exception::message)
        .unwrap_or_else(|| format!("{caught:?}"));
    Error::Script {
        kind: classify(name.as_deref()),
        message,
    }
}

fn classify(name: Option<&str>) -> ErrorKind {
    match name {
        Some("RangeError") => ErrorKind::RangeError,
        Some("ReferenceError") => ErrorKind::ReferenceError,
        Some("SyntaxError") => ErrorKind::SyntaxError,
        Some("TypeError") => ErrorKind::TypeError,
        _ => ErrorKind::GenericError,
    }
}
