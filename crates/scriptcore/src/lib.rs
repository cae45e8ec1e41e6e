//! Lifecycle and marshaling layer over an embedded script engine.
//!
//! The engine is reached through opaque native handles (see [`native`]).
//! This crate owns the ordering rules around them:
//!
//! 1. [`ProcessRuntime::init`] before any isolate exists.
//! 2. [`Engine::new`] creates an isolate and its context.
//! 3. [`Engine::enter`] / [`Engine::eval`] / [`Engine::leave`], any number
//!    of times.
//! 4. Dropping or closing the engine destroys the context, then the isolate.
//! 5. [`ProcessRuntime::cleanup`] once every engine is gone.
//!
//! ```ignore
//! let runtime = ProcessRuntime::initialize(boundary)?;
//! let mut engine = Engine::new(&runtime)?;
//! let scope = engine.scope()?;
//! assert_eq!(scope.eval("2 + 2")?.as_deref(), Some("4"));
//! drop(scope);
//! drop(engine);
//! runtime.cleanup()?;
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod isolate;
pub mod marshal;
pub mod native;
pub mod runtime;

pub const TRACE_TARGET: &str = "scriptcore::lifecycle";

pub use context::ExecutionContext;
pub use engine::{DetachedEngine, Engine, EngineScope, EngineState};
pub use error::{Error, Result};
pub use isolate::Isolate;
pub use marshal::{EvaluatedString, materialize};
pub use native::{ErrorKind, NativeApi, NativeBoundary};
pub use runtime::ProcessRuntime;
