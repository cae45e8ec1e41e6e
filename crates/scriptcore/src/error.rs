use thiserror::Error;

use crate::native::ErrorKind;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Native init failed or a native allocation returned null.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Call order violated; rejected before reaching the engine.
    #[error("misuse: {0}")]
    Misuse(&'static str),

    /// Required setup has not completed (or has already been torn down).
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Script raised an error. Only produced when the engine reports error
    /// kinds; otherwise a failed evaluation is indistinguishable from an
    /// evaluation without result.
    #[error("script error: {kind:?}")]
    Script { kind: ErrorKind },
}
