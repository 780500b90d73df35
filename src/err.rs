use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvtcError>;

/// Coarse classification of every failure the compiler can report.
///
/// All of them are fatal: the first error aborts the whole compilation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidContent,
    FileLoadFailure,
    MethodNotUnderstood,
    InternalError,
}

#[derive(Debug, Error)]
pub enum EvtcError {
    /// Malformed clause syntax, bad argument counts, unresolved references,
    /// conflicting redefinitions and index range/collision failures.
    #[error("invalid content: {message}")]
    InvalidContent { message: String },

    #[error("failed to load file `{path}`")]
    FileLoadFailure { path: String },

    #[error("method `{method}` is not understood")]
    MethodNotUnderstood { method: String },

    #[error("internal error: {message}")]
    InternalError { message: String },

    #[error("failed to parse JSON document `{path}`: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    // `quick-xml` keeps the element stack for us, structural errors and decoding
    // errors both end up here.
    #[error("failed to parse XML document `{path}`: {message}")]
    Xml { path: String, message: String },
}

impl EvtcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvtcError::InvalidContent { .. } | EvtcError::Json { .. } | EvtcError::Xml { .. } => {
                ErrorKind::InvalidContent
            }
            EvtcError::FileLoadFailure { .. } => ErrorKind::FileLoadFailure,
            EvtcError::MethodNotUnderstood { .. } => ErrorKind::MethodNotUnderstood,
            EvtcError::InternalError { .. } => ErrorKind::InternalError,
        }
    }

    pub fn invalid_content(message: impl Into<String>) -> Self {
        EvtcError::InvalidContent {
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        EvtcError::InternalError {
            message: message.into(),
        }
    }

    pub(crate) fn xml(path: &str, err: impl std::fmt::Display) -> Self {
        EvtcError::Xml {
            path: path.to_owned(),
            message: format!("{}", err),
        }
    }
}

/// Builds an `InvalidContent` error from a format string, inspired by failure's `format_err!` macro.
#[macro_export]
macro_rules! invalid_content {
    ($($arg:tt)*) => { $crate::err::EvtcError::invalid_content(format!($($arg)*)) }
}
