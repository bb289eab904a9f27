use core::fmt;
use std::sync::Arc;

/// Failure categories surfaced by builtin resolution and execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Resolution / dispatch
    ArityMismatch,
    ArgumentTypeMismatch,
    UnknownFunction,
    // Registration
    DuplicateFunction,
    InvalidDescriptor,
    // Cached resources
    UnknownHandle,
    TypeMismatch,
    IndexOutOfRange,
    // Files and payloads
    FileNotFound,
    IOFailure,
    MalformedDocument,
    UnsupportedEncoding,
    // Special variables
    UndefinedVariable,
    ReadOnlyVariable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ArityMismatch => "ArityMismatch",
            ErrorCode::ArgumentTypeMismatch => "ArgumentTypeMismatch",
            ErrorCode::UnknownFunction => "UnknownFunction",
            ErrorCode::DuplicateFunction => "DuplicateFunction",
            ErrorCode::InvalidDescriptor => "InvalidDescriptor",
            ErrorCode::UnknownHandle => "UnknownHandle",
            ErrorCode::TypeMismatch => "TypeMismatch",
            ErrorCode::IndexOutOfRange => "IndexOutOfRange",
            ErrorCode::FileNotFound => "FileNotFound",
            ErrorCode::IOFailure => "IOFailure",
            ErrorCode::MalformedDocument => "MalformedDocument",
            ErrorCode::UnsupportedEncoding => "UnsupportedEncoding",
            ErrorCode::UndefinedVariable => "UndefinedVariable",
            ErrorCode::ReadOnlyVariable => "ReadOnlyVariable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>, // optional chained cause
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    /// Compose an error with a source cause.
    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::TypeMismatch, msg)
    }

    pub fn unknown_handle(handle: &str) -> Self {
        Self::from_code(
            ErrorCode::UnknownHandle,
            format!("unknown resource handle '{handle}'"),
        )
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::from_code(ErrorCode::IOFailure, e.to_string())
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::from_code(ErrorCode::MalformedDocument, format!("malformed XML: {e}"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.code)
    }
}
