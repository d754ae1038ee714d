use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for docmove operations.
///
/// The first four kinds are configuration errors: they are raised while the
/// changeset catalogue is read from disk, before any lock is taken or any
/// document is written.
///
/// # Examples
///
/// ```rust
/// use docmove::errors::{ErrorKind, MoveError, MoveResult};
///
/// fn example() -> MoveResult<()> {
///     Err(MoveError::new("no such directory", ErrorKind::InvalidPath))
/// }
///
/// assert!(example().unwrap_err().kind().is_configuration());
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Configuration errors
    /// The changesets root does not exist or is not a directory
    InvalidPath,
    /// A changeset has an extension that maps to no changeset type
    UnknownChangesetType,
    /// A changeset name does not follow `V<version>__<description>[.ext]`
    InvalidChangesetName,
    /// Two changesets share the same script name
    DuplicateChangeset,

    // Ledger validation errors
    /// An applied changeset's checksum no longer matches its content on disk
    DriftDetected,
    /// A changeset failed or was interrupted in a previous run and needs acknowledgement
    FailedChangeset,

    // Lock errors
    /// The migration lock could not be acquired in time
    LockTimeout,
    /// The migration lock is held by another owner
    LockNotOwned,

    // Execution errors
    /// A type handler failed while applying a changeset
    ExecutionError,
    /// The store rejected a query statement
    QueryError,

    // Store errors
    /// The requested document does not exist
    DocumentNotFound,
    /// A document already exists under the key
    DocumentExists,
    /// A compare-and-swap write saw a different document version
    CasMismatch,

    // IO and encoding errors
    /// Generic IO error
    IOError,
    /// Error encoding or decoding data
    EncodingError,

    /// Invalid argument or state
    ValidationError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl ErrorKind {
    /// Returns `true` for errors raised by a bad changesets root or malformed names.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidPath
                | ErrorKind::UnknownChangesetType
                | ErrorKind::InvalidChangesetName
                | ErrorKind::DuplicateChangeset
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidPath => write!(f, "Invalid path"),
            ErrorKind::UnknownChangesetType => write!(f, "Unknown changeset type"),
            ErrorKind::InvalidChangesetName => write!(f, "Invalid changeset name"),
            ErrorKind::DuplicateChangeset => write!(f, "Duplicate changeset"),
            ErrorKind::DriftDetected => write!(f, "Drift detected"),
            ErrorKind::FailedChangeset => write!(f, "Failed changeset"),
            ErrorKind::LockTimeout => write!(f, "Lock timeout"),
            ErrorKind::LockNotOwned => write!(f, "Lock not owned"),
            ErrorKind::ExecutionError => write!(f, "Execution error"),
            ErrorKind::QueryError => write!(f, "Query error"),
            ErrorKind::DocumentNotFound => write!(f, "Document not found"),
            ErrorKind::DocumentExists => write!(f, "Document exists"),
            ErrorKind::CasMismatch => write!(f, "CAS mismatch"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom docmove error type.
///
/// `MoveError` carries a message, an [`ErrorKind`], an optional cause and the
/// backtrace captured where it was created.
#[derive(Clone)]
pub struct MoveError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<MoveError>>,
    backtrace: Atomic<Backtrace>,
}

impl MoveError {
    /// Creates a new `MoveError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        MoveError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `MoveError` chained to the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: MoveError) -> Self {
        MoveError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&MoveError> {
        self.cause.as_deref()
    }

    /// Returns the innermost error of the cause chain.
    pub fn root_cause(&self) -> &MoveError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for MoveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for MoveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for MoveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// `MoveResult<T>` is shorthand for `Result<T, MoveError>`.
pub type MoveResult<T> = Result<T, MoveError>;

impl From<std::io::Error> for MoveError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::InvalidPath,
            _ => ErrorKind::IOError,
        };
        MoveError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<serde_json::Error> for MoveError {
    fn from(err: serde_json::Error) -> Self {
        MoveError::new(&format!("JSON error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<std::num::ParseIntError> for MoveError {
    fn from(err: std::num::ParseIntError) -> Self {
        MoveError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<regex::Error> for MoveError {
    fn from(err: regex::Error) -> Self {
        MoveError::new(&format!("Regex error: {}", err), ErrorKind::InternalError)
    }
}
