use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FirestoreErrorCode {
    InvalidArgument,
    OutOfRange,
    FailedPrecondition,
    MissingProjectId,
    Internal,
    NotFound,
    AlreadyExists,
    Aborted,
    PermissionDenied,
    Unauthenticated,
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
}

impl FirestoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirestoreErrorCode::InvalidArgument => "firestore/invalid-argument",
            FirestoreErrorCode::OutOfRange => "firestore/out-of-range",
            FirestoreErrorCode::FailedPrecondition => "firestore/failed-precondition",
            FirestoreErrorCode::MissingProjectId => "firestore/missing-project-id",
            FirestoreErrorCode::Internal => "firestore/internal",
            FirestoreErrorCode::NotFound => "firestore/not-found",
            FirestoreErrorCode::AlreadyExists => "firestore/already-exists",
            FirestoreErrorCode::Aborted => "firestore/aborted",
            FirestoreErrorCode::PermissionDenied => "firestore/permission-denied",
            FirestoreErrorCode::Unauthenticated => "firestore/unauthenticated",
            FirestoreErrorCode::Unavailable => "firestore/unavailable",
            FirestoreErrorCode::DeadlineExceeded => "firestore/deadline-exceeded",
            FirestoreErrorCode::ResourceExhausted => "firestore/resource-exhausted",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FirestoreError {
    pub code: FirestoreErrorCode,
    message: String,
    server: bool,
}

impl FirestoreError {
    pub fn new(code: FirestoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            server: false,
        }
    }

    /// Marks the error as reported by the Firestore backend.
    pub(crate) fn from_server(mut self) -> Self {
        self.server = true;
        self
    }

    /// Returns `true` when the backend produced this error in response to a request.
    pub fn is_server(&self) -> bool {
        self.server
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// The human readable message, as reported locally or by the server.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` for errors raised locally while validating caller input.
    ///
    /// Backend rejections carrying the same codes are reported by [`is_server`](Self::is_server)
    /// instead.
    pub fn is_validation(&self) -> bool {
        !self.server
            && matches!(
                self.code,
                FirestoreErrorCode::InvalidArgument
                    | FirestoreErrorCode::OutOfRange
                    | FirestoreErrorCode::FailedPrecondition
            )
    }

    pub fn is_not_found(&self) -> bool {
        self.code == FirestoreErrorCode::NotFound
    }
}

impl Display for FirestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for FirestoreError {}

pub type FirestoreResult<T> = Result<T, FirestoreError>;

pub fn invalid_argument(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::InvalidArgument, message)
}

pub fn out_of_range(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::OutOfRange, message)
}

pub fn failed_precondition(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::FailedPrecondition, message)
}

pub fn missing_project_id() -> FirestoreError {
    FirestoreError::new(
        FirestoreErrorCode::MissingProjectId,
        "Firestore settings must include a project_id",
    )
}

pub fn internal_error(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Internal, message)
}

pub fn not_found(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::NotFound, message)
}

pub fn already_exists(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::AlreadyExists, message)
}

pub fn aborted(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Aborted, message)
}

pub fn permission_denied(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::PermissionDenied, message)
}

pub fn unauthenticated(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Unauthenticated, message)
}

pub fn unavailable(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Unavailable, message)
}

pub fn deadline_exceeded(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::DeadlineExceeded, message)
}

pub fn resource_exhausted(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::ResourceExhausted, message)
}
