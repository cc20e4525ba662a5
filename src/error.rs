//! Error types crossing the auth service boundary.

/// Errors returned by [`AuthService`](crate::AuthService) operations.
///
/// The transport layer maps each variant onto a status code and a fixed
/// message. Only [`Error::Internal`] carries a cause, and that cause is logged
/// server-side, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied data failed structural validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown email or wrong password. Both cases produce this variant.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A referenced entity is missing, or a conflicting one already exists,
    /// where the caller should not learn which.
    #[error("Invalid data")]
    InvalidData,

    /// A uniqueness constraint rejected the write.
    #[error("Already exists")]
    AlreadyExists,

    /// The referenced entity does not exist.
    #[error("Not found")]
    NotFound,

    /// The caller's administrative credential was rejected.
    #[error("Permission denied")]
    PermissionDenied,

    /// Any other fault: storage connectivity, hashing, signing, corrupt data.
    #[error("{op}: internal error")]
    Internal {
        /// Tag of the operation that failed.
        op: &'static str,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Wraps a low-level fault as [`Error::Internal`].
    pub fn internal<E>(op: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Internal {
            op,
            source: source.into(),
        }
    }
}

/// Result alias for auth service operations.
pub type Result<T> = std::result::Result<T, Error>;
