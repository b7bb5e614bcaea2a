//! Controller error types.

use thiserror::Error;
use tonic::{Code, Status};

/// Errors returned by the connector, the external client and the reconciler.
///
/// Remote failures keep the original [`Status`] as their source so callers
/// can tell which operation failed and why.
#[derive(Debug, Error)]
pub enum Error {
    /// The managed resource handed to an operation is not an instance.
    #[error("managed resource is not a CloudMemorystore instance")]
    NotInstance,

    /// Credentials could not be resolved or the client could not be built.
    #[error("cannot create new CloudMemorystore client: {0}")]
    Connect(String),

    #[error("cannot get CloudMemorystore instance: {}", .0.message())]
    Observe(#[source] Status),

    #[error("cannot create CloudMemorystore instance: {}", .0.message())]
    Create(#[source] Status),

    #[error("cannot update CloudMemorystore instance: {}", .0.message())]
    Update(#[source] Status),

    #[error("cannot delete CloudMemorystore instance: {}", .0.message())]
    Delete(#[source] Status),

    /// The caller's context was cancelled or its deadline passed. Holds the
    /// remote status when the provider reported the cancellation.
    #[error("operation cancelled")]
    Cancelled(#[source] Option<Status>),
}

impl Error {
    /// The remote status wrapped by this error, if any.
    pub fn remote_status(&self) -> Option<&Status> {
        match self {
            Error::Observe(s) | Error::Create(s) | Error::Update(s) | Error::Delete(s) => Some(s),
            Error::Cancelled(s) => s.as_ref(),
            _ => None,
        }
    }

    /// Wrap a remote status, classifying cancellation separately.
    pub(crate) fn remote(status: Status, wrap: fn(Status) -> Error) -> Error {
        if is_cancelled(&status) {
            Error::Cancelled(Some(status))
        } else {
            wrap(status)
        }
    }
}

/// Whether the remote API reported that the resource does not exist.
pub fn is_not_found(status: &Status) -> bool {
    status.code() == Code::NotFound
}

/// Whether the remote call was abandoned because of cancellation or a deadline.
pub fn is_cancelled(status: &Status) -> bool {
    matches!(status.code(), Code::Cancelled | Code::DeadlineExceeded)
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;
