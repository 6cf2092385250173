//! The resource error taxonomy shared by container and client.

use thiserror::Error;

use crate::{RequestType, ResourcePath, ResponseType};

/// Terminal failures of a resource request.
///
/// Every kind except [`ResourceError::Internal`] carries the offending path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The requester may not perform this request.
    #[error("not authorized: {path}")]
    NotAuthorized {
        /// Requested path.
        path: ResourcePath,
    },
    /// No codec can produce the requested media type.
    #[error("not acceptable: {path}")]
    NotAcceptable {
        /// Requested path.
        path: ResourcePath,
    },
    /// A path segment did not resolve.
    #[error("no such resource: {path}")]
    NoSuchResource {
        /// Requested path.
        path: ResourcePath,
    },
    /// Creation collided with an existing member.
    #[error("resource already exists: {path}")]
    ResourceAlreadyExists {
        /// Requested path.
        path: ResourcePath,
    },
    /// The resolved resource does not support creating members.
    #[error("create not supported: {path}")]
    CreateNotSupported {
        /// Requested path.
        path: ResourcePath,
    },
    /// The resolved resource does not support reads.
    #[error("read not supported: {path}")]
    ReadNotSupported {
        /// Requested path.
        path: ResourcePath,
    },
    /// The resolved resource does not support updates.
    #[error("update not supported: {path}")]
    UpdateNotSupported {
        /// Requested path.
        path: ResourcePath,
    },
    /// The resolved resource does not support deletion.
    #[error("delete not supported: {path}")]
    DeleteNotSupported {
        /// Requested path.
        path: ResourcePath,
    },
    /// Anything else.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable detail.
        message: String,
    },
}

impl ResourceError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates the "verb not supported" error matching `request_type`.
    #[must_use]
    pub fn not_supported(request_type: RequestType, path: ResourcePath) -> Self {
        match request_type {
            RequestType::Create => Self::CreateNotSupported { path },
            RequestType::Read => Self::ReadNotSupported { path },
            RequestType::Update => Self::UpdateNotSupported { path },
            RequestType::Delete => Self::DeleteNotSupported { path },
        }
    }

    /// Maps a response kind onto the matching error.
    ///
    /// Returns `None` for [`ResponseType::Ok`]. Unrecognised kinds map to
    /// [`ResourceError::Internal`] so that no caller is left without an answer.
    #[must_use]
    pub fn from_response_type(
        response_type: ResponseType,
        path: ResourcePath,
        message: Option<&str>,
    ) -> Option<Self> {
        let error = match response_type {
            ResponseType::Ok => return None,
            ResponseType::NotAuthorized => Self::NotAuthorized { path },
            ResponseType::NotAcceptable => Self::NotAcceptable { path },
            ResponseType::NoSuchResource => Self::NoSuchResource { path },
            ResponseType::ResourceAlreadyExists => Self::ResourceAlreadyExists { path },
            ResponseType::CreateNotSupported => Self::CreateNotSupported { path },
            ResponseType::ReadNotSupported => Self::ReadNotSupported { path },
            ResponseType::UpdateNotSupported => Self::UpdateNotSupported { path },
            ResponseType::DeleteNotSupported => Self::DeleteNotSupported { path },
            ResponseType::InternalError => Self::internal(message.unwrap_or("internal error")),
            ResponseType::Unknown => Self::internal(format!(
                "unrecognised response type for {path}: {}",
                message.unwrap_or("no detail")
            )),
        };
        Some(error)
    }

    /// The response kind that carries this error over the wire.
    #[must_use]
    pub const fn response_type(&self) -> ResponseType {
        match self {
            Self::NotAuthorized { .. } => ResponseType::NotAuthorized,
            Self::NotAcceptable { .. } => ResponseType::NotAcceptable,
            Self::NoSuchResource { .. } => ResponseType::NoSuchResource,
            Self::ResourceAlreadyExists { .. } => ResponseType::ResourceAlreadyExists,
            Self::CreateNotSupported { .. } => ResponseType::CreateNotSupported,
            Self::ReadNotSupported { .. } => ResponseType::ReadNotSupported,
            Self::UpdateNotSupported { .. } => ResponseType::UpdateNotSupported,
            Self::DeleteNotSupported { .. } => ResponseType::DeleteNotSupported,
            Self::Internal { .. } => ResponseType::InternalError,
        }
    }

    /// The offending path, when the kind carries one.
    #[must_use]
    pub const fn path(&self) -> Option<&ResourcePath> {
        match self {
            Self::NotAuthorized { path }
            | Self::NotAcceptable { path }
            | Self::NoSuchResource { path }
            | Self::ResourceAlreadyExists { path }
            | Self::CreateNotSupported { path }
            | Self::ReadNotSupported { path }
            | Self::UpdateNotSupported { path }
            | Self::DeleteNotSupported { path } => Some(path),
            Self::Internal { .. } => None,
        }
    }
}
