//! Terminal outcomes of resource requests as observed by requesters.

use serde::{Deserialize, Serialize};

use crate::{ResourceError, ResourcePath, ResourceState};

/// Outcome kind of a request: success or one of the error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// The request succeeded.
    Ok,
    /// See [`ResourceError::NotAuthorized`].
    NotAuthorized,
    /// See [`ResourceError::NotAcceptable`].
    NotAcceptable,
    /// See [`ResourceError::NoSuchResource`].
    NoSuchResource,
    /// See [`ResourceError::ResourceAlreadyExists`].
    ResourceAlreadyExists,
    /// See [`ResourceError::CreateNotSupported`].
    CreateNotSupported,
    /// See [`ResourceError::ReadNotSupported`].
    ReadNotSupported,
    /// See [`ResourceError::UpdateNotSupported`].
    UpdateNotSupported,
    /// See [`ResourceError::DeleteNotSupported`].
    DeleteNotSupported,
    /// See [`ResourceError::Internal`].
    InternalError,
    /// A kind this build does not recognise, typically from a newer peer.
    #[serde(other)]
    Unknown,
}

/// Terminal response to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceResponse {
    response_type: ResponseType,
    path: ResourcePath,
    state: Option<ResourceState>,
    message: Option<String>,
}

impl ResourceResponse {
    /// Builds a raw response.
    #[must_use]
    pub const fn new(
        response_type: ResponseType,
        path: ResourcePath,
        state: Option<ResourceState>,
        message: Option<String>,
    ) -> Self {
        Self {
            response_type,
            path,
            state,
            message,
        }
    }

    /// Builds a successful response.
    #[must_use]
    pub const fn ok(path: ResourcePath, state: ResourceState) -> Self {
        Self::new(ResponseType::Ok, path, Some(state), None)
    }

    /// Builds an error response for `path`.
    #[must_use]
    pub fn error(path: ResourcePath, error: &ResourceError) -> Self {
        let message = match error {
            ResourceError::Internal { message } => Some(message.clone()),
            _ => None,
        };
        Self::new(error.response_type(), path, None, message)
    }

    /// Outcome kind.
    #[must_use]
    pub const fn response_type(&self) -> ResponseType {
        self.response_type
    }

    /// Path of the original request.
    #[must_use]
    pub const fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Resulting state on success.
    #[must_use]
    pub const fn state(&self) -> Option<&ResourceState> {
        self.state.as_ref()
    }

    /// Detail for internal errors.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Converts into the state on success or the matching error otherwise.
    ///
    /// # Errors
    ///
    /// Returns the [`ResourceError`] matching the response kind.
    pub fn into_result(self) -> Result<ResourceState, ResourceError> {
        match ResourceError::from_response_type(
            self.response_type,
            self.path,
            self.message.as_deref(),
        ) {
            Some(error) => Err(error),
            None => Ok(self.state.unwrap_or_default()),
        }
    }
}
