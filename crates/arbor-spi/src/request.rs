//! Verb invocations addressed to a resource path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{RequestContext, ResourcePath, ResourceState};

/// The four resource verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// Create a member of the addressed resource.
    Create,
    /// Read the addressed resource.
    Read,
    /// Update the addressed resource, creating it when absent.
    Update,
    /// Delete the addressed resource.
    Delete,
}

/// Error returned when a verb name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown request type: {0}")]
pub struct RequestTypeParseError(pub String);

impl RequestType {
    /// Parses a verb name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`RequestTypeParseError`] for anything other than the four verbs.
    pub fn parse(value: &str) -> Result<Self, RequestTypeParseError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(RequestTypeParseError(value.to_owned())),
        }
    }

    /// Returns the canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = RequestTypeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

/// One verb invocation. Built once per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    request_type: RequestType,
    path: ResourcePath,
    state: Option<ResourceState>,
    context: RequestContext,
}

impl ResourceRequest {
    /// Starts building a request.
    #[must_use]
    pub fn builder(request_type: RequestType, path: ResourcePath) -> ResourceRequestBuilder {
        ResourceRequestBuilder {
            request_type,
            path,
            state: None,
            context: RequestContext::default(),
        }
    }

    /// The verb.
    #[must_use]
    pub const fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// The full target path.
    #[must_use]
    pub const fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Inbound state for create and update.
    #[must_use]
    pub const fn state(&self) -> Option<&ResourceState> {
        self.state.as_ref()
    }

    /// Requester context.
    #[must_use]
    pub const fn context(&self) -> &RequestContext {
        &self.context
    }
}

/// Builder for [`ResourceRequest`].
#[derive(Debug)]
pub struct ResourceRequestBuilder {
    request_type: RequestType,
    path: ResourcePath,
    state: Option<ResourceState>,
    context: RequestContext,
}

impl ResourceRequestBuilder {
    /// Sets the inbound state.
    #[must_use]
    pub fn state(mut self, state: ResourceState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the requester context.
    #[must_use]
    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Finishes the request.
    #[must_use]
    pub fn build(self) -> ResourceRequest {
        ResourceRequest {
            request_type: self.request_type,
            path: self.path,
            state: self.state,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("create", RequestType::Create)]
    #[case("READ", RequestType::Read)]
    #[case(" Update ", RequestType::Update)]
    #[case("delete", RequestType::Delete)]
    fn parses_verbs_case_insensitively(#[case] input: &str, #[case] expected: RequestType) {
        assert_eq!(RequestType::parse(input), Ok(expected));
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(RequestType::parse("patch").is_err());
    }

    #[test]
    fn builder_carries_every_field() {
        let state = ResourceState::new().with_id("bob");
        let request = ResourceRequest::builder(RequestType::Create, ResourcePath::new("/people"))
            .state(state.clone())
            .context(RequestContext::new().with_subject("alice"))
            .build();

        assert_eq!(request.request_type(), RequestType::Create);
        assert_eq!(request.path(), &ResourcePath::new("/people"));
        assert_eq!(request.state(), Some(&state));
        assert_eq!(request.context().subject(), Some("alice"));
    }
}
