//! JSONL framing for requests and responses exchanged over a socket.
//!
//! Each message occupies one line. Requests carry a client-chosen `id` that
//! the matching response echoes, so several requests may be in flight on one
//! connection:
//!
//! ```json
//! {"id":7,"verb":"read","path":"/people/bob"}
//! {"id":7,"response_type":"ok","path":"/people/bob","state":{"id":"bob"}}
//! ```
//!
//! Subscription commands share the line format and are answered like
//! requests. Lifecycle events for a connection's subscriptions arrive as
//! push lines, which carry no `id`:
//!
//! ```json
//! {"id":8,"command":"subscribe","subscription":"s1","destination":"/people"}
//! {"id":8,"response_type":"ok","path":"/people"}
//! {"event":"create","subscription":"s1","content_type":"application/json","status":200,"location":"/people/bob","body":"{\"id\":\"bob\"}"}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    MediaType, RequestContext, RequestType, ResourcePath, ResourceRequest, ResourceResponse,
    ResourceState, ResponseType,
};

/// Identifier used for responses to lines that could not be parsed.
pub const UNPARSED_REQUEST_ID: u64 = 0;

/// Failures reading a wire line.
#[derive(Debug, Error)]
pub enum WireError {
    /// The line held nothing but whitespace.
    #[error("empty line")]
    Empty,
    /// The line was not a valid message.
    #[error("malformed line: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A request as framed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    /// Correlation id echoed by the response.
    pub id: u64,
    /// The verb.
    pub verb: RequestType,
    /// Target path.
    pub path: ResourcePath,
    /// Inbound state for create and update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    /// Requester identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Preferred media type for the response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<MediaType>,
}

impl WireRequest {
    /// Frames `request` under `id`.
    #[must_use]
    pub fn from_request(id: u64, request: &ResourceRequest) -> Self {
        Self {
            id,
            verb: request.request_type(),
            path: request.path().clone(),
            state: request.state().cloned(),
            subject: request.context().subject().map(str::to_owned),
            accept: request.context().accept().cloned(),
        }
    }

    /// Unframes into the id and request.
    #[must_use]
    pub fn into_request(self) -> (u64, ResourceRequest) {
        let mut context = RequestContext::new();
        if let Some(subject) = self.subject {
            context = context.with_subject(subject);
        }
        if let Some(accept) = self.accept {
            context = context.with_accept(accept);
        }
        let mut builder = ResourceRequest::builder(self.verb, self.path).context(context);
        if let Some(state) = self.state {
            builder = builder.state(state);
        }
        (self.id, builder.build())
    }

    /// Parses one line, ignoring trailing whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] for blank or malformed lines.
    pub fn parse(line: &[u8]) -> Result<Self, WireError> {
        parse_line(line)
    }

    /// Serializes as a newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Malformed`] when serialization fails.
    pub fn to_line(&self) -> Result<Vec<u8>, WireError> {
        to_line(self)
    }
}

/// A subscription command as framed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WireCommand {
    /// Registers a subscription on the sending connection.
    Subscribe {
        /// Correlation id echoed by the response.
        id: u64,
        /// Connection-scoped subscription id.
        subscription: String,
        /// Resource or collection to watch.
        destination: ResourcePath,
        /// Encoding for pushed state; JSON when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<MediaType>,
    },
    /// Removes one of the sending connection's subscriptions.
    Unsubscribe {
        /// Correlation id echoed by the response.
        id: u64,
        /// Connection-scoped subscription id.
        subscription: String,
    },
}

impl WireCommand {
    /// Correlation id of this command.
    #[must_use]
    pub const fn id(&self) -> u64 {
        match self {
            Self::Subscribe { id, .. } | Self::Unsubscribe { id, .. } => *id,
        }
    }

    /// Serializes as a newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Malformed`] when serialization fails.
    pub fn to_line(&self) -> Result<Vec<u8>, WireError> {
        to_line(self)
    }
}

/// Any line a client may send.
#[derive(Debug, Clone, PartialEq)]
pub enum WireInbound {
    /// A resource request.
    Request(WireRequest),
    /// A subscription command.
    Command(WireCommand),
}

impl WireInbound {
    /// Parses one line, telling commands from requests by their `command`
    /// field.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] for blank or malformed lines.
    pub fn parse(line: &[u8]) -> Result<Self, WireError> {
        let value: serde_json::Value = parse_line(line)?;
        if value.get("command").is_some() {
            Ok(Self::Command(serde_json::from_value(value)?))
        } else {
            Ok(Self::Request(serde_json::from_value(value)?))
        }
    }
}

/// A lifecycle event pushed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePush {
    /// `create`, `update`, or `delete`.
    pub event: String,
    /// The subscriber's subscription id.
    pub subscription: String,
    /// Media type of `body`.
    pub content_type: MediaType,
    /// Push status code.
    pub status: u16,
    /// Canonical location of the affected resource.
    pub location: ResourcePath,
    /// The encoded resource state.
    pub body: String,
}

impl WirePush {
    /// Parses one line, ignoring trailing whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] for blank or malformed lines.
    pub fn parse(line: &[u8]) -> Result<Self, WireError> {
        parse_line(line)
    }

    /// Serializes as a newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Malformed`] when serialization fails.
    pub fn to_line(&self) -> Result<Vec<u8>, WireError> {
        to_line(self)
    }
}

/// A response as framed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    /// Id of the request this answers.
    pub id: u64,
    /// Outcome kind.
    pub response_type: ResponseType,
    /// Path of the original request.
    pub path: ResourcePath,
    /// Resulting state on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    /// Detail for internal errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WireResponse {
    /// Frames `response` under `id`.
    #[must_use]
    pub fn from_response(id: u64, response: &ResourceResponse) -> Self {
        Self {
            id,
            response_type: response.response_type(),
            path: response.path().clone(),
            state: response.state().cloned(),
            message: response.message().map(str::to_owned),
        }
    }

    /// Response for a line that could not be parsed.
    #[must_use]
    pub fn unparsed(error: &WireError) -> Self {
        Self {
            id: UNPARSED_REQUEST_ID,
            response_type: ResponseType::InternalError,
            path: ResourcePath::root(),
            state: None,
            message: Some(error.to_string()),
        }
    }

    /// Unframes into the id and response.
    #[must_use]
    pub fn into_response(self) -> (u64, ResourceResponse) {
        (
            self.id,
            ResourceResponse::new(self.response_type, self.path, self.state, self.message),
        )
    }

    /// Parses one line, ignoring trailing whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] for blank or malformed lines.
    pub fn parse(line: &[u8]) -> Result<Self, WireError> {
        parse_line(line)
    }

    /// Serializes as a newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Malformed`] when serialization fails.
    pub fn to_line(&self) -> Result<Vec<u8>, WireError> {
        to_line(self)
    }
}

fn parse_line<T: for<'de> Deserialize<'de>>(line: &[u8]) -> Result<T, WireError> {
    let end = line
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    let trimmed = line.get(..end).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(WireError::Empty);
    }
    Ok(serde_json::from_slice(trimmed)?)
}

fn to_line<T: Serialize>(message: &T) -> Result<Vec<u8>, WireError> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    Ok(line)
}
