//! Shared contracts for the arbor resource container and its clients.
//!
//! Resources are addressed by [`ResourcePath`] and answer requests through a
//! [`Responder`], a continuation that fires exactly once. The container walks
//! the resource graph one segment at a time using these contracts; clients
//! build [`ResourceRequest`] values and observe [`ResourceResponse`] values.
//!
//! Resources tagged [`Execution::Blocking`] are never invoked on the thread
//! that delivered the previous continuation. The [`WorkerPool`] supplies the
//! bounded threads that absorb those calls.

mod auth;
mod codec;
mod context;
mod error;
mod executor;
mod media;
mod path;
mod request;
mod resource;
mod responder;
mod response;
mod state;
pub mod wire;

pub use auth::{AuthorizationDecision, AuthorizationPolicy, decide_all};
pub use codec::{CodecError, JsonCodec, ResourceCodec};
pub use context::RequestContext;
pub use error::ResourceError;
pub use executor::{Job, PoolError, WorkerPool};
pub use media::{MediaType, MediaTypeError};
pub use path::ResourcePath;
pub use request::{RequestType, RequestTypeParseError, ResourceRequest, ResourceRequestBuilder};
pub use resource::{Execution, Resource};
pub use responder::{Outcome, Responder};
pub use response::{ResourceResponse, ResponseType};
pub use state::ResourceState;
