//! Client façade for the arbor resource container.
//!
//! A [`Client`] issues CRUD requests over a [`Connection`]. Every verb comes
//! in two forms: an asynchronous call that hands the response to a callback
//! and never blocks, and a synchronous call that waits for the same response
//! and converts error kinds into [`ClientError::Resource`].
//!
//! Connections come from a [`Connector`]. [`SocketConnector`] speaks the
//! daemon's JSONL protocol over TCP or a Unix socket; in-process connectors
//! live alongside the container.

mod client;
mod connection;
mod errors;
mod transport;

pub use client::{CLIENT_POOL_NAME, Client};
pub use connection::{Connection, Connector, ResponseHandler};
pub use errors::ClientError;
pub use transport::{CONNECTION_TIMEOUT, SocketConnection, SocketConnector};
