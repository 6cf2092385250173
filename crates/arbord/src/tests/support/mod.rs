//! Shared doubles and helpers for the behavioural suites.

mod push;
mod reporter;
mod resources;
mod world;

use std::ffi::OsString;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use arbor_config::{Config, SocketEndpoint};
use arbor_spi::{RequestType, ResourcePath, ResourceRequest, ResourceResponse, ResourceState};
use ortho_config::{OrthoConfig, OrthoError};

use crate::bootstrap::ConfigLoader;
use crate::container::Container;

pub use self::push::RecordingConnection;
pub use self::reporter::{HealthEvent, RecordingHealthReporter};
pub use self::resources::{CallLog, Hop, MemoryNode, PanickingNode};
pub use self::world::{ContainerWorld, parse_kind};

/// Upper bound on how long a scenario waits for a response.
pub const RESPONSE_WAIT: Duration = Duration::from_secs(5);

/// Builds a request with optional inbound state.
pub fn request(verb: RequestType, path: &str, state: Option<ResourceState>) -> ResourceRequest {
    let builder = ResourceRequest::builder(verb, ResourcePath::new(path));
    match state {
        Some(state) => builder.state(state).build(),
        None => builder.build(),
    }
}

/// Dispatches `request` and waits for its single response.
pub fn dispatch_and_wait(container: &Container, request: ResourceRequest) -> ResourceResponse {
    let (tx, rx) = mpsc::channel();
    container.dispatch(request, move |response| {
        let _ = tx.send(response);
    });
    let response = rx.recv_timeout(RESPONSE_WAIT).expect("response arrives");
    assert!(
        rx.recv_timeout(Duration::from_millis(50)).is_err(),
        "a second response arrived"
    );
    response
}

/// Loader listening on an OS-assigned loopback port.
pub struct LoopbackConfigLoader;

impl ConfigLoader for LoopbackConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen_socket: SocketEndpoint::tcp("127.0.0.1", 0),
            worker_threads: 2,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an invalid CLI argument.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("arbord"),
            OsString::from("--listen-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
