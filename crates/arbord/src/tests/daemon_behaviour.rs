//! Behavioural tests for container bootstrap and the socket round trip.

use std::cell::RefCell;
use std::sync::Arc;

use arbor_client::{Client, ClientError, SocketConnector};
use arbor_spi::{Execution, RequestContext, ResourcePath, ResourceState};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use super::support::{
    FailingConfigLoader, HealthEvent, LoopbackConfigLoader, MemoryNode, CallLog, RESPONSE_WAIT,
    RecordingHealthReporter, parse_kind,
};
use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};

struct DaemonWorld {
    loader: Option<Box<dyn ConfigLoader>>,
    reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    error: Option<BootstrapError>,
    fetched: Option<Result<ResourceState, ClientError>>,
}

impl DaemonWorld {
    fn daemon(&self) -> &Daemon {
        self.daemon.as_ref().expect("daemon running")
    }

    fn recorded(&self, matches: impl Fn(&HealthEvent) -> bool) -> bool {
        self.reporter.events().iter().any(matches)
    }
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            let _ = daemon.shutdown();
        }
    }
}

#[fixture]
fn world() -> RefCell<DaemonWorld> {
    RefCell::new(DaemonWorld {
        loader: None,
        reporter: Arc::new(RecordingHealthReporter::default()),
        daemon: None,
        error: None,
        fetched: None,
    })
}

#[given("a healthy configuration loader")]
fn given_healthy_loader(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().loader = Some(Box::new(LoopbackConfigLoader));
}

#[given("a failing configuration loader")]
fn given_failing_loader(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().loader = Some(Box::new(FailingConfigLoader));
}

#[when("the container bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<DaemonWorld>) {
    let mut world = world.borrow_mut();
    let loader = world.loader.take().expect("loader configured");
    match bootstrap_with(loader.as_ref(), world.reporter.clone()) {
        Ok(daemon) => world.daemon = Some(daemon),
        Err(error) => world.error = Some(error),
    }
}

#[when("a collection \"{id}\" with member \"{member}\" is mounted")]
fn when_collection_mounted(world: &RefCell<DaemonWorld>, id: String, member: String) {
    let world = world.borrow();
    let collection = MemoryNode::top_level(&id, Execution::Blocking, Arc::new(CallLog::default()));
    collection.add(&member);
    world.daemon().container().mount(collection).expect("mount");
}

#[when("a socket client reads \"{path}\"")]
fn when_socket_client_reads(world: &RefCell<DaemonWorld>, path: String) {
    let mut world = world.borrow_mut();
    let address = world.daemon().endpoint().to_string();
    let client = Client::connect(&SocketConnector, &address)
        .expect("connect to daemon")
        .with_timeout(Some(RESPONSE_WAIT));
    let fetched = client.read_sync(RequestContext::new(), ResourcePath::new(&path));
    client.close();
    world.fetched = Some(fetched);
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    assert!(world.error.is_none(), "bootstrap failed: {:?}", world.error);
    assert!(world.daemon.is_some());
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.error, Some(BootstrapError::Configuration { .. })),
        "unexpected outcome {:?}",
        world.error
    );
}

#[then("the reporter recorded bootstrap start")]
fn then_recorded_start(world: &RefCell<DaemonWorld>) {
    assert!(
        world
            .borrow()
            .recorded(|event| matches!(event, HealthEvent::BootstrapStarting))
    );
}

#[then("the reporter recorded the listener start")]
fn then_recorded_listener(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    let endpoint = world.daemon().endpoint().clone();
    assert!(world.recorded(|event| *event == HealthEvent::ListenerStarted(endpoint.clone())));
}

#[then("the reporter recorded bootstrap success")]
fn then_recorded_success(world: &RefCell<DaemonWorld>) {
    assert!(
        world
            .borrow()
            .recorded(|event| matches!(event, HealthEvent::BootstrapSucceeded))
    );
}

#[then("the reporter recorded bootstrap failure")]
fn then_recorded_failure(world: &RefCell<DaemonWorld>) {
    assert!(
        world
            .borrow()
            .recorded(|event| matches!(event, HealthEvent::BootstrapFailed(_)))
    );
}

#[then("the socket client received state with id \"{id}\"")]
fn then_socket_state(world: &RefCell<DaemonWorld>, id: String) {
    let world = world.borrow();
    match world.fetched.as_ref().expect("socket read made") {
        Ok(state) => assert_eq!(state.id.as_deref(), Some(id.as_str())),
        Err(error) => panic!("socket read failed: {error}"),
    }
}

#[then("the socket client failed with {kind} for \"{path}\"")]
fn then_socket_failed(world: &RefCell<DaemonWorld>, kind: String, path: String) {
    let world = world.borrow();
    let error = match world.fetched.as_ref().expect("socket read made") {
        Ok(state) => panic!("socket read unexpectedly returned {state:?}"),
        Err(error) => error.as_resource_error().expect("a resource error"),
    };
    assert_eq!(error.response_type(), parse_kind(&kind));
    assert_eq!(error.path(), Some(&ResourcePath::new(&path)));
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "A healthy configuration starts the listener"
)]
fn healthy_bootstrap(world: RefCell<DaemonWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "A broken configuration fails bootstrap"
)]
fn failing_bootstrap(world: RefCell<DaemonWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "A socket client reaches mounted resources"
)]
fn socket_round_trip(world: RefCell<DaemonWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "A socket client sees the container's error kinds"
)]
fn socket_error_kinds(world: RefCell<DaemonWorld>) {
    drop(world);
}
