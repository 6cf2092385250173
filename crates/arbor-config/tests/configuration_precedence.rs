//! Behavioural tests for layered configuration loading.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use arbor_config::{
    Config, SocketEndpoint, default_listen_socket, default_log_filter, default_log_format,
    default_worker_threads,
};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const SOCKET_VARIABLE: &str = "ARBOR_LISTEN_SOCKET";

struct Harness {
    temp_dir: TempDir,
    config_lines: RefCell<Vec<String>>,
    cli_args: RefCell<Vec<OsString>>,
    env_previous: RefCell<Option<Option<OsString>>>,
    env_guard: RefCell<Option<MutexGuard<'static, ()>>>,
    outcome: RefCell<Option<Result<Config, String>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temporary directory"),
            config_lines: RefCell::new(Vec::new()),
            cli_args: RefCell::new(vec![OsString::from("arbord")]),
            env_previous: RefCell::new(None),
            env_guard: RefCell::new(Some(
                ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            )),
            outcome: RefCell::new(None),
        }
    }

    fn add_config_line(&self, line: String) {
        self.config_lines.borrow_mut().push(line);
    }

    fn set_socket_env(&self, value: &str) {
        let previous = std::env::var_os(SOCKET_VARIABLE);
        // SAFETY: ENV_MUTEX serialises environment mutation across scenarios.
        unsafe { std::env::set_var(SOCKET_VARIABLE, value) };
        self.env_previous.borrow_mut().get_or_insert(previous);
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.outcome.borrow().is_some() {
            return;
        }
        let mut args = self.cli_args.borrow().clone();
        let lines = self.config_lines.borrow();
        if !lines.is_empty() {
            let path = self.temp_dir.path().join("arbor.toml");
            fs::write(&path, lines.join("\n")).expect("write configuration file");
            args.insert(1, path.into_os_string());
            args.insert(1, OsString::from("--config-path"));
        }
        let outcome = Config::load_from_iter(args).map_err(|error| error.to_string());
        *self.outcome.borrow_mut() = Some(outcome);
    }

    fn loaded(&self) -> Config {
        self.load();
        match self.outcome.borrow().as_ref() {
            Some(Ok(config)) => config.clone(),
            Some(Err(error)) => panic!("configuration failed to load: {error}"),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(previous) = self.env_previous.borrow_mut().take() {
            match previous {
                // SAFETY: the environment lock is still held.
                Some(value) => unsafe { std::env::set_var(SOCKET_VARIABLE, value) },
                None => unsafe { std::env::remove_var(SOCKET_VARIABLE) },
            }
        }
        drop(self.env_guard.borrow_mut().take());
    }
}

fn parse_socket(text: &str) -> SocketEndpoint {
    text.parse()
        .unwrap_or_else(|error| panic!("invalid socket '{text}': {error}"))
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the listen socket to \"{socket}\"")]
fn given_configuration_file(harness: &Harness, socket: String) {
    let line = match parse_socket(&socket) {
        SocketEndpoint::Unix { path } => {
            format!("listen_socket = {{ transport = \"unix\", path = \"{path}\" }}")
        }
        SocketEndpoint::Tcp { host, port } => format!(
            "listen_socket = {{ transport = \"tcp\", host = \"{host}\", port = {port} }}"
        ),
    };
    harness.add_config_line(line);
}

#[given("a configuration file setting {threads} worker threads")]
fn given_worker_threads(harness: &Harness, threads: usize) {
    harness.add_config_line(format!("worker_threads = {threads}"));
}

#[given("the environment overrides the listen socket to \"{socket}\"")]
fn given_environment_override(harness: &Harness, socket: String) {
    harness.set_socket_env(&socket);
}

#[when("the command line sets the listen socket to \"{socket}\"")]
fn when_cli_override(harness: &Harness, socket: String) {
    harness.push_cli_arg("--listen-socket");
    harness.push_cli_arg(socket);
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the listen socket to \"{socket}\"")]
fn then_resolved_socket(harness: &Harness, socket: String) {
    assert_eq!(harness.loaded().listen_socket(), &parse_socket(&socket));
}

#[then("loading the configuration resolves {threads} worker threads")]
fn then_resolved_threads(harness: &Harness, threads: usize) {
    assert_eq!(harness.loaded().worker_threads(), threads);
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.loaded();
    assert_eq!(config.listen_socket(), &default_listen_socket());
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert_eq!(config.worker_threads(), default_worker_threads());
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn defaults_apply(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "A configuration file overrides the defaults"
)]
fn file_overrides_defaults(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The environment overrides the configuration file"
)]
fn environment_overrides_file(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Command-line flags override every other source"
)]
fn cli_overrides_everything(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Worker pool sizing comes from the configuration file"
)]
fn worker_threads_from_file(#[from(harness)] harness: Harness) {
    let _ = harness;
}
