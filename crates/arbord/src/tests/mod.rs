//! Behavioural suites driven by the feature files under `tests/features`.

mod daemon_behaviour;
mod dispatch_behaviour;
mod support;
