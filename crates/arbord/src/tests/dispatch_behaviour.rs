//! Behavioural tests for verb dispatch, policies, and overload.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::scenario;

use super::support::ContainerWorld;

#[fixture]
fn world() -> RefCell<ContainerWorld> {
    RefCell::new(ContainerWorld::new())
}

#[scenario(
    path = "tests/features/crud_dispatch.feature",
    name = "Creating a member returns its state"
)]
fn create_returns_state(world: RefCell<ContainerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crud_dispatch.feature",
    name = "Creating a member twice is refused"
)]
fn duplicate_create_refused(world: RefCell<ContainerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crud_dispatch.feature",
    name = "Updating a missing member creates it"
)]
fn update_of_missing_member_creates_it(world: RefCell<ContainerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crud_dispatch.feature",
    name = "Updating an existing member replaces its properties"
)]
fn update_replaces_properties(world: RefCell<ContainerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crud_dispatch.feature",
    name = "Deleting a member removes it"
)]
fn delete_removes_member(world: RefCell<ContainerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crud_dispatch.feature",
    name = "Rejected requests are not authorized"
)]
fn rejected_requests(world: RefCell<ContainerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crud_dispatch.feature",
    name = "A saturated worker pool fails the request"
)]
fn saturated_pool(world: RefCell<ContainerWorld>) {
    drop(world);
}
