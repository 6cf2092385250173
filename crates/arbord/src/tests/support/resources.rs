//! In-memory resources that record how the container drives them.

use std::sync::{Arc, Mutex, Weak};
use std::thread;

use arbor_spi::{
    Execution, RequestContext, Resource, ResourceError, ResourceState, Responder, WorkerPool,
};
use dashmap::DashMap;
use serde_json::{Map, Value};

/// One call into a resource and the thread it ran on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub resource: String,
    pub operation: &'static str,
    pub thread: Option<String>,
    pub on_worker: bool,
}

/// Shared log of member lookups and hops across a resource tree.
#[derive(Debug, Default)]
pub struct CallLog {
    lookups: Mutex<Vec<String>>,
    hops: Mutex<Vec<Hop>>,
}

impl CallLog {
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("lookups lock").clone()
    }

    pub fn hops(&self) -> Vec<Hop> {
        self.hops.lock().expect("hops lock").clone()
    }

    pub fn hops_on(&self, resource: &str) -> Vec<Hop> {
        self.hops()
            .into_iter()
            .filter(|hop| hop.resource == resource)
            .collect()
    }

    fn lookup(&self, id: &str) {
        self.lookups.lock().expect("lookups lock").push(id.to_owned());
    }

    fn hop(&self, resource: &str, operation: &'static str) {
        let current = thread::current();
        self.hops.lock().expect("hops lock").push(Hop {
            resource: resource.to_owned(),
            operation,
            thread: current.name().map(str::to_owned),
            on_worker: WorkerPool::on_worker_thread(),
        });
    }
}

/// A collection whose members are themselves collections.
///
/// Created members inherit their parent's execution tag and call log.
pub struct MemoryNode {
    id: String,
    parent: Weak<MemoryNode>,
    execution: Execution,
    properties: Mutex<Map<String, Value>>,
    members: DashMap<String, Arc<MemoryNode>>,
    this: Weak<MemoryNode>,
    calls: Arc<CallLog>,
}

impl MemoryNode {
    /// A node to mount directly under the container root.
    pub fn top_level(id: &str, execution: Execution, calls: Arc<CallLog>) -> Arc<Self> {
        Self::build(id, Weak::new(), execution, Map::new(), calls)
    }

    /// Adds an empty member sharing this node's execution tag.
    pub fn add(self: &Arc<Self>, id: &str) -> Arc<Self> {
        self.add_with(id, self.execution)
    }

    /// Adds an empty member with its own execution tag.
    pub fn add_with(self: &Arc<Self>, id: &str, execution: Execution) -> Arc<Self> {
        let member = Self::build(
            id,
            Arc::downgrade(self),
            execution,
            Map::new(),
            Arc::clone(&self.calls),
        );
        self.members.insert(id.to_owned(), Arc::clone(&member));
        member
    }

    pub fn member(&self, id: &str) -> Option<Arc<Self>> {
        self.members.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.properties
            .lock()
            .expect("properties lock")
            .get(name)
            .cloned()
    }

    fn build(
        id: &str,
        parent: Weak<Self>,
        execution: Execution,
        properties: Map<String, Value>,
        calls: Arc<CallLog>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: id.to_owned(),
            parent,
            execution,
            properties: Mutex::new(properties),
            members: DashMap::new(),
            this: this.clone(),
            calls,
        })
    }

    fn me(&self) -> Option<Arc<dyn Resource>> {
        self.this.upgrade().map(|this| this as Arc<dyn Resource>)
    }
}

impl Resource for MemoryNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent(&self) -> Option<Arc<dyn Resource>> {
        self.parent
            .upgrade()
            .map(|parent| parent as Arc<dyn Resource>)
    }

    fn execution(&self) -> Execution {
        self.execution
    }

    fn read_properties(&self, _ctx: &RequestContext) -> Result<ResourceState, ResourceError> {
        self.calls.hop(&self.id, "read_properties");
        let mut state = ResourceState::new().with_id(&self.id).with_uri(self.uri());
        state.properties = self.properties.lock().expect("properties lock").clone();
        Ok(state)
    }

    fn read_members(&self, _ctx: &RequestContext) -> Result<Vec<Arc<dyn Resource>>, ResourceError> {
        let mut members: Vec<Arc<Self>> = self
            .members
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(members
            .into_iter()
            .map(|member| member as Arc<dyn Resource>)
            .collect())
    }

    fn read_member(&self, _ctx: &RequestContext, id: &str, responder: Responder) {
        self.calls.hop(&self.id, "read_member");
        self.calls.lookup(id);
        match self.member(id) {
            Some(member) => responder.resource_read(member),
            None => responder.no_such_resource(id),
        }
    }

    fn create_member(&self, _ctx: &RequestContext, state: ResourceState, responder: Responder) {
        self.calls.hop(&self.id, "create_member");
        let Some(id) = state.id.clone() else {
            responder.internal_error("created state carries no id");
            return;
        };
        if self.members.contains_key(&id) {
            responder.resource_already_exists(id);
            return;
        }
        let Some(this) = self.this.upgrade() else {
            responder.internal_error("collection dropped");
            return;
        };
        let member = Self::build(
            &id,
            Arc::downgrade(&this),
            self.execution,
            state.properties,
            Arc::clone(&self.calls),
        );
        self.members.insert(id, Arc::clone(&member));
        responder.resource_created(member);
    }

    fn update_properties(&self, _ctx: &RequestContext, state: ResourceState, responder: Responder) {
        self.calls.hop(&self.id, "update_properties");
        *self.properties.lock().expect("properties lock") = state.properties;
        match self.me() {
            Some(this) => responder.resource_updated(this),
            None => responder.internal_error("resource dropped"),
        }
    }

    fn delete_member(&self, _ctx: &RequestContext, responder: Responder) {
        self.calls.hop(&self.id, "delete_member");
        let Some(parent) = self.parent.upgrade() else {
            responder.not_supported(arbor_spi::RequestType::Delete, self.uri());
            return;
        };
        match parent.members.remove(&self.id) {
            Some((_, this)) => responder.resource_deleted(this),
            None => responder.no_such_resource(&self.id),
        }
    }
}

/// A non-blocking collection whose member lookups panic.
pub struct PanickingNode {
    id: String,
}

impl PanickingNode {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_owned() })
    }
}

impl Resource for PanickingNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent(&self) -> Option<Arc<dyn Resource>> {
        None
    }

    fn execution(&self) -> Execution {
        Execution::NonBlocking
    }

    fn read_properties(&self, _ctx: &RequestContext) -> Result<ResourceState, ResourceError> {
        Ok(ResourceState::new().with_id(&self.id).with_uri(self.uri()))
    }

    fn read_member(&self, _ctx: &RequestContext, id: &str, _responder: Responder) {
        panic!("lookup of {id} in {} exploded", self.id);
    }
}
