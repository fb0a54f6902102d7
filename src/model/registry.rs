//! Bookkeeping for open models.
//!
//! A model is reachable by its logical id (what callers open) and by its
//! resource id (what the server addresses messages to). Opens that are still
//! waiting on the server are kept as shared futures so concurrent callers
//! for the same id join a single request.

use crate::model::error::ModelError;
use crate::model::options::AutoCreateModelOptions;
use crate::model::realtime::RealTimeModel;
use futures_util::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::Arc;

/// Result every caller of an open receives
pub type OpenResult = Result<Arc<RealTimeModel>, ModelError>;

/// An open request in progress
pub type PendingOpen = Shared<BoxFuture<'static, OpenResult>>;

#[derive(Default)]
pub struct ModelRegistry {
    by_id: HashMap<String, Arc<RealTimeModel>>,
    by_resource_id: HashMap<String, Arc<RealTimeModel>>,
    pending: HashMap<String, PendingOpen>,
    auto_create: HashMap<u64, AutoCreateModelOptions>,
    next_auto_create_id: u64,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open model under both of its keys
    pub fn insert(&mut self, id: impl Into<String>, model: Arc<RealTimeModel>) {
        self.by_resource_id.insert(model.resource_id().to_string(), model.clone());
        self.by_id.insert(id.into(), model);
    }

    pub fn get(&self, id: &str) -> Option<Arc<RealTimeModel>> {
        self.by_id.get(id).cloned()
    }

    pub fn get_by_resource_id(&self, resource_id: &str) -> Option<Arc<RealTimeModel>> {
        self.by_resource_id.get(resource_id).cloned()
    }

    /// Drop a model from both maps
    pub fn remove(&mut self, resource_id: &str) -> Option<Arc<RealTimeModel>> {
        let model = self.by_resource_id.remove(resource_id)?;
        self.by_id.retain(|_, open| open.resource_id() != resource_id);
        Some(model)
    }

    /// Every open model, once each
    pub fn models(&self) -> Vec<Arc<RealTimeModel>> {
        self.by_resource_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_resource_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_resource_id.is_empty()
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn pending(&self, id: &str) -> Option<PendingOpen> {
        self.pending.get(id).cloned()
    }

    pub fn insert_pending(&mut self, id: impl Into<String>, open: PendingOpen) {
        self.pending.insert(id.into(), open);
    }

    pub fn remove_pending(&mut self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Keep auto-create options until the server asks for them
    pub fn register_auto_create(&mut self, options: AutoCreateModelOptions) -> u64 {
        let auto_create_id = self.next_auto_create_id;
        self.next_auto_create_id += 1;
        self.auto_create.insert(auto_create_id, options);
        auto_create_id
    }

    pub fn auto_create(&self, auto_create_id: u64) -> Option<&AutoCreateModelOptions> {
        self.auto_create.get(&auto_create_id)
    }

    pub fn remove_auto_create(&mut self, auto_create_id: u64) -> Option<AutoCreateModelOptions> {
        self.auto_create.remove(&auto_create_id)
    }

    pub fn auto_create_len(&self) -> usize {
        self.auto_create.len()
    }
}
