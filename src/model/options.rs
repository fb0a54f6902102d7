/**
 * Model Creation Options
 *
 * Parameters for creating a model up front, or lazily when an auto-create
 * open finds nothing on the server. Initial data is either a fixed value or
 * a factory that runs only when the server actually asks for it.
 */

use crate::ot::value::DataValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Model root data
pub type ModelData = BTreeMap<String, DataValue>;

/// Access rights on a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelPermissions {
    pub read: bool,
    pub write: bool,
    pub remove: bool,
    pub manage: bool,
}

impl ModelPermissions {
    /// Every right granted
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
            remove: true,
            manage: true,
        }
    }

    /// Read access only
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }
}

/// Initial data for a new model
#[derive(Clone)]
pub enum ModelDataInitializer {
    Value(ModelData),
    /// Invoked when the data is needed
    Factory(Arc<dyn Fn() -> ModelData + Send + Sync>),
}

impl ModelDataInitializer {
    /// Wrap a factory closure
    pub fn factory(f: impl Fn() -> ModelData + Send + Sync + 'static) -> Self {
        Self::Factory(Arc::new(f))
    }

    /// Produce the data, running the factory if there is one
    pub fn resolve(&self) -> ModelData {
        match self {
            ModelDataInitializer::Value(data) => data.clone(),
            ModelDataInitializer::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for ModelDataInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelDataInitializer::Value(data) => f.debug_tuple("Value").field(data).finish(),
            ModelDataInitializer::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl From<ModelData> for ModelDataInitializer {
    fn from(data: ModelData) -> Self {
        Self::Value(data)
    }
}

/// Options for [`crate::model::ModelService::create`]
#[derive(Debug, Clone, Default)]
pub struct CreateModelOptions {
    pub collection: String,
    /// Generated by the server when absent
    pub id: Option<String>,
    pub data: Option<ModelDataInitializer>,
    pub override_world: bool,
    pub world_permissions: Option<ModelPermissions>,
    pub user_permissions: HashMap<String, ModelPermissions>,
}

impl CreateModelOptions {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<ModelDataInitializer>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Replace the collection's world permissions for this model
    pub fn with_world_permissions(mut self, permissions: ModelPermissions) -> Self {
        self.override_world = true;
        self.world_permissions = Some(permissions);
        self
    }

    pub fn with_user_permissions(mut self, user: impl Into<String>, permissions: ModelPermissions) -> Self {
        self.user_permissions.insert(user.into(), permissions);
        self
    }
}

/// Options for [`crate::model::ModelService::open_auto_create`]
#[derive(Debug, Clone, Default)]
pub struct AutoCreateModelOptions {
    pub create: CreateModelOptions,
    /// Discard the model once every session has closed it
    pub ephemeral: bool,
}

impl AutoCreateModelOptions {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            create: CreateModelOptions::new(collection),
            ephemeral: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.create = self.create.with_id(id);
        self
    }

    pub fn with_data(mut self, data: impl Into<ModelDataInitializer>) -> Self {
        self.create = self.create.with_data(data);
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }
}
