use super::instance::Instance;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectionError {
    #[error("No collection with id '{0}'")]
    NotFound(String),
    #[error("Collection '{collection}' already contains an instance labelled '{label}'")]
    DuplicateLabel { collection: String, label: String },
}

/// A named aggregate of instances, each addressed by a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection {
    uuid: String,
    relations: BTreeMap<String, Instance>,
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Collection {
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            relations: BTreeMap::new(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Adds `instance` under `label`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateLabel`] if the label is taken; the
    /// collection is left unchanged in that case.
    pub fn add(&mut self, label: &str, instance: Instance) -> Result<(), CollectionError> {
        if self.relations.contains_key(label) {
            return Err(CollectionError::DuplicateLabel {
                collection: self.uuid.clone(),
                label: label.to_string(),
            });
        }
        self.relations.insert(label.to_string(), instance);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&Instance> {
        self.relations.get(label)
    }

    pub fn remove(&mut self, label: &str) -> Option<Instance> {
        self.relations.remove(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

/// Caller-owned registry of collections addressed by their uuid.
#[derive(Debug, Default)]
pub struct CollectionStore {
    collections: HashMap<String, Collection>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection and returns its id.
    pub fn create(&mut self) -> String {
        self.insert(Collection::new())
    }

    /// Takes ownership of an existing collection and returns its id.
    pub fn insert(&mut self, collection: Collection) -> String {
        let id = collection.uuid.clone();
        self.collections.insert(id.clone(), collection);
        id
    }

    pub fn get(&self, id: &str) -> Result<&Collection, CollectionError> {
        self.collections
            .get(id)
            .ok_or_else(|| CollectionError::NotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Collection, CollectionError> {
        self.collections
            .get_mut(id)
            .ok_or_else(|| CollectionError::NotFound(id.to_string()))
    }

    pub fn remove(&mut self, id: &str) -> Option<Collection> {
        self.collections.remove(id)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
