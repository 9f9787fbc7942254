use std::collections::BTreeMap;

use chrono::Utc;
use folio_core::{
    model::{Locator, Project, ProjectFields, ProjectId, ProjectPatch, StoredObject},
    traits::{AssetStore, RecordStore},
};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

const LOCATOR_SCHEME: &str = "mem://";

#[derive(Debug, Error)]
pub enum EphemeralError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
}

/// Asset store keeping every object in memory, keyed by path.
pub struct EphemeralAssetStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl EphemeralAssetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Every stored path, in lexicographic order.
    pub fn paths(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    fn locator_for(path: &str) -> Locator {
        Locator::new(format!("{LOCATOR_SCHEME}{path}"))
    }
}

impl Default for EphemeralAssetStore {
    fn default() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

impl AssetStore for EphemeralAssetStore {
    type Error = EphemeralError;

    fn put(&self, path: &str, bytes: &[u8]) -> Result<Locator, Self::Error> {
        self.objects.write().insert(path.to_owned(), bytes.to_vec());
        debug!(path, len = bytes.len(), "ephemeral put");
        Ok(Self::locator_for(path))
    }

    fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, Self::Error> {
        let objects = self.objects.read();
        let items = objects
            .keys()
            .filter_map(|path| {
                let name = path.strip_prefix(prefix)?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                Some(StoredObject {
                    path: path.clone(),
                    name: name.to_owned(),
                    locator: Self::locator_for(path),
                })
            })
            .collect();
        Ok(items)
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, Self::Error> {
        let path = self.path_of(locator)?;
        self.objects
            .read()
            .get(&path)
            .cloned()
            .ok_or(EphemeralError::NotFound(path))
    }

    fn delete(&self, path: &str) -> Result<(), Self::Error> {
        match self.objects.write().remove(path) {
            Some(_) => Ok(()),
            None => Err(EphemeralError::NotFound(path.to_owned())),
        }
    }

    fn path_of(&self, locator: &Locator) -> Result<String, Self::Error> {
        locator
            .as_str()
            .strip_prefix(LOCATOR_SCHEME)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| EphemeralError::InvalidLocator(locator.to_string()))
    }
}

/// Record store keeping projects in memory, in creation order.
pub struct EphemeralRecordStore {
    records: RwLock<Vec<Project>>,
}

impl EphemeralRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for EphemeralRecordStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl RecordStore for EphemeralRecordStore {
    type Error = EphemeralError;

    fn create(&self, fields: &ProjectFields) -> Result<ProjectId, Self::Error> {
        let id = format!("proj_{}", uuid::Uuid::new_v4().simple());
        let mut project = Project::from_fields(id.clone(), fields.clone());
        project.created_at = Some(Utc::now());
        self.records.write().push(project);
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<Project>, Self::Error> {
        Ok(self.records.read().iter().find(|p| p.id == id).cloned())
    }

    fn update(&self, id: &str, patch: &ProjectPatch) -> Result<(), Self::Error> {
        let mut records = self.records.write();
        match records.iter_mut().find(|p| p.id == id) {
            Some(existing) => {
                patch.apply(existing);
                existing.updated_at = Some(Utc::now());
                Ok(())
            }
            None => Err(EphemeralError::NotFound(id.to_owned())),
        }
    }

    fn delete(&self, id: &str) -> Result<(), Self::Error> {
        let mut records = self.records.write();
        match records.iter().position(|p| p.id == id) {
            Some(pos) => {
                records.remove(pos);
                Ok(())
            }
            None => Err(EphemeralError::NotFound(id.to_owned())),
        }
    }

    fn list(&self) -> Result<Vec<Project>, Self::Error> {
        Ok(self.records.read().clone())
    }
}
