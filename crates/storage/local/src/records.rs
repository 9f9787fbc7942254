use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use chrono::Utc;
use folio_core::{
    model::{Project, ProjectFields, ProjectId, ProjectPatch},
    traits::RecordStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{write_atomic, LocalError};

#[derive(Default, Serialize, Deserialize, Clone)]
struct Manifest {
    ids: Vec<ProjectId>, // creation order
}

/// Record store keeping one JSON document per project under `{root}/records`,
/// with `MANIFEST.json` holding creation order. Writers serialize on an
/// exclusive lock of `{root}/records/LOCK`. Every read goes to disk.
pub struct LocalRecordStore {
    dir: PathBuf,
}

impl LocalRecordStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, LocalError> {
        let dir = root.as_ref().join("records");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("MANIFEST.json")
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join("LOCK")
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, LocalError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(LocalError::NotFound(id.to_owned()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    fn load_manifest(&self) -> Result<Manifest, LocalError> {
        let path = self.manifest_path();
        match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| LocalError::Serde(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_manifest(&self, m: &Manifest) -> Result<(), LocalError> {
        let data = serde_json::to_vec_pretty(m).map_err(|e| LocalError::Serde(e.to_string()))?;
        write_atomic(&self.manifest_path(), &data)
    }

    fn load_record(&self, id: &str) -> Result<Option<Project>, LocalError> {
        let path = self.record_path(id)?;
        match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| LocalError::Serde(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_record(&self, project: &Project) -> Result<(), LocalError> {
        let path = self.record_path(&project.id)?;
        let data =
            serde_json::to_vec_pretty(project).map_err(|e| LocalError::Serde(e.to_string()))?;
        write_atomic(&path, &data)
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T, LocalError>) -> Result<T, LocalError> {
        let lockf = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        fs4::FileExt::lock_exclusive(&lockf)?;
        let res = f();
        let _ = fs4::FileExt::unlock(&lockf);
        res
    }
}

impl RecordStore for LocalRecordStore {
    type Error = LocalError;

    fn create(&self, fields: &ProjectFields) -> Result<ProjectId, Self::Error> {
        self.with_lock(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let mut project = Project::from_fields(id.clone(), fields.clone());
            project.created_at = Some(Utc::now());
            self.save_record(&project)?;
            let mut manifest = self.load_manifest()?;
            manifest.ids.push(id.clone());
            self.save_manifest(&manifest)?;
            debug!(project = %id, title = %project.title, "local record created");
            Ok(id)
        })
    }

    fn get(&self, id: &str) -> Result<Option<Project>, Self::Error> {
        match self.load_record(id) {
            Err(LocalError::NotFound(_)) => Ok(None),
            other => other,
        }
    }

    fn update(&self, id: &str, patch: &ProjectPatch) -> Result<(), Self::Error> {
        self.with_lock(|| {
            let mut project = self
                .load_record(id)?
                .ok_or_else(|| LocalError::NotFound(id.to_owned()))?;
            patch.apply(&mut project);
            project.updated_at = Some(Utc::now());
            self.save_record(&project)?;
            debug!(project = %id, "local record updated");
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<(), Self::Error> {
        let path = self.record_path(id)?;
        self.with_lock(|| {
            let mut manifest = self.load_manifest()?;
            let pos = manifest
                .ids
                .iter()
                .position(|x| x == id)
                .ok_or_else(|| LocalError::NotFound(id.to_owned()))?;
            manifest.ids.remove(pos);
            self.save_manifest(&manifest)?;
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(project = %id, "record file already gone");
                }
                Err(e) => return Err(e.into()),
            }
            debug!(project = %id, "local record deleted");
            Ok(())
        })
    }

    fn list(&self) -> Result<Vec<Project>, Self::Error> {
        let manifest = self.load_manifest()?;
        let mut out = Vec::with_capacity(manifest.ids.len());
        for id in &manifest.ids {
            match self.load_record(id)? {
                Some(project) => out.push(project),
                None => warn!(project = %id, "manifest entry without record file"),
            }
        }
        Ok(out)
    }
}
