use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use folio_core::{
    model::{Locator, StoredObject},
    traits::AssetStore,
};
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use crate::{write_atomic, LocalError, TMP_PREFIX};

/// Asset store writing each object to `{root}/assets/{path}`.
/// Locators are `file://` URLs of the stored files.
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, LocalError> {
        let root = root.as_ref().join("assets");
        fs::create_dir_all(&root)?;
        // file:// locators need an absolute, symlink-free base to resolve back.
        let root = fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs(&self, rel: &str) -> Result<PathBuf, LocalError> {
        let rel_path = Path::new(rel);
        let traverses = rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if rel.trim().is_empty() || rel_path.is_absolute() || traverses {
            return Err(LocalError::InvalidPath(rel.to_owned()));
        }
        Ok(self.root.join(rel_path))
    }

    fn locator_for(path: &Path) -> Result<Locator, LocalError> {
        Url::from_file_path(path)
            .map(|url| Locator::new(url.as_str()))
            .map_err(|_| LocalError::InvalidPath(path.display().to_string()))
    }

    /// Removes now-empty folders between `path` and the store root.
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl AssetStore for LocalAssetStore {
    type Error = LocalError;

    fn put(&self, path: &str, bytes: &[u8]) -> Result<Locator, Self::Error> {
        let abs = self.abs(path)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(path, len = bytes.len(), "local put start");
        write_atomic(&abs, bytes)?;
        let locator = Self::locator_for(&abs)?;
        debug!(path, locator = %locator, "local put committed");
        Ok(locator)
    }

    fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, Self::Error> {
        let folder = prefix.trim_end_matches('/');
        let dir = self.abs(folder)?;
        if !dir.is_dir() {
            debug!(prefix, "local list: folder absent");
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| LocalError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "skipping non utf-8 object name");
                continue;
            };
            if name.starts_with(TMP_PREFIX) {
                continue;
            }
            items.push(StoredObject {
                path: format!("{folder}/{name}"),
                name: name.to_owned(),
                locator: Self::locator_for(entry.path())?,
            });
        }
        debug!(prefix, returned = items.len(), "local list");
        Ok(items)
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, Self::Error> {
        let rel = self.path_of(locator)?;
        let abs = self.abs(&rel)?;
        match fs::read(&abs) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LocalError::NotFound(rel)),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, path: &str) -> Result<(), Self::Error> {
        let abs = self.abs(path)?;
        match fs::remove_file(&abs) {
            Ok(()) => {
                debug!(path, "local delete removed file");
                self.prune_empty_parents(&abs);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LocalError::NotFound(path.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn path_of(&self, locator: &Locator) -> Result<String, Self::Error> {
        let invalid = || LocalError::InvalidLocator(locator.to_string());
        let url = Url::parse(locator.as_str()).map_err(|_| invalid())?;
        if url.scheme() != "file" {
            return Err(invalid());
        }
        let abs = url.to_file_path().map_err(|_| invalid())?;
        let rel = abs.strip_prefix(&self.root).map_err(|_| invalid())?;
        let segments = rel
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        if segments.is_empty() {
            return Err(invalid());
        }
        Ok(segments.join("/"))
    }
}
