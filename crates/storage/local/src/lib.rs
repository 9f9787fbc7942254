//! Filesystem backends: asset objects under `{root}/assets`, project records
//! under `{root}/records`.

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use thiserror::Error;

mod assets;
mod records;

pub use crate::assets::LocalAssetStore;
pub use crate::records::LocalRecordStore;

/// Temp files written by `write_atomic`; never listed as objects.
pub(crate) const TMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum LocalError {
    #[error("io error: {0}")]
    Io(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serde error: {0}")]
    Serde(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
}

impl From<std::io::Error> for LocalError {
    fn from(e: std::io::Error) -> Self {
        LocalError::Io(e.to_string())
    }
}

/// Opens both stores under one data root.
pub fn open_stores<P: AsRef<Path>>(
    root: P,
) -> Result<(LocalAssetStore, LocalRecordStore), LocalError> {
    let root = root.as_ref();
    Ok((LocalAssetStore::new(root)?, LocalRecordStore::new(root)?))
}

/// Writes `data` to `final_path` through a sibling temp file so readers never
/// observe a partial object.
pub(crate) fn write_atomic(final_path: &Path, data: &[u8]) -> Result<(), LocalError> {
    let dir = final_path
        .parent()
        .ok_or_else(|| LocalError::InvalidPath(final_path.display().to_string()))?;
    let tmp = dir.join(format!("{}{}", TMP_PREFIX, uuid::Uuid::new_v4().simple()));
    {
        let mut f = File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, final_path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    let dir_file = File::open(dir)?;
    dir_file.sync_all()?;
    Ok(())
}
