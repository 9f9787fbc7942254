use std::{fmt, io, path::Path};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

pub type ProjectId = String;

/// Opaque reference to a stored asset, as handed out by an asset store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(rename = "desc", default)]
    pub description: String,
    #[serde(rename = "files", default)]
    pub assets: Vec<Locator>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn from_fields(id: ProjectId, fields: ProjectFields) -> Self {
        Self {
            id,
            title: fields.title,
            description: fields.description,
            assets: fields.assets,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Field set written when a project record is first created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProjectFields {
    pub title: String,
    #[serde(rename = "desc")]
    pub description: String,
    #[serde(rename = "files")]
    pub assets: Vec<Locator>,
}

/// Partial update of a project record. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "files", default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<Locator>>,
}

impl ProjectPatch {
    pub fn apply(&self, project: &mut Project) {
        if let Some(title) = &self.title {
            project.title = title.clone();
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(assets) = &self.assets {
            project.assets = assets.clone();
        }
    }
}

/// A local file blob that has not been uploaded yet.
#[derive(Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl NewFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, naming the blob after the path's final component.
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no usable file name in {}", path.display()),
                )
            })?
            .to_string();
        let bytes = std::fs::read(path)?;
        Ok(Self { name, bytes })
    }
}

impl fmt::Debug for NewFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One slot of an edit-pending asset list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetEntry {
    Existing(Locator),
    Pending(NewFile),
}

impl AssetEntry {
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            AssetEntry::Existing(locator) => Some(locator),
            AssetEntry::Pending(_) => None,
        }
    }
}

/// An object as returned by an asset store folder listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Full store path, e.g. `projects/Demo/cover.png`.
    pub path: String,
    /// Final path segment.
    pub name: String,
    pub locator: Locator,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub email: String,
    #[serde(rename = "signedInAt")]
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SignUp {
    pub email: String,
    pub password: SecretString,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// User-facing outcome message emitted by lifecycle and session operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Per-file upload progress: `completed` of `total` files are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress<'a> {
    pub file: &'a str,
    pub completed: usize,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
}
