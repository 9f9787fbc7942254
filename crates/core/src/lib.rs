//! Core domain model, validation, and traits.
//! No async within this crate; store IO lives behind the traits.

pub mod errors;
pub mod model;
pub mod project;
pub mod traits;
pub mod validate;

pub use crate::errors::{CoreError, ValidationError};
pub use crate::model::{
    AssetEntry, ConfirmPrompt, Locator, NewFile, Notice, NoticeLevel, Progress, Project,
    ProjectFields, ProjectId, ProjectPatch, Session, SignUp, StoredObject, UserProfile,
};
pub use crate::project::{asset_path, normalize_title, project_prefix, same_folder, PROJECTS_ROOT};
pub use crate::traits::{AssetStore, AuthProvider, Confirm, Notifier, RecordStore};
pub use crate::validate::{
    require_title, validate_create, validate_credentials, validate_edit, validate_file_name,
};
