use crate::model::{
    ConfirmPrompt, Locator, Notice, Progress, Project, ProjectFields, ProjectId, ProjectPatch,
    Session, SignUp, StoredObject,
};
use secrecy::SecretString;
use tokio::sync::watch;

/// Path-addressed blob storage for project assets.
/// No async in core; callers should use spawn_blocking when invoking from async contexts.
pub trait AssetStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stores `bytes` at `path`, replacing any existing object, and returns its locator.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<Locator, Self::Error>;

    /// Lists the objects directly under `prefix` (a folder path ending in `/`).
    fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, Self::Error>;

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, Self::Error>;

    fn delete(&self, path: &str) -> Result<(), Self::Error>;

    /// Resolves a locator previously returned by `put` or `list` to its store path.
    fn path_of(&self, locator: &Locator) -> Result<String, Self::Error>;
}

/// Document store holding one record per project.
pub trait RecordStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn create(&self, fields: &ProjectFields) -> Result<ProjectId, Self::Error>;
    fn get(&self, id: &str) -> Result<Option<Project>, Self::Error>;
    fn update(&self, id: &str, patch: &ProjectPatch) -> Result<(), Self::Error>;
    fn delete(&self, id: &str) -> Result<(), Self::Error>;

    /// Every record, in store-provided order.
    fn list(&self) -> Result<Vec<Project>, Self::Error>;
}

/// Credential verification and session tracking.
pub trait AuthProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, Self::Error>;
    fn sign_up(&self, request: &SignUp) -> Result<Session, Self::Error>;
    fn sign_out(&self) -> Result<(), Self::Error>;
    fn current_session(&self) -> Option<Session>;

    /// Session-change stream; the receiver always holds the current session or `None`.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

/// Observer for user-facing outcomes of lifecycle operations.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn progress(&self, _progress: &Progress<'_>) {}
}

/// Asks the user to approve an irreversible action.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}
