//! Whole-stack fixtures for exercising the lifecycle manager against each
//! backend, plus store wrappers that fail on demand.

use std::{path::PathBuf, sync::Arc};

use folio_core::{
    model::{Locator, Project, ProjectFields, ProjectId, ProjectPatch, StoredObject},
    traits::{AssetStore, RecordStore},
};
use folio_manager::{ProjectManager, RecordingNotifier};
use folio_storage_ephemeral::{EphemeralAssetStore, EphemeralRecordStore};
use folio_storage_local::{LocalAssetStore, LocalError, LocalRecordStore};
use parking_lot::Mutex;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaultyError {
    #[error("injected {op} failure at {path}")]
    Injected { op: &'static str, path: String },
    #[error("{0}")]
    Inner(String),
}

#[derive(Default)]
struct Faults {
    put: Vec<String>,
    list: Vec<String>,
    read: Vec<String>,
    delete: Vec<String>,
}

/// Asset store wrapper failing any operation whose path contains a
/// registered needle.
pub struct FaultyAssets<S> {
    inner: S,
    faults: Mutex<Faults>,
}

impl<S: AssetStore> FaultyAssets<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_put(&self, needle: &str) {
        self.faults.lock().put.push(needle.to_owned());
    }

    pub fn fail_list(&self, needle: &str) {
        self.faults.lock().list.push(needle.to_owned());
    }

    pub fn fail_read(&self, needle: &str) {
        self.faults.lock().read.push(needle.to_owned());
    }

    pub fn fail_delete(&self, needle: &str) {
        self.faults.lock().delete.push(needle.to_owned());
    }

    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }

    fn check(
        &self,
        op: &'static str,
        select: impl Fn(&Faults) -> &Vec<String>,
        path: &str,
    ) -> Result<(), FaultyError> {
        let faults = self.faults.lock();
        if select(&faults).iter().any(|needle| path.contains(needle.as_str())) {
            return Err(FaultyError::Injected {
                op,
                path: path.to_owned(),
            });
        }
        Ok(())
    }
}

fn inner<E: std::fmt::Display>(e: E) -> FaultyError {
    FaultyError::Inner(e.to_string())
}

impl<S: AssetStore> AssetStore for FaultyAssets<S> {
    type Error = FaultyError;

    fn put(&self, path: &str, bytes: &[u8]) -> Result<Locator, Self::Error> {
        self.check("put", |f| &f.put, path)?;
        self.inner.put(path, bytes).map_err(inner)
    }

    fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, Self::Error> {
        self.check("list", |f| &f.list, prefix)?;
        self.inner.list(prefix).map_err(inner)
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, Self::Error> {
        let path = self.inner.path_of(locator).map_err(inner)?;
        self.check("read", |f| &f.read, &path)?;
        self.inner.read(locator).map_err(inner)
    }

    fn delete(&self, path: &str) -> Result<(), Self::Error> {
        self.check("delete", |f| &f.delete, path)?;
        self.inner.delete(path).map_err(inner)
    }

    fn path_of(&self, locator: &Locator) -> Result<String, Self::Error> {
        self.inner.path_of(locator).map_err(inner)
    }
}

#[derive(Default)]
struct RecordFaults {
    create: bool,
    update: bool,
}

/// Record store wrapper failing creates or updates while switched on.
pub struct FaultyRecords<R> {
    inner: R,
    faults: Mutex<RecordFaults>,
}

impl<R: RecordStore> FaultyRecords<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            faults: Mutex::new(RecordFaults::default()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn fail_create(&self) {
        self.faults.lock().create = true;
    }

    pub fn fail_update(&self) {
        self.faults.lock().update = true;
    }

    pub fn heal(&self) {
        *self.faults.lock() = RecordFaults::default();
    }
}

impl<R: RecordStore> RecordStore for FaultyRecords<R> {
    type Error = FaultyError;

    fn create(&self, fields: &ProjectFields) -> Result<ProjectId, Self::Error> {
        if self.faults.lock().create {
            return Err(FaultyError::Injected {
                op: "create",
                path: fields.title.clone(),
            });
        }
        self.inner.create(fields).map_err(inner)
    }

    fn get(&self, id: &str) -> Result<Option<Project>, Self::Error> {
        self.inner.get(id).map_err(inner)
    }

    fn update(&self, id: &str, patch: &ProjectPatch) -> Result<(), Self::Error> {
        if self.faults.lock().update {
            return Err(FaultyError::Injected {
                op: "update",
                path: id.to_owned(),
            });
        }
        self.inner.update(id, patch).map_err(inner)
    }

    fn delete(&self, id: &str) -> Result<(), Self::Error> {
        self.inner.delete(id).map_err(inner)
    }

    fn list(&self) -> Result<Vec<Project>, Self::Error> {
        self.inner.list().map_err(inner)
    }
}

pub type EphemeralManager =
    ProjectManager<FaultyAssets<EphemeralAssetStore>, FaultyRecords<EphemeralRecordStore>>;
pub type LocalManager = ProjectManager<FaultyAssets<LocalAssetStore>, FaultyRecords<LocalRecordStore>>;

pub struct EphemeralStack {
    pub manager: EphemeralManager,
    pub notices: Arc<RecordingNotifier>,
}

impl EphemeralStack {
    pub fn new() -> Self {
        let notices = Arc::new(RecordingNotifier::default());
        let manager = ProjectManager::new(
            FaultyAssets::new(EphemeralAssetStore::new()),
            FaultyRecords::new(EphemeralRecordStore::new()),
        )
        .with_notifier(notices.clone());
        Self { manager, notices }
    }
}

impl Default for EphemeralStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Filesystem stack rooted in a temp dir removed on drop.
pub struct LocalStack {
    pub manager: LocalManager,
    pub notices: Arc<RecordingNotifier>,
    pub root: PathBuf,
    _dir: TempDir,
}

impl LocalStack {
    pub fn new() -> Result<Self, LocalError> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().to_path_buf();
        let (assets, records) = folio_storage_local::open_stores(&root)?;
        let notices = Arc::new(RecordingNotifier::default());
        let manager = ProjectManager::new(FaultyAssets::new(assets), FaultyRecords::new(records))
            .with_notifier(notices.clone());
        Ok(Self {
            manager,
            notices,
            root,
            _dir: dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{
        model::{NewFile, NoticeLevel},
        project::project_prefix,
        CoreError,
    };
    use folio_manager::ProjectDraft;

    fn file(name: &str, bytes: &[u8]) -> NewFile {
        NewFile::new(name, bytes.to_vec())
    }

    fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
        v.sort();
        v
    }

    /// Objects under the project's folder are exactly its asset list.
    fn assert_folder_matches<A: AssetStore, R: RecordStore>(
        m: &ProjectManager<A, R>,
        project: &Project,
    ) {
        let listed: Vec<Locator> = m
            .assets()
            .list(&project_prefix(&project.title))
            .unwrap()
            .into_iter()
            .map(|o| o.locator)
            .collect();
        assert_eq!(sorted(listed), sorted(project.assets.clone()));
    }

    fn contents<A: AssetStore, R: RecordStore>(
        m: &ProjectManager<A, R>,
        project: &Project,
    ) -> Vec<Vec<u8>> {
        project
            .assets
            .iter()
            .map(|l| m.assets().read(l).unwrap())
            .collect()
    }

    fn create_yields_readable_asset<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m.create_project("Demo", "x", vec![file("a.png", b"A")]).unwrap();
        assert_eq!(p.assets.len(), 1);
        assert_eq!(m.assets().read(&p.assets[0]).unwrap(), b"A");
        assert_folder_matches(m, &p);
    }

    fn rename_migrates_assets<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Demo v2".into();
        let saved = m.save_draft(draft).unwrap();

        assert_eq!(saved.title, "Demo v2");
        assert!(m.assets().list("projects/Demo/").unwrap().is_empty());
        let under_new = m.assets().list("projects/Demo_v2/").unwrap();
        assert_eq!(under_new.len(), 2);
        assert_eq!(
            sorted(contents(m, &saved)),
            vec![b"A".to_vec(), b"B".to_vec()]
        );
        assert_folder_matches(m, &saved);
        assert_eq!(m.get_project(&p.id).unwrap().title, "Demo v2");
    }

    fn edit_appends_in_order<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        let mut draft = ProjectDraft::from_project(&p);
        draft.add_file(file("c.png", b"C"));
        let saved = m.save_draft(draft).unwrap();
        assert_eq!(saved.assets.len(), 3);
        assert_eq!(saved.assets[0], p.assets[0]);
        assert_eq!(saved.assets[1], p.assets[1]);
        assert_eq!(
            contents(m, &saved),
            [b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]
        );
        assert_folder_matches(m, &saved);
    }

    fn delete_continues_past_failures<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m
            .create_project(
                "Demo",
                "x",
                vec![file("a.png", b"A"), file("b.png", b"B"), file("c.png", b"C")],
            )
            .unwrap();
        m.assets().fail_delete("b.png");
        let report = m.delete_project(&p.id, &p.title).unwrap();

        assert!(m.list_projects().unwrap().is_empty());
        assert_eq!(sorted(report.removed.clone()), ["projects/Demo/a.png", "projects/Demo/c.png"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "projects/Demo/b.png");
        let left: Vec<_> = m
            .assets()
            .list("projects/Demo/")
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(left, ["b.png"]);
    }

    fn invalid_creates_leave_no_trace<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        for (title, desc, files) in [
            ("", "x", vec![file("a.png", b"A")]),
            ("  ", "x", vec![file("a.png", b"A")]),
            ("Demo", "", vec![file("a.png", b"A")]),
            ("Demo", "x", vec![]),
            ("Demo", "x", vec![file("../a.png", b"A")]),
        ] {
            let err = m.create_project(title, desc, files).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{err}");
        }
        assert!(m.list_projects().unwrap().is_empty());
        assert!(m.assets().list("projects/Demo/").unwrap().is_empty());
    }

    fn failed_copy_leaves_project_untouched<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        m.assets().fail_put("projects/Demo_v2/b.png");
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Demo v2".into();
        assert!(matches!(m.save_draft(draft), Err(CoreError::Storage(_))));

        let stored = m.get_project(&p.id).unwrap();
        assert_eq!(stored.title, "Demo");
        assert_eq!(stored.assets, p.assets);
        assert_folder_matches(m, &stored);
        // copies made before the failure stay behind under the new prefix
        assert!(m.assets().list("projects/Demo_v2/").unwrap().len() <= 1);
    }

    fn failed_pending_upload_keeps_old_objects<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m.create_project("Demo", "x", vec![file("a.png", b"A")]).unwrap();
        m.assets().fail_put("projects/Gallery/c.png");
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Gallery".into();
        draft.add_file(file("c.png", b"C"));
        assert!(matches!(m.save_draft(draft), Err(CoreError::Storage(_))));

        let stored = m.get_project(&p.id).unwrap();
        assert_eq!(stored.title, "Demo");
        assert_eq!(stored.assets, p.assets);
        assert_eq!(contents(m, &stored), [b"A".to_vec()]);
        assert_folder_matches(m, &stored);
    }

    fn failed_rename_write_keeps_old_objects<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, FaultyRecords<R>>,
    ) {
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        m.records().fail_update();
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Demo v2".into();
        assert!(matches!(m.save_draft(draft), Err(CoreError::Record(_))));

        let stored = m.get_project(&p.id).unwrap();
        assert_eq!(stored.title, "Demo");
        assert_eq!(contents(m, &stored), [b"A".to_vec(), b"B".to_vec()]);
        assert_folder_matches(m, &stored);
    }

    fn record_failure_after_uploads<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, FaultyRecords<R>>,
        notices: &RecordingNotifier,
    ) {
        m.records().fail_create();
        let err = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap_err();
        assert!(matches!(err, CoreError::Record(_)), "{err}");
        assert!(m.list_projects().unwrap().is_empty());
        // uploaded files are not rolled back
        assert_eq!(m.assets().list("projects/Demo/").unwrap().len(), 2);
        assert_eq!(notices.last().unwrap().level, NoticeLevel::Error);
    }

    fn rename_with_stuck_old_objects<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
        notices: &RecordingNotifier,
    ) {
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        m.assets().fail_delete("projects/Demo/");
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Demo v2".into();
        let saved = m.save_draft(draft).unwrap();

        assert_eq!(saved.title, "Demo v2");
        assert_eq!(m.get_project(&p.id).unwrap(), saved);
        assert_folder_matches(m, &saved);
        assert_eq!(m.assets().list("projects/Demo/").unwrap().len(), 2);
        assert!(notices
            .notices()
            .iter()
            .any(|n| n.level == NoticeLevel::Info && n.message.contains("could not be removed")));
    }

    fn rename_uploads_pending_under_new_prefix<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m.create_project("Demo", "x", vec![file("a.png", b"A")]).unwrap();
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Gallery".into();
        draft.add_file(file("c.png", b"C"));
        let saved = m.save_draft(draft).unwrap();
        assert_eq!(contents(m, &saved), [b"A".to_vec(), b"C".to_vec()]);
        assert_eq!(
            m.assets().path_of(&saved.assets[1]).unwrap(),
            "projects/Gallery/c.png"
        );
        assert_folder_matches(m, &saved);
    }

    fn failed_remove_still_drops_entry<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        m.assets().fail_delete("a.png");
        let mut draft = ProjectDraft::from_project(&p);
        m.remove_asset(&mut draft, 0).unwrap();
        assert_eq!(draft.entries().len(), 1);
        let saved = m.save_draft(draft).unwrap();
        assert_eq!(saved.assets, vec![p.assets[1].clone()]);
        // the object survives in the store
        assert_eq!(m.assets().list("projects/Demo/").unwrap().len(), 2);
    }

    fn failed_upload_creates_no_record<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
        notices: &RecordingNotifier,
    ) {
        m.assets().fail_put("b.png");
        let err = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert!(m.list_projects().unwrap().is_empty());
        // no rollback of the file stored before the failure
        assert_eq!(m.assets().list("projects/Demo/").unwrap().len(), 1);
        assert_eq!(notices.last().unwrap().level, NoticeLevel::Error);
    }

    fn listing_failure_is_reported<S: AssetStore, R: RecordStore>(
        m: &ProjectManager<FaultyAssets<S>, R>,
    ) {
        let p = m.create_project("Demo", "x", vec![file("a.png", b"A")]).unwrap();
        m.assets().fail_list("projects/Demo/");
        let report = m.delete_project(&p.id, &p.title).unwrap();
        assert!(report.listing_error.is_some());
        assert!(report.removed.is_empty());
        assert!(m.list_projects().unwrap().is_empty());
    }

    #[test]
    fn ephemeral_create() {
        create_yields_readable_asset(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_create() {
        create_yields_readable_asset(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_rename() {
        rename_migrates_assets(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_rename() {
        rename_migrates_assets(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_edit() {
        edit_appends_in_order(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_edit() {
        edit_appends_in_order(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_delete_partial_failure() {
        delete_continues_past_failures(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_delete_partial_failure() {
        delete_continues_past_failures(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_invalid_creates() {
        invalid_creates_leave_no_trace(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_invalid_creates() {
        invalid_creates_leave_no_trace(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_failed_copy() {
        failed_copy_leaves_project_untouched(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_failed_copy() {
        failed_copy_leaves_project_untouched(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_failed_pending_upload_during_rename() {
        failed_pending_upload_keeps_old_objects(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_failed_pending_upload_during_rename() {
        failed_pending_upload_keeps_old_objects(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_failed_record_write_during_rename() {
        failed_rename_write_keeps_old_objects(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_failed_record_write_during_rename() {
        failed_rename_write_keeps_old_objects(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_record_failure_after_uploads() {
        let stack = EphemeralStack::new();
        record_failure_after_uploads(&stack.manager, &stack.notices);
    }

    #[test]
    fn local_record_failure_after_uploads() {
        let stack = LocalStack::new().unwrap();
        record_failure_after_uploads(&stack.manager, &stack.notices);
    }

    #[test]
    fn ephemeral_rename_with_stuck_old_objects() {
        let stack = EphemeralStack::new();
        rename_with_stuck_old_objects(&stack.manager, &stack.notices);
    }

    #[test]
    fn local_rename_with_stuck_old_objects() {
        let stack = LocalStack::new().unwrap();
        rename_with_stuck_old_objects(&stack.manager, &stack.notices);
    }

    #[test]
    fn ephemeral_rename_with_pending_file() {
        rename_uploads_pending_under_new_prefix(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_rename_with_pending_file() {
        rename_uploads_pending_under_new_prefix(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_failed_remove() {
        failed_remove_still_drops_entry(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_failed_remove() {
        failed_remove_still_drops_entry(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn ephemeral_failed_upload() {
        let stack = EphemeralStack::new();
        failed_upload_creates_no_record(&stack.manager, &stack.notices);
    }

    #[test]
    fn local_failed_upload() {
        let stack = LocalStack::new().unwrap();
        failed_upload_creates_no_record(&stack.manager, &stack.notices);
    }

    #[test]
    fn ephemeral_listing_failure() {
        listing_failure_is_reported(&EphemeralStack::new().manager);
    }

    #[test]
    fn local_listing_failure() {
        listing_failure_is_reported(&LocalStack::new().unwrap().manager);
    }

    #[test]
    fn local_state_survives_reopen() {
        let stack = LocalStack::new().unwrap();
        let p = stack
            .manager
            .create_project("Demo", "x", vec![file("a.png", b"A")])
            .unwrap();
        let (assets, records) = folio_storage_local::open_stores(&stack.root).unwrap();
        let reopened = ProjectManager::new(assets, records);
        let listed = reopened.list_projects().unwrap();
        assert_eq!(listed, vec![p.clone()]);
        assert_eq!(reopened.assets().read(&listed[0].assets[0]).unwrap(), b"A");
        assert_folder_matches(&reopened, &p);
    }
}
