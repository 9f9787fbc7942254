//! Project lifecycle manager.
//!
//! Keeps each project's record and the asset objects under
//! `projects/{normalized title}/` moving together through create, edit,
//! rename, single-asset removal and delete. The two stores are updated
//! independently and in sequence; there is no cross-store transaction:
//!
//! - create: files stored before a failed upload or a failed record write stay behind;
//! - rename: copies and uploads made before a failed step stay under the new
//!   prefix, and the old objects are only deleted after the record write;
//! - delete: the record goes first, objects that fail to delete stay behind.

use std::{collections::HashMap, sync::Arc};

use folio_core::{
    errors::CoreError,
    model::{
        AssetEntry, ConfirmPrompt, Locator, NewFile, Notice, Progress, Project, ProjectFields,
        ProjectPatch, StoredObject,
    },
    project::{asset_path, project_prefix, same_folder},
    traits::{AssetStore, Confirm, Notifier, RecordStore},
    validate::{validate_create, validate_edit},
};
use tracing::{debug, info, info_span, warn};

mod draft;
mod notify;
mod session;

pub use crate::draft::ProjectDraft;
pub use crate::notify::{AlwaysConfirm, NeverConfirm, RecordingNotifier, TracingNotifier};
pub use crate::session::{resolve_route, Route, SessionGate, SIGN_IN_FAILED, SIGN_UP_FAILED};

/// Outcome of the best-effort asset cleanup after a project record is deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub removed: Vec<String>,
    /// `(path, error)` for every object that could not be deleted.
    pub failed: Vec<(String, String)>,
    /// Set when the folder could not be listed; nothing was deleted then.
    pub listing_error: Option<String>,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.listing_error.is_none()
    }
}

pub struct ProjectManager<A, R> {
    assets: A,
    records: R,
    notifier: Arc<dyn Notifier>,
    confirm: Arc<dyn Confirm>,
}

impl<A: AssetStore, R: RecordStore> ProjectManager<A, R> {
    pub fn new(assets: A, records: R) -> Self {
        Self {
            assets,
            records,
            notifier: Arc::new(TracingNotifier),
            confirm: Arc::new(AlwaysConfirm),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    /// Every project in store order. Read-through: each call hits the record store.
    pub fn list_projects(&self) -> Result<Vec<Project>, CoreError> {
        let projects = self
            .records
            .list()
            .map_err(|e| self.fail("load projects", CoreError::record(e)))?;
        debug!(count = projects.len(), "projects listed");
        Ok(projects)
    }

    pub fn get_project(&self, id: &str) -> Result<Project, CoreError> {
        self.load(id)
            .map_err(|e| self.fail("load the project", e))
    }

    /// Uploads every file under the project's folder, in order, then writes the
    /// record. Nothing is rolled back when a later step fails.
    pub fn create_project(
        &self,
        title: &str,
        description: &str,
        files: Vec<NewFile>,
    ) -> Result<Project, CoreError> {
        let span = info_span!("create_project", title = %title.trim());
        let _guard = span.enter();
        let project = self
            .create_inner(title, description, &files)
            .map_err(|e| self.fail("create the project", e))?;
        info!(project = %project.id, assets = project.assets.len(), "project created");
        self.notifier
            .notify(Notice::success(format!("project \"{}\" created", project.title)));
        Ok(project)
    }

    fn create_inner(
        &self,
        title: &str,
        description: &str,
        files: &[NewFile],
    ) -> Result<Project, CoreError> {
        validate_create(title, description, files)?;
        let title = title.trim();
        let total = files.len();
        let mut locators = Vec::with_capacity(total);
        for (i, file) in files.iter().enumerate() {
            locators.push(self.store_file(title, file, i + 1, total)?);
        }
        let fields = ProjectFields {
            title: title.to_owned(),
            description: description.to_owned(),
            assets: locators,
        };
        let id = self.records.create(&fields).map_err(|e| {
            warn!(
                orphaned = fields.assets.len(),
                "record write failed after uploads"
            );
            CoreError::record(e)
        })?;
        Ok(self
            .records
            .get(&id)
            .map_err(CoreError::record)?
            .unwrap_or_else(|| Project::from_fields(id, fields)))
    }

    /// Persists a draft. A title whose normalized form differs from the stored
    /// one moves every asset to the new folder first.
    pub fn save_draft(&self, draft: ProjectDraft) -> Result<Project, CoreError> {
        let span = info_span!("save_draft", project = %draft.id());
        let _guard = span.enter();
        let project = self
            .save_inner(&draft)
            .map_err(|e| self.fail("save the project", e))?;
        self.notifier
            .notify(Notice::success(format!("project \"{}\" saved", project.title)));
        Ok(project)
    }

    fn save_inner(&self, draft: &ProjectDraft) -> Result<Project, CoreError> {
        validate_edit(&draft.title, draft.pending_files())?;
        let stored = self.load(draft.id())?;
        let title = draft.title.trim();
        if same_folder(&stored.title, title) {
            if stored.title != title {
                debug!(from = %stored.title, to = %title, "cosmetic rename");
            }
            let assets = self.materialize(title, draft.entries(), &HashMap::new())?;
            self.write(&stored.id, title, &draft.description, assets)
        } else {
            self.rename(&stored, title, draft)
        }
    }

    fn rename(
        &self,
        stored: &Project,
        title: &str,
        draft: &ProjectDraft,
    ) -> Result<Project, CoreError> {
        let old_prefix = project_prefix(&stored.title);
        let objects = self.assets.list(&old_prefix).map_err(CoreError::storage)?;
        debug!(from = %old_prefix, to = %project_prefix(title), objects = objects.len(), "migrating assets");

        let mut moved = HashMap::with_capacity(objects.len());
        let mut migrated = Vec::with_capacity(objects.len());
        for object in &objects {
            let locator = self.copy_verified(object, title)?;
            moved.insert(object.locator.clone(), locator.clone());
            migrated.push(locator);
        }

        let mut assets = self.materialize(title, draft.entries(), &moved)?;
        for locator in migrated {
            if !assets.contains(&locator) {
                assets.push(locator);
            }
        }
        // old objects go only once the record points at the new folder
        let project = self.write(&stored.id, title, &draft.description, assets)?;

        let mut leftovers = Vec::new();
        for object in &objects {
            if let Err(e) = self.assets.delete(&object.path) {
                warn!(path = %object.path, error = %e, "old asset not removed after migration");
                leftovers.push(object.path.clone());
            }
        }
        info!(project = %project.id, moved = objects.len(), leftovers = leftovers.len(), "project renamed");
        if !leftovers.is_empty() {
            self.notifier.notify(Notice::info(format!(
                "{} old file(s) could not be removed from {}",
                leftovers.len(),
                old_prefix
            )));
        }
        Ok(project)
    }

    /// Copies one object under the new title's folder and reads it back.
    fn copy_verified(&self, object: &StoredObject, title: &str) -> Result<Locator, CoreError> {
        let bytes = self.assets.read(&object.locator).map_err(CoreError::storage)?;
        let target = asset_path(title, &object.name);
        let locator = self
            .assets
            .put(&target, &bytes)
            .map_err(CoreError::storage)?;
        let copied = self.assets.read(&locator).map_err(CoreError::storage)?;
        if copied != bytes {
            return Err(CoreError::Storage(format!(
                "copy of {} to {} did not verify",
                object.path, target
            )));
        }
        debug!(from = %object.path, to = %target, "asset copied");
        Ok(locator)
    }

    /// Resolves draft entries to locators in order, uploading pending files
    /// under `title` and mapping migrated locators.
    fn materialize(
        &self,
        title: &str,
        entries: &[AssetEntry],
        moved: &HashMap<Locator, Locator>,
    ) -> Result<Vec<Locator>, CoreError> {
        let total = entries
            .iter()
            .filter(|e| matches!(e, AssetEntry::Pending(_)))
            .count();
        let mut completed = 0;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                AssetEntry::Existing(locator) => {
                    out.push(moved.get(locator).unwrap_or(locator).clone());
                }
                AssetEntry::Pending(file) => {
                    completed += 1;
                    out.push(self.store_file(title, file, completed, total)?);
                }
            }
        }
        Ok(out)
    }

    fn store_file(
        &self,
        title: &str,
        file: &NewFile,
        completed: usize,
        total: usize,
    ) -> Result<Locator, CoreError> {
        let path = asset_path(title, &file.name);
        let locator = self.assets.put(&path, &file.bytes).map_err(|e| {
            warn!(path = %path, error = %e, "upload failed");
            CoreError::storage(e)
        })?;
        debug!(path = %path, locator = %locator, "asset stored");
        self.notifier.progress(&Progress {
            file: &file.name,
            completed,
            total,
        });
        Ok(locator)
    }

    fn write(
        &self,
        id: &str,
        title: &str,
        description: &str,
        assets: Vec<Locator>,
    ) -> Result<Project, CoreError> {
        let patch = ProjectPatch {
            title: Some(title.to_owned()),
            description: Some(description.to_owned()),
            assets: Some(assets),
        };
        self.records.update(id, &patch).map_err(CoreError::record)?;
        self.load(id)
    }

    fn load(&self, id: &str) -> Result<Project, CoreError> {
        self.records
            .get(id)
            .map_err(CoreError::record)?
            .ok_or_else(|| CoreError::NotFound(id.to_owned()))
    }

    /// Drops the entry at `index` from the draft. A persisted asset is also
    /// deleted from the store; a failure there is logged and ignored.
    pub fn remove_asset(
        &self,
        draft: &mut ProjectDraft,
        index: usize,
    ) -> Result<AssetEntry, CoreError> {
        let entry = draft.take(index)?;
        match &entry {
            AssetEntry::Existing(locator) => self.delete_locator(locator),
            AssetEntry::Pending(file) => debug!(file = %file.name, "pending file dropped"),
        }
        Ok(entry)
    }

    pub fn remove_asset_by_locator(
        &self,
        draft: &mut ProjectDraft,
        locator: &Locator,
    ) -> Option<AssetEntry> {
        let index = draft.position_of(locator)?;
        self.remove_asset(draft, index).ok()
    }

    fn delete_locator(&self, locator: &Locator) {
        let res = self
            .assets
            .path_of(locator)
            .and_then(|path| self.assets.delete(&path).map(|()| path));
        match res {
            Ok(path) => debug!(path = %path, "asset deleted"),
            Err(e) => warn!(locator = %locator, error = %e, "asset delete failed; dropped from draft anyway"),
        }
    }

    /// Deletes the record, then every object under the title's folder.
    /// Object deletes continue past failures; see the returned report.
    pub fn delete_project(&self, id: &str, title: &str) -> Result<DeleteReport, CoreError> {
        let span = info_span!("delete_project", project = %id);
        let _guard = span.enter();
        self.records
            .delete(id)
            .map_err(|e| self.fail("delete the project", CoreError::record(e)))?;

        let prefix = project_prefix(title);
        let mut report = DeleteReport::default();
        match self.assets.list(&prefix) {
            Ok(objects) => {
                for object in objects {
                    match self.assets.delete(&object.path) {
                        Ok(()) => report.removed.push(object.path),
                        Err(e) => {
                            warn!(path = %object.path, error = %e, "asset delete failed; continuing");
                            report.failed.push((object.path, e.to_string()));
                        }
                    }
                }
            }
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "could not list assets of deleted project");
                report.listing_error = Some(e.to_string());
            }
        }

        info!(removed = report.removed.len(), failed = report.failed.len(), "project deleted");
        if report.is_clean() {
            self.notifier.notify(Notice::success("project deleted"));
        } else {
            self.notifier.notify(Notice::info(format!(
                "project deleted; some files under {prefix} could not be removed"
            )));
        }
        Ok(report)
    }

    /// Asks for confirmation first. `None` when the user declines.
    pub fn confirm_and_delete(&self, project: &Project) -> Result<Option<DeleteReport>, CoreError> {
        let prompt = ConfirmPrompt {
            title: "Delete project?".to_owned(),
            message: format!(
                "\"{}\" and its {} file(s) will be removed permanently.",
                project.title,
                project.assets.len()
            ),
        };
        if !self.confirm.confirm(&prompt) {
            info!(project = %project.id, "delete cancelled");
            return Ok(None);
        }
        self.delete_project(&project.id, &project.title).map(Some)
    }

    fn fail(&self, action: &str, err: CoreError) -> CoreError {
        warn!(kind = err.kind(), error = %err, "could not {}", action);
        self.notifier
            .notify(Notice::error(format!("could not {action}: {err}")));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{model::NoticeLevel, ValidationError};
    use folio_storage_ephemeral::{EphemeralAssetStore, EphemeralRecordStore};

    type Manager = ProjectManager<EphemeralAssetStore, EphemeralRecordStore>;

    fn manager() -> (Manager, Arc<RecordingNotifier>) {
        let notes = Arc::new(RecordingNotifier::default());
        let m = ProjectManager::new(EphemeralAssetStore::new(), EphemeralRecordStore::new())
            .with_notifier(notes.clone());
        (m, notes)
    }

    fn file(name: &str, bytes: &[u8]) -> NewFile {
        NewFile::new(name, bytes.to_vec())
    }

    #[test]
    fn create_stores_files_then_record() {
        let (m, notes) = manager();
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        assert_eq!(p.assets.len(), 2);
        assert_eq!(m.assets().read(&p.assets[0]).unwrap(), b"A");
        assert_eq!(
            m.assets().paths(),
            ["projects/Demo/a.png", "projects/Demo/b.png"]
        );
        assert_eq!(
            notes.progress_events(),
            [("a.png".to_string(), 1, 2), ("b.png".to_string(), 2, 2)]
        );
        assert_eq!(notes.last().unwrap().level, NoticeLevel::Success);
        assert_eq!(m.list_projects().unwrap(), vec![p]);
    }

    #[test]
    fn invalid_create_touches_nothing() {
        let (m, notes) = manager();
        let cases: [(&str, &str, Vec<NewFile>); 3] = [
            ("", "x", vec![file("a.png", b"A")]),
            ("Demo", "", vec![file("a.png", b"A")]),
            ("Demo", "x", vec![]),
        ];
        for (title, desc, files) in cases {
            let err = m.create_project(title, desc, files).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{err}");
        }
        assert!(m.assets().is_empty());
        assert!(m.list_projects().unwrap().is_empty());
        assert!(notes
            .notices()
            .iter()
            .all(|n| n.level == NoticeLevel::Error));
    }

    #[test]
    fn edit_appends_new_file_and_keeps_existing_locators() {
        let (m, _) = manager();
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        let mut draft = ProjectDraft::from_project(&p);
        draft.description = String::new();
        draft.add_file(file("c.png", b"C"));
        let saved = m.save_draft(draft).unwrap();
        assert_eq!(saved.assets.len(), 3);
        assert_eq!(&saved.assets[..2], &p.assets[..]);
        assert_eq!(m.assets().read(&saved.assets[2]).unwrap(), b"C");
        assert!(saved.description.is_empty());
    }

    #[test]
    fn rename_moves_every_object() {
        let (m, _) = manager();
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Demo v2".into();
        draft.add_file(file("c.png", b"C"));
        let saved = m.save_draft(draft).unwrap();

        assert_eq!(saved.title, "Demo v2");
        assert!(m.assets().list("projects/Demo/").unwrap().is_empty());
        let under_new = m.assets().list("projects/Demo_v2/").unwrap();
        assert_eq!(under_new.len(), 3);
        let bytes: Vec<_> = saved
            .assets
            .iter()
            .map(|l| m.assets().read(l).unwrap())
            .collect();
        assert_eq!(bytes, [b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);
    }

    #[test]
    fn cosmetic_rename_keeps_objects_in_place() {
        let (m, _) = manager();
        let p = m
            .create_project("Demo!", "x", vec![file("a.png", b"A")])
            .unwrap();
        let mut draft = ProjectDraft::from_project(&p);
        draft.title = "Demo?".into();
        let saved = m.save_draft(draft).unwrap();
        assert_eq!(saved.title, "Demo?");
        assert_eq!(saved.assets, p.assets);
        assert_eq!(m.assets().paths(), ["projects/Demo_/a.png"]);
    }

    #[test]
    fn saving_a_missing_project_fails() {
        let (m, _) = manager();
        let p = m.create_project("Demo", "x", vec![file("a.png", b"A")]).unwrap();
        let draft = ProjectDraft::from_project(&p);
        m.delete_project(&p.id, &p.title).unwrap();
        assert!(matches!(m.save_draft(draft), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn remove_asset_deletes_persisted_object_only() {
        let (m, _) = manager();
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        let mut draft = ProjectDraft::from_project(&p);
        draft.add_file(file("c.png", b"C"));

        assert!(matches!(
            m.remove_asset(&mut draft, 2).unwrap(),
            AssetEntry::Pending(_)
        ));
        assert_eq!(m.assets().len(), 2);

        let removed = m.remove_asset_by_locator(&mut draft, &p.assets[0]).unwrap();
        assert_eq!(removed, AssetEntry::Existing(p.assets[0].clone()));
        assert_eq!(m.assets().paths(), ["projects/Demo/b.png"]);

        assert!(matches!(
            m.remove_asset(&mut draft, 9),
            Err(CoreError::Validation(ValidationError::AssetIndexOutOfRange { .. }))
        ));
        let saved = m.save_draft(draft).unwrap();
        assert_eq!(saved.assets, vec![p.assets[1].clone()]);
    }

    #[test]
    fn delete_removes_record_and_folder() {
        let (m, _) = manager();
        let keep = m.create_project("Other", "x", vec![file("o.png", b"O")]).unwrap();
        let p = m
            .create_project("Demo", "x", vec![file("a.png", b"A"), file("b.png", b"B")])
            .unwrap();
        let report = m.delete_project(&p.id, &p.title).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 2);
        assert_eq!(m.list_projects().unwrap(), vec![keep]);
        assert_eq!(m.assets().paths(), ["projects/Other/o.png"]);
    }

    #[test]
    fn declined_confirmation_keeps_project() {
        let (m, _) = manager();
        let m = m.with_confirm(Arc::new(NeverConfirm));
        let p = m.create_project("Demo", "x", vec![file("a.png", b"A")]).unwrap();
        assert!(m.confirm_and_delete(&p).unwrap().is_none());
        assert_eq!(m.list_projects().unwrap().len(), 1);

        let m = m.with_confirm(Arc::new(AlwaysConfirm));
        assert!(m.confirm_and_delete(&p).unwrap().is_some());
        assert!(m.list_projects().unwrap().is_empty());
    }
}
