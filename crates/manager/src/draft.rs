use folio_core::{
    model::{AssetEntry, Locator, NewFile, Project, ProjectId},
    project::same_folder,
    ValidationError,
};

/// Edit-pending state of one project: the values a user is about to save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectDraft {
    id: ProjectId,
    original_title: String,
    pub title: String,
    pub description: String,
    entries: Vec<AssetEntry>,
}

impl ProjectDraft {
    pub fn from_project(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            original_title: project.title.clone(),
            title: project.title.clone(),
            description: project.description.clone(),
            entries: project
                .assets
                .iter()
                .cloned()
                .map(AssetEntry::Existing)
                .collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_title(&self) -> &str {
        &self.original_title
    }

    pub fn entries(&self) -> &[AssetEntry] {
        &self.entries
    }

    pub fn add_file(&mut self, file: NewFile) {
        self.entries.push(AssetEntry::Pending(file));
    }

    pub fn position_of(&self, locator: &Locator) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.locator() == Some(locator))
    }

    pub fn pending_files(&self) -> impl Iterator<Item = &NewFile> {
        self.entries.iter().filter_map(|entry| match entry {
            AssetEntry::Pending(file) => Some(file),
            AssetEntry::Existing(_) => None,
        })
    }

    /// True when saving moves the assets to another storage folder.
    pub fn is_rename(&self) -> bool {
        !same_folder(&self.original_title, &self.title)
    }

    pub(crate) fn take(&mut self, index: usize) -> Result<AssetEntry, ValidationError> {
        if index >= self.entries.len() {
            return Err(ValidationError::AssetIndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }
}
