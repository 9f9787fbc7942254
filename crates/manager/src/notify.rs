use folio_core::{
    model::{ConfirmPrompt, Notice, NoticeLevel, Progress},
    traits::{Confirm, Notifier},
};
use parking_lot::Mutex;
use tracing::{debug, error, info};

/// Writes notices to the tracing subscriber. Default for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => info!(message = %notice.message, "notice"),
            NoticeLevel::Error => error!(message = %notice.message, "notice"),
        }
    }

    fn progress(&self, progress: &Progress<'_>) {
        debug!(
            file = progress.file,
            completed = progress.completed,
            total = progress.total,
            "upload progress"
        );
    }
}

/// Keeps every notice and progress event in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    progress: Mutex<Vec<(String, usize, usize)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    /// `(file, completed, total)` per stored file.
    pub fn progress_events(&self) -> Vec<(String, usize, usize)> {
        self.progress.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }

    fn progress(&self, progress: &Progress<'_>) {
        self.progress.lock().push((
            progress.file.to_owned(),
            progress.completed,
            progress.total,
        ));
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverConfirm;

impl Confirm for NeverConfirm {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        debug!(title = %prompt.title, "confirmation declined");
        false
    }
}
