use std::io::{self, BufRead, Write};

use folio_core::{
    model::{ConfirmPrompt, Notice, NoticeLevel, Progress},
    traits::{Confirm, Notifier},
};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

/// Prints notices to stderr and shows an upload bar while files are stored.
#[derive(Default)]
pub struct ConsoleNotifier {
    bar: Mutex<Option<ProgressBar>>,
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish_and_clear();
        }
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        eprintln!("{tag}: {}", notice.message);
    }

    fn progress(&self, progress: &Progress<'_>) {
        let mut slot = self.bar.lock();
        let bar = slot.get_or_insert_with(|| upload_bar(progress.total));
        bar.set_message(progress.file.to_owned());
        bar.set_position(progress.completed as u64);
        if progress.completed >= progress.total {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

fn upload_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

/// Reads a y/N answer from stdin. Anything but `y`/`yes` declines.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        eprint!("{}\n{} [y/N] ", prompt.title, prompt.message);
        let _ = io::stderr().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}
