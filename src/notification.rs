use crate::prelude::*;

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

/// How many status updates stay editable before they age out of the queue.
const KEEP_ENTRIES: usize = 16;

#[derive(Debug)]
pub struct StatusEntry {
    pub title: String,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

/// Handle to a queued status update. `update` mutates the entry in place and
/// reports whether the entry was still editable; once the notifier has let
/// go of it the edit is refused and the caller must post a fresh update.
#[derive(Clone)]
pub struct StatusHandle {
    entry: Weak<Mutex<StatusEntry>>,
}

impl StatusHandle {
    /// Handle onto an entry owned by a notifier implementation.
    pub fn for_entry(entry: &Arc<Mutex<StatusEntry>>) -> Self {
        Self {
            entry: Arc::downgrade(entry),
        }
    }

    pub fn update<F: FnOnce(&mut StatusEntry)>(&self, f: F) -> bool {
        match self.entry.upgrade() {
            Some(entry) => {
                let mut entry = entry.lock().unwrap();
                f(&mut entry);
                true
            }
            None => false,
        }
    }
}

pub trait Notifier: Send {
    fn enqueue_status_update(&mut self, title: &str, text: &str) -> StatusHandle;
    fn send_mail(&mut self, title: &str, body: &str, is_html: bool);
}

/// Notifier that mirrors everything to the log. The most recent updates are
/// kept alive so late edits (fault resolutions) can still land.
pub struct LogNotifier {
    entries: VecDeque<Arc<Mutex<StatusEntry>>>,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl Notifier for LogNotifier {
    fn enqueue_status_update(&mut self, title: &str, text: &str) -> StatusHandle {
        info!("status update: {}: {}", title, text);
        let entry = Arc::new(Mutex::new(StatusEntry {
            title: title.to_string(),
            text: text.to_string(),
            timestamp: Local::now(),
        }));
        let handle = StatusHandle::for_entry(&entry);
        self.entries.push_back(entry);
        while self.entries.len() > KEEP_ENTRIES {
            self.entries.pop_front();
        }
        handle
    }

    fn send_mail(&mut self, title: &str, body: &str, is_html: bool) {
        let kind = if is_html { "html" } else { "text" };
        info!("mail ({}): {}\n{}", kind, title, body);
    }
}
