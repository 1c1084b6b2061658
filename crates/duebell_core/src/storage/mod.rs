pub mod export;
pub mod json_store;

use crate::error::AppError;
use crate::model::{Task, UserStats};
use json_store::TaskState;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Store handle shared by the foreground thread and the reminder scheduler.
pub type SharedStore = Arc<Mutex<TaskStore>>;

/// Lock the shared store. A panic on another thread does not leave the task
/// list unusable, so a poisoned lock is taken over as-is.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, TaskStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`lock`], then [`TaskStore::refresh`] so the caller works on what is on
/// disk now.
pub fn lock_fresh(store: &SharedStore) -> MutexGuard<'_, TaskStore> {
    let mut guard = lock(store);
    guard.refresh();
    guard
}

/// In-memory owner of the task list and user stats, backed by one JSON file.
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    state: TaskState,
    /// In-memory changes that have not reached the file yet.
    unsaved: bool,
}

impl TaskStore {
    /// Read the file at `path`. A missing file starts empty; a corrupt one
    /// is logged and replaced by an empty list on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_reporting(path).0
    }

    /// Like [`TaskStore::load`], also handing back why the file was discarded.
    pub fn load_reporting(path: impl Into<PathBuf>) -> (Self, Option<AppError>) {
        let path = path.into();
        let loaded = json_store::load_state_with_fallback(&path);
        if let Some(err) = loaded.error.as_ref() {
            warn!(path = %path.display(), error = %err, "task store reset to empty");
        } else {
            debug!(path = %path.display(), tasks = loaded.state.tasks.len(), "task store loaded");
        }
        // A reset store differs from the file until it is written back.
        let unsaved = loaded.error.is_some();
        (
            Self {
                path,
                state: loaded.state,
                unsaved,
            },
            loaded.error,
        )
    }

    /// A store whose state has not been written to `path` yet.
    pub fn with_state(path: impl Into<PathBuf>, state: TaskState) -> Self {
        Self {
            path: path.into(),
            state,
            unsaved: true,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn stats(&self) -> &UserStats {
        &self.state.stats
    }

    pub fn stats_mut(&mut self) -> &mut UserStats {
        self.unsaved = true;
        &mut self.state.stats
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|task| task.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        let task = self.state.tasks.iter_mut().find(|task| task.id == id);
        if task.is_some() {
            self.unsaved = true;
        }
        task
    }

    pub fn push(&mut self, task: Task) {
        self.unsaved = true;
        self.state.tasks.push(task);
    }

    /// Drop every Completed or Deleted task. Returns how many were removed.
    pub fn purge_history(&mut self) -> usize {
        let before = self.state.tasks.len();
        self.state.tasks.retain(Task::is_pending);
        let removed = before - self.state.tasks.len();
        if removed > 0 {
            self.unsaved = true;
        }
        removed
    }

    pub fn next_id(&self) -> String {
        let mut nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        loop {
            let id = format!("task-{nanos}");
            if self.get(&id).is_none() {
                return id;
            }
            nanos += 1;
        }
    }

    /// Persist the full state. Failures are logged here and returned so the
    /// caller can decide to keep going in memory.
    pub fn save(&mut self) -> Result<(), AppError> {
        json_store::save_state(&self.path, &self.state).inspect_err(|err| {
            warn!(path = %self.path.display(), error = %err, "failed to save task store");
        })?;
        self.unsaved = false;
        Ok(())
    }

    /// Re-read the backing file, keeping the current state if it is unreadable.
    pub fn reload(&mut self) -> Result<(), AppError> {
        let state = json_store::load_state(&self.path)?;
        self.state = state;
        self.unsaved = false;
        Ok(())
    }

    /// Pick up writes other processes made since the last load or save.
    /// Skipped while this store holds changes the file has not seen.
    pub fn refresh(&mut self) {
        if self.unsaved {
            debug!(path = %self.path.display(), "refresh skipped, unsaved changes");
            return;
        }
        if let Err(err) = self.reload() {
            warn!(path = %self.path.display(), error = %err, "refresh failed, keeping tasks in memory");
        }
    }

    /// Write the CSV snapshot. An empty path is a no-op.
    pub fn export(&self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return false;
        }
        match export::export_csv(path, &self.state.tasks) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "export failed");
                false
            }
        }
    }
}
