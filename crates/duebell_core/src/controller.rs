use crate::clock::Clock;
use crate::config::ReminderSettings;
use crate::error::AppError;
use crate::events::{ChangeFeed, DataChanged};
use crate::model::{
    Category, DueAt, Filter, Priority, Tag, Task, TaskStatus, UserStats, parse_due_at,
};
use crate::notify::{Notifier, Tone};
use crate::scheduler::ReminderScheduler;
use crate::storage::{SharedStore, TaskStore, lock, lock_fresh};
use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::Arc;
use time::{Duration, PrimitiveDateTime};
use tracing::{debug, info, warn};

/// One row of the main list: the task plus its display tag at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub task: Task,
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub category: Filter<Category>,
    pub priority: Filter<Priority>,
}

/// Operations the presentation layer calls. Every mutation takes the store
/// lock for its whole load-modify-persist step, so it never interleaves with
/// a reminder pass or misses a write from another process.
pub struct TaskController {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    changes: ChangeFeed,
    filter: ViewFilter,
}

impl TaskController {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            clock,
            notifier,
            changes: ChangeFeed::new(),
            filter: ViewFilter::default(),
        }
    }

    pub fn open(path: &Path, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(TaskStore::load(path).into_shared(), clock, notifier)
    }

    /// A scheduler sharing this controller's store, clock, notifier and
    /// change feed.
    pub fn reminder_scheduler(&self, settings: ReminderSettings) -> ReminderScheduler {
        ReminderScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&self.notifier),
            self.changes.clone(),
            settings,
        )
    }

    pub fn now(&self) -> PrimitiveDateTime {
        self.clock.now()
    }

    /// Receive a signal whenever the task list changes, including changes
    /// made by the reminder scheduler.
    pub fn subscribe(&self) -> Receiver<DataChanged> {
        self.changes.subscribe()
    }

    pub fn add_task(
        &self,
        description: &str,
        category: Category,
        priority: Priority,
        due_at: &str,
    ) -> Result<Task, AppError> {
        if description.trim().is_empty() {
            return Err(AppError::invalid_input("description is required"));
        }
        let due_at = parse_due_at(due_at)?;
        self.add_task_at(description, category, priority, due_at)
    }

    pub fn add_task_at(
        &self,
        description: &str,
        category: Category,
        priority: Priority,
        due_at: PrimitiveDateTime,
    ) -> Result<Task, AppError> {
        let trimmed = description.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("description is required"));
        }

        let task = {
            let mut store = lock_fresh(&self.store);
            let task = Task::new(
                store.next_id(),
                trimmed.to_string(),
                category,
                priority,
                due_at,
            );
            store.push(task.clone());
            persist(&mut store);
            task
        };

        info!(id = %task.id, due_at = %task.due_at, "task added");
        self.changes.publish();
        Ok(task)
    }

    pub fn complete_task(&self, id: &str) -> Result<Task, AppError> {
        let today = self.clock.now().date();
        let task = {
            let mut store = lock_fresh(&self.store);
            let task = pending_mut(&mut store, id)?;
            task.status = TaskStatus::Completed;
            let completed = task.clone();
            store.stats_mut().record_completion(today);
            persist(&mut store);
            completed
        };

        if let Err(err) = self.notifier.beep(Tone::Success) {
            warn!(error = %err, "success tone failed");
        }
        info!(id = %task.id, "task completed");
        self.changes.publish();
        Ok(task)
    }

    /// Soft delete: the task stays in storage for the history view.
    pub fn delete_task(&self, id: &str) -> Result<Task, AppError> {
        let task = {
            let mut store = lock_fresh(&self.store);
            let task = pending_mut(&mut store, id)?;
            task.status = TaskStatus::Deleted;
            let deleted = task.clone();
            persist(&mut store);
            deleted
        };

        info!(id = %task.id, "task deleted");
        self.changes.publish();
        Ok(task)
    }

    /// Push the due time back and forget the last reminder. A task whose due
    /// time never parsed is returned unchanged.
    pub fn snooze_task(&self, id: &str, minutes: u32) -> Result<Task, AppError> {
        if minutes == 0 {
            return Err(AppError::invalid_input("minutes must be positive"));
        }

        let task = {
            let mut store = lock_fresh(&self.store);
            let task = pending_mut(&mut store, id)?;
            let Some(due) = task.due_at.time() else {
                debug!(id = %task.id, due_at = %task.due_at, "snooze skipped, due time unparsable");
                return Ok(task.clone());
            };
            let snoozed = due
                .checked_add(Duration::minutes(i64::from(minutes)))
                .ok_or_else(|| AppError::invalid_input("snooze is out of range"))?;
            task.due_at = DueAt::At(snoozed);
            task.last_reminded_at = None;
            let updated = task.clone();
            persist(&mut store);
            updated
        };

        info!(id = %task.id, minutes, due_at = %task.due_at, "task snoozed");
        self.changes.publish();
        Ok(task)
    }

    /// Drop every Completed and Deleted task for good.
    pub fn clear_history(&self) -> usize {
        let removed = {
            let mut store = lock_fresh(&self.store);
            let removed = store.purge_history();
            persist(&mut store);
            removed
        };

        info!(removed, "history cleared");
        self.changes.publish();
        removed
    }

    /// Non-deleted tasks, unfinished first then by due time, narrowed by the
    /// filters. Built from a fresh snapshot on every call.
    pub fn list_view(
        &self,
        category: Filter<Category>,
        priority: Filter<Priority>,
    ) -> impl Iterator<Item = ViewRow> + use<> {
        let now = self.clock.now();
        let mut active: Vec<Task> = lock_fresh(&self.store)
            .tasks()
            .iter()
            .filter(|task| task.status != TaskStatus::Deleted)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            let a_key = (a.status == TaskStatus::Completed, &a.due_at);
            let b_key = (b.status == TaskStatus::Completed, &b.due_at);
            a_key.cmp(&b_key)
        });

        active
            .into_iter()
            .filter(move |task| category.matches(&task.category) && priority.matches(&task.priority))
            .map(move |task| ViewRow {
                tag: task.tag(now),
                task,
            })
    }

    pub fn set_filter(&mut self, category: Filter<Category>, priority: Filter<Priority>) {
        self.filter = ViewFilter { category, priority };
    }

    /// [`TaskController::list_view`] with the filter last passed to
    /// [`TaskController::set_filter`].
    pub fn view(&self) -> impl Iterator<Item = ViewRow> + use<> {
        self.list_view(self.filter.category, self.filter.priority)
    }

    /// Completed and Deleted tasks, latest due first.
    pub fn list_history(&self) -> Vec<Task> {
        let mut history: Vec<Task> = lock_fresh(&self.store)
            .tasks()
            .iter()
            .filter(|task| task.is_history())
            .cloned()
            .collect();
        history.sort_by(|a, b| b.due_at.cmp(&a.due_at));
        history
    }

    pub fn get_task(&self, id: &str) -> Result<Task, AppError> {
        let trimmed_id = require_id(id)?;
        lock_fresh(&self.store)
            .get(trimmed_id)
            .cloned()
            .ok_or_else(|| AppError::invalid_input("task not found"))
    }

    pub fn stats(&self) -> UserStats {
        lock_fresh(&self.store).stats().clone()
    }

    pub fn export_to(&self, path: &Path) -> bool {
        lock_fresh(&self.store).export(path)
    }

    /// Pick up changes written to the store file by another process.
    pub fn reload(&self) -> Result<(), AppError> {
        lock(&self.store).reload()?;
        self.changes.publish();
        Ok(())
    }
}

/// Save failures are already logged by the store; the change stays in memory.
fn persist(store: &mut TaskStore) {
    store.save().ok();
}

fn require_id(id: &str) -> Result<&str, AppError> {
    let trimmed_id = id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }
    Ok(trimmed_id)
}

/// Look up a task that may still change state. Completed and Deleted are
/// terminal.
fn pending_mut<'a>(store: &'a mut TaskStore, id: &str) -> Result<&'a mut Task, AppError> {
    let trimmed_id = require_id(id)?;
    let task = store
        .get_mut(trimmed_id)
        .ok_or_else(|| AppError::invalid_input("task not found"))?;
    match task.status {
        TaskStatus::Pending => Ok(task),
        TaskStatus::Completed => Err(AppError::invalid_input("task already completed")),
        TaskStatus::Deleted => Err(AppError::invalid_input("task is deleted")),
    }
}
