//! Background reminder pass.
//!
//! Every tick scans the whole task list, reminds about tasks that came due
//! and repeats the reminder once the task has been quiet for its priority's
//! interval.

use crate::clock::Clock;
use crate::config::ReminderSettings;
use crate::error::AppError;
use crate::events::ChangeFeed;
use crate::model::{Priority, Task};
use crate::notify::{DUE_MESSAGE, Notifier, Tone, due_title};
use crate::storage::{SharedStore, lock_fresh};
use crossbeam_channel::{Sender, select};
use std::sync::Arc;
use std::thread::JoinHandle;
use time::{Duration, PrimitiveDateTime};
use tracing::{debug, info, warn};

/// Where a task stands with respect to reminders at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// Completed or Deleted; never reminded again.
    Inactive,
    /// Due time does not parse.
    Skipped,
    NotDue,
    DueUnnotified,
    DueNotifiedFresh,
    DueNotifiedStale,
}

impl ReminderState {
    pub fn should_notify(self) -> bool {
        matches!(self, Self::DueUnnotified | Self::DueNotifiedStale)
    }
}

pub fn repeat_interval(priority: Priority, settings: &ReminderSettings) -> Duration {
    let secs = match priority {
        Priority::High => settings.high_interval_secs,
        Priority::Normal | Priority::Low => settings.normal_interval_secs,
    };
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

pub fn reminder_state(
    task: &Task,
    now: PrimitiveDateTime,
    settings: &ReminderSettings,
) -> ReminderState {
    if !task.is_pending() {
        return ReminderState::Inactive;
    }
    let Some(due) = task.due_at.time() else {
        return ReminderState::Skipped;
    };
    if now < due {
        return ReminderState::NotDue;
    }

    match task.last_reminded_at {
        None => ReminderState::DueUnnotified,
        Some(last) if now - last >= repeat_interval(task.priority, settings) => {
            ReminderState::DueNotifiedStale
        }
        Some(_) => ReminderState::DueNotifiedFresh,
    }
}

/// A reminder fired during one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: String,
    pub description: String,
    pub priority: Priority,
    /// False for the first reminder after the task came due.
    pub repeat: bool,
}

impl Reminder {
    pub fn title(&self) -> String {
        due_title(&self.description)
    }
}

pub struct ReminderScheduler {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    changes: ChangeFeed,
    settings: ReminderSettings,
    reports: Option<Sender<Reminder>>,
}

impl ReminderScheduler {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        changes: ChangeFeed,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            changes,
            settings,
            reports: None,
        }
    }

    /// Also send every fired reminder to `reports`, for callers that print
    /// them as they happen.
    pub fn report_to(mut self, reports: Sender<Reminder>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Run one pass. The store is re-read from disk, stamped and saved under
    /// one lock; popups and sounds go out after the lock is released.
    pub fn tick(&self) -> Vec<Reminder> {
        let now = self.clock.now();

        let fired = {
            let mut store = lock_fresh(&self.store);
            let mut fired = Vec::new();

            for task in store.tasks() {
                let state = reminder_state(task, now, &self.settings);
                if state == ReminderState::Skipped {
                    debug!(id = %task.id, due_at = %task.due_at, "reminder skipped, due time unparsable");
                    continue;
                }
                if !state.should_notify() {
                    continue;
                }

                fired.push(Reminder {
                    task_id: task.id.clone(),
                    description: task.description.clone(),
                    priority: task.priority,
                    repeat: state == ReminderState::DueNotifiedStale,
                });
            }

            for reminder in &fired {
                if let Some(task) = store.get_mut(&reminder.task_id) {
                    task.last_reminded_at = Some(now);
                }
            }
            if !fired.is_empty() {
                // Logged by the store; the stamps stay in memory.
                store.save().ok();
            }
            fired
        };

        for reminder in &fired {
            self.fire(reminder);
        }
        if !fired.is_empty() {
            self.changes.publish();
        }

        fired
    }

    fn fire(&self, reminder: &Reminder) {
        info!(
            id = %reminder.task_id,
            priority = %reminder.priority,
            repeat = reminder.repeat,
            "task due"
        );
        if let Err(err) = self.notifier.beep(Tone::Alert) {
            warn!(error = %err, "alert tone failed");
        }
        if let Err(err) = self.notifier.notify(&reminder.title(), DUE_MESSAGE) {
            warn!(error = %err, "popup notification failed");
        }
        if let Some(reports) = self.reports.as_ref() {
            reports.try_send(reminder.clone()).ok();
        }
    }

    /// Run passes on a background thread: one right away, then one per
    /// configured tick until the handle is stopped or dropped.
    pub fn spawn(self) -> Result<SchedulerHandle, AppError> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = crossbeam_channel::tick(self.settings.tick());

        let thread = std::thread::Builder::new()
            .name("duebell-reminders".to_string())
            .spawn(move || {
                info!(tick_secs = self.settings.tick_secs, "reminder scheduler started");
                self.tick();
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            self.tick();
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                info!("reminder scheduler stopped");
            })
            .map_err(|err| AppError::io(err.to_string()))?;

        Ok(SchedulerHandle {
            stop: stop_tx,
            thread: Some(thread),
        })
    }
}

pub struct SchedulerHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.try_send(()).ok();
        if thread.join().is_err() {
            warn!("reminder scheduler thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::{Reminder, ReminderScheduler, ReminderState, reminder_state};
    use crate::clock::ManualClock;
    use crate::config::ReminderSettings;
    use crate::error::AppError;
    use crate::events::ChangeFeed;
    use crate::model::{Category, DueAt, Priority, Task, TaskStatus};
    use crate::notify::{Notifier, Tone};
    use crate::storage::json_store::{self, TaskState};
    use crate::storage::{SharedStore, TaskStore, lock};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::Duration;
    use time::macros::datetime;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("duebell-{nanos}-{file_name}"))
    }

    #[derive(Default)]
    struct RecordingNotifier {
        popups: Mutex<Vec<(String, String)>>,
        beeps: Mutex<Vec<Tone>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, message: &str) -> Result<(), AppError> {
            self.popups
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }

        fn beep(&self, tone: Tone) -> Result<(), AppError> {
            self.beeps.lock().unwrap().push(tone);
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&self, _title: &str, _message: &str) -> Result<(), AppError> {
            Err(AppError::io("no notification daemon"))
        }
    }

    fn task(id: &str, priority: Priority) -> Task {
        Task::new(
            id.to_string(),
            "Submit report".to_string(),
            Category::Work,
            priority,
            datetime!(2024-01-01 09:00:00),
        )
    }

    fn store_with(path: &PathBuf, tasks: Vec<Task>) -> SharedStore {
        TaskStore::with_state(
            path,
            TaskState {
                tasks,
                ..TaskState::default()
            },
        )
        .into_shared()
    }

    fn scheduler(
        store: &SharedStore,
        clock: &Arc<ManualClock>,
        notifier: Arc<dyn Notifier>,
    ) -> ReminderScheduler {
        ReminderScheduler::new(
            Arc::clone(store),
            clock.clone(),
            notifier,
            ChangeFeed::new(),
            ReminderSettings::default(),
        )
    }

    #[test]
    fn state_machine_follows_due_and_interval() {
        let settings = ReminderSettings::default();
        let mut task = task("t", Priority::Normal);

        assert_eq!(
            reminder_state(&task, datetime!(2024-01-01 08:59:59), &settings),
            ReminderState::NotDue
        );
        assert_eq!(
            reminder_state(&task, datetime!(2024-01-01 09:00:00), &settings),
            ReminderState::DueUnnotified
        );

        task.last_reminded_at = Some(datetime!(2024-01-01 09:00:00));
        assert_eq!(
            reminder_state(&task, datetime!(2024-01-01 09:14:59), &settings),
            ReminderState::DueNotifiedFresh
        );
        assert_eq!(
            reminder_state(&task, datetime!(2024-01-01 09:15:00), &settings),
            ReminderState::DueNotifiedStale
        );

        task.status = TaskStatus::Completed;
        assert_eq!(
            reminder_state(&task, datetime!(2024-01-01 10:00:00), &settings),
            ReminderState::Inactive
        );
    }

    #[test]
    fn future_last_reminder_counts_as_fresh() {
        let settings = ReminderSettings::default();
        let mut task = task("t", Priority::High);
        task.last_reminded_at = Some(datetime!(2024-01-01 12:00:00));

        assert_eq!(
            reminder_state(&task, datetime!(2024-01-01 10:00:00), &settings),
            ReminderState::DueNotifiedFresh
        );
    }

    #[test]
    fn high_priority_reminds_once_then_after_five_minutes() {
        let path = temp_path("scenario.json");
        let store = store_with(&path, vec![task("report", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 08:59:58)));
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = scheduler(&store, &clock, notifier.clone());

        assert!(scheduler.tick().is_empty());

        clock.set(datetime!(2024-01-01 09:00:00));
        let first = scheduler.tick();
        assert_eq!(
            first,
            vec![Reminder {
                task_id: "report".to_string(),
                description: "Submit report".to_string(),
                priority: Priority::High,
                repeat: false,
            }]
        );

        let mut elapsed = 0;
        while elapsed < 298 {
            clock.advance(Duration::seconds(2));
            elapsed += 2;
            assert!(scheduler.tick().is_empty(), "reminded again after {elapsed}s");
        }
        clock.set(datetime!(2024-01-01 09:04:59));
        assert!(scheduler.tick().is_empty());

        clock.set(datetime!(2024-01-01 09:05:00));
        let second = scheduler.tick();
        assert_eq!(second.len(), 1);
        assert!(second[0].repeat);

        let popups = notifier.popups.lock().unwrap().clone();
        assert_eq!(
            popups,
            vec![
                ("Due: Submit report".to_string(), "Task is due!".to_string()),
                ("Due: Submit report".to_string(), "Task is due!".to_string()),
            ]
        );
        assert_eq!(*notifier.beeps.lock().unwrap(), vec![Tone::Alert, Tone::Alert]);

        let stored = json_store::load_state(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(
            stored.tasks[0].last_reminded_at,
            Some(datetime!(2024-01-01 09:05:00))
        );
    }

    #[test]
    fn normal_priority_waits_fifteen_minutes() {
        let path = temp_path("normal.json");
        let store = store_with(&path, vec![task("n", Priority::Low)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 09:00:00)));
        let scheduler = scheduler(&store, &clock, Arc::new(RecordingNotifier::default()));

        assert_eq!(scheduler.tick().len(), 1);
        clock.set(datetime!(2024-01-01 09:05:00));
        assert!(scheduler.tick().is_empty());
        clock.set(datetime!(2024-01-01 09:15:00));
        assert_eq!(scheduler.tick().len(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn finished_and_unparsable_tasks_are_skipped() {
        let path = temp_path("skips.json");
        let mut done = task("done", Priority::High);
        done.status = TaskStatus::Completed;
        let mut gone = task("gone", Priority::High);
        gone.status = TaskStatus::Deleted;
        let mut broken = task("broken", Priority::High);
        broken.due_at = DueAt::Unparsable("next tuesday".to_string());
        let store = store_with(&path, vec![done, gone, broken, task("live", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-02 00:00:00)));
        let scheduler = scheduler(&store, &clock, Arc::new(RecordingNotifier::default()));

        let fired: Vec<String> = scheduler.tick().into_iter().map(|r| r.task_id).collect();
        std::fs::remove_file(&path).ok();

        assert_eq!(fired, ["live"]);
        assert!(lock(&store).get("done").unwrap().last_reminded_at.is_none());
    }

    #[test]
    fn snooze_after_reminder_resets_cycle() {
        let path = temp_path("snooze-cycle.json");
        let store = store_with(&path, vec![task("t", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 09:00:00)));
        let scheduler = scheduler(&store, &clock, Arc::new(RecordingNotifier::default()));

        assert_eq!(scheduler.tick().len(), 1);
        {
            let mut guard = lock(&store);
            let task = guard.get_mut("t").unwrap();
            task.due_at = DueAt::At(datetime!(2024-01-01 09:10:00));
            task.last_reminded_at = None;
        }

        clock.set(datetime!(2024-01-01 09:09:59));
        assert!(scheduler.tick().is_empty());
        clock.set(datetime!(2024-01-01 09:10:00));
        let fired = scheduler.tick();
        std::fs::remove_file(&path).ok();

        assert_eq!(fired.len(), 1);
        assert!(!fired[0].repeat);
    }

    #[test]
    fn pass_keeps_changes_written_by_another_process() {
        let path = temp_path("shared-file.json");
        let store = store_with(&path, vec![task("t1", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 09:00:00)));
        let scheduler = scheduler(&store, &clock, Arc::new(RecordingNotifier::default()));
        assert_eq!(scheduler.tick().len(), 1);

        let mut other = TaskStore::load(&path);
        other.get_mut("t1").unwrap().status = TaskStatus::Completed;
        other.push(task("t2", Priority::High));
        other.save().unwrap();

        clock.set(datetime!(2024-01-01 09:05:00));
        let fired: Vec<String> = scheduler.tick().into_iter().map(|r| r.task_id).collect();
        let stored = json_store::load_state(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(fired, ["t2"]);
        assert_eq!(stored.tasks.len(), 2);
        assert_eq!(stored.tasks[0].status, TaskStatus::Completed);
        assert_eq!(
            stored.tasks[1].last_reminded_at,
            Some(datetime!(2024-01-01 09:05:00))
        );
    }

    #[test]
    fn notifier_failures_do_not_stop_the_pass() {
        let path = temp_path("failing.json");
        let store = store_with(&path, vec![task("a", Priority::High), task("b", Priority::Low)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 10:00:00)));
        let scheduler = scheduler(&store, &clock, Arc::new(FailingNotifier));

        let fired = scheduler.tick();
        std::fs::remove_file(&path).ok();

        assert_eq!(fired.len(), 2);
        assert!(lock(&store).tasks().iter().all(|t| t.last_reminded_at.is_some()));
    }

    #[test]
    fn save_failure_keeps_stamps_in_memory() {
        let blocker = temp_path("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = store_with(&blocker.join("tasks.json"), vec![task("a", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 10:00:00)));
        let scheduler = scheduler(&store, &clock, Arc::new(RecordingNotifier::default()));

        assert_eq!(scheduler.tick().len(), 1);
        assert!(scheduler.tick().is_empty());
        std::fs::remove_file(&blocker).ok();
    }

    #[test]
    fn firing_publishes_change() {
        let path = temp_path("publish.json");
        let store = store_with(&path, vec![task("a", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 10:00:00)));
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        let scheduler = ReminderScheduler::new(
            Arc::clone(&store),
            clock.clone(),
            Arc::new(RecordingNotifier::default()),
            feed,
            ReminderSettings::default(),
        );

        scheduler.tick();
        assert!(rx.try_recv().is_ok());

        scheduler.tick();
        std::fs::remove_file(&path).ok();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn fired_reminders_are_reported() {
        let path = temp_path("reports.json");
        let store = store_with(&path, vec![task("a", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 10:00:00)));
        let (tx, rx) = crossbeam_channel::unbounded();
        let scheduler =
            scheduler(&store, &clock, Arc::new(RecordingNotifier::default())).report_to(tx);

        scheduler.tick();
        std::fs::remove_file(&path).ok();

        let reported = rx.try_recv().unwrap();
        assert_eq!(reported.task_id, "a");
        assert_eq!(reported.title(), "Due: Submit report");
    }

    #[test]
    fn spawned_scheduler_runs_first_pass_and_stops() {
        let path = temp_path("spawned.json");
        let store = store_with(&path, vec![task("a", Priority::High)]);
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 10:00:00)));
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        let scheduler = ReminderScheduler::new(
            Arc::clone(&store),
            clock.clone(),
            Arc::new(RecordingNotifier::default()),
            feed,
            ReminderSettings::default(),
        );

        let handle = scheduler.spawn().unwrap();
        let signal = rx.recv_timeout(std::time::Duration::from_secs(5));
        handle.stop();
        std::fs::remove_file(&path).ok();

        assert!(signal.is_ok());
        assert_eq!(
            lock(&store).get("a").unwrap().last_reminded_at,
            Some(datetime!(2024-01-01 10:00:00))
        );
    }
}
