use duebell_core::config::Palette;
use duebell_core::controller::ViewRow;
use duebell_core::model::{Countdown, Task, UserStats, format_date, format_timestamp};
use duebell_core::scheduler::Reminder;
use serde_json::{Value, json};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ViewLine {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Task")]
    description: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Due")]
    due_at: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Tag")]
    tag: String,
}

#[derive(Tabled)]
struct HistoryLine {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Task")]
    description: String,
    #[tabled(rename = "Due")]
    due_at: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub fn task_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "description": task.description,
        "category": task.category.label(),
        "priority": task.priority.label(),
        "due_at": task.due_at.to_string(),
        "status": task.status.label(),
        "last_reminded_at": task.last_reminded_at.and_then(|at| format_timestamp(at).ok()),
    })
}

pub fn view_json(rows: &[ViewRow]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| {
                let mut value = task_json(&row.task);
                value["tag"] = Value::from(row.tag.label());
                value
            })
            .collect(),
    )
}

pub fn tasks_json(tasks: &[Task]) -> Value {
    Value::Array(tasks.iter().map(task_json).collect())
}

pub fn stats_json(stats: &UserStats) -> Value {
    json!({
        "streak": stats.streak,
        "last_active_date": stats.last_active_date.and_then(|date| format_date(date).ok()),
        "total_completed": stats.total_completed,
    })
}

pub fn reminder_json(reminder: &Reminder) -> Value {
    json!({
        "id": reminder.task_id,
        "description": reminder.description,
        "priority": reminder.priority.label(),
        "repeat": reminder.repeat,
    })
}

pub fn view_table(rows: &[ViewRow], palette: &Palette) -> String {
    if rows.is_empty() {
        return "No tasks.".to_string();
    }

    let lines = rows.iter().map(|row| ViewLine {
        id: row.task.id.clone(),
        priority: row.task.priority.to_string(),
        description: row.task.description.clone(),
        category: row.task.category.to_string(),
        due_at: row.task.due_at.to_string(),
        status: row.task.status.to_string(),
        tag: palette.paint_tag(row.tag),
    });
    Table::new(lines).with(Style::psql()).to_string()
}

pub fn history_table(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "History is empty.".to_string();
    }

    let lines = tasks.iter().map(|task| HistoryLine {
        id: task.id.clone(),
        description: task.description.clone(),
        due_at: task.due_at.to_string(),
        status: task.status.to_string(),
    });
    Table::new(lines).with(Style::psql()).to_string()
}

/// Detail view of one task with its countdown on the last line.
pub fn task_card(task: &Task, countdown: Countdown, palette: &Palette) -> String {
    let countdown_line = match countdown {
        Countdown::Overdue(_) => palette.accentize(&countdown.to_string()),
        Countdown::Completed | Countdown::Deleted => palette.mutedize(&countdown.to_string()),
        _ => countdown.to_string(),
    };
    format!(
        "{} ({})\n{} Priority | {} | {}\nDue: {}\n{countdown_line}",
        task.description, task.id, task.priority, task.category, task.status, task.due_at
    )
}

pub fn stats_line(stats: &UserStats) -> String {
    let days = if stats.streak == 1 { "day" } else { "days" };
    format!(
        "Streak: {} {days} | Completed: {}",
        stats.streak, stats.total_completed
    )
}

pub fn reminder_line(reminder: &Reminder, palette: &Palette) -> String {
    let text = format!("Reminder: {} ({})", reminder.description, reminder.task_id);
    palette.accentize(&text)
}
