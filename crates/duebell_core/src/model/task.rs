use crate::error::AppError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, PrimitiveDateTime, Time};

/// Wall-clock format used on disk, in exports and in list output.
pub const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_HMS: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const TIME_HM: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");
const TIME_12H: &[BorrowedFormatItem<'static>] = format_description!(
    "[hour repr:12 padding:none]:[minute] [period case_sensitive:false]"
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "task")]
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(rename = "datetime")]
    pub due_at: DueAt,
    pub status: TaskStatus,
    #[serde(
        rename = "last_reminded",
        default,
        with = "lenient_timestamp"
    )]
    pub last_reminded_at: Option<PrimitiveDateTime>,
}

impl Task {
    pub fn new(
        id: String,
        description: String,
        category: Category,
        priority: Priority,
        due_at: PrimitiveDateTime,
    ) -> Self {
        Self {
            id,
            description,
            category,
            priority,
            due_at: DueAt::At(due_at),
            status: TaskStatus::Pending,
            last_reminded_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_history(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Deleted)
    }

    pub fn is_overdue(&self, now: PrimitiveDateTime) -> bool {
        match self.due_at.time() {
            Some(due) => self.is_pending() && due < now,
            None => false,
        }
    }

    /// Display classification, recomputed on every render.
    pub fn tag(&self, now: PrimitiveDateTime) -> Tag {
        if self.status == TaskStatus::Completed {
            Tag::Completed
        } else if self.is_overdue(now) {
            Tag::Overdue
        } else {
            Tag::Priority(self.priority)
        }
    }

    pub fn countdown(&self, now: PrimitiveDateTime) -> Countdown {
        match (self.status, self.due_at.time()) {
            (TaskStatus::Completed, _) => Countdown::Completed,
            (TaskStatus::Deleted, _) => Countdown::Deleted,
            (TaskStatus::Pending, None) => Countdown::Unscheduled,
            (TaskStatus::Pending, Some(due)) if now > due => Countdown::Overdue(now - due),
            (TaskStatus::Pending, Some(due)) => Countdown::DueIn(due - now),
        }
    }
}

/// Time left until a task is due, or how late it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    DueIn(Duration),
    Overdue(Duration),
    Completed,
    Deleted,
    /// The due time does not parse.
    Unscheduled,
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DueIn(left) => {
                let secs = left.whole_seconds();
                write!(
                    f,
                    "Due in: {}d, {}h, {}m",
                    secs / 86_400,
                    secs % 86_400 / 3_600,
                    secs % 3_600 / 60
                )
            }
            Self::Overdue(late) => {
                let secs = late.whole_seconds();
                let days = secs / 86_400;
                f.write_str("Overdue by: ")?;
                match days {
                    0 => {}
                    1 => f.write_str("1 day, ")?,
                    _ => write!(f, "{days} days, ")?,
                }
                write!(
                    f,
                    "{}:{:02}:{:02}",
                    secs % 86_400 / 3_600,
                    secs % 3_600 / 60,
                    secs % 60
                )
            }
            Self::Completed => f.write_str("Task Completed"),
            Self::Deleted => f.write_str("Task Deleted"),
            Self::Unscheduled => f.write_str("Invalid Time Data"),
        }
    }
}

/// A due timestamp as read from storage.
///
/// Tasks created through the controller always hold `At`. Files edited by
/// hand may carry text that does not parse; it is kept verbatim so that a
/// save writes it back unchanged, and the reminder pass skips the task.
///
/// Ordering follows the stored text, so unparsable values sort among the
/// timestamps as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DueAt {
    At(PrimitiveDateTime),
    Unparsable(String),
}

impl DueAt {
    pub fn time(&self) -> Option<PrimitiveDateTime> {
        match self {
            Self::At(value) => Some(*value),
            Self::Unparsable(_) => None,
        }
    }

    fn from_raw(raw: String) -> Self {
        match PrimitiveDateTime::parse(raw.trim(), DATETIME_FORMAT) {
            Ok(value) => Self::At(value),
            Err(_) => Self::Unparsable(raw),
        }
    }
}

impl Ord for DueAt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::At(a), Self::At(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl PartialOrd for DueAt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DueAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(value) => {
                let text = value.format(DATETIME_FORMAT).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
            Self::Unparsable(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for DueAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::At(value) => {
                let text = value
                    .format(DATETIME_FORMAT)
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
            Self::Unparsable(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for DueAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_raw(raw))
    }
}

pub fn format_timestamp(value: PrimitiveDateTime) -> Result<String, AppError> {
    value
        .format(DATETIME_FORMAT)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

pub fn format_date(value: Date) -> Result<String, AppError> {
    value
        .format(DATE_FORMAT)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::invalid_input("date must be YYYY-MM-DD"))
}

/// Parse a due timestamp typed by the user.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM`, `YYYY-MM-DD hh:MM AM`
/// and a bare `YYYY-MM-DD` (midnight).
pub fn parse_due_at(raw: &str) -> Result<PrimitiveDateTime, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("due date is required"));
    }

    match trimmed.split_once(char::is_whitespace) {
        Some((date, time)) => parse_due(date, time),
        None => Ok(PrimitiveDateTime::new(parse_date(trimmed)?, Time::MIDNIGHT)),
    }
}

/// Join a separate date and time of day into a due timestamp.
pub fn parse_due(date: &str, time: &str) -> Result<PrimitiveDateTime, AppError> {
    let date = parse_date(date)?;
    let time = time.trim();
    let time = Time::parse(time, TIME_HMS)
        .or_else(|_| Time::parse(time, TIME_HM))
        .or_else(|_| Time::parse(time, TIME_12H))
        .map_err(|_| AppError::invalid_input("time must be HH:MM[:SS] or hh:MM AM/PM"))?;
    Ok(PrimitiveDateTime::new(date, time))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Work,
    Study,
    Personal,
    Health,
    Coding,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::Work,
        Self::Study,
        Self::Personal,
        Self::Health,
        Self::Coding,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Study => "Study",
            Self::Personal => "Personal",
            Self::Health => "Health",
            Self::Coding => "Coding",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::High, Self::Normal, Self::Low];

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Normal => "Normal",
            Self::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
}

impl TaskStatus {
    const ALL: [TaskStatus; 3] = [Self::Pending, Self::Completed, Self::Deleted];

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Deleted => "Deleted",
        }
    }
}

macro_rules! labelled_enum {
    ($ty:ty, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = AppError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let wanted = raw.trim();
                Self::ALL
                    .into_iter()
                    .find(|value| value.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| AppError::invalid_input(format!("unknown {}: {}", $what, wanted)))
            }
        }
    };
}

labelled_enum!(Category, "category");
labelled_enum!(Priority, "priority");
labelled_enum!(TaskStatus, "status");

/// View classification of a task; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Overdue,
    Completed,
    Priority(Priority),
}

impl Tag {
    pub fn label(self) -> &'static str {
        match self {
            Self::Overdue => "Overdue",
            Self::Completed => "Completed",
            Self::Priority(priority) => priority.label(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// List filter where `All` matches every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<T> {
    All,
    Only(T),
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Self::All
    }
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == value,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Only(value) => value.fmt(f),
        }
    }
}

impl<T: FromStr<Err = AppError>> FromStr for Filter<T> {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            raw.parse().map(Self::Only)
        }
    }
}

/// `last_reminded` is advisory: a value that does not parse is read as absent,
/// which at worst triggers one extra reminder.
mod lenient_timestamp {
    use super::DATETIME_FORMAT;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(
        value: &Option<PrimitiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => {
                let text = value
                    .format(DATETIME_FORMAT)
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<PrimitiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|value| PrimitiveDateTime::parse(value.trim(), DATETIME_FORMAT).ok()))
    }
}
