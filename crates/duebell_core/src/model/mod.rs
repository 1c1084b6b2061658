mod stats;
mod task;

pub use stats::UserStats;
pub use task::{
    Category, Countdown, DATETIME_FORMAT, DueAt, Filter, Priority, Tag, Task, TaskStatus,
    format_date, format_timestamp, parse_date, parse_due, parse_due_at,
};
