use clap::{Parser, Subcommand};
use duebell_core::model::{Category, Filter, Priority};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Without a command, an interactive session starts
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    ///
    /// Overrides given when starting an interactive session apply to the whole
    /// session, including its background reminders. Inside the session,
    /// reminders.* overrides on a command line only affect `check`.
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: duebell add "Submit report" --category work --priority high --due "2024-01-01 09:00"
    /// Example: duebell add "Gym" --due "2024-01-02 07:30 PM"
    Add {
        description: Option<String>,
        #[arg(long, default_value_t = Category::Work)]
        category: Category,
        #[arg(long, default_value_t = Priority::Normal)]
        priority: Priority,
        /// Due time: "YYYY-MM-DD HH:MM[:SS]", "YYYY-MM-DD" or "YYYY-MM-DD hh:MM AM"
        #[arg(long)]
        due: String,
    },
    /// Mark a task as completed
    ///
    /// Example: duebell done task-1700000000000000000
    Done { id: String },
    /// Move a task to history without completing it
    ///
    /// Example: duebell delete task-1700000000000000000
    Delete { id: String },
    /// Push a task's due time back
    ///
    /// Example: duebell snooze task-1700000000000000000 --minutes 30
    Snooze {
        id: String,
        #[arg(long, default_value_t = 10)]
        minutes: u32,
    },
    /// List unfinished and completed tasks
    ///
    /// Example: duebell list --category work --priority all
    List {
        #[arg(long, default_value_t = Filter::All)]
        category: Filter<Category>,
        #[arg(long, default_value_t = Filter::All)]
        priority: Filter<Priority>,
    },
    /// Show one task and how long until it is due
    ///
    /// Example: duebell show task-1700000000000000000
    Show { id: String },
    /// List completed and deleted tasks, newest first
    History,
    /// Permanently remove completed and deleted tasks
    ClearHistory {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
    /// Write every task to a CSV file
    ///
    /// Example: duebell export tasks.csv
    Export { path: String },
    /// Show the completion streak
    Stats,
    /// Run one reminder pass and exit
    Check,
    /// Keep sending reminders until interrupted
    Watch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Theme,
    TickSecs,
    HighIntervalSecs,
    NormalIntervalSecs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let (field, remainder) = key_raw
        .split_once('.')
        .map(|(field, rest)| (field.trim(), Some(rest.trim())))
        .unwrap_or((key_raw.trim(), None));

    let canonical_field =
        canonicalize_flag_name(field).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match canonical_field.as_str() {
        "theme" => {
            if remainder.is_some() {
                return Err("theme override cannot have subfields".to_string());
            }
            ConfigOverrideTarget::Theme
        }
        "reminders" | "reminder" => {
            let setting = remainder
                .and_then(canonicalize_flag_name)
                .ok_or_else(|| "reminders override requires a setting name".to_string())?;
            match setting.as_str() {
                "tick_secs" => ConfigOverrideTarget::TickSecs,
                "high_interval_secs" => ConfigOverrideTarget::HighIntervalSecs,
                "normal_interval_secs" => ConfigOverrideTarget::NormalIntervalSecs,
                other => return Err(format!("unknown reminders setting '{other}'")),
            }
        }
        other => return Err(format!("unknown config field '{other}'")),
    };

    if target != ConfigOverrideTarget::Theme && !is_positive_integer(&value) {
        return Err(format!("{key_raw} must be a positive number of seconds"));
    }

    Ok(ParsedConfigOverride { target, value })
}

fn is_positive_integer(value: &str) -> bool {
    value.parse::<u64>().is_ok_and(|secs| secs > 0)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
