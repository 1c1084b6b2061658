use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use crossbeam_channel::Receiver;
use duebell_cli::cli::{Cli, Command, ConfigOverrideTarget, parse_config_override};
use duebell_cli::render;
use duebell_core::clock::SystemClock;
use duebell_core::config::{self, Config, ConfigOverrides, Palette, palette_for_theme};
use duebell_core::controller::{TaskController, ViewRow};
use duebell_core::error::AppError;
use duebell_core::notify::notifier_from_env;
use duebell_core::scheduler::Reminder;
use duebell_core::storage::json_store;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "DUEBELL_LOG";

struct App {
    controller: TaskController,
    config: Config,
    interactive: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config() -> Config {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error {
        warn!(error = %err, "config ignored, using defaults");
    }
    loaded.config
}

// Must run before any thread is spawned: the clock reads the local offset here.
fn open_app(config: Config, interactive: bool) -> Result<App, AppError> {
    let path = json_store::store_path()?;
    let clock = Arc::new(SystemClock::new());
    let controller = TaskController::open(&path, clock, notifier_from_env());
    Ok(App {
        controller,
        config,
        interactive,
    })
}

fn parse_secs(value: &str) -> Result<Option<u64>, AppError> {
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| AppError::invalid_input(format!("invalid number of seconds: {value}")))
}

fn config_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry).map_err(AppError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
            ConfigOverrideTarget::TickSecs => overrides.tick_secs = parse_secs(&parsed.value)?,
            ConfigOverrideTarget::HighIntervalSecs => {
                overrides.high_interval_secs = parse_secs(&parsed.value)?
            }
            ConfigOverrideTarget::NormalIntervalSecs => {
                overrides.normal_interval_secs = parse_secs(&parsed.value)?
            }
        }
    }
    Ok(overrides)
}

fn print_reminder(reminder: &Reminder, json: bool, palette: &Palette) {
    if json {
        println!("{}", render::reminder_json(reminder));
    } else {
        println!("{}", render::reminder_line(reminder, palette));
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn is_display_request(err: &clap::Error) -> bool {
    matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn apply_overrides(base: &Config, raw: &[String]) -> Result<Config, AppError> {
    Ok(config::merge_overrides(base, &config_overrides(raw)?))
}

fn run_command(app: &mut App, cli: Cli) -> Result<(), AppError> {
    let Some(command) = cli.command else {
        return Err(AppError::invalid_input("a command is required"));
    };
    let config = apply_overrides(&app.config, &cli.config_override)?;
    let palette = palette_for_theme(config.theme.as_deref());
    let controller = &mut app.controller;

    match command {
        Command::Add {
            description,
            category,
            priority,
            due,
        } => {
            let description = match description {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("description is required")),
            };

            let task = controller.add_task(&description, category, priority, &due)?;
            if cli.json {
                println!("{}", render::task_json(&task));
            } else {
                println!(
                    "Added task: {} ({}) due {}",
                    task.description, task.id, task.due_at
                );
            }
        }
        Command::Done { id } => {
            let task = controller.complete_task(&id)?;
            let stats = controller.stats();
            if cli.json {
                let mut payload = render::task_json(&task);
                payload["stats"] = render::stats_json(&stats);
                println!("{payload}");
            } else {
                println!("Completed task: {} ({})", task.description, task.id);
                println!("{}", render::stats_line(&stats));
            }
        }
        Command::Delete { id } => {
            let task = controller.delete_task(&id)?;
            if cli.json {
                println!("{}", render::task_json(&task));
            } else {
                println!("Deleted task: {} ({})", task.description, task.id);
            }
        }
        Command::Snooze { id, minutes } => {
            let task = controller.snooze_task(&id, minutes)?;
            if cli.json {
                println!("{}", render::task_json(&task));
            } else {
                println!(
                    "Snoozed task: {} ({}) until {}",
                    task.description, task.id, task.due_at
                );
            }
        }
        Command::List { category, priority } => {
            controller.set_filter(category, priority);
            let rows: Vec<ViewRow> = controller.view().collect();
            if cli.json {
                println!("{}", render::view_json(&rows));
            } else {
                println!("{}", render::view_table(&rows, &palette));
            }
        }
        Command::Show { id } => {
            let task = controller.get_task(&id)?;
            let countdown = task.countdown(controller.now());
            if cli.json {
                let mut payload = render::task_json(&task);
                payload["countdown"] = countdown.to_string().into();
                println!("{payload}");
            } else {
                println!("{}", render::task_card(&task, countdown, &palette));
            }
        }
        Command::History => {
            let tasks = controller.list_history();
            if cli.json {
                println!("{}", render::tasks_json(&tasks));
            } else {
                println!("{}", render::history_table(&tasks));
            }
        }
        Command::ClearHistory { yes } => {
            if !yes {
                return Err(AppError::invalid_input(
                    "clear-history permanently removes tasks; pass --yes to confirm",
                ));
            }
            let removed = controller.clear_history();
            if cli.json {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else {
                println!("Removed {removed} task(s) from history");
            }
        }
        Command::Export { path } => {
            if !controller.export_to(Path::new(&path)) {
                return Err(AppError::io(format!("could not export to '{path}'")));
            }
            if cli.json {
                println!("{}", serde_json::json!({ "path": path, "exported": true }));
            } else {
                println!("Exported tasks to {path}");
            }
        }
        Command::Stats => {
            let stats = controller.stats();
            if cli.json {
                println!("{}", render::stats_json(&stats));
            } else {
                println!("{}", render::stats_line(&stats));
            }
        }
        Command::Check => {
            let reminders = controller.reminder_scheduler(config.reminders).tick();
            if cli.json {
                let payload: Vec<_> = reminders.iter().map(render::reminder_json).collect();
                println!("{}", serde_json::Value::Array(payload));
            } else if reminders.is_empty() {
                println!("No reminders due.");
            } else {
                for reminder in &reminders {
                    print_reminder(reminder, false, &palette);
                }
            }
        }
        Command::Watch => {
            if app.interactive {
                return Err(AppError::invalid_input(
                    "reminders already run in the background of this session",
                ));
            }
            let (reports, fired) = crossbeam_channel::unbounded();
            let handle = controller
                .reminder_scheduler(config.reminders)
                .report_to(reports)
                .spawn()?;
            if !cli.json {
                println!("Watching for due tasks. Press Ctrl-C to stop.");
            }
            for reminder in fired.iter() {
                print_reminder(&reminder, cli.json, &palette);
            }
            handle.stop();
        }
    }

    Ok(())
}

fn spawn_reminder_printer(
    fired: Receiver<Reminder>,
    palette: Palette,
) -> Result<JoinHandle<()>, AppError> {
    std::thread::Builder::new()
        .name("duebell-printer".to_string())
        .spawn(move || {
            for reminder in fired.iter() {
                print_reminder(&reminder, false, &palette);
            }
        })
        .map_err(|err| AppError::io(err.to_string()))
}

fn run_interactive(mut app: App) -> Result<(), AppError> {
    let palette = palette_for_theme(app.config.theme.as_deref());
    let (reports, fired) = crossbeam_channel::unbounded();
    let scheduler = app
        .controller
        .reminder_scheduler(app.config.reminders)
        .report_to(reports)
        .spawn()?;
    let printer = spawn_reminder_printer(fired, palette)?;

    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("duebell".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) if is_display_request(&err) => {
                print!("{err}");
                continue;
            }
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(&mut app, cli) {
            eprintln!("ERROR: {}", err);
        }
    }

    scheduler.stop();
    if printer.join().is_err() {
        warn!("reminder printer thread panicked");
    }
    Ok(())
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if is_display_request(&err) => err.exit(),
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    let result = if cli.command.is_some() {
        open_app(load_config(), false).and_then(|mut app| run_command(&mut app, cli))
    } else {
        apply_overrides(&load_config(), &cli.config_override)
            .and_then(|config| open_app(config, true))
            .and_then(run_interactive)
    };
    if let Err(err) = result {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
