use crate::error::AppError;
use crate::model::{Task, UserStats};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const STORE_FILE_NAME: &str = "tasks.json";
const STORE_ENV_VAR: &str = "DUEBELL_STORE_PATH";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub stats: UserStats,
}

#[derive(Debug, Clone)]
pub struct StateLoad {
    pub state: TaskState,
    pub error: Option<AppError>,
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("duebell").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("duebell")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_state(path: &Path) -> Result<TaskState, AppError> {
    if !path.exists() {
        return Ok(TaskState::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let mut state: TaskState = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;

    assign_missing_ids(&mut state.tasks);
    Ok(state)
}

/// Load the store, falling back to an empty list and default stats when the
/// file cannot be read or understood. The reason is reported, not raised.
pub fn load_state_with_fallback(path: &Path) -> StateLoad {
    match load_state(path) {
        Ok(state) => StateLoad { state, error: None },
        Err(err) => StateLoad {
            state: TaskState::default(),
            error: Some(err),
        },
    }
}

/// Write through a sibling temp file and rename it over the target, so a
/// crash mid-write leaves the previous file intact.
pub fn save_state(path: &Path, state: &TaskState) -> Result<(), AppError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|err| AppError::io(err.to_string()))?;

    let content = serde_json::to_string_pretty(state)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    let mut temp_file = NamedTempFile::new_in(&dir).map_err(|err| AppError::io(err.to_string()))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|err| AppError::io(err.to_string()))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(permissions)
            .map_err(|err| AppError::io(err.to_string()))?;
    }

    temp_file
        .persist(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err.error)))?;

    Ok(())
}

/// Files written before ids existed carry none; give every task a unique one.
fn assign_missing_ids(tasks: &mut [Task]) {
    let mut seen = HashSet::new();
    let mut counter = 0usize;

    for task in tasks.iter_mut() {
        let id = task.id.trim().to_string();
        if !id.is_empty() && seen.insert(id.clone()) {
            task.id = id;
            continue;
        }

        loop {
            counter += 1;
            let candidate = format!("task-legacy-{counter}");
            if !seen.contains(&candidate) {
                seen.insert(candidate.clone());
                task.id = candidate;
                break;
            }
        }
    }
}
