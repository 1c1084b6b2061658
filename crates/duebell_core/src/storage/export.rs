use crate::error::AppError;
use crate::model::Task;
use csv::{Terminator, WriterBuilder};
use std::io::Write;
use std::path::Path;

const EXPORT_COLUMNS: [&str; 5] = ["Task", "Category", "Priority", "Date", "Status"];

pub fn render_csv(tasks: &[Task]) -> Result<String, AppError> {
    let bytes = write_rows(Vec::new(), tasks)?;
    String::from_utf8(bytes).map_err(|err| AppError::invalid_data(err.to_string()))
}

pub fn export_csv(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }
    let file = std::fs::File::create(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    write_rows(file, tasks)?;
    Ok(())
}

/// Header plus one record per task, in store order, `\n` line endings.
fn write_rows<W: Write>(out: W, tasks: &[Task]) -> Result<W, AppError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);
    writer.write_record(EXPORT_COLUMNS).map_err(csv_error)?;

    for task in tasks {
        let due_at = task.due_at.to_string();
        writer
            .write_record([
                task.description.as_str(),
                task.category.label(),
                task.priority.label(),
                due_at.as_str(),
                task.status.label(),
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|err| AppError::io(err.error().to_string()))
}

fn csv_error(err: csv::Error) -> AppError {
    AppError::io(err.to_string())
}
