use crate::error::AppError;
use std::io::Write;
use std::sync::Arc;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsNotifier;

pub const DUE_MESSAGE: &str = "Task is due!";
pub const POPUP_TIMEOUT_MS: u32 = 5_000;

const DISABLE_ENV_VAR: &str = "DUEBELL_DISABLE_NOTIFICATIONS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// A task was completed.
    Success,
    /// A task came due.
    Alert,
}

/// Popup and sound capability handed to the controller and scheduler.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<(), AppError>;

    fn beep(&self, tone: Tone) -> Result<(), AppError> {
        let _ = tone;
        Ok(())
    }
}

pub fn due_title(description: &str) -> String {
    format!("Due: {description}")
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _title: &str, _message: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Rings the terminal bell: once for success, twice for a due alert.
pub fn ring_bell(tone: Tone) -> Result<(), AppError> {
    let bell: &[u8] = match tone {
        Tone::Success => b"\x07",
        Tone::Alert => b"\x07\x07",
    };
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(bell)?;
    stderr.flush()?;
    Ok(())
}

/// Used where no popup backend exists: the bell still rings.
pub struct SoundOnlyNotifier;

impl Notifier for SoundOnlyNotifier {
    fn notify(&self, _title: &str, _message: &str) -> Result<(), AppError> {
        Ok(())
    }

    fn beep(&self, tone: Tone) -> Result<(), AppError> {
        ring_bell(tone)
    }
}

pub fn notifier_from_env() -> Arc<dyn Notifier> {
    if std::env::var(DISABLE_ENV_VAR).is_ok() {
        return Arc::new(NoopNotifier);
    }

    match platform_notifier() {
        Ok(notifier) => notifier,
        Err(err) => {
            tracing::debug!(error = %err, "popup notifications unavailable, using sound only");
            Arc::new(SoundOnlyNotifier)
        }
    }
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Ok(Arc::new(LinuxNotifier))
}

#[cfg(windows)]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Ok(Arc::new(WindowsNotifier))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Err(AppError::invalid_data(
        "notifications are not supported on this platform",
    ))
}
