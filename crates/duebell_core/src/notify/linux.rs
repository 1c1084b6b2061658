use crate::error::AppError;
use crate::notify::{Notifier, POPUP_TIMEOUT_MS, Tone, ring_bell};
use notify_rust::{Notification, Timeout};

pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), AppError> {
        Notification::new()
            .appname("duebell")
            .summary(title)
            .body(message)
            .timeout(Timeout::Milliseconds(POPUP_TIMEOUT_MS))
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }

    fn beep(&self, tone: Tone) -> Result<(), AppError> {
        ring_bell(tone)
    }
}
