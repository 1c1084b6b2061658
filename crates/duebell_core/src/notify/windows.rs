use crate::error::AppError;
use crate::notify::{Notifier, Tone, ring_bell};
use tauri_winrt_notification::{Duration, Toast};

pub struct WindowsNotifier;

impl Notifier for WindowsNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), AppError> {
        Toast::new(Toast::POWERSHELL_APP_ID)
            .title(title)
            .text1(message)
            .duration(Duration::Short)
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }

    fn beep(&self, tone: Tone) -> Result<(), AppError> {
        ring_bell(tone)
    }
}
