use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub streak: u32,
    /// Stored as `YYYY-MM-DD`, or an empty string before the first completion.
    #[serde(default, with = "blank_date")]
    pub last_active_date: Option<Date>,
    #[serde(default)]
    pub total_completed: u32,
}

impl UserStats {
    pub fn record_completion(&mut self, today: Date) {
        self.total_completed = self.total_completed.saturating_add(1);
        self.streak_update(today);
    }

    /// Bump the streak for the first completion of `today`; later completions
    /// on the same day leave it alone. Returns whether the streak moved.
    pub fn streak_update(&mut self, today: Date) -> bool {
        if self.last_active_date == Some(today) {
            return false;
        }
        self.streak = self.streak.saturating_add(1);
        self.last_active_date = Some(today);
        true
    }
}

mod blank_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;
    use time::macros::format_description;

    const FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]");

    pub fn serialize<S: Serializer>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => {
                let text = date.format(FORMAT).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Date::parse(raw.trim(), FORMAT).ok())
    }
}
