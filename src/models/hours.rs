use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Weekly schedule entry: either closed for the day, or an open/close time
/// pair within the same day. The timezone is informational (display only);
/// time comparisons work on the time-of-day component of the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub id: String,
    pub day_of_week: Weekday,
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
    pub is_closed: bool,
    pub timezone: String,
    pub created_at: NaiveDateTime,
}

impl BusinessHours {
    pub fn new(
        id: String,
        day_of_week: Weekday,
        open_time: Option<NaiveTime>,
        close_time: Option<NaiveTime>,
        is_closed: bool,
        timezone: String,
        now: NaiveDateTime,
    ) -> Result<Self, DomainError> {
        if !is_closed {
            let (open, close) = match (open_time, close_time) {
                (Some(open), Some(close)) => (open, close),
                _ => return Err(DomainError::MissingHours),
            };
            if open >= close {
                return Err(DomainError::OpenNotBeforeClose);
            }
        }

        Ok(Self {
            id,
            day_of_week,
            open_time,
            close_time,
            is_closed,
            timezone,
            created_at: now,
        })
    }

    pub fn closed(
        id: String,
        day_of_week: Weekday,
        timezone: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            day_of_week,
            open_time: None,
            close_time: None,
            is_closed: true,
            timezone,
            created_at: now,
        }
    }

    /// Time-of-day check, inclusive on both ends. The date part of the
    /// input is ignored; looking up the right day's entry is the caller's
    /// job.
    pub fn is_open_at(&self, datetime: &NaiveDateTime) -> bool {
        if self.is_closed {
            return false;
        }

        let (open, close) = match (self.open_time, self.close_time) {
            (Some(open), Some(close)) => (open, close),
            _ => return false,
        };

        let time = datetime.time();
        time >= open && time <= close
    }

    pub fn formatted_hours(&self) -> String {
        if self.is_closed {
            return "Cerrado".to_string();
        }

        match (self.open_time, self.close_time) {
            (Some(open), Some(close)) => {
                format!("{} - {}", format_12h(open), format_12h(close))
            }
            _ => "Horario no definido".to_string(),
        }
    }
}

/// `3:30 PM` (unpadded 12-hour clock).
pub fn format_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Lowercase English day name, the form the schedule is stored under.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn parse_day(s: &str) -> Result<Weekday, DomainError> {
    match s.to_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        _ => Err(DomainError::InvalidDayOfWeek(s.to_string())),
    }
}
