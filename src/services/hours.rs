use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDateTime, Weekday};
use serde::Serialize;

use crate::models::hours::format_12h;
use crate::store::{BusinessHoursStore, Clock};

/// Snapshot of the schedule relative to "now".
#[derive(Debug, Clone, Serialize)]
pub struct BusinessStatus {
    pub is_open: bool,
    pub current_time: String,
    pub current_day: String,
    pub status_message: String,
    pub next_open: Option<NaiveDateTime>,
}

/// Answers "is open now" / "next open time" questions against the weekly
/// schedule. A missing entry counts as closed.
#[derive(Clone)]
pub struct BusinessHoursChecker {
    hours: Arc<dyn BusinessHoursStore>,
    clock: Arc<dyn Clock>,
}

impl BusinessHoursChecker {
    pub fn new(hours: Arc<dyn BusinessHoursStore>, clock: Arc<dyn Clock>) -> Self {
        Self { hours, clock }
    }

    pub fn is_open_at(&self, datetime: &NaiveDateTime) -> anyhow::Result<bool> {
        match self.hours.find_by_day(datetime.weekday())? {
            Some(entry) => Ok(entry.is_open_at(datetime)),
            None => Ok(false),
        }
    }

    pub fn is_open_now(&self) -> anyhow::Result<bool> {
        self.is_open_at(&self.clock.now())
    }

    /// Scans forward up to 7 days for the first opening time strictly after
    /// now. None when no day in the window opens at all.
    pub fn next_open_time(&self) -> anyhow::Result<Option<NaiveDateTime>> {
        let now = self.clock.now();

        for offset in 0..7 {
            let date = now.date() + Duration::days(offset);

            let Some(entry) = self.hours.find_by_day(date.weekday())? else {
                continue;
            };
            if entry.is_closed {
                continue;
            }
            let Some(open) = entry.open_time else {
                continue;
            };

            let candidate = date.and_time(open);
            if offset == 0 && candidate <= now {
                continue;
            }

            return Ok(Some(candidate));
        }

        Ok(None)
    }

    pub fn current_status(&self) -> anyhow::Result<BusinessStatus> {
        let now = self.clock.now();
        let is_open = self.is_open_at(&now)?;

        Ok(BusinessStatus {
            is_open,
            current_time: format_12h(now.time()),
            current_day: now.format("%A").to_string(),
            status_message: if is_open { "Abierto" } else { "Cerrado" }.to_string(),
            next_open: if is_open { None } else { self.next_open_time()? },
        })
    }

    /// "Cerrado", "Horario no definido", or "8:00 AM - 6:00 PM".
    pub fn formatted_hours_for(&self, day: Weekday) -> anyhow::Result<String> {
        Ok(match self.hours.find_by_day(day)? {
            Some(entry) => entry.formatted_hours(),
            None => "Horario no definido".to_string(),
        })
    }

    pub fn formatted_hours_today(&self) -> anyhow::Result<String> {
        self.formatted_hours_for(self.clock.now().weekday())
    }
}
