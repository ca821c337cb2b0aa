use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::PhoneNumber;

/// Daily analytics bucket, keyed by (date, optional rule, optional phone).
/// Counters are read-modify-write; the average response time is maintained
/// incrementally rather than recomputed from history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAnalytics {
    pub id: i64,
    pub date: NaiveDate,
    pub keyword_rule_id: Option<String>,
    pub phone: Option<PhoneNumber>,
    pub incoming_messages: i64,
    pub outgoing_messages: i64,
    pub successful_matches: i64,
    pub failed_matches: i64,
    pub avg_response_time_ms: f64,
    pub peak_hours: HashMap<u32, i64>,
    pub created_at: NaiveDateTime,
}

impl MessageAnalytics {
    pub fn new(
        id: i64,
        date: NaiveDate,
        keyword_rule_id: Option<String>,
        phone: Option<PhoneNumber>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            date,
            keyword_rule_id,
            phone,
            incoming_messages: 0,
            outgoing_messages: 0,
            successful_matches: 0,
            failed_matches: 0,
            avg_response_time_ms: 0.0,
            peak_hours: HashMap::new(),
            created_at: now,
        }
    }

    pub fn increment_incoming(&mut self) {
        self.incoming_messages += 1;
    }

    pub fn increment_outgoing(&mut self) {
        self.outgoing_messages += 1;
    }

    pub fn increment_successful_matches(&mut self) {
        self.successful_matches += 1;
    }

    pub fn increment_failed_matches(&mut self) {
        self.failed_matches += 1;
    }

    /// Running average over outgoing messages. Callers increment the
    /// outgoing counter first, so `outgoing_messages` already includes the
    /// message this sample belongs to.
    pub fn update_response_time(&mut self, response_time_ms: f64) {
        if self.outgoing_messages == 0 {
            self.avg_response_time_ms = response_time_ms;
        } else {
            let n = self.outgoing_messages as f64;
            self.avg_response_time_ms =
                (self.avg_response_time_ms * (n - 1.0) + response_time_ms) / n;
        }
    }

    pub fn add_peak_hour(&mut self, hour: u32) {
        *self.peak_hours.entry(hour).or_insert(0) += 1;
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.successful_matches + self.failed_matches;
        if total == 0 {
            return 0.0;
        }
        self.successful_matches as f64 / total as f64 * 100.0
    }

    pub fn response_rate(&self) -> f64 {
        if self.incoming_messages == 0 {
            return 0.0;
        }
        self.outgoing_messages as f64 / self.incoming_messages as f64 * 100.0
    }

    pub fn most_active_hour(&self) -> Option<u32> {
        self.peak_hours
            .iter()
            .max_by_key(|&(hour, count)| (*count, std::cmp::Reverse(*hour)))
            .map(|(hour, _)| *hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> MessageAnalytics {
        MessageAnalytics::new(
            1,
            NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            None,
            None,
            NaiveDateTime::parse_from_str("2025-06-16 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        )
    }

    #[test]
    fn test_running_average_matches_incremental_formula() {
        let mut stats = bucket();

        stats.increment_outgoing();
        stats.update_response_time(100.0);
        assert_eq!(stats.avg_response_time_ms, 100.0);

        stats.increment_outgoing();
        stats.update_response_time(200.0);
        assert_eq!(stats.avg_response_time_ms, 150.0);

        stats.increment_outgoing();
        stats.update_response_time(300.0);
        assert_eq!(stats.avg_response_time_ms, 200.0);
    }

    #[test]
    fn test_peak_hours_accumulate() {
        let mut stats = bucket();
        stats.add_peak_hour(14);
        stats.add_peak_hour(14);
        stats.add_peak_hour(9);
        assert_eq!(stats.peak_hours.get(&14), Some(&2));
        assert_eq!(stats.peak_hours.get(&9), Some(&1));
        assert_eq!(stats.most_active_hour(), Some(14));
    }

    #[test]
    fn test_rates_handle_zero_denominators() {
        let stats = bucket();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.response_rate(), 0.0);
    }

    #[test]
    fn test_rates() {
        let mut stats = bucket();
        stats.increment_incoming();
        stats.increment_incoming();
        stats.increment_outgoing();
        stats.increment_successful_matches();
        stats.increment_failed_matches();
        assert_eq!(stats.response_rate(), 50.0);
        assert_eq!(stats.success_rate(), 50.0);
    }
}
