use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::models::PhoneNumber;
use crate::store::{AnalyticsStore, Clock, RuleStore};

/// Records message traffic into daily buckets and aggregates them for the
/// dashboard. Increments are read-modify-write against the store; the
/// SQLite impl serializes them behind the connection lock.
#[derive(Clone)]
pub struct AnalyticsTracker {
    analytics: Arc<dyn AnalyticsStore>,
    rules: Arc<dyn RuleStore>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub period: Period,
    pub totals: Totals,
    pub rates: Rates,
    pub popular_keywords: Vec<PopularKeyword>,
    pub today: DayStats,
    pub peak_hours: Vec<PeakHour>,
}

#[derive(Debug, Serialize)]
pub struct Period {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub struct Totals {
    pub incoming_messages: i64,
    pub outgoing_messages: i64,
    pub successful_matches: i64,
    pub failed_matches: i64,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct Rates {
    pub response_rate: f64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct PopularKeyword {
    pub keyword_rule_id: String,
    pub keywords: Vec<String>,
    pub total_matches: i64,
    pub priority: i32,
}

#[derive(Debug, Serialize)]
pub struct DayStats {
    pub date: String,
    pub incoming: i64,
    pub outgoing: i64,
    pub successful: i64,
    pub failed: i64,
    pub response_rate: f64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct PeakHour {
    pub hour: u32,
    pub count: i64,
}

impl AnalyticsTracker {
    pub fn new(
        analytics: Arc<dyn AnalyticsStore>,
        rules: Arc<dyn RuleStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            analytics,
            rules,
            clock,
        }
    }

    pub fn track_incoming(&self, phone: &PhoneNumber, at: NaiveDateTime) -> anyhow::Result<()> {
        let mut stats = self
            .analytics
            .get_or_create_daily(at.date(), None, Some(phone))?;
        stats.increment_incoming();
        stats.add_peak_hour(at.hour());
        self.analytics.save(&stats)
    }

    pub fn track_outgoing(
        &self,
        phone: &PhoneNumber,
        rule_id: Option<&str>,
        response_time_ms: f64,
        at: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let mut stats = self
            .analytics
            .get_or_create_daily(at.date(), rule_id, Some(phone))?;
        stats.increment_outgoing();
        stats.update_response_time(response_time_ms);
        self.analytics.save(&stats)
    }

    pub fn track_successful_match(
        &self,
        phone: &PhoneNumber,
        rule_id: &str,
        at: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let mut stats = self
            .analytics
            .get_or_create_daily(at.date(), Some(rule_id), Some(phone))?;
        stats.increment_successful_matches();
        self.analytics.save(&stats)
    }

    pub fn track_failed_match(&self, phone: &PhoneNumber, at: NaiveDateTime) -> anyhow::Result<()> {
        let mut stats = self
            .analytics
            .get_or_create_daily(at.date(), None, Some(phone))?;
        stats.increment_failed_matches();
        self.analytics.save(&stats)
    }

    /// Dashboard over the given period (default: the last 7 days).
    pub fn dashboard(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> anyhow::Result<Dashboard> {
        let today = self.clock.now().date();
        let end = end.unwrap_or(today);
        let start = start.unwrap_or(end - Duration::days(7));

        let totals = self.analytics.totals_in_period(start, end)?;

        Ok(Dashboard {
            period: Period {
                start_date: start.format("%Y-%m-%d").to_string(),
                end_date: end.format("%Y-%m-%d").to_string(),
            },
            rates: Rates {
                response_rate: response_rate(totals.incoming, totals.outgoing),
                success_rate: success_rate(totals.successful, totals.failed),
            },
            totals: Totals {
                incoming_messages: totals.incoming,
                outgoing_messages: totals.outgoing,
                successful_matches: totals.successful,
                failed_matches: totals.failed,
                avg_response_time_ms: round2(totals.avg_response_time_ms),
            },
            popular_keywords: self.popular_keywords(5)?,
            today: self.day_statistics(today)?,
            peak_hours: self.peak_hours(today)?,
        })
    }

    /// Most-matched rules over the last 30 days, resolved against the rule
    /// store so deleted rules drop out.
    pub fn popular_keywords(&self, limit: i64) -> anyhow::Result<Vec<PopularKeyword>> {
        let end = self.clock.now().date();
        let start = end - Duration::days(30);

        let mut result = Vec::new();
        for entry in self.analytics.popular_rules(start, end, limit)? {
            let Some(rule) = self.rules.find_by_id(&entry.rule_id)? else {
                continue;
            };
            result.push(PopularKeyword {
                keyword_rule_id: entry.rule_id,
                keywords: rule.keywords,
                total_matches: entry.total_matches,
                priority: rule.priority,
            });
        }
        Ok(result)
    }

    pub fn day_statistics(&self, date: NaiveDate) -> anyhow::Result<DayStats> {
        let buckets = self.analytics.find_by_date(date)?;

        let mut incoming = 0;
        let mut outgoing = 0;
        let mut successful = 0;
        let mut failed = 0;
        for bucket in &buckets {
            incoming += bucket.incoming_messages;
            outgoing += bucket.outgoing_messages;
            successful += bucket.successful_matches;
            failed += bucket.failed_matches;
        }

        Ok(DayStats {
            date: date.format("%Y-%m-%d").to_string(),
            incoming,
            outgoing,
            successful,
            failed,
            response_rate: response_rate(incoming, outgoing),
            success_rate: success_rate(successful, failed),
        })
    }

    /// Top five busiest hours of the day, busiest first.
    pub fn peak_hours(&self, date: NaiveDate) -> anyhow::Result<Vec<PeakHour>> {
        let mut by_hour: HashMap<u32, i64> = HashMap::new();
        for bucket in self.analytics.find_by_date(date)? {
            for (hour, count) in bucket.peak_hours {
                *by_hour.entry(hour).or_insert(0) += count;
            }
        }

        let mut hours: Vec<PeakHour> = by_hour
            .into_iter()
            .map(|(hour, count)| PeakHour { hour, count })
            .collect();
        hours.sort_by(|a, b| b.count.cmp(&a.count).then(a.hour.cmp(&b.hour)));
        hours.truncate(5);
        Ok(hours)
    }
}

fn response_rate(incoming: i64, outgoing: i64) -> f64 {
    if incoming == 0 {
        return 0.0;
    }
    round2(outgoing as f64 / incoming as f64 * 100.0)
}

fn success_rate(successful: i64, failed: i64) -> f64 {
    let total = successful + failed;
    if total == 0 {
        return 0.0;
    }
    round2(successful as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::stores::{SqliteAnalyticsStore, SqliteRuleStore};
    use crate::models::{KeywordRule, TriggerType};
    use crate::store::FixedClock;
    use std::sync::Mutex;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn tracker() -> (AnalyticsTracker, Arc<dyn RuleStore>) {
        let conn = db::init_db(":memory:").unwrap();
        let db = Arc::new(Mutex::new(conn));
        let rules: Arc<dyn RuleStore> = Arc::new(SqliteRuleStore::new(db.clone()));
        let tracker = AnalyticsTracker::new(
            Arc::new(SqliteAnalyticsStore::new(db)),
            rules.clone(),
            Arc::new(FixedClock(dt("2025-06-16 14:30:00"))),
        );
        (tracker, rules)
    }

    fn phone() -> PhoneNumber {
        PhoneNumber::parse("+573001234567").unwrap()
    }

    #[test]
    fn test_incoming_messages_count_and_peak_hours() {
        let (tracker, _) = tracker();
        tracker.track_incoming(&phone(), dt("2025-06-16 14:10:00")).unwrap();
        tracker.track_incoming(&phone(), dt("2025-06-16 14:50:00")).unwrap();
        tracker.track_incoming(&phone(), dt("2025-06-16 09:00:00")).unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let stats = tracker.day_statistics(today).unwrap();
        assert_eq!(stats.incoming, 3);

        let peak = tracker.peak_hours(today).unwrap();
        assert_eq!(peak[0].hour, 14);
        assert_eq!(peak[0].count, 2);
    }

    #[test]
    fn test_dashboard_rates() {
        let (tracker, rules) = tracker();
        let rule = KeywordRule::new(
            "rule-1".to_string(),
            vec!["hola".to_string()],
            "Hola!".to_string(),
            10,
            false,
            TriggerType::Contains,
            None,
            dt("2025-06-01 00:00:00"),
        )
        .unwrap();
        rules.save(&rule).unwrap();

        tracker.track_incoming(&phone(), dt("2025-06-16 14:10:00")).unwrap();
        tracker.track_incoming(&phone(), dt("2025-06-16 14:20:00")).unwrap();
        tracker
            .track_successful_match(&phone(), "rule-1", dt("2025-06-16 14:10:00"))
            .unwrap();
        tracker
            .track_failed_match(&phone(), dt("2025-06-16 14:20:00"))
            .unwrap();
        tracker
            .track_outgoing(&phone(), Some("rule-1"), 120.0, dt("2025-06-16 14:10:01"))
            .unwrap();

        let dashboard = tracker.dashboard(None, None).unwrap();
        assert_eq!(dashboard.totals.incoming_messages, 2);
        assert_eq!(dashboard.totals.outgoing_messages, 1);
        assert_eq!(dashboard.rates.response_rate, 50.0);
        assert_eq!(dashboard.rates.success_rate, 50.0);
        assert_eq!(dashboard.popular_keywords.len(), 1);
        assert_eq!(dashboard.popular_keywords[0].keyword_rule_id, "rule-1");
        assert_eq!(dashboard.today.incoming, 2);
    }

    #[test]
    fn test_popular_keywords_skip_deleted_rules() {
        let (tracker, _) = tracker();
        tracker
            .track_successful_match(&phone(), "ghost-rule", dt("2025-06-16 14:10:00"))
            .unwrap();
        assert!(tracker.popular_keywords(5).unwrap().is_empty());
    }

    #[test]
    fn test_empty_dashboard_is_all_zeroes() {
        let (tracker, _) = tracker();
        let dashboard = tracker.dashboard(None, None).unwrap();
        assert_eq!(dashboard.totals.incoming_messages, 0);
        assert_eq!(dashboard.rates.response_rate, 0.0);
        assert!(dashboard.popular_keywords.is_empty());
        assert!(dashboard.peak_hours.is_empty());
    }
}
