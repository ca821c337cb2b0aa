//! Collaborator contracts consumed by the core services. Implemented over
//! SQLite in `db::stores`; tests may substitute their own.

use chrono::{NaiveDate, NaiveDateTime, Utc, Weekday};

use crate::models::{
    BusinessHours, Conversation, ConversationState, IncomingMessage, KeywordRule,
    MessageAnalytics, MessageSid, OutboundMessage, PhoneNumber,
};

/// Injected time source so business-hours and analytics logic stay
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Always reports the instant it was built with.
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub trait RuleStore: Send + Sync {
    fn find_active(&self) -> anyhow::Result<Vec<KeywordRule>>;
    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<KeywordRule>>;
    fn find_all(&self) -> anyhow::Result<Vec<KeywordRule>>;
    fn find_by_keyword(&self, keyword: &str) -> anyhow::Result<Vec<KeywordRule>>;
    fn save(&self, rule: &KeywordRule) -> anyhow::Result<()>;
    fn delete(&self, id: &str) -> anyhow::Result<bool>;
}

pub trait ConversationStore: Send + Sync {
    fn find_by_phone(&self, phone: &PhoneNumber) -> anyhow::Result<Option<Conversation>>;
    fn save(&self, conversation: &Conversation) -> anyhow::Result<()>;
    fn find_active(&self) -> anyhow::Result<Vec<Conversation>>;
    fn find_by_state(&self, state: ConversationState) -> anyhow::Result<Vec<Conversation>>;
    fn delete(&self, phone: &PhoneNumber) -> anyhow::Result<bool>;
    /// Retention sweep: drop idle conversations whose last activity is
    /// before the cutoff. Returns the number deleted.
    fn delete_idle_older_than(&self, cutoff: NaiveDateTime) -> anyhow::Result<usize>;
}

pub trait IncomingMessageStore: Send + Sync {
    fn find_by_provider_sid(&self, sid: &MessageSid) -> anyhow::Result<Option<IncomingMessage>>;
    fn exists_by_provider_sid(&self, sid: &MessageSid) -> anyhow::Result<bool>;
    fn save(&self, message: &IncomingMessage) -> anyhow::Result<()>;
    fn find_by_phone(
        &self,
        phone: &PhoneNumber,
        limit: i64,
    ) -> anyhow::Result<Vec<IncomingMessage>>;
    fn find_unprocessed(&self, limit: i64) -> anyhow::Result<Vec<IncomingMessage>>;
}

pub trait OutboundMessageStore: Send + Sync {
    fn save(&self, message: &OutboundMessage) -> anyhow::Result<()>;
    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<OutboundMessage>>;
}

pub trait BusinessHoursStore: Send + Sync {
    fn find_by_day(&self, day: Weekday) -> anyhow::Result<Option<BusinessHours>>;
    fn find_all(&self) -> anyhow::Result<Vec<BusinessHours>>;
    fn save(&self, hours: &BusinessHours) -> anyhow::Result<()>;
    fn delete(&self, day: Weekday) -> anyhow::Result<bool>;
}

/// Aggregated counters for a date range.
#[derive(Debug, Clone, Default)]
pub struct PeriodTotals {
    pub incoming: i64,
    pub outgoing: i64,
    pub successful: i64,
    pub failed: i64,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Clone)]
pub struct RuleMatchCount {
    pub rule_id: String,
    pub total_matches: i64,
}

pub trait AnalyticsStore: Send + Sync {
    fn get_or_create_daily(
        &self,
        date: NaiveDate,
        rule_id: Option<&str>,
        phone: Option<&PhoneNumber>,
    ) -> anyhow::Result<MessageAnalytics>;
    fn save(&self, stats: &MessageAnalytics) -> anyhow::Result<()>;
    fn find_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<MessageAnalytics>>;
    fn totals_in_period(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<PeriodTotals>;
    fn popular_rules(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
    ) -> anyhow::Result<Vec<RuleMatchCount>>;
    fn delete_older_than(&self, cutoff: NaiveDate) -> anyhow::Result<usize>;
}
