//! SQLite-backed implementations of the store traits. Each store shares
//! the single app connection; the mutex serializes access, which also
//! makes the read-modify-write analytics increments atomic in-process.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{
    BusinessHours, Conversation, ConversationState, IncomingMessage, KeywordRule,
    MessageAnalytics, MessageSid, OutboundMessage, PhoneNumber,
};
use crate::store::{
    AnalyticsStore, BusinessHoursStore, ConversationStore, IncomingMessageStore,
    OutboundMessageStore, PeriodTotals, RuleMatchCount, RuleStore,
};

pub type Db = Arc<Mutex<Connection>>;

pub struct SqliteRuleStore {
    db: Db,
}

impl SqliteRuleStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl RuleStore for SqliteRuleStore {
    fn find_active(&self) -> anyhow::Result<Vec<KeywordRule>> {
        let conn = self.db.lock().unwrap();
        queries::get_active_rules(&conn)
    }

    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<KeywordRule>> {
        let conn = self.db.lock().unwrap();
        queries::get_rule(&conn, id)
    }

    fn find_all(&self) -> anyhow::Result<Vec<KeywordRule>> {
        let conn = self.db.lock().unwrap();
        queries::get_all_rules(&conn)
    }

    fn find_by_keyword(&self, keyword: &str) -> anyhow::Result<Vec<KeywordRule>> {
        let conn = self.db.lock().unwrap();
        queries::get_rules_by_keyword(&conn, keyword)
    }

    fn save(&self, rule: &KeywordRule) -> anyhow::Result<()> {
        let conn = self.db.lock().unwrap();
        queries::save_rule(&conn, rule)
    }

    fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.db.lock().unwrap();
        queries::delete_rule(&conn, id)
    }
}

pub struct SqliteConversationStore {
    db: Db,
}

impl SqliteConversationStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl ConversationStore for SqliteConversationStore {
    fn find_by_phone(&self, phone: &PhoneNumber) -> anyhow::Result<Option<Conversation>> {
        let conn = self.db.lock().unwrap();
        queries::get_conversation(&conn, phone)
    }

    fn save(&self, conversation: &Conversation) -> anyhow::Result<()> {
        let conn = self.db.lock().unwrap();
        queries::save_conversation(&conn, conversation)
    }

    fn find_active(&self) -> anyhow::Result<Vec<Conversation>> {
        let conn = self.db.lock().unwrap();
        queries::get_active_conversations(&conn)
    }

    fn find_by_state(&self, state: ConversationState) -> anyhow::Result<Vec<Conversation>> {
        let conn = self.db.lock().unwrap();
        queries::get_conversations_by_state(&conn, state)
    }

    fn delete(&self, phone: &PhoneNumber) -> anyhow::Result<bool> {
        let conn = self.db.lock().unwrap();
        queries::delete_conversation(&conn, phone)
    }

    fn delete_idle_older_than(&self, cutoff: NaiveDateTime) -> anyhow::Result<usize> {
        let conn = self.db.lock().unwrap();
        queries::delete_idle_conversations_older_than(&conn, &cutoff)
    }
}

pub struct SqliteIncomingMessageStore {
    db: Db,
}

impl SqliteIncomingMessageStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl IncomingMessageStore for SqliteIncomingMessageStore {
    fn find_by_provider_sid(&self, sid: &MessageSid) -> anyhow::Result<Option<IncomingMessage>> {
        let conn = self.db.lock().unwrap();
        queries::get_incoming_by_sid(&conn, sid)
    }

    fn exists_by_provider_sid(&self, sid: &MessageSid) -> anyhow::Result<bool> {
        let conn = self.db.lock().unwrap();
        queries::incoming_exists_by_sid(&conn, sid)
    }

    fn save(&self, message: &IncomingMessage) -> anyhow::Result<()> {
        let conn = self.db.lock().unwrap();
        queries::save_incoming_message(&conn, message)
    }

    fn find_by_phone(
        &self,
        phone: &PhoneNumber,
        limit: i64,
    ) -> anyhow::Result<Vec<IncomingMessage>> {
        let conn = self.db.lock().unwrap();
        queries::get_incoming_by_phone(&conn, phone, limit)
    }

    fn find_unprocessed(&self, limit: i64) -> anyhow::Result<Vec<IncomingMessage>> {
        let conn = self.db.lock().unwrap();
        queries::get_unprocessed_incoming(&conn, limit)
    }
}

pub struct SqliteOutboundMessageStore {
    db: Db,
}

impl SqliteOutboundMessageStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl OutboundMessageStore for SqliteOutboundMessageStore {
    fn save(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        let conn = self.db.lock().unwrap();
        queries::save_outbound_message(&conn, message)
    }

    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<OutboundMessage>> {
        let conn = self.db.lock().unwrap();
        queries::get_outbound_message(&conn, id)
    }
}

pub struct SqliteBusinessHoursStore {
    db: Db,
}

impl SqliteBusinessHoursStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl BusinessHoursStore for SqliteBusinessHoursStore {
    fn find_by_day(&self, day: Weekday) -> anyhow::Result<Option<BusinessHours>> {
        let conn = self.db.lock().unwrap();
        queries::get_business_hours_for_day(&conn, day)
    }

    fn find_all(&self) -> anyhow::Result<Vec<BusinessHours>> {
        let conn = self.db.lock().unwrap();
        queries::get_all_business_hours(&conn)
    }

    fn save(&self, hours: &BusinessHours) -> anyhow::Result<()> {
        let conn = self.db.lock().unwrap();
        queries::save_business_hours(&conn, hours)
    }

    fn delete(&self, day: Weekday) -> anyhow::Result<bool> {
        let conn = self.db.lock().unwrap();
        queries::delete_business_hours(&conn, day)
    }
}

pub struct SqliteAnalyticsStore {
    db: Db,
}

impl SqliteAnalyticsStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl AnalyticsStore for SqliteAnalyticsStore {
    fn get_or_create_daily(
        &self,
        date: NaiveDate,
        rule_id: Option<&str>,
        phone: Option<&PhoneNumber>,
    ) -> anyhow::Result<MessageAnalytics> {
        let conn = self.db.lock().unwrap();
        queries::get_or_create_daily_stats(&conn, date, rule_id, phone)
    }

    fn save(&self, stats: &MessageAnalytics) -> anyhow::Result<()> {
        let conn = self.db.lock().unwrap();
        queries::save_daily_stats(&conn, stats)
    }

    fn find_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<MessageAnalytics>> {
        let conn = self.db.lock().unwrap();
        queries::get_stats_by_date(&conn, date)
    }

    fn totals_in_period(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<PeriodTotals> {
        let conn = self.db.lock().unwrap();
        queries::get_totals_in_period(&conn, start, end)
    }

    fn popular_rules(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
    ) -> anyhow::Result<Vec<RuleMatchCount>> {
        let conn = self.db.lock().unwrap();
        queries::get_popular_rules(&conn, start, end, limit)
    }

    fn delete_older_than(&self, cutoff: NaiveDate) -> anyhow::Result<usize> {
        let conn = self.db.lock().unwrap();
        queries::delete_stats_older_than(&conn, cutoff)
    }
}
