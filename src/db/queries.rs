use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rusqlite::{params, Connection};

use crate::models::hours::{day_name, parse_day};
use crate::models::{
    BusinessHours, Conversation, ConversationState, DeliveryStatus, IncomingMessage, KeywordRule,
    MessageAnalytics, MessageSid, OutboundMessage, PhoneNumber, TriggerType,
};
use crate::store::{PeriodTotals, RuleMatchCount};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S";

fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .with_context(|| format!("invalid datetime in database: {s}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .with_context(|| format!("invalid date in database: {s}"))
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .with_context(|| format!("invalid time in database: {s}"))
}

// ── Keyword Rules ──

pub fn save_rule(conn: &Connection, rule: &KeywordRule) -> anyhow::Result<()> {
    let keywords = serde_json::to_string(&rule.keywords)?;
    let variables = rule
        .variables
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO keyword_rules (id, keywords, response_template, is_active, priority, fuzzy_match, trigger_type, variables, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
           keywords = excluded.keywords,
           response_template = excluded.response_template,
           is_active = excluded.is_active,
           priority = excluded.priority,
           fuzzy_match = excluded.fuzzy_match,
           trigger_type = excluded.trigger_type,
           variables = excluded.variables",
        params![
            rule.id,
            keywords,
            rule.response_template,
            rule.is_active as i32,
            rule.priority,
            rule.fuzzy_match as i32,
            rule.trigger_type.as_str(),
            variables,
            fmt_datetime(&rule.created_at),
        ],
    )?;
    Ok(())
}

const RULE_COLUMNS: &str =
    "id, keywords, response_template, is_active, priority, fuzzy_match, trigger_type, variables, created_at";

fn parse_rule_row(row: &rusqlite::Row) -> anyhow::Result<KeywordRule> {
    let id: String = row.get(0)?;
    let keywords_json: String = row.get(1)?;
    let response_template: String = row.get(2)?;
    let is_active: bool = row.get::<_, i32>(3)? != 0;
    let priority: i32 = row.get(4)?;
    let fuzzy_match: bool = row.get::<_, i32>(5)? != 0;
    let trigger_type: String = row.get(6)?;
    let variables_json: Option<String> = row.get(7)?;
    let created_at_str: String = row.get(8)?;

    let keywords: Vec<String> = serde_json::from_str(&keywords_json)
        .with_context(|| format!("invalid keywords JSON for rule {id}"))?;
    let variables = variables_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .with_context(|| format!("invalid variables JSON for rule {id}"))?;

    Ok(KeywordRule {
        id,
        keywords,
        response_template,
        is_active,
        priority,
        fuzzy_match,
        trigger_type: TriggerType::parse(&trigger_type),
        variables,
        created_at: parse_datetime(&created_at_str)?,
    })
}

pub fn get_rule(conn: &Connection, id: &str) -> anyhow::Result<Option<KeywordRule>> {
    let result = conn.query_row(
        &format!("SELECT {RULE_COLUMNS} FROM keyword_rules WHERE id = ?1"),
        params![id],
        |row| Ok(parse_rule_row(row)),
    );

    match result {
        Ok(rule) => Ok(Some(rule?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_active_rules(conn: &Connection) -> anyhow::Result<Vec<KeywordRule>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM keyword_rules WHERE is_active = 1 ORDER BY priority DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_rule_row(row)))?;

    let mut rules = vec![];
    for row in rows {
        rules.push(row??);
    }
    Ok(rules)
}

pub fn get_all_rules(conn: &Connection) -> anyhow::Result<Vec<KeywordRule>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM keyword_rules ORDER BY priority DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_rule_row(row)))?;

    let mut rules = vec![];
    for row in rows {
        rules.push(row??);
    }
    Ok(rules)
}

/// Matches against the JSON-encoded keyword array, so the pattern targets
/// the quoted form of the keyword.
pub fn get_rules_by_keyword(conn: &Connection, keyword: &str) -> anyhow::Result<Vec<KeywordRule>> {
    let pattern = format!("%{}%", serde_json::to_string(keyword)?);
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM keyword_rules WHERE keywords LIKE ?1 ORDER BY priority DESC"
    ))?;
    let rows = stmt.query_map(params![pattern], |row| Ok(parse_rule_row(row)))?;

    let mut rules = vec![];
    for row in rows {
        rules.push(row??);
    }
    Ok(rules)
}

pub fn delete_rule(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM keyword_rules WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Conversations ──

pub fn save_conversation(conn: &Connection, conversation: &Conversation) -> anyhow::Result<()> {
    let context = serde_json::to_string(&conversation.context)?;

    conn.execute(
        "INSERT INTO conversations (id, phone, state, context, last_activity, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(phone) DO UPDATE SET
           state = excluded.state,
           context = excluded.context,
           last_activity = excluded.last_activity",
        params![
            conversation.id,
            conversation.phone.as_str(),
            conversation.state.as_str(),
            context,
            fmt_datetime(&conversation.last_activity),
            fmt_datetime(&conversation.created_at),
        ],
    )?;
    Ok(())
}

const CONVERSATION_COLUMNS: &str = "id, phone, state, context, last_activity, created_at";

fn parse_conversation_row(row: &rusqlite::Row) -> anyhow::Result<Conversation> {
    let id: String = row.get(0)?;
    let phone: String = row.get(1)?;
    let state: String = row.get(2)?;
    let context_json: String = row.get(3)?;
    let last_activity_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    Ok(Conversation {
        id,
        phone: PhoneNumber::parse(&phone)?,
        state: ConversationState::parse(&state)?,
        context: serde_json::from_str(&context_json)
            .with_context(|| format!("invalid context JSON for phone {phone}"))?,
        last_activity: parse_datetime(&last_activity_str)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

pub fn get_conversation(
    conn: &Connection,
    phone: &PhoneNumber,
) -> anyhow::Result<Option<Conversation>> {
    let result = conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE phone = ?1"),
        params![phone.as_str()],
        |row| Ok(parse_conversation_row(row)),
    );

    match result {
        Ok(conversation) => Ok(Some(conversation?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_active_conversations(conn: &Connection) -> anyhow::Result<Vec<Conversation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE state != 'idle' ORDER BY last_activity DESC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_conversation_row(row)))?;

    let mut conversations = vec![];
    for row in rows {
        conversations.push(row??);
    }
    Ok(conversations)
}

pub fn get_conversations_by_state(
    conn: &Connection,
    state: ConversationState,
) -> anyhow::Result<Vec<Conversation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE state = ?1 ORDER BY last_activity DESC"
    ))?;
    let rows = stmt.query_map(params![state.as_str()], |row| {
        Ok(parse_conversation_row(row))
    })?;

    let mut conversations = vec![];
    for row in rows {
        conversations.push(row??);
    }
    Ok(conversations)
}

pub fn delete_conversation(conn: &Connection, phone: &PhoneNumber) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM conversations WHERE phone = ?1",
        params![phone.as_str()],
    )?;
    Ok(count > 0)
}

pub fn delete_idle_conversations_older_than(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM conversations WHERE state = 'idle' AND last_activity < ?1",
        params![fmt_datetime(cutoff)],
    )?;
    Ok(count)
}

// ── Incoming Messages ──

pub fn save_incoming_message(
    conn: &Connection,
    message: &IncomingMessage,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO incoming_messages (id, from_phone, content, provider_sid, processed, response_message_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           processed = excluded.processed,
           response_message_id = excluded.response_message_id",
        params![
            message.id,
            message.from_phone.as_str(),
            message.content,
            message.provider_sid.as_str(),
            message.processed as i32,
            message.response_message_id,
            fmt_datetime(&message.created_at),
        ],
    )?;
    Ok(())
}

const INCOMING_COLUMNS: &str =
    "id, from_phone, content, provider_sid, processed, response_message_id, created_at";

fn parse_incoming_row(row: &rusqlite::Row) -> anyhow::Result<IncomingMessage> {
    let id: String = row.get(0)?;
    let from_phone: String = row.get(1)?;
    let content: String = row.get(2)?;
    let provider_sid: String = row.get(3)?;
    let processed: bool = row.get::<_, i32>(4)? != 0;
    let response_message_id: Option<String> = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    Ok(IncomingMessage {
        id,
        from_phone: PhoneNumber::parse(&from_phone)?,
        content,
        provider_sid: MessageSid::parse(&provider_sid)?,
        processed,
        response_message_id,
        created_at: parse_datetime(&created_at_str)?,
    })
}

pub fn get_incoming_by_sid(
    conn: &Connection,
    sid: &MessageSid,
) -> anyhow::Result<Option<IncomingMessage>> {
    let result = conn.query_row(
        &format!("SELECT {INCOMING_COLUMNS} FROM incoming_messages WHERE provider_sid = ?1"),
        params![sid.as_str()],
        |row| Ok(parse_incoming_row(row)),
    );

    match result {
        Ok(message) => Ok(Some(message?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn incoming_exists_by_sid(conn: &Connection, sid: &MessageSid) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM incoming_messages WHERE provider_sid = ?1",
        params![sid.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_incoming_by_phone(
    conn: &Connection,
    phone: &PhoneNumber,
    limit: i64,
) -> anyhow::Result<Vec<IncomingMessage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INCOMING_COLUMNS} FROM incoming_messages WHERE from_phone = ?1 ORDER BY created_at DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![phone.as_str(), limit], |row| {
        Ok(parse_incoming_row(row))
    })?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row??);
    }
    Ok(messages)
}

pub fn get_unprocessed_incoming(
    conn: &Connection,
    limit: i64,
) -> anyhow::Result<Vec<IncomingMessage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INCOMING_COLUMNS} FROM incoming_messages WHERE processed = 0 ORDER BY created_at ASC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], |row| Ok(parse_incoming_row(row)))?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row??);
    }
    Ok(messages)
}

// ── Outbound Messages ──

pub fn save_outbound_message(
    conn: &Connection,
    message: &OutboundMessage,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO outbound_messages (id, to_phone, content, status, provider_sid, created_at, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           status = excluded.status,
           provider_sid = excluded.provider_sid,
           sent_at = excluded.sent_at",
        params![
            message.id,
            message.to_phone.as_str(),
            message.content,
            message.status.as_str(),
            message.provider_sid,
            fmt_datetime(&message.created_at),
            message.sent_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

pub fn get_outbound_message(
    conn: &Connection,
    id: &str,
) -> anyhow::Result<Option<OutboundMessage>> {
    let result = conn.query_row(
        "SELECT id, to_phone, content, status, provider_sid, created_at, sent_at
         FROM outbound_messages WHERE id = ?1",
        params![id],
        |row| {
            let id: String = row.get(0)?;
            let to_phone: String = row.get(1)?;
            let content: String = row.get(2)?;
            let status: String = row.get(3)?;
            let provider_sid: Option<String> = row.get(4)?;
            let created_at: String = row.get(5)?;
            let sent_at: Option<String> = row.get(6)?;
            Ok((id, to_phone, content, status, provider_sid, created_at, sent_at))
        },
    );

    match result {
        Ok((id, to_phone, content, status, provider_sid, created_at, sent_at)) => {
            Ok(Some(OutboundMessage {
                id,
                to_phone: PhoneNumber::parse(&to_phone)?,
                content,
                status: DeliveryStatus::parse(&status),
                provider_sid,
                created_at: parse_datetime(&created_at)?,
                sent_at: sent_at.as_deref().map(parse_datetime).transpose()?,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Business Hours ──

pub fn save_business_hours(conn: &Connection, hours: &BusinessHours) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO business_hours (id, day_of_week, open_time, close_time, is_closed, timezone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(day_of_week) DO UPDATE SET
           open_time = excluded.open_time,
           close_time = excluded.close_time,
           is_closed = excluded.is_closed,
           timezone = excluded.timezone",
        params![
            hours.id,
            day_name(hours.day_of_week),
            hours.open_time.map(|t| t.format(TIME_FMT).to_string()),
            hours.close_time.map(|t| t.format(TIME_FMT).to_string()),
            hours.is_closed as i32,
            hours.timezone,
            fmt_datetime(&hours.created_at),
        ],
    )?;
    Ok(())
}

fn parse_business_hours_row(row: &rusqlite::Row) -> anyhow::Result<BusinessHours> {
    let id: String = row.get(0)?;
    let day: String = row.get(1)?;
    let open_time: Option<String> = row.get(2)?;
    let close_time: Option<String> = row.get(3)?;
    let is_closed: bool = row.get::<_, i32>(4)? != 0;
    let timezone: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(BusinessHours {
        id,
        day_of_week: parse_day(&day)?,
        open_time: open_time.as_deref().map(parse_time).transpose()?,
        close_time: close_time.as_deref().map(parse_time).transpose()?,
        is_closed,
        timezone,
        created_at: parse_datetime(&created_at)?,
    })
}

pub fn get_business_hours_for_day(
    conn: &Connection,
    day: Weekday,
) -> anyhow::Result<Option<BusinessHours>> {
    let result = conn.query_row(
        "SELECT id, day_of_week, open_time, close_time, is_closed, timezone, created_at
         FROM business_hours WHERE day_of_week = ?1",
        params![day_name(day)],
        |row| Ok(parse_business_hours_row(row)),
    );

    match result {
        Ok(hours) => Ok(Some(hours?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_all_business_hours(conn: &Connection) -> anyhow::Result<Vec<BusinessHours>> {
    let mut stmt = conn.prepare(
        "SELECT id, day_of_week, open_time, close_time, is_closed, timezone, created_at
         FROM business_hours
         ORDER BY CASE day_of_week
             WHEN 'monday' THEN 0 WHEN 'tuesday' THEN 1 WHEN 'wednesday' THEN 2
             WHEN 'thursday' THEN 3 WHEN 'friday' THEN 4 WHEN 'saturday' THEN 5
             ELSE 6 END",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_business_hours_row(row)))?;

    let mut all = vec![];
    for row in rows {
        all.push(row??);
    }
    Ok(all)
}

pub fn delete_business_hours(conn: &Connection, day: Weekday) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM business_hours WHERE day_of_week = ?1",
        params![day_name(day)],
    )?;
    Ok(count > 0)
}

// ── Message Analytics ──

/// Optional bucket keys are stored as empty strings so the UNIQUE
/// constraint treats "no rule" / "no phone" as one bucket instead of
/// distinct NULLs.
pub fn get_or_create_daily_stats(
    conn: &Connection,
    date: NaiveDate,
    rule_id: Option<&str>,
    phone: Option<&PhoneNumber>,
) -> anyhow::Result<MessageAnalytics> {
    let date_str = date.format(DATE_FMT).to_string();
    let rule_key = rule_id.unwrap_or("");
    let phone_key = phone.map(|p| p.as_str()).unwrap_or("");

    conn.execute(
        "INSERT INTO message_analytics (date, keyword_rule_id, phone, created_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(date, keyword_rule_id, phone) DO NOTHING",
        params![date_str, rule_key, phone_key],
    )?;

    let stats = conn.query_row(
        "SELECT id, date, keyword_rule_id, phone, incoming_messages, outgoing_messages,
                successful_matches, failed_matches, avg_response_time_ms, peak_hours, created_at
         FROM message_analytics WHERE date = ?1 AND keyword_rule_id = ?2 AND phone = ?3",
        params![date_str, rule_key, phone_key],
        |row| Ok(parse_analytics_row(row)),
    )?;
    stats
}

fn parse_analytics_row(row: &rusqlite::Row) -> anyhow::Result<MessageAnalytics> {
    let id: i64 = row.get(0)?;
    let date: String = row.get(1)?;
    let rule_key: String = row.get(2)?;
    let phone_key: String = row.get(3)?;
    let incoming_messages: i64 = row.get(4)?;
    let outgoing_messages: i64 = row.get(5)?;
    let successful_matches: i64 = row.get(6)?;
    let failed_matches: i64 = row.get(7)?;
    let avg_response_time_ms: f64 = row.get(8)?;
    let peak_hours_json: String = row.get(9)?;
    let created_at: String = row.get(10)?;

    let phone = if phone_key.is_empty() {
        None
    } else {
        Some(PhoneNumber::parse(&phone_key)?)
    };

    Ok(MessageAnalytics {
        id,
        date: parse_date(&date)?,
        keyword_rule_id: (!rule_key.is_empty()).then_some(rule_key),
        phone,
        incoming_messages,
        outgoing_messages,
        successful_matches,
        failed_matches,
        avg_response_time_ms,
        peak_hours: serde_json::from_str(&peak_hours_json)
            .context("invalid peak_hours JSON in database")?,
        created_at: parse_datetime(&created_at)?,
    })
}

pub fn save_daily_stats(conn: &Connection, stats: &MessageAnalytics) -> anyhow::Result<()> {
    let peak_hours = serde_json::to_string(&stats.peak_hours)?;

    conn.execute(
        "UPDATE message_analytics SET
           incoming_messages = ?1,
           outgoing_messages = ?2,
           successful_matches = ?3,
           failed_matches = ?4,
           avg_response_time_ms = ?5,
           peak_hours = ?6
         WHERE id = ?7",
        params![
            stats.incoming_messages,
            stats.outgoing_messages,
            stats.successful_matches,
            stats.failed_matches,
            stats.avg_response_time_ms,
            peak_hours,
            stats.id,
        ],
    )?;
    Ok(())
}

pub fn get_stats_by_date(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<Vec<MessageAnalytics>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, keyword_rule_id, phone, incoming_messages, outgoing_messages,
                successful_matches, failed_matches, avg_response_time_ms, peak_hours, created_at
         FROM message_analytics WHERE date = ?1",
    )?;
    let rows = stmt.query_map(params![date.format(DATE_FMT).to_string()], |row| {
        Ok(parse_analytics_row(row))
    })?;

    let mut stats = vec![];
    for row in rows {
        stats.push(row??);
    }
    Ok(stats)
}

pub fn get_totals_in_period(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<PeriodTotals> {
    let totals = conn.query_row(
        "SELECT COALESCE(SUM(incoming_messages), 0),
                COALESCE(SUM(outgoing_messages), 0),
                COALESCE(SUM(successful_matches), 0),
                COALESCE(SUM(failed_matches), 0),
                COALESCE(AVG(CASE WHEN outgoing_messages > 0 THEN avg_response_time_ms END), 0)
         FROM message_analytics WHERE date >= ?1 AND date <= ?2",
        params![
            start.format(DATE_FMT).to_string(),
            end.format(DATE_FMT).to_string()
        ],
        |row| {
            Ok(PeriodTotals {
                incoming: row.get(0)?,
                outgoing: row.get(1)?,
                successful: row.get(2)?,
                failed: row.get(3)?,
                avg_response_time_ms: row.get(4)?,
            })
        },
    )?;
    Ok(totals)
}

pub fn get_popular_rules(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    limit: i64,
) -> anyhow::Result<Vec<RuleMatchCount>> {
    let mut stmt = conn.prepare(
        "SELECT keyword_rule_id, SUM(successful_matches) AS total_matches
         FROM message_analytics
         WHERE keyword_rule_id != '' AND date >= ?1 AND date <= ?2
         GROUP BY keyword_rule_id
         HAVING total_matches > 0
         ORDER BY total_matches DESC
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(
        params![
            start.format(DATE_FMT).to_string(),
            end.format(DATE_FMT).to_string(),
            limit
        ],
        |row| {
            Ok(RuleMatchCount {
                rule_id: row.get(0)?,
                total_matches: row.get(1)?,
            })
        },
    )?;

    let mut counts = vec![];
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

pub fn delete_stats_older_than(conn: &Connection, cutoff: NaiveDate) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM message_analytics WHERE date < ?1",
        params![cutoff.format(DATE_FMT).to_string()],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Duration;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn phone(n: u64) -> PhoneNumber {
        PhoneNumber::parse(&format!("+57300{n:07}")).unwrap()
    }

    fn sid(n: u64) -> MessageSid {
        MessageSid::parse(&format!("SM{n:032x}")).unwrap()
    }

    fn rule(id: &str, keywords: &[&str], priority: i32) -> KeywordRule {
        KeywordRule::new(
            id.to_string(),
            keywords.iter().map(|k| k.to_string()).collect(),
            "respuesta".to_string(),
            priority,
            false,
            TriggerType::Contains,
            None,
            dt("2025-06-01 00:00:00"),
        )
        .unwrap()
    }

    #[test]
    fn test_rule_round_trip_and_keyword_search() {
        let conn = setup_db();
        save_rule(&conn, &rule("rule-a", &["hola", "buenas"], 10)).unwrap();
        save_rule(&conn, &rule("rule-b", &["menu"], 8)).unwrap();

        let found = get_rule(&conn, "rule-a").unwrap().unwrap();
        assert_eq!(found.keywords, vec!["hola", "buenas"]);
        assert_eq!(found.priority, 10);

        let by_keyword = get_rules_by_keyword(&conn, "menu").unwrap();
        assert_eq!(by_keyword.len(), 1);
        assert_eq!(by_keyword[0].id, "rule-b");

        // "hol" is a substring of the stored keyword but not a full match
        assert!(get_rules_by_keyword(&conn, "hol").unwrap().is_empty());

        assert!(delete_rule(&conn, "rule-b").unwrap());
        assert!(!delete_rule(&conn, "rule-b").unwrap());
        assert!(get_rule(&conn, "rule-b").unwrap().is_none());
    }

    #[test]
    fn test_inactive_rules_are_excluded_from_active_set() {
        let conn = setup_db();
        let mut r = rule("rule-a", &["hola"], 10);
        r.deactivate();
        save_rule(&conn, &r).unwrap();
        save_rule(&conn, &rule("rule-b", &["menu"], 8)).unwrap();

        let active = get_active_rules(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "rule-b");
        assert_eq!(get_all_rules(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_incoming_dedup_queries() {
        let conn = setup_db();
        let message = IncomingMessage::new(
            "in-1".to_string(),
            phone(1),
            "hola",
            sid(1),
            dt("2025-06-16 10:00:00"),
        )
        .unwrap();
        save_incoming_message(&conn, &message).unwrap();

        assert!(incoming_exists_by_sid(&conn, &sid(1)).unwrap());
        assert!(!incoming_exists_by_sid(&conn, &sid(2)).unwrap());
        assert_eq!(
            get_incoming_by_sid(&conn, &sid(1)).unwrap().unwrap().id,
            "in-1"
        );
    }

    #[test]
    fn test_incoming_by_phone_and_unprocessed() {
        let conn = setup_db();
        for n in 1..=3 {
            let mut message = IncomingMessage::new(
                format!("in-{n}"),
                phone(n % 2),
                "hola",
                sid(n),
                dt(&format!("2025-06-16 10:0{n}:00")),
            )
            .unwrap();
            if n == 3 {
                message.mark_processed("out-3".to_string());
            }
            save_incoming_message(&conn, &message).unwrap();
        }

        // phone(1) received messages 1 and 3 (newest first)
        let for_phone = get_incoming_by_phone(&conn, &phone(1), 10).unwrap();
        assert_eq!(for_phone.len(), 2);
        assert_eq!(for_phone[0].id, "in-3");

        let unprocessed = get_unprocessed_incoming(&conn, 10).unwrap();
        assert_eq!(unprocessed.len(), 2);
        assert!(unprocessed.iter().all(|m| !m.processed));

        let limited = get_unprocessed_incoming(&conn, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_conversation_state_queries_and_retention() {
        let conn = setup_db();

        let mut active = Conversation::new("conv-1".to_string(), phone(1), dt("2025-06-16 10:00:00"));
        active.set_state(ConversationState::ProcessingOrder, dt("2025-06-16 10:05:00"));
        save_conversation(&conn, &active).unwrap();

        let stale = Conversation::new("conv-2".to_string(), phone(2), dt("2025-05-01 10:00:00"));
        save_conversation(&conn, &stale).unwrap();

        assert_eq!(get_active_conversations(&conn).unwrap().len(), 1);
        assert_eq!(
            get_conversations_by_state(&conn, ConversationState::ProcessingOrder)
                .unwrap()
                .len(),
            1
        );

        // only idle conversations past the cutoff are swept
        let cutoff = dt("2025-06-01 00:00:00");
        assert_eq!(
            delete_idle_conversations_older_than(&conn, &cutoff).unwrap(),
            1
        );
        assert!(get_conversation(&conn, &phone(2)).unwrap().is_none());
        assert!(get_conversation(&conn, &phone(1)).unwrap().is_some());

        assert!(delete_conversation(&conn, &phone(1)).unwrap());
        assert!(!delete_conversation(&conn, &phone(1)).unwrap());
    }

    #[test]
    fn test_conversation_context_round_trip() {
        let conn = setup_db();
        let mut conversation =
            Conversation::new("conv-1".to_string(), phone(1), dt("2025-06-16 10:00:00"));
        conversation.set_context_value("name", serde_json::json!("Ana"), dt("2025-06-16 10:01:00"));
        save_conversation(&conn, &conversation).unwrap();

        let loaded = get_conversation(&conn, &phone(1)).unwrap().unwrap();
        assert_eq!(loaded.context_value("name"), Some(&serde_json::json!("Ana")));
        assert_eq!(loaded.id, "conv-1");
    }

    #[test]
    fn test_outbound_round_trip() {
        let conn = setup_db();
        let mut message = OutboundMessage::new(
            "out-1".to_string(),
            phone(1),
            "aviso",
            dt("2025-06-16 10:00:00"),
        )
        .unwrap();
        save_outbound_message(&conn, &message).unwrap();

        message
            .mark_sent(
                "SMaaaabbbbccccddddeeeeffff00001111".to_string(),
                dt("2025-06-16 10:00:01"),
            )
            .unwrap();
        save_outbound_message(&conn, &message).unwrap();

        let loaded = get_outbound_message(&conn, "out-1").unwrap().unwrap();
        assert!(loaded.is_sent());
        assert_eq!(loaded.sent_at, Some(dt("2025-06-16 10:00:01")));
    }

    #[test]
    fn test_business_hours_upsert_by_day() {
        let conn = setup_db();
        let monday = BusinessHours::new(
            "bh-1".to_string(),
            Weekday::Mon,
            Some(NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
            Some(NaiveTime::from_hms_opt(18, 0, 0).unwrap()),
            false,
            "America/Bogota".to_string(),
            dt("2025-06-16 10:00:00"),
        )
        .unwrap();
        save_business_hours(&conn, &monday).unwrap();

        // second save for the same day replaces, not duplicates
        let monday_later = BusinessHours::new(
            "bh-2".to_string(),
            Weekday::Mon,
            Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            Some(NaiveTime::from_hms_opt(17, 0, 0).unwrap()),
            false,
            "America/Bogota".to_string(),
            dt("2025-06-16 11:00:00"),
        )
        .unwrap();
        save_business_hours(&conn, &monday_later).unwrap();

        let all = get_all_business_hours(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].open_time,
            Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        );

        assert!(delete_business_hours(&conn, Weekday::Mon).unwrap());
        assert!(!delete_business_hours(&conn, Weekday::Mon).unwrap());
    }

    #[test]
    fn test_analytics_buckets_are_keyed_by_date_rule_and_phone() {
        let conn = setup_db();
        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();

        let a = get_or_create_daily_stats(&conn, date, None, Some(&phone(1))).unwrap();
        let b = get_or_create_daily_stats(&conn, date, None, Some(&phone(1))).unwrap();
        assert_eq!(a.id, b.id);

        let c = get_or_create_daily_stats(&conn, date, Some("rule-1"), Some(&phone(1))).unwrap();
        assert_ne!(a.id, c.id);
        assert_eq!(c.keyword_rule_id.as_deref(), Some("rule-1"));

        let d = get_or_create_daily_stats(&conn, date, None, None).unwrap();
        assert_ne!(a.id, d.id);
        assert!(d.phone.is_none());
    }

    #[test]
    fn test_analytics_save_and_retention() {
        let conn = setup_db();
        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();

        let mut stats = get_or_create_daily_stats(&conn, date, None, Some(&phone(1))).unwrap();
        stats.increment_incoming();
        stats.add_peak_hour(14);
        save_daily_stats(&conn, &stats).unwrap();

        let loaded = get_stats_by_date(&conn, date).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].incoming_messages, 1);
        assert_eq!(loaded[0].peak_hours.get(&14), Some(&1));

        let old_date = date - Duration::days(100);
        get_or_create_daily_stats(&conn, old_date, None, None).unwrap();

        assert_eq!(
            delete_stats_older_than(&conn, date - Duration::days(30)).unwrap(),
            1
        );
        assert_eq!(get_stats_by_date(&conn, old_date).unwrap().len(), 0);
        assert_eq!(get_stats_by_date(&conn, date).unwrap().len(), 1);
    }

    #[test]
    fn test_period_totals() {
        let conn = setup_db();
        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();

        let mut stats = get_or_create_daily_stats(&conn, date, Some("rule-1"), None).unwrap();
        stats.increment_incoming();
        stats.increment_outgoing();
        stats.increment_successful_matches();
        stats.update_response_time(120.0);
        save_daily_stats(&conn, &stats).unwrap();

        let totals =
            get_totals_in_period(&conn, date - Duration::days(7), date).unwrap();
        assert_eq!(totals.incoming, 1);
        assert_eq!(totals.outgoing, 1);
        assert_eq!(totals.successful, 1);
        assert_eq!(totals.avg_response_time_ms, 120.0);

        let popular = get_popular_rules(&conn, date - Duration::days(7), date, 5).unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].rule_id, "rule-1");
        assert_eq!(popular[0].total_matches, 1);
    }
}
