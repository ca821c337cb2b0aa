use std::sync::Arc;

use crate::models::{IncomingMessage, MessageSid, OutboundMessage, PhoneNumber};
use crate::services::analytics::AnalyticsTracker;
use crate::services::matcher::{select_best_rule, RuleMatcher};
use crate::services::template::TemplateEngine;
use crate::services::whatsapp::{SendOutcome, WhatsAppProvider};
use crate::store::{Clock, IncomingMessageStore, OutboundMessageStore};

/// Outcome of handling one inbound webhook delivery. A repeated delivery
/// and a failed reply send are both `Received`: the inbound message was
/// durably recorded, which is what the provider retries on.
#[derive(Debug)]
pub enum IncomingOutcome {
    Received(IncomingMessage),
    Rejected(String),
}

impl IncomingOutcome {
    pub fn is_received(&self) -> bool {
        matches!(self, IncomingOutcome::Received(_))
    }
}

/// Outcome of an outbound send request.
#[derive(Debug)]
pub enum SendResult {
    Sent { message_id: String },
    Failed { error: String },
}

impl SendResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendResult::Sent { .. })
    }
}

/// Ties incoming-message handling to the matcher, the template engine and
/// the outbound transport. Request-scoped: no state is carried between
/// invocations beyond what lives in the stores.
pub struct MessageDispatcher {
    incoming: Arc<dyn IncomingMessageStore>,
    outbound: Arc<dyn OutboundMessageStore>,
    matcher: RuleMatcher,
    templates: TemplateEngine,
    analytics: AnalyticsTracker,
    transport: Arc<dyn WhatsAppProvider>,
    clock: Arc<dyn Clock>,
}

impl MessageDispatcher {
    pub fn new(
        incoming: Arc<dyn IncomingMessageStore>,
        outbound: Arc<dyn OutboundMessageStore>,
        matcher: RuleMatcher,
        templates: TemplateEngine,
        analytics: AnalyticsTracker,
        transport: Arc<dyn WhatsAppProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            incoming,
            outbound,
            matcher,
            templates,
            analytics,
            transport,
            clock,
        }
    }

    /// Webhook entry point. Never lets an error escape: everything becomes
    /// a structured outcome. Already-persisted records stay persisted on
    /// failure.
    pub async fn handle_incoming(
        &self,
        from_phone: &str,
        content: &str,
        provider_sid: &str,
    ) -> IncomingOutcome {
        match self.try_handle_incoming(from_phone, content, provider_sid).await {
            Ok(message) => IncomingOutcome::Received(message),
            Err(e) => IncomingOutcome::Rejected(e.to_string()),
        }
    }

    async fn try_handle_incoming(
        &self,
        from_phone: &str,
        content: &str,
        provider_sid: &str,
    ) -> anyhow::Result<IncomingMessage> {
        let sid = MessageSid::parse(provider_sid)?;

        // Providers retry webhooks; a repeat delivery returns the stored
        // record untouched instead of sending a second reply.
        if let Some(existing) = self.incoming.find_by_provider_sid(&sid)? {
            tracing::info!(sid = %sid, "duplicate webhook delivery, returning existing record");
            return Ok(existing);
        }

        let received_at = self.clock.now();
        let phone = PhoneNumber::parse(from_phone)?;
        let mut message = IncomingMessage::new(
            uuid::Uuid::new_v4().to_string(),
            phone.clone(),
            content,
            sid,
            received_at,
        )?;
        self.incoming.save(&message)?;

        // Analytics are best-effort: a counter hiccup must not reject a
        // durably recorded message.
        if let Err(e) = self.analytics.track_incoming(&phone, received_at) {
            tracing::warn!(error = %e, "failed to track incoming message");
        }

        let matches = self.matcher.find_matches(&message.content)?;
        let Some(rule) = select_best_rule(matches) else {
            tracing::info!(phone = %phone, "no keyword rule matched");
            if let Err(e) = self.analytics.track_failed_match(&phone, received_at) {
                tracing::warn!(error = %e, "failed to track failed match");
            }
            return Ok(message);
        };

        tracing::info!(phone = %phone, rule = %rule.id, priority = rule.priority, "matched keyword rule");
        if let Err(e) = self.analytics.track_successful_match(&phone, &rule.id, received_at) {
            tracing::warn!(error = %e, "failed to track successful match");
        }

        let extra = rule.variables.clone().unwrap_or_default();
        let rendered = self
            .templates
            .render_with_context(&rule.response_template, &phone, &extra)?;

        match self.deliver(&phone, &rendered).await {
            SendResult::Sent { message_id } => {
                message.mark_processed(message_id);
                self.incoming.save(&message)?;

                let sent_at = self.clock.now();
                let elapsed_ms = (sent_at - received_at).num_milliseconds() as f64;
                if let Err(e) =
                    self.analytics
                        .track_outgoing(&phone, Some(&rule.id), elapsed_ms, sent_at)
                {
                    tracing::warn!(error = %e, "failed to track outgoing message");
                }
            }
            SendResult::Failed { error } => {
                // The inbound receipt stands; the message just stays
                // unprocessed for a later retry.
                tracing::warn!(phone = %phone, error = %error, "reply delivery failed");
            }
        }

        Ok(message)
    }

    /// Outbound send request: validate, then deliver.
    pub async fn send_message(&self, to_phone: &str, content: &str) -> SendResult {
        let phone = match PhoneNumber::parse(to_phone) {
            Ok(phone) => phone,
            Err(e) => return SendResult::Failed { error: e.to_string() },
        };

        self.deliver(&phone, content).await
    }

    /// Persist a pending outbound message, push it through the transport
    /// and record what happened. Sent is terminal.
    async fn deliver(&self, to: &PhoneNumber, content: &str) -> SendResult {
        match self.try_deliver(to, content).await {
            Ok(message_id) => SendResult::Sent { message_id },
            Err(e) => SendResult::Failed { error: e.to_string() },
        }
    }

    async fn try_deliver(&self, to: &PhoneNumber, content: &str) -> anyhow::Result<String> {
        let mut message = OutboundMessage::new(
            uuid::Uuid::new_v4().to_string(),
            to.clone(),
            content,
            self.clock.now(),
        )?;
        self.outbound.save(&message)?;

        match self.transport.send_message(to, &message.content).await {
            SendOutcome::Sent { sid } => {
                message.mark_sent(sid, self.clock.now())?;
                self.outbound.save(&message)?;
                Ok(message.id)
            }
            SendOutcome::Failed { error } => {
                message.mark_failed()?;
                self.outbound.save(&message)?;
                Err(anyhow::anyhow!(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use serde_json::json;

    use super::*;
    use crate::db;
    use crate::db::stores::{
        Db, SqliteAnalyticsStore, SqliteBusinessHoursStore, SqliteConversationStore,
        SqliteIncomingMessageStore, SqliteOutboundMessageStore, SqliteRuleStore,
    };
    use crate::models::{DeliveryStatus, KeywordRule, TriggerType};
    use crate::services::analytics::AnalyticsTracker;
    use crate::services::hours::BusinessHoursChecker;
    use crate::services::template::TemplateEngine;
    use crate::services::tracker::ConversationTracker;
    use crate::store::FixedClock;

    struct MockTransport {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl WhatsAppProvider for MockTransport {
        async fn send_message(&self, to: &PhoneNumber, body: &str) -> SendOutcome {
            if self.fail {
                return SendOutcome::Failed {
                    error: "transport down".to_string(),
                };
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.as_str().to_string(), body.to_string()));
            SendOutcome::Sent {
                sid: "SMaaaabbbbccccddddeeeeffff00001111".to_string(),
            }
        }

        async fn is_available(&self) -> bool {
            !self.fail
        }
    }

    struct Harness {
        dispatcher: MessageDispatcher,
        sent: Arc<Mutex<Vec<(String, String)>>>,
        db: Db,
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn harness(fail_transport: bool) -> Harness {
        let conn = db::init_db(":memory:").unwrap();
        let db: Db = Arc::new(Mutex::new(conn));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(dt("2025-06-16 10:00:00")));

        let sent = Arc::new(Mutex::new(vec![]));
        let transport: Arc<dyn WhatsAppProvider> = Arc::new(MockTransport {
            sent: Arc::clone(&sent),
            fail: fail_transport,
        });

        let rule_store = Arc::new(SqliteRuleStore::new(db.clone()));
        let tracker = ConversationTracker::new(
            Arc::new(SqliteConversationStore::new(db.clone())),
            clock.clone(),
        );
        let checker = BusinessHoursChecker::new(
            Arc::new(SqliteBusinessHoursStore::new(db.clone())),
            clock.clone(),
        );
        let templates = TemplateEngine::new(
            tracker,
            checker,
            clock.clone(),
            "Mi Tienda".to_string(),
        );
        let analytics = AnalyticsTracker::new(
            Arc::new(SqliteAnalyticsStore::new(db.clone())),
            rule_store.clone(),
            clock.clone(),
        );

        let dispatcher = MessageDispatcher::new(
            Arc::new(SqliteIncomingMessageStore::new(db.clone())),
            Arc::new(SqliteOutboundMessageStore::new(db.clone())),
            RuleMatcher::new(rule_store),
            templates,
            analytics,
            transport,
            clock,
        );

        Harness {
            dispatcher,
            sent,
            db,
        }
    }

    fn seed_rule(db: &Db, id: &str, keyword: &str, template: &str, priority: i32) {
        let rule = KeywordRule::new(
            id.to_string(),
            vec![keyword.to_string()],
            template.to_string(),
            priority,
            false,
            TriggerType::Contains,
            None,
            dt("2025-06-01 00:00:00"),
        )
        .unwrap();
        let conn = db.lock().unwrap();
        crate::db::queries::save_rule(&conn, &rule).unwrap();
    }

    const SID: &str = "SM00112233445566778899aabbccddeeff";
    const PHONE: &str = "+573001234567";

    #[tokio::test]
    async fn test_matched_message_gets_a_reply_and_is_processed() {
        let h = harness(false);
        seed_rule(&h.db, "rule-hola", "hola", "¡Hola!", 10);

        let outcome = h.dispatcher.handle_incoming(PHONE, "hola", SID).await;
        let IncomingOutcome::Received(message) = outcome else {
            panic!("expected received outcome");
        };

        assert!(message.processed);
        assert!(message.response_message_id.is_some());

        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], (PHONE.to_string(), "¡Hola!".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_sid_short_circuits() {
        let h = harness(false);
        seed_rule(&h.db, "rule-hola", "hola", "¡Hola!", 10);

        let first = h.dispatcher.handle_incoming(PHONE, "hola", SID).await;
        let second = h.dispatcher.handle_incoming(PHONE, "hola", SID).await;

        let IncomingOutcome::Received(first) = first else {
            panic!("expected received outcome");
        };
        let IncomingOutcome::Received(second) = second else {
            panic!("expected received outcome");
        };
        assert_eq!(first.id, second.id);

        // only one reply went out
        assert_eq!(h.sent.lock().unwrap().len(), 1);

        let count: i64 = {
            let conn = h.db.lock().unwrap();
            conn.query_row("SELECT COUNT(*) FROM incoming_messages", [], |row| {
                row.get(0)
            })
            .unwrap()
        };
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_no_match_leaves_message_unprocessed() {
        let h = harness(false);

        let outcome = h
            .dispatcher
            .handle_incoming(PHONE, "mensaje sin reglas", SID)
            .await;
        let IncomingOutcome::Received(message) = outcome else {
            panic!("expected received outcome");
        };

        assert!(!message.processed);
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_higher_priority_rule_wins() {
        let h = harness(false);
        seed_rule(&h.db, "rule-low", "precio", "respuesta seis", 6);
        seed_rule(&h.db, "rule-high", "horario", "respuesta siete", 7);

        h.dispatcher
            .handle_incoming(PHONE, "precio y horario", SID)
            .await;

        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "respuesta siete");
    }

    #[tokio::test]
    async fn test_rule_variables_feed_the_template() {
        let h = harness(false);
        let rule = KeywordRule::new(
            "rule-promo".to_string(),
            vec!["promo".to_string()],
            "{{business_name}}: {{descuento}} en {{producto}}".to_string(),
            5,
            false,
            TriggerType::Contains,
            Some(HashMap::from([
                ("descuento".to_string(), json!("20%")),
                ("producto".to_string(), json!("cortes")),
            ])),
            dt("2025-06-01 00:00:00"),
        )
        .unwrap();
        {
            let conn = h.db.lock().unwrap();
            crate::db::queries::save_rule(&conn, &rule).unwrap();
        }

        h.dispatcher.handle_incoming(PHONE, "promo?", SID).await;

        let sent = h.sent.lock().unwrap();
        assert_eq!(sent[0].1, "Mi Tienda: 20% en cortes");
    }

    #[tokio::test]
    async fn test_invalid_sid_is_rejected() {
        let h = harness(false);
        let outcome = h.dispatcher.handle_incoming(PHONE, "hola", "not-a-sid").await;
        assert!(!outcome.is_received());
    }

    #[tokio::test]
    async fn test_invalid_phone_is_rejected() {
        let h = harness(false);
        let outcome = h.dispatcher.handle_incoming("12345", "hola", SID).await;
        assert!(!outcome.is_received());
    }

    #[tokio::test]
    async fn test_send_failure_still_counts_as_receipt() {
        let h = harness(true);
        seed_rule(&h.db, "rule-hola", "hola", "¡Hola!", 10);

        let outcome = h.dispatcher.handle_incoming(PHONE, "hola", SID).await;
        let IncomingOutcome::Received(message) = outcome else {
            panic!("expected received outcome");
        };

        // inbound recorded, but reply never made it out
        assert!(!message.processed);
        assert!(message.response_message_id.is_none());

        let status: String = {
            let conn = h.db.lock().unwrap();
            conn.query_row("SELECT status FROM outbound_messages", [], |row| {
                row.get(0)
            })
            .unwrap()
        };
        assert_eq!(status, "failed");
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let h = harness(false);

        let result = h.dispatcher.send_message(PHONE, "aviso manual").await;
        let SendResult::Sent { message_id } = result else {
            panic!("expected sent result");
        };

        let conn = h.db.lock().unwrap();
        let message = crate::db::queries::get_outbound_message(&conn, &message_id)
            .unwrap()
            .unwrap();
        assert_eq!(message.status, DeliveryStatus::Sent);
        assert_eq!(
            message.provider_sid.as_deref(),
            Some("SMaaaabbbbccccddddeeeeffff00001111")
        );
        assert!(message.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_send_message_invalid_phone_fails() {
        let h = harness(false);
        let result = h.dispatcher.send_message("abc", "aviso").await;
        assert!(!result.is_sent());
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_transport_failure_records_failed() {
        let h = harness(true);

        let result = h.dispatcher.send_message(PHONE, "aviso").await;
        let SendResult::Failed { error } = result else {
            panic!("expected failed result");
        };
        assert_eq!(error, "transport down");

        let status: String = {
            let conn = h.db.lock().unwrap();
            conn.query_row("SELECT status FROM outbound_messages", [], |row| {
                row.get(0)
            })
            .unwrap()
        };
        assert_eq!(status, "failed");
    }

    #[tokio::test]
    async fn test_analytics_record_traffic() {
        let h = harness(false);
        seed_rule(&h.db, "rule-hola", "hola", "¡Hola!", 10);

        h.dispatcher.handle_incoming(PHONE, "hola", SID).await;
        h.dispatcher
            .handle_incoming(PHONE, "sin regla", "SMffeeddccbbaa99887766554433221100")
            .await;

        let conn = h.db.lock().unwrap();
        let (incoming, outgoing, successful, failed): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COALESCE(SUM(incoming_messages), 0), COALESCE(SUM(outgoing_messages), 0),
                        COALESCE(SUM(successful_matches), 0), COALESCE(SUM(failed_matches), 0)
                 FROM message_analytics",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(incoming, 2);
        assert_eq!(outgoing, 1);
        assert_eq!(successful, 1);
        assert_eq!(failed, 1);
    }
}
