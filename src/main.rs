use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use autoresponder::config::AppConfig;
use autoresponder::db;
use autoresponder::db::stores::{
    SqliteAnalyticsStore, SqliteBusinessHoursStore, SqliteConversationStore,
    SqliteIncomingMessageStore, SqliteOutboundMessageStore, SqliteRuleStore,
};
use autoresponder::handlers;
use autoresponder::services::analytics::AnalyticsTracker;
use autoresponder::services::dispatch::MessageDispatcher;
use autoresponder::services::hours::BusinessHoursChecker;
use autoresponder::services::matcher::RuleMatcher;
use autoresponder::services::template::TemplateEngine;
use autoresponder::services::tracker::ConversationTracker;
use autoresponder::services::whatsapp::twilio::TwilioWhatsAppProvider;
use autoresponder::services::whatsapp::WhatsAppProvider;
use autoresponder::state::AppState;
use autoresponder::store::{Clock, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    db::seed_defaults(&conn)?;
    let db = Arc::new(Mutex::new(conn));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport: Arc<dyn WhatsAppProvider> = Arc::new(TwilioWhatsAppProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_whatsapp_number.clone(),
    ));

    let rule_store = Arc::new(SqliteRuleStore::new(db.clone()));
    let conversation_store = Arc::new(SqliteConversationStore::new(db.clone()));
    let incoming_store = Arc::new(SqliteIncomingMessageStore::new(db.clone()));
    let outbound_store = Arc::new(SqliteOutboundMessageStore::new(db.clone()));
    let hours_store = Arc::new(SqliteBusinessHoursStore::new(db.clone()));
    let analytics_store = Arc::new(SqliteAnalyticsStore::new(db.clone()));

    let tracker = ConversationTracker::new(conversation_store, clock.clone());
    let checker = BusinessHoursChecker::new(hours_store, clock.clone());
    let templates = TemplateEngine::new(
        tracker,
        checker,
        clock.clone(),
        config.business_name.clone(),
    );
    let matcher = RuleMatcher::new(rule_store.clone());
    let analytics = AnalyticsTracker::new(analytics_store, rule_store, clock.clone());

    let dispatcher = MessageDispatcher::new(
        incoming_store,
        outbound_store,
        matcher,
        templates,
        analytics.clone(),
        transport.clone(),
        clock.clone(),
    );

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        dispatcher,
        analytics,
        transport,
        clock,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/whatsapp", post(handlers::webhook::whatsapp_webhook))
        .route("/api/messages", post(handlers::send::send_message))
        .route("/api/admin/status", get(handlers::status::get_status))
        .route("/api/admin/rules", get(handlers::rules::list_rules))
        .route("/api/admin/rules", post(handlers::rules::create_rule))
        .route(
            "/api/admin/rules/:id/activate",
            post(handlers::rules::activate_rule),
        )
        .route(
            "/api/admin/rules/:id/deactivate",
            post(handlers::rules::deactivate_rule),
        )
        .route("/api/admin/rules/:id", delete(handlers::rules::delete_rule))
        .route("/api/admin/hours", get(handlers::hours::list_hours))
        .route("/api/admin/hours", put(handlers::hours::upsert_hours))
        .route("/api/admin/hours/:day", delete(handlers::hours::delete_hours))
        .route("/api/admin/analytics", get(handlers::analytics::dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
