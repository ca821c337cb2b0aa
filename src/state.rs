use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::analytics::AnalyticsTracker;
use crate::services::dispatch::MessageDispatcher;
use crate::services::whatsapp::WhatsAppProvider;
use crate::store::Clock;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub dispatcher: MessageDispatcher,
    pub analytics: AnalyticsTracker,
    pub transport: Arc<dyn WhatsAppProvider>,
    pub clock: Arc<dyn Clock>,
}
