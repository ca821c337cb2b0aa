pub mod migrations;
pub mod queries;
pub mod stores;

use anyhow::Context;
use chrono::{NaiveTime, Utc, Weekday};
use rusqlite::Connection;

use crate::models::hours::parse_day;
use crate::models::{BusinessHours, KeywordRule, TriggerType};

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Starter rule set and weekly schedule for a fresh install. No-op once
/// either table has rows, so operator edits survive restarts.
pub fn seed_defaults(conn: &Connection) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc();

    let rule_count: i64 = conn.query_row("SELECT COUNT(*) FROM keyword_rules", [], |row| {
        row.get(0)
    })?;
    if rule_count == 0 {
        let defaults = [
            ("hola", "¡Hola! 👋 ¿En qué puedo ayudarte hoy?", 10),
            ("menu", "📋 Aquí está nuestro menú completo: [enlace del menú]", 8),
            (
                "precio",
                "💰 Nuestros precios van desde $15.000. ¿Te interesa algún producto específico?",
                7,
            ),
            (
                "horario",
                "🕒 Nuestro horario de hoy es {{business_hours}} ({{business_status}})",
                6,
            ),
            (
                "ubicacion",
                "📍 Estamos ubicados en [dirección]. ¿Necesitas indicaciones?",
                5,
            ),
        ];

        for (keyword, template, priority) in defaults {
            let rule = KeywordRule::new(
                uuid::Uuid::new_v4().to_string(),
                vec![keyword.to_string()],
                template.to_string(),
                priority,
                false,
                TriggerType::Contains,
                None,
                now,
            )?;
            queries::save_rule(conn, &rule)?;
        }
        tracing::info!("seeded default keyword rules");
    }

    let hours_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM business_hours", [], |row| row.get(0))?;
    if hours_count == 0 {
        let open = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let close = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

        for day in ["monday", "tuesday", "wednesday", "thursday", "friday"] {
            let entry = BusinessHours::new(
                uuid::Uuid::new_v4().to_string(),
                parse_day(day)?,
                Some(open),
                Some(close),
                false,
                "America/Bogota".to_string(),
                now,
            )?;
            queries::save_business_hours(conn, &entry)?;
        }

        let saturday = BusinessHours::new(
            uuid::Uuid::new_v4().to_string(),
            Weekday::Sat,
            Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            Some(NaiveTime::from_hms_opt(14, 0, 0).unwrap()),
            false,
            "America/Bogota".to_string(),
            now,
        )?;
        queries::save_business_hours(conn, &saturday)?;

        let sunday = BusinessHours::closed(
            uuid::Uuid::new_v4().to_string(),
            Weekday::Sun,
            "America/Bogota".to_string(),
            now,
        );
        queries::save_business_hours(conn, &sunday)?;

        tracing::info!("seeded default business hours");
    }

    Ok(())
}
