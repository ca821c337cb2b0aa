pub mod analytics;
pub mod dispatch;
pub mod fuzzy;
pub mod hours;
pub mod matcher;
pub mod template;
pub mod text;
pub mod tracker;
pub mod whatsapp;
