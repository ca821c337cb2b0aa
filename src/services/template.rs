use std::collections::HashMap;
use std::sync::Arc;

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{json, Value};

use crate::models::hours::format_12h;
use crate::models::PhoneNumber;
use crate::services::hours::BusinessHoursChecker;
use crate::services::tracker::ConversationTracker;
use crate::store::Clock;

static VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());
static IF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{if\s+([^}]+)\}\}(.*?)\{\{endif\}\}").unwrap());

pub type Variables = HashMap<String, Value>;

/// `{{variable}}` substitution plus non-nested `{{if variable}}...{{endif}}`
/// blocks, resolved against system variables, conversation context and
/// caller-supplied extras (later layers win on key collision).
#[derive(Clone)]
pub struct TemplateEngine {
    tracker: ConversationTracker,
    hours: BusinessHoursChecker,
    clock: Arc<dyn Clock>,
    business_name: String,
}

impl TemplateEngine {
    pub fn new(
        tracker: ConversationTracker,
        hours: BusinessHoursChecker,
        clock: Arc<dyn Clock>,
        business_name: String,
    ) -> Self {
        Self {
            tracker,
            hours,
            clock,
            business_name,
        }
    }

    /// Render with system variables and the caller's extras only.
    pub fn render(&self, template: &str, variables: &Variables) -> anyhow::Result<String> {
        let mut all = self.system_variables()?;
        all.extend(variables.clone());
        Ok(replace_variables(template, &all))
    }

    /// Render with the phone number's conversation context layered between
    /// system variables and the caller's extras.
    pub fn render_with_context(
        &self,
        template: &str,
        phone: &PhoneNumber,
        additional: &Variables,
    ) -> anyhow::Result<String> {
        let conversation = self.tracker.get_or_create(phone)?;

        let mut all = self.system_variables()?;
        all.extend(conversation.context);
        all.extend(additional.clone());

        Ok(replace_variables(template, &all))
    }

    fn system_variables(&self) -> anyhow::Result<Variables> {
        let now = self.clock.now();
        let status = self.hours.current_status()?;
        let today_hours = self.hours.formatted_hours_for(now.weekday())?;

        let mut vars = Variables::new();
        vars.insert("time".to_string(), json!(format_12h(now.time())));
        vars.insert(
            "date".to_string(),
            json!(now.format("%B %-d, %Y").to_string()),
        );
        vars.insert("day".to_string(), json!(now.format("%A").to_string()));
        vars.insert(
            "business_name".to_string(),
            json!(self.business_name.clone()),
        );
        vars.insert("business_hours".to_string(), json!(today_hours));
        vars.insert("business_status".to_string(), json!(status.status_message));
        vars.insert(
            "is_business_open".to_string(),
            json!(if status.is_open { "true" } else { "false" }),
        );
        vars.insert(
            "next_open_time".to_string(),
            json!(status
                .next_open
                .map(|dt| dt.format("%-I:%M %p %A").to_string())
                .unwrap_or_else(|| "No definido".to_string())),
        );

        Ok(vars)
    }
}

/// Substitution runs first so placeholders inside kept conditional blocks
/// come out resolved; the conditional test itself reads raw values from the
/// variable map, not the substituted text. Whatever placeholder survives
/// both passes is stripped rather than shown to the end user.
fn replace_variables(template: &str, variables: &Variables) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        if let Some(text) = primitive_to_string(value) {
            result = result.replace(&format!("{{{{{key}}}}}"), &text);
        }
    }

    let result = apply_conditionals(&result, variables);
    strip_unresolved(&result)
}

/// Only primitives substitute; null renders as empty. Arrays and objects
/// are left for the cleanup pass.
fn primitive_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Present and non-empty: false, null, zero, "" and "0" all fail the test.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn apply_conditionals(template: &str, variables: &Variables) -> String {
    IF_RE
        .replace_all(template, |caps: &Captures| {
            let name = caps[1].trim();
            match variables.get(name) {
                Some(value) if is_truthy(value) => caps[2].to_string(),
                _ => String::new(),
            }
        })
        .into_owned()
}

fn strip_unresolved(template: &str) -> String {
    VAR_RE.replace_all(template, "").into_owned()
}

/// De-duplicated variable names referenced via `{{name}}`, in order of
/// first appearance. `if`/`endif` markers are reported like any other
/// reference.
pub fn extract_variable_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in VAR_RE.captures_iter(template) {
        let name = caps[1].trim().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

pub fn has_variables(template: &str) -> bool {
    VAR_RE.is_match(template)
}
