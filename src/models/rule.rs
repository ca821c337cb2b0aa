use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::models::MAX_CONTENT_LEN;
use crate::services::text::normalize;

pub const MAX_KEYWORD_LEN: usize = 100;

/// Comparison mode used to test a keyword against message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Exact,
    StartsWith,
    Contains,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Exact => "exact",
            TriggerType::StartsWith => "starts_with",
            TriggerType::Contains => "contains",
        }
    }

    /// Unknown values degrade to `contains`.
    pub fn parse(s: &str) -> Self {
        match s {
            "exact" => TriggerType::Exact,
            "starts_with" => TriggerType::StartsWith,
            _ => TriggerType::Contains,
        }
    }
}

impl Default for TriggerType {
    fn default() -> Self {
        TriggerType::Contains
    }
}

/// A configurable auto-reply rule: a set of trigger keywords and the
/// response template sent when one of them matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub id: String,
    pub keywords: Vec<String>,
    pub response_template: String,
    pub is_active: bool,
    pub priority: i32,
    pub fuzzy_match: bool,
    pub trigger_type: TriggerType,
    pub variables: Option<HashMap<String, serde_json::Value>>,
    pub created_at: NaiveDateTime,
}

impl KeywordRule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        keywords: Vec<String>,
        response_template: String,
        priority: i32,
        fuzzy_match: bool,
        trigger_type: TriggerType,
        variables: Option<HashMap<String, serde_json::Value>>,
        created_at: NaiveDateTime,
    ) -> Result<Self, DomainError> {
        validate_keywords(&keywords)?;
        validate_template(&response_template)?;

        Ok(Self {
            id,
            keywords,
            response_template,
            is_active: true,
            priority,
            fuzzy_match,
            trigger_type,
            variables,
            created_at,
        })
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Trigger-only match: does ANY keyword satisfy the rule's trigger
    /// condition against the normalized content? The fuzzy fallback lives
    /// in the matcher, not here.
    pub fn matches_trigger(&self, content: &str) -> bool {
        if !self.is_active {
            return false;
        }

        let content = normalize(content);

        self.keywords.iter().any(|keyword| {
            let keyword = normalize(keyword);
            match self.trigger_type {
                TriggerType::Exact => content == keyword,
                TriggerType::StartsWith => content.starts_with(&keyword),
                TriggerType::Contains => content.contains(&keyword),
            }
        })
    }
}

fn validate_keywords(keywords: &[String]) -> Result<(), DomainError> {
    if keywords.is_empty() {
        return Err(DomainError::NoKeywords);
    }

    for keyword in keywords {
        if keyword.trim().is_empty() {
            return Err(DomainError::EmptyKeyword);
        }
        if keyword.len() > MAX_KEYWORD_LEN {
            return Err(DomainError::KeywordTooLong(MAX_KEYWORD_LEN));
        }
    }

    Ok(())
}

fn validate_template(template: &str) -> Result<(), DomainError> {
    if template.trim().is_empty() {
        return Err(DomainError::EmptyTemplate);
    }
    if template.len() > MAX_CONTENT_LEN {
        return Err(DomainError::TemplateTooLong(MAX_CONTENT_LEN));
    }
    Ok(())
}
