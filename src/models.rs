use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::normalize_query;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    #[serde(rename = "Very High", alias = "very high", alias = "VeryHigh")]
    VeryHigh,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "low")]
    Low,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Very High",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize_query(value).as_str() {
            "very high" | "veryhigh" => Some(RiskLevel::VeryHigh),
            "high" => Some(RiskLevel::High),
            "medium" => Some(RiskLevel::Medium),
            "low" => Some(RiskLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Referral,
    Rule,
    Model,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Referral => "referral",
            Route::Rule => "rule",
            Route::Model => "model",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "referral" => Route::Referral,
            "rule" => Route::Rule,
            _ => Route::Model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub raw: String,
    pub normalized: String,
    pub in_domain: bool,
}

impl QueryRecord {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            normalized: normalize_query(raw),
            in_domain: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedResponse {
    pub text: String,
    pub route: Route,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub session_id: String,
    pub answer: String,
    pub route: Route,
    pub latency_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: Option<String>,
    pub reset: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
    pub route: Route,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turn_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_uses_display_strings() {
        let json = serde_json::to_string(&RiskLevel::VeryHigh).unwrap();
        assert_eq!(json, "\"Very High\"");
        let parsed: RiskLevel = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(parsed, RiskLevel::Medium);
        assert_eq!(RiskLevel::parse(" very  HIGH "), Some(RiskLevel::VeryHigh));
        assert_eq!(RiskLevel::parse("extreme"), None);
    }

    #[test]
    fn query_record_normalizes_raw_text() {
        let record = QueryRecord::new("  Flood RISK in Bor ");
        assert_eq!(record.raw, "  Flood RISK in Bor ");
        assert_eq!(record.normalized, "flood risk in bor");
        assert!(!record.in_domain);
    }

    #[test]
    fn route_round_trips_through_db_string() {
        for route in [Route::Referral, Route::Rule, Route::Model] {
            assert_eq!(Route::from_db(route.as_str()), route);
        }
    }
}
