use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the review service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewId {
    Int(i64),
    Str(String),
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewId::Int(id) => write!(f, "{}", id),
            ReviewId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ReviewId {
    fn from(id: i64) -> Self {
        ReviewId::Int(id)
    }
}

impl From<&str> for ReviewId {
    fn from(id: &str) -> Self {
        // Numeric ids round-trip as integers so they compare equal to list() results
        match id.parse::<i64>() {
            Ok(n) => ReviewId::Int(n),
            Err(_) => ReviewId::Str(id.to_string()),
        }
    }
}

/// Sentiment classification produced by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl From<String> for Sentiment {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

impl Sentiment {
    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
        }
    }
}

/// An analyzed review as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    #[serde(rename = "review_text")]
    pub text: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    /// Service-generated, kept verbatim including line breaks
    #[serde(default)]
    pub key_points: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Review {
    /// Parse `created_at`, accepting RFC 3339 or a naive ISO-8601 timestamp (read as UTC)
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?.trim();

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Score as a percentage string, e.g. `87.0%`
    pub fn score_percent(&self) -> Option<String> {
        self.sentiment_score
            .map(|score| format!("{:.1}%", score * 100.0))
    }

    /// Display date, or `unavailable` when the service sent none
    pub fn created_date(&self) -> String {
        match self.created_at() {
            Some(ts) => ts.format("%-d %b %Y").to_string(),
            None => "unavailable".to_string(),
        }
    }
}
