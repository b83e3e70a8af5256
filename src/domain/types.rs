use std::fmt;

use serde::{Deserialize, Serialize};

/// Verdict of one classifier call. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_spam: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub indicators: Vec<String>,
}

impl ClassificationResult {
    /// Fail-open verdict used whenever the model could not be asked.
    pub fn not_spam(reasoning: impl Into<String>) -> Self {
        Self {
            is_spam: false,
            confidence: 0.0,
            reasoning: reasoning.into(),
            indicators: Vec::new(),
        }
    }

    pub fn reasoning_with_indicators(&self) -> String {
        if self.indicators.is_empty() {
            self.reasoning.clone()
        } else {
            format!(
                "{} Indicators: {}",
                self.reasoning,
                self.indicators.join(", ")
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    HandledAsSpam,
    MarkedLegitimate,
    Error,
}

/// Per-ticket result handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub ticket_id: u64,
    pub subject: String,
    pub is_spam: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub action_taken: ActionTaken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStatistics {
    pub total_processed: usize,
    pub spam_detected: usize,
    pub legitimate: usize,
    pub errors: usize,
    pub skipped_already_processed: usize,
}

impl fmt::Display for CycleStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} spam={} legitimate={} skipped={} errors={}",
            self.total_processed,
            self.spam_detected,
            self.legitimate,
            self.skipped_already_processed,
            self.errors
        )
    }
}

/// Snapshot of spam tags across recent tickets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpamOverview {
    pub total_tickets_checked: usize,
    pub spam_tagged_tickets: usize,
    pub auto_detected_spam: usize,
    pub processed_this_session: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicators_are_appended_to_reasoning() {
        let result = ClassificationResult {
            is_spam: true,
            confidence: 0.9,
            reasoning: "Prize scam.".into(),
            indicators: vec!["free iPhone".into(), "unknown link".into()],
        };
        assert_eq!(
            result.reasoning_with_indicators(),
            "Prize scam. Indicators: free iPhone, unknown link"
        );
        assert_eq!(
            ClassificationResult::not_spam("x").reasoning_with_indicators(),
            "x"
        );
    }

    #[test]
    fn action_taken_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&ActionTaken::HandledAsSpam).unwrap();
        assert_eq!(json, "\"handled_as_spam\"");
    }
}
