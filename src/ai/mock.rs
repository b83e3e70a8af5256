//! Scripted classifier backend for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatMessage, ClassifierError, SpamClassifier};

type Reply = Result<String, ClassifierError>;

pub struct ScriptedClassifier {
    queued: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClassifier {
    pub fn always(reply: Reply) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn verdict(is_spam: bool, confidence: f64) -> Self {
        Self::always(Ok(verdict_json(is_spam, confidence)))
    }

    /// Replies used in order before falling back to the default one.
    pub fn then(self, reply: Reply) -> Self {
        self.queued.lock().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }
}

pub fn verdict_json(is_spam: bool, confidence: f64) -> String {
    serde_json::json!({
        "is_spam": is_spam,
        "confidence": confidence,
        "reasoning": if is_spam { "Prize scam with unknown link" } else { "Genuine support request" },
        "spam_indicators": if is_spam { vec!["free iPhone"] } else { Vec::new() },
    })
    .to_string()
}

#[async_trait]
impl SpamClassifier for ScriptedClassifier {
    fn provider(&self) -> &'static str {
        "Scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ClassifierError> {
        self.requests.lock().push(messages.to_vec());
        let queued = self.queued.lock().pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}
