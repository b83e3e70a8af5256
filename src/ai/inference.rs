use serde::{Deserialize, Serialize};

use super::{ClassificationRequest, ClassifierError};
use crate::domain::ClassificationResult;

/// Confidence given to a verdict recovered from free text.
const LEXICAL_FALLBACK_CONFIDENCE: f64 = 0.5;

const SYSTEM_PROMPT: &str = r#"You are an expert spam detection system for a customer support helpdesk. Analyze the provided support ticket content and respond with a JSON object containing your analysis.
Your response MUST be a single JSON object with the following schema:
{
  "is_spam": boolean,
  "confidence": float,
  "reasoning": "string",
  "spam_indicators": ["string"]
}
"is_spam" is true if the ticket is spam, false otherwise. "confidence" is a score from 0.0 (definitely not spam) to 1.0 (definitely spam). "reasoning" briefly explains the decision. "spam_indicators" lists the specific textual or contextual cues when the ticket is spam and is empty otherwise.

Consider these factors:
1. Promotional or marketing content
2. Suspicious links or attachments
3. Generic or template-like language
4. Content irrelevant to customer support
5. Suspicious sender patterns
6. Phishing attempts
7. Malicious content
"#;

const SYSTEM_VALIDATION_GUIDANCE: &str = r#"
IMPORTANT CONTEXT FROM OUR SYSTEM:
- This user/ticket has been marked with: 'USER INFORMATION WAS VALIDATED BY OUR SYSTEM'.
- This means we have a strong internal indicator that this is a legitimate interaction.

INSTRUCTIONS BASED ON SYSTEM VALIDATION:
- You MUST give this information very high priority.
- Be EXTREMELY hesitant to classify the ticket as spam. A simple request like 'Please delete my account' from a system-validated user is almost certainly NOT SPAM.
- To override system validation and classify as spam, you need OVERWHELMING and UNDENIABLE evidence of malicious activity, phishing, or clear spam content that directly contradicts the system validation.
- If in doubt, err on the side of classifying as NOT SPAM.
"#;

const CONSERVATIVE_CLOSING: &str = "Be conservative - only mark as spam if you are confident it is not a legitimate support request.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

pub fn build_messages(request: &ClassificationRequest<'_>) -> Vec<ChatMessage> {
    let mut system = String::from(SYSTEM_PROMPT);
    if request.system_validated {
        system.push_str(SYSTEM_VALIDATION_GUIDANCE);
    }
    system.push('\n');
    system.push_str(CONSERVATIVE_CLOSING);

    let user = format!(
        "Analyze the following support ticket for spam characteristics:\n\n\
         SUBJECT: {}\n\n\
         DESCRIPTION:\n{}\n\n\
         SENDER: {}\n\n\
         Provide your analysis in the specified JSON format.",
        request.subject, request.body, request.sender
    );

    vec![
        ChatMessage::new("system", system),
        ChatMessage::new("user", user),
    ]
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    is_spam: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default, alias = "indicators")]
    spam_indicators: Vec<String>,
}

/// Parses the JSON object spanning the first `{` to the last `}` of `raw`.
pub fn parse_verdict(raw: &str) -> Result<ClassificationResult, ClassifierError> {
    let raw = raw.trim();
    let json = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => {
            return Err(ClassifierError::MalformedOutput(
                "no JSON object in response".into(),
            ))
        }
    };

    let verdict: RawVerdict = serde_json::from_str(json)
        .map_err(|err| ClassifierError::MalformedOutput(err.to_string()))?;

    Ok(ClassificationResult {
        is_spam: verdict.is_spam,
        confidence: verdict.confidence.clamp(0.0, 1.0),
        reasoning: verdict
            .reasoning
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "No reasoning provided".to_string()),
        indicators: verdict.spam_indicators,
    })
}

/// Structured verdict when possible, lexical guess otherwise. Never fails.
pub fn interpret_response(raw: &str) -> ClassificationResult {
    match parse_verdict(raw) {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(target: "classifier", error = %err, "could not parse model output, using text fallback");
            tracing::debug!(target: "classifier", raw, "unparseable model output");
            lexical_fallback(raw)
        }
    }
}

fn lexical_fallback(raw: &str) -> ClassificationResult {
    let lowered = raw.to_lowercase();
    if lowered.contains("spam") && (lowered.contains("true") || lowered.contains("yes")) {
        ClassificationResult {
            is_spam: true,
            confidence: LEXICAL_FALLBACK_CONFIDENCE,
            reasoning: "Parsed from text response (JSON parsing failed)".to_string(),
            indicators: Vec::new(),
        }
    } else {
        ClassificationResult::not_spam("Could not parse response, defaulting to not spam")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(system_validated: bool) -> ClassificationRequest<'static> {
        ClassificationRequest {
            subject: "Account deletion",
            body: "Please delete my account",
            sender: "456",
            system_validated,
        }
    }

    #[test]
    fn prompt_embeds_ticket_fields() {
        let messages = build_messages(&request(false));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("\"is_spam\""));
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("SUBJECT: Account deletion"));
        assert!(messages[1].content.contains("Please delete my account"));
        assert!(messages[1].content.contains("SENDER: 456"));
    }

    #[test]
    fn validation_guidance_only_when_flagged() {
        let plain = build_messages(&request(false));
        assert!(!plain[0].content.contains("OVERWHELMING"));

        let validated = build_messages(&request(true));
        assert!(validated[0].content.contains("OVERWHELMING"));
        assert!(validated[0]
            .content
            .contains("USER INFORMATION WAS VALIDATED BY OUR SYSTEM"));
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let raw = r#"Sure! Here is my analysis:
        {"is_spam": true, "confidence": 0.92, "reasoning": "Prize scam", "spam_indicators": ["free iPhone"]}
        Hope that helps."#;
        let result = parse_verdict(raw).unwrap();
        assert!(result.is_spam);
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.reasoning, "Prize scam");
        assert_eq!(result.indicators, vec!["free iPhone".to_string()]);
    }

    #[test]
    fn accepts_indicators_alias_and_clamps_confidence() {
        let result =
            parse_verdict(r#"{"is_spam": true, "confidence": 1.7, "indicators": ["x"]}"#).unwrap();
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.indicators, vec!["x".to_string()]);
        assert_eq!(result.reasoning, "No reasoning provided");
    }

    #[test]
    fn missing_braces_is_malformed() {
        assert!(matches!(
            parse_verdict("spam: yes"),
            Err(ClassifierError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_verdict("} backwards {"),
            Err(ClassifierError::MalformedOutput(_))
        ));
    }

    #[test]
    fn text_fallback_detects_affirmative_spam() {
        let result = interpret_response("This is SPAM: yes, definitely");
        assert!(result.is_spam);
        assert_eq!(result.confidence, 0.5);
        assert!(result.reasoning.contains("JSON parsing failed"));

        let result = interpret_response("{is_spam: true, confidence: high}");
        assert!(result.is_spam);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn text_fallback_defaults_to_not_spam() {
        let result = interpret_response("I am not sure what this ticket is about.");
        assert!(!result.is_spam);
        assert_eq!(result.confidence, 0.0);

        let result = interpret_response("spam? no");
        assert!(!result.is_spam);
    }
}
