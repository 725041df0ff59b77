//! Reply classification for the reasoning endpoint.
//!
//! Precedence, first match wins:
//! 1. status 429
//! 2. body that is not a JSON object
//! 3. an `error` whose message contains `limit` or `quota`
//! 4. a non-blank `reply`
//! 5. anything else is an empty reply
//!
//! Transport failures never reach this function; the client maps them first.

use serde_json::Value;
use snapsage_core::DispatchOutcome;

/// Substrings of an upstream error message that mean the quota is exhausted.
/// Matched case-sensitively.
const QUOTA_MARKERS: [&str; 2] = ["limit", "quota"];

pub fn classify(status: u16, body: &str) -> DispatchOutcome {
    if status == 429 {
        return DispatchOutcome::QuotaExceeded;
    }

    let success = (200..300).contains(&status);
    let object = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) if success => {
            return DispatchOutcome::TransportError(format!(
                "unexpected reply: expected a JSON object, got {}",
                kind_of(&other)
            ));
        }
        Err(e) if success => {
            return DispatchOutcome::TransportError(format!("unreadable reply: {e}"));
        }
        _ => return DispatchOutcome::TransportError(format!("HTTP {status}")),
    };

    if let Some(message) = object.get("error").and_then(error_message) {
        if QUOTA_MARKERS.iter().any(|m| message.contains(m)) {
            return DispatchOutcome::QuotaExceeded;
        }
    }

    match object.get("reply").and_then(Value::as_str) {
        Some(reply) if !reply.trim().is_empty() => DispatchOutcome::Answer(reply.to_string()),
        _ => DispatchOutcome::EmptyUpstreamReply,
    }
}

/// `"error": "..."` or the OpenAI-style `"error": {"message": "..."}`.
fn error_message(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("message").and_then(Value::as_str),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer() {
        assert_eq!(
            classify(200, r#"{"reply":"Paris is the capital of France."}"#),
            DispatchOutcome::Answer("Paris is the capital of France.".into())
        );
    }

    #[test]
    fn test_quota_in_error_body() {
        assert_eq!(
            classify(500, r#"{"error":"monthly quota exceeded"}"#),
            DispatchOutcome::QuotaExceeded
        );
        assert_eq!(
            classify(200, r#"{"error":"rate limit reached for gpt-3.5-turbo"}"#),
            DispatchOutcome::QuotaExceeded
        );
        assert_eq!(
            classify(500, r#"{"error":{"message":"You exceeded your current quota"}}"#),
            DispatchOutcome::QuotaExceeded
        );
    }

    #[test]
    fn test_status_429_wins_over_body() {
        assert_eq!(
            classify(429, r#"{"error":"quota exhausted"}"#),
            DispatchOutcome::QuotaExceeded
        );
        assert_eq!(
            classify(429, r#"{"reply":"this should not be shown"}"#),
            DispatchOutcome::QuotaExceeded
        );
        assert_eq!(classify(429, "<html>Too Many Requests</html>"), DispatchOutcome::QuotaExceeded);
    }

    #[test]
    fn test_quota_match_is_case_sensitive() {
        assert_eq!(
            classify(500, r#"{"error":"QUOTA"}"#),
            DispatchOutcome::EmptyUpstreamReply
        );
    }

    #[test]
    fn test_error_beats_reply() {
        assert_eq!(
            classify(200, r#"{"error":"daily limit","reply":"hi"}"#),
            DispatchOutcome::QuotaExceeded
        );
    }

    #[test]
    fn test_non_quota_error_is_empty_reply() {
        assert_eq!(
            classify(500, r#"{"error":"Incorrect API key provided"}"#),
            DispatchOutcome::EmptyUpstreamReply
        );
    }

    #[test]
    fn test_blank_or_missing_reply() {
        assert_eq!(classify(200, r#"{"reply":"   "}"#), DispatchOutcome::EmptyUpstreamReply);
        assert_eq!(classify(200, r#"{}"#), DispatchOutcome::EmptyUpstreamReply);
        assert_eq!(classify(200, r#"{"reply":42}"#), DispatchOutcome::EmptyUpstreamReply);
    }

    #[test]
    fn test_unparseable_bodies() {
        assert_eq!(
            classify(502, "<html>Bad Gateway</html>"),
            DispatchOutcome::TransportError("HTTP 502".into())
        );
        assert_eq!(classify(404, "[]"), DispatchOutcome::TransportError("HTTP 404".into()));
        assert!(matches!(
            classify(200, "not json"),
            DispatchOutcome::TransportError(d) if d.starts_with("unreadable reply")
        ));
        assert!(matches!(
            classify(200, r#""just a string""#),
            DispatchOutcome::TransportError(d) if d.contains("a string")
        ));
    }

    #[test]
    fn test_reply_is_not_trimmed() {
        assert_eq!(
            classify(200, r#"{"reply":"  spaced  "}"#),
            DispatchOutcome::Answer("  spaced  ".into())
        );
    }
}
