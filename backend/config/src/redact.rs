//! Produce a display-safe copy of the config with secrets masked.

use serde_json::Value;

/// Keys whose string values are always masked.
static SENSITIVE_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "token",
    "accessToken",
    "secret",
    "password",
];

/// Replace every sensitive string with its first four characters plus `***`.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask(s: &str) -> String {
    if s.chars().count() > 8 {
        format!("{}***", s.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive_key(key) && !s.is_empty() => Value::String(mask(s)),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_recursive(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_relay_api_key() {
        let v = json!({ "relay": { "apiKey": "sk-abcdef123456" } });
        let key = redact(&v)["relay"]["apiKey"].as_str().unwrap().to_string();
        assert_eq!(key, "sk-a***");
    }

    #[test]
    fn short_secrets_are_fully_masked() {
        let v = json!({ "recognizer": { "vision": { "apiKey": "abc" } } });
        assert_eq!(redact(&v)["recognizer"]["vision"]["apiKey"], "***");
    }

    #[test]
    fn passthrough_non_sensitive() {
        let v = json!({ "dispatch": { "endpoint": "http://localhost:5000/chat" } });
        assert_eq!(redact(&v)["dispatch"]["endpoint"], "http://localhost:5000/chat");
    }
}
