//! Log Redaction
//!
//! Scrubs API keys and bearer tokens from strings before they reach a log.
//! Upstream provider errors sometimes echo the request headers back.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[A-Za-z0-9_\-]{16,})|(Bearer\s+[A-Za-z0-9\-\._~+/]+=*)").unwrap()
});

static KEY_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)("?api[_-]?key"?\s*[:=]\s*"?)[^"&\s,}]+"#).unwrap());

pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    KEY_PARAM_RE
        .replace_all(&redacted, "${1}[REDACTED_TOKEN]")
        .into_owned()
}
