// The patterns below are literals; a failure to compile them is a programming error.
#![allow(clippy::expect_used)]

use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern");
    static ref PHONE_REGEX: Regex =
        Regex::new(r"(?:\+1[-.\s]?)?\(?\b[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b").expect("phone pattern");
    static ref SSN_REGEX: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern");
    static ref DATE_REGEX: Regex = Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("date pattern");
}

pub const REDACTED: &str = "[REDACTED]";

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_ssn: bool,
    pub redact_dates: bool,
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_ssn: true,
            redact_dates: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// PII redactor for log messages and documents about to be logged
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_emails {
            result = self.replace(&EMAIL_REGEX, &result, "EMAIL");
        }

        if self.config.redact_ssn {
            result = self.replace(&SSN_REGEX, &result, "SSN");
        }

        // Dates before phones: an ISO date would otherwise partially match the phone pattern.
        if self.config.redact_dates {
            result = self.replace(&DATE_REGEX, &result, "DATE");
        }

        if self.config.redact_phones {
            result = self.replace(&PHONE_REGEX, &result, "PHONE");
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    /// Copy of `document` with the named fields blanked out, at any depth.
    ///
    /// Remaining string values still go through [`PiiRedactor::redact`], so free
    /// text that happens to contain an e-mail address does not leak either.
    pub fn redact_document(&self, document: &Value, sensitive_fields: &[&str]) -> Value {
        let names: HashSet<&str> = sensitive_fields.iter().copied().collect();
        self.redact_value(document, &names)
    }

    fn redact_value(&self, value: &Value, names: &HashSet<&str>) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, inner)| {
                        let redacted = if names.contains(key.as_str()) && !inner.is_null() {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact_value(inner, names)
                        };
                        (key.clone(), redacted)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items.iter().map(|item| self.redact_value(item, names)).collect(),
            ),
            Value::String(text) => Value::String(self.redact(text)),
            other => other.clone(),
        }
    }

    fn replace(&self, pattern: &Regex, text: &str, label: &str) -> String {
        pattern
            .replace_all(text, |caps: &regex::Captures| {
                if self.config.hash_for_correlation {
                    format!("{}[{}]", label, self.hash_value(&caps[0]))
                } else {
                    format!("{label}{REDACTED}")
                }
            })
            .to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD.encode(&result[..8]) // Use first 8 bytes for shorter hash
    }
}
