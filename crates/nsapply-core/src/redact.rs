//! Secret redaction for external tool output.
//!
//! Infra tool output can echo sensitive variable values back verbatim (for
//! example `TF_VAR_*` inputs shown in a plan). Before surfacing output in
//! logs, values of sensitive-looking environment variables are replaced.

use regex::Regex;

const MASK: &str = "[REDACTED]";

// Values shorter than this are too likely to collide with ordinary output.
const MIN_SECRET_LEN: usize = 8;

fn sensitive_name() -> Regex {
    Regex::new(r"(?i)(token|secret|password|credential|_key)").unwrap()
}

/// Replace every occurrence of `values` in `output` with a mask.
pub fn redact_values<S: AsRef<str>>(output: &str, values: &[S]) -> String {
    let mut redacted = output.to_string();
    for value in values {
        let value = value.as_ref();
        if value.len() >= MIN_SECRET_LEN {
            redacted = redacted.replace(value, MASK);
        }
    }
    redacted
}

/// Redact values of sensitive-looking environment variables from `output`.
///
/// When `enabled` is false the output passes through untouched; the toggle
/// exists because redaction can mangle legitimate output that happens to
/// contain a secret-like substring.
pub fn redact_env(output: &str, enabled: bool) -> String {
    if !enabled {
        return output.to_string();
    }

    let name_pattern = sensitive_name();
    let secrets: Vec<String> = std::env::vars()
        .filter(|(name, _)| name_pattern.is_match(name))
        .map(|(_, value)| value)
        .collect();

    redact_values(output, &secrets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_values_masks_occurrences() {
        let output = "connecting with token hunter2hunter2 to cluster";
        let redacted = redact_values(output, &["hunter2hunter2"]);
        assert_eq!(redacted, "connecting with token [REDACTED] to cluster");
    }

    #[test]
    fn test_short_values_left_alone() {
        // Masking short values would shred output full of common substrings.
        let output = "deployment ok in 3s";
        assert_eq!(redact_values(output, &["ok"]), output);
    }

    #[test]
    fn test_disabled_passes_through() {
        let output = "raw tool output";
        assert_eq!(redact_env(output, false), output);
    }

    #[test]
    fn test_enabled_masks_env_secret_values() {
        // Unique name so parallel tests never see or clobber it.
        let name = "NSAPPLY_REDACT_TEST_TOKEN";
        std::env::set_var(name, "s3cr3t-value-42");

        let output = "provider auth: s3cr3t-value-42 (from env)";
        let redacted = redact_env(output, true);
        std::env::remove_var(name);

        assert_eq!(redacted, "provider auth: [REDACTED] (from env)");
    }

    #[test]
    fn test_sensitive_name_pattern() {
        let pattern = sensitive_name();
        assert!(pattern.is_match("TF_VAR_github_token"));
        assert!(pattern.is_match("SLACK_BOT_TOKEN"));
        assert!(pattern.is_match("AWS_SECRET_ACCESS_KEY"));
        assert!(pattern.is_match("DB_PASSWORD"));
        assert!(!pattern.is_match("HOME"));
        assert!(!pattern.is_match("CLUSTER_DIR"));
    }
}
