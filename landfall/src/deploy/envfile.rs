//! Env file substitution
//!
//! Pure text transforms over dotenv-style files. A substitution anchors
//! on the `KEY=` prefix of a line, replaces the whole first matching line
//! and leaves any later lines with the same key untouched. Output is
//! always newline-terminated.

/// Set a key to a value, replacing the first `KEY=` line or appending
/// one when the key is absent. Idempotent.
pub fn set_key(contents: &str, key: &str, value: &str) -> String {
    let rendered = format!("{}={}", key, format_value(value));
    let prefix = format!("{}=", key);

    let mut replaced = false;
    let mut out: Vec<String> = Vec::new();
    for line in contents.lines() {
        if !replaced && line.starts_with(&prefix) {
            out.push(rendered.clone());
            replaced = true;
        } else {
            out.push(line.to_string());
        }
    }
    if !replaced {
        out.push(rendered);
    }

    let mut result = out.join("\n");
    result.push('\n');
    result
}

/// Apply a set of substitutions in order
pub fn apply(contents: &str, substitutions: &[(String, String)]) -> String {
    substitutions
        .iter()
        .fold(contents.to_string(), |acc, (key, value)| {
            set_key(&acc, key, value)
        })
}

/// Values with whitespace, comments or quote characters get double-quoted
fn format_value(value: &str) -> String {
    let needs_quotes = !value.is_empty()
        && value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\'));
    if !needs_quotes {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_key_replaces_line() {
        let env = "APP_NAME=Laravel\nAPP_ENV=local\nAPP_DEBUG=true\n";
        let out = set_key(env, "APP_ENV", "production");
        assert_eq!(out, "APP_NAME=Laravel\nAPP_ENV=production\nAPP_DEBUG=true\n");
    }

    #[test]
    fn test_set_key_first_match_only() {
        let env = "DB_HOST=127.0.0.1\nDB_HOST=localhost\n";
        let out = set_key(env, "DB_HOST", "db.internal");
        assert_eq!(out, "DB_HOST=db.internal\nDB_HOST=localhost\n");
    }

    #[test]
    fn test_set_key_appends_when_absent() {
        let env = "APP_NAME=Laravel\n";
        let out = set_key(env, "APP_KEY", "base64:abc");
        assert_eq!(out, "APP_NAME=Laravel\nAPP_KEY=base64:abc\n");
    }

    #[test]
    fn test_set_key_is_idempotent() {
        let env = "APP_ENV=local\nDB_HOST=x\n";
        let once = set_key(env, "APP_ENV", "production");
        let twice = set_key(&once, "APP_ENV", "production");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_key_does_not_match_prefixes_or_comments() {
        let env = "# APP_ENV=commented\nAPP_ENV_SUFFIX=x\nAPP_ENV=local\n";
        let out = set_key(env, "APP_ENV", "production");
        assert_eq!(
            out,
            "# APP_ENV=commented\nAPP_ENV_SUFFIX=x\nAPP_ENV=production\n"
        );
    }

    #[test]
    fn test_value_quoting() {
        let out = set_key("", "DB_PASSWORD", "p@ss word#1");
        assert_eq!(out, "DB_PASSWORD=\"p@ss word#1\"\n");

        let out = set_key("", "DB_PASSWORD", "a\"b\\c");
        assert_eq!(out, "DB_PASSWORD=\"a\\\"b\\\\c\"\n");

        let out = set_key("", "APP_ENV", "production");
        assert_eq!(out, "APP_ENV=production\n");
    }

    #[test]
    fn test_apply_is_order_independent() {
        let env = "APP_ENV=local\nAPP_URL=http://localhost\n";
        let subs_a = vec![
            ("APP_ENV".to_string(), "production".to_string()),
            ("APP_URL".to_string(), "http://shop.example.com".to_string()),
        ];
        let subs_b: Vec<_> = subs_a.iter().cloned().rev().collect();
        assert_eq!(apply(env, &subs_a), apply(env, &subs_b));
    }
}
