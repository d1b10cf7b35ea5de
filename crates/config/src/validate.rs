//! Configuration validation.
//!
//! Flags unknown/misspelled keys in TOML files and semantic problems in a
//! parsed [`SecureBagConfig`] (unknown cipher, zero timeouts, empty fields).

use std::{collections::HashSet, path::Path};

use crate::schema::{KNOWN_CIPHERS, SecureBagConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "cipher", "secret",
    /// "fields", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "encoding.cipher"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Turn error diagnostics into an [`Error::Invalid`](crate::Error::Invalid).
    pub fn into_result(self) -> crate::Result<()> {
        if self.has_errors() {
            let errors = self
                .diagnostics
                .into_iter()
                .filter(|d| d.severity == Severity::Error)
                .collect();
            return Err(crate::Error::Invalid(errors));
        }
        Ok(())
    }
}

/// Known keys per table, mirroring `schema.rs`.
const TOP_LEVEL_KEYS: &[&str] = &["secret", "encoding"];
const SECRET_KEYS: &[&str] = &["path", "fetch_timeout_secs", "connect_timeout_secs"];
const ENCODING_KEYS: &[&str] = &["cipher", "encoded_fields"];

fn table_keys(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "secret" => Some(SECRET_KEYS),
        "encoding" => Some(ENCODING_KEYS),
        _ => None,
    }
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn unknown_field(path: String, key: &str, candidates: &[&str]) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".to_string(),
    };
    Diagnostic {
        severity: Severity::Error,
        category: "unknown-field",
        path,
        message,
    }
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered config file
/// if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = if is_toml {
        match std::fs::read_to_string(&actual_path) {
            Ok(content) => validate_toml_str(&crate::env_subst::substitute_env(&content)),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: format!("failed to read config file: {e}"),
                }],
                config_path: None,
            },
        }
    } else {
        match crate::loader::load_config(&actual_path) {
            Ok(config) => validate_config(&config),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: e.to_string(),
                }],
                config_path: None,
            },
        }
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    if let Some(table) = toml_value.as_table() {
        for (key, value) in table {
            let Some(known) = table_keys(key) else {
                diagnostics.push(unknown_field(key.clone(), key, TOP_LEVEL_KEYS));
                continue;
            };
            if let Some(sub) = value.as_table() {
                for sub_key in sub.keys() {
                    if !known.contains(&sub_key.as_str()) {
                        diagnostics.push(unknown_field(format!("{key}.{sub_key}"), sub_key, known));
                    }
                }
            }
        }
    }

    match toml::from_str::<SecureBagConfig>(toml_str) {
        Ok(config) => diagnostics.extend(validate_config(&config).diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an already parsed config.
#[must_use]
pub fn validate_config(config: &SecureBagConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let cipher = config.encoding.cipher.as_str();
    if cipher.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "cipher",
            path: "encoding.cipher".into(),
            message: "cipher must not be empty".into(),
        });
    } else if !KNOWN_CIPHERS.contains(&cipher) {
        let message = match suggest(cipher, KNOWN_CIPHERS, 4) {
            Some(s) => format!("unsupported cipher \"{cipher}\" (did you mean \"{s}\"?)"),
            None => format!(
                "unsupported cipher \"{cipher}\" (expected one of: {})",
                KNOWN_CIPHERS.join(", ")
            ),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "cipher",
            path: "encoding.cipher".into(),
            message,
        });
    }

    for (path, value) in [
        ("secret.fetch_timeout_secs", config.secret.fetch_timeout_secs),
        (
            "secret.connect_timeout_secs",
            config.secret.connect_timeout_secs,
        ),
    ] {
        if value == 0 {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "secret",
                path: path.into(),
                message: "timeout must be greater than zero".into(),
            });
        }
    }

    if config
        .secret
        .path
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "secret",
            path: "secret.path".into(),
            message: "empty secret path is treated as no default secret".into(),
        });
    }

    let mut seen = HashSet::new();
    for (idx, field) in config.encoding.encoded_fields.iter().enumerate() {
        let path = format!("encoding.encoded_fields[{idx}]");
        if field.is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "fields",
                path,
                message: "field name must not be empty".into(),
            });
        } else if !seen.insert(field.as_str()) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "fields",
                path,
                message: format!("duplicate field \"{field}\" is ignored"),
            });
        }
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("cipher", "cipher"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("ciphr", "cipher"), 1);
        assert_eq!(levenshtein("path", "bath"), 1);
    }

    #[test]
    fn empty_config_is_valid() {
        let result = validate_toml_str("");
        assert!(
            !result.has_errors(),
            "empty config should be valid, got: {:?}",
            result.diagnostics
        );
    }

    #[test]
    fn full_valid_config_no_diagnostics() {
        let toml = r#"
[secret]
path = "/etc/chef/encrypted_data_bag_secret"
fetch_timeout_secs = 10
connect_timeout_secs = 2

[encoding]
cipher = "aes-256-cbc"
encoded_fields = ["password", "api_token"]
"#;
        let result = validate_toml_str(toml);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn syntax_error_detected() {
        let result = validate_toml_str("this is not valid toml [[[");
        assert!(result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.category == "syntax"));
    }

    #[test]
    fn unknown_top_level_key_with_suggestion() {
        let result = validate_toml_str("[secrt]\npath = \"x\"\n");
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.category == "unknown-field")
            .unwrap();
        assert_eq!(d.path, "secrt");
        assert!(d.message.contains("\"secret\""));
    }

    #[test]
    fn unknown_nested_key_with_suggestion() {
        let result = validate_toml_str("[encoding]\nciper = \"aes-256-cbc\"\n");
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.category == "unknown-field")
            .unwrap();
        assert_eq!(d.path, "encoding.ciper");
        assert!(d.message.contains("\"cipher\""));
    }

    #[test]
    fn unknown_cipher_is_error() {
        let result = validate_toml_str("[encoding]\ncipher = \"aes-256-cbd\"\n");
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.category == "cipher")
            .unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert!(d.message.contains("aes-256-cbc"));
    }

    #[test]
    fn zero_timeout_is_error() {
        let result = validate_toml_str("[secret]\nfetch_timeout_secs = 0\n");
        assert!(result.has_errors());
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.path == "secret.fetch_timeout_secs")
        );
    }

    #[test]
    fn duplicate_field_warned() {
        let mut config = SecureBagConfig::default();
        config.encoding.encoded_fields = vec!["password".into(), "password".into()];
        let result = validate_config(&config);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn empty_field_is_error() {
        let mut config = SecureBagConfig::default();
        config.encoding.encoded_fields = vec![String::new()];
        let err = validate_config(&config).into_result().unwrap_err();
        assert!(matches!(err, crate::Error::Invalid(ref d) if d.len() == 1));
    }

    #[test]
    fn type_error_detected() {
        let result = validate_toml_str("[secret]\nfetch_timeout_secs = \"soon\"\n");
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[test]
    fn validate_explicit_json_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secure-bag.json");
        std::fs::write(&path, r#"{"encoding": {"cipher": "rot13"}}"#).unwrap();

        let result = validate(Some(&path));
        assert!(result.has_errors());
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
    }
}
