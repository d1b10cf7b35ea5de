//! Configuration loading, validation, and env substitution for secure data bags.
//!
//! Config files: `secure-bag.toml`, `secure-bag.yaml`, or `secure-bag.json`
//! Searched in `./` then `~/.config/secure-bag/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config, parse_config},
    schema::{
        AES_256_CBC, DEFAULT_ENCODED_FIELDS, EncodingConfig, KNOWN_CIPHERS, SecretConfig,
        SecureBagConfig, XCHACHA20_POLY1305,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_config},
};
