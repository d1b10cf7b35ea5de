//! Shared secret resolution.
//!
//! A secret source is a literal string, a local path, or a `scheme://` URI.
//! Resolution is blocking and uncached; [`SecureDataBagItem`] memoizes the
//! result for its own lifetime.
//!
//! [`SecureDataBagItem`]: crate::item::SecureDataBagItem

use std::{fmt, path::PathBuf, time::Duration};

use {secure_bag_config::SecretConfig, url::Url, zeroize::Zeroizing};

use crate::error::{Error, Result};

/// Resolved secret key material. Zeroed on drop, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<Vec<u8>>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED; {}])", self.0.len())
    }
}

impl From<&str> for SecretKey {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<Vec<u8>> for SecretKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Where secret bytes come from.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// The secret itself, as given on the command line.
    Literal(Zeroizing<String>),
    Path(PathBuf),
    Uri(Url),
}

impl SecretSource {
    /// Classify a location string: `scheme://...` is a URI, anything else a path.
    pub fn parse(location: &str) -> Result<Self> {
        if !has_scheme(location) {
            return Ok(Self::Path(PathBuf::from(location)));
        }
        Url::parse(location)
            .map(Self::Uri)
            .map_err(|e| Error::SecretUnavailable {
                location: location.to_string(),
                reason: format!("invalid uri: {e}"),
            })
    }

    pub fn literal(secret: impl Into<String>) -> Self {
        Self::Literal(Zeroizing::new(secret.into()))
    }

    /// Human-readable location used in error messages. Never the secret itself.
    pub fn location(&self) -> String {
        match self {
            Self::Literal(_) => "<literal secret>".to_string(),
            Self::Path(p) => p.display().to_string(),
            Self::Uri(u) => u.to_string(),
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Path(_) => "path",
            Self::Uri(_) => "uri",
        }
    }
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("Literal([REDACTED])"),
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Uri(u) => f.debug_tuple("Uri").field(&u.as_str()).finish(),
        }
    }
}

/// `^\w+://`
fn has_scheme(location: &str) -> bool {
    location.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Resolves secret sources into key bytes.
#[derive(Debug, Clone)]
pub struct SecretResolver {
    default_source: Option<String>,
    fetch_timeout: Duration,
    connect_timeout: Duration,
}

impl Default for SecretResolver {
    fn default() -> Self {
        Self::from_config(&SecretConfig::default())
    }
}

impl SecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SecretConfig) -> Self {
        Self {
            default_source: config
                .path
                .clone()
                .filter(|p| !p.trim().is_empty()),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    /// Source used when the caller names none.
    #[must_use]
    pub fn with_default_source(mut self, location: impl Into<String>) -> Self {
        self.default_source = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, fetch: Duration, connect: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.connect_timeout = connect;
        self
    }

    pub fn default_source(&self) -> Option<&str> {
        self.default_source.as_deref()
    }

    /// Resolve a path or URI, falling back to the configured default.
    pub fn resolve(&self, location: Option<&str>) -> Result<SecretKey> {
        let location = location
            .or(self.default_source.as_deref())
            .ok_or(Error::SecretMissing)?;
        self.resolve_source(&SecretSource::parse(location)?)
    }

    /// Resolve an already classified source.
    pub fn resolve_source(&self, source: &SecretSource) -> Result<SecretKey> {
        #[cfg(feature = "tracing")]
        tracing::debug!(kind = source.kind(), location = %source.location(), "resolving secret");

        let raw = match source {
            SecretSource::Literal(secret) => Zeroizing::new(secret.as_bytes().to_vec()),
            SecretSource::Path(path) => read_file(path)?,
            SecretSource::Uri(url) => self.fetch(url)?,
        };

        let key = SecretKey::new(raw.trim_ascii());
        if key.is_empty() {
            return Err(Error::InvalidSecret {
                location: source.location(),
            });
        }
        Ok(key)
    }

    fn fetch(&self, url: &Url) -> Result<Zeroizing<Vec<u8>>> {
        match url.scheme() {
            "http" | "https" => self.fetch_http(url),
            "file" => {
                let path = url.to_file_path().map_err(|()| Error::SecretUnavailable {
                    location: url.to_string(),
                    reason: "not a local file uri".into(),
                })?;
                read_file(&path)
            },
            scheme => Err(Error::SecretUnavailable {
                location: url.to_string(),
                reason: format!("unsupported scheme '{scheme}'"),
            }),
        }
    }

    /// Blocking GET. Must not be called from inside an async runtime.
    fn fetch_http(&self, url: &Url) -> Result<Zeroizing<Vec<u8>>> {
        let unavailable = |reason: String| Error::SecretUnavailable {
            location: url.to_string(),
            reason,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.fetch_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| unavailable(format!("failed to build http client: {e}")))?;

        let response = client
            .get(url.clone())
            .send()
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            #[cfg(feature = "tracing")]
            tracing::debug!(%status, "secret fetch returned non-success status");
            return Err(Error::SecretNotFound {
                location: url.to_string(),
            });
        }

        let body = response.bytes().map_err(|e| unavailable(e.to_string()))?;
        Ok(Zeroizing::new(body.to_vec()))
    }
}

fn read_file(path: &std::path::Path) -> Result<Zeroizing<Vec<u8>>> {
    if !path.exists() {
        return Err(Error::SecretNotFound {
            location: path.display().to_string(),
        });
    }
    std::fs::read(path)
        .map(Zeroizing::new)
        .map_err(|e| Error::SecretUnavailable {
            location: path.display().to_string(),
            reason: e.to_string(),
        })
}
