//! Secure data bag item: a named record whose selected fields are encrypted
//! at rest.
//!
//! The body held in memory is always plaintext. Construction from stored
//! data decodes immediately; the storable forms are produced on demand and
//! never written back into the body.

use std::{fmt, path::Path};

use {secure_bag_config::SecureBagConfig, zeroize::Zeroizing};

use crate::{
    encryption::Encryption,
    error::{Error, Result},
    legacy,
    secret::{SecretKey, SecretResolver, SecretSource},
    value::{Record, Value},
    walker,
};

/// `chef_type` written on every storable form.
pub const CHEF_TYPE: &str = "data_bag_item";

/// `json_class` of the full item document.
pub const JSON_CLASS: &str = "Chef::DataBagItem";

const CHEF_TYPE_KEY: &str = "chef_type";
const DATA_BAG_KEY: &str = "data_bag";
const ID_KEY: &str = "id";

/// Everything an item needs besides its data.
///
/// Key precedence: an explicit `key` is used as is; otherwise a literal
/// `secret` wins over `secret_file`, which wins over the resolver's default
/// source.
#[derive(Clone, Default)]
pub struct ItemOptions {
    pub key: Option<SecretKey>,
    pub secret: Option<Zeroizing<String>>,
    pub secret_file: Option<String>,
    pub encoded_fields: Vec<String>,
    pub cipher: Option<String>,
    pub resolver: SecretResolver,
}

impl ItemOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver and encoding defaults taken from a loaded config.
    pub fn from_config(config: &SecureBagConfig) -> Self {
        Self {
            encoded_fields: config.encoding.encoded_fields.clone(),
            cipher: Some(config.encoding.cipher.clone()),
            resolver: SecretResolver::from_config(&config.secret),
            ..Self::default()
        }
    }

    /// Load and validate a config file, then build options from it.
    ///
    /// Validation warnings are ignored; any error diagnostic fails the load.
    pub fn load(path: &Path) -> Result<Self> {
        let config = secure_bag_config::load_config(path)?;
        secure_bag_config::validate_config(&config).into_result()?;
        Ok(Self::from_config(&config))
    }

    #[must_use]
    pub fn with_key(mut self, key: SecretKey) -> Self {
        self.key = Some(key);
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Zeroizing::new(secret.into()));
        self
    }

    #[must_use]
    pub fn with_secret_file(mut self, location: impl Into<String>) -> Self {
        self.secret_file = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_encoded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encoded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_cipher(mut self, cipher: impl Into<String>) -> Self {
        self.cipher = Some(cipher.into());
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: SecretResolver) -> Self {
        self.resolver = resolver;
        self
    }
}

impl fmt::Debug for ItemOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemOptions")
            .field("key", &self.key)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("secret_file", &self.secret_file)
            .field("encoded_fields", &self.encoded_fields)
            .field("cipher", &self.cipher)
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// A data bag item with field-level encryption.
pub struct SecureDataBagItem {
    data_bag: String,
    body: Record,
    key: Option<SecretKey>,
    secret: Option<Zeroizing<String>>,
    secret_file: Option<String>,
    encryption: Encryption,
    resolver: SecretResolver,
}

impl SecureDataBagItem {
    /// Wrap a plaintext body for writing.
    pub fn new(data_bag: impl Into<String>, body: Record, options: ItemOptions) -> Self {
        let mut encryption = Encryption::new(
            options
                .cipher
                .unwrap_or_else(|| secure_bag_config::AES_256_CBC.to_string()),
        );
        encryption.set_encoded_fields(options.encoded_fields);

        Self {
            data_bag: data_bag.into(),
            body: strip_bookkeeping(body),
            key: options.key,
            secret: options.secret,
            secret_file: options.secret_file,
            encryption,
            resolver: options.resolver,
        }
    }

    /// Load a stored record, decoding it right away.
    ///
    /// The key is resolved only if the record holds encrypted material, so
    /// plaintext items load without any secret configured.
    pub fn from_stored(
        data_bag: impl Into<String>,
        stored: Record,
        options: ItemOptions,
    ) -> Result<Self> {
        let mut item = Self::new(data_bag, Record::new(), options);
        item.set_body(stored)?;
        Ok(item)
    }

    /// Like [`from_stored`](Self::from_stored), but also accepts a body that
    /// was sealed whole into a single encrypted value.
    ///
    /// The opened value must be a mapping.
    pub fn from_stored_value(
        data_bag: impl Into<String>,
        stored: Value,
        options: ItemOptions,
    ) -> Result<Self> {
        let mut item = Self::new(data_bag, Record::new(), options);
        let stored = match stored {
            Value::Mapping(record) => record,
            sealed @ Value::Encrypted(_) => {
                let key = item.key()?.clone();
                match walker::decode_value(sealed, &key)? {
                    Value::Mapping(record) => record,
                    _ => {
                        return Err(Error::MalformedRecord(
                            "decrypted item body is not a mapping".into(),
                        ));
                    },
                }
            },
            _ => {
                return Err(Error::MalformedRecord("item body must be a mapping".into()));
            },
        };
        item.set_body(stored)?;
        Ok(item)
    }

    /// Load a full item document (`{data_bag, raw_data, ...}`).
    pub fn from_item_json(item: serde_json::Value, options: ItemOptions) -> Result<Self> {
        let serde_json::Value::Object(mut map) = item else {
            return Err(Error::MalformedRecord("item document must be a mapping".into()));
        };
        let data_bag = match map.remove(DATA_BAG_KEY) {
            Some(serde_json::Value::String(bag)) => bag,
            _ => {
                return Err(Error::MalformedRecord(
                    "item document lacks a 'data_bag' string".into(),
                ));
            },
        };
        let raw_data = map
            .remove("raw_data")
            .ok_or_else(|| Error::MalformedRecord("item document lacks 'raw_data'".into()))?;
        Self::from_stored_value(data_bag, Value::try_from(raw_data)?, options)
    }

    /// Replace the body with `stored`, decoding it first.
    ///
    /// On failure the current body is left as it was.
    pub fn set_body(&mut self, stored: Record) -> Result<()> {
        let stored = strip_bookkeeping(stored);
        if !legacy::is_legacy(&stored) && !stored.contains_encrypted() {
            self.body = stored;
            return Ok(());
        }

        let key = self.key()?.clone();
        let (stored, envelope) = legacy::decode(stored, &key)?;
        let body = walker::decode(stored, &key)?;
        if let Some(envelope) = envelope {
            self.encryption = envelope;
        }
        self.body = body;
        Ok(())
    }

    /// The secret key, resolved on first use and cached for the item's life.
    pub fn key(&mut self) -> Result<&SecretKey> {
        let key = match self.key.take() {
            Some(key) => key,
            None => self.load_key()?,
        };
        Ok(self.key.insert(key))
    }

    fn load_key(&self) -> Result<SecretKey> {
        match &self.secret {
            Some(secret) => self
                .resolver
                .resolve_source(&SecretSource::Literal(secret.clone())),
            None => self.resolver.resolve(self.secret_file.as_deref()),
        }
    }

    /// Use `key` directly, skipping resolution.
    pub fn set_key(&mut self, key: SecretKey) {
        self.key = Some(key);
    }

    /// Takes effect only if the key has not been resolved yet.
    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = Some(Zeroizing::new(secret.into()));
    }

    /// Takes effect only if the key has not been resolved yet.
    pub fn set_secret_file(&mut self, location: impl Into<String>) {
        self.secret_file = Some(location.into());
    }

    pub fn encoded_fields(&self) -> &[String] {
        &self.encryption.encoded_fields
    }

    pub fn set_encoded_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encryption.set_encoded_fields(fields);
    }

    pub fn effective_fields(&self) -> Vec<String> {
        self.encryption.effective_fields()
    }

    pub fn cipher(&self) -> &str {
        &self.encryption.cipher
    }

    pub fn set_cipher(&mut self, cipher: impl Into<String>) {
        self.encryption.cipher = cipher.into();
    }

    pub fn encryption(&self) -> &Encryption {
        &self.encryption
    }

    pub fn describe(&self) -> serde_json::Value {
        self.encryption.describe()
    }

    pub fn body(&self) -> &Record {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Record {
        &mut self.body
    }

    pub fn into_body(self) -> Record {
        self.body
    }

    pub fn data_bag(&self) -> &str {
        &self.data_bag
    }

    pub fn id(&self) -> Option<&str> {
        self.body.get(ID_KEY).and_then(Value::as_str)
    }

    /// `data_bag_item_<bag>_<id>`.
    pub fn object_name(&self) -> Result<String> {
        let id = self
            .id()
            .ok_or_else(|| Error::MalformedRecord("item has no string 'id'".into()))?;
        Ok(format!("data_bag_item_{}_{id}", self.data_bag))
    }

    /// The body with every selected field encrypted. The body is not touched.
    pub fn encode_body(&mut self) -> Result<Record> {
        let key = self.key()?.clone();
        walker::encode(self.body.clone(), &key, &self.encryption)
    }

    /// Encoded body plus `chef_type` and `data_bag`, ready for the store.
    pub fn to_storable(&mut self) -> Result<Record> {
        let encoded = self.encode_body()?;
        Ok(self.with_bookkeeping(encoded))
    }

    /// Storable form in the whole-record format.
    pub fn to_legacy_storable(&mut self) -> Result<Record> {
        let key = self.key()?.clone();
        let (encoded, written) = legacy::encode(self.body.clone(), &key, &self.encryption)?;
        self.encryption.iv = written.iv;
        Ok(self.with_bookkeeping(encoded))
    }

    /// Full item document: `{name, json_class, chef_type, data_bag, raw_data}`.
    pub fn to_item_json(&mut self) -> Result<serde_json::Value> {
        let name = self.object_name()?;
        let raw_data = self.encode_body()?;
        Ok(serde_json::json!({
            "name": name,
            "json_class": JSON_CLASS,
            "chef_type": CHEF_TYPE,
            "data_bag": self.data_bag,
            "raw_data": raw_data.into_json(),
        }))
    }

    fn with_bookkeeping(&self, mut record: Record) -> Record {
        record.insert(CHEF_TYPE_KEY, CHEF_TYPE);
        record.insert(DATA_BAG_KEY, self.data_bag.as_str());
        record
    }
}

impl fmt::Debug for SecureDataBagItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureDataBagItem")
            .field("data_bag", &self.data_bag)
            .field("id", &self.id())
            .field("key", &self.key)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("secret_file", &self.secret_file)
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}

fn strip_bookkeeping(mut record: Record) -> Record {
    record.remove(CHEF_TYPE_KEY);
    record.remove(DATA_BAG_KEY);
    record
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json, std::io::Write};

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    fn secret_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn with_secret(secret: &str) -> ItemOptions {
        ItemOptions::new().with_secret(secret)
    }

    #[test]
    fn storable_form_has_bookkeeping_and_encrypted_fields() {
        let mut item = SecureDataBagItem::new(
            "apps",
            record(json!({"id": "db", "password": "x", "user": "u"})),
            with_secret("s3cret"),
        );

        let stored = item.to_storable().unwrap().into_json();
        assert_eq!(stored["chef_type"], "data_bag_item");
        assert_eq!(stored["data_bag"], "apps");
        assert_eq!(stored["user"], "u");
        assert!(stored["password"]["encrypted_data"].is_string());

        // The in-memory body stays plaintext.
        assert_eq!(item.body().get("password"), Some(&Value::from("x")));
    }

    #[test]
    fn from_stored_decodes_and_strips_bookkeeping() {
        let plain = json!({"id": "db", "password": "x", "nested": {"password": 1}});
        let mut writer = SecureDataBagItem::new("apps", record(plain.clone()), with_secret("k"));
        let stored = writer.to_storable().unwrap();

        let reader = SecureDataBagItem::from_stored("apps", stored, with_secret("k")).unwrap();
        assert_eq!(reader.body().clone().into_json(), plain);
    }

    #[test]
    fn plaintext_load_needs_no_secret() {
        let item = SecureDataBagItem::from_stored(
            "apps",
            record(json!({"id": "db", "user": "u", "chef_type": "data_bag_item"})),
            ItemOptions::new(),
        )
        .unwrap();
        assert_eq!(item.body().clone().into_json(), json!({"id": "db", "user": "u"}));
    }

    #[test]
    fn encrypted_load_without_secret_is_missing() {
        let mut writer = SecureDataBagItem::new(
            "apps",
            record(json!({"password": "x"})),
            with_secret("k"),
        );
        let stored = writer.to_storable().unwrap();

        let result = SecureDataBagItem::from_stored("apps", stored, ItemOptions::new());
        assert!(matches!(result, Err(Error::SecretMissing)));
    }

    #[test]
    fn literal_secret_beats_secret_file() {
        let file = secret_file("from-file\n");
        let options = ItemOptions::new()
            .with_secret("literal")
            .with_secret_file(file.path().to_str().unwrap());
        let mut item = SecureDataBagItem::new("apps", Record::new(), options);
        assert_eq!(item.key().unwrap().as_bytes(), b"literal");
    }

    #[test]
    fn secret_file_beats_resolver_default() {
        let file = secret_file("  from-file \n");
        let default = secret_file("from-default");
        let options = ItemOptions::new()
            .with_secret_file(file.path().to_str().unwrap())
            .with_resolver(
                SecretResolver::new().with_default_source(default.path().to_str().unwrap()),
            );
        let mut item = SecureDataBagItem::new("apps", Record::new(), options);
        assert_eq!(item.key().unwrap().as_bytes(), b"from-file");
    }

    #[test]
    fn resolver_default_used_last() {
        let default = secret_file("from-default");
        let options = ItemOptions::new().with_resolver(
            SecretResolver::new().with_default_source(default.path().to_str().unwrap()),
        );
        let mut item = SecureDataBagItem::new("apps", Record::new(), options);
        assert_eq!(item.key().unwrap().as_bytes(), b"from-default");
    }

    #[test]
    fn key_is_memoized() {
        let file = secret_file("first");
        let mut item = SecureDataBagItem::new(
            "apps",
            Record::new(),
            ItemOptions::new().with_secret_file(file.path().to_str().unwrap()),
        );
        assert_eq!(item.key().unwrap().as_bytes(), b"first");

        // Neither a new source nor a deleted file affects the cached key.
        item.set_secret("second");
        item.set_secret_file("/nonexistent/secret");
        drop(file);
        assert_eq!(item.key().unwrap().as_bytes(), b"first");

        item.set_key(SecretKey::from("explicit"));
        assert_eq!(item.key().unwrap().as_bytes(), b"explicit");
    }

    #[test]
    fn whitespace_only_secret_is_invalid() {
        let mut item = SecureDataBagItem::new("apps", Record::new(), with_secret(" \n\t"));
        assert!(matches!(item.key(), Err(Error::InvalidSecret { .. })));
    }

    #[test]
    fn encoded_fields_extend_the_baseline() {
        let mut item = SecureDataBagItem::new(
            "apps",
            record(json!({"password": "x", "token": "t", "user": "u"})),
            with_secret("k").with_encoded_fields(["token", "token"]),
        );
        assert_eq!(item.encoded_fields(), ["token"]);
        assert_eq!(item.effective_fields(), vec!["token", "password"]);

        let stored = item.to_storable().unwrap();
        assert!(stored.get("token").unwrap().is_encrypted());
        assert!(stored.get("password").unwrap().is_encrypted());
        assert!(!stored.get("user").unwrap().is_encrypted());
    }

    #[test]
    fn cipher_from_options() {
        let mut item = SecureDataBagItem::new(
            "apps",
            record(json!({"password": "x"})),
            with_secret("k").with_cipher("xchacha20-poly1305"),
        );
        assert_eq!(item.cipher(), "xchacha20-poly1305");
        let stored = item.to_storable().unwrap().into_json();
        assert_eq!(stored["password"]["cipher"], "xchacha20-poly1305");
    }

    #[test]
    fn legacy_round_trip_adopts_envelope() {
        let plain = json!({"id": "db", "password": "x", "token": [1, 2]});
        let mut writer = SecureDataBagItem::new(
            "apps",
            record(plain.clone()),
            with_secret("k").with_encoded_fields(["token"]),
        );
        let stored = writer.to_legacy_storable().unwrap();
        assert!(stored.contains_key("encryption"));
        assert_eq!(
            writer.describe()["iv"],
            stored.clone().into_json()["encryption"]["iv"]
        );

        let reader = SecureDataBagItem::from_stored("apps", stored, with_secret("k")).unwrap();
        assert_eq!(reader.body().clone().into_json(), plain);
        assert_eq!(reader.effective_fields(), vec!["token", "password"]);
        assert!(reader.encryption().iv.is_some());
    }

    #[test]
    fn set_body_failure_keeps_previous_body() {
        let mut writer = SecureDataBagItem::new(
            "apps",
            record(json!({"password": "x"})),
            with_secret("right"),
        );
        let stored = writer.to_storable().unwrap();

        let mut item = SecureDataBagItem::new(
            "apps",
            record(json!({"id": "keep"})),
            with_secret("wrong"),
        );
        assert!(matches!(
            item.set_body(stored),
            Err(Error::DecryptionFailed(_))
        ));
        assert_eq!(item.id(), Some("keep"));
    }

    #[test]
    fn object_name_and_item_json() {
        let mut item = SecureDataBagItem::new(
            "apps",
            record(json!({"id": "db", "password": "x"})),
            with_secret("k"),
        );
        assert_eq!(item.object_name().unwrap(), "data_bag_item_apps_db");

        let doc = item.to_item_json().unwrap();
        assert_eq!(doc["name"], "data_bag_item_apps_db");
        assert_eq!(doc["json_class"], "Chef::DataBagItem");
        assert_eq!(doc["chef_type"], "data_bag_item");
        assert_eq!(doc["data_bag"], "apps");
        assert!(doc["raw_data"]["password"]["encrypted_data"].is_string());

        let reloaded = SecureDataBagItem::from_item_json(doc, with_secret("k")).unwrap();
        assert_eq!(reloaded.data_bag(), "apps");
        assert_eq!(reloaded.body().get("password"), Some(&Value::from("x")));
    }

    #[test]
    fn object_name_requires_id() {
        let item = SecureDataBagItem::new("apps", Record::new(), ItemOptions::new());
        assert!(matches!(item.object_name(), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn options_from_config() {
        let mut config = SecureBagConfig::default();
        config.secret.path = Some("/etc/secure-bag/secret".into());
        config.encoding.cipher = "xchacha20-poly1305".into();
        config.encoding.encoded_fields = vec!["api_key".into()];

        let options = ItemOptions::from_config(&config);
        assert_eq!(options.resolver.default_source(), Some("/etc/secure-bag/secret"));
        assert_eq!(options.cipher.as_deref(), Some("xchacha20-poly1305"));

        let item = SecureDataBagItem::new("apps", Record::new(), options);
        assert_eq!(item.effective_fields(), vec!["api_key", "password"]);
    }

    #[test]
    fn debug_redacts_secret() {
        let item = SecureDataBagItem::new("apps", Record::new(), with_secret("hunter2"));
        let rendered = format!("{item:?} {:?}", with_secret("hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    fn sealed_body(body: serde_json::Value, secret: &str) -> serde_json::Value {
        crate::adapter::CipherAdapter::new(&SecretKey::from(secret))
            .encrypt(Value::try_from(body).unwrap(), "aes-256-cbc")
            .unwrap()
            .into_json()
    }

    #[test]
    fn whole_body_marker_loads_from_item_json() {
        let body = json!({"id": "db", "user": "u", "password": "x"});
        let doc = json!({"data_bag": "apps", "raw_data": sealed_body(body.clone(), "k")});

        let item = SecureDataBagItem::from_item_json(doc, with_secret("k")).unwrap();
        assert_eq!(item.id(), Some("db"));
        assert_eq!(item.body().clone().into_json(), body);
    }

    #[test]
    fn whole_body_marker_with_inner_markers() {
        let mut writer = SecureDataBagItem::new(
            "apps",
            record(json!({"id": "db", "password": "x"})),
            with_secret("k"),
        );
        let inner = writer.encode_body().unwrap().into_json();
        let doc = json!({"data_bag": "apps", "raw_data": sealed_body(inner, "k")});

        let item = SecureDataBagItem::from_item_json(doc, with_secret("k")).unwrap();
        assert_eq!(item.body().get("password"), Some(&Value::from("x")));
    }

    #[test]
    fn whole_body_marker_must_open_to_mapping() {
        let doc = json!({"data_bag": "apps", "raw_data": sealed_body(json!("just text"), "k")});
        assert!(matches!(
            SecureDataBagItem::from_item_json(doc, with_secret("k")),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn whole_body_marker_with_wrong_key() {
        let doc = json!({"data_bag": "apps", "raw_data": sealed_body(json!({"id": "db"}), "k")});
        assert!(matches!(
            SecureDataBagItem::from_item_json(doc, with_secret("other")),
            Err(Error::DecryptionFailed(_))
        ));
    }

    #[test]
    fn scalar_stored_value_is_malformed() {
        let result = SecureDataBagItem::from_stored_value("apps", Value::from("x"), with_secret("k"));
        assert!(matches!(result, Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn options_load_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secure-bag.toml");
        std::fs::write(
            &path,
            "[secret]\npath = \"/etc/secure-bag/secret\"\n\n[encoding]\nencoded_fields = [\"token\"]\n",
        )
        .unwrap();

        let options = ItemOptions::load(&path).unwrap();
        assert_eq!(options.resolver.default_source(), Some("/etc/secure-bag/secret"));
        assert_eq!(options.encoded_fields, vec!["token"]);
    }

    #[test]
    fn options_load_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secure-bag.toml");
        std::fs::write(&path, "[encoding]\ncipher = \"rot13\"\n").unwrap();

        assert!(matches!(
            ItemOptions::load(&path),
            Err(Error::Config(secure_bag_config::Error::Invalid(_)))
        ));
    }

    #[test]
    fn options_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ItemOptions::load(&dir.path().join("absent.toml")),
            Err(Error::Config(secure_bag_config::Error::Io { .. }))
        ));
    }

    #[test]
    fn config_fields_extend_but_never_replace_password() {
        let mut config = SecureBagConfig::default();
        config.encoding.encoded_fields = Vec::new();

        let mut item = SecureDataBagItem::new(
            "apps",
            record(json!({"password": "x"})),
            ItemOptions::from_config(&config).with_secret("k"),
        );
        assert_eq!(item.effective_fields(), vec!["password"]);
        assert!(item.to_storable().unwrap().get("password").unwrap().is_encrypted());
    }
}
