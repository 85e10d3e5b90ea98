// Field set codec: field-level encryption of declared sensitive fields
use crate::models::Document;
use crypto::{CipherConfig, CryptoError, EncryptionMode, FieldCipher};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;

/// Prefix of the companion marker written next to every encoded field
pub const MARKER_PREFIX: &str = "__enc_";

/// Name of the marker key for `field`
pub fn marker_key(field: &str) -> String {
    format!("{MARKER_PREFIX}{field}")
}

// =============================================================================
// DECLARED SENSITIVE FIELDS
// =============================================================================

/// Declared scalar type of a sensitive field
///
/// The cipher is string-in, string-out; the kind decides how the decrypted
/// text is turned back into a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared sensitive field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveField {
    pub name: String,
    pub kind: FieldKind,
    /// Text is trimmed and lower-cased before encryption, and legacy
    /// plaintext is matched without regard to case
    #[serde(default)]
    pub fold_case: bool,
}

impl SensitiveField {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            fold_case: false,
        }
    }

    /// Whether a legacy plaintext value equals `wanted` under this field's comparison
    pub fn plaintext_matches(&self, stored: &Value, wanted: &Value) -> bool {
        match (stored, wanted) {
            (Value::String(stored), Value::String(wanted)) if self.fold_case => {
                stored.trim().to_lowercase() == wanted.trim().to_lowercase()
            }
            _ => stored == wanted,
        }
    }
}

/// The declared sensitive field set of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveFieldSet {
    collection: String,
    fields: Vec<SensitiveField>,
    mode: EncryptionMode,
}

impl SensitiveFieldSet {
    pub fn new(collection: &str, mode: EncryptionMode) -> Self {
        Self {
            collection: collection.to_string(),
            fields: Vec::new(),
            mode,
        }
    }

    /// Declare a field; re-declaring a name replaces its kind
    pub fn with_field(mut self, name: &str, kind: FieldKind) -> Self {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.kind = kind,
            None => self.fields.push(SensitiveField::new(name, kind)),
        }
        self
    }

    pub fn text(self, name: &str) -> Self {
        self.with_field(name, FieldKind::Text)
    }

    pub fn number(self, name: &str) -> Self {
        self.with_field(name, FieldKind::Number)
    }

    pub fn boolean(self, name: &str) -> Self {
        self.with_field(name, FieldKind::Boolean)
    }

    /// Compare a declared text field case-insensitively; undeclared names are ignored
    pub fn case_insensitive(mut self, name: &str) -> Self {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.fold_case = true;
        }
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    pub fn fields(&self) -> &[SensitiveField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&SensitiveField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Encode failed; nothing may be written
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Cannot encrypt field '{field}': {source}")]
    Cipher {
        field: String,
        #[source]
        source: CryptoError,
    },

    #[error("Field '{field}' is declared {expected} but holds {found}")]
    KindMismatch {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("Field '{field}' is marked encoded but does not hold ciphertext")]
    MarkedPlaintext { field: String },

    #[error("Cipher for {collection} could not be created: {source}")]
    Configuration {
        collection: String,
        #[source]
        source: CryptoError,
    },
}

/// A declared field could not be turned back into plaintext
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Cannot decrypt field '{field}': {source}")]
    Cipher {
        field: String,
        #[source]
        source: CryptoError,
    },

    #[error("Decrypted field '{field}' is not a valid {expected}")]
    Coercion { field: String, expected: FieldKind },

    #[error("Field '{field}' is marked encoded but does not hold ciphertext")]
    NotCiphertext { field: String },
}

impl DecodeError {
    /// Name of the field that failed
    pub fn field(&self) -> &str {
        match self {
            Self::Cipher { field, .. } | Self::Coercion { field, .. } | Self::NotCiphertext { field } => {
                field
            }
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encodes and decodes the declared sensitive fields of one record type
#[derive(Clone)]
pub struct FieldSetCodec {
    fields: Arc<SensitiveFieldSet>,
    cipher: Arc<FieldCipher>,
}

impl fmt::Debug for FieldSetCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSetCodec")
            .field("collection", &self.fields.collection())
            .field("mode", &self.fields.mode())
            .field("fields", &self.fields.fields().len())
            .finish()
    }
}

impl FieldSetCodec {
    pub fn new(fields: SensitiveFieldSet, cipher: FieldCipher) -> Self {
        Self {
            fields: Arc::new(fields),
            cipher: Arc::new(cipher),
        }
    }

    /// Build the cipher for this field set's collection and mode from the process configuration
    pub fn from_config(fields: SensitiveFieldSet, config: &CipherConfig) -> Result<Self, EncodingError> {
        let cipher = FieldCipher::from_config(config, fields.collection(), fields.mode()).map_err(
            |source| EncodingError::Configuration {
                collection: fields.collection().to_string(),
                source,
            },
        )?;
        Ok(Self::new(fields, cipher))
    }

    pub fn field_set(&self) -> &SensitiveFieldSet {
        &self.fields
    }

    pub fn collection(&self) -> &str {
        self.fields.collection()
    }

    /// Replace every present, non-null declared field with its ciphertext
    ///
    /// Fields already carrying a marker are left as they are, provided they
    /// hold ciphertext; a marker on anything else is rejected. Structural
    /// fields are copied through untouched.
    pub fn encode(&self, doc: &Document) -> Result<Document, EncodingError> {
        let mut encoded = doc.clone();

        for field in self.fields.fields() {
            let value = match doc.get(&field.name) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            if is_marked(doc, &field.name) {
                match value {
                    Value::String(s) if FieldCipher::looks_encrypted(s) => continue,
                    _ => {
                        return Err(EncodingError::MarkedPlaintext {
                            field: field.name.clone(),
                        })
                    }
                }
            }

            let ciphertext = self.encrypt_scalar(field, value)?;
            encoded.insert(field.name.clone(), Value::String(ciphertext));
            encoded.insert(marker_key(&field.name), Value::Bool(true));
        }

        Ok(encoded)
    }

    /// Inverse of [`FieldSetCodec::encode`]
    ///
    /// Unmarked declared fields are legacy plaintext and are returned
    /// unchanged. Markers are stripped from the result.
    pub fn decode(&self, doc: &Document) -> Result<Document, DecodeError> {
        let mut decoded = doc.clone();

        for field in self.fields.fields() {
            if !is_marked(doc, &field.name) {
                continue;
            }
            let value = self.decrypt_field(field, doc.get(&field.name))?;
            decoded.insert(field.name.clone(), value);
        }

        decoded.retain(|key, _| !key.starts_with(MARKER_PREFIX));
        Ok(decoded)
    }

    /// Decode only the allow-listed fields and return just those
    ///
    /// Declared fields outside the allow-list are never decrypted.
    pub fn decode_projection(&self, doc: &Document, allow_list: &[&str]) -> Result<Document, DecodeError> {
        let mut projected = Document::new();

        for &name in allow_list {
            let Some(value) = doc.get(name) else {
                continue;
            };

            let value = match self.fields.get(name) {
                Some(field) if is_marked(doc, name) => self.decrypt_field(field, Some(value))?,
                _ => value.clone(),
            };
            projected.insert(name.to_string(), value);
        }

        Ok(projected)
    }

    /// Ciphertext a deterministic field set would store for `value`
    ///
    /// Returns `None` for randomized field sets and undeclared fields.
    pub fn lookup_value(&self, field: &str, value: &Value) -> Result<Option<Value>, EncodingError> {
        if self.fields.mode() != EncryptionMode::Deterministic {
            return Ok(None);
        }
        let Some(declared) = self.fields.get(field) else {
            return Ok(None);
        };
        self.encrypt_scalar(declared, value)
            .map(|ciphertext| Some(Value::String(ciphertext)))
    }

    /// Whether every present declared field of `doc` is already encoded
    pub fn is_sealed(&self, doc: &Document) -> bool {
        self.fields.fields().iter().all(|field| match doc.get(&field.name) {
            None | Some(Value::Null) => true,
            Some(_) => is_marked(doc, &field.name),
        })
    }

    fn encrypt_scalar(&self, field: &SensitiveField, value: &Value) -> Result<String, EncodingError> {
        let canonical = canonicalize(field, value)?;
        self.cipher
            .encrypt(&canonical)
            .map_err(|source| EncodingError::Cipher {
                field: field.name.clone(),
                source,
            })
    }

    fn decrypt_field(&self, field: &SensitiveField, value: Option<&Value>) -> Result<Value, DecodeError> {
        let ciphertext = match value {
            None | Some(Value::Null) => return Ok(Value::Null),
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(DecodeError::NotCiphertext {
                    field: field.name.clone(),
                })
            }
        };

        let plaintext = self
            .cipher
            .decrypt(ciphertext)
            .map_err(|source| DecodeError::Cipher {
                field: field.name.clone(),
                source,
            })?;

        parse_as(field, &plaintext)
    }
}

fn is_marked(doc: &Document, field: &str) -> bool {
    matches!(doc.get(&marker_key(field)), Some(Value::Bool(true)))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Canonical string form of a scalar, cast to the declared kind
///
/// Mirrors schema casting: numeric strings are accepted for numbers,
/// `"true"`/`"false"` for booleans, and any scalar for text.
fn canonicalize(field: &SensitiveField, value: &Value) -> Result<String, EncodingError> {
    let mismatch = || EncodingError::KindMismatch {
        field: field.name.clone(),
        expected: field.kind,
        found: json_type_name(value),
    };

    match (field.kind, value) {
        (FieldKind::Text, Value::String(s)) if field.fold_case => Ok(s.trim().to_lowercase()),
        (FieldKind::Text, Value::String(s)) => Ok(s.clone()),
        (FieldKind::Text, Value::Number(n)) => Ok(n.to_string()),
        (FieldKind::Text, Value::Bool(b)) => Ok(b.to_string()),

        (FieldKind::Number, Value::Number(n)) => Ok(n.to_string()),
        (FieldKind::Number, Value::String(s)) => parse_number(s.trim())
            .map(|n| n.to_string())
            .ok_or_else(mismatch),

        (FieldKind::Boolean, Value::Bool(b)) => Ok(b.to_string()),
        (FieldKind::Boolean, Value::String(s)) => match s.trim() {
            "true" => Ok("true".to_string()),
            "false" => Ok("false".to_string()),
            _ => Err(mismatch()),
        },

        _ => Err(mismatch()),
    }
}

fn parse_as(field: &SensitiveField, plaintext: &str) -> Result<Value, DecodeError> {
    let coercion = || DecodeError::Coercion {
        field: field.name.clone(),
        expected: field.kind,
    };

    match field.kind {
        FieldKind::Text => Ok(Value::String(plaintext.to_string())),
        FieldKind::Number => parse_number(plaintext).map(Value::Number).ok_or_else(coercion),
        FieldKind::Boolean => match plaintext {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(coercion()),
        },
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = text.parse::<u64>() {
        return Some(Number::from(u));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}
