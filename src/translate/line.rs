//! Line protocol records.
//!
//! `<measurement>,<tag>=<value>[,...] <field>=<value>[,...]`
//!
//! Numeric fields are bare decimal literals, text fields are double-quoted
//! with `\`, `'` and `"` backslash-escaped. Field order is insertion order and
//! is part of the output contract.

use std::borrow::Cow;
use std::fmt;

/// Measurement name shared by every record.
pub const MEASUREMENT: &str = "packet";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "\"{}\"", escape(s)),
        }
    }
}

/// Escapes text for embedding inside a double-quoted field value.
///
/// Backslash is replaced first so the escapes added for quotes are not
/// themselves escaped again. Empty input is returned unchanged.
pub fn escape(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['\\', '\'', '"']) {
        return Cow::Borrowed(raw);
    }
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"");
    Cow::Owned(escaped)
}

/// Joins relay hops into the single `path` field value.
pub fn join_path(hops: &[String]) -> String {
    hops.join(",")
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// A single record. Tag keys and field keys are each unique; a second insert
/// under an existing key is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    measurement: &'static str,
    tags: Vec<(&'static str, String)>,
    fields: Vec<(&'static str, FieldValue)>,
}

impl LineRecord {
    pub fn new(measurement: &'static str) -> Self {
        Self {
            measurement,
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn measurement(&self) -> &str {
        self.measurement
    }

    pub fn tags(&self) -> &[(&'static str, String)] {
        &self.tags
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn tag(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        if !self.tags.iter().any(|(k, _)| *k == key) {
            self.tags.push((key, value.into()));
        }
        self
    }

    fn push(&mut self, key: &'static str, value: FieldValue) {
        if !self.fields.iter().any(|(k, _)| *k == key) {
            self.fields.push((key, value));
        }
    }

    /// Bare numeric field. Non-finite values have no line protocol form and are skipped.
    pub fn float(&mut self, key: &'static str, value: Option<f64>) -> &mut Self {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.push(key, FieldValue::Float(v));
        }
        self
    }

    pub fn integer(&mut self, key: &'static str, value: Option<i64>) -> &mut Self {
        if let Some(v) = value {
            self.push(key, FieldValue::Integer(v));
        }
        self
    }

    /// Quoted field, emitted whenever present (including empty strings).
    pub fn text(&mut self, key: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.push(key, FieldValue::Text(v.to_string()));
        }
        self
    }

    /// Booleans are stored as quoted `True`/`False`.
    pub fn boolean(&mut self, key: &'static str, value: Option<bool>) -> &mut Self {
        self.text(key, value.map(bool_text))
    }

    /// Quoted field, skipped when absent or empty.
    pub fn free_text(&mut self, key: &'static str, value: Option<&str>) -> &mut Self {
        self.text(key, value.filter(|v| !v.is_empty()))
    }

    pub fn path(&mut self, hops: Option<&[String]>) -> &mut Self {
        if let Some(hops) = hops {
            self.push("path", FieldValue::Text(join_path(hops)));
        }
        self
    }
}

impl fmt::Display for LineRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.measurement)?;
        for (key, value) in &self.tags {
            write!(f, ",{}={}", key, value)?;
        }
        for (idx, (key, value)) in self.fields.iter().enumerate() {
            let sep = if idx == 0 { ' ' } else { ',' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}
