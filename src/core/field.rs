use rust_decimal::Decimal;
use serde::de::{self, IgnoredAny, MapAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a user-defined custom field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Whether a field is entered by hand or computed from a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Manual,
    Calculated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDataType {
    Number,
    Text,
}

/// Definition of a custom field attached to every hedge position.
///
/// Calculated fields reference other fields and base metrics by *name*
/// inside `{...}` tokens, e.g. `"{Monto USD} * 2"`.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::core::field::{CustomFieldDefinition, FieldKind};
///
/// let def = CustomFieldDefinition::calculated("f-1", "Double", "{Monto USD} * 2");
/// assert_eq!(def.kind, FieldKind::Calculated);
/// assert_eq!(def.formula.as_deref(), Some("{Monto USD} * 2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub id: FieldId,
    pub name: String,
    pub kind: FieldKind,
    pub data_type: FieldDataType,
    /// Only meaningful when `kind` is `Calculated`.
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub is_required: bool,
}

impl CustomFieldDefinition {
    /// A manually entered field.
    pub fn manual(
        id: impl Into<FieldId>,
        name: impl Into<String>,
        data_type: FieldDataType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: FieldKind::Manual,
            data_type,
            formula: None,
            is_required: false,
        }
    }

    /// A numeric calculated field.
    pub fn calculated(
        id: impl Into<FieldId>,
        name: impl Into<String>,
        formula: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: FieldKind::Calculated,
            data_type: FieldDataType::Number,
            formula: Some(formula.into()),
            is_required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn is_calculated(&self) -> bool {
        self.kind == FieldKind::Calculated
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The value stored in (or computed for) a custom field.
///
/// Serialized externally tagged with the decimal kept as a string, e.g.
/// `{"number": "33333.3333"}` or `{"text": "007"}`, so exports are exact.
/// Input also accepts a bare JSON number (a number) or a bare JSON string
/// (always text, even when it looks numeric).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Number(Decimal),
    Text(String),
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, a string, or a single-key {\"number\"|\"text\"} map")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Decimal::try_from(v)
            .map(FieldValue::Number)
            .map_err(|_| E::invalid_value(Unexpected::Float(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldValue, A::Error> {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let value = match key.as_str() {
            "number" => FieldValue::Number(map.next_value()?),
            "text" => FieldValue::Text(map.next_value()?),
            other => return Err(de::Error::unknown_variant(other, &["number", "text"])),
        };
        if map.next_key::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(2, &self));
        }
        Ok(value)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

impl FieldValue {
    /// Numeric reading of this value.
    ///
    /// Text is accepted when it parses as a plain decimal, as form inputs
    /// often deliver numbers as strings.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                Decimal::from_str(trimmed).ok()
            }
        }
    }

    /// True for values a required-field check would reject.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(n: Decimal) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}
