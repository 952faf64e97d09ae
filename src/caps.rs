//! Media type descriptors.
//!
//! [`Caps`] name a media type plus a set of typed fields. Caps are *fixed*
//! when every field holds exactly one value; a buffer pool only accepts fixed
//! caps since it must know the exact format it allocates for.

use std::collections::BTreeMap;
use std::fmt;

/// Value of a caps field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapsValue {
    /// Integer
    Int(i64),
    /// String
    Str(String),
    /// Fraction as numerator and denominator
    Fraction(i32, i32),
    /// Inclusive integer range
    IntRange {
        /// Lower bound
        min: i64,
        /// Upper bound
        max: i64,
    },
    /// Any of the listed values
    List(Vec<CapsValue>),
}

impl CapsValue {
    /// Whether the value denotes exactly one value.
    pub fn is_fixed(&self) -> bool {
        match self {
            CapsValue::Int(_) | CapsValue::Str(_) | CapsValue::Fraction(..) => true,
            CapsValue::IntRange { min, max } => min == max,
            CapsValue::List(values) => values.len() == 1 && values[0].is_fixed(),
        }
    }
}

impl From<i32> for CapsValue {
    fn from(value: i32) -> Self {
        CapsValue::Int(value.into())
    }
}

impl From<&str> for CapsValue {
    fn from(value: &str) -> Self {
        CapsValue::Str(value.to_string())
    }
}

impl fmt::Display for CapsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapsValue::Int(value) => write!(f, "{value}"),
            CapsValue::Str(value) => f.write_str(value),
            CapsValue::Fraction(num, den) => write!(f, "{num}/{den}"),
            CapsValue::IntRange { min, max } => write!(f, "[ {min}, {max} ]"),
            CapsValue::List(values) => {
                f.write_str("{ ")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

/// A media type with typed fields.
///
/// Field order does not matter for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caps {
    media_type: String,
    fields: BTreeMap<String, CapsValue>,
}

impl Caps {
    /// Caps for `media_type` without fields.
    pub fn new(media_type: &str) -> Self {
        Self {
            media_type: media_type.to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// Start building caps for `media_type`.
    pub fn builder(media_type: &str) -> CapsBuilder {
        CapsBuilder {
            caps: Caps::new(media_type),
        }
    }

    /// Media type name, e.g. `"video/x-raw"`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Value of field `name`.
    pub fn get(&self, name: &str) -> Option<&CapsValue> {
        self.fields.get(name)
    }

    /// Set field `name`.
    pub fn set(&mut self, name: &str, value: impl Into<CapsValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Whether every field holds exactly one value.
    pub fn is_fixed(&self) -> bool {
        self.fields.values().all(CapsValue::is_fixed)
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.media_type)?;
        for (name, value) in &self.fields {
            write!(f, ", {name}={value}")?;
        }
        Ok(())
    }
}

/// Fluent construction of [`Caps`].
#[derive(Debug)]
pub struct CapsBuilder {
    caps: Caps,
}

impl CapsBuilder {
    /// Set field `name`.
    pub fn field(mut self, name: &str, value: impl Into<CapsValue>) -> Self {
        self.caps.set(name, value);
        self
    }

    /// Finish.
    pub fn build(self) -> Caps {
        self.caps
    }
}
