//! Custom attribute definitions and values
//!
//! Every entity (network, node, frame, signal) may carry vendor attributes,
//! but only keys declared through an [`AttributeDefinition`] for that entity
//! kind. The [`AttributeRegistry`] owns the declarations and validates values
//! when they are assigned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{MatrixError, MatrixResult};

/// Attribute values attached to one entity
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Entity kind an attribute definition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Network,
    Node,
    Frame,
    Signal,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectKind::Network => "network",
            ObjectKind::Node => "node",
            ObjectKind::Frame => "frame",
            ObjectKind::Signal => "signal",
        };
        f.write_str(s)
    }
}

/// Value type of an attribute definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Int { min: i64, max: i64 },
    Hex { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    String,
    Enum(Vec<String>),
}

impl AttributeType {
    /// Parse a textual type definition such as `INT 0 65535` or
    /// `ENUM "cyclic","spontan"`.
    pub fn parse(definition: &str) -> MatrixResult<Self> {
        let invalid = || MatrixError::InvalidAttributeDefinition(definition.to_string());
        let trimmed = definition.trim();
        let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (trimmed, ""),
        };

        match keyword.to_ascii_uppercase().as_str() {
            "INT" | "HEX" => {
                let mut bounds = rest.split_whitespace().map(parse_int);
                let min = bounds.next().flatten().ok_or_else(invalid)?;
                let max = bounds.next().flatten().ok_or_else(invalid)?;
                if min > max {
                    return Err(invalid());
                }
                if keyword.eq_ignore_ascii_case("INT") {
                    Ok(AttributeType::Int { min, max })
                } else {
                    Ok(AttributeType::Hex { min, max })
                }
            }
            "FLOAT" => {
                let mut bounds = rest.split_whitespace().map(|s| s.parse::<f64>().ok());
                let min = bounds.next().flatten().ok_or_else(invalid)?;
                let max = bounds.next().flatten().ok_or_else(invalid)?;
                if min > max {
                    return Err(invalid());
                }
                Ok(AttributeType::Float { min, max })
            }
            "STRING" => Ok(AttributeType::String),
            "ENUM" => {
                let labels: Vec<String> = rest
                    .split(',')
                    .map(|label| label.trim().trim_matches('"').to_string())
                    .filter(|label| !label.is_empty())
                    .collect();
                if labels.is_empty() {
                    return Err(invalid());
                }
                Ok(AttributeType::Enum(labels))
            }
            _ => Err(invalid()),
        }
    }

    /// Check `value` against this type, returning its normalized form.
    ///
    /// Integers and floats may arrive as strings (most schemas store
    /// attributes textually). Enum values may be given by label or index and
    /// are always stored by label.
    pub fn check(&self, value: &AttributeValue) -> Result<AttributeValue, String> {
        match self {
            AttributeType::Int { min, max } | AttributeType::Hex { min, max } => {
                let v = match value {
                    AttributeValue::Int(v) => *v,
                    AttributeValue::String(s) => {
                        parse_int(s).ok_or_else(|| format!("{:?} is not an integer", s))?
                    }
                    AttributeValue::Float(f) if f.fract() == 0.0 => *f as i64,
                    AttributeValue::Float(f) => return Err(format!("{} is not an integer", f)),
                };
                if v < *min || v > *max {
                    return Err(format!("{} outside [{}, {}]", v, min, max));
                }
                Ok(AttributeValue::Int(v))
            }
            AttributeType::Float { min, max } => {
                let v = match value {
                    AttributeValue::Float(f) => *f,
                    AttributeValue::Int(i) => *i as f64,
                    AttributeValue::String(s) => s
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| format!("{:?} is not a number", s))?,
                };
                if v < *min || v > *max {
                    return Err(format!("{} outside [{}, {}]", v, min, max));
                }
                Ok(AttributeValue::Float(v))
            }
            AttributeType::String => match value {
                AttributeValue::String(_) => Ok(value.clone()),
                other => Err(format!("{} is not a string", other)),
            },
            AttributeType::Enum(labels) => {
                let label = match value {
                    AttributeValue::String(s) => labels.iter().find(|l| *l == s),
                    AttributeValue::Int(i) => usize::try_from(*i).ok().and_then(|i| labels.get(i)),
                    AttributeValue::Float(_) => None,
                };
                label
                    .map(|l| AttributeValue::String(l.clone()))
                    .ok_or_else(|| format!("{} is not one of {:?}", value, labels))
            }
        }
    }
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Value of a custom attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::String(s) => parse_int(s),
            AttributeValue::Float(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// Declaration of one custom attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub kind: ObjectKind,
    pub value_type: AttributeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<AttributeValue>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, kind: ObjectKind, value_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            value_type,
            default: None,
        }
    }

    /// Build a definition from its textual type, e.g. `INT 0 65535`
    pub fn parse(name: impl Into<String>, kind: ObjectKind, definition: &str) -> MatrixResult<Self> {
        Ok(Self::new(name, kind, AttributeType::parse(definition)?))
    }

    /// Set the default value, validated against the type
    pub fn with_default(mut self, value: impl Into<AttributeValue>) -> MatrixResult<Self> {
        let value = value.into();
        let normalized = self
            .value_type
            .check(&value)
            .map_err(|reason| MatrixError::InvalidAttributeValue {
                key: self.name.clone(),
                value: value.to_string(),
                reason,
            })?;
        self.default = Some(normalized);
        Ok(self)
    }
}

/// Declared attributes, grouped by entity kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeRegistry {
    definitions: BTreeMap<ObjectKind, BTreeMap<String, AttributeDefinition>>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one with the same kind and name
    pub fn define(&mut self, definition: AttributeDefinition) -> Option<AttributeDefinition> {
        self.definitions
            .entry(definition.kind)
            .or_default()
            .insert(definition.name.clone(), definition)
    }

    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(&kind).and_then(|defs| defs.get(name))
    }

    pub fn remove(&mut self, kind: ObjectKind, name: &str) -> Option<AttributeDefinition> {
        self.definitions
            .get_mut(&kind)
            .and_then(|defs| defs.remove(name))
    }

    /// Definitions for one entity kind, sorted by name
    pub fn definitions(&self, kind: ObjectKind) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions
            .get(&kind)
            .into_iter()
            .flat_map(|defs| defs.values())
    }

    pub fn len(&self) -> usize {
        self.definitions.values().map(|defs| defs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Default value of a declared attribute
    pub fn default_for(&self, kind: ObjectKind, name: &str) -> Option<&AttributeValue> {
        self.get(kind, name).and_then(|def| def.default.as_ref())
    }

    /// Validate an assignment, returning the normalized value to store
    pub fn validate(
        &self,
        kind: ObjectKind,
        key: &str,
        value: &AttributeValue,
    ) -> MatrixResult<AttributeValue> {
        let definition = self
            .get(kind, key)
            .ok_or_else(|| MatrixError::UndefinedAttribute {
                kind,
                key: key.to_string(),
            })?;
        definition
            .value_type
            .check(value)
            .map_err(|reason| MatrixError::InvalidAttributeValue {
                key: key.to_string(),
                value: value.to_string(),
                reason,
            })
    }

    /// Check a whole attribute map without changing it
    pub fn check_all(&self, kind: ObjectKind, attributes: &Attributes) -> MatrixResult<()> {
        for (key, value) in attributes {
            self.validate(kind, key, value)?;
        }
        Ok(())
    }

    /// Validate and normalize a whole attribute map in place
    pub fn validate_all(&self, kind: ObjectKind, attributes: &mut Attributes) -> MatrixResult<()> {
        for (key, value) in attributes.iter_mut() {
            *value = self.validate(kind, key, value)?;
        }
        Ok(())
    }

    /// Definitions an AUTOSAR system-description import registers up front
    pub fn standard_autosar() -> Self {
        let mut registry = Self::new();
        for (name, kind, definition) in STANDARD_AUTOSAR_DEFINITIONS {
            match AttributeDefinition::parse(*name, *kind, definition) {
                Ok(def) => {
                    registry.define(def);
                }
                Err(e) => error!(attribute = %name, error = %e, "Bad built-in attribute definition"),
            }
        }
        registry
    }
}

const STANDARD_AUTOSAR_DEFINITIONS: &[(&str, ObjectKind, &str)] = &[
    ("NWM-Stationsadresse", ObjectKind::Node, "HEX 0 63"),
    ("NWM-Knoten", ObjectKind::Node, r#"ENUM "nein","ja""#),
    ("LongName", ObjectKind::Signal, "STRING"),
    ("GenSigStartValue", ObjectKind::Signal, "HEX 0 4294967295"),
    ("GenMsgCycleTime", ObjectKind::Frame, "INT 0 65535"),
    ("GenMsgDelayTime", ObjectKind::Frame, "INT 0 65535"),
    ("GenMsgNrOfRepetitions", ObjectKind::Frame, "INT 0 65535"),
    ("GenMsgStartValue", ObjectKind::Frame, "STRING"),
    ("GenMsgStartDelayTime", ObjectKind::Frame, "INT 0 65535"),
    (
        "GenMsgSendType",
        ObjectKind::Frame,
        r#"ENUM "cyclicX","spontanX","cyclicIfActiveX","spontanWithDelay","cyclicAndSpontanX","cyclicAndSpontanWithDelay","spontanWithRepitition","cyclicIfActiveAndSpontanWD","cyclicIfActiveFast","cyclicWithRepeatOnDemand","none""#,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_int_and_hex() {
        assert_eq!(
            AttributeType::parse("INT 0 65535").unwrap(),
            AttributeType::Int { min: 0, max: 65535 }
        );
        assert_eq!(
            AttributeType::parse("HEX 0 4294967295").unwrap(),
            AttributeType::Hex {
                min: 0,
                max: 4_294_967_295
            }
        );
        assert!(AttributeType::parse("INT 10 1").is_err());
        assert!(AttributeType::parse("INT 0").is_err());
    }

    #[test]
    fn test_parse_enum_and_string() {
        assert_eq!(
            AttributeType::parse(r#"ENUM  "nein","ja""#).unwrap(),
            AttributeType::Enum(vec!["nein".to_string(), "ja".to_string()])
        );
        assert_eq!(AttributeType::parse("STRING").unwrap(), AttributeType::String);
        assert_eq!(
            AttributeType::parse("FLOAT -1.5 2.5").unwrap(),
            AttributeType::Float { min: -1.5, max: 2.5 }
        );
        assert!(AttributeType::parse("BOOL").is_err());
        assert!(AttributeType::parse("ENUM").is_err());
    }

    #[test]
    fn test_check_int_accepts_text() {
        let ty = AttributeType::Int { min: 0, max: 100 };
        assert_eq!(ty.check(&"42".into()).unwrap(), AttributeValue::Int(42));
        assert_eq!(ty.check(&"0x10".into()).unwrap(), AttributeValue::Int(16));
        assert!(ty.check(&AttributeValue::Int(101)).is_err());
        assert!(ty.check(&"fast".into()).is_err());
    }

    #[test]
    fn test_check_enum_by_label_or_index() {
        let ty = AttributeType::Enum(vec!["nein".into(), "ja".into()]);
        assert_eq!(ty.check(&"ja".into()).unwrap(), AttributeValue::from("ja"));
        assert_eq!(
            ty.check(&AttributeValue::Int(0)).unwrap(),
            AttributeValue::from("nein")
        );
        assert!(ty.check(&AttributeValue::Int(2)).is_err());
        assert!(ty.check(&"vielleicht".into()).is_err());
    }

    #[test]
    fn test_registry_validate() {
        let mut registry = AttributeRegistry::new();
        registry.define(
            AttributeDefinition::parse("GenMsgCycleTime", ObjectKind::Frame, "INT 0 65535")
                .unwrap()
                .with_default(0)
                .unwrap(),
        );

        let value = registry
            .validate(ObjectKind::Frame, "GenMsgCycleTime", &"100".into())
            .unwrap();
        assert_eq!(value, AttributeValue::Int(100));

        let err = registry
            .validate(ObjectKind::Signal, "GenMsgCycleTime", &AttributeValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, MatrixError::UndefinedAttribute { .. }));

        assert_eq!(
            registry.default_for(ObjectKind::Frame, "GenMsgCycleTime"),
            Some(&AttributeValue::Int(0))
        );
    }

    #[test]
    fn test_with_default_rejects_out_of_range() {
        let result = AttributeDefinition::parse("Station", ObjectKind::Node, "HEX 0 63")
            .unwrap()
            .with_default(64);
        assert!(matches!(
            result,
            Err(MatrixError::InvalidAttributeValue { .. })
        ));
    }

    #[test]
    fn test_standard_autosar_definitions_all_parse() {
        for (name, kind, definition) in STANDARD_AUTOSAR_DEFINITIONS {
            let def = AttributeDefinition::parse(*name, *kind, definition)
                .unwrap_or_else(|e| panic!("{} does not parse: {}", name, e));
            assert_eq!(def.kind, *kind);
        }
        assert_eq!(
            AttributeRegistry::standard_autosar().len(),
            STANDARD_AUTOSAR_DEFINITIONS.len()
        );
    }

    #[test]
    fn test_standard_autosar_registry() {
        let registry = AttributeRegistry::standard_autosar();
        assert_eq!(registry.len(), 10);
        assert!(registry.get(ObjectKind::Node, "NWM-Knoten").is_some());
        assert!(registry.get(ObjectKind::Frame, "GenMsgSendType").is_some());
        assert_eq!(registry.definitions(ObjectKind::Signal).count(), 2);
    }
}
