//! Signal definition
//!
//! One named bit-field inside a frame payload, with its scaling, value
//! table and multiplexing role.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::attribute::Attributes;
use crate::error::{MatrixError, MatrixResult};
use crate::types::{mirror_in_byte, BitNumbering, ByteOrder, MultiplexIndicator, RawValue, StartBit};

/// Enumeration labels keyed by raw value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueTable(BTreeMap<i64, String>);

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the label for `raw`
    pub fn insert(&mut self, raw: i64, label: impl Into<String>) -> Option<String> {
        self.0.insert(raw, label.into())
    }

    pub fn remove(&mut self, raw: i64) -> Option<String> {
        self.0.remove(&raw)
    }

    pub fn label(&self, raw: i64) -> Option<&str> {
        self.0.get(&raw).map(String::as_str)
    }

    /// Raw value carrying `label`, lowest key first if several match
    pub fn raw_for_label(&self, label: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(raw, _)| *raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.0.iter().map(|(raw, label)| (*raw, label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(i64, S)> for ValueTable {
    fn from_iter<I: IntoIterator<Item = (i64, S)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(raw, label)| (raw, label.into())).collect())
    }
}

/// Smallest standard container type able to hold a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Sint8,
    Sint16,
    Sint32,
    Sint64,
    Single,
    Double,
}

impl BaseType {
    /// Container width in bits
    pub fn bits(&self) -> u32 {
        match self {
            BaseType::Uint8 | BaseType::Sint8 => 8,
            BaseType::Uint16 | BaseType::Sint16 => 16,
            BaseType::Uint32 | BaseType::Sint32 | BaseType::Single => 32,
            BaseType::Uint64 | BaseType::Sint64 | BaseType::Double => 64,
        }
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BaseType::Uint8 => "uint8",
            BaseType::Uint16 => "uint16",
            BaseType::Uint32 => "uint32",
            BaseType::Uint64 => "uint64",
            BaseType::Sint8 => "sint8",
            BaseType::Sint16 => "sint16",
            BaseType::Sint32 => "sint32",
            BaseType::Sint64 => "sint64",
            BaseType::Single => "single",
            BaseType::Double => "double",
        };
        f.write_str(s)
    }
}

/// One named bit-field of a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Unique within the owning frame
    pub name: String,

    /// Start bit, tagged with the numbering scheme it was given in
    pub start_bit: StartBit,

    /// Width in bits (1-64)
    pub size: u32,

    #[serde(default)]
    pub byte_order: ByteOrder,

    #[serde(default)]
    pub is_signed: bool,

    /// IEEE-754 single (32 bits) or double (64 bits)
    #[serde(default)]
    pub is_float: bool,

    /// physical = raw * factor + offset
    #[serde(default = "default_factor")]
    pub factor: Decimal,

    #[serde(default)]
    pub offset: Decimal,

    /// Advisory lower bound of the physical value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Decimal>,

    /// Advisory upper bound of the physical value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Decimal>,

    #[serde(default)]
    pub unit: String,

    #[serde(default, skip_serializing_if = "ValueTable::is_empty")]
    pub value_table: ValueTable,

    /// Raw value used when encoding without an explicit value
    #[serde(default)]
    pub initial_value: RawValue,

    #[serde(default)]
    pub multiplex: MultiplexIndicator,

    /// Receiving node names
    #[serde(default)]
    pub receivers: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub attributes: Attributes,
}

fn default_factor() -> Decimal {
    Decimal::ONE
}

impl Signal {
    /// Unsigned, unscaled signal
    pub fn new(name: impl Into<String>, start_bit: StartBit, size: u32, byte_order: ByteOrder) -> Self {
        Self {
            name: name.into(),
            start_bit,
            size,
            byte_order,
            is_signed: false,
            is_float: false,
            factor: Decimal::ONE,
            offset: Decimal::ZERO,
            min: None,
            max: None,
            unit: String::new(),
            value_table: ValueTable::new(),
            initial_value: RawValue::Integer(0),
            multiplex: MultiplexIndicator::None,
            receivers: BTreeSet::new(),
            comment: None,
            attributes: Attributes::new(),
        }
    }

    /// Intel signal with a scheme-0 start bit
    pub fn intel(name: impl Into<String>, start_bit: u32, size: u32) -> Self {
        Self::new(name, StartBit::Scheme0(start_bit), size, ByteOrder::LittleEndian)
    }

    /// Motorola signal with a scheme-1 (MSB-first) start bit
    pub fn motorola(name: impl Into<String>, start_bit: u32, size: u32) -> Self {
        Self::new(name, StartBit::Scheme1(start_bit), size, ByteOrder::BigEndian)
    }

    pub fn signed(mut self) -> Self {
        self.is_signed = true;
        self.is_float = false;
        self
    }

    /// Mark as IEEE-754 float; the width decides single or double
    pub fn float(mut self) -> Self {
        self.is_float = true;
        self.is_signed = false;
        self
    }

    pub fn with_factor_offset(mut self, factor: Decimal, offset: Decimal) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_bounds(mut self, min: Decimal, max: Decimal) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_initial_value(mut self, raw: impl Into<RawValue>) -> Self {
        self.initial_value = raw.into();
        self
    }

    pub fn with_multiplex(mut self, multiplex: MultiplexIndicator) -> Self {
        self.multiplex = multiplex;
        self
    }

    pub fn with_receivers<I, S>(mut self, receivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.receivers.extend(receivers.into_iter().map(Into::into));
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_value(mut self, raw: i64, label: impl Into<String>) -> Self {
        self.value_table.insert(raw, label);
        self
    }

    pub fn add_value(&mut self, raw: i64, label: impl Into<String>) {
        self.value_table.insert(raw, label);
    }

    /// Install the FALSE/TRUE enumeration used for boolean base types
    pub fn add_boolean_values(&mut self) {
        self.value_table.insert(0, "FALSE");
        self.value_table.insert(1, "TRUE");
    }

    pub fn is_multiplexor(&self) -> bool {
        matches!(self.multiplex, MultiplexIndicator::Multiplexor)
    }

    /// Selector value this signal is multiplexed under, if any
    pub fn multiplexer_value(&self) -> Option<u64> {
        match self.multiplex {
            MultiplexIndicator::Multiplexed(value) => Some(value),
            _ => None,
        }
    }

    /// Start bit in the requested numbering scheme
    pub fn start_bit_as(&self, numbering: BitNumbering) -> StartBit {
        self.start_bit.convert(numbering, self.byte_order)
    }

    /// Store a start bit, keeping the scheme it was given in
    pub fn set_start_bit(&mut self, start_bit: StartBit) {
        self.start_bit = start_bit;
    }

    /// Scheme-0 position of the least significant bit.
    ///
    /// Equal to the start bit for Intel signals; for Motorola signals this
    /// is the far end of the field.
    pub fn lsb_start_bit(&self) -> u32 {
        match self.byte_order {
            ByteOrder::LittleEndian => self.start_bit.scheme0(self.byte_order),
            ByteOrder::BigEndian => {
                let msb = self.start_bit.scheme1(self.byte_order);
                mirror_in_byte(msb + self.size.saturating_sub(1))
            }
        }
    }

    /// Container type used by schemas that need a standard base type
    pub fn base_type(&self) -> BaseType {
        if self.is_float {
            return if self.size > 32 {
                BaseType::Double
            } else {
                BaseType::Single
            };
        }
        match (self.size, self.is_signed) {
            (0..=8, false) => BaseType::Uint8,
            (0..=8, true) => BaseType::Sint8,
            (9..=16, false) => BaseType::Uint16,
            (9..=16, true) => BaseType::Sint16,
            (17..=32, false) => BaseType::Uint32,
            (17..=32, true) => BaseType::Sint32,
            (_, false) => BaseType::Uint64,
            (_, true) => BaseType::Sint64,
        }
    }

    /// Check that the signal can be packed at all
    pub fn validate(&self) -> MatrixResult<()> {
        let invalid = |reason: &str| MatrixError::InvalidSignal {
            signal: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.size == 0 || self.size > 64 {
            return Err(invalid("width must be between 1 and 64 bits"));
        }
        if self.is_float && self.is_signed {
            return Err(invalid("signed and float are mutually exclusive"));
        }
        if self.is_float && self.size != 32 && self.size != 64 {
            return Err(invalid("float signals must be 32 or 64 bits wide"));
        }
        if self.is_multiplexor() && self.is_float {
            return Err(invalid("a multiplexor must be an integer signal"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_builder() {
        let sig = Signal::intel("VehicleSpeed", 0, 16)
            .with_factor_offset(Decimal::new(1, 2), Decimal::ZERO)
            .with_unit("km/h")
            .with_bounds(Decimal::ZERO, Decimal::from(655))
            .with_receivers(["Dashboard", "Abs"]);

        assert_eq!(sig.factor, Decimal::new(1, 2));
        assert_eq!(sig.unit, "km/h");
        assert_eq!(sig.receivers.len(), 2);
        assert!(sig.receivers.contains("Abs"));
        assert!(!sig.is_multiplexor());
        assert!(sig.validate().is_ok());
    }

    #[test]
    fn test_motorola_start_bit_views() {
        let sig = Signal::motorola("Temp", 0, 12);
        assert_eq!(sig.start_bit_as(BitNumbering::Scheme0), StartBit::Scheme0(7));
        assert_eq!(sig.start_bit_as(BitNumbering::Scheme1), StartBit::Scheme1(0));
        // 12 bits from byte 0 MSB end at byte 1 bit 4
        assert_eq!(sig.lsb_start_bit(), 12);
    }

    #[test]
    fn test_intel_lsb_start_bit() {
        let sig = Signal::intel("Counter", 4, 4);
        assert_eq!(sig.lsb_start_bit(), 4);
        assert_eq!(sig.start_bit_as(BitNumbering::Scheme1), StartBit::Scheme1(4));
    }

    #[rstest]
    #[case(1, false, false, BaseType::Uint8)]
    #[case(8, true, false, BaseType::Sint8)]
    #[case(12, false, false, BaseType::Uint16)]
    #[case(24, true, false, BaseType::Sint32)]
    #[case(40, false, false, BaseType::Uint64)]
    #[case(32, false, true, BaseType::Single)]
    #[case(64, false, true, BaseType::Double)]
    fn test_base_type(
        #[case] size: u32,
        #[case] signed: bool,
        #[case] float: bool,
        #[case] expected: BaseType,
    ) {
        let mut sig = Signal::intel("S", 0, size);
        sig.is_signed = signed;
        sig.is_float = float;
        assert_eq!(sig.base_type(), expected);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(Signal::intel("Wide", 0, 65).validate().is_err());
        assert!(Signal::intel("Empty", 0, 0).validate().is_err());
        assert!(Signal::intel("Half", 0, 16).float().validate().is_err());

        let mut both = Signal::intel("Both", 0, 32).float();
        both.is_signed = true;
        assert!(both.validate().is_err());

        let mux = Signal::intel("Mux", 0, 32)
            .float()
            .with_multiplex(MultiplexIndicator::Multiplexor);
        assert!(mux.validate().is_err());
    }

    #[test]
    fn test_value_table() {
        let mut sig = Signal::intel("Flag", 0, 1);
        sig.add_boolean_values();
        assert_eq!(sig.value_table.label(1), Some("TRUE"));
        assert_eq!(sig.value_table.raw_for_label("FALSE"), Some(0));
        assert_eq!(sig.value_table.raw_for_label("MAYBE"), None);

        let table: ValueTable = [(0, "P"), (1, "R"), (2, "N"), (3, "D")]
            .into_iter()
            .collect();
        assert_eq!(table.len(), 4);
        assert_eq!(table.iter().nth(3), Some((3, "D")));
    }
}
