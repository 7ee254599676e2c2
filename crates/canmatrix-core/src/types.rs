//! Core value types shared by the model and the codec
//!
//! Byte order, start-bit numbering, multiplex indicators, arbitration ids
//! and raw signal values.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Bit-walk convention of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Intel: start bit is the LSB, value grows toward higher bit indices
    #[default]
    LittleEndian,
    /// Motorola: start bit is the MSB, value continues into the next byte's MSB
    BigEndian,
}

impl ByteOrder {
    pub fn is_little_endian(&self) -> bool {
        matches!(self, ByteOrder::LittleEndian)
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ByteOrder::LittleEndian => "intel",
            ByteOrder::BigEndian => "motorola",
        };
        f.write_str(s)
    }
}

/// Start-bit numbering scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitNumbering {
    /// LSB-first inside each byte: bit 0 is the LSB of byte 0
    Scheme0,
    /// MSB-first inside each byte: bit 0 is the MSB of byte 0
    Scheme1,
}

/// A start bit tagged with the numbering scheme it is expressed in
///
/// The two schemes agree on the byte index and disagree on the bit order
/// inside the byte. They can only be mixed through [`StartBit::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartBit {
    Scheme0(u32),
    Scheme1(u32),
}

impl StartBit {
    /// The numeric bit position, in whatever scheme this value carries
    pub fn value(&self) -> u32 {
        match self {
            StartBit::Scheme0(bit) | StartBit::Scheme1(bit) => *bit,
        }
    }

    /// The scheme this value is expressed in
    pub fn numbering(&self) -> BitNumbering {
        match self {
            StartBit::Scheme0(_) => BitNumbering::Scheme0,
            StartBit::Scheme1(_) => BitNumbering::Scheme1,
        }
    }

    /// Re-express this start bit in `target` numbering.
    ///
    /// Motorola start bits are mirrored inside their byte; Intel start bits
    /// are the same number in both schemes.
    pub fn convert(self, target: BitNumbering, byte_order: ByteOrder) -> StartBit {
        if self.numbering() == target {
            return self;
        }
        let bit = match byte_order {
            ByteOrder::LittleEndian => self.value(),
            ByteOrder::BigEndian => mirror_in_byte(self.value()),
        };
        match target {
            BitNumbering::Scheme0 => StartBit::Scheme0(bit),
            BitNumbering::Scheme1 => StartBit::Scheme1(bit),
        }
    }

    /// Position in scheme 0
    pub fn scheme0(self, byte_order: ByteOrder) -> u32 {
        self.convert(BitNumbering::Scheme0, byte_order).value()
    }

    /// Position in scheme 1
    pub fn scheme1(self, byte_order: ByteOrder) -> u32 {
        self.convert(BitNumbering::Scheme1, byte_order).value()
    }
}

/// Reverse the bit order inside the byte holding `bit`
pub fn mirror_in_byte(bit: u32) -> u32 {
    (bit / 8) * 8 + (7 - bit % 8)
}

/// Role of a signal in frame multiplexing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MultiplexIndicator {
    /// Always present
    #[default]
    None,
    /// The selector signal
    Multiplexor,
    /// Present only when the multiplexor's raw value equals this value
    Multiplexed(u64),
}

/// Bus identifier of a frame
///
/// Equality, hashing and ordering use the numeric id only; the `extended`
/// flag matters for the wire form, not for lookups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArbitrationId {
    pub id: u32,
    #[serde(default)]
    pub extended: bool,
}

/// Flag bit marking an extended id in the compound integer form
pub const EXTENDED_FLAG: u32 = 0x8000_0000;

const STANDARD_ID_MAX: u32 = 0x7FF;
const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

impl ArbitrationId {
    pub fn new(id: u32, extended: bool) -> Self {
        Self { id, extended }
    }

    /// 11-bit identifier
    pub fn standard(id: u32) -> Self {
        Self::new(id, false)
    }

    /// 29-bit identifier
    pub fn extended(id: u32) -> Self {
        Self::new(id, true)
    }

    /// Whether the id fits its 11/29-bit range
    pub fn is_valid(&self) -> bool {
        if self.extended {
            self.id <= EXTENDED_ID_MAX
        } else {
            self.id <= STANDARD_ID_MAX
        }
    }

    /// Id with the extended flag folded into bit 31
    pub fn to_compound_integer(&self) -> u32 {
        if self.extended {
            self.id | EXTENDED_FLAG
        } else {
            self.id
        }
    }

    pub fn from_compound_integer(value: u32) -> Self {
        Self {
            id: value & !EXTENDED_FLAG,
            extended: value & EXTENDED_FLAG != 0,
        }
    }
}

impl PartialEq for ArbitrationId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ArbitrationId {}

impl Hash for ArbitrationId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ArbitrationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArbitrationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::fmt::Display for ArbitrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.extended {
            write!(f, "0x{:08X}x", self.id)
        } else {
            write!(f, "0x{:03X}", self.id)
        }
    }
}

/// Unscaled value of a signal as it sits in the payload
///
/// Integers cover both the unsigned and the signed 64-bit range. Float
/// widths are kept apart so single-precision bit patterns survive exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValue {
    Integer(i128),
    Single(f32),
    Double(f64),
}

impl RawValue {
    /// Integer value, if this is an integer
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            RawValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Lossy float view of any raw value
    pub fn as_f64(&self) -> f64 {
        match self {
            RawValue::Integer(v) => *v as f64,
            RawValue::Single(v) => *v as f64,
            RawValue::Double(v) => *v,
        }
    }

    pub fn is_float(&self) -> bool {
        !matches!(self, RawValue::Integer(_))
    }
}

impl Default for RawValue {
    fn default() -> Self {
        RawValue::Integer(0)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v as i128)
    }
}

impl From<u64> for RawValue {
    fn from(v: u64) -> Self {
        RawValue::Integer(v as i128)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        RawValue::Integer(v as i128)
    }
}

impl From<f32> for RawValue {
    fn from(v: f32) -> Self {
        RawValue::Single(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Double(v)
    }
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Integer(v) => write!(f, "{}", v),
            RawValue::Single(v) => write!(f, "{}", v),
            RawValue::Double(v) => write!(f, "{}", v),
        }
    }
}
