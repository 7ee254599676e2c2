//! Bit-level packing of one signal into a payload
//!
//! A signal's bit range is turned into a list of per-byte spans once, and
//! the same spans drive both [`extract`] and [`insert`], so the two are
//! inverses by construction.
//!
//! Bits are addressed in two linear orders:
//! - Intel fields walk scheme-0 positions upward from their LSB.
//! - Motorola fields walk scheme-1 positions upward from their MSB, which
//!   moves toward less significant bits inside a byte and then continues at
//!   the next byte's most significant bit.

use crate::error::{MatrixError, MatrixResult};
use crate::signal::Signal;
use crate::types::{mirror_in_byte, ByteOrder, RawValue};

/// Contiguous run of bits inside one payload byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSpan {
    pub byte_index: usize,
    /// Lowest bit position within the byte (0 = LSB)
    pub bit_offset: u8,
    /// Number of bits in this run (1-8)
    pub num_bits: u8,
    /// Where these bits land in the raw value, LSB-relative
    pub value_shift: u8,
}

impl BitSpan {
    fn mask(&self) -> u8 {
        (((1u16 << self.num_bits) - 1) as u8) << self.bit_offset
    }
}

/// Byte/bit placement of one signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitLayout {
    spans: Vec<BitSpan>,
    size: u32,
    /// One past the last linear position the field touches
    end: u64,
}

/// One past the last linear position of the field in its byte order's walk.
///
/// Widened to `u64` so a start bit near `u32::MAX` cannot wrap.
fn linear_end(signal: &Signal) -> u64 {
    let start = match signal.byte_order {
        ByteOrder::LittleEndian => signal.start_bit.scheme0(signal.byte_order),
        ByteOrder::BigEndian => signal.start_bit.scheme1(signal.byte_order),
    };
    start as u64 + signal.size as u64
}

impl BitLayout {
    /// Compute the placement of `signal` without checking it against a payload
    pub fn for_signal(signal: &Signal) -> MatrixResult<Self> {
        signal.validate()?;
        let size = signal.size;
        let end = linear_end(signal);
        let mut spans = Vec::with_capacity(size as usize / 8 + 2);
        let mut remaining = size;

        match signal.byte_order {
            ByteOrder::LittleEndian => {
                let lsb = signal.start_bit.scheme0(signal.byte_order);
                let mut byte_index = (lsb / 8) as usize;
                let mut bit_index = lsb % 8;
                let mut value_shift = 0u32;
                while remaining > 0 {
                    let num_bits = (8 - bit_index).min(remaining);
                    spans.push(BitSpan {
                        byte_index,
                        bit_offset: bit_index as u8,
                        num_bits: num_bits as u8,
                        value_shift: value_shift as u8,
                    });
                    value_shift += num_bits;
                    remaining -= num_bits;
                    byte_index += 1;
                    bit_index = 0;
                }
            }
            ByteOrder::BigEndian => {
                let msb_linear = signal.start_bit.scheme1(signal.byte_order);
                let msb = mirror_in_byte(msb_linear);
                let mut byte_index = (msb / 8) as usize;
                let mut bit_index = msb % 8;
                while remaining > 0 {
                    let num_bits = (bit_index + 1).min(remaining);
                    remaining -= num_bits;
                    spans.push(BitSpan {
                        byte_index,
                        bit_offset: (bit_index + 1 - num_bits) as u8,
                        num_bits: num_bits as u8,
                        value_shift: remaining as u8,
                    });
                    byte_index += 1;
                    bit_index = 7;
                }
            }
        }

        Ok(Self { spans, size, end })
    }

    /// Compute the placement and check it fits a payload of `payload_len` bytes
    pub fn for_payload(signal: &Signal, frame: &str, payload_len: usize) -> MatrixResult<Self> {
        let end = linear_end(signal);
        let available = payload_len as u64 * 8;
        if end > available {
            return Err(MatrixError::BitRange {
                frame: frame.to_string(),
                signal: signal.name.clone(),
                end,
                available,
            });
        }
        Self::for_signal(signal)
    }

    pub fn spans(&self) -> &[BitSpan] {
        &self.spans
    }

    /// Linear end of the field, comparable with `8 * payload_len`
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Absolute payload bits covered, as `byte * 8 + bit` (bit 0 = LSB)
    pub fn occupied_bits(&self) -> impl Iterator<Item = u64> + '_ {
        self.spans.iter().flat_map(|span| {
            let base = span.byte_index as u64 * 8 + span.bit_offset as u64;
            base..base + span.num_bits as u64
        })
    }

    /// Gather the field into an unsigned integer
    pub fn extract(&self, payload: &[u8]) -> u64 {
        let mut result = 0u64;
        for span in &self.spans {
            let bits = (payload[span.byte_index] & span.mask()) >> span.bit_offset;
            result |= (bits as u64) << span.value_shift;
        }
        result
    }

    /// Scatter the low `size` bits of `raw` into the payload.
    ///
    /// Bits outside the field are left as they are.
    pub fn pack(&self, payload: &mut [u8], raw: u64) {
        for span in &self.spans {
            let mask = span.mask();
            let bits = ((raw >> span.value_shift) as u8) << span.bit_offset;
            payload[span.byte_index] = (payload[span.byte_index] & !mask) | (bits & mask);
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

fn width_mask(size: u32) -> u64 {
    if size >= 64 {
        u64::MAX
    } else {
        (1u64 << size) - 1
    }
}

/// Read one signal's raw value out of a payload
pub fn extract(signal: &Signal, frame: &str, payload: &[u8]) -> MatrixResult<RawValue> {
    let layout = BitLayout::for_payload(signal, frame, payload.len())?;
    let bits = layout.extract(payload);
    Ok(interpret(signal, bits))
}

/// Turn the gathered bit pattern into a typed raw value
pub fn interpret(signal: &Signal, bits: u64) -> RawValue {
    if signal.is_float {
        return if signal.size == 32 {
            RawValue::Single(f32::from_bits(bits as u32))
        } else {
            RawValue::Double(f64::from_bits(bits))
        };
    }
    if signal.is_signed {
        let shift = 64 - signal.size;
        let extended = ((bits << shift) as i64) >> shift;
        RawValue::Integer(extended as i128)
    } else {
        RawValue::Integer(bits as i128)
    }
}

/// Write one signal's raw value into a payload
pub fn insert(signal: &Signal, frame: &str, payload: &mut [u8], raw: &RawValue) -> MatrixResult<()> {
    let layout = BitLayout::for_payload(signal, frame, payload.len())?;
    let bits = to_bits(signal, raw)?;
    layout.pack(payload, bits);
    Ok(())
}

/// Bit pattern of `raw` for this signal, range-checked against its width
pub fn to_bits(signal: &Signal, raw: &RawValue) -> MatrixResult<u64> {
    let out_of_range = || MatrixError::RawOutOfRange {
        signal: signal.name.clone(),
        raw: raw.to_string(),
        size: signal.size,
    };

    if signal.is_float {
        let bits = match (signal.size, raw) {
            (32, RawValue::Single(v)) => v.to_bits() as u64,
            (32, other) => (other.as_f64() as f32).to_bits() as u64,
            (_, RawValue::Single(v)) => (*v as f64).to_bits(),
            (_, other) => other.as_f64().to_bits(),
        };
        return Ok(bits);
    }

    let value = match raw {
        RawValue::Integer(v) => *v,
        RawValue::Single(_) | RawValue::Double(_) => {
            let f = raw.as_f64();
            if !f.is_finite() || f.fract() != 0.0 {
                return Err(MatrixError::NotRepresentable {
                    signal: signal.name.clone(),
                    reason: format!("{} is not an integer", f),
                });
            }
            f as i128
        }
    };

    let size = signal.size;
    let (min, max) = if signal.is_signed {
        (-(1i128 << (size - 1)), (1i128 << (size - 1)) - 1)
    } else {
        (0, (1i128 << size) - 1)
    };
    if value < min || value > max {
        return Err(out_of_range());
    }
    Ok((value as u64) & width_mask(size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StartBit;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intel_single_byte() {
        let sig = Signal::intel("Low", 0, 8);
        let mut payload = [0u8; 2];
        insert(&sig, "F", &mut payload, &RawValue::Integer(0xAB)).unwrap();
        assert_eq!(payload, [0xAB, 0x00]);
        assert_eq!(extract(&sig, "F", &payload).unwrap(), RawValue::Integer(0xAB));
    }

    #[test]
    fn test_intel_crosses_byte_boundary() {
        let sig = Signal::intel("Mid", 4, 12);
        let mut payload = [0u8; 3];
        insert(&sig, "F", &mut payload, &RawValue::Integer(0xABC)).unwrap();
        // LSB nibble 0xC lands in the upper half of byte 0
        assert_eq!(payload, [0xC0, 0xAB, 0x00]);
        assert_eq!(extract(&sig, "F", &payload).unwrap(), RawValue::Integer(0xABC));
    }

    #[test]
    fn test_motorola_full_byte() {
        let sig = Signal::motorola("Byte", 0, 8);
        let mut payload = [0u8; 1];
        insert(&sig, "F", &mut payload, &RawValue::Integer(0xAB)).unwrap();
        assert_eq!(payload, [0xAB]);
    }

    #[test]
    fn test_motorola_crosses_byte_boundary() {
        // MSB at byte 0 bit 3, 12 bits -> low nibble of byte 0 and all of byte 1
        let sig = Signal::motorola("Wide", 4, 12);
        let mut payload = [0u8; 2];
        insert(&sig, "F", &mut payload, &RawValue::Integer(0xABC)).unwrap();
        assert_eq!(payload, [0x0A, 0xBC]);
        assert_eq!(extract(&sig, "F", &payload).unwrap(), RawValue::Integer(0xABC));
    }

    #[test]
    fn test_motorola_matches_dbc_golden_frame() {
        // DBC-style start bits are scheme 0; frame A5 B6 D9 00 00 00 00 00
        let payload = [0xA5, 0xB6, 0xD9, 0, 0, 0, 0, 0];

        let mut temperature = Signal::motorola("Temperature", 0, 12).signed();
        temperature.set_start_bit(StartBit::Scheme0(0));
        let raw = extract(&temperature, "F", &payload).unwrap();
        assert_eq!(raw, RawValue::Integer(-586));

        let mut radius = Signal::motorola("AverageRadius", 0, 6);
        radius.set_start_bit(StartBit::Scheme0(6));
        assert_eq!(extract(&radius, "F", &payload).unwrap(), RawValue::Integer(18));

        let mut enable = Signal::motorola("Enable", 0, 1);
        enable.set_start_bit(StartBit::Scheme0(7));
        assert_eq!(extract(&enable, "F", &payload).unwrap(), RawValue::Integer(1));
    }

    #[test]
    fn test_insert_preserves_neighbours() {
        let sig = Signal::intel("Nibble", 2, 4);
        let mut payload = [0xFF];
        insert(&sig, "F", &mut payload, &RawValue::Integer(0)).unwrap();
        assert_eq!(payload, [0b1100_0011]);
    }

    #[test]
    fn test_signed_extension() {
        let sig = Signal::intel("Delta", 0, 4).signed();
        let mut payload = [0u8];
        insert(&sig, "F", &mut payload, &RawValue::Integer(-3)).unwrap();
        assert_eq!(payload, [0x0D]);
        assert_eq!(extract(&sig, "F", &payload).unwrap(), RawValue::Integer(-3));
    }

    #[test]
    fn test_float_bit_patterns() {
        let sig = Signal::intel("F32", 0, 32).float();
        let mut payload = [0u8; 4];
        insert(&sig, "F", &mut payload, &RawValue::Single(1.0)).unwrap();
        assert_eq!(payload, 1.0f32.to_le_bytes());

        let sig = Signal::motorola("F64", 0, 64).float();
        let mut payload = [0u8; 8];
        insert(&sig, "F", &mut payload, &RawValue::Double(-2.5)).unwrap();
        assert_eq!(payload, (-2.5f64).to_be_bytes());
        assert_eq!(extract(&sig, "F", &payload).unwrap(), RawValue::Double(-2.5));
    }

    #[test]
    fn test_range_errors() {
        let sig = Signal::intel("Tail", 60, 8);
        let mut payload = [0u8; 8];
        let err = insert(&sig, "F", &mut payload, &RawValue::Integer(1)).unwrap_err();
        assert!(matches!(err, MatrixError::BitRange { end: 68, available: 64, .. }));

        let sig = Signal::motorola("Tail", 60, 8);
        assert!(extract(&sig, "F", &payload).is_err());

        let sig = Signal::intel("Byte", 0, 8);
        let err = insert(&sig, "F", &mut payload, &RawValue::Integer(256)).unwrap_err();
        assert!(matches!(err, MatrixError::RawOutOfRange { .. }));
        let err = insert(&sig, "F", &mut payload, &RawValue::Integer(-1)).unwrap_err();
        assert!(matches!(err, MatrixError::RawOutOfRange { .. }));
    }

    #[test]
    fn test_start_bit_near_u32_max_is_out_of_range() {
        let mut payload = [0u8; 8];
        for sig in [
            Signal::intel("Far", u32::MAX - 3, 8),
            Signal::motorola("Far", u32::MAX - 3, 8),
        ] {
            let err = insert(&sig, "F", &mut payload, &RawValue::Integer(1)).unwrap_err();
            assert!(matches!(
                err,
                MatrixError::BitRange { end, available: 64, .. } if end == u32::MAX as u64 + 5
            ));
            assert!(matches!(
                extract(&sig, "F", &payload),
                Err(MatrixError::BitRange { .. })
            ));
        }
        assert_eq!(payload, [0u8; 8]);
    }

    #[test]
    fn test_integer_signal_rejects_fractional_float() {
        let sig = Signal::intel("Count", 0, 8);
        let mut payload = [0u8];
        insert(&sig, "F", &mut payload, &RawValue::Double(3.0)).unwrap();
        assert_eq!(payload, [3]);
        assert!(insert(&sig, "F", &mut payload, &RawValue::Double(3.5)).is_err());
    }

    #[test]
    fn test_occupied_bits() {
        let layout = BitLayout::for_signal(&Signal::motorola("M", 6, 4)).unwrap();
        // scheme-1 6..10 -> byte 0 bits 1,0 and byte 1 bits 7,6
        let bits: Vec<u64> = layout.occupied_bits().collect();
        assert_eq!(bits, vec![0, 1, 14, 15]);
        assert_eq!(layout.end(), 10);
    }
}
