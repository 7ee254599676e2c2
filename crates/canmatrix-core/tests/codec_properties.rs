//! Property tests for the frame codec
//!
//! Random signal placements in an 8-byte frame, both byte orders:
//! 1. decode(encode(v)) == v for raw values
//! 2. packing a field never disturbs bits outside it
//! 3. to_raw(to_physical(r)) == r for nonzero factors

use std::collections::BTreeMap;

use canmatrix_core::bits::{self, BitLayout};
use canmatrix_core::{
    decode_raw, encode_raw, to_physical, to_raw, ArbitrationId, ByteOrder, Decimal, Frame, RawValue, Signal,
};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// A signal placed anywhere it fits in 8 bytes, with a raw value of its width
fn placed_signal() -> impl Strategy<Value = (Signal, RawValue)> {
    (1u32..=64, any::<bool>(), any::<bool>(), any::<u64>())
        .prop_flat_map(|(size, motorola, signed, bits)| {
            (0u32..=(64 - size)).prop_map(move |start| {
                let mut signal = if motorola {
                    Signal::motorola("Field", start, size)
                } else {
                    Signal::intel("Field", start, size)
                };
                signal.is_signed = signed;
                let raw = raw_of_width(bits, size, signed);
                (signal, raw)
            })
        })
}

fn raw_of_width(bits: u64, size: u32, signed: bool) -> RawValue {
    let masked = if size == 64 { bits } else { bits & ((1u64 << size) - 1) };
    if signed {
        let shift = 64 - size;
        RawValue::Integer((((masked << shift) as i64) >> shift) as i128)
    } else {
        RawValue::Integer(masked as i128)
    }
}

fn single_signal_frame(signal: Signal) -> Frame {
    Frame::new("Probe", ArbitrationId::standard(0x7FF), 8)
        .with_signal(signal)
        .unwrap()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_raw_round_trip((signal, raw) in placed_signal()) {
        let frame = single_signal_frame(signal);
        let mut values = BTreeMap::new();
        values.insert("Field".to_string(), raw);

        let payload = encode_raw(&frame, &values).unwrap();
        prop_assert_eq!(payload.len(), 8);

        let decoded = decode_raw(&frame, &payload).unwrap();
        prop_assert_eq!(&decoded["Field"], &raw);
    }

    #[test]
    fn prop_two_byte_orders_side_by_side(
        intel_size in 1u32..=32,
        motorola_size in 1u32..=32,
        intel_bits in any::<u64>(),
        motorola_bits in any::<u64>(),
        offsets in (0u32..32, 0u32..32),
    ) {
        // Intel field in bytes 0..4, Motorola field in bytes 4..8
        let intel_start = offsets.0 % (32 - intel_size + 1);
        let motorola_start = 32 + offsets.1 % (32 - motorola_size + 1);

        let frame = Frame::new("Mixed", ArbitrationId::standard(0x10), 8)
            .with_signal(Signal::intel("Le", intel_start, intel_size))
            .unwrap()
            .with_signal(Signal::motorola("Be", motorola_start, motorola_size))
            .unwrap();
        frame.check_consistency().unwrap();

        let mut values = BTreeMap::new();
        values.insert("Le".to_string(), raw_of_width(intel_bits, intel_size, false));
        values.insert("Be".to_string(), raw_of_width(motorola_bits, motorola_size, false));

        let payload = encode_raw(&frame, &values).unwrap();
        prop_assert_eq!(decode_raw(&frame, &payload).unwrap(), values);
    }

    #[test]
    fn prop_insert_leaves_other_bits_alone(
        (signal, raw) in placed_signal(),
        background in any::<[u8; 8]>(),
    ) {
        let mut payload = background;
        bits::insert(&signal, "Probe", &mut payload, &raw).unwrap();

        let occupied: Vec<u64> = BitLayout::for_signal(&signal).unwrap().occupied_bits().collect();
        for bit in 0..64u64 {
            if occupied.contains(&bit) {
                continue;
            }
            let byte = (bit / 8) as usize;
            let mask = 1u8 << (bit % 8);
            prop_assert_eq!(payload[byte] & mask, background[byte] & mask, "bit {} changed", bit);
        }
        prop_assert_eq!(occupied.len(), signal.size as usize);
    }

    #[test]
    fn prop_scale_invertible(
        factor_digits in 1i64..100_000,
        factor_scale in 0u32..6,
        offset_digits in -1_000_000i64..1_000_000,
        raw in 0u16..=u16::MAX,
    ) {
        let factor = Decimal::new(factor_digits, factor_scale);
        let offset = Decimal::new(offset_digits, 2);
        let signal = Signal::intel("Scaled", 0, 16).with_factor_offset(factor, offset);

        let raw = RawValue::Integer(raw as i128);
        let physical = to_physical(&signal, &raw, false).unwrap();
        prop_assert_eq!(to_raw(&signal, &physical).unwrap(), raw);
    }

    #[test]
    fn prop_byte_order_symmetry(size in 9u32..=24, value in any::<u32>()) {
        // Same field, same byte range, both byte orders: both recover the value
        let intel = Signal::intel("Le", 8, size);
        let motorola = Signal::motorola("Be", 8, size);
        let raw = raw_of_width(value as u64, size, false);

        for signal in [intel, motorola] {
            let mut payload = [0u8; 8];
            bits::insert(&signal, "Sym", &mut payload, &raw).unwrap();
            prop_assert_eq!(bits::extract(&signal, "Sym", &payload).unwrap(), raw);
        }
    }
}

#[test]
fn test_motorola_layout_matches_scheme_conversion() {
    let mut signal = Signal::motorola("Be", 12, 10);
    assert_eq!(signal.byte_order, ByteOrder::BigEndian);
    let as_scheme0 = signal.start_bit_as(canmatrix_core::BitNumbering::Scheme0);
    signal.set_start_bit(as_scheme0);

    let a = BitLayout::for_signal(&Signal::motorola("Be", 12, 10)).unwrap();
    let b = BitLayout::for_signal(&signal).unwrap();
    assert_eq!(a.occupied_bits().collect::<Vec<_>>(), b.occupied_bits().collect::<Vec<_>>());
}
