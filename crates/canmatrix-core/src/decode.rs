//! Frame decoding
//!
//! Inactive multiplexed signals are absent from the result, so "not present
//! in this multiplex state" stays distinguishable from "present and zero".

use std::collections::BTreeMap;

use crate::bits;
use crate::config::CodecOptions;
use crate::error::{MatrixError, MatrixResult};
use crate::frame::Frame;
use crate::multiplex;
use crate::transform::{self, PhysicalValue};
use crate::types::RawValue;

/// Decode a payload into raw values of the active signals
pub fn decode_raw(frame: &Frame, payload: &[u8]) -> MatrixResult<BTreeMap<String, RawValue>> {
    if payload.len() != frame.size {
        return Err(MatrixError::PayloadLength {
            frame: frame.name.clone(),
            expected: frame.size,
            actual: payload.len(),
        });
    }

    let active = multiplex::resolve_for_decode(frame, payload)?;
    active
        .signals
        .iter()
        .map(|signal| bits::extract(signal, &frame.name, payload).map(|raw| (signal.name.clone(), raw)))
        .collect()
}

/// Decode a payload into physical values of the active signals
pub fn decode(
    frame: &Frame,
    payload: &[u8],
    options: &CodecOptions,
) -> MatrixResult<BTreeMap<String, PhysicalValue>> {
    let raw = decode_raw(frame, payload)?;
    raw.into_iter()
        .map(|(name, raw)| -> MatrixResult<(String, PhysicalValue)> {
            let signal = frame.find_signal(&name)?;
            let value = transform::to_physical(signal, &raw, options.decode_labels)?;
            Ok((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use crate::types::{ArbitrationId, MultiplexIndicator};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn climate() -> Frame {
        let mut frame = Frame::new("Climate", ArbitrationId::standard(0x3A0), 3);
        frame
            .add_signal(
                Signal::intel("Temperature", 0, 12)
                    .signed()
                    .with_factor_offset(Decimal::new(5, 1), Decimal::ZERO),
            )
            .unwrap();
        frame
            .add_signal(Signal::intel("Mode", 12, 2).with_value(0, "Off").with_value(1, "Auto"))
            .unwrap();
        frame.add_signal(Signal::intel("Fan", 16, 4)).unwrap();
        frame
    }

    #[test]
    fn test_decode_raw_and_physical() {
        // Temperature -10 (0xFF6), Mode 1, Fan 3
        let payload = [0xF6, 0x1F, 0x03];
        let frame = climate();

        let raw = decode_raw(&frame, &payload).unwrap();
        assert_eq!(raw["Temperature"], RawValue::Integer(-10));
        assert_eq!(raw["Mode"], RawValue::Integer(1));
        assert_eq!(raw["Fan"], RawValue::Integer(3));

        let values = decode(&frame, &payload, &CodecOptions::default()).unwrap();
        assert_eq!(values["Temperature"], PhysicalValue::Number(Decimal::new(-50, 1)));
        assert_eq!(values["Mode"], PhysicalValue::from("Auto"));

        let values = decode(&frame, &payload, &CodecOptions::numeric()).unwrap();
        assert_eq!(values["Mode"], PhysicalValue::from(1i64));
    }

    #[test]
    fn test_payload_length_must_match() {
        let err = decode(&climate(), &[0, 0], &CodecOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::PayloadLength {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_signal_past_payload_end() {
        let mut frame = climate();
        frame.add_signal(Signal::intel("Spill", 20, 8)).unwrap();
        let err = decode_raw(&frame, &[0, 0, 0]).unwrap_err();
        assert!(matches!(err, MatrixError::BitRange { end: 28, available: 24, .. }));
    }

    #[test]
    fn test_inactive_signals_are_omitted() {
        let mut frame = Frame::new("Diag", ArbitrationId::standard(0x300), 2);
        frame
            .add_signal(Signal::intel("Page", 0, 8).with_multiplex(MultiplexIndicator::Multiplexor))
            .unwrap();
        frame
            .add_signal(Signal::intel("Low", 8, 8).with_multiplex(MultiplexIndicator::Multiplexed(0)))
            .unwrap();
        frame
            .add_signal(Signal::intel("High", 8, 8).with_multiplex(MultiplexIndicator::Multiplexed(1)))
            .unwrap();

        let values = decode_raw(&frame, &[0x00, 0x42]).unwrap();
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["Low", "Page"]);
        assert_eq!(values["Low"], RawValue::Integer(0x42));

        let values = decode_raw(&frame, &[0x01, 0x42]).unwrap();
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["High", "Page"]);
    }
}
