//! Frame encoding
//!
//! Builds a payload of exactly `frame.size` bytes from a map of signal
//! values. The multiplexor is settled first; only signals active under its
//! value are packed, everything else stays zero.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::bits;
use crate::config::CodecOptions;
use crate::error::{MatrixError, MatrixResult};
use crate::frame::Frame;
use crate::multiplex::{self, ActiveSet};
use crate::signal::Signal;
use crate::transform::{self, PhysicalValue};
use crate::types::RawValue;

fn check_names<V>(frame: &Frame, values: &BTreeMap<String, V>) -> MatrixResult<()> {
    match values.keys().find(|name| frame.signal(name).is_none()) {
        Some(name) => Err(MatrixError::SignalNotFound {
            frame: frame.name.clone(),
            signal: name.clone(),
        }),
        None => Ok(()),
    }
}

fn reject_complex(frame: &Frame) -> MatrixResult<()> {
    if frame.is_complex_multiplexed {
        return Err(MatrixError::UnsupportedMultiplexing(frame.name.clone()));
    }
    Ok(())
}

/// Pack the active set; `raw_for` supplies each signal's raw value
fn pack<F>(frame: &Frame, active: &ActiveSet<'_>, mut raw_for: F) -> MatrixResult<Vec<u8>>
where
    F: FnMut(&Signal) -> MatrixResult<RawValue>,
{
    let mut payload = vec![0u8; frame.size];
    for signal in active.signals.iter().copied() {
        let raw = raw_for(signal)?;
        bits::insert(signal, &frame.name, &mut payload, &raw)?;
    }
    Ok(payload)
}

fn initial_value(frame: &Frame, signal: &Signal) -> RawValue {
    trace!(frame = %frame.name, signal = %signal.name, raw = %signal.initial_value, "Using initial value");
    signal.initial_value
}

fn warn_if_out_of_bounds(frame: &Frame, signal: &Signal, value: &PhysicalValue) {
    let Some(number) = value.as_decimal() else {
        return;
    };
    let below = signal.min.is_some_and(|min| number < min);
    let above = signal.max.is_some_and(|max| number > max);
    if below || above {
        warn!(
            frame = %frame.name,
            signal = %signal.name,
            value = %number,
            "Physical value outside advisory range, encoding anyway"
        );
    }
}

/// Encode physical values (numbers or labels) into a payload.
///
/// Signals missing from `values` fall back to their initial raw value.
/// Values given for signals that are inactive under the resulting
/// multiplex state are ignored; names the frame does not own are an error.
pub fn encode(
    frame: &Frame,
    values: &BTreeMap<String, PhysicalValue>,
    options: &CodecOptions,
) -> MatrixResult<Vec<u8>> {
    reject_complex(frame)?;
    check_names(frame, values)?;

    let selector = match frame.multiplexor()? {
        Some(mux) => match values.get(&mux.name) {
            Some(value) => Some(transform::to_raw(mux, value)?),
            None => None,
        },
        None => None,
    };
    let active = multiplex::resolve_for_encode(frame, selector.as_ref())?;

    pack(frame, &active, |signal| match values.get(&signal.name) {
        Some(value) => {
            if options.warn_out_of_range {
                warn_if_out_of_bounds(frame, signal, value);
            }
            transform::to_raw(signal, value)
        }
        None => Ok(initial_value(frame, signal)),
    })
}

/// Encode raw values into a payload, bypassing scaling and value tables
pub fn encode_raw(frame: &Frame, values: &BTreeMap<String, RawValue>) -> MatrixResult<Vec<u8>> {
    reject_complex(frame)?;
    check_names(frame, values)?;

    let selector = frame
        .multiplexor()?
        .and_then(|mux| values.get(&mux.name));
    let active = multiplex::resolve_for_encode(frame, selector)?;

    pack(frame, &active, |signal| {
        Ok(match values.get(&signal.name) {
            Some(raw) => *raw,
            None => initial_value(frame, signal),
        })
    })
}

/// Payload with every signal at its initial value
pub fn startup_payload(frame: &Frame) -> MatrixResult<Vec<u8>> {
    let payload = encode_raw(frame, &BTreeMap::new())?;
    debug!(frame = %frame.name, payload = %hex::encode(&payload), "Synthesized startup payload");
    Ok(payload)
}
