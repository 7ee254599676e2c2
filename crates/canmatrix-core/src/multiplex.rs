//! Multiplex resolution
//!
//! Decides which signals of a frame are meaningful for a given payload (or
//! for a value set about to be encoded). Only simple multiplexing is
//! resolved: one multiplexor whose raw value selects one flat signal set.
//! Frames flagged complex-multiplexed are refused.

use std::collections::HashMap;

use tracing::debug;

use crate::bits::{self, BitLayout};
use crate::error::{MatrixError, MatrixResult};
use crate::frame::Frame;
use crate::signal::Signal;
use crate::types::RawValue;

/// Signals active for one multiplex state, in frame order
#[derive(Debug, Clone)]
pub struct ActiveSet<'a> {
    /// The multiplexor, if the frame has one
    pub multiplexor: Option<&'a Signal>,
    /// Raw selector value the set was resolved for
    pub selector: Option<u64>,
    /// Every active signal, multiplexor included
    pub signals: Vec<&'a Signal>,
}

impl<'a> ActiveSet<'a> {
    pub fn contains(&self, name: &str) -> bool {
        self.signals.iter().any(|s| s.name == name)
    }

    /// Active signals other than the multiplexor
    pub fn multiplexed(&self) -> impl Iterator<Item = &'a Signal> + '_ {
        self.signals.iter().copied().filter(|s| !s.is_multiplexor())
    }
}

fn reject_complex(frame: &Frame) -> MatrixResult<()> {
    if frame.is_complex_multiplexed {
        return Err(MatrixError::UnsupportedMultiplexing(frame.name.clone()));
    }
    Ok(())
}

/// Active set for a payload about to be decoded.
///
/// The multiplexor, if any, is read out of the payload first.
pub fn resolve_for_decode<'a>(frame: &'a Frame, payload: &[u8]) -> MatrixResult<ActiveSet<'a>> {
    reject_complex(frame)?;
    let selector = match frame.multiplexor()? {
        Some(mux) => Some(bits::extract(mux, &frame.name, payload)?),
        None => None,
    };
    resolve(frame, selector.as_ref())
}

/// Active set for values about to be encoded.
///
/// `selector` is the multiplexor's raw value; when the frame has a
/// multiplexor and no selector is given, its initial value is used.
pub fn resolve_for_encode<'a>(frame: &'a Frame, selector: Option<&RawValue>) -> MatrixResult<ActiveSet<'a>> {
    reject_complex(frame)?;
    resolve(frame, selector)
}

fn resolve<'a>(frame: &'a Frame, selector: Option<&RawValue>) -> MatrixResult<ActiveSet<'a>> {
    let Some(mux) = frame.multiplexor()? else {
        let signals: Vec<&Signal> = frame.signals.iter().collect();
        check_overlaps(&frame.name, &signals)?;
        return Ok(ActiveSet {
            multiplexor: None,
            selector: None,
            signals,
        });
    };

    let raw = selector.unwrap_or(&mux.initial_value);
    let value = selector_value(mux, raw)?;
    debug!(frame = %frame.name, multiplexor = %mux.name, selector = value, "Resolved multiplex state");

    let signals: Vec<&Signal> = frame
        .signals
        .iter()
        .filter(|s| match s.multiplexer_value() {
            Some(v) => v == value,
            None => true,
        })
        .collect();
    check_overlaps(&frame.name, &signals)?;

    Ok(ActiveSet {
        multiplexor: Some(mux),
        selector: Some(value),
        signals,
    })
}

fn selector_value(mux: &Signal, raw: &RawValue) -> MatrixResult<u64> {
    raw.as_integer()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| MatrixError::RawOutOfRange {
            signal: mux.name.clone(),
            raw: raw.to_string(),
            size: mux.size,
        })
}

/// Fail if any two of `signals` share a payload bit
pub fn check_overlaps(frame: &str, signals: &[&Signal]) -> MatrixResult<()> {
    let mut owners: HashMap<u64, &str> = HashMap::new();
    for signal in signals {
        let layout = BitLayout::for_signal(signal)?;
        for bit in layout.occupied_bits() {
            if let Some(other) = owners.insert(bit, signal.name.as_str()) {
                return Err(MatrixError::Overlap {
                    frame: frame.to_string(),
                    signal: signal.name.clone(),
                    other: other.to_string(),
                    bit,
                });
            }
        }
    }
    Ok(())
}
