//! Raw/physical value conversion
//!
//! `physical = raw * factor + offset`, carried out in decimal arithmetic so
//! factors like 0.1 do not pick up binary rounding noise across round trips.
//! Value-table labels short-circuit the scaling in both directions.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, MatrixResult};
use crate::signal::Signal;
use crate::types::RawValue;

/// Scaled, human-meaningful value of a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalValue {
    /// Scaled value of an integer signal
    Number(Decimal),
    /// Scaled value of a float signal (may be NaN or infinite)
    Float(f64),
    /// Value-table label
    Label(String),
}

impl PhysicalValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            PhysicalValue::Number(d) => Some(*d),
            PhysicalValue::Float(f) => Decimal::from_f64(*f),
            PhysicalValue::Label(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PhysicalValue::Number(d) => d.to_f64(),
            PhysicalValue::Float(f) => Some(*f),
            PhysicalValue::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            PhysicalValue::Label(l) => Some(l),
            _ => None,
        }
    }
}

impl From<Decimal> for PhysicalValue {
    fn from(v: Decimal) -> Self {
        PhysicalValue::Number(v)
    }
}

impl From<i64> for PhysicalValue {
    fn from(v: i64) -> Self {
        PhysicalValue::Number(Decimal::from(v))
    }
}

impl From<f64> for PhysicalValue {
    fn from(v: f64) -> Self {
        PhysicalValue::Float(v)
    }
}

impl From<&str> for PhysicalValue {
    fn from(v: &str) -> Self {
        PhysicalValue::Label(v.to_string())
    }
}

impl From<String> for PhysicalValue {
    fn from(v: String) -> Self {
        PhysicalValue::Label(v)
    }
}

impl std::fmt::Display for PhysicalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhysicalValue::Number(d) => write!(f, "{}", d),
            PhysicalValue::Float(v) => write!(f, "{}", v),
            PhysicalValue::Label(l) => f.write_str(l),
        }
    }
}

fn not_representable(signal: &Signal, reason: impl Into<String>) -> MatrixError {
    MatrixError::NotRepresentable {
        signal: signal.name.clone(),
        reason: reason.into(),
    }
}

fn factor_f64(signal: &Signal) -> MatrixResult<(f64, f64)> {
    let factor = signal
        .factor
        .to_f64()
        .ok_or_else(|| not_representable(signal, "factor does not fit a double"))?;
    let offset = signal
        .offset
        .to_f64()
        .ok_or_else(|| not_representable(signal, "offset does not fit a double"))?;
    Ok((factor, offset))
}

fn is_identity(signal: &Signal) -> bool {
    signal.factor == Decimal::ONE && signal.offset.is_zero()
}

/// Convert a raw value to its physical form.
///
/// With `use_labels`, an integer raw value present in the value table
/// yields its label instead of the scaled number.
pub fn to_physical(signal: &Signal, raw: &RawValue, use_labels: bool) -> MatrixResult<PhysicalValue> {
    match raw {
        RawValue::Integer(v) => {
            if use_labels {
                if let Some(label) = i64::try_from(*v)
                    .ok()
                    .and_then(|key| signal.value_table.label(key))
                {
                    return Ok(PhysicalValue::Label(label.to_string()));
                }
            }
            let raw = Decimal::try_from_i128_with_scale(*v, 0)
                .map_err(|e| not_representable(signal, e.to_string()))?;
            let physical = raw
                .checked_mul(signal.factor)
                .and_then(|scaled| scaled.checked_add(signal.offset))
                .ok_or_else(|| not_representable(signal, "decimal overflow while scaling"))?;
            Ok(PhysicalValue::Number(physical))
        }
        RawValue::Single(_) | RawValue::Double(_) => {
            let value = raw.as_f64();
            if is_identity(signal) {
                return Ok(PhysicalValue::Float(value));
            }
            let (factor, offset) = factor_f64(signal)?;
            Ok(PhysicalValue::Float(value * factor + offset))
        }
    }
}

fn label_to_raw(signal: &Signal, label: &str) -> MatrixResult<RawValue> {
    signal
        .value_table
        .raw_for_label(label)
        .map(|raw| RawValue::Integer(raw as i128))
        .ok_or_else(|| MatrixError::UnknownLabel {
            signal: signal.name.clone(),
            label: label.to_string(),
        })
}

/// Convert a physical value back to the raw value that encodes it.
///
/// Labels resolve through the value table; numbers are inverted as
/// `round((physical - offset) / factor)`, halves rounding away from zero.
pub fn to_raw(signal: &Signal, physical: &PhysicalValue) -> MatrixResult<RawValue> {
    if let PhysicalValue::Label(label) = physical {
        return label_to_raw(signal, label);
    }

    if signal.factor.is_zero() {
        return Err(MatrixError::ZeroFactor(signal.name.clone()));
    }

    if signal.is_float {
        let value = match physical {
            PhysicalValue::Float(f) => *f,
            other => other
                .as_f64()
                .ok_or_else(|| not_representable(signal, format!("{} is not a number", other)))?,
        };
        let raw = if is_identity(signal) {
            value
        } else {
            let (factor, offset) = factor_f64(signal)?;
            (value - offset) / factor
        };
        return Ok(if signal.size == 32 {
            RawValue::Single(raw as f32)
        } else {
            RawValue::Double(raw)
        });
    }

    let value = match physical {
        PhysicalValue::Number(d) => *d,
        PhysicalValue::Float(f) => Decimal::from_f64(*f)
            .ok_or_else(|| not_representable(signal, format!("{} has no decimal form", f)))?,
        PhysicalValue::Label(label) => return label_to_raw(signal, label),
    };

    let unscaled = value
        .checked_sub(signal.offset)
        .and_then(|shifted| shifted.checked_div(signal.factor))
        .ok_or_else(|| not_representable(signal, "decimal overflow while unscaling"))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let raw = if unscaled.is_sign_negative() {
        unscaled.to_i64().map(i128::from)
    } else {
        unscaled.to_u64().map(i128::from)
    };
    raw.map(RawValue::Integer)
        .ok_or_else(|| MatrixError::RawOutOfRange {
            signal: signal.name.clone(),
            raw: unscaled.to_string(),
            size: signal.size,
        })
}
