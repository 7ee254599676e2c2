//! canmatrix-core - CAN Communication Matrix Model and Frame Codec
//!
//! The in-memory pivot model that every CAN database format converts to and
//! from, plus the bit-level codec that turns signal values into frame
//! payloads and back.
//!
//! # Features
//!
//! - **Both byte orders** - Intel and Motorola signals, bit-exact
//! - **Explicit start-bit schemes** - `StartBit::Scheme0` / `StartBit::Scheme1`, never guessed
//! - **Exact scaling** - factor and offset are decimals, so `0.1` stays `0.1`
//! - **Value tables** - decode to labels, encode from labels
//! - **Simple multiplexing** - inactive signals are left out, not zeroed
//! - **Checked attributes** - every key must be declared before it is set
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use canmatrix_core::prelude::*;
//! use canmatrix_core::Decimal;
//!
//! // Vehicle speed: raw 100 * 0.1 = 10.0 km/h
//! let frame = Frame::new("Vehicle", ArbitrationId::standard(0x100), 8)
//!     .with_signal(
//!         Signal::intel("Speed", 0, 16)
//!             .with_factor_offset(Decimal::new(1, 1), Decimal::ZERO)
//!             .with_unit("km/h"),
//!     )
//!     .unwrap();
//!
//! let mut values = BTreeMap::new();
//! values.insert("Speed".to_string(), PhysicalValue::from(Decimal::new(100, 1)));
//!
//! let payload = frame.encode(&values).unwrap();
//! assert_eq!(payload, vec![0x64, 0x00, 0, 0, 0, 0, 0, 0]);
//!
//! let decoded = frame.decode(&payload).unwrap();
//! assert_eq!(decoded["Speed"], PhysicalValue::from(Decimal::new(100, 1)));
//! ```
//!
//! # Bit Numbering
//!
//! | Byte order | Scheme 0 start bit | Scheme 1 start bit |
//! |------------|--------------------|--------------------|
//! | Intel | LSB, counted LSB-first | same number |
//! | Motorola | MSB, counted LSB-first in its byte | MSB, counted MSB-first in its byte |
//!
//! Converting a Motorola start bit between the schemes mirrors it inside its
//! byte: `(bit / 8) * 8 + 7 - bit % 8`.

pub mod attribute;
pub mod bits;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;
pub mod matrix;
pub mod multiplex;
pub mod signal;
pub mod transform;
pub mod types;

// Re-export main types
pub use attribute::{
    AttributeDefinition, AttributeRegistry, AttributeType, AttributeValue, Attributes, ObjectKind,
};
pub use bits::BitLayout;
pub use config::CodecOptions;
pub use decode::{decode, decode_raw};
pub use encode::{encode, encode_raw, startup_payload};
pub use error::{ErrorKind, MatrixError, MatrixResult};
pub use frame::{Frame, SignalGroup};
pub use matrix::{AttributeTarget, CanCluster, CanMatrix, Node};
pub use multiplex::ActiveSet;
pub use rust_decimal::Decimal;
pub use signal::{BaseType, Signal, ValueTable};
pub use transform::{to_physical, to_raw, PhysicalValue};
pub use types::{ArbitrationId, BitNumbering, ByteOrder, MultiplexIndicator, RawValue, StartBit};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::CodecOptions;
    pub use crate::error::{MatrixError, MatrixResult};
    pub use crate::frame::Frame;
    pub use crate::matrix::{AttributeTarget, CanMatrix, Node};
    pub use crate::signal::Signal;
    pub use crate::transform::PhysicalValue;
    pub use crate::types::{ArbitrationId, ByteOrder, MultiplexIndicator, RawValue, StartBit};
}
