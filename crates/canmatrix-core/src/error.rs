//! Error types for the matrix model and frame codec

use thiserror::Error;

use crate::attribute::ObjectKind;
use crate::types::ArbitrationId;

/// Broad classification of a [`MatrixError`]
///
/// Adapters usually only care about the class: a `Lookup` miss while
/// importing is skipped, a `ModelInconsistency` is reported against the
/// offending frame, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Overlapping bits, duplicate names, foreign group members, malformed signals
    ModelInconsistency,
    /// A signal does not fit the payload, or the payload has the wrong length
    EncodeRange,
    /// Encode/decode requested on a complex-multiplexed frame
    UnsupportedMultiplexing,
    /// Physical/raw conversion failed
    Transform,
    /// A name-based query missed
    Lookup,
    /// Attribute key not declared, or value outside its declared type
    Attribute,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ModelInconsistency => "model inconsistency",
            ErrorKind::EncodeRange => "encode range",
            ErrorKind::UnsupportedMultiplexing => "unsupported multiplexing",
            ErrorKind::Transform => "transform",
            ErrorKind::Lookup => "lookup",
            ErrorKind::Attribute => "attribute",
        };
        f.write_str(s)
    }
}

/// Errors raised by the model, the value transform and the frame codec
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Two simultaneously active signals share at least one payload bit
    #[error("signal {signal} overlaps signal {other} in frame {frame} (bit {bit})")]
    Overlap {
        frame: String,
        signal: String,
        other: String,
        bit: u64,
    },

    /// A signal group lists a signal its frame does not own
    #[error("signal group {group} in frame {frame} references foreign signal {signal}")]
    ForeignGroupMember {
        frame: String,
        group: String,
        signal: String,
    },

    /// Signal name already used inside the frame
    #[error("duplicate signal {signal} in frame {frame}")]
    DuplicateSignal { frame: String, signal: String },

    /// Signal group name already used inside the frame
    #[error("duplicate signal group {group} in frame {frame}")]
    DuplicateSignalGroup { frame: String, group: String },

    /// Frame name already used in the matrix
    #[error("duplicate frame {0}")]
    DuplicateFrame(String),

    /// Node name already used in the matrix
    #[error("duplicate node {0}")]
    DuplicateNode(String),

    /// More than one signal claims to be the multiplexor
    #[error("frame {frame} has more than one multiplexor ({first}, {second})")]
    MultipleMultiplexors {
        frame: String,
        first: String,
        second: String,
    },

    /// Signal shape cannot be packed (width, float width, flag combination)
    #[error("invalid signal {signal}: {reason}")]
    InvalidSignal { signal: String, reason: String },

    /// Frame header out of range (payload length or arbitration id)
    #[error("invalid frame {frame}: {reason}")]
    InvalidFrame { frame: String, reason: String },

    /// Signal bit range runs past the end of the payload
    #[error("signal {signal} needs bits up to {end} but frame {frame} only has {available}")]
    BitRange {
        frame: String,
        signal: String,
        end: u64,
        available: u64,
    },

    /// Payload handed to decode does not match the frame length
    #[error("payload for frame {frame} must be {expected} bytes, got {actual}")]
    PayloadLength {
        frame: String,
        expected: usize,
        actual: usize,
    },

    /// Frame is flagged complex-multiplexed
    #[error("frame {0} uses complex multiplexing, which cannot be encoded or decoded")]
    UnsupportedMultiplexing(String),

    /// Inverse scaling with a zero factor
    #[error("signal {0} has a zero factor")]
    ZeroFactor(String),

    /// Label given for a signal whose value table does not contain it
    #[error("label {label:?} is not in the value table of signal {signal}")]
    UnknownLabel { signal: String, label: String },

    /// Raw value does not fit the signal's width and signedness
    #[error("raw value {raw} does not fit {size}-bit signal {signal}")]
    RawOutOfRange {
        signal: String,
        raw: String,
        size: u32,
    },

    /// Value cannot be expressed in the required numeric domain
    #[error("value for signal {signal} is not representable: {reason}")]
    NotRepresentable { signal: String, reason: String },

    /// Frame not found by name
    #[error("frame not found: {0}")]
    FrameNotFound(String),

    /// Frame not found by arbitration id
    #[error("no frame with arbitration id {0}")]
    FrameIdNotFound(ArbitrationId),

    /// Signal not found inside a frame
    #[error("signal {signal} not found in frame {frame}")]
    SignalNotFound { frame: String, signal: String },

    /// Signal group not found inside a frame
    #[error("signal group {group} not found in frame {frame}")]
    SignalGroupNotFound { frame: String, group: String },

    /// Node not found by name
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Shared value table not found by name
    #[error("value table not found: {0}")]
    ValueTableNotFound(String),

    /// Bus not found in a cluster
    #[error("bus not found: {0}")]
    BusNotFound(String),

    /// Attribute key not declared for the entity kind
    #[error("attribute {key} is not defined for {kind} objects")]
    UndefinedAttribute { kind: ObjectKind, key: String },

    /// Attribute value rejected by its definition
    #[error("invalid value {value} for attribute {key}: {reason}")]
    InvalidAttributeValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Attribute type definition string could not be parsed
    #[error("invalid attribute definition: {0:?}")]
    InvalidAttributeDefinition(String),
}

impl MatrixError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatrixError::Overlap { .. }
            | MatrixError::ForeignGroupMember { .. }
            | MatrixError::DuplicateSignal { .. }
            | MatrixError::DuplicateSignalGroup { .. }
            | MatrixError::DuplicateFrame(_)
            | MatrixError::DuplicateNode(_)
            | MatrixError::MultipleMultiplexors { .. }
            | MatrixError::InvalidSignal { .. }
            | MatrixError::InvalidFrame { .. } => ErrorKind::ModelInconsistency,
            MatrixError::BitRange { .. } | MatrixError::PayloadLength { .. } => {
                ErrorKind::EncodeRange
            }
            MatrixError::UnsupportedMultiplexing(_) => ErrorKind::UnsupportedMultiplexing,
            MatrixError::ZeroFactor(_)
            | MatrixError::UnknownLabel { .. }
            | MatrixError::RawOutOfRange { .. }
            | MatrixError::NotRepresentable { .. } => ErrorKind::Transform,
            MatrixError::FrameNotFound(_)
            | MatrixError::FrameIdNotFound(_)
            | MatrixError::SignalNotFound { .. }
            | MatrixError::SignalGroupNotFound { .. }
            | MatrixError::NodeNotFound(_)
            | MatrixError::ValueTableNotFound(_)
            | MatrixError::BusNotFound(_) => ErrorKind::Lookup,
            MatrixError::UndefinedAttribute { .. }
            | MatrixError::InvalidAttributeValue { .. }
            | MatrixError::InvalidAttributeDefinition(_) => ErrorKind::Attribute,
        }
    }
}

/// Result type for matrix operations
pub type MatrixResult<T> = Result<T, MatrixError>;
