//! Frame definition
//!
//! A frame owns its signals (in insertion order) and its signal groups.
//! The model may be transiently inconsistent while an adapter builds it;
//! [`Frame::check_consistency`] and the codec report what is wrong.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attribute::Attributes;
use crate::bits::BitLayout;
use crate::config::CodecOptions;
use crate::error::{MatrixError, MatrixResult};
use crate::multiplex::check_overlaps;
use crate::signal::Signal;
use crate::transform::PhysicalValue;
use crate::types::ArbitrationId;

/// Largest payload of a classic CAN frame
pub const CLASSIC_MAX_SIZE: usize = 8;

/// Largest payload of a CAN FD frame
pub const FD_MAX_SIZE: usize = 64;

/// Signals that must be sampled or transmitted together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalGroup {
    pub name: String,
    pub id: u32,
    /// Member signal names, in order
    pub members: Vec<String>,
}

/// One CAN message definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub arbitration_id: ArbitrationId,
    /// Payload length in bytes
    pub size: usize,
    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub signal_groups: Vec<SignalGroup>,
    /// Transmitting node names
    #[serde(default)]
    pub transmitters: BTreeSet<String>,
    /// Multi-level multiplexing the codec refuses to handle
    #[serde(default)]
    pub is_complex_multiplexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Frame {
    pub fn new(name: impl Into<String>, arbitration_id: ArbitrationId, size: usize) -> Self {
        Self {
            name: name.into(),
            arbitration_id,
            size,
            signals: Vec::new(),
            signal_groups: Vec::new(),
            transmitters: BTreeSet::new(),
            is_complex_multiplexed: false,
            comment: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_transmitter(mut self, node: impl Into<String>) -> Self {
        self.transmitters.insert(node.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Builder form of [`Frame::add_signal`]
    pub fn with_signal(mut self, signal: Signal) -> MatrixResult<Self> {
        self.add_signal(signal)?;
        Ok(self)
    }

    /// Append a signal; names must be unique within the frame
    pub fn add_signal(&mut self, signal: Signal) -> MatrixResult<()> {
        if self.signal(&signal.name).is_some() {
            return Err(MatrixError::DuplicateSignal {
                frame: self.name.clone(),
                signal: signal.name,
            });
        }
        self.signals.push(signal);
        Ok(())
    }

    /// Remove a signal and drop it from every signal group
    pub fn remove_signal(&mut self, name: &str) -> MatrixResult<Signal> {
        let pos = self
            .signals
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| self.signal_not_found(name))?;
        for group in &mut self.signal_groups {
            group.members.retain(|member| member != name);
        }
        Ok(self.signals.remove(pos))
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn signal_mut(&mut self, name: &str) -> Option<&mut Signal> {
        self.signals.iter_mut().find(|s| s.name == name)
    }

    /// Like [`Frame::signal`], but a miss is an error
    pub fn find_signal(&self, name: &str) -> MatrixResult<&Signal> {
        self.signal(name).ok_or_else(|| self.signal_not_found(name))
    }

    fn signal_not_found(&self, name: &str) -> MatrixError {
        MatrixError::SignalNotFound {
            frame: self.name.clone(),
            signal: name.to_string(),
        }
    }

    /// Add a signal group whose members must all belong to this frame
    pub fn add_signal_group<I, S>(&mut self, name: impl Into<String>, id: u32, members: I) -> MatrixResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group = SignalGroup {
            name: name.into(),
            id,
            members: members.into_iter().map(Into::into).collect(),
        };
        if self.signal_group(&group.name).is_some() {
            return Err(MatrixError::DuplicateSignalGroup {
                frame: self.name.clone(),
                group: group.name,
            });
        }
        self.check_group(&group)?;
        self.signal_groups.push(group);
        Ok(())
    }

    pub fn signal_group(&self, name: &str) -> Option<&SignalGroup> {
        self.signal_groups.iter().find(|g| g.name == name)
    }

    pub fn remove_signal_group(&mut self, name: &str) -> MatrixResult<SignalGroup> {
        let pos = self
            .signal_groups
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| MatrixError::SignalGroupNotFound {
                frame: self.name.clone(),
                group: name.to_string(),
            })?;
        Ok(self.signal_groups.remove(pos))
    }

    /// Member signals of a group, in group order
    pub fn group_signals(&self, name: &str) -> MatrixResult<Vec<&Signal>> {
        let group = self
            .signal_group(name)
            .ok_or_else(|| MatrixError::SignalGroupNotFound {
                frame: self.name.clone(),
                group: name.to_string(),
            })?;
        group
            .members
            .iter()
            .map(|member| self.find_signal(member))
            .collect()
    }

    fn check_group(&self, group: &SignalGroup) -> MatrixResult<()> {
        match group.members.iter().find(|m| self.signal(m).is_none()) {
            Some(foreign) => Err(MatrixError::ForeignGroupMember {
                frame: self.name.clone(),
                group: group.name.clone(),
                signal: foreign.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Union of all signal receivers
    pub fn receivers(&self) -> BTreeSet<String> {
        self.signals
            .iter()
            .flat_map(|s| s.receivers.iter().cloned())
            .collect()
    }

    /// Payload longer than a classic frame allows
    pub fn is_fd(&self) -> bool {
        self.size > CLASSIC_MAX_SIZE
    }

    /// The is-the-multiplexor signal, if any
    pub fn multiplexor(&self) -> MatrixResult<Option<&Signal>> {
        let mut muxes = self.signals.iter().filter(|s| s.is_multiplexor());
        let first = muxes.next();
        if let (Some(first), Some(second)) = (first, muxes.next()) {
            return Err(MatrixError::MultipleMultiplexors {
                frame: self.name.clone(),
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }
        Ok(first)
    }

    /// Whether any signal acts as multiplexor
    pub fn is_multiplexed(&self) -> bool {
        self.signals.iter().any(Signal::is_multiplexor)
    }

    /// Distinct selector values used by multiplexed signals
    pub fn multiplexer_values(&self) -> BTreeSet<u64> {
        self.signals
            .iter()
            .filter_map(Signal::multiplexer_value)
            .collect()
    }

    /// Cycle time in milliseconds, from the `GenMsgCycleTime` attribute
    pub fn cycle_time(&self) -> Option<i64> {
        self.attributes.get("GenMsgCycleTime").and_then(|v| v.as_int())
    }

    /// Verify the frame invariants.
    ///
    /// The payload is at most [`FD_MAX_SIZE`] bytes and the arbitration id
    /// fits its width. Signal names are unique, group members belong to the
    /// frame, there is at most one multiplexor, every signal has a packable
    /// shape, and no two signals active under the same selector value share
    /// a bit.
    pub fn check_consistency(&self) -> MatrixResult<()> {
        if self.size > FD_MAX_SIZE {
            return Err(MatrixError::InvalidFrame {
                frame: self.name.clone(),
                reason: format!("{} byte payload exceeds {} bytes", self.size, FD_MAX_SIZE),
            });
        }
        if !self.arbitration_id.is_valid() {
            return Err(MatrixError::InvalidFrame {
                frame: self.name.clone(),
                reason: format!("arbitration id {} out of range", self.arbitration_id),
            });
        }

        let mut seen = BTreeSet::new();
        for signal in &self.signals {
            if !seen.insert(signal.name.as_str()) {
                return Err(MatrixError::DuplicateSignal {
                    frame: self.name.clone(),
                    signal: signal.name.clone(),
                });
            }
            BitLayout::for_signal(signal)?;
        }
        for group in &self.signal_groups {
            self.check_group(group)?;
        }

        // Without a multiplexor every signal is active at once, tagged or not
        if self.multiplexor()?.is_none() {
            let all: Vec<&Signal> = self.signals.iter().collect();
            return check_overlaps(&self.name, &all);
        }

        let static_set: Vec<&Signal> = self
            .signals
            .iter()
            .filter(|s| s.multiplexer_value().is_none())
            .collect();
        check_overlaps(&self.name, &static_set)?;

        let mut by_value: BTreeMap<u64, Vec<&Signal>> = BTreeMap::new();
        for signal in &self.signals {
            if let Some(value) = signal.multiplexer_value() {
                by_value.entry(value).or_default().push(signal);
            }
        }
        for muxed in by_value.values() {
            let mut active = static_set.clone();
            active.extend(muxed.iter().copied());
            check_overlaps(&self.name, &active)?;
        }
        Ok(())
    }

    /// Encode physical values with default codec options
    pub fn encode(&self, values: &BTreeMap<String, PhysicalValue>) -> MatrixResult<Vec<u8>> {
        crate::encode::encode(self, values, &CodecOptions::default())
    }

    /// Decode a payload with default codec options
    pub fn decode(&self, payload: &[u8]) -> MatrixResult<BTreeMap<String, PhysicalValue>> {
        crate::decode::decode(self, payload, &CodecOptions::default())
    }
}
