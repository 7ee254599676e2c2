//! Network model
//!
//! [`CanMatrix`] owns every frame and node of one bus together with the
//! attribute definitions and shared value tables. All mutation goes
//! through names; nothing in the public API hands out positional indices.
//! Attributes are checked against the registry when they are assigned;
//! registered frames are only reachable mutably through checked methods.
//! [`CanMatrix::validate`] re-checks a matrix that came from elsewhere,
//! such as a deserialized one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::attribute::{AttributeDefinition, AttributeRegistry, AttributeValue, Attributes, ObjectKind};
use crate::config::CodecOptions;
use crate::decode;
use crate::encode;
use crate::error::{MatrixError, MatrixResult};
use crate::frame::Frame;
use crate::signal::{Signal, ValueTable};
use crate::transform::PhysicalValue;
use crate::types::ArbitrationId;

/// Frame attribute holding the hex-encoded startup payload
pub const START_VALUE_ATTRIBUTE: &str = "GenMsgStartValue";

/// An ECU on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Entity an attribute is read from or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTarget<'a> {
    Network,
    Node(&'a str),
    Frame(&'a str),
    Signal { frame: &'a str, signal: &'a str },
}

impl AttributeTarget<'_> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            AttributeTarget::Network => ObjectKind::Network,
            AttributeTarget::Node(_) => ObjectKind::Node,
            AttributeTarget::Frame(_) => ObjectKind::Frame,
            AttributeTarget::Signal { .. } => ObjectKind::Signal,
        }
    }
}

/// All frames, nodes and definitions of one bus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanMatrix {
    #[serde(default)]
    frames: Vec<Frame>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    attribute_definitions: AttributeRegistry,
    #[serde(default)]
    value_tables: BTreeMap<String, ValueTable>,
    /// Network-level attributes
    #[serde(default)]
    attributes: Attributes,
}

impl CanMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty matrix with a pre-populated attribute registry
    pub fn with_definitions(attribute_definitions: AttributeRegistry) -> Self {
        Self {
            attribute_definitions,
            ..Self::default()
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn add_node(&mut self, mut node: Node) -> MatrixResult<()> {
        if self.node(&node.name).is_some() {
            return Err(MatrixError::DuplicateNode(node.name));
        }
        self.attribute_definitions
            .validate_all(ObjectKind::Node, &mut node.attributes)?;
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node and every reference to it from transmitters and receivers
    pub fn remove_node(&mut self, name: &str) -> MatrixResult<Node> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| MatrixError::NodeNotFound(name.to_string()))?;
        for frame in &mut self.frames {
            frame.transmitters.remove(name);
            for signal in &mut frame.signals {
                signal.receivers.remove(name);
            }
        }
        Ok(self.nodes.remove(pos))
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn find_node(&self, name: &str) -> MatrixResult<&Node> {
        self.node(name)
            .ok_or_else(|| MatrixError::NodeNotFound(name.to_string()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    // =========================================================================
    // Frames and signals
    // =========================================================================

    /// Add a frame; its own and its signals' attributes must be declared
    pub fn add_frame(&mut self, mut frame: Frame) -> MatrixResult<()> {
        if self.frame(&frame.name).is_some() {
            return Err(MatrixError::DuplicateFrame(frame.name));
        }
        self.attribute_definitions
            .validate_all(ObjectKind::Frame, &mut frame.attributes)?;
        for signal in &mut frame.signals {
            self.attribute_definitions
                .validate_all(ObjectKind::Signal, &mut signal.attributes)?;
        }
        debug!(frame = %frame.name, id = %frame.arbitration_id, signals = frame.signals.len(), "Added frame");
        self.frames.push(frame);
        Ok(())
    }

    pub fn remove_frame(&mut self, name: &str) -> MatrixResult<Frame> {
        let pos = self
            .frames
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| MatrixError::FrameNotFound(name.to_string()))?;
        Ok(self.frames.remove(pos))
    }

    pub fn frame(&self, name: &str) -> Option<&Frame> {
        self.frames.iter().find(|f| f.name == name)
    }

    pub fn find_frame(&self, name: &str) -> MatrixResult<&Frame> {
        self.frame(name)
            .ok_or_else(|| MatrixError::FrameNotFound(name.to_string()))
    }

    fn find_frame_mut(&mut self, name: &str) -> MatrixResult<&mut Frame> {
        self.frames
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| MatrixError::FrameNotFound(name.to_string()))
    }

    /// Frame with the given arbitration id (extended flag ignored)
    pub fn frame_by_id(&self, id: ArbitrationId) -> Option<&Frame> {
        self.frames.iter().find(|f| f.arbitration_id == id)
    }

    pub fn find_frame_by_id(&self, id: ArbitrationId) -> MatrixResult<&Frame> {
        self.frame_by_id(id).ok_or(MatrixError::FrameIdNotFound(id))
    }

    /// Frames in insertion order
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_transmitted_by<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Frame> + 'a {
        self.frames
            .iter()
            .filter(move |f| f.transmitters.contains(node))
    }

    pub fn signal(&self, frame: &str, signal: &str) -> MatrixResult<&Signal> {
        self.find_frame(frame)?.find_signal(signal)
    }

    /// Append a signal to a frame, validating its attributes
    pub fn add_signal(&mut self, frame: &str, mut signal: Signal) -> MatrixResult<()> {
        self.attribute_definitions
            .validate_all(ObjectKind::Signal, &mut signal.attributes)?;
        self.find_frame_mut(frame)?.add_signal(signal)
    }

    pub fn remove_signal(&mut self, frame: &str, signal: &str) -> MatrixResult<Signal> {
        self.find_frame_mut(frame)?.remove_signal(signal)
    }

    pub fn add_signal_group<I, S>(&mut self, frame: &str, name: impl Into<String>, id: u32, members: I) -> MatrixResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.find_frame_mut(frame)?
            .add_signal_group(name, id, members)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Declare an attribute, replacing any earlier definition of the same name
    pub fn define_attribute(&mut self, definition: AttributeDefinition) -> Option<AttributeDefinition> {
        self.attribute_definitions.define(definition)
    }

    pub fn attribute_definitions(&self) -> &AttributeRegistry {
        &self.attribute_definitions
    }

    fn attributes_of(&self, target: AttributeTarget<'_>) -> MatrixResult<&Attributes> {
        Ok(match target {
            AttributeTarget::Network => &self.attributes,
            AttributeTarget::Node(name) => &self.find_node(name)?.attributes,
            AttributeTarget::Frame(name) => &self.find_frame(name)?.attributes,
            AttributeTarget::Signal { frame, signal } => &self.signal(frame, signal)?.attributes,
        })
    }

    fn attributes_of_mut(&mut self, target: AttributeTarget<'_>) -> MatrixResult<&mut Attributes> {
        Ok(match target {
            AttributeTarget::Network => &mut self.attributes,
            AttributeTarget::Node(name) => {
                &mut self
                    .nodes
                    .iter_mut()
                    .find(|n| n.name == name)
                    .ok_or_else(|| MatrixError::NodeNotFound(name.to_string()))?
                    .attributes
            }
            AttributeTarget::Frame(name) => &mut self.find_frame_mut(name)?.attributes,
            AttributeTarget::Signal { frame, signal } => {
                let frame = self.find_frame_mut(frame)?;
                let name = frame.name.clone();
                &mut frame
                    .signal_mut(signal)
                    .ok_or_else(|| MatrixError::SignalNotFound {
                        frame: name,
                        signal: signal.to_string(),
                    })?
                    .attributes
            }
        })
    }

    /// Validate and assign an attribute value
    pub fn set_attribute(
        &mut self,
        target: AttributeTarget<'_>,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> MatrixResult<()> {
        let value = self
            .attribute_definitions
            .validate(target.kind(), key, &value.into())?;
        self.attributes_of_mut(target)?
            .insert(key.to_string(), value);
        Ok(())
    }

    /// Remove an attribute value, returning it if it was set
    pub fn remove_attribute(&mut self, target: AttributeTarget<'_>, key: &str) -> MatrixResult<Option<AttributeValue>> {
        Ok(self.attributes_of_mut(target)?.remove(key))
    }

    /// Value explicitly set on the entity
    pub fn attribute(&self, target: AttributeTarget<'_>, key: &str) -> MatrixResult<Option<&AttributeValue>> {
        Ok(self.attributes_of(target)?.get(key))
    }

    /// Value set on the entity, else the definition's default
    pub fn attribute_or_default(&self, target: AttributeTarget<'_>, key: &str) -> MatrixResult<Option<&AttributeValue>> {
        let own = self.attributes_of(target)?.get(key);
        Ok(own.or_else(|| self.attribute_definitions.default_for(target.kind(), key)))
    }

    /// Re-check the whole matrix: every frame's invariants and every stored
    /// attribute against the registry
    pub fn validate(&self) -> MatrixResult<()> {
        let registry = &self.attribute_definitions;
        registry.check_all(ObjectKind::Network, &self.attributes)?;
        for node in &self.nodes {
            registry.check_all(ObjectKind::Node, &node.attributes)?;
        }
        for frame in &self.frames {
            frame.check_consistency()?;
            registry.check_all(ObjectKind::Frame, &frame.attributes)?;
            for signal in &frame.signals {
                registry.check_all(ObjectKind::Signal, &signal.attributes)?;
            }
        }
        debug!(frames = self.frames.len(), nodes = self.nodes.len(), "Matrix validated");
        Ok(())
    }

    // =========================================================================
    // Value tables
    // =========================================================================

    /// Register a named value table shared across signals
    pub fn add_value_table(&mut self, name: impl Into<String>, table: ValueTable) -> Option<ValueTable> {
        self.value_tables.insert(name.into(), table)
    }

    pub fn value_table(&self, name: &str) -> Option<&ValueTable> {
        self.value_tables.get(name)
    }

    pub fn remove_value_table(&mut self, name: &str) -> MatrixResult<ValueTable> {
        self.value_tables
            .remove(name)
            .ok_or_else(|| MatrixError::ValueTableNotFound(name.to_string()))
    }

    pub fn value_tables(&self) -> impl Iterator<Item = (&str, &ValueTable)> {
        self.value_tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy a shared value table into a signal's own table
    pub fn assign_value_table(&mut self, frame: &str, signal: &str, table: &str) -> MatrixResult<()> {
        let values = self
            .value_tables
            .get(table)
            .cloned()
            .ok_or_else(|| MatrixError::ValueTableNotFound(table.to_string()))?;
        let frame = self.find_frame_mut(frame)?;
        let frame_name = frame.name.clone();
        let signal = frame
            .signal_mut(signal)
            .ok_or_else(|| MatrixError::SignalNotFound {
                frame: frame_name,
                signal: signal.to_string(),
            })?;
        signal.value_table = values;
        Ok(())
    }

    // =========================================================================
    // Codec
    // =========================================================================

    pub fn encode(
        &self,
        frame: &str,
        values: &BTreeMap<String, PhysicalValue>,
        options: &CodecOptions,
    ) -> MatrixResult<Vec<u8>> {
        encode::encode(self.find_frame(frame)?, values, options)
    }

    pub fn decode(
        &self,
        frame: &str,
        payload: &[u8],
        options: &CodecOptions,
    ) -> MatrixResult<BTreeMap<String, PhysicalValue>> {
        decode::decode(self.find_frame(frame)?, payload, options)
    }

    /// Decode a received payload, picking the frame by arbitration id
    pub fn decode_by_id(
        &self,
        id: ArbitrationId,
        payload: &[u8],
        options: &CodecOptions,
    ) -> MatrixResult<BTreeMap<String, PhysicalValue>> {
        decode::decode(self.find_frame_by_id(id)?, payload, options)
    }

    /// Store every frame's startup payload in its start-value attribute.
    ///
    /// Frames that cannot be encoded are logged and skipped. Returns the
    /// number of frames updated.
    pub fn update_start_values(&mut self) -> MatrixResult<usize> {
        if self
            .attribute_definitions
            .get(ObjectKind::Frame, START_VALUE_ATTRIBUTE)
            .is_none()
        {
            return Err(MatrixError::UndefinedAttribute {
                kind: ObjectKind::Frame,
                key: START_VALUE_ATTRIBUTE.to_string(),
            });
        }

        let registry = &self.attribute_definitions;
        let mut updated = 0;
        for frame in &mut self.frames {
            let payload = match encode::startup_payload(frame) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(frame = %frame.name, error = %e, "Skipping start value");
                    continue;
                }
            };
            let value = registry.validate(
                ObjectKind::Frame,
                START_VALUE_ATTRIBUTE,
                &AttributeValue::String(hex::encode(payload)),
            )?;
            frame
                .attributes
                .insert(START_VALUE_ATTRIBUTE.to_string(), value);
            updated += 1;
        }
        Ok(updated)
    }
}

/// Several buses described together, keyed by bus name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanCluster {
    buses: BTreeMap<String, CanMatrix>,
}

impl CanCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bus, returning the matrix it replaced
    pub fn add_bus(&mut self, name: impl Into<String>, matrix: CanMatrix) -> Option<CanMatrix> {
        self.buses.insert(name.into(), matrix)
    }

    pub fn bus(&self, name: &str) -> Option<&CanMatrix> {
        self.buses.get(name)
    }

    pub fn bus_mut(&mut self, name: &str) -> Option<&mut CanMatrix> {
        self.buses.get_mut(name)
    }

    pub fn find_bus(&self, name: &str) -> MatrixResult<&CanMatrix> {
        self.bus(name)
            .ok_or_else(|| MatrixError::BusNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CanMatrix)> {
        self.buses.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// First frame with this name on any bus, with its bus name
    pub fn find_frame(&self, name: &str) -> Option<(&str, &Frame)> {
        self.iter()
            .find_map(|(bus, matrix)| matrix.frame(name).map(|frame| (bus, frame)))
    }
}
