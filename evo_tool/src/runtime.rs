//! Live samples and classification.
//!
//! The external runtime pushes raw samples into I/O nodes and reads back
//! the classified state. Samples are not configuration: they never
//! serialize and never take part in tree equality. The most recent sample
//! wins.

use crate::attr::AttrValue;
use crate::error::{AttrError, ModelResult, PinError, TreeError};
use crate::pins::PinRegistry;
use crate::tables::BitPattern;
use crate::tree::{NodeId, NodeKind, NodeType, Tree};

/// Last sampled value of a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum Live {
    #[default]
    Idle,
    Bits(BitPattern),
    Analog(f64),
}

impl Live {
    /// Power-on value for a node kind: all bits clear, analog zero.
    pub(crate) fn for_kind(kind: &NodeKind) -> Self {
        if let Some(io) = kind.digital() {
            Self::Bits(io.table().rows()[0].bits.clone())
        } else if kind.analog().is_some() {
            Self::Analog(0.0)
        } else {
            Self::Idle
        }
    }

    /// Reset a bit sample whose width no longer matches the table.
    pub(crate) fn fit(&mut self, kind: &NodeKind) {
        if let (Self::Bits(bits), Some(io)) = (&*self, kind.digital()) {
            if bits.len() == io.table().bit_count() {
                return;
            }
        } else {
            return;
        }
        *self = Self::for_kind(kind);
    }
}

/// Raw value pushed by the external runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Full bit pattern, bit 0 first.
    Bits(Vec<bool>),
    /// Update of a single bit.
    Bit { index: usize, value: bool },
    /// Raw analog value in HAL units.
    Analog(f64),
}

/// Classified state of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    /// Row index of the state in its table.
    pub index: usize,
    /// State name; for a device, the child states in child order.
    pub state: String,
    /// Text for display: bit string, scaled value with unit, or device
    /// status.
    pub display_value: String,
}

/// Value commanded to an output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    /// Digital output state by name.
    State(String),
    /// Analog output value in engineering units.
    Gui(f64),
}

/// Raw signal to drive for a commanded output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCommand {
    Bits(BitPattern),
    Hal(f64),
}

/// Bits most significant first, as shown to operators.
fn bit_string(bits: &[bool]) -> String {
    bits.iter().rev().map(|b| if *b { '1' } else { '0' }).collect()
}

impl Tree {
    /// Store a raw sample on an I/O node.
    pub fn push_sample(&mut self, id: NodeId, sample: Sample) -> ModelResult<()> {
        let slot = self.slot_mut(id)?;
        let node_type = slot.data.node_type();
        match (&slot.data.kind, &mut slot.live, sample) {
            (kind, Live::Bits(bits), Sample::Bits(new)) => {
                let expected = kind.digital().map_or(0, |io| io.table().bit_count());
                if new.len() != expected {
                    return Err(crate::error::TableError::PatternWidth {
                        expected,
                        actual: new.len(),
                    }
                    .into());
                }
                *bits = new.into_iter().collect();
            }
            (_, Live::Bits(bits), Sample::Bit { index, value }) => {
                let bit_count = bits.len();
                let bit = bits
                    .get_mut(index)
                    .ok_or(PinError::BitOutOfRange { bit: index, bit_count })?;
                *bit = value;
            }
            (_, Live::Analog(v), Sample::Analog(new)) => {
                if !new.is_finite() {
                    return Err(crate::error::TableError::NotFinite(new).into());
                }
                *v = new;
            }
            (_, Live::Idle, _) => return Err(TreeError::NotAnIoNode(node_type).into()),
            (_, _, _) => {
                return Err(AttrError::TypeMismatch {
                    key: "sample",
                    expected: if node_type.is_digital() {
                        "a bit sample"
                    } else {
                        "an analog sample"
                    },
                }
                .into());
            }
        }
        Ok(())
    }

    /// Store a sample arriving on a HAL pin.
    ///
    /// Digital pins treat any non-zero value as set.
    pub fn push_pin_sample(&mut self, registry: &PinRegistry, pin: &str, value: f64) -> ModelResult<NodeId> {
        let binding = registry.resolve(pin)?;
        let sample = if binding.signal.is_digital() {
            Sample::Bit {
                index: binding.bit,
                value: value != 0.0,
            }
        } else {
            Sample::Analog(value)
        };
        self.push_sample(binding.node, sample)?;
        Ok(binding.node)
    }

    /// Raw analog sample of a node, in HAL units.
    pub fn raw_value(&self, id: NodeId) -> ModelResult<f64> {
        match &self.slot(id)?.live {
            Live::Analog(v) => Ok(*v),
            _ => Err(TreeError::NotAnIoNode(self.node_type(id)?).into()),
        }
    }

    /// Current bit sample of a digital node.
    pub fn raw_bits(&self, id: NodeId) -> ModelResult<&[bool]> {
        match &self.slot(id)?.live {
            Live::Bits(bits) => Ok(bits.as_slice()),
            _ => Err(TreeError::NotAnIoNode(self.node_type(id)?).into()),
        }
    }

    /// Classified state of an I/O node, or of a device from its children.
    pub fn read_classified(&self, id: NodeId) -> ModelResult<Classified> {
        let slot = self.slot(id)?;
        let kind = &slot.data.kind;
        match (kind, &slot.live) {
            (NodeKind::DigitalInput(io) | NodeKind::DigitalOutput(io), Live::Bits(bits)) => {
                let (index, row) = io.table().classify(bits)?;
                Ok(Classified {
                    index,
                    state: row.gui_name.clone(),
                    display_value: bit_string(bits),
                })
            }
            (NodeKind::AnalogInput(io) | NodeKind::AnalogOutput(io), Live::Analog(raw)) => {
                let gui = io.to_gui(*raw);
                let (index, row) = io.states().classify(gui);
                let decimals = usize::from(io.decimals);
                let display_value = if io.unit.is_empty() {
                    format!("{gui:.decimals$}")
                } else {
                    format!("{gui:.decimals$} {}", io.unit)
                };
                Ok(Classified {
                    index,
                    state: row.gui_name.clone(),
                    display_value,
                })
            }
            (NodeKind::Device(attrs), _) => {
                let states = slot
                    .children
                    .iter()
                    .map(|c| self.read_classified(*c).map(|s| s.state))
                    .collect::<ModelResult<Vec<_>>>()?;
                let (index, row) = attrs.table().lookup(&states)?;
                Ok(Classified {
                    index,
                    state: states.join(", "),
                    display_value: row.status.clone(),
                })
            }
            _ => Err(TreeError::NotAnIoNode(kind.node_type()).into()),
        }
    }

    /// Raw signal for commanding an output.
    ///
    /// A digital output maps a state name to its bit pattern; an analog
    /// output maps an engineering value back to HAL units.
    pub fn command_output(&self, id: NodeId, value: OutputValue) -> ModelResult<OutputCommand> {
        let node = self.node(id)?;
        let node_type = node.node_type();
        if !node_type.is_output() {
            return Err(TreeError::NotAnOutput(node_type).into());
        }
        match (&node.kind, value) {
            (NodeKind::DigitalOutput(io), OutputValue::State(name)) => {
                Ok(OutputCommand::Bits(io.table().pattern_for(&name)?.clone()))
            }
            (NodeKind::AnalogOutput(io), OutputValue::Gui(v)) => {
                let v = AttrValue::Float(v).float("value")?;
                Ok(OutputCommand::Hal(io.to_hal(v)))
            }
            _ => Err(AttrError::TypeMismatch {
                key: "value",
                expected: if node_type == NodeType::DigitalOutput {
                    "a state name"
                } else {
                    "a number"
                },
            }
            .into()),
        }
    }
}
