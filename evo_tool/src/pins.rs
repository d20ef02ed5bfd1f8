//! Pin registry: HAL pin name → I/O node binding.
//!
//! Built from a tree. Immutable after construction; rebuild it after the
//! tree's pins or bit counts change. Lookups are a single `HashMap` probe.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::error::PinError;
use crate::tree::{NodeId, NodeType, Tree};

// ─── Binding ────────────────────────────────────────────────────────

/// Signal flow as seen from the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "in"),
            Self::Output => write!(f, "out"),
        }
    }
}

/// Value type carried by a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalType {
    Bit,
    Float,
}

impl SignalType {
    pub const fn is_digital(self) -> bool {
        matches!(self, Self::Bit)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit => write!(f, "bit"),
            Self::Float => write!(f, "float"),
        }
    }
}

/// One HAL pin bound to an I/O node.
#[derive(Debug, Clone, PartialEq)]
pub struct PinBinding {
    /// Full pin name.
    pub pin: String,
    pub node: NodeId,
    pub node_type: NodeType,
    /// Bit index within the node; 0 for analog and single-bit nodes.
    pub bit: usize,
    pub direction: Direction,
    pub signal: SignalType,
    /// Node path, for diagnostics.
    pub path: String,
}

/// Pin names a node binds: `hal_pin` for one signal, `hal_pin.i` per bit
/// for multi-bit digital nodes. Empty when the node has no pin.
fn pin_names(hal_pin: &str, bit_count: usize) -> Vec<(String, usize)> {
    if hal_pin.is_empty() {
        return Vec::new();
    }
    if bit_count <= 1 {
        return vec![(hal_pin.to_string(), 0)];
    }
    (0..bit_count).map(|i| (format!("{hal_pin}.{i}"), i)).collect()
}

// ─── PinRegistry ────────────────────────────────────────────────────

/// Pin bindings of a tree.
#[derive(Debug, Clone, Default)]
pub struct PinRegistry {
    /// Bindings in tree order.
    bindings: Vec<PinBinding>,
    index: HashMap<String, usize>,
    pub di_count: u16,
    pub do_count: u16,
    pub ai_count: u16,
    pub ao_count: u16,
}

impl PinRegistry {
    /// Walk every I/O node of `tree` and bind its pins.
    ///
    /// Returns the first duplicate pin encountered.
    pub fn from_tree(tree: &Tree) -> Result<Self, PinError> {
        let mut registry = Self::default();

        for (id, node) in tree.iter() {
            let node_type = node.node_type();
            match node_type {
                NodeType::DigitalInput => registry.di_count += 1,
                NodeType::DigitalOutput => registry.do_count += 1,
                NodeType::AnalogInput => registry.ai_count += 1,
                NodeType::AnalogOutput => registry.ao_count += 1,
                _ => continue,
            }

            let (hal_pin, bit_count, signal) = match (node.kind.digital(), node.kind.analog()) {
                (Some(io), _) => (io.hal_pin.as_str(), io.table().bit_count(), SignalType::Bit),
                (_, Some(io)) => (io.hal_pin.as_str(), 1, SignalType::Float),
                _ => continue,
            };
            let direction = if node_type.is_output() {
                Direction::Output
            } else {
                Direction::Input
            };
            let path = tree.path_of(id).unwrap_or_default();

            for (pin, bit) in pin_names(hal_pin, bit_count) {
                if let Some(prev) = registry.index.get(&pin) {
                    let err = PinError::Duplicate {
                        pin,
                        path_a: registry.bindings[*prev].path.clone(),
                        path_b: path,
                    };
                    warn!(error = %err, "pin conflict");
                    return Err(err);
                }
                registry.index.insert(pin.clone(), registry.bindings.len());
                registry.bindings.push(PinBinding {
                    pin,
                    node: id,
                    node_type,
                    bit,
                    direction,
                    signal,
                    path: path.clone(),
                });
            }
        }

        debug!(
            pins = registry.bindings.len(),
            di_count = registry.di_count,
            do_count = registry.do_count,
            ai_count = registry.ai_count,
            ao_count = registry.ao_count,
            "pin registry built"
        );
        Ok(registry)
    }

    /// Look up a binding by pin name.
    pub fn get(&self, pin: &str) -> Option<&PinBinding> {
        self.index.get(pin).map(|i| &self.bindings[*i])
    }

    /// Like [`get`](Self::get), failing for an unbound pin.
    pub fn resolve(&self, pin: &str) -> Result<&PinBinding, PinError> {
        self.get(pin)
            .ok_or_else(|| PinError::UnknownPin(pin.to_string()))
    }

    pub fn has_pin(&self, pin: &str) -> bool {
        self.index.contains_key(pin)
    }

    /// Number of bound pins.
    pub fn pin_count(&self) -> usize {
        self.bindings.len()
    }

    /// All bindings in tree order.
    pub fn pins(&self) -> &[PinBinding] {
        &self.bindings
    }

    /// Bindings of one node, in bit order.
    pub fn pins_of(&self, node: NodeId) -> impl Iterator<Item = &PinBinding> {
        self.bindings.iter().filter(move |b| b.node == node)
    }
}
