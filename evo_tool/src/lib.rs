//! EVO Tool Configuration Model
//!
//! This crate holds the configuration of a machine-control tool: a tree of
//! systems, devices and I/O signals, the state tables that classify raw
//! signals, and the device state tables derived from them.
//!
//! # Module Structure
//!
//! - [`tree`] - Arena node tree, node kinds, JSON persistence
//! - [`tables`] - Digital, analog, calibration and device state tables
//! - [`tabular`] - Header-plus-rows interchange arrays
//! - [`attr`] - Per-kind attribute schemas
//! - [`runtime`] - Live samples, classification, output commands
//! - [`pins`] - HAL pin registry built from a tree
//! - [`monitor`] - Device warning/alarm/action timing
//! - [`config`] - TOML application configuration
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use evo_tool::prelude::*;
//!
//! let mut tree = Tree::new();
//! let system = tree.add_child(tree.root(), NodeData::new(NodeType::System, "Station"))?;
//! let device = tree.add_child(system, NodeData::new(NodeType::Device, "Gripper"))?;
//! let output = tree.add_child(device, NodeData::new(NodeType::DigitalOutput, "Valve"))?;
//! tree.edit_digital_table(output, |t| {
//!     t.set_row_name(0, "off")?;
//!     t.set_row_name(1, "on")
//! })?;
//! assert_eq!(tree.device_state_table(device)?.rows().len(), 2);
//!
//! let text = tree.to_json_string(true)?;
//! assert!(Tree::from_json_str(&text)? == tree);
//! # Ok::<(), ModelError>(())
//! ```

pub mod attr;
pub mod config;
pub mod consts;
pub mod error;
pub mod monitor;
pub mod pins;
pub mod prelude;
pub mod runtime;
pub mod tables;
pub mod tabular;
pub mod tree;
