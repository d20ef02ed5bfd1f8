//! Prelude module for common re-exports.
//!
//! ```rust
//! use evo_tool::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, LogLevel, ProjectConfig, ToolConfig};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{
    AttrError, ModelError, ModelResult, PinError, SchemaError, TableError, TreeError,
};

// ─── Tree ───────────────────────────────────────────────────────────
pub use crate::attr::{AttrType, AttrValue};
pub use crate::tree::{ModelEvent, NodeData, NodeId, NodeKind, NodeType, Tree};

// ─── Tables ─────────────────────────────────────────────────────────
pub use crate::tables::device::{CellFlags, CellValue, DeviceColumn};
pub use crate::tables::{
    AnalogStateTable, CalibrationPoint, CalibrationTable, ChildStateSpace, DeviceStateTable,
    DigitalStateTable, TableEvent, TableKind,
};
pub use crate::tabular::TabularArray;

// ─── Runtime ────────────────────────────────────────────────────────
pub use crate::monitor::{DeviceMonitor, MonitorEvent};
pub use crate::pins::{PinBinding, PinRegistry};
pub use crate::runtime::{Classified, OutputCommand, OutputValue, Sample};
