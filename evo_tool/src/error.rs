//! Error types of the configuration model.
//!
//! Every rejected operation is reported as a value. Validation runs before
//! mutation, so an `Err` always means the model is unchanged (the one
//! exception being a failed [`Tree::load_tree`](crate::tree::Tree::load_tree),
//! whose partial result is discarded).

use thiserror::Error;

use crate::tree::{NodeId, NodeType};

/// Result alias for the public model façade.
pub type ModelResult<T> = Result<T, ModelError>;

/// Tabular interchange array failed structural or type validation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row}, column '{column}': {reason}")]
pub struct SchemaError {
    /// Row index within the array (0 = header).
    pub row: usize,
    /// Offending column name, or `"*"` when the whole row is at fault.
    pub column: String,
    /// Human-readable description.
    pub reason: String,
}

impl SchemaError {
    pub(crate) fn new(row: usize, column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row,
            column: column.into(),
            reason: reason.into(),
        }
    }
}

/// Rejected edit of a state or calibration table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// Bit count outside `1..=MAX_BIT_COUNT`.
    #[error("bit count {0} out of range (1..=4)")]
    BitCountOutOfRange(usize),

    /// Analog state count outside `1..=MAX_ANALOG_STATES`.
    #[error("state count {0} out of range (1..=4)")]
    StateCountOutOfRange(usize),

    /// Row index does not exist.
    #[error("row {index} out of range ({len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    /// Attempt to suppress the all-false power-on state.
    #[error("row 0 is the power-on state and must stay used")]
    PowerOnStateUnused,

    /// Sampled bit pattern has the wrong width.
    #[error("bit pattern has {actual} bits, table expects {expected}")]
    PatternWidth { expected: usize, actual: usize },

    /// Sampled bit pattern selects a suppressed state.
    #[error("bit pattern selects unused state {index}")]
    UnusedState { index: usize },

    /// No used state carries the requested name.
    #[error("no used state named '{0}'")]
    UnknownState(String),

    /// Row 0 of an analog table never carries a threshold.
    #[error("row 0 has no threshold")]
    ThresholdOnFirstRow,

    /// Threshold breaks the strict increase across rows.
    #[error("threshold {value} at row {index} is not strictly between its neighbors")]
    ThresholdOrder { index: usize, value: f64 },

    /// Calibration point breaks monotonicity.
    #[error("calibration point {index}: {reason}")]
    CalibrationOrder { index: usize, reason: String },

    /// Calibration table would drop below its minimum size.
    #[error("calibration table needs at least {min} rows")]
    TooFewRows { min: usize },

    /// Calibration table would grow beyond its maximum size.
    #[error("calibration table holds at most {max} rows")]
    TooManyRows { max: usize },

    /// Row insertion or removal range is invalid.
    #[error("invalid row range: position {position}, count {count}")]
    InvalidRange { position: usize, count: usize },

    /// Non-finite numeric input.
    #[error("value {0} is not finite")]
    NotFinite(f64),

    /// Device child has no states.
    #[error("child '{0}' has an empty state list")]
    EmptyStateSpace(String),

    /// Device state tuple has the wrong arity.
    #[error("state tuple has {actual} entries, device has {expected} children")]
    StateArity { expected: usize, actual: usize },

    /// No combination row matches the child states.
    #[error("no device state matches {0:?}")]
    NoMatchingState(Vec<String>),

    /// Cell is not editable (state key, or gated by a disabled flag).
    #[error("column '{column}' of row {row} is read-only")]
    ReadOnlyCell { row: usize, column: &'static str },

    /// Cell value has the wrong type for its column.
    #[error("column '{column}' expects {expected}")]
    CellType {
        column: &'static str,
        expected: &'static str,
    },

    /// Tabular load rejected.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Rejected attribute access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttrError {
    /// Key is not in the node kind's schema.
    #[error("unknown attribute '{key}' for {node_type}")]
    UnknownKey { key: String, node_type: NodeType },

    /// Value has the wrong type for the attribute.
    #[error("attribute '{key}' expects {expected}")]
    TypeMismatch {
        key: &'static str,
        expected: &'static str,
    },

    /// Value has the right type but is not acceptable.
    #[error("attribute '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },

    /// Table attribute content was rejected.
    #[error("attribute '{key}': {source}")]
    Table {
        key: &'static str,
        #[source]
        source: TableError,
    },
}

/// Rejected structural operation on the node tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    /// Id does not name a live node.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Child position outside the allowed range.
    #[error("position {position} out of range for {len} children")]
    PositionOutOfRange { position: usize, len: usize },

    /// Child kind may not live below the parent kind.
    #[error("{child} is not allowed below {parent}")]
    KindNotAllowed { parent: NodeType, child: NodeType },

    /// Node kind does not own the requested table.
    #[error("{node_type} has no {table} table")]
    NoSuchTable {
        node_type: NodeType,
        table: &'static str,
    },

    /// Operation needs an I/O leaf node.
    #[error("{0} is not an I/O node")]
    NotAnIoNode(NodeType),

    /// Operation needs an output node.
    #[error("{0} is not an output node")]
    NotAnOutput(NodeType),

    /// Operation needs a device node.
    #[error("{0} is not a device node")]
    NotADevice(NodeType),

    /// `type_info` tag names no known node kind.
    #[error("unknown type_info '{0}'")]
    UnknownTypeInfo(String),

    /// Persisted JSON does not have the node object shape.
    #[error("malformed node object at '{path}': {reason}")]
    Malformed { path: String, reason: String },

    /// No node at the given path.
    #[error("no node at path '{0}'")]
    PathNotFound(String),
}

/// HAL pin binding conflict or lookup failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PinError {
    /// Two I/O nodes bind the same pin.
    #[error("duplicate pin '{pin}' bound by '{path_a}' and '{path_b}'")]
    Duplicate {
        pin: String,
        path_a: String,
        path_b: String,
    },

    /// Pin is not bound by any node.
    #[error("unknown pin '{0}'")]
    UnknownPin(String),

    /// Bit index beyond the node's bit count.
    #[error("bit {bit} out of range for {bit_count}-bit node")]
    BitOutOfRange { bit: usize, bit_count: usize },
}

/// Top-level error of the configuration model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Table edit rejected.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Attribute access rejected.
    #[error(transparent)]
    Attr(#[from] AttrError),

    /// Structural tree operation rejected.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Pin binding or lookup failed.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// JSON text could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<SchemaError> for ModelError {
    fn from(e: SchemaError) -> Self {
        Self::Table(TableError::Schema(e))
    }
}
