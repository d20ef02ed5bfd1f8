//! Node kinds, their attributes and attribute schemas.

use core::fmt;
use core::str::FromStr;

use crate::attr::{AttrDescriptor, AttrType, AttrValue, HasSchema};
use crate::consts::MAX_DECIMALS;
use crate::error::AttrError;
use crate::tables::{
    AnalogStateTable, CalibrationTable, DeviceStateTable, DigitalStateTable, TableEvent, TableKind,
};
use crate::tabular::TabularArray;

// ─── Node Type ──────────────────────────────────────────────────────

/// Kind tag of a node, persisted as `type_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Tool,
    System,
    Device,
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    AnalogOutput,
}

impl NodeType {
    /// All kinds, root first.
    pub const ALL: [Self; 7] = [
        Self::Tool,
        Self::System,
        Self::Device,
        Self::DigitalInput,
        Self::DigitalOutput,
        Self::AnalogInput,
        Self::AnalogOutput,
    ];

    /// Persisted `type_info` tag.
    pub const fn type_info(self) -> &'static str {
        match self {
            Self::Tool => "ToolNode",
            Self::System => "SystemNode",
            Self::Device => "DeviceNode",
            Self::DigitalInput => "DigitalInputNode",
            Self::DigitalOutput => "DigitalOutputNode",
            Self::AnalogInput => "AnalogInputNode",
            Self::AnalogOutput => "AnalogOutputNode",
        }
    }

    /// Kind named by a `type_info` tag.
    pub fn from_type_info(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_info() == tag)
    }

    /// Name given to a freshly created node.
    pub const fn default_name(self) -> &'static str {
        match self {
            Self::Tool => "Tool",
            Self::System => "System",
            Self::Device => "Device",
            Self::DigitalInput => "DigitalInput",
            Self::DigitalOutput => "DigitalOutput",
            Self::AnalogInput => "AnalogInput",
            Self::AnalogOutput => "AnalogOutput",
        }
    }

    pub const fn is_digital(self) -> bool {
        matches!(self, Self::DigitalInput | Self::DigitalOutput)
    }

    pub const fn is_analog(self) -> bool {
        matches!(self, Self::AnalogInput | Self::AnalogOutput)
    }

    /// I/O leaf bound to a hardware signal.
    pub const fn is_io(self) -> bool {
        self.is_digital() || self.is_analog()
    }

    pub const fn is_output(self) -> bool {
        matches!(self, Self::DigitalOutput | Self::AnalogOutput)
    }

    /// Whether `child` may be placed below a node of this kind.
    pub const fn accepts_child(self, child: Self) -> bool {
        match self {
            Self::Tool => matches!(child, Self::System),
            Self::System => matches!(child, Self::System | Self::Device),
            Self::Device => child.is_io(),
            _ => false,
        }
    }

    /// Whether sibling names of this kind are sanitized and kept unique.
    pub const fn requires_unique_name(self) -> bool {
        matches!(self, Self::Device) || self.is_io()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_info())
    }
}

impl FromStr for NodeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_type_info(s).ok_or_else(|| format!("unknown type_info: {s:?}"))
    }
}

// ─── Calibration Type ───────────────────────────────────────────────

/// Whether an analog node maps its raw value through its calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationType {
    #[default]
    None,
    Table,
}

impl fmt::Display for CalibrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Table => write!(f, "table"),
        }
    }
}

impl FromStr for CalibrationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "table" => Ok(Self::Table),
            _ => Err(format!("unknown calibration type: {s:?}, expected none or table")),
        }
    }
}

// ─── Kind Attributes ────────────────────────────────────────────────

fn table_err(key: &'static str) -> impl FnOnce(crate::error::TableError) -> AttrError {
    move |source| AttrError::Table { key, source }
}

/// Attributes of the tool root and of systems.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanvasAttrs {
    pub background_image: String,
}

impl HasSchema for CanvasAttrs {
    const SCHEMA: &'static [AttrDescriptor<Self>] = &[AttrDescriptor {
        key: "background_image",
        ty: AttrType::Text,
        get: |a| AttrValue::Text(a.background_image.clone()),
        set: |a, v| {
            a.background_image = v.text("background_image")?;
            Ok(())
        },
    }];
}

/// Attributes of a device node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceAttrs {
    pub icon: String,
    pub(crate) table: DeviceStateTable,
    /// Row metadata waiting for the child set to be known.
    pub(crate) pending_rows: Option<TabularArray>,
}

impl DeviceAttrs {
    pub fn table(&self) -> &DeviceStateTable {
        &self.table
    }
}

impl HasSchema for DeviceAttrs {
    const SCHEMA: &'static [AttrDescriptor<Self>] = &[
        AttrDescriptor {
            key: "device_state_table",
            ty: AttrType::Table,
            get: |d| AttrValue::from_table(&d.table.save_rows()),
            set: |d, v| {
                d.pending_rows = Some(v.table("device_state_table")?);
                Ok(())
            },
        },
        AttrDescriptor {
            key: "icon",
            ty: AttrType::Text,
            get: |d| AttrValue::Text(d.icon.clone()),
            set: |d, v| {
                d.icon = v.text("icon")?;
                Ok(())
            },
        },
    ];
}

/// Attributes of a digital input or output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DigitalIo {
    pub hal_pin: String,
    pub(crate) table: DigitalStateTable,
}

impl DigitalIo {
    pub fn table(&self) -> &DigitalStateTable {
        &self.table
    }
}

impl HasSchema for DigitalIo {
    const SCHEMA: &'static [AttrDescriptor<Self>] = &[
        AttrDescriptor {
            key: "digital_state_table",
            ty: AttrType::Table,
            get: |io| AttrValue::from_table(&io.table.save()),
            set: |io, v| {
                let key = "digital_state_table";
                io.table.load(&v.table(key)?).map_err(table_err(key))
            },
        },
        AttrDescriptor {
            key: "hal_pin",
            ty: AttrType::Text,
            get: |io| AttrValue::Text(io.hal_pin.clone()),
            set: |io, v| {
                io.hal_pin = v.text("hal_pin")?;
                Ok(())
            },
        },
    ];
}

/// Attributes of an analog input or output.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogIo {
    pub hal_pin: String,
    pub unit: String,
    /// Display precision.
    pub decimals: u8,
    pub calibration_type: CalibrationType,
    pub(crate) calibration: CalibrationTable,
    pub(crate) states: AnalogStateTable,
}

impl Default for AnalogIo {
    fn default() -> Self {
        Self {
            hal_pin: String::new(),
            unit: String::new(),
            decimals: 2,
            calibration_type: CalibrationType::None,
            calibration: CalibrationTable::default(),
            states: AnalogStateTable::default(),
        }
    }
}

impl AnalogIo {
    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    pub fn states(&self) -> &AnalogStateTable {
        &self.states
    }

    /// Engineering value of a raw HAL value.
    pub fn to_gui(&self, hal_value: f64) -> f64 {
        match self.calibration_type {
            CalibrationType::None => hal_value,
            CalibrationType::Table => self.calibration.to_gui(hal_value),
        }
    }

    /// Raw HAL value of an engineering value.
    pub fn to_hal(&self, gui_value: f64) -> f64 {
        match self.calibration_type {
            CalibrationType::None => gui_value,
            CalibrationType::Table => self.calibration.to_hal(gui_value),
        }
    }
}

impl HasSchema for AnalogIo {
    const SCHEMA: &'static [AttrDescriptor<Self>] = &[
        AttrDescriptor {
            key: "analog_state_table",
            ty: AttrType::Table,
            get: |io| AttrValue::from_table(&io.states.save()),
            set: |io, v| {
                let key = "analog_state_table";
                io.states.load(&v.table(key)?).map_err(table_err(key))
            },
        },
        AttrDescriptor {
            key: "calibration_table",
            ty: AttrType::Table,
            get: |io| AttrValue::from_table(&io.calibration.save()),
            set: |io, v| {
                let key = "calibration_table";
                io.calibration.load(&v.table(key)?).map_err(table_err(key))
            },
        },
        AttrDescriptor {
            key: "calibration_type",
            ty: AttrType::Text,
            get: |io| AttrValue::Text(io.calibration_type.to_string()),
            set: |io, v| {
                let key = "calibration_type";
                io.calibration_type = v
                    .text(key)?
                    .parse()
                    .map_err(|reason| AttrError::Invalid { key, reason })?;
                Ok(())
            },
        },
        AttrDescriptor {
            key: "decimals",
            ty: AttrType::Int,
            get: |io| AttrValue::Int(i64::from(io.decimals)),
            set: |io, v| {
                let key = "decimals";
                let n = v.int(key)?;
                if !(0..=MAX_DECIMALS).contains(&n) {
                    return Err(AttrError::Invalid {
                        key,
                        reason: format!("{n} is outside 0..={MAX_DECIMALS}"),
                    });
                }
                io.decimals = n as u8;
                Ok(())
            },
        },
        AttrDescriptor {
            key: "hal_pin",
            ty: AttrType::Text,
            get: |io| AttrValue::Text(io.hal_pin.clone()),
            set: |io, v| {
                io.hal_pin = v.text("hal_pin")?;
                Ok(())
            },
        },
        AttrDescriptor {
            key: "unit",
            ty: AttrType::Text,
            get: |io| AttrValue::Text(io.unit.clone()),
            set: |io, v| {
                io.unit = v.text("unit")?;
                Ok(())
            },
        },
    ];
}

// ─── Node Kind ──────────────────────────────────────────────────────

/// Kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Tool(CanvasAttrs),
    System(CanvasAttrs),
    Device(DeviceAttrs),
    DigitalInput(DigitalIo),
    DigitalOutput(DigitalIo),
    AnalogInput(AnalogIo),
    AnalogOutput(AnalogIo),
}

impl NodeKind {
    /// Default payload of a kind.
    pub fn new(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Tool => Self::Tool(CanvasAttrs::default()),
            NodeType::System => Self::System(CanvasAttrs::default()),
            NodeType::Device => Self::Device(DeviceAttrs::default()),
            NodeType::DigitalInput => Self::DigitalInput(DigitalIo::default()),
            NodeType::DigitalOutput => Self::DigitalOutput(DigitalIo::default()),
            NodeType::AnalogInput => Self::AnalogInput(AnalogIo::default()),
            NodeType::AnalogOutput => Self::AnalogOutput(AnalogIo::default()),
        }
    }

    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::Tool(_) => NodeType::Tool,
            Self::System(_) => NodeType::System,
            Self::Device(_) => NodeType::Device,
            Self::DigitalInput(_) => NodeType::DigitalInput,
            Self::DigitalOutput(_) => NodeType::DigitalOutput,
            Self::AnalogInput(_) => NodeType::AnalogInput,
            Self::AnalogOutput(_) => NodeType::AnalogOutput,
        }
    }

    pub fn digital(&self) -> Option<&DigitalIo> {
        match self {
            Self::DigitalInput(io) | Self::DigitalOutput(io) => Some(io),
            _ => None,
        }
    }

    pub(crate) fn digital_mut(&mut self) -> Option<&mut DigitalIo> {
        match self {
            Self::DigitalInput(io) | Self::DigitalOutput(io) => Some(io),
            _ => None,
        }
    }

    pub fn analog(&self) -> Option<&AnalogIo> {
        match self {
            Self::AnalogInput(io) | Self::AnalogOutput(io) => Some(io),
            _ => None,
        }
    }

    pub(crate) fn analog_mut(&mut self) -> Option<&mut AnalogIo> {
        match self {
            Self::AnalogInput(io) | Self::AnalogOutput(io) => Some(io),
            _ => None,
        }
    }

    pub fn device(&self) -> Option<&DeviceAttrs> {
        match self {
            Self::Device(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn device_mut(&mut self) -> Option<&mut DeviceAttrs> {
        match self {
            Self::Device(d) => Some(d),
            _ => None,
        }
    }

    /// HAL pin of an I/O kind.
    pub fn hal_pin(&self) -> Option<&str> {
        self.digital()
            .map(|io| io.hal_pin.as_str())
            .or_else(|| self.analog().map(|io| io.hal_pin.as_str()))
    }

    /// State vocabulary an I/O kind contributes to its device.
    pub fn state_names(&self) -> Option<Vec<String>> {
        self.digital()
            .map(|io| io.table.state_names())
            .or_else(|| self.analog().map(|io| io.states.state_names()))
    }

    pub(crate) fn get_attr(&self, key: &str) -> Option<AttrValue> {
        match self {
            Self::Tool(a) | Self::System(a) => a.get_attr(key),
            Self::Device(d) => d.get_attr(key),
            Self::DigitalInput(io) | Self::DigitalOutput(io) => io.get_attr(key),
            Self::AnalogInput(io) | Self::AnalogOutput(io) => io.get_attr(key),
        }
    }

    pub(crate) fn set_attr(&mut self, key: &str, value: AttrValue) -> Option<Result<(), AttrError>> {
        match self {
            Self::Tool(a) | Self::System(a) => a.set_attr(key, value),
            Self::Device(d) => d.set_attr(key, value),
            Self::DigitalInput(io) | Self::DigitalOutput(io) => io.set_attr(key, value),
            Self::AnalogInput(io) | Self::AnalogOutput(io) => io.set_attr(key, value),
        }
    }

    pub(crate) fn attr_types(&self) -> Vec<(&'static str, AttrType)> {
        match self {
            Self::Tool(_) | Self::System(_) => CanvasAttrs::declared(),
            Self::Device(_) => DeviceAttrs::declared(),
            Self::DigitalInput(_) | Self::DigitalOutput(_) => DigitalIo::declared(),
            Self::AnalogInput(_) | Self::AnalogOutput(_) => AnalogIo::declared(),
        }
    }

    /// Drain the events of every owned table.
    pub(crate) fn take_table_events(&mut self) -> Vec<(TableKind, TableEvent)> {
        fn tag(kind: TableKind, events: Vec<TableEvent>) -> impl Iterator<Item = (TableKind, TableEvent)> {
            events.into_iter().map(move |e| (kind, e))
        }
        match self {
            Self::Tool(_) | Self::System(_) => Vec::new(),
            Self::Device(d) => tag(TableKind::Device, d.table.take_events()).collect(),
            Self::DigitalInput(io) | Self::DigitalOutput(io) => {
                tag(TableKind::Digital, io.table.take_events()).collect()
            }
            Self::AnalogInput(io) | Self::AnalogOutput(io) => {
                tag(TableKind::Calibration, io.calibration.take_events())
                    .chain(tag(TableKind::AnalogStates, io.states.take_events()))
                    .collect()
            }
        }
    }
}

// ─── Node Data ──────────────────────────────────────────────────────

/// Everything a node owns apart from its place in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub name: String,
    pub description: String,
    /// Graphical placement only.
    pub x: f64,
    pub y: f64,
    pub kind: NodeKind,
}

impl NodeData {
    /// Default node of `node_type` called `name`.
    pub fn new(node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            x: 0.0,
            y: 0.0,
            kind: NodeKind::new(node_type),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub const fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Positions must be finite to survive a save and reload.
    pub(crate) fn check_position(&self) -> Result<(), AttrError> {
        AttrValue::Float(self.x).float("x")?;
        AttrValue::Float(self.y).float("y")?;
        Ok(())
    }

    /// All declared attribute keys with their types, sorted by key.
    pub fn attr_types(&self) -> Vec<(&'static str, AttrType)> {
        let mut all = Self::SCHEMA
            .iter()
            .map(|d| (d.key, d.ty))
            .chain(self.kind.attr_types())
            .collect::<Vec<_>>();
        all.sort_by_key(|(key, _)| *key);
        all
    }

    /// Read any declared attribute.
    pub fn attr(&self, key: &str) -> Option<AttrValue> {
        self.get_attr(key).or_else(|| self.kind.get_attr(key))
    }

    /// Write any declared attribute without tree-level rules.
    pub(crate) fn write_attr(&mut self, key: &str, value: AttrValue) -> Result<(), AttrError> {
        let handled = match Self::descriptor(key) {
            Some(d) => Some((d.set)(self, value)),
            None => self.kind.set_attr(key, value),
        };
        handled.unwrap_or_else(|| {
            Err(AttrError::UnknownKey {
                key: key.to_string(),
                node_type: self.node_type(),
            })
        })
    }
}

/// Attributes every node carries.
impl HasSchema for NodeData {
    const SCHEMA: &'static [AttrDescriptor<Self>] = &[
        AttrDescriptor {
            key: "description",
            ty: AttrType::Text,
            get: |n| AttrValue::Text(n.description.clone()),
            set: |n, v| {
                n.description = v.text("description")?;
                Ok(())
            },
        },
        AttrDescriptor {
            key: "name",
            ty: AttrType::Text,
            get: |n| AttrValue::Text(n.name.clone()),
            set: |n, v| {
                n.name = v.text("name")?;
                Ok(())
            },
        },
        AttrDescriptor {
            key: "x",
            ty: AttrType::Float,
            get: |n| AttrValue::Float(n.x),
            set: |n, v| {
                n.x = v.float("x")?;
                Ok(())
            },
        },
        AttrDescriptor {
            key: "y",
            ty: AttrType::Float,
            get: |n| AttrValue::Float(n.y),
            set: |n, v| {
                n.y = v.float("y")?;
                Ok(())
            },
        },
    ];
}
