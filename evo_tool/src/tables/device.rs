//! Device state table: Cartesian product of child state vocabularies.
//!
//! A device combines the states of its I/O children. Every combination is a
//! row carrying status, icon layer, warning/alarm/action settings and a log
//! flag. The product is taken over the children in **reverse** order: the
//! last child is the outermost (slowest varying) factor, and each row's
//! `state_key` lists the child states in that reversed order. Persisted
//! tables depend on this ordering.

use bitflags::bitflags;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::events::{Notifier, TableEvent};
use crate::consts::{DEFAULT_DEVICE_STATUS, DEFAULT_ICON_LAYER_PREFIX};
use crate::error::{SchemaError, TableError};
use crate::tabular::{RowReader, TabularArray, expect_header, header_row};

/// State vocabulary of one child I/O node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildStateSpace {
    /// Child node name.
    pub child_name: String,
    /// Ordered state names of the child.
    pub state_names: Vec<String>,
}

impl ChildStateSpace {
    /// Shorthand constructor.
    pub fn new<S: Into<String>>(child_name: impl Into<String>, states: impl IntoIterator<Item = S>) -> Self {
        Self {
            child_name: child_name.into(),
            state_names: states.into_iter().map(Into::into).collect(),
        }
    }
}

/// One device state: a combination of child states plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationRow {
    /// Child states, last child first.
    pub state_key: Vec<String>,
    pub status: String,
    pub icon_layer: String,
    pub is_warning: bool,
    /// Seconds in this state before the warning is raised.
    pub warning_timeout: f64,
    pub warning_message: String,
    pub is_alarm: bool,
    /// Seconds in this state before the alarm is raised.
    pub alarm_timeout: f64,
    pub alarm_message: String,
    pub triggers_action: bool,
    /// Seconds in this state before the action is triggered.
    pub action_timeout: f64,
    pub action: Option<String>,
    /// Log an entry whenever the device enters this state.
    pub log_entrance: bool,
}

impl CombinationRow {
    fn with_key(index: usize, state_key: Vec<String>) -> Self {
        Self {
            state_key,
            status: DEFAULT_DEVICE_STATUS.to_string(),
            icon_layer: format!("{DEFAULT_ICON_LAYER_PREFIX}{index}"),
            is_warning: false,
            warning_timeout: 0.0,
            warning_message: String::new(),
            is_alarm: false,
            alarm_timeout: 0.0,
            alarm_message: String::new(),
            triggers_action: false,
            action_timeout: 0.0,
            action: None,
            log_entrance: true,
        }
    }
}

/// Metadata columns of the tabular form, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceColumn {
    State = 0,
    Status = 1,
    IconLayer = 2,
    IsWarning = 3,
    WarningTimeout = 4,
    WarningMessage = 5,
    IsAlarm = 6,
    AlarmTimeout = 7,
    AlarmMessage = 8,
    TriggersAction = 9,
    ActionTimeout = 10,
    Action = 11,
    LogEntrance = 12,
}

impl DeviceColumn {
    /// All columns in header order.
    pub const ALL: [Self; 13] = [
        Self::State,
        Self::Status,
        Self::IconLayer,
        Self::IsWarning,
        Self::WarningTimeout,
        Self::WarningMessage,
        Self::IsAlarm,
        Self::AlarmTimeout,
        Self::AlarmMessage,
        Self::TriggersAction,
        Self::ActionTimeout,
        Self::Action,
        Self::LogEntrance,
    ];

    /// Header name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Status => "status",
            Self::IconLayer => "icon_layer",
            Self::IsWarning => "is_warning",
            Self::WarningTimeout => "warning_timeout",
            Self::WarningMessage => "warning_message",
            Self::IsAlarm => "is_alarm",
            Self::AlarmTimeout => "alarm_timeout",
            Self::AlarmMessage => "alarm_message",
            Self::TriggersAction => "triggers_action",
            Self::ActionTimeout => "action_timeout",
            Self::Action => "action",
            Self::LogEntrance => "log_entrance",
        }
    }

    /// Position in the tabular header.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Column at header position `index`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Flag column that enables editing of this column, if any.
    pub const fn gate(self) -> Option<Self> {
        match self {
            Self::WarningTimeout | Self::WarningMessage => Some(Self::IsWarning),
            Self::AlarmTimeout | Self::AlarmMessage => Some(Self::IsAlarm),
            Self::ActionTimeout | Self::Action => Some(Self::TriggersAction),
            _ => None,
        }
    }
}

/// Tabular header of the device table.
pub fn header() -> [&'static str; 13] {
    DeviceColumn::ALL.map(DeviceColumn::name)
}

bitflags! {
    /// Editability of a device table cell, as reported to views.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CellFlags: u8 {
        /// Cell can be selected.
        const SELECTABLE = 0x01;
        /// Cell accepts edits.
        const EDITABLE   = 0x02;
    }
}

/// Typed value written into a device table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Bool(bool),
    Float(f64),
    Text(String),
    Action(Option<String>),
}

/// Cartesian product over the reversed child list; first factor outermost.
fn combinations(spaces: &[ChildStateSpace]) -> Vec<Vec<String>> {
    spaces.iter().rev().fold(vec![Vec::new()], |acc, space| {
        acc.iter()
            .flat_map(|prefix| {
                space.state_names.iter().map(move |state| {
                    let mut key = prefix.clone();
                    key.push(state.clone());
                    key
                })
            })
            .collect()
    })
}

/// Composite state table of a device node.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStateTable {
    spaces: Vec<ChildStateSpace>,
    rows: Vec<CombinationRow>,
    notifier: Notifier,
}

impl Default for DeviceStateTable {
    /// No children: a single state with an empty key.
    fn default() -> Self {
        Self {
            spaces: Vec::new(),
            rows: vec![CombinationRow::with_key(0, Vec::new())],
            notifier: Notifier::default(),
        }
    }
}

impl DeviceStateTable {
    /// Child vocabularies in child order.
    pub fn child_state_spaces(&self) -> &[ChildStateSpace] {
        &self.spaces
    }

    /// All device states in product order.
    pub fn rows(&self) -> &[CombinationRow] {
        &self.rows
    }

    /// Display header: state key columns (last child first) followed by
    /// the metadata columns.
    pub fn display_header(&self) -> Vec<String> {
        self.spaces
            .iter()
            .rev()
            .map(|s| s.child_name.clone())
            .chain(DeviceColumn::ALL[1..].iter().map(|c| c.name().to_string()))
            .collect()
    }

    /// Rebuild the table for a new set of child vocabularies.
    ///
    /// All row metadata is reset to defaults.
    pub fn set_child_state_spaces(&mut self, spaces: Vec<ChildStateSpace>) -> Result<(), TableError> {
        if let Some(empty) = spaces.iter().find(|s| s.state_names.is_empty()) {
            return Err(TableError::EmptyStateSpace(empty.child_name.clone()));
        }
        let rows: Vec<CombinationRow> = combinations(&spaces)
            .into_iter()
            .enumerate()
            .map(|(i, key)| CombinationRow::with_key(i, key))
            .collect();
        debug!(
            children = spaces.len(),
            rows = rows.len(),
            "device table rebuilt"
        );
        self.notifier.reset(|| {
            self.spaces = spaces;
            self.rows = rows;
        });
        Ok(())
    }

    /// Row matching the children's current states, given in child order.
    pub fn lookup<S: AsRef<str>>(&self, states: &[S]) -> Result<(usize, &CombinationRow), TableError> {
        if states.len() != self.spaces.len() {
            return Err(TableError::StateArity {
                expected: self.spaces.len(),
                actual: states.len(),
            });
        }
        self.rows
            .iter()
            .enumerate()
            .find(|(_, row)| {
                row.state_key
                    .iter()
                    .map(String::as_str)
                    .eq(states.iter().rev().map(AsRef::as_ref))
            })
            .ok_or_else(|| {
                TableError::NoMatchingState(states.iter().map(|s| s.as_ref().to_string()).collect())
            })
    }

    /// Editability of a metadata cell.
    pub fn cell_flags(&self, row: usize, column: DeviceColumn) -> CellFlags {
        let Some(r) = self.rows.get(row) else {
            return CellFlags::empty();
        };
        let editable = match column {
            DeviceColumn::State => false,
            c => match c.gate() {
                Some(DeviceColumn::IsWarning) => r.is_warning,
                Some(DeviceColumn::IsAlarm) => r.is_alarm,
                Some(DeviceColumn::TriggersAction) => r.triggers_action,
                _ => true,
            },
        };
        if editable {
            CellFlags::SELECTABLE | CellFlags::EDITABLE
        } else {
            CellFlags::SELECTABLE
        }
    }

    /// Edit one metadata cell.
    pub fn set_cell(&mut self, row: usize, column: DeviceColumn, value: CellValue) -> Result<(), TableError> {
        if row >= self.rows.len() {
            return Err(TableError::RowOutOfRange {
                index: row,
                len: self.rows.len(),
            });
        }
        if !self.cell_flags(row, column).contains(CellFlags::EDITABLE) {
            return Err(TableError::ReadOnlyCell {
                row,
                column: column.name(),
            });
        }
        let mismatch = |expected| TableError::CellType {
            column: column.name(),
            expected,
        };
        let r = &mut self.rows[row];
        match (column, value) {
            (DeviceColumn::Status, CellValue::Text(v)) => r.status = v,
            (DeviceColumn::IconLayer, CellValue::Text(v)) => r.icon_layer = v,
            (DeviceColumn::WarningMessage, CellValue::Text(v)) => r.warning_message = v,
            (DeviceColumn::AlarmMessage, CellValue::Text(v)) => r.alarm_message = v,
            (DeviceColumn::IsWarning, CellValue::Bool(v)) => r.is_warning = v,
            (DeviceColumn::IsAlarm, CellValue::Bool(v)) => r.is_alarm = v,
            (DeviceColumn::TriggersAction, CellValue::Bool(v)) => r.triggers_action = v,
            (DeviceColumn::LogEntrance, CellValue::Bool(v)) => r.log_entrance = v,
            (DeviceColumn::WarningTimeout | DeviceColumn::AlarmTimeout | DeviceColumn::ActionTimeout, CellValue::Float(v)) => {
                if !v.is_finite() {
                    return Err(TableError::NotFinite(v));
                }
                match column {
                    DeviceColumn::WarningTimeout => r.warning_timeout = v,
                    DeviceColumn::AlarmTimeout => r.alarm_timeout = v,
                    _ => r.action_timeout = v,
                }
            }
            (DeviceColumn::Action, CellValue::Action(v)) => r.action = v.filter(|a| !a.is_empty()),
            (
                DeviceColumn::Status
                | DeviceColumn::IconLayer
                | DeviceColumn::WarningMessage
                | DeviceColumn::AlarmMessage,
                _,
            ) => return Err(mismatch("text")),
            (
                DeviceColumn::IsWarning
                | DeviceColumn::IsAlarm
                | DeviceColumn::TriggersAction
                | DeviceColumn::LogEntrance,
                _,
            ) => return Err(mismatch("a bool")),
            (DeviceColumn::Action, _) => return Err(mismatch("an optional action")),
            (_, _) => return Err(mismatch("a number")),
        }
        self.notifier.data_changed(row, column.index());
        Ok(())
    }

    /// Tabular form with the fixed 13-column header.
    pub fn save_rows(&self) -> TabularArray {
        std::iter::once(header_row(&header()))
            .chain(self.rows.iter().enumerate().map(|(i, r)| {
                vec![
                    i.into(),
                    r.status.clone().into(),
                    r.icon_layer.clone().into(),
                    r.is_warning.into(),
                    r.warning_timeout.into(),
                    r.warning_message.clone().into(),
                    r.is_alarm.into(),
                    r.alarm_timeout.into(),
                    r.alarm_message.clone().into(),
                    r.triggers_action.into(),
                    r.action_timeout.into(),
                    r.action.clone().map_or(Value::Null, Value::from),
                    r.log_entrance.into(),
                ]
            }))
            .collect()
    }

    /// Apply row metadata from a tabular array.
    ///
    /// The row count must match the current product; any violation rejects
    /// the whole array and leaves the table unchanged.
    pub fn load_rows(&mut self, table: &TabularArray) -> Result<(), TableError> {
        let header = header();
        let data = expect_header(table, &header)?;
        if data.len() != self.rows.len() {
            return Err(SchemaError::new(
                0,
                "*",
                format!("{} rows, device has {} states", data.len(), self.rows.len()),
            )
            .into());
        }

        use DeviceColumn as C;
        let mut rows = Vec::with_capacity(data.len());
        for (i, cells) in data.iter().enumerate() {
            let r = RowReader::new(i, &header, cells)?;
            r.index(C::State.index())?;
            rows.push(CombinationRow {
                state_key: self.rows[i].state_key.clone(),
                status: r.string(C::Status.index())?,
                icon_layer: r.string(C::IconLayer.index())?,
                is_warning: r.boolean(C::IsWarning.index())?,
                warning_timeout: r.float(C::WarningTimeout.index())?,
                warning_message: r.string(C::WarningMessage.index())?,
                is_alarm: r.boolean(C::IsAlarm.index())?,
                alarm_timeout: r.float(C::AlarmTimeout.index())?,
                alarm_message: r.string(C::AlarmMessage.index())?,
                triggers_action: r.boolean(C::TriggersAction.index())?,
                action_timeout: r.float(C::ActionTimeout.index())?,
                action: r.optional_action(C::Action.index())?,
                log_entrance: r.boolean(C::LogEntrance.index())?,
            });
        }

        debug!(rows = rows.len(), "device table rows loaded");
        self.notifier.reset(|| self.rows = rows);
        Ok(())
    }

    /// Take the change events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<TableEvent> {
        self.notifier.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(t: &DeviceStateTable) -> Vec<Vec<&str>> {
        t.rows()
            .iter()
            .map(|r| r.state_key.iter().map(String::as_str).collect())
            .collect()
    }

    fn cylinder() -> DeviceStateTable {
        let mut t = DeviceStateTable::default();
        t.set_child_state_spaces(vec![
            ChildStateSpace::new("Output", ["off", "on"]),
            ChildStateSpace::new("Limit", ["closed", "open"]),
        ])
        .unwrap();
        t.take_events();
        t
    }

    #[test]
    fn single_child_product() {
        let mut t = DeviceStateTable::default();
        t.set_child_state_spaces(vec![ChildStateSpace::new("Output", ["off", "on"])])
            .unwrap();
        assert_eq!(keys(&t), vec![vec!["off"], vec!["on"]]);
    }

    #[test]
    fn last_child_varies_slowest() {
        let t = cylinder();
        assert_eq!(
            keys(&t),
            vec![
                vec!["closed", "off"],
                vec!["closed", "on"],
                vec!["open", "off"],
                vec!["open", "on"],
            ]
        );
        assert_eq!(t.display_header()[..2], ["Limit".to_string(), "Output".to_string()]);
    }

    #[test]
    fn rebuild_defaults_metadata() {
        let t = cylinder();
        let r = &t.rows()[3];
        assert_eq!(r.status, DEFAULT_DEVICE_STATUS);
        assert_eq!(r.icon_layer, "layer_3");
        assert!(r.log_entrance);
        assert!(!r.is_alarm && !r.is_warning && !r.triggers_action);
        assert_eq!(r.action, None);
    }

    #[test]
    fn row_count_is_product() {
        let mut t = DeviceStateTable::default();
        t.set_child_state_spaces(vec![
            ChildStateSpace::new("a", ["1", "2", "3"]),
            ChildStateSpace::new("b", ["x", "y"]),
            ChildStateSpace::new("c", ["p", "q", "r", "s"]),
        ])
        .unwrap();
        assert_eq!(t.rows().len(), 24);
        assert_eq!(keys(&t)[1], vec!["p", "x", "2"]);
    }

    #[test]
    fn empty_state_list_is_rejected() {
        let mut t = cylinder();
        let err = t
            .set_child_state_spaces(vec![ChildStateSpace::new("x", Vec::<String>::new())])
            .unwrap_err();
        assert_eq!(err, TableError::EmptyStateSpace("x".to_string()));
        assert_eq!(t.rows().len(), 4);
        assert!(t.take_events().is_empty());
    }

    #[test]
    fn lookup_uses_child_order() {
        let t = cylinder();
        let (index, row) = t.lookup(&["on", "closed"]).unwrap();
        assert_eq!(index, 1);
        assert_eq!(row.state_key, vec!["closed", "on"]);
        assert!(matches!(
            t.lookup(&["on"]),
            Err(TableError::StateArity { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            t.lookup(&["on", "jammed"]),
            Err(TableError::NoMatchingState(_))
        ));
    }

    #[test]
    fn gated_cells_follow_their_flag() {
        let mut t = cylinder();
        assert!(!t.cell_flags(0, DeviceColumn::AlarmMessage).contains(CellFlags::EDITABLE));
        assert!(t
            .set_cell(0, DeviceColumn::AlarmMessage, CellValue::Text("jam".into()))
            .is_err());
        t.set_cell(0, DeviceColumn::IsAlarm, CellValue::Bool(true)).unwrap();
        t.set_cell(0, DeviceColumn::AlarmMessage, CellValue::Text("jam".into()))
            .unwrap();
        t.set_cell(0, DeviceColumn::AlarmTimeout, CellValue::Float(2.5)).unwrap();
        assert_eq!(t.rows()[0].alarm_message, "jam");

        t.set_cell(0, DeviceColumn::IsAlarm, CellValue::Bool(false)).unwrap();
        assert_eq!(t.rows()[0].alarm_timeout, 2.5);
        assert!(!t.cell_flags(0, DeviceColumn::State).contains(CellFlags::EDITABLE));
        assert!(matches!(
            t.set_cell(0, DeviceColumn::Status, CellValue::Bool(true)),
            Err(TableError::CellType { .. })
        ));
        assert_eq!(
            t.take_events(),
            vec![
                TableEvent::DataChanged { row: 0, column: 6 },
                TableEvent::DataChanged { row: 0, column: 8 },
                TableEvent::DataChanged { row: 0, column: 7 },
                TableEvent::DataChanged { row: 0, column: 6 },
            ]
        );
    }

    fn rows_json(states: [u64; 4]) -> TabularArray {
        let mut table = vec![header_row(&header())];
        for s in states {
            table.push(
                serde_json::from_value(json!([
                    s, "ok", "layer", false, 0, "", true, 1.5, "stuck", false, 0.0, null, true
                ]))
                .unwrap(),
            );
        }
        table
    }

    #[test]
    fn load_rows_applies_metadata() {
        let mut t = cylinder();
        t.load_rows(&rows_json([0, 1, 2, 3])).unwrap();
        assert!(t.rows().iter().all(|r| r.is_alarm && r.status == "ok"));
        assert_eq!(t.rows()[2].state_key, vec!["open", "off"]);
        assert_eq!(t.save_rows(), {
            let mut expected = rows_json([0, 1, 2, 3]);
            for row in expected.iter_mut().skip(1) {
                row[4] = json!(0.0);
            }
            expected
        });
    }

    #[test]
    fn load_rows_rejects_bad_state_column() {
        let mut t = cylinder();
        let before = t.clone();
        let mut table = rows_json([0, 1, 2, 3]);
        table.remove(4);
        table[3][0] = json!(3);
        assert!(t.load_rows(&table).is_err());
        assert!(t.load_rows(&rows_json([0, 1, 3, 2])).is_err());
        assert_eq!(t, before);
        assert!(t.take_events().is_empty());
    }

    #[test]
    fn load_rows_type_checks_every_column() {
        let mut t = cylinder();
        let before = t.clone();
        for col in 1..13 {
            let mut table = rows_json([0, 1, 2, 3]);
            table[2][col] = json!({"bad": true});
            assert!(t.load_rows(&table).is_err(), "column {col} accepted an object");
        }
        assert_eq!(t, before);
    }

    #[test]
    fn columns_round_trip_by_index() {
        for (i, c) in DeviceColumn::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
            assert_eq!(DeviceColumn::from_index(i), Some(*c));
        }
        assert_eq!(DeviceColumn::from_index(13), None);
    }
}
