//! Analog state table: threshold classification of a continuous value.
//!
//! Up to four ordered states. State 0 is the fallback and has no threshold;
//! every later state `i` is selected when the value exceeds its
//! `greater_than`, thresholds strictly increasing with the index.

use serde::Serialize;
use tracing::debug;

use super::events::{Notifier, TableEvent};
use crate::consts::MAX_ANALOG_STATES;
use crate::error::{SchemaError, TableError};
use crate::tabular::{RowReader, TabularArray, expect_header, header_row};

/// Tabular header.
pub const HEADER: [&str; 3] = ["state", "greater_than", "gui_name"];

const COL_STATE: usize = 0;
const COL_GREATER_THAN: usize = 1;
const COL_GUI_NAME: usize = 2;

/// One state of an [`AnalogStateTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogStateRow {
    /// Lower bound (exclusive); `None` only for state 0.
    pub greater_than: Option<f64>,
    /// Display name of the state.
    pub gui_name: String,
}

fn placeholder_name(index: usize) -> String {
    format!("State {index}")
}

/// Ordered threshold list of an analog I/O node.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogStateTable {
    rows: Vec<AnalogStateRow>,
    notifier: Notifier,
}

impl Default for AnalogStateTable {
    fn default() -> Self {
        Self {
            rows: vec![AnalogStateRow {
                greater_than: None,
                gui_name: placeholder_name(0),
            }],
            notifier: Notifier::default(),
        }
    }
}

impl AnalogStateTable {
    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.rows.len()
    }

    /// All states in index order.
    pub fn rows(&self) -> &[AnalogStateRow] {
        &self.rows
    }

    fn check_index(&self, index: usize) -> Result<(), TableError> {
        if index >= self.rows.len() {
            return Err(TableError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(())
    }

    /// Grow or shrink the state list.
    ///
    /// Existing states keep their thresholds and names; new trailing states
    /// continue the threshold sequence in steps of 1.0.
    pub fn set_state_count(&mut self, count: usize) -> Result<(), TableError> {
        if !(1..=MAX_ANALOG_STATES).contains(&count) {
            return Err(TableError::StateCountOutOfRange(count));
        }
        if count == self.rows.len() {
            return Ok(());
        }
        let mut rows = self.rows.clone();
        rows.truncate(count);
        while rows.len() < count {
            let index = rows.len();
            let threshold = rows
                .last()
                .and_then(|r| r.greater_than)
                .map_or(0.0, |t| t + 1.0);
            rows.push(AnalogStateRow {
                greater_than: Some(threshold),
                gui_name: placeholder_name(index),
            });
        }
        debug!(from = self.rows.len(), to = count, "analog table reset");
        self.notifier.reset(|| self.rows = rows);
        Ok(())
    }

    /// Move the threshold of state `index`.
    pub fn set_threshold(&mut self, index: usize, value: f64) -> Result<(), TableError> {
        self.check_index(index)?;
        if index == 0 {
            return Err(TableError::ThresholdOnFirstRow);
        }
        if !value.is_finite() {
            return Err(TableError::NotFinite(value));
        }
        let below = self.rows[index - 1].greater_than;
        let above = self.rows.get(index + 1).and_then(|r| r.greater_than);
        if below.is_some_and(|b| value <= b) || above.is_some_and(|a| value >= a) {
            return Err(TableError::ThresholdOrder { index, value });
        }
        self.rows[index].greater_than = Some(value);
        self.notifier.data_changed(index, COL_GREATER_THAN);
        Ok(())
    }

    /// Rename state `index`.
    pub fn set_row_name(&mut self, index: usize, name: impl Into<String>) -> Result<(), TableError> {
        self.check_index(index)?;
        self.rows[index].gui_name = name.into();
        self.notifier.data_changed(index, COL_GUI_NAME);
        Ok(())
    }

    /// State selected by `value`: the highest state whose threshold is
    /// exceeded, state 0 otherwise.
    pub fn classify(&self, value: f64) -> (usize, &AnalogStateRow) {
        self.rows
            .iter()
            .enumerate()
            .rev()
            .find(|(_, r)| r.greater_than.is_some_and(|t| value > t))
            .unwrap_or((0, &self.rows[0]))
    }

    /// Names of all states, in index order.
    pub fn state_names(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.gui_name.clone()).collect()
    }

    /// Tabular form: `[state, greater_than, gui_name]`, row 0 threshold null.
    pub fn save(&self) -> TabularArray {
        std::iter::once(header_row(&HEADER))
            .chain(self.rows.iter().enumerate().map(|(i, r)| {
                vec![i.into(), r.greater_than.into(), r.gui_name.clone().into()]
            }))
            .collect()
    }

    /// Replace the table from its tabular form.
    pub fn load(&mut self, table: &TabularArray) -> Result<(), TableError> {
        let data = expect_header(table, &HEADER)?;
        if data.is_empty() || data.len() > MAX_ANALOG_STATES {
            return Err(SchemaError::new(
                0,
                "*",
                format!("{} states, expected 1..={MAX_ANALOG_STATES}", data.len()),
            )
            .into());
        }

        let mut rows: Vec<AnalogStateRow> = Vec::with_capacity(data.len());
        for (i, cells) in data.iter().enumerate() {
            let r = RowReader::new(i, &HEADER, cells)?;
            r.index(COL_STATE)?;
            let greater_than = r.optional_float(COL_GREATER_THAN)?;
            if i == 0 && greater_than.is_some() {
                return Err(r.reject(COL_GREATER_THAN, "state 0 has no threshold").into());
            }
            if i > 0 && greater_than.is_none() {
                return Err(r.reject(COL_GREATER_THAN, "threshold required").into());
            }
            let previous = rows.last().and_then(|p| p.greater_than);
            if let (Some(p), Some(t)) = (previous, greater_than) {
                if t <= p {
                    return Err(r
                        .reject(COL_GREATER_THAN, format!("{t} is not greater than {p}"))
                        .into());
                }
            }
            rows.push(AnalogStateRow {
                greater_than,
                gui_name: r.string(COL_GUI_NAME)?,
            });
        }

        debug!(states = rows.len(), "analog table loaded");
        self.notifier.reset(|| self.rows = rows);
        Ok(())
    }

    /// Take the change events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<TableEvent> {
        self.notifier.drain()
    }
}
