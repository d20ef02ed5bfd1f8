//! Digital state table: bit pattern → named state.
//!
//! A digital I/O node combines 1–4 boolean signals. Every one of the 2^n
//! patterns is a row, enumerated in binary counting order with bit 0 as the
//! least significant bit. A row may be suppressed (`is_used = false`), in
//! which case it is not part of the node's state vocabulary. Row 0 (all
//! bits clear) is the power-on state and is always used.

use heapless::Vec as FixedVec;
use serde::Serialize;
use tracing::debug;

use super::events::{Notifier, TableEvent};
use crate::consts::{DEFAULT_GUI_NAME, MAX_BIT_COUNT};
use crate::error::{SchemaError, TableError};
use crate::tabular::{RowReader, TabularArray, header_row, split_header};

/// One sampled or generated bit pattern, bit 0 first.
pub type BitPattern = FixedVec<bool, MAX_BIT_COUNT>;

/// Tabular header written on save.
pub const HEADER: [&str; 3] = ["state", "gui_name", "is_used"];

const COL_STATE: usize = 0;
const COL_GUI_NAME: usize = 1;
const COL_IS_USED: usize = 2;

/// One row of a [`DigitalStateTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigitalStateRow {
    /// Bit pattern this row stands for.
    pub bits: BitPattern,
    /// Display name of the state.
    pub gui_name: String,
    /// Whether the state is part of the vocabulary.
    pub is_used: bool,
}

/// Bit pattern of row `index` in a table of `bit_count` bits.
pub fn pattern(index: usize, bit_count: usize) -> BitPattern {
    (0..bit_count).map(|bit| (index >> bit) & 1 == 1).collect()
}

/// Row index of a pattern (bit i weighs 2^i).
pub fn pattern_index(bits: &[bool]) -> usize {
    bits.iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .map(|(bit, _)| 1usize << bit)
        .sum()
}

fn bit_count_for_rows(rows: usize) -> Option<usize> {
    match rows {
        2 => Some(1),
        4 => Some(2),
        8 => Some(3),
        16 => Some(4),
        _ => None,
    }
}

/// Truth table of a digital I/O node.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalStateTable {
    bit_count: usize,
    rows: Vec<DigitalStateRow>,
    notifier: Notifier,
}

impl Default for DigitalStateTable {
    fn default() -> Self {
        Self {
            bit_count: 1,
            rows: Self::generate(1, &[]),
            notifier: Notifier::default(),
        }
    }
}

impl DigitalStateTable {
    /// Create a table with `bit_count` bits and default rows.
    pub fn new(bit_count: usize) -> Result<Self, TableError> {
        let mut table = Self::default();
        table.set_bit_count(bit_count)?;
        table.notifier.drain();
        Ok(table)
    }

    /// Generate `2^bit_count` rows, keeping names and flags of `old` by index.
    fn generate(bit_count: usize, old: &[DigitalStateRow]) -> Vec<DigitalStateRow> {
        (0..1usize << bit_count)
            .map(|index| {
                let (gui_name, is_used) = old
                    .get(index)
                    .map(|r| (r.gui_name.clone(), r.is_used))
                    .unwrap_or_else(|| (DEFAULT_GUI_NAME.to_string(), true));
                DigitalStateRow {
                    bits: pattern(index, bit_count),
                    gui_name,
                    is_used: is_used || index == 0,
                }
            })
            .collect()
    }

    /// Number of combined bits.
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// All rows in enumeration order.
    pub fn rows(&self) -> &[DigitalStateRow] {
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

    /// Change the number of bits and regenerate the rows.
    pub fn set_bit_count(&mut self, bit_count: usize) -> Result<(), TableError> {
        if !(1..=MAX_BIT_COUNT).contains(&bit_count) {
            return Err(TableError::BitCountOutOfRange(bit_count));
        }
        if bit_count == self.bit_count {
            return Ok(());
        }
        let rows = Self::generate(bit_count, &self.rows);
        debug!(from = self.bit_count, to = bit_count, "digital table reset");
        self.notifier.reset(|| {
            self.bit_count = bit_count;
            self.rows = rows;
        });
        Ok(())
    }

    /// Rename state `index`.
    pub fn set_row_name(&mut self, index: usize, name: impl Into<String>) -> Result<(), TableError> {
        self.check_index(index)?;
        self.rows[index].gui_name = name.into();
        self.notifier.data_changed(index, COL_GUI_NAME);
        Ok(())
    }

    /// Include or suppress state `index`. Row 0 cannot be suppressed.
    pub fn set_row_is_used(&mut self, index: usize, used: bool) -> Result<(), TableError> {
        self.check_index(index)?;
        if index == 0 && !used {
            return Err(TableError::PowerOnStateUnused);
        }
        self.rows[index].is_used = used;
        self.notifier.data_changed(index, COL_IS_USED);
        Ok(())
    }

    /// Row selected by a sampled pattern.
    ///
    /// A suppressed row is an error: the signal combination is not expected
    /// on this node.
    pub fn classify(&self, bits: &[bool]) -> Result<(usize, &DigitalStateRow), TableError> {
        if bits.len() != self.bit_count {
            return Err(TableError::PatternWidth {
                expected: self.bit_count,
                actual: bits.len(),
            });
        }
        let index = pattern_index(bits);
        let row = &self.rows[index];
        if !row.is_used {
            return Err(TableError::UnusedState { index });
        }
        Ok((index, row))
    }

    /// Names of the used states, in row order.
    pub fn state_names(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.is_used)
            .map(|r| r.gui_name.clone())
            .collect()
    }

    /// Pattern of the first used state called `name`.
    pub fn pattern_for(&self, name: &str) -> Result<&BitPattern, TableError> {
        self.rows
            .iter()
            .find(|r| r.is_used && r.gui_name == name)
            .map(|r| &r.bits)
            .ok_or_else(|| TableError::UnknownState(name.to_string()))
    }

    /// Tabular form: `[state, gui_name, is_used]`.
    pub fn save(&self) -> TabularArray {
        std::iter::once(header_row(&HEADER))
            .chain(self.rows.iter().enumerate().map(|(i, r)| {
                vec![i.into(), r.gui_name.clone().into(), r.is_used.into()]
            }))
            .collect()
    }

    /// Replace the table from its tabular form.
    ///
    /// The `is_used` column may be omitted, in which case every state is
    /// used. The row count selects the bit count.
    pub fn load(&mut self, table: &TabularArray) -> Result<(), TableError> {
        let (header, data) = split_header(table)?;
        let with_used = header.as_slice() == HEADER;
        if !with_used && header.as_slice() != &HEADER[..2] {
            return Err(SchemaError::new(
                0,
                "*",
                format!("header {header:?} does not match {HEADER:?}"),
            )
            .into());
        }
        let bit_count = bit_count_for_rows(data.len()).ok_or_else(|| {
            SchemaError::new(
                0,
                "*",
                format!("{} rows is not one of 2, 4, 8, 16", data.len()),
            )
        })?;

        let mut rows = Vec::with_capacity(data.len());
        for (i, cells) in data.iter().enumerate() {
            let r = RowReader::new(i, &header, cells)?;
            r.index(COL_STATE)?;
            let gui_name = r.string(COL_GUI_NAME)?;
            let is_used = if with_used { r.boolean(COL_IS_USED)? } else { true };
            if i == 0 && !is_used {
                return Err(r.reject(COL_IS_USED, "power-on state must be used").into());
            }
            rows.push(DigitalStateRow {
                bits: pattern(i, bit_count),
                gui_name,
                is_used,
            });
        }

        debug!(bit_count, "digital table loaded");
        self.notifier.reset(|| {
            self.bit_count = bit_count;
            self.rows = rows;
        });
        Ok(())
    }

    /// Take the change events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<TableEvent> {
        self.notifier.drain()
    }
}
