//! Calibration table: piecewise-linear hal ↔ gui mapping.
//!
//! Points are ordered by strictly increasing `hal_value`. The `gui_value`
//! column is strictly monotonic in one direction across the whole table,
//! which keeps the mapping invertible. Values outside the table extrapolate
//! along the nearest segment.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::events::{Notifier, TableEvent};
use crate::consts::{MAX_CALIBRATION_ROWS, MIN_CALIBRATION_ROWS};
use crate::error::{SchemaError, TableError};
use crate::tabular::{RowReader, TabularArray, expect_header, header_row};

/// Tabular header.
pub const HEADER: [&str; 2] = ["hal_value", "gui_value"];

const COL_HAL: usize = 0;
const COL_GUI: usize = 1;

/// One calibration point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Raw value as seen by the I/O runtime.
    pub hal_value: f64,
    /// Engineering value shown to the operator.
    pub gui_value: f64,
}

impl CalibrationPoint {
    /// Shorthand constructor.
    pub const fn new(hal_value: f64, gui_value: f64) -> Self {
        Self {
            hal_value,
            gui_value,
        }
    }

    fn offset(self, delta: (f64, f64), k: f64) -> Self {
        Self::new(self.hal_value + delta.0 * k, self.gui_value + delta.1 * k)
    }
}

/// Direction of the `gui_value` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increasing,
    Decreasing,
}

/// Check ordering of a full point list; returns the first offending index.
fn validate(points: &[CalibrationPoint]) -> Result<(), TableError> {
    if points.len() < MIN_CALIBRATION_ROWS {
        return Err(TableError::TooFewRows {
            min: MIN_CALIBRATION_ROWS,
        });
    }
    if points.len() > MAX_CALIBRATION_ROWS {
        return Err(TableError::TooManyRows {
            max: MAX_CALIBRATION_ROWS,
        });
    }
    if let Some(p) = points
        .iter()
        .position(|p| !p.hal_value.is_finite() || !p.gui_value.is_finite())
    {
        return Err(TableError::CalibrationOrder {
            index: p,
            reason: "values must be finite".to_string(),
        });
    }
    let increasing = points[1].gui_value > points[0].gui_value;
    for (i, w) in points.windows(2).enumerate() {
        if w[1].hal_value <= w[0].hal_value {
            return Err(TableError::CalibrationOrder {
                index: i + 1,
                reason: "hal_value must strictly increase".to_string(),
            });
        }
        let ok = if increasing {
            w[1].gui_value > w[0].gui_value
        } else {
            w[1].gui_value < w[0].gui_value
        };
        if !ok {
            return Err(TableError::CalibrationOrder {
                index: i + 1,
                reason: "gui_value must be strictly monotonic".to_string(),
            });
        }
    }
    Ok(())
}

fn lerp(x: f64, (x0, y0): (f64, f64), (x1, y1): (f64, f64)) -> f64 {
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Monotonic calibration curve of an analog I/O node.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
    notifier: Notifier,
}

impl Default for CalibrationTable {
    /// Identity over `[0, 1]`.
    fn default() -> Self {
        Self {
            points: vec![CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(1.0, 1.0)],
            notifier: Notifier::default(),
        }
    }
}

impl CalibrationTable {
    /// Create a table from validated points.
    pub fn new(points: Vec<CalibrationPoint>) -> Result<Self, TableError> {
        validate(&points)?;
        Ok(Self {
            points,
            notifier: Notifier::default(),
        })
    }

    /// All points in hal order.
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a table keeps at least two points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Direction of the gui column.
    pub fn direction(&self) -> Direction {
        if self.points[1].gui_value > self.points[0].gui_value {
            Direction::Increasing
        } else {
            Direction::Decreasing
        }
    }

    /// Replace point `index`.
    ///
    /// The direction of the gui column may only change while the table has
    /// exactly two points.
    pub fn set_point(&mut self, index: usize, hal_value: f64, gui_value: f64) -> Result<(), TableError> {
        if index >= self.points.len() {
            return Err(TableError::RowOutOfRange {
                index,
                len: self.points.len(),
            });
        }
        let mut candidate = self.points.clone();
        candidate[index] = CalibrationPoint::new(hal_value, gui_value);
        validate(&candidate)?;
        if candidate.len() > MIN_CALIBRATION_ROWS {
            let was_increasing = self.direction() == Direction::Increasing;
            let now_increasing = candidate[1].gui_value > candidate[0].gui_value;
            if was_increasing != now_increasing {
                return Err(TableError::CalibrationOrder {
                    index,
                    reason: "gui direction is fixed once the table has more than two points"
                        .to_string(),
                });
            }
        }
        self.points[index] = candidate[index];
        self.notifier.data_changed(index, COL_HAL);
        self.notifier.data_changed(index, COL_GUI);
        Ok(())
    }

    /// Index of the segment used to map `x` along `axis`.
    fn segment(&self, x: f64, axis: fn(&CalibrationPoint) -> f64) -> usize {
        let ascending = axis(&self.points[1]) > axis(&self.points[0]);
        self.points
            .windows(2)
            .position(|w| {
                let upper = axis(&w[1]);
                if ascending { x <= upper } else { x >= upper }
            })
            .unwrap_or(self.points.len() - 2)
    }

    fn map(&self, x: f64, from: fn(&CalibrationPoint) -> f64, to: fn(&CalibrationPoint) -> f64) -> f64 {
        let i = self.segment(x, from);
        let (a, b) = (&self.points[i], &self.points[i + 1]);
        lerp(x, (from(a), to(a)), (from(b), to(b)))
    }

    /// Engineering value of a raw value.
    pub fn to_gui(&self, hal_value: f64) -> f64 {
        self.map(hal_value, |p| p.hal_value, |p| p.gui_value)
    }

    /// Raw value of an engineering value.
    pub fn to_hal(&self, gui_value: f64) -> f64 {
        self.map(gui_value, |p| p.gui_value, |p| p.hal_value)
    }

    /// Insert `count` generated points before `position`.
    ///
    /// Between two points the new points split the gap evenly. At either
    /// end they continue outward in steps of the adjacent pair's delta.
    pub fn insert_rows(&mut self, position: usize, count: usize) -> Result<(), TableError> {
        let len = self.points.len();
        if count == 0 || position > len {
            return Err(TableError::InvalidRange { position, count });
        }
        if count > MAX_CALIBRATION_ROWS.saturating_sub(len) {
            return Err(TableError::TooManyRows {
                max: MAX_CALIBRATION_ROWS,
            });
        }
        let generated: Vec<CalibrationPoint> = if position == 0 {
            let (first, second) = (self.points[0], self.points[1]);
            let delta = (
                first.hal_value - second.hal_value,
                first.gui_value - second.gui_value,
            );
            (1..=count)
                .rev()
                .map(|k| first.offset(delta, k as f64))
                .collect()
        } else if position == len {
            let (before, last) = (self.points[len - 2], self.points[len - 1]);
            let delta = (
                last.hal_value - before.hal_value,
                last.gui_value - before.gui_value,
            );
            (1..=count).map(|k| last.offset(delta, k as f64)).collect()
        } else {
            let (lo, hi) = (self.points[position - 1], self.points[position]);
            let steps = (count + 1) as f64;
            let delta = (
                (hi.hal_value - lo.hal_value) / steps,
                (hi.gui_value - lo.gui_value) / steps,
            );
            (1..=count).map(|k| lo.offset(delta, k as f64)).collect()
        };

        let mut points = self.points.clone();
        points.splice(position..position, generated);
        validate(&points)?;
        debug!(position, count, "calibration rows inserted");
        self.notifier.reset(|| self.points = points);
        Ok(())
    }

    /// Remove `count` points starting at `position`.
    pub fn remove_rows(&mut self, position: usize, count: usize) -> Result<(), TableError> {
        let len = self.points.len();
        if count == 0 || position.checked_add(count).is_none_or(|end| end > len) {
            return Err(TableError::InvalidRange { position, count });
        }
        if len - count < MIN_CALIBRATION_ROWS {
            return Err(TableError::TooFewRows {
                min: MIN_CALIBRATION_ROWS,
            });
        }
        debug!(position, count, "calibration rows removed");
        self.notifier.reset(|| {
            self.points.drain(position..position + count);
        });
        Ok(())
    }

    /// Tabular form: `[hal_value, gui_value]`.
    pub fn save(&self) -> TabularArray {
        std::iter::once(header_row(&HEADER))
            .chain(
                self.points
                    .iter()
                    .map(|p| vec![p.hal_value.into(), p.gui_value.into()]),
            )
            .collect()
    }

    /// Replace the table from its tabular form.
    pub fn load(&mut self, table: &TabularArray) -> Result<(), TableError> {
        let data = expect_header(table, &HEADER)?;
        if data.len() < MIN_CALIBRATION_ROWS {
            return Err(SchemaError::new(
                0,
                "*",
                format!("{} points, expected at least {MIN_CALIBRATION_ROWS}", data.len()),
            )
            .into());
        }
        if data.len() > MAX_CALIBRATION_ROWS {
            return Err(SchemaError::new(
                0,
                "*",
                format!("{} points, expected at most {MAX_CALIBRATION_ROWS}", data.len()),
            )
            .into());
        }
        let mut points = Vec::with_capacity(data.len());
        for (i, cells) in data.iter().enumerate() {
            let r = RowReader::new(i, &HEADER, cells)?;
            points.push(CalibrationPoint::new(r.float(COL_HAL)?, r.float(COL_GUI)?));
        }
        validate(&points).map_err(|e| match e {
            TableError::CalibrationOrder { index, reason } => {
                let column = if reason.starts_with("hal") { HEADER[COL_HAL] } else { HEADER[COL_GUI] };
                SchemaError::new(index + 1, column, reason).into()
            }
            other => other,
        })?;
        debug!(points = points.len(), "calibration table loaded");
        self.notifier.reset(|| self.points = points);
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

    fn pressure() -> CalibrationTable {
        CalibrationTable::new(vec![
            CalibrationPoint::new(0.0, 0.0),
            CalibrationPoint::new(2.0, 10.0),
            CalibrationPoint::new(10.0, 30.0),
        ])
        .unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn interpolates_inside_segments() {
        let t = pressure();
        assert_close(t.to_gui(1.0), 5.0);
        assert_close(t.to_gui(6.0), 20.0);
        assert_close(t.to_hal(20.0), 6.0);
        assert_close(t.to_gui(2.0), 10.0);
    }

    #[test]
    fn extrapolates_with_nearest_slope() {
        let t = pressure();
        assert_close(t.to_gui(-1.0), -5.0);
        assert_close(t.to_gui(12.0), 35.0);
        assert_close(t.to_hal(40.0), 14.0);
    }

    #[test]
    fn decreasing_gui_column_inverts() {
        let t = CalibrationTable::new(vec![
            CalibrationPoint::new(0.0, 100.0),
            CalibrationPoint::new(1.0, 50.0),
            CalibrationPoint::new(3.0, 0.0),
        ])
        .unwrap();
        assert_eq!(t.direction(), Direction::Decreasing);
        assert_close(t.to_gui(2.0), 25.0);
        assert_close(t.to_hal(25.0), 2.0);
        assert_close(t.to_hal(150.0), -1.0);
        assert_close(t.to_hal(-25.0), 4.0);
    }

    #[test]
    fn rejects_mixed_directions() {
        let err = CalibrationTable::new(vec![
            CalibrationPoint::new(0.0, 0.0),
            CalibrationPoint::new(1.0, 5.0),
            CalibrationPoint::new(2.0, 4.0),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::CalibrationOrder { index: 2, .. }));
    }

    #[test]
    fn set_point_respects_neighbors() {
        let mut t = pressure();
        assert!(t.set_point(1, 0.0, 10.0).is_err());
        assert!(t.set_point(1, 11.0, 10.0).is_err());
        assert!(t.set_point(1, 1.0, 40.0).is_err());
        assert!(t.set_point(0, 0.0, 50.0).is_err());
        t.set_point(1, 1.0, 15.0).unwrap();
        assert_eq!(t.points()[1], CalibrationPoint::new(1.0, 15.0));
    }

    #[test]
    fn direction_is_rechoosable_with_two_points() {
        let mut t = CalibrationTable::default();
        t.set_point(1, 1.0, -1.0).unwrap();
        assert_eq!(t.direction(), Direction::Decreasing);
        assert!(t.set_point(1, 1.0, 0.0).is_err());
    }

    #[test]
    fn insert_between_interpolates_evenly() {
        let mut t = pressure();
        t.insert_rows(2, 3).unwrap();
        let hal: Vec<_> = t.points().iter().map(|p| p.hal_value).collect();
        assert_eq!(hal, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_close(t.points()[3].gui_value, 20.0);
        assert_eq!(
            t.take_events(),
            vec![TableEvent::ResetBegin, TableEvent::ResetEnd]
        );
    }

    #[test]
    fn insert_at_ends_extrapolates() {
        let mut t = pressure();
        t.insert_rows(0, 2).unwrap();
        let hal: Vec<_> = t.points().iter().map(|p| p.hal_value).collect();
        assert_eq!(hal, vec![-4.0, -2.0, 0.0, 2.0, 10.0]);
        assert_close(t.points()[0].gui_value, -20.0);

        let len = t.len();
        t.insert_rows(len, 1).unwrap();
        assert_eq!(*t.points().last().unwrap(), CalibrationPoint::new(18.0, 50.0));
        assert!(t.insert_rows(t.len() + 1, 1).is_err());
        assert!(t.insert_rows(0, 0).is_err());
    }

    #[test]
    fn remove_keeps_two_points() {
        let mut t = pressure();
        t.remove_rows(1, 1).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(
            t.remove_rows(0, 1),
            Err(TableError::TooFewRows {
                min: MIN_CALIBRATION_ROWS
            })
        );
        assert!(t.remove_rows(1, 2).is_err());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn huge_ranges_are_rejected() {
        let mut t = pressure();
        assert_eq!(
            t.remove_rows(1, usize::MAX),
            Err(TableError::InvalidRange {
                position: 1,
                count: usize::MAX
            })
        );
        assert!(t.remove_rows(usize::MAX, 1).is_err());
        for position in [0, 1, 3] {
            assert_eq!(
                t.insert_rows(position, usize::MAX),
                Err(TableError::TooManyRows {
                    max: MAX_CALIBRATION_ROWS
                })
            );
        }
        assert_eq!(t, pressure());
        assert!(t.take_events().is_empty());
    }

    #[test]
    fn insert_fills_up_to_the_limit() {
        let mut t = CalibrationTable::default();
        t.insert_rows(2, MAX_CALIBRATION_ROWS - 2).unwrap();
        assert_eq!(t.len(), MAX_CALIBRATION_ROWS);
        assert!(t.insert_rows(1, 1).is_err());
        assert_eq!(t.len(), MAX_CALIBRATION_ROWS);
    }

    #[test]
    fn load_validates_ordering_and_types() {
        let mut t = CalibrationTable::default();
        let good: TabularArray =
            serde_json::from_value(json!([["hal_value", "gui_value"], [0, 10], [5, 0]])).unwrap();
        t.load(&good).unwrap();
        assert_eq!(t.direction(), Direction::Decreasing);

        let bad = [
            json!([["hal_value", "gui_value"], [0, 0]]),
            json!([["hal_value", "gui_value"], [1, 0], [0, 1]]),
            json!([["hal_value", "gui_value"], [0, 0], [1, 1], [2, 0]]),
            json!([["hal_value", "gui_value"], [0, "x"], [1, 1]]),
            json!([["gui_value", "hal_value"], [0, 0], [1, 1]]),
        ];
        for v in bad {
            let table: TabularArray = serde_json::from_value(v).unwrap();
            assert!(t.load(&table).is_err(), "accepted {table:?}");
        }
        assert_eq!(t.save(), good_saved());
    }

    fn good_saved() -> TabularArray {
        serde_json::from_value(json!([["hal_value", "gui_value"], [0.0, 10.0], [5.0, 0.0]])).unwrap()
    }
}
