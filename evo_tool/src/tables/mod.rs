//! State and calibration tables owned by tree nodes.
//!
//! - [`digital`] - bit pattern → named state
//! - [`analog`] - threshold classification
//! - [`calibration`] - piecewise-linear hal ↔ gui mapping
//! - [`device`] - Cartesian product of child state vocabularies
//! - [`events`] - reset / data-changed notification

pub mod analog;
pub mod calibration;
pub mod device;
pub mod digital;
pub mod events;

use core::fmt;
use core::str::FromStr;

pub use analog::AnalogStateTable;
pub use calibration::{CalibrationPoint, CalibrationTable};
pub use device::{ChildStateSpace, CombinationRow, DeviceStateTable};
pub use digital::{BitPattern, DigitalStateTable};
pub use events::TableEvent;

/// Table slot of a node, as addressed by import/export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Digital,
    AnalogStates,
    Calibration,
    Device,
}

impl TableKind {
    /// Attribute key under which the table is persisted.
    pub const fn attr_key(self) -> &'static str {
        match self {
            Self::Digital => "digital_state_table",
            Self::AnalogStates => "analog_state_table",
            Self::Calibration => "calibration_table",
            Self::Device => "device_state_table",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digital => write!(f, "digital"),
            Self::AnalogStates => write!(f, "analog"),
            Self::Calibration => write!(f, "calibration"),
            Self::Device => write!(f, "device"),
        }
    }
}

impl FromStr for TableKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "digital" => Ok(Self::Digital),
            "analog" => Ok(Self::AnalogStates),
            "calibration" => Ok(Self::Calibration),
            "device" => Ok(Self::Device),
            _ => Err(format!(
                "unknown table kind: {s:?}, expected digital, analog, calibration or device"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_its_display_form() {
        for kind in [
            TableKind::Digital,
            TableKind::AnalogStates,
            TableKind::Calibration,
            TableKind::Device,
        ] {
            assert_eq!(kind.to_string().parse::<TableKind>(), Ok(kind));
        }
        assert!("states".parse::<TableKind>().is_err());
    }
}
