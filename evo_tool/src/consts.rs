//! Model-wide constants for the tool configurator.
//!
//! Single source of truth for table limits, default cell values and
//! default file names. Imported by the library and the CLI.

use static_assertions::const_assert_eq;

/// Maximum number of bits a digital I/O node combines into one state.
pub const MAX_BIT_COUNT: usize = 4;

/// Rows of a digital state table at `MAX_BIT_COUNT` bits.
pub const MAX_DIGITAL_ROWS: usize = 1 << MAX_BIT_COUNT;

/// Maximum number of classified states of an analog I/O node.
pub const MAX_ANALOG_STATES: usize = 4;

/// Minimum number of points a calibration table keeps.
pub const MIN_CALIBRATION_ROWS: usize = 2;

/// Maximum number of points a calibration table holds.
pub const MAX_CALIBRATION_ROWS: usize = 1024;

/// Placeholder name of a freshly generated digital state.
pub const DEFAULT_GUI_NAME: &str = "GUI Name";

/// Status text of a freshly generated device state.
pub const DEFAULT_DEVICE_STATUS: &str = "unknown status";

/// Prefix of the generated icon layer name (`layer_0`, `layer_1`, ...).
pub const DEFAULT_ICON_LAYER_PREFIX: &str = "layer_";

/// Suffix appended to a sibling name until it is unique.
pub const UNIQUE_NAME_SUFFIX: &str = "_new";

/// Maximum display precision of an analog value.
pub const MAX_DECIMALS: i64 = 9;

/// Default configurator settings file.
pub const DEFAULT_CONFIG_FILE: &str = "configurator.toml";

/// Default tool tree file.
pub const DEFAULT_TOOL_FILE: &str = "tool.json";

const_assert_eq!(MAX_DIGITAL_ROWS, 16);
