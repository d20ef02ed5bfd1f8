//! Device monitor: state entry, warning, alarm and action timing.
//!
//! The collaborator calls [`DeviceMonitor::update`] after pushing samples,
//! passing its own clock in seconds. Each device remembers which
//! combination row it is in and since when; timed conditions fire once per
//! entry into a row.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::tree::{NodeId, NodeType, Tree};

/// Something the collaborator should act on or log.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Device entered a row that has `log_entrance` set.
    Entered {
        device: NodeId,
        row: usize,
        status: String,
    },
    Warning { device: NodeId, message: String },
    Alarm { device: NodeId, message: String },
    Action { device: NodeId, action: String },
    /// Child states match no row, or a child is in an unused state.
    Unresolved { device: NodeId },
}

#[derive(Debug, Clone, Copy, Default)]
struct Tracking {
    row: Option<usize>,
    since: f64,
    warned: bool,
    alarmed: bool,
    acted: bool,
    unresolved: bool,
}

/// Per-device state timers.
#[derive(Debug, Clone, Default)]
pub struct DeviceMonitor {
    devices: HashMap<NodeId, Tracking>,
}

impl DeviceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row the device was in at the last update.
    pub fn current_row(&self, device: NodeId) -> Option<usize> {
        self.devices.get(&device).and_then(|t| t.row)
    }

    /// Seconds the device has spent in its current row.
    pub fn time_in_state(&self, device: NodeId, now: f64) -> Option<f64> {
        self.devices
            .get(&device)
            .filter(|t| t.row.is_some())
            .map(|t| now - t.since)
    }

    /// Classify every device and report what happened since the last call.
    pub fn update(&mut self, tree: &Tree, now: f64) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        let devices: Vec<NodeId> = tree
            .iter()
            .filter(|(_, n)| n.node_type() == NodeType::Device)
            .map(|(id, _)| id)
            .collect();
        self.devices.retain(|id, _| devices.contains(id));

        for device in devices {
            let tracking = self.devices.entry(device).or_default();
            let classified = tree.read_classified(device);
            let table = tree.device_state_table(device);
            let (Ok(c), Ok(table)) = (classified, table) else {
                if !tracking.unresolved {
                    warn!(%device, "device state unresolved");
                    events.push(MonitorEvent::Unresolved { device });
                }
                *tracking = Tracking {
                    unresolved: true,
                    ..Tracking::default()
                };
                continue;
            };
            let Some(row) = table.rows().get(c.index) else {
                continue;
            };

            if tracking.row != Some(c.index) {
                *tracking = Tracking {
                    row: Some(c.index),
                    since: now,
                    ..Tracking::default()
                };
                if row.log_entrance {
                    info!(%device, row = c.index, status = %row.status, "device state entered");
                    events.push(MonitorEvent::Entered {
                        device,
                        row: c.index,
                        status: row.status.clone(),
                    });
                }
            }

            let elapsed = now - tracking.since;
            if row.is_warning && !tracking.warned && elapsed >= row.warning_timeout {
                tracking.warned = true;
                warn!(%device, message = %row.warning_message, "device warning");
                events.push(MonitorEvent::Warning {
                    device,
                    message: row.warning_message.clone(),
                });
            }
            if row.is_alarm && !tracking.alarmed && elapsed >= row.alarm_timeout {
                tracking.alarmed = true;
                warn!(%device, message = %row.alarm_message, "device alarm");
                events.push(MonitorEvent::Alarm {
                    device,
                    message: row.alarm_message.clone(),
                });
            }
            if row.triggers_action && !tracking.acted && elapsed >= row.action_timeout {
                if let Some(action) = &row.action {
                    tracking.acted = true;
                    info!(%device, %action, "device action");
                    events.push(MonitorEvent::Action {
                        device,
                        action: action.clone(),
                    });
                }
            }
        }
        events
    }
}
