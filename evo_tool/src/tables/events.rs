//! Change notification for tables.
//!
//! Tables record what changed; the owning tree drains the record after each
//! edit and forwards it to its own event queue. Bulk changes are bracketed
//! by exactly one `ResetBegin` / `ResetEnd` pair so observers never see a
//! half-rebuilt table.

/// One change recorded by a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEvent {
    /// A bulk rebuild starts.
    ResetBegin,
    /// The bulk rebuild finished; the table is consistent again.
    ResetEnd,
    /// A single cell changed (column index in the tabular header).
    DataChanged { row: usize, column: usize },
}

/// Pending events of one table.
///
/// Not part of a table's value: clones start empty and equality ignores it.
#[derive(Debug, Default)]
pub struct Notifier {
    pending: Vec<TableEvent>,
}

impl Notifier {
    /// Run `rebuild` inside a reset transaction.
    pub(crate) fn reset<R>(&mut self, rebuild: impl FnOnce() -> R) -> R {
        self.pending.push(TableEvent::ResetBegin);
        let out = rebuild();
        self.pending.push(TableEvent::ResetEnd);
        out
    }

    pub(crate) fn data_changed(&mut self, row: usize, column: usize) {
        self.pending.push(TableEvent::DataChanged { row, column });
    }

    /// Take all pending events.
    pub fn drain(&mut self) -> Vec<TableEvent> {
        std::mem::take(&mut self.pending)
    }
}

impl Clone for Notifier {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PartialEq for Notifier {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_brackets_exactly_once() {
        let mut n = Notifier::default();
        let value = n.reset(|| 42);
        assert_eq!(value, 42);
        n.data_changed(1, 2);
        assert_eq!(
            n.drain(),
            vec![
                TableEvent::ResetBegin,
                TableEvent::ResetEnd,
                TableEvent::DataChanged { row: 1, column: 2 }
            ]
        );
        assert!(n.drain().is_empty());
    }

    #[test]
    fn clones_do_not_carry_pending_events() {
        let mut n = Notifier::default();
        n.data_changed(0, 0);
        assert!(n.clone().drain().is_empty());
    }
}
