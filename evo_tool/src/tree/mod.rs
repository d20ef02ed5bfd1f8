//! The configuration tree.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Each slot keeps
//! its parent id and the ordered ids of its children. Ids are never reused:
//! a removed node's id stays invalid for the life of the tree.
//!
//! All table edits go through the tree so it can forward table events and
//! rebuild a device's state table when a child's vocabulary, name or the
//! child set changes.

pub mod kind;
pub mod naming;
mod persist;

use core::fmt;

use tracing::{debug, warn};

pub use kind::{
    AnalogIo, CalibrationType, CanvasAttrs, DeviceAttrs, DigitalIo, NodeData, NodeKind, NodeType,
};

use crate::attr::AttrValue;
use crate::error::{AttrError, ModelResult, TableError, TreeError};
use crate::runtime::Live;
use crate::tables::{
    AnalogStateTable, CalibrationTable, ChildStateSpace, DeviceStateTable, DigitalStateTable,
    TableEvent, TableKind,
};
use crate::tabular::TabularArray;

// ─── Ids & Events ───────────────────────────────────────────────────

/// Stable handle of a node within one [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Change notification of the tree, drained with [`Tree::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A table owned by `node` changed.
    Table {
        node: NodeId,
        table: TableKind,
        event: TableEvent,
    },
    /// Children of `parent` were added or removed.
    ChildrenChanged { parent: NodeId },
    /// Node got a new name.
    Renamed { node: NodeId, name: String },
    /// Attribute written through [`Tree::set_attr`].
    AttributeChanged { node: NodeId, key: String },
}

// ─── Arena ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
    /// Most recent sample; not part of the configuration.
    pub(crate) live: Live,
}

/// Node tree rooted at a tool node.
#[derive(Debug, Clone)]
pub struct Tree {
    slots: Vec<Option<Slot>>,
    root: NodeId,
    events: Vec<ModelEvent>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Tree with a default tool root and nothing else.
    pub fn new() -> Self {
        let root = NodeData::new(NodeType::Tool, NodeType::Tool.default_name());
        let live = Live::for_kind(&root.kind);
        Self {
            slots: vec![Some(Slot {
                parent: None,
                children: Vec::new(),
                data: root,
                live,
            })],
            root: NodeId(0),
            events: Vec::new(),
        }
    }

    /// Tree rooted at `data`, which must be a tool node.
    pub fn with_root(data: NodeData) -> Result<Self, TreeError> {
        if data.node_type() != NodeType::Tool {
            return Err(TreeError::Malformed {
                path: String::new(),
                reason: format!("root is {}, expected {}", data.node_type(), NodeType::Tool),
            });
        }
        data.check_position().map_err(|e| TreeError::Malformed {
            path: String::new(),
            reason: e.to_string(),
        })?;
        let mut tree = Self::new();
        if let Some(slot) = tree.slots[0].as_mut() {
            slot.data = data;
        }
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Always false: the root cannot be removed.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn slot(&self, id: NodeId) -> Result<&Slot, TreeError> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(TreeError::UnknownNode(id))
    }

    pub(crate) fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot, TreeError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(TreeError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_ok()
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        self.slot(id).map(|s| &s.data)
    }

    pub fn node_type(&self, id: NodeId) -> Result<NodeType, TreeError> {
        self.node(id).map(NodeData::node_type)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        self.slot(id).map(|s| s.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        self.slot(id).map(|s| s.children.as_slice())
    }

    /// Index of `id` within its parent's children; `None` for the root.
    pub fn row(&self, id: NodeId) -> Result<Option<usize>, TreeError> {
        let Some(parent) = self.parent(id)? else {
            return Ok(None);
        };
        Ok(self.children(parent)?.iter().position(|c| *c == id))
    }

    /// `id` and everything below it, depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Ok(slot) = self.slot(next) else {
                continue;
            };
            out.push(next);
            stack.extend(slot.children.iter().rev());
        }
        out
    }

    /// Every node, depth first from the root.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeData)> + '_ {
        self.descendants(self.root)
            .into_iter()
            .filter_map(move |id| self.node(id).ok().map(|n| (id, n)))
    }

    /// Take the change events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }

    // ─── Structure ──────────────────────────────────────────────────

    /// Append a child.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData) -> ModelResult<NodeId> {
        let position = self.children(parent)?.len();
        self.insert_child(parent, position, data)
    }

    /// Insert a child at `position` (`0..=child_count`).
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        position: usize,
        mut data: NodeData,
    ) -> ModelResult<NodeId> {
        let parent_slot = self.slot(parent)?;
        let parent_type = parent_slot.data.node_type();
        let child_type = data.node_type();
        if !parent_type.accepts_child(child_type) {
            return Err(TreeError::KindNotAllowed {
                parent: parent_type,
                child: child_type,
            }
            .into());
        }
        data.check_position()?;
        let len = parent_slot.children.len();
        if position > len {
            return Err(TreeError::PositionOutOfRange { position, len }.into());
        }
        if child_type.requires_unique_name() {
            data.name = self.unique_sibling_name(parent, None, &data.name)?;
        }

        let id = NodeId(self.slots.len() as u32);
        let live = Live::for_kind(&data.kind);
        debug!(%id, %parent, position, kind = %child_type, name = %data.name, "child inserted");
        self.slots.push(Some(Slot {
            parent: Some(parent),
            children: Vec::new(),
            data,
            live,
        }));
        self.slot_mut(parent)?.children.insert(position, id);
        self.siblings_changed(parent)?;
        Ok(id)
    }

    /// Detach and drop the child at `position` with its whole subtree.
    ///
    /// Returns the removed node's data.
    pub fn remove_child(&mut self, parent: NodeId, position: usize) -> ModelResult<NodeData> {
        let len = self.children(parent)?.len();
        if position >= len {
            return Err(TreeError::PositionOutOfRange { position, len }.into());
        }
        let id = self.slot_mut(parent)?.children.remove(position);
        let subtree = self.descendants(id);
        let mut removed = None;
        for n in &subtree {
            let slot = self.slots[n.index()].take();
            if *n == id {
                removed = slot.map(|s| s.data);
            }
        }
        debug!(%id, %parent, dropped = subtree.len(), "child removed");
        self.siblings_changed(parent)?;
        removed.ok_or_else(|| TreeError::UnknownNode(id).into())
    }

    /// Rename a node, returning the name actually assigned.
    ///
    /// Device and I/O names are sanitized and made unique among siblings.
    pub fn rename(&mut self, id: NodeId, raw: &str) -> ModelResult<String> {
        let slot = self.slot(id)?;
        let node_type = slot.data.node_type();
        let parent = slot.parent;
        let name = match parent {
            Some(p) if node_type.requires_unique_name() => {
                self.unique_sibling_name(p, Some(id), raw)?
            }
            _ if node_type.requires_unique_name() => naming::sanitize(raw),
            _ => raw.to_string(),
        };
        let slot = self.slot_mut(id)?;
        if slot.data.name == name {
            return Ok(name);
        }
        slot.data.name = name.clone();
        self.events.push(ModelEvent::Renamed {
            node: id,
            name: name.clone(),
        });
        if let Some(p) = parent {
            if node_type.is_io() {
                self.refresh_device(p)?;
            }
        }
        Ok(name)
    }

    fn unique_sibling_name(
        &self,
        parent: NodeId,
        exclude: Option<NodeId>,
        raw: &str,
    ) -> Result<String, TreeError> {
        let slots = &self.slots;
        let siblings = self
            .children(parent)?
            .iter()
            .filter(move |c| Some(**c) != exclude)
            .filter_map(move |c| slots[c.index()].as_ref())
            .map(|s| s.data.name.as_str());
        Ok(naming::unique_name(raw, siblings))
    }

    /// Re-establish sibling name uniqueness and the device table after the
    /// child set of `parent` changed.
    fn siblings_changed(&mut self, parent: NodeId) -> ModelResult<()> {
        let children = self.children(parent)?.to_vec();
        let mut seen: Vec<String> = Vec::with_capacity(children.len());
        for child in children {
            let slot = self.slot_mut(child)?;
            if slot.data.node_type().requires_unique_name() {
                let name = naming::unique_name(&slot.data.name, seen.iter().map(String::as_str));
                if name != slot.data.name {
                    slot.data.name = name.clone();
                    self.events.push(ModelEvent::Renamed {
                        node: child,
                        name: name.clone(),
                    });
                }
                seen.push(name);
            } else {
                seen.push(slot.data.name.clone());
            }
        }
        self.events.push(ModelEvent::ChildrenChanged { parent });
        self.refresh_device(parent)
    }

    // ─── Paths ──────────────────────────────────────────────────────

    /// `/`-separated names from the root's children down to `id`; empty
    /// for the root.
    pub fn path_of(&self, id: NodeId) -> Result<String, TreeError> {
        let mut names = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            names.push(self.node(current)?.name.as_str());
            current = parent;
        }
        names.reverse();
        Ok(names.join("/"))
    }

    /// Node at a `/`-separated path; the empty path names the root.
    pub fn find_by_path(&self, path: &str) -> Result<NodeId, TreeError> {
        let mut current = self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = self
                .children(current)?
                .iter()
                .copied()
                .find(|c| self.node(*c).is_ok_and(|n| n.name == part))
                .ok_or_else(|| TreeError::PathNotFound(path.to_string()))?;
        }
        Ok(current)
    }

    // ─── Attributes ─────────────────────────────────────────────────

    /// Declared attribute keys of a node, sorted.
    pub fn attr_keys(&self, id: NodeId) -> Result<Vec<&'static str>, TreeError> {
        Ok(self
            .node(id)?
            .attr_types()
            .into_iter()
            .map(|(k, _)| k)
            .collect())
    }

    pub fn get_attr(&self, id: NodeId, key: &str) -> ModelResult<AttrValue> {
        let node = self.node(id)?;
        node.attr(key).ok_or_else(|| {
            AttrError::UnknownKey {
                key: key.to_string(),
                node_type: node.node_type(),
            }
            .into()
        })
    }

    /// Write an attribute by key.
    ///
    /// `name` goes through [`Tree::rename`]; table attributes replace the
    /// table from its tabular text.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: AttrValue) -> ModelResult<()> {
        self.assign_attr(id, key, value, true)
    }

    /// `apply_pending` is false while loading, where device rows wait for
    /// the children.
    pub(crate) fn assign_attr(
        &mut self,
        id: NodeId,
        key: &str,
        value: AttrValue,
        apply_pending: bool,
    ) -> ModelResult<()> {
        if key == "name" {
            let name = value.text("name")?;
            self.rename(id, &name)?;
            return Ok(());
        }
        let slot = self.slot_mut(id)?;
        slot.data.write_attr(key, value)?;
        slot.live.fit(&slot.data.kind);
        let node_type = slot.data.node_type();
        let parent = slot.parent;
        let events = slot.data.kind.take_table_events();
        self.forward(id, events);
        self.events.push(ModelEvent::AttributeChanged {
            node: id,
            key: key.to_string(),
        });
        if node_type == NodeType::Device && apply_pending {
            self.apply_pending_rows(id)?;
        }
        if let Some(p) = parent {
            if node_type.is_io() {
                self.refresh_device(p)?;
            }
        }
        Ok(())
    }

    // ─── Tables ─────────────────────────────────────────────────────

    fn forward(&mut self, node: NodeId, events: Vec<(TableKind, TableEvent)>) {
        self.events.extend(
            events
                .into_iter()
                .map(|(table, event)| ModelEvent::Table { node, table, event }),
        );
    }

    /// Vocabularies of the I/O children of `device`, in child order.
    fn child_state_spaces(&self, device: NodeId) -> Result<Vec<ChildStateSpace>, TreeError> {
        Ok(self
            .children(device)?
            .iter()
            .filter_map(|c| self.node(*c).ok())
            .filter_map(|n| {
                n.kind
                    .state_names()
                    .map(|states| ChildStateSpace::new(n.name.clone(), states))
            })
            .collect())
    }

    /// Rebuild the state table of `device` when its children's vocabularies
    /// no longer match. No-op for other kinds.
    fn refresh_device(&mut self, device: NodeId) -> ModelResult<()> {
        if self.node_type(device)? != NodeType::Device {
            return Ok(());
        }
        let spaces = self.child_state_spaces(device)?;
        let slot = self.slot_mut(device)?;
        let Some(attrs) = slot.data.kind.device_mut() else {
            return Ok(());
        };
        if attrs.table.child_state_spaces() == spaces.as_slice() {
            return Ok(());
        }
        attrs.table.set_child_state_spaces(spaces)?;
        let events = slot.data.kind.take_table_events();
        self.forward(device, events);
        Ok(())
    }

    /// Apply row metadata stored by the `device_state_table` attribute.
    pub(crate) fn apply_pending_rows(&mut self, device: NodeId) -> ModelResult<()> {
        self.refresh_device(device)?;
        let slot = self.slot_mut(device)?;
        let Some(attrs) = slot.data.kind.device_mut() else {
            return Ok(());
        };
        let Some(rows) = attrs.pending_rows.take() else {
            return Ok(());
        };
        let result = attrs.table.load_rows(&rows);
        let events = slot.data.kind.take_table_events();
        self.forward(device, events);
        result.map_err(|source| {
            AttrError::Table {
                key: TableKind::Device.attr_key(),
                source,
            }
            .into()
        })
    }

    /// Run `edit` on one table of a node as a single step.
    ///
    /// A closure may chain several table calls; if any of them fails the
    /// table is restored to its state before the closure ran and no events
    /// are forwarded.
    fn edit_table<T: Clone, R>(
        &mut self,
        id: NodeId,
        table: TableKind,
        select: impl FnOnce(&mut NodeKind) -> Option<&mut T>,
        edit: impl FnOnce(&mut T) -> Result<R, TableError>,
    ) -> ModelResult<R> {
        let slot = self.slot_mut(id)?;
        let node_type = slot.data.node_type();
        let target = select(&mut slot.data.kind).ok_or(TreeError::NoSuchTable {
            node_type,
            table: table.attr_key(),
        })?;
        // Clones start without pending events, so restoring also drops
        // whatever the partial edit recorded.
        let snapshot = target.clone();
        let out = match edit(&mut *target) {
            Ok(out) => out,
            Err(e) => {
                *target = snapshot;
                debug!(node = %id, table = %table, error = %e, "table edit rolled back");
                return Err(e.into());
            }
        };
        slot.live.fit(&slot.data.kind);
        let parent = slot.parent;
        let events = slot.data.kind.take_table_events();
        self.forward(id, events);
        // Dependent rebuilds run after the table's own transaction ended.
        if node_type == NodeType::Device {
            self.refresh_device(id)?;
        } else if let Some(p) = parent {
            self.refresh_device(p)?;
        }
        Ok(out)
    }

    /// Edit the digital state table of a digital I/O node.
    pub fn edit_digital_table<R>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut DigitalStateTable) -> Result<R, TableError>,
    ) -> ModelResult<R> {
        self.edit_table(
            id,
            TableKind::Digital,
            |k| k.digital_mut().map(|io| &mut io.table),
            edit,
        )
    }

    /// Edit the analog state table of an analog I/O node.
    pub fn edit_analog_states<R>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut AnalogStateTable) -> Result<R, TableError>,
    ) -> ModelResult<R> {
        self.edit_table(
            id,
            TableKind::AnalogStates,
            |k| k.analog_mut().map(|io| &mut io.states),
            edit,
        )
    }

    /// Edit the calibration table of an analog I/O node.
    pub fn edit_calibration<R>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut CalibrationTable) -> Result<R, TableError>,
    ) -> ModelResult<R> {
        self.edit_table(
            id,
            TableKind::Calibration,
            |k| k.analog_mut().map(|io| &mut io.calibration),
            edit,
        )
    }

    /// Edit the row metadata of a device.
    ///
    /// The table's child state spaces always follow the children: spaces set
    /// through this closure that differ from the children's are replaced on
    /// return. Calling `set_child_state_spaces` here resets the metadata of
    /// every row, even when the spaces stay the same.
    pub fn edit_device_table<R>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut DeviceStateTable) -> Result<R, TableError>,
    ) -> ModelResult<R> {
        self.edit_table(
            id,
            TableKind::Device,
            |k| k.device_mut().map(|d| &mut d.table),
            edit,
        )
    }

    pub fn digital_table(&self, id: NodeId) -> ModelResult<&DigitalStateTable> {
        let node = self.node(id)?;
        node.kind.digital().map(DigitalIo::table).ok_or_else(|| {
            missing_table(node.node_type(), TableKind::Digital)
        })
    }

    pub fn analog_state_table(&self, id: NodeId) -> ModelResult<&AnalogStateTable> {
        let node = self.node(id)?;
        node.kind.analog().map(AnalogIo::states).ok_or_else(|| {
            missing_table(node.node_type(), TableKind::AnalogStates)
        })
    }

    pub fn calibration_table(&self, id: NodeId) -> ModelResult<&CalibrationTable> {
        let node = self.node(id)?;
        node.kind.analog().map(AnalogIo::calibration).ok_or_else(|| {
            missing_table(node.node_type(), TableKind::Calibration)
        })
    }

    pub fn device_state_table(&self, id: NodeId) -> ModelResult<&DeviceStateTable> {
        let node = self.node(id)?;
        node.kind.device().map(DeviceAttrs::table).ok_or_else(|| {
            missing_table(node.node_type(), TableKind::Device)
        })
    }

    /// Tabular form of one of a node's tables.
    pub fn export_table(&self, id: NodeId, kind: TableKind) -> ModelResult<TabularArray> {
        Ok(match kind {
            TableKind::Digital => self.digital_table(id)?.save(),
            TableKind::AnalogStates => self.analog_state_table(id)?.save(),
            TableKind::Calibration => self.calibration_table(id)?.save(),
            TableKind::Device => self.device_state_table(id)?.save_rows(),
        })
    }

    /// Replace one of a node's tables from its tabular form.
    ///
    /// The whole array is validated first; on error nothing changes.
    pub fn import_table(&mut self, id: NodeId, kind: TableKind, table: &TabularArray) -> ModelResult<()> {
        let result = match kind {
            TableKind::Digital => self.edit_digital_table(id, |t| t.load(table)),
            TableKind::AnalogStates => self.edit_analog_states(id, |t| t.load(table)),
            TableKind::Calibration => self.edit_calibration(id, |t| t.load(table)),
            TableKind::Device => self.edit_device_table(id, |t| t.load_rows(table)),
        };
        if let Err(e) = &result {
            warn!(node = %id, table = %kind, error = %e, "table import rejected");
        }
        result
    }
}

fn missing_table(node_type: NodeType, kind: TableKind) -> crate::error::ModelError {
    TreeError::NoSuchTable {
        node_type,
        table: kind.attr_key(),
    }
    .into()
}

impl PartialEq for Tree {
    /// Structural equality: same node data in the same shape. Ids, events
    /// and live samples are ignored.
    fn eq(&self, other: &Self) -> bool {
        fn same(a: &Tree, ia: NodeId, b: &Tree, ib: NodeId) -> bool {
            match (a.slot(ia), b.slot(ib)) {
                (Ok(x), Ok(y)) => {
                    x.data == y.data
                        && x.children.len() == y.children.len()
                        && x.children
                            .iter()
                            .zip(&y.children)
                            .all(|(ca, cb)| same(a, *ca, b, *cb))
                }
                _ => false,
            }
        }
        same(self, self.root, other, other.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DEFAULT_DEVICE_STATUS;
    use crate::error::ModelError;
    use crate::runtime::Sample;
    use crate::tables::device::{CellValue, DeviceColumn};

    fn gripper() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let system = tree
            .add_child(tree.root(), NodeData::new(NodeType::System, "Station"))
            .unwrap();
        let device = tree
            .add_child(system, NodeData::new(NodeType::Device, "Gripper"))
            .unwrap();
        let output = tree
            .add_child(device, NodeData::new(NodeType::DigitalOutput, "Output"))
            .unwrap();
        tree.edit_digital_table(output, |t| {
            t.set_row_name(0, "off")?;
            t.set_row_name(1, "on")
        })
        .unwrap();
        tree.take_events();
        (tree, system, device, output)
    }

    fn keys(tree: &Tree, device: NodeId) -> Vec<Vec<String>> {
        tree.device_state_table(device)
            .unwrap()
            .rows()
            .iter()
            .map(|r| r.state_key.clone())
            .collect()
    }

    #[test]
    fn new_tree_has_only_the_root() {
        let tree = Tree::new();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node_type(tree.root()).unwrap(), NodeType::Tool);
        assert_eq!(tree.parent(tree.root()).unwrap(), None);
        assert_eq!(tree.row(tree.root()).unwrap(), None);
    }

    #[test]
    fn disallowed_kinds_are_rejected() {
        let mut tree = Tree::new();
        let err = tree
            .add_child(tree.root(), NodeData::new(NodeType::Device, "D"))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ModelError::Tree(TreeError::KindNotAllowed { .. })
        ));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let (mut tree, system, _, _) = gripper();
        let before = tree.clone();
        for (x, y) in [(f64::NAN, 0.0), (0.0, f64::INFINITY)] {
            let err = tree
                .add_child(system, NodeData::new(NodeType::Device, "Clamp").at(x, y))
                .unwrap_err();
            assert!(matches!(err, ModelError::Attr(AttrError::Invalid { .. })));
        }
        assert!(tree == before);
        assert!(Tree::with_root(NodeData::new(NodeType::Tool, "T").at(f64::NAN, 0.0)).is_err());

        let placed = tree
            .add_child(system, NodeData::new(NodeType::Device, "Clamp").at(-12.5, 40.0))
            .unwrap();
        let reloaded = Tree::from_json_str(&tree.to_json_string(false).unwrap()).unwrap();
        assert!(reloaded == tree);
        assert_eq!(tree.node(placed).unwrap().x, -12.5);
    }

    #[test]
    fn insert_and_remove_positions() {
        let (mut tree, system, device, _) = gripper();
        let first = tree
            .insert_child(system, 0, NodeData::new(NodeType::Device, "Clamp"))
            .unwrap();
        assert_eq!(tree.children(system).unwrap(), &[first, device]);
        assert_eq!(tree.row(device).unwrap(), Some(1));
        assert!(tree
            .insert_child(system, 3, NodeData::new(NodeType::Device, "X"))
            .is_err());
        assert!(tree.remove_child(system, 2).is_err());

        let removed = tree.remove_child(system, 1).unwrap();
        assert_eq!(removed.name, "Gripper");
        assert!(!tree.contains(device));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn sibling_names_are_sanitized_and_unique() {
        let (mut tree, _, device, output) = gripper();
        let limit = tree
            .add_child(device, NodeData::new(NodeType::DigitalInput, "Output"))
            .unwrap();
        assert_eq!(tree.node(limit).unwrap().name, "Output_new");
        assert_eq!(tree.rename(limit, "Lim it!").unwrap(), "Limit");
        assert_eq!(tree.rename(limit, "Output").unwrap(), "Output_new");
        assert_eq!(tree.node(output).unwrap().name, "Output");
    }

    #[test]
    fn system_names_are_free_text() {
        let (mut tree, system, _, _) = gripper();
        assert_eq!(tree.rename(system, "Station #1").unwrap(), "Station #1");
    }

    #[test]
    fn device_follows_children() {
        let (mut tree, _, device, _) = gripper();
        assert_eq!(keys(&tree, device), vec![vec!["off"], vec!["on"]]);

        let limit = tree
            .add_child(device, NodeData::new(NodeType::DigitalInput, "Limit"))
            .unwrap();
        tree.edit_digital_table(limit, |t| {
            t.set_row_name(0, "closed")?;
            t.set_row_name(1, "open")
        })
        .unwrap();
        assert_eq!(
            keys(&tree, device),
            vec![
                vec!["closed", "off"],
                vec!["closed", "on"],
                vec!["open", "off"],
                vec!["open", "on"],
            ]
        );

        tree.remove_child(device, 1).unwrap();
        assert_eq!(keys(&tree, device), vec![vec!["off"], vec!["on"]]);
        tree.remove_child(device, 0).unwrap();
        assert_eq!(keys(&tree, device), vec![Vec::<String>::new()]);
    }

    #[test]
    fn child_rename_rebuilds_and_drops_metadata() {
        let (mut tree, _, device, output) = gripper();
        tree.edit_device_table(device, |t| {
            t.set_cell(1, DeviceColumn::Status, CellValue::Text("gripping".into()))
        })
        .unwrap();
        tree.take_events();
        tree.rename(output, "Valve").unwrap();
        let table = tree.device_state_table(device).unwrap();
        assert_eq!(table.child_state_spaces()[0].child_name, "Valve");
        assert_eq!(table.rows()[1].status, crate::consts::DEFAULT_DEVICE_STATUS);
        let events = tree.take_events();
        assert!(events.contains(&ModelEvent::Table {
            node: device,
            table: TableKind::Device,
            event: TableEvent::ResetBegin,
        }));
    }

    #[test]
    fn unused_state_leaves_the_vocabulary() {
        let (mut tree, _, device, output) = gripper();
        tree.edit_digital_table(output, |t| {
            t.set_bit_count(2)?;
            t.set_row_name(2, "half")?;
            t.set_row_is_used(3, false)
        })
        .unwrap();
        let states = &tree.device_state_table(device).unwrap().child_state_spaces()[0].state_names;
        assert_eq!(states, &vec!["off", "on", "half"]);
    }

    #[test]
    fn table_events_are_forwarded_in_order() {
        let (mut tree, _, _, output) = gripper();
        tree.edit_digital_table(output, |t| t.set_bit_count(2)).unwrap();
        let events: Vec<_> = tree
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, ModelEvent::Table { node, .. } if *node == output))
            .collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            ModelEvent::Table {
                event: TableEvent::ResetBegin,
                ..
            }
        ));
    }

    #[test]
    fn failed_edit_changes_nothing() {
        let (mut tree, _, device, output) = gripper();
        let before = tree.clone();
        assert!(tree.edit_digital_table(output, |t| t.set_bit_count(5)).is_err());
        assert!(tree.edit_analog_states(output, |t| t.set_state_count(2)).is_err());
        assert!(tree
            .edit_device_table(device, |t| t.set_cell(0, DeviceColumn::WarningTimeout, CellValue::Float(1.0)))
            .is_err());
        assert!(tree == before);
    }

    #[test]
    fn failing_step_rolls_back_earlier_steps() {
        let (mut tree, _, device, output) = gripper();
        let before = tree.clone();
        let err = tree
            .edit_digital_table(output, |t| {
                t.set_bit_count(2)?;
                t.set_row_name(2, "mid")?;
                t.set_row_is_used(0, false)
            })
            .unwrap_err();
        assert_eq!(err, ModelError::Table(TableError::PowerOnStateUnused));
        assert!(tree == before);
        assert!(tree.take_events().is_empty());

        let table = tree.digital_table(output).unwrap();
        assert_eq!(table.bit_count(), 1);
        assert_eq!(table.state_names(), vec!["off", "on"]);
        assert_eq!(
            tree.device_state_table(device).unwrap().child_state_spaces()[0].state_names,
            table.state_names()
        );

        // Samples still resolve through the device after the rollback.
        tree.push_sample(output, Sample::Bits(vec![true])).unwrap();
        assert_eq!(tree.read_classified(device).unwrap().state, "on");
    }

    #[test]
    fn attributes_by_key() {
        let (mut tree, _, device, output) = gripper();
        tree.set_attr(output, "hal_pin", AttrValue::Text("gripper.valve".into()))
            .unwrap();
        assert_eq!(
            tree.get_attr(output, "hal_pin").unwrap(),
            AttrValue::Text("gripper.valve".into())
        );
        tree.set_attr(output, "name", AttrValue::Text("Valve 1".into())).unwrap();
        assert_eq!(tree.node(output).unwrap().name, "Valve1");
        assert!(tree.set_attr(output, "unit", AttrValue::Text("bar".into())).is_err());
        assert!(tree.get_attr(device, "hal_pin").is_err());
        assert_eq!(
            tree.attr_keys(output).unwrap(),
            vec!["description", "digital_state_table", "hal_pin", "name", "x", "y"]
        );
    }

    #[test]
    fn device_rows_via_attribute() {
        let (mut tree, _, device, _) = gripper();
        let mut rows = tree.export_table(device, TableKind::Device).unwrap();
        rows[2][1] = "open".into();
        tree.set_attr(device, "device_state_table", AttrValue::from_table(&rows))
            .unwrap();
        assert_eq!(tree.device_state_table(device).unwrap().rows()[1].status, "open");
    }

    #[test]
    fn device_spaces_follow_children_after_edit() {
        let (mut tree, _, device, _) = gripper();
        let spaces = tree.device_state_table(device).unwrap().child_state_spaces().to_vec();
        let set_status = |tree: &mut Tree| {
            tree.edit_device_table(device, |t| {
                t.set_cell(1, DeviceColumn::Status, CellValue::Text("closed".into()))
            })
            .unwrap();
        };

        set_status(&mut tree);
        tree.edit_device_table(device, |t| {
            t.set_child_state_spaces(vec![ChildStateSpace::new("Other", ["a", "b", "c"])])
        })
        .unwrap();
        let table = tree.device_state_table(device).unwrap();
        assert_eq!(table.child_state_spaces(), spaces.as_slice());
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[1].status, DEFAULT_DEVICE_STATUS);

        set_status(&mut tree);
        tree.edit_device_table(device, |t| t.set_child_state_spaces(spaces.clone()))
            .unwrap();
        assert_eq!(
            tree.device_state_table(device).unwrap().rows()[1].status,
            DEFAULT_DEVICE_STATUS
        );
    }

    #[test]
    fn paths() {
        let (tree, system, device, output) = gripper();
        assert_eq!(tree.path_of(output).unwrap(), "Station/Gripper/Output");
        assert_eq!(tree.path_of(tree.root()).unwrap(), "");
        assert_eq!(tree.find_by_path("Station/Gripper").unwrap(), device);
        assert_eq!(tree.find_by_path("/Station/").unwrap(), system);
        assert_eq!(tree.find_by_path("").unwrap(), tree.root());
        assert!(tree.find_by_path("Station/Clamp").is_err());
    }

    #[test]
    fn removed_ids_stay_invalid() {
        let (mut tree, system, device, output) = gripper();
        tree.remove_child(system, 0).unwrap();
        let again = tree
            .add_child(system, NodeData::new(NodeType::Device, "Gripper"))
            .unwrap();
        assert_ne!(again, device);
        assert!(tree.node(output).is_err());
        assert!(tree.rename(device, "X").is_err());
    }
}
