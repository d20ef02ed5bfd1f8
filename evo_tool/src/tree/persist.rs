//! JSON persistence of the tree.
//!
//! A node is an object with `type_info`, `children` and one key per
//! declared attribute. Table attributes carry their tabular array as JSON
//! text. Keys come out sorted because `serde_json::Map` is ordered.

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{NodeData, NodeId, NodeType, Slot, Tree};
use crate::attr::AttrValue;
use crate::error::{AttrError, ModelResult, TreeError};

const TYPE_INFO: &str = "type_info";
const CHILDREN: &str = "children";

fn malformed(path: &str, reason: impl Into<String>) -> TreeError {
    TreeError::Malformed {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        reason: reason.into(),
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, TreeError> {
    value
        .as_object()
        .ok_or_else(|| malformed(path, "expected a node object"))
}

fn node_type_of(obj: &Map<String, Value>, path: &str) -> Result<NodeType, TreeError> {
    let tag = obj
        .get(TYPE_INFO)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(path, "missing type_info"))?;
    NodeType::from_type_info(tag).ok_or_else(|| TreeError::UnknownTypeInfo(tag.to_string()))
}

impl Tree {
    fn slot_value(&self, slot: &Slot) -> Value {
        let mut obj = Map::new();
        obj.insert(TYPE_INFO.into(), slot.data.node_type().type_info().into());
        let children = slot
            .children
            .iter()
            .filter_map(|c| self.slot(*c).ok())
            .map(|s| self.slot_value(s))
            .collect();
        obj.insert(CHILDREN.into(), Value::Array(children));
        for (key, _) in slot.data.attr_types() {
            if let Some(value) = slot.data.attr(key) {
                obj.insert(key.into(), value.to_json());
            }
        }
        Value::Object(obj)
    }

    /// JSON object of `id` and its subtree.
    pub fn serialize_node(&self, id: NodeId) -> ModelResult<Value> {
        Ok(self.slot_value(self.slot(id)?))
    }

    /// JSON object of the whole tree.
    pub fn serialize_tree(&self) -> Value {
        self.slot(self.root)
            .map(|s| self.slot_value(s))
            .unwrap_or(Value::Null)
    }

    /// Serialized tree as text.
    pub fn to_json_string(&self, pretty: bool) -> ModelResult<String> {
        let value = self.serialize_tree();
        let text = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        info!(nodes = self.len(), bytes = text.len(), "tree serialized");
        Ok(text)
    }

    /// Build a tree from its JSON object.
    ///
    /// Loading is two-phase per node: own attributes first, then each child
    /// is created from its `type_info`, appended and loaded. A device's
    /// stored rows are applied once its children exist. The first error
    /// aborts the load and the partial tree is dropped.
    pub fn load_tree(value: &Value) -> ModelResult<Self> {
        let result = Self::load_root(value);
        match &result {
            Ok(tree) => info!(nodes = tree.len(), "tree loaded"),
            Err(e) => warn!(error = %e, "tree load rejected"),
        }
        result
    }

    /// Parse and load a tree from JSON text.
    pub fn from_json_str(text: &str) -> ModelResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::load_tree(&value)
    }

    fn load_root(value: &Value) -> ModelResult<Self> {
        let obj = as_object(value, "")?;
        let node_type = node_type_of(obj, "")?;
        if node_type != NodeType::Tool {
            return Err(malformed(
                "",
                format!("root is {node_type}, expected {}", NodeType::Tool),
            )
            .into());
        }
        let mut tree = Self::new();
        let root = tree.root;
        tree.load_node(root, obj, "")?;
        tree.events.clear();
        Ok(tree)
    }

    fn load_node(&mut self, id: NodeId, obj: &Map<String, Value>, path: &str) -> ModelResult<()> {
        let data = self.node(id)?;
        let node_type = data.node_type();
        let declared = data.attr_types();

        for (key, value) in obj {
            if key == TYPE_INFO || key == CHILDREN {
                continue;
            }
            let Some(&(key, ty)) = declared.iter().find(|(k, _)| *k == key.as_str()) else {
                return Err(AttrError::UnknownKey {
                    key: key.clone(),
                    node_type,
                }
                .into());
            };
            let value = AttrValue::from_json(key, ty, value)?;
            self.assign_attr(id, key, value, false)?;
        }

        let children = match obj.get(CHILDREN) {
            None => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => return Err(malformed(path, "children is not an array").into()),
        };
        for (i, child) in children.iter().enumerate() {
            let child_path = format!("{path}/{CHILDREN}/{i}");
            let child_obj = as_object(child, &child_path)?;
            let child_type = node_type_of(child_obj, &child_path)?;
            let child_id = self.add_child(id, NodeData::new(child_type, child_type.default_name()))?;
            self.load_node(child_id, child_obj, &child_path)?;
        }

        if node_type == NodeType::Device {
            self.apply_pending_rows(id)?;
        }
        Ok(())
    }
}
