//! Tree persistence and structure tests.
//!
//! Builds a tool with every node kind, customizes each table kind, and
//! checks the JSON shape, lossless reload and sibling naming.

use evo_tool::consts::DEFAULT_DEVICE_STATUS;
use evo_tool::prelude::*;
use serde_json::{Value, json};

struct Press {
    tree: Tree,
    station: NodeId,
    clamp: NodeId,
    valve: NodeId,
    force: NodeId,
}

fn press() -> Press {
    let mut tree = Tree::new();
    let root = tree.root();
    tree.set_attr(root, "background_image", AttrValue::Text("press.png".into()))
        .unwrap();
    let cell = tree
        .add_child(root, NodeData::new(NodeType::System, "Cell"))
        .unwrap();
    let station = tree
        .add_child(cell, NodeData::new(NodeType::System, "Station").with_description("left"))
        .unwrap();
    let clamp = tree
        .add_child(station, NodeData::new(NodeType::Device, "Clamp").at(10.0, 20.0))
        .unwrap();

    let valve = tree
        .add_child(clamp, NodeData::new(NodeType::DigitalOutput, "Valve"))
        .unwrap();
    tree.set_attr(valve, "hal_pin", AttrValue::Text("clamp.valve".into()))
        .unwrap();
    tree.edit_digital_table(valve, |t| {
        t.set_bit_count(2)?;
        t.set_row_name(0, "idle")?;
        t.set_row_name(1, "close")?;
        t.set_row_name(2, "open")?;
        t.set_row_is_used(3, false)
    })
    .unwrap();

    let force = tree
        .add_child(clamp, NodeData::new(NodeType::AnalogInput, "Force"))
        .unwrap();
    tree.set_attr(force, "unit", AttrValue::Text("kN".into())).unwrap();
    tree.set_attr(force, "decimals", AttrValue::Int(1)).unwrap();
    tree.set_attr(force, "calibration_type", AttrValue::Text("table".into()))
        .unwrap();
    tree.edit_calibration(force, |t| {
        t.load(&vec![
            vec![json!("hal_value"), json!("gui_value")],
            vec![json!(0.0), json!(0.0)],
            vec![json!(10.0), json!(50.0)],
            vec![json!(20.0), json!(80.0)],
        ])
    })
    .unwrap();
    tree.edit_analog_states(force, |t| {
        t.set_state_count(2)?;
        t.set_row_name(0, "free")?;
        t.set_row_name(1, "gripping")?;
        t.set_threshold(1, 25.0)
    })
    .unwrap();

    tree.edit_device_table(clamp, |t| {
        t.set_cell(1, DeviceColumn::Status, CellValue::Text("closing".into()))?;
        t.set_cell(1, DeviceColumn::IsWarning, CellValue::Bool(true))?;
        t.set_cell(1, DeviceColumn::WarningTimeout, CellValue::Float(3.0))?;
        t.set_cell(5, DeviceColumn::TriggersAction, CellValue::Bool(true))?;
        t.set_cell(5, DeviceColumn::Action, CellValue::Action(Some("7".into())))
    })
    .unwrap();

    let aux = tree
        .add_child(station, NodeData::new(NodeType::Device, "Aux"))
        .unwrap();
    tree.add_child(aux, NodeData::new(NodeType::DigitalInput, "Present"))
        .unwrap();
    tree.add_child(aux, NodeData::new(NodeType::AnalogOutput, "Speed"))
        .unwrap();

    Press {
        tree,
        station,
        clamp,
        valve,
        force,
    }
}

fn sorted_keys(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    let keys: Vec<_> = map.keys().collect();
    keys.windows(2).all(|w| w[0] < w[1])
        && map["children"]
            .as_array()
            .is_some_and(|c| c.iter().all(sorted_keys))
}

#[test]
fn test_every_node_object_has_sorted_keys() {
    let p = press();
    let value = p.tree.serialize_tree();
    assert!(sorted_keys(&value));
    assert_eq!(value["type_info"], "ToolNode");
    assert_eq!(value["background_image"], "press.png");

    let clamp = &value["children"][0]["children"][0]["children"][0];
    assert_eq!(clamp["type_info"], "DeviceNode");
    assert_eq!(clamp["x"], 10.0);
    let valve = &clamp["children"][0];
    assert_eq!(valve["type_info"], "DigitalOutputNode");
    assert_eq!(valve["hal_pin"], "clamp.valve");
    assert!(valve["digital_state_table"].is_string());
}

#[test]
fn test_reload_equals_original() {
    let p = press();
    for pretty in [true, false] {
        let text = p.tree.to_json_string(pretty).unwrap();
        let loaded = Tree::from_json_str(&text).unwrap();
        assert!(loaded == p.tree);
        assert_eq!(loaded.to_json_string(pretty).unwrap(), text);
    }
}

#[test]
fn test_reload_keeps_device_metadata() {
    let p = press();
    let loaded = Tree::from_json_str(&p.tree.to_json_string(false).unwrap()).unwrap();
    let clamp = loaded.find_by_path("Cell/Station/Clamp").unwrap();
    let table = loaded.device_state_table(clamp).unwrap();
    assert_eq!(table.rows().len(), 6);
    assert_eq!(table.rows()[1].status, "closing");
    assert!(table.rows()[1].is_warning);
    assert_eq!(table.rows()[1].warning_timeout, 3.0);
    assert_eq!(table.rows()[5].action.as_deref(), Some("7"));
    assert_eq!(
        table.rows()[5].state_key,
        vec!["gripping".to_string(), "open".to_string()]
    );
}

#[test]
fn test_reload_keeps_analog_settings() {
    let p = press();
    let loaded = Tree::from_json_str(&p.tree.to_json_string(true).unwrap()).unwrap();
    let force = loaded.find_by_path("Cell/Station/Clamp/Force").unwrap();
    assert_eq!(loaded.get_attr(force, "unit").unwrap(), AttrValue::Text("kN".into()));
    assert_eq!(loaded.get_attr(force, "decimals").unwrap(), AttrValue::Int(1));
    assert_eq!(loaded.calibration_table(force).unwrap().len(), 3);
    assert_eq!(loaded.analog_state_table(force).unwrap().rows()[1].greater_than, Some(25.0));
}

#[test]
fn test_malformed_documents_are_rejected() {
    assert!(Tree::from_json_str("not json").is_err());
    assert!(Tree::load_tree(&json!([])).is_err());
    assert!(Tree::load_tree(&json!({"type_info": "SystemNode", "children": []})).is_err());

    let mut value = press().tree.serialize_tree();
    value["children"][0]["children"][0]["children"][0]["color"] = json!("red");
    assert!(matches!(
        Tree::load_tree(&value),
        Err(ModelError::Attr(AttrError::UnknownKey { .. }))
    ));
}

#[test]
fn test_device_table_with_wrong_row_count_fails_load() {
    let mut value = press().tree.serialize_tree();
    let clamp = &mut value["children"][0]["children"][0]["children"][0];
    let text = clamp["device_state_table"].as_str().unwrap().to_string();
    let mut rows: Vec<Value> = serde_json::from_str(&text).unwrap();
    rows.pop();
    clamp["device_state_table"] = json!(Value::Array(rows).to_string());
    assert!(Tree::load_tree(&value).is_err());
}

#[test]
fn test_sibling_rename_appends_suffix() {
    let mut p = press();
    let name = p.tree.rename(p.force, "Valve").unwrap();
    assert_eq!(name, "Valve_new");

    let extra = p
        .tree
        .add_child(p.clamp, NodeData::new(NodeType::DigitalInput, "Valve"))
        .unwrap();
    assert_eq!(p.tree.node(extra).unwrap().name, "Valve_new_new");

    let names: Vec<_> = p
        .tree
        .children(p.clamp)
        .unwrap()
        .iter()
        .map(|c| p.tree.node(*c).unwrap().name.clone())
        .collect();
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn test_rename_reaches_device_header() {
    let mut p = press();
    p.tree.rename(p.valve, "Jaw valve").unwrap();
    let header = p.tree.device_state_table(p.clamp).unwrap().display_header();
    assert_eq!(header[..2], ["Force".to_string(), "Jawvalve".to_string()]);
}

#[test]
fn test_systems_keep_duplicate_names() {
    let mut p = press();
    let cell = p.tree.parent(p.station).unwrap().unwrap();
    let twin = p
        .tree
        .add_child(cell, NodeData::new(NodeType::System, "Station"))
        .unwrap();
    assert_eq!(p.tree.node(twin).unwrap().name, "Station");
}

#[test]
fn test_removing_child_rebuilds_device() {
    let mut p = press();
    assert_eq!(p.tree.device_state_table(p.clamp).unwrap().rows().len(), 6);
    p.tree.remove_child(p.clamp, 1).unwrap();
    assert!(!p.tree.contains(p.force));
    let table = p.tree.device_state_table(p.clamp).unwrap();
    assert_eq!(table.rows().len(), 3);
    assert_eq!(table.rows()[1].status, DEFAULT_DEVICE_STATUS);
}
