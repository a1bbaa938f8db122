//! JSON hardware descriptions: loading into a [`ResourceTree`], full export,
//! and the lightweight state-only export.
//!
//! Loading is all-or-nothing.  The description is first materialized into a
//! detached node tree and checked for name collisions; only then is anything
//! inserted.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::{Map, Value};

use super::deck::{DeckKind, OT_DECK_LOCATION};
use super::error::LoadError;
use super::geometry::{Coordinate, Size};
use super::kind::ResourceKind;
use super::tree::{NodeId, ResourceNode, ResourceTree};

// ───────────────────────────────────────── description ───────

/// One node of a hardware description, as sent by the protocol side.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDescription {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub type_tag: String,
    #[serde(default)]
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub size_x: f64,
    #[serde(default)]
    pub size_y: f64,
    #[serde(default)]
    pub size_z: f64,
    #[serde(default)]
    pub children: Vec<ResourceDescription>,
    #[serde(default)]
    pub parent_name: Option<String>,
    /// Everything else: type-specific fields and unknown extras.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn default_type() -> String {
    "Resource".to_string()
}

/// A materialized node that has not been inserted yet.
struct Pending {
    node: ResourceNode,
    children: Vec<Pending>,
}

fn materialize(desc: ResourceDescription) -> Result<Pending, LoadError> {
    let ResourceDescription {
        name,
        type_tag,
        location,
        size_x,
        size_y,
        size_z,
        children,
        parent_name: _,
        mut fields,
    } = desc;

    let kind = ResourceKind::from_fields(&type_tag, &name, &mut fields)?;
    let location = if matches!(kind, ResourceKind::Deck(DeckKind::Ot)) {
        OT_DECK_LOCATION
    } else {
        location.unwrap_or(Coordinate::ZERO)
    };

    let mut node = ResourceNode::new(name, kind, location, Size::new(size_x, size_y, size_z));
    node.extra = fields;

    let children = children
        .into_iter()
        .map(materialize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pending { node, children })
}

fn check_names(pending: &Pending, tree: &ResourceTree, seen: &mut HashSet<String>) -> Result<(), LoadError> {
    let name = &pending.node.name;
    if tree.find(name).is_some() || !seen.insert(name.clone()) {
        return Err(LoadError::DuplicateName(name.clone()));
    }
    pending
        .children
        .iter()
        .try_for_each(|child| check_names(child, tree, seen))
}

fn insert_pending(tree: &mut ResourceTree, pending: Pending, parent: Option<NodeId>) -> Result<NodeId, LoadError> {
    let Pending { node, children } = pending;
    let id = tree.insert(node, parent)?;
    for child in children {
        insert_pending(tree, child, Some(id))?;
    }
    Ok(id)
}

// ───────────────────────────────────────── load ──────────────

/// Materialize `desc` and attach it to the tree.
///
/// A description whose `parent_name` is registered is attached below that
/// parent.  A description without a parent becomes the root; so does one
/// whose parent is unknown while the tree is still empty.
pub fn load(tree: &mut ResourceTree, desc: ResourceDescription) -> Result<NodeId, LoadError> {
    let parent = match desc.parent_name.as_deref() {
        Some(parent_name) => match tree.find(parent_name) {
            Some(pid) => Some(pid),
            None if tree.root().is_none() => {
                tracing::warn!("parent {parent_name} of {} is not loaded; using it as root", desc.name);
                None
            }
            None => return Err(LoadError::ParentNotFound(parent_name.to_string())),
        },
        None => None,
    };
    if parent.is_none() {
        if let Some(root) = tree.root() {
            return Err(LoadError::RootExists(tree.name_of(root).to_string()));
        }
    }

    let pending = materialize(desc)?;
    check_names(&pending, tree, &mut HashSet::new())?;
    let id = insert_pending(tree, pending, parent)?;
    tracing::info!("loaded {} ({} resources registered)", tree.name_of(id), tree.len());
    Ok(id)
}

/// Parse and load a JSON document.
pub fn load_json(tree: &mut ResourceTree, json: &str) -> Result<NodeId, LoadError> {
    let desc: ResourceDescription = serde_json::from_str(json)?;
    load(tree, desc)
}

// ───────────────────────────────────────── export ────────────

/// Full description of `id` and its subtree.
pub fn export(tree: &ResourceTree, id: NodeId) -> Option<Value> {
    let node = tree.get(id)?;
    let mut out = Map::new();
    out.insert("name".into(), Value::from(node.name.clone()));
    out.insert("type".into(), Value::from(node.kind.type_name()));
    out.insert("location".into(), location_value(node.location));
    out.insert("size_x".into(), Value::from(node.size.x));
    out.insert("size_y".into(), Value::from(node.size.y));
    out.insert("size_z".into(), Value::from(node.size.z));
    out.insert(
        "parent_name".into(),
        node.parent
            .and_then(|p| tree.get(p))
            .map_or(Value::Null, |p| Value::from(p.name.clone())),
    );
    node.kind.write_fields(&mut out);
    for (key, value) in &node.extra {
        out.entry(key.clone()).or_insert_with(|| value.clone());
    }

    let children = node
        .children
        .iter()
        .filter_map(|&child| export(tree, child))
        .collect();
    out.insert("children".into(), Value::Array(children));
    Some(Value::Object(out))
}

fn location_value(loc: Coordinate) -> Value {
    let mut m = Map::new();
    m.insert("x".into(), Value::from(loc.x));
    m.insert("y".into(), Value::from(loc.y));
    m.insert("z".into(), Value::from(loc.z));
    m.insert("type".into(), Value::from("Coordinate"));
    Value::Object(m)
}

/// Mutable state of one node: liquids for containers, tip for tip spots.
pub fn serialize_state(node: &ResourceNode) -> Option<Value> {
    if let Some(container) = node.kind.container() {
        let liquids = serde_json::to_value(container.liquids()).unwrap_or(Value::Null);
        let mut m = Map::new();
        m.insert("liquids".into(), liquids.clone());
        m.insert("pending_liquids".into(), liquids);
        return Some(Value::Object(m));
    }
    if let Some(tip) = node.kind.tip_state() {
        let value = if tip.has_tip {
            tip.prototype_tip.clone()
        } else {
            Value::Null
        };
        let mut m = Map::new();
        m.insert("tip".into(), value.clone());
        m.insert("pending_tip".into(), value);
        return Some(Value::Object(m));
    }
    None
}

/// State of every stateful node, keyed by name.
pub fn export_state(tree: &ResourceTree) -> BTreeMap<String, Value> {
    tree.iter()
        .filter_map(|(_, node)| serialize_state(node).map(|s| (node.name.clone(), s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plate_json() -> Value {
        json!({
            "name": "plate",
            "type": "Plate",
            "location": {"x": 1.0, "y": 2.0, "z": 3.0, "type": "Coordinate"},
            "size_x": 127.0, "size_y": 86.0, "size_z": 14.0,
            "parent_name": null,
            "num_items_x": 1, "num_items_y": 2,
            "model": "Cor_96_wellplate_360ul_Fb",
            "children": [
                {"name": "plate_well_0_0", "type": "Well", "location": {"x": 10, "y": 40, "z": 1},
                 "size_x": 6.9, "size_y": 6.9, "size_z": 10.0, "max_volume": 360.0,
                 "cross_section_type": "circle", "parent_name": "plate", "children": []},
                {"name": "plate_well_0_1", "type": "Well", "location": {"x": 10, "y": 31, "z": 1},
                 "size_x": 6.9, "size_y": 6.9, "size_z": 10.0, "max_volume": 360.0,
                 "liquids": [["water", 100.0]],
                 "parent_name": "plate", "children": []}
            ]
        })
    }

    #[test]
    fn export_reload_export_is_stable() {
        let mut t = ResourceTree::new();
        let root = load_json(&mut t, &plate_json().to_string()).unwrap();
        let first = export(&t, root).unwrap();

        let mut again = ResourceTree::new();
        let root2 = load_json(&mut again, &first.to_string()).unwrap();
        assert_eq!(export(&again, root2).unwrap(), first);
        assert_eq!(first["model"], "Cor_96_wellplate_360ul_Fb");
        assert_eq!(first["children"][0]["cross_section_type"], "circle");
        assert_eq!(first["children"][1]["parent_name"], "plate");
        assert_eq!(first["location"]["type"], "Coordinate");
    }

    #[test]
    fn liquids_travel_in_state_not_layout() {
        let mut t = ResourceTree::new();
        let root = load_json(&mut t, &plate_json().to_string()).unwrap();
        let layout = export(&t, root).unwrap();
        assert!(layout["children"][1].get("liquids").is_none());

        let state = export_state(&t);
        assert_eq!(state.len(), 2);
        assert_eq!(state["plate_well_0_1"]["liquids"], json!([["water", 100.0]]));
        assert_eq!(state["plate_well_0_0"]["pending_liquids"], json!([]));
    }

    #[test]
    fn duplicate_names_reject_whole_load() {
        let mut doc = plate_json();
        doc["children"][1]["name"] = json!("plate_well_0_0");
        let mut t = ResourceTree::new();
        let err = load_json(&mut t, &doc.to_string()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateName(n) if n == "plate_well_0_0"));
        assert!(t.is_empty());
        assert!(t.root().is_none());
    }

    #[test]
    fn subtree_attaches_to_named_parent() {
        let mut t = ResourceTree::new();
        load_json(&mut t, r#"{"name": "deck", "type": "Deck", "size_x": 500, "size_y": 400}"#).unwrap();
        let mut doc = plate_json();
        doc["parent_name"] = json!("deck");
        let plate = load_json(&mut t, &doc.to_string()).unwrap();
        assert_eq!(t.get(plate).unwrap().parent, t.find("deck"));
        assert_eq!(t.len(), 4);

        let orphan = r#"{"name": "x", "parent_name": "nowhere"}"#;
        assert!(matches!(load_json(&mut t, orphan), Err(LoadError::ParentNotFound(_))));
        let second_root = r#"{"name": "y"}"#;
        assert!(matches!(load_json(&mut t, second_root), Err(LoadError::RootExists(_))));
    }

    #[test]
    fn ot_deck_location_is_fixed() {
        let mut t = ResourceTree::new();
        let deck = load_json(
            &mut t,
            r#"{"name": "deck", "type": "OTDeck", "location": {"x": 0, "y": 0, "z": 0}, "size_x": 624.3, "size_y": 565.2}"#,
        )
        .unwrap();
        assert_eq!(t.absolute_location(deck), Some(OT_DECK_LOCATION));
    }

    #[test]
    fn overfull_container_is_a_load_error() {
        let doc = r#"{"name": "w", "type": "Well", "max_volume": 10, "liquids": [["a", 11]]}"#;
        let mut t = ResourceTree::new();
        assert!(matches!(load_json(&mut t, doc), Err(LoadError::Volume { .. })));
    }
}
