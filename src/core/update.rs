//! State-update protocol.
//!
//! Messages address nodes by name and carry the node's mutable state only:
//! `{"liquids": [[name, volume], ...]}` for containers and `{"tip": ...}` for
//! tip spots.  An update never touches geometry or structure.  A batch is
//! applied entry by entry; a rejected entry leaves its node untouched and
//! does not stop the others.

use serde_json::{Map, Value};

use super::container::Liquid;
use super::error::{UpdateError, VolumeError};
use super::tree::{NodeId, ResourceTree};

/// Outcome of applying a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Nodes whose state changed, in batch order.
    pub applied: Vec<NodeId>,
    pub rejected: Vec<UpdateError>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Apply one state payload to the node called `name`.
pub fn apply_state(tree: &mut ResourceTree, name: &str, state: &Value) -> Result<NodeId, UpdateError> {
    let id = tree
        .find(name)
        .ok_or_else(|| UpdateError::NotFound(name.to_string()))?;
    let node = tree
        .get_mut(id)
        .ok_or_else(|| UpdateError::NotFound(name.to_string()))?;

    if let Some(container) = node.kind.container_mut() {
        let raw = state.get("liquids").ok_or_else(|| malformed(name, "missing `liquids`"))?;
        let liquids: Vec<Liquid> =
            serde_json::from_value(raw.clone()).map_err(|e| malformed(name, &e.to_string()))?;
        container.set_liquids(liquids).map_err(|source| UpdateError::Volume {
            name: name.to_string(),
            source,
        })?;
        return Ok(id);
    }

    if let Some(tip) = node.kind.tip_state_mut() {
        let raw = state.get("tip").ok_or_else(|| malformed(name, "missing `tip`"))?;
        tip.set_tip(raw.clone());
        return Ok(id);
    }

    Err(UpdateError::NotStateful(name.to_string()))
}

/// Apply every `name → state` entry of `batch`.
pub fn apply_batch(tree: &mut ResourceTree, batch: &Map<String, Value>) -> BatchReport {
    let mut report = BatchReport::default();
    for (name, state) in batch {
        match apply_state(tree, name, state) {
            Ok(id) => report.applied.push(id),
            Err(err) => {
                tracing::warn!("state update rejected: {err}");
                report.rejected.push(err);
            }
        }
    }
    report
}

/// Remove `volume` from the named container, top layer first.
pub fn aspirate(tree: &mut ResourceTree, name: &str, volume: f64) -> Result<NodeId, UpdateError> {
    with_container(tree, name, |c| c.aspirate(volume))
}

/// Add a layer of liquid to the named container.
pub fn dispense(tree: &mut ResourceTree, name: &str, liquid: Liquid) -> Result<NodeId, UpdateError> {
    with_container(tree, name, |c| c.dispense(liquid))
}

fn with_container(
    tree: &mut ResourceTree,
    name: &str,
    op: impl FnOnce(&mut super::container::ContainerState) -> Result<(), VolumeError>,
) -> Result<NodeId, UpdateError> {
    let id = tree
        .find(name)
        .ok_or_else(|| UpdateError::NotFound(name.to_string()))?;
    let container = tree
        .get_mut(id)
        .and_then(|n| n.kind.container_mut())
        .ok_or_else(|| UpdateError::Volume {
            name: name.to_string(),
            source: VolumeError::NotAContainer(name.to_string()),
        })?;
    op(container).map_err(|source| UpdateError::Volume {
        name: name.to_string(),
        source,
    })?;
    Ok(id)
}

fn malformed(name: &str, reason: &str) -> UpdateError {
    UpdateError::Malformed {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serialize::load_json;
    use serde_json::json;

    fn tree() -> ResourceTree {
        let mut t = ResourceTree::new();
        load_json(
            &mut t,
            &json!({
                "name": "rack", "type": "TipRack", "num_items_x": 1, "num_items_y": 1,
                "size_x": 120, "size_y": 80,
                "children": [
                    {"name": "rack_tipspot_0_0", "type": "TipSpot", "size_x": 9, "size_y": 9,
                     "prototype_tip": {"type": "HamiltonTip", "total_tip_length": 59.9}},
                    {"name": "res", "type": "Trough", "max_volume": 1000.0}
                ]
            })
            .to_string(),
        )
        .unwrap();
        t
    }

    #[test]
    fn batch_applies_good_entries_and_reports_bad_ones() {
        let mut t = tree();
        let batch = json!({
            "res": {"liquids": [["water", 500.0], [null, 20.0]]},
            "ghost": {"liquids": []},
            "rack": {"liquids": []},
            "rack_tipspot_0_0": {"tip": {"type": "HamiltonTip"}}
        });
        let report = apply_batch(&mut t, batch.as_object().unwrap());
        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected.contains(&UpdateError::NotFound("ghost".into())));
        assert!(report.rejected.contains(&UpdateError::NotStateful("rack".into())));

        let res = t.get(t.find("res").unwrap()).unwrap();
        assert_eq!(res.kind.container().unwrap().volume(), 520.0);
        let spot = t.get(t.find("rack_tipspot_0_0").unwrap()).unwrap();
        assert!(spot.kind.tip_state().unwrap().has_tip);
    }

    #[test]
    fn overflow_is_rejected_without_change() {
        let mut t = tree();
        apply_state(&mut t, "res", &json!({"liquids": [["water", 10.0]]})).unwrap();
        let err = apply_state(&mut t, "res", &json!({"liquids": [["water", 1001.0]]})).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Volume {
                source: VolumeError::CapacityExceeded { .. },
                ..
            }
        ));
        let res = t.get(t.find("res").unwrap()).unwrap();
        assert_eq!(res.kind.container().unwrap().volume(), 10.0);
    }

    #[test]
    fn malformed_payloads() {
        let mut t = tree();
        assert!(matches!(
            apply_state(&mut t, "res", &json!({"volume": 3})),
            Err(UpdateError::Malformed { .. })
        ));
        assert!(matches!(
            apply_state(&mut t, "res", &json!({"liquids": "lots"})),
            Err(UpdateError::Malformed { .. })
        ));
        assert!(matches!(
            apply_state(&mut t, "rack_tipspot_0_0", &json!({})),
            Err(UpdateError::Malformed { .. })
        ));
    }

    #[test]
    fn aspirate_and_dispense_by_name() {
        let mut t = tree();
        dispense(&mut t, "res", Liquid::new("A", 50.0)).unwrap();
        dispense(&mut t, "res", Liquid::new("B", 30.0)).unwrap();
        aspirate(&mut t, "res", 60.0).unwrap();
        let res = t.get(t.find("res").unwrap()).unwrap();
        assert_eq!(res.kind.container().unwrap().liquids(), &[Liquid::new("A", 20.0)]);

        assert!(matches!(
            aspirate(&mut t, "res", 21.0),
            Err(UpdateError::Volume {
                source: VolumeError::InsufficientVolume { .. },
                ..
            })
        ));
        assert!(matches!(
            aspirate(&mut t, "rack", 1.0),
            Err(UpdateError::Volume {
                source: VolumeError::NotAContainer(_),
                ..
            })
        ));
        assert_eq!(aspirate(&mut t, "nope", 1.0), Err(UpdateError::NotFound("nope".into())));
    }
}
