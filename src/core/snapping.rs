//! Placement assistance while dragging a resource.
//!
//! Two independent queries:
//!
//! * [`snap_target`] finds the docking target under a point: the trash, a
//!   compatible carrier site, or an OT deck slot.
//! * [`snapping_grid`] proposes guide lines for free placement on rail decks.
//!   The x and y axes are resolved independently; when several candidates lie
//!   within the margin the nearest one wins.

use serde::Serialize;

use super::deck::{self, ot_slot_rects, RAIL_AREA_HEIGHT, RAIL_AREA_Y};
use super::geometry::{Coordinate, Rect};
use super::kind::{CarrierKind, ResourceKind};
use super::tree::{NodeId, ResourceNode, ResourceTree};

/// Default tolerance for guide lines, in deck millimetres.
pub const SNAP_MARGIN: f64 = 5.0;

/// Where a dragged resource would land.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapTarget {
    /// The resource to become the new parent (or the trash).
    pub target: NodeId,
    pub kind: SnapKind,
    /// Location the dragged resource adopts relative to `target`.
    pub location: Coordinate,
    /// Area to highlight, absolute.
    pub highlight: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    Trash,
    CarrierSite,
    DeckSlot,
}

/// Guide-line proposal.  `resource_*` is where the dragged resource should
/// go, `snapping_*` is where the guide line is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SnapLines {
    pub resource_x: Option<f64>,
    pub resource_y: Option<f64>,
    pub snapping_x: Option<f64>,
    pub snapping_y: Option<f64>,
}

impl SnapLines {
    pub fn is_empty(&self) -> bool {
        self.resource_x.is_none() && self.resource_y.is_none()
    }
}

/// The deck everything snaps against: the first deck in pre-order.
pub fn find_deck(tree: &ResourceTree) -> Option<NodeId> {
    tree.find_first(|n| n.kind.is_deck())
}

fn can_dock(dragged: &ResourceNode, carrier: &ResourceNode) -> bool {
    matches!(
        (&dragged.kind, &carrier.kind),
        (ResourceKind::Plate(_), ResourceKind::Carrier(CarrierKind::Plate))
            | (ResourceKind::TipRack(_), ResourceKind::Carrier(CarrierKind::Tip))
    )
}

/// Docking target containing `(x, y)` for `dragged`, if any.
pub fn snap_target(tree: &ResourceTree, dragged: NodeId, x: f64, y: f64, enabled: bool) -> Option<SnapTarget> {
    if !enabled {
        return None;
    }
    let dragged_node = tree.get(dragged)?;

    if let Some(trash) = tree.find_first(|n| matches!(n.kind, ResourceKind::Trash)) {
        let rect = tree.absolute_rect(trash)?;
        if rect.contains_strict(x, y) {
            return Some(SnapTarget {
                target: trash,
                kind: SnapKind::Trash,
                location: Coordinate::ZERO,
                highlight: rect,
            });
        }
    }

    let deck_id = find_deck(tree)?;
    let deck_node = tree.get(deck_id)?;

    for &carrier_id in &deck_node.children {
        let Some(carrier) = tree.get(carrier_id) else {
            continue;
        };
        if !can_dock(dragged_node, carrier) {
            continue;
        }
        for &site in &carrier.children {
            if site == dragged {
                continue;
            }
            let Some(rect) = tree.absolute_rect(site) else {
                continue;
            };
            if rect.contains_strict(x, y) {
                return Some(SnapTarget {
                    target: site,
                    kind: SnapKind::CarrierSite,
                    location: Coordinate::ZERO,
                    highlight: rect,
                });
            }
        }
    }

    if matches!(deck_node.kind, ResourceKind::Deck(deck::DeckKind::Ot)) {
        let origin = tree.absolute_location(deck_id)?;
        for (slot, rect) in ot_slot_rects(origin) {
            if rect.contains_strict(x, y) {
                return Some(SnapTarget {
                    target: deck_id,
                    kind: SnapKind::DeckSlot,
                    location: slot,
                    highlight: rect,
                });
            }
        }
    }

    None
}

/// Nearest-candidate tracker for one axis.
struct AxisSnap {
    margin: f64,
    best: Option<(f64, f64, Option<f64>)>,
}

impl AxisSnap {
    fn new(margin: f64) -> Self {
        Self { margin, best: None }
    }

    /// Offer a candidate: `distance` from the dragged edge, the resource
    /// position it implies, and an explicit guide line when it differs.
    fn offer(&mut self, distance: f64, position: f64, line: Option<f64>) {
        let distance = distance.abs();
        if distance >= self.margin {
            return;
        }
        if self.best.map_or(true, |(d, _, _)| distance < d) {
            self.best = Some((distance, position, line));
        }
    }

    fn resolve(self) -> (Option<f64>, Option<f64>) {
        match self.best {
            Some((_, position, line)) => (Some(position), Some(line.unwrap_or(position))),
            None => (None, None),
        }
    }
}

/// Guide lines for a resource whose lower-left corner is at `(x, y)`.
pub fn snapping_grid(
    tree: &ResourceTree,
    x: f64,
    y: f64,
    _width: f64,
    height: f64,
    margin: f64,
    enabled: bool,
) -> SnapLines {
    if !enabled {
        return SnapLines::default();
    }
    let Some(deck_id) = find_deck(tree) else {
        return SnapLines::default();
    };
    let (Some(deck_node), Some(origin)) = (tree.get(deck_id), tree.absolute_location(deck_id)) else {
        return SnapLines::default();
    };
    let Some((rail_offset, num_rails)) = deck_node.kind.deck().and_then(|d| d.rails()) else {
        return SnapLines::default();
    };

    let mut ys = AxisSnap::new(margin);
    let rail_bottom = origin.y + RAIL_AREA_Y;
    let rail_top = rail_bottom + RAIL_AREA_HEIGHT;
    ys.offer(y - rail_bottom, rail_bottom, None);
    ys.offer(y + height - rail_top, rail_top - height, Some(rail_top));

    let mut xs = AxisSnap::new(margin);
    xs.offer(x - origin.x, origin.x, None);
    for rail in 0..num_rails {
        let rail_x = origin.x + deck::rail_x(rail_offset, rail);
        xs.offer(x - rail_x, rail_x, None);
    }

    let (resource_x, snapping_x) = xs.resolve();
    let (resource_y, snapping_y) = ys.resolve();
    SnapLines {
        resource_x,
        resource_y,
        snapping_x,
        snapping_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::deck::DeckKind;
    use crate::core::geometry::Size;
    use crate::core::kind::Grid;

    fn star() -> (ResourceTree, NodeId, NodeId, NodeId) {
        let mut t = ResourceTree::new();
        let deck = t
            .insert(
                ResourceNode::new(
                    "deck",
                    ResourceKind::Deck(DeckKind::HamiltonStar { num_rails: 30 }),
                    Coordinate::ZERO,
                    Size::new(1360.0, 653.5, 900.0),
                ),
                None,
            )
            .unwrap();
        t.insert(
            ResourceNode::new("trash", ResourceKind::Trash, Coordinate::xy(800.0, 190.0), Size::new(123.0, 229.0, 0.0)),
            Some(deck),
        )
        .unwrap();
        let carrier = t
            .insert(
                ResourceNode::new(
                    "plt_car",
                    ResourceKind::Carrier(CarrierKind::Plate),
                    Coordinate::xy(100.0, 63.0),
                    Size::new(135.0, 497.0, 130.0),
                ),
                Some(deck),
            )
            .unwrap();
        let site = t
            .insert(
                ResourceNode::new(
                    "plt_car-0",
                    ResourceKind::Holder {
                        kind: crate::core::kind::HolderKind::Plate,
                        spot: serde_json::Value::from(0),
                    },
                    Coordinate::xy(4.0, 8.5),
                    Size::new(127.0, 86.0, 0.0),
                ),
                Some(carrier),
            )
            .unwrap();
        let plate = t
            .insert(
                ResourceNode::new("plate", ResourceKind::Plate(Grid::default()), Coordinate::xy(400.0, 300.0), Size::new(127.0, 86.0, 14.0)),
                Some(deck),
            )
            .unwrap();
        (t, site, plate, carrier)
    }

    #[test]
    fn point_inside_compatible_site_snaps_with_zero_offset() {
        let (t, site, plate, _) = star();
        let snap = snap_target(&t, plate, 150.0, 120.0, true).unwrap();
        assert_eq!(snap.target, site);
        assert_eq!(snap.kind, SnapKind::CarrierSite);
        assert_eq!(snap.location, Coordinate::ZERO);
        assert_eq!(snap.highlight, Rect::new(104.0, 71.5, 127.0, 86.0));
    }

    #[test]
    fn point_outside_targets_and_disabled_snapping_give_none() {
        let (t, _, plate, _) = star();
        assert!(snap_target(&t, plate, 600.0, 600.0, true).is_none());
        assert!(snap_target(&t, plate, 150.0, 120.0, false).is_none());
    }

    #[test]
    fn incompatible_kinds_do_not_dock() {
        let (mut t, _, _, _) = star();
        let deck = find_deck(&t).unwrap();
        let rack = t
            .insert(
                ResourceNode::new("tips", ResourceKind::TipRack(Grid::default()), Coordinate::ZERO, Size::new(10.0, 10.0, 1.0)),
                Some(deck),
            )
            .unwrap();
        assert!(snap_target(&t, rack, 150.0, 120.0, true).is_none());
    }

    #[test]
    fn trash_wins_first() {
        let (t, _, plate, _) = star();
        let snap = snap_target(&t, plate, 850.0, 200.0, true).unwrap();
        assert_eq!(snap.kind, SnapKind::Trash);
        assert_eq!(t.name_of(snap.target), "trash");
    }

    #[test]
    fn ot_slot_snaps_relative_to_deck() {
        let mut t = ResourceTree::new();
        let deck = t
            .insert(
                ResourceNode::new("deck", ResourceKind::Deck(DeckKind::Ot), deck::OT_DECK_LOCATION, Size::new(624.3, 565.2, 900.0)),
                None,
            )
            .unwrap();
        let plate = t
            .insert(
                ResourceNode::new("plate", ResourceKind::Plate(Grid::default()), Coordinate::ZERO, Size::new(127.0, 86.0, 14.0)),
                Some(deck),
            )
            .unwrap();
        let snap = snap_target(&t, plate, 115.65 + 140.0, 68.03 + 100.0, true).unwrap();
        assert_eq!(snap.kind, SnapKind::DeckSlot);
        assert_eq!(snap.target, deck);
        assert_eq!(snap.location, Coordinate::xy(132.5, 90.5));
    }

    #[test]
    fn grid_snaps_to_nearest_rail_and_rail_area() {
        let (t, _, _, _) = star();
        // Rails sit at 100, 122.5, 145, ...; 124 is closest to 122.5.
        let lines = snapping_grid(&t, 124.0, 65.0, 127.0, 86.0, SNAP_MARGIN, true);
        assert_eq!(lines.resource_x, Some(122.5));
        assert_eq!(lines.snapping_x, Some(122.5));
        assert_eq!(lines.resource_y, Some(63.0));
        assert_eq!(lines.snapping_y, Some(63.0));
    }

    #[test]
    fn grid_top_edge_uses_separate_guide_line() {
        let (t, _, _, _) = star();
        let lines = snapping_grid(&t, 700.0, 63.0 + 497.0 - 86.0 + 2.0, 127.0, 86.0, SNAP_MARGIN, true);
        assert_eq!(lines.resource_y, Some(63.0 + 497.0 - 86.0));
        assert_eq!(lines.snapping_y, Some(560.0));
        assert_eq!(lines.resource_x, None);
    }

    #[test]
    fn grid_nothing_within_margin() {
        let (t, _, _, _) = star();
        assert!(snapping_grid(&t, 111.0, 300.0, 10.0, 10.0, SNAP_MARGIN, true).is_empty());
        assert!(snapping_grid(&t, 100.0, 63.0, 10.0, 10.0, SNAP_MARGIN, false).is_empty());
    }
}
