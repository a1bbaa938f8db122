//! Render intents.
//!
//! A [`Scene`] holds one [`DrawItem`] per visible node: the shapes that node
//! contributes, in absolute deck millimetres with y pointing up, plus its
//! tooltip and interaction flags.  Presentation layers (the rasterizer, the
//! terminal preview) only ever read a scene; they never look at the tree.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::deck::{
    rail_x, DeckKind, OT_SLOT_HEIGHT, OT_SLOT_LOCATIONS, OT_SLOT_WIDTH, RAIL_AREA_HEIGHT, RAIL_AREA_Y,
    RAIL_TICK,
};
use crate::core::geometry::{Coordinate, Rect};
use crate::core::kind::{CrossSection, ResourceKind, ViewMode};
use crate::core::tree::{NodeId, ResourceNode, ResourceTree};

use super::palette::{resource_color, LiquidPalette, Rgba, BLACK, CONTAINER_BACKGROUND, TIP_PRESENT, WHITE};

// ───────────────────────────────────────── shapes ────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f64,
}

impl Stroke {
    pub const OUTLINE: Stroke = Stroke { color: BLACK, width: 1.0 };
    pub const THIN: Stroke = Stroke { color: BLACK, width: 0.5 };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Rect {
        rect: Rect,
        fill: Option<Rgba>,
        stroke: Option<Stroke>,
    },
    Circle {
        center: Coordinate,
        radius: f64,
        fill: Option<Rgba>,
        stroke: Option<Stroke>,
    },
    Line {
        from: Coordinate,
        to: Coordinate,
        stroke: Stroke,
    },
    Label {
        anchor: Coordinate,
        text: String,
        font_size: f64,
        color: Rgba,
    },
}

impl Shape {
    /// Axis-aligned extent; labels have none.
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            Shape::Rect { rect, .. } => Some(*rect),
            Shape::Circle { center, radius, .. } => Some(Rect::new(
                center.x - radius,
                center.y - radius,
                radius * 2.0,
                radius * 2.0,
            )),
            Shape::Line { from, to, .. } => Some(Rect::new(
                from.x.min(to.x),
                from.y.min(to.y),
                (from.x - to.x).abs(),
                (from.y - to.y).abs(),
            )),
            Shape::Label { .. } => None,
        }
    }
}

/// Everything one node contributes to the picture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawItem {
    #[serde(skip)]
    pub node: NodeId,
    pub name: String,
    pub tooltip: String,
    pub shapes: Vec<Shape>,
    pub draggable: bool,
    pub deletable: bool,
}

// ───────────────────────────────────────── scene ─────────────

#[derive(Debug, Default, Clone)]
pub struct Scene {
    items: HashMap<NodeId, DrawItem>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: NodeId) -> Option<&DrawItem> {
        self.items.get(&id)
    }

    /// Recompute `id` and every descendant.  Items of nodes that no longer
    /// exist are dropped.
    pub fn redraw(&mut self, tree: &ResourceTree, id: NodeId, palette: &mut LiquidPalette, mode: ViewMode) {
        self.items.retain(|&nid, _| tree.get(nid).is_some());
        for nid in tree.descendants(id) {
            if let Some(item) = draw_node(tree, nid, palette, mode) {
                self.items.insert(nid, item);
            }
        }
    }

    /// Rebuild from scratch.
    pub fn redraw_all(&mut self, tree: &ResourceTree, palette: &mut LiquidPalette, mode: ViewMode) {
        self.items.clear();
        if let Some(root) = tree.root() {
            self.redraw(tree, root, palette, mode);
        }
    }

    /// Items in painter's order (parents before children).
    pub fn ordered<'a>(&'a self, tree: &ResourceTree) -> Vec<&'a DrawItem> {
        tree.iter().filter_map(|(id, _)| self.items.get(&id)).collect()
    }

    /// Union of every shape, or `None` for an empty scene.
    pub fn bounds(&self) -> Option<Rect> {
        self.items
            .values()
            .flat_map(|item| item.shapes.iter().filter_map(Shape::bounds))
            .reduce(|a, b| a.union(&b))
    }

    /// Topmost item under an absolute point.
    pub fn hit_test<'a>(&'a self, tree: &ResourceTree, x: f64, y: f64) -> Option<&'a DrawItem> {
        self.ordered(tree)
            .into_iter()
            .rev()
            .find(|item| tree.absolute_rect(item.node).is_some_and(|r| r.contains_strict(x, y)))
    }
}

// ───────────────────────────────────────── per-kind drawing ──

/// Draw item for one node.  Nodes without a main shape still get an item so
/// their tooltip and permissions are available.
pub fn draw_node(tree: &ResourceTree, id: NodeId, palette: &mut LiquidPalette, mode: ViewMode) -> Option<DrawItem> {
    let node = tree.get(id)?;
    let origin = tree.absolute_location(id)?;
    Some(DrawItem {
        node: id,
        name: node.name.clone(),
        tooltip: node.tooltip(),
        shapes: main_shapes(node, origin, palette),
        draggable: node.kind.draggable(mode),
        deletable: node.kind.deletable(mode),
    })
}

fn main_shapes(node: &ResourceNode, origin: Coordinate, palette: &mut LiquidPalette) -> Vec<Shape> {
    let bounds = Rect::at(origin, node.size);
    match &node.kind {
        ResourceKind::Trash | ResourceKind::LiquidHandler => Vec::new(),
        ResourceKind::Deck(deck @ (DeckKind::HamiltonStar { .. } | DeckKind::Vantage { .. })) => {
            rail_deck(deck, bounds)
        }
        ResourceKind::Deck(DeckKind::Ot) => ot_deck(bounds),
        ResourceKind::Well { container, cross_section } => {
            let ratio = container.fill_ratio();
            let liquid = palette.color_for(liquid_name(container));
            match cross_section {
                Some(CrossSection::Circle) => {
                    let center = center_of(bounds);
                    let radius = node.size.x / 2.0;
                    disc_with_liquid(center, radius, WHITE, ratio, liquid)
                }
                _ => rect_with_liquid(bounds, WHITE, ratio, liquid),
            }
        }
        ResourceKind::Tube(container) => {
            let liquid = palette.color_for(liquid_name(container));
            let radius = 1.25 * node.size.x / 2.0;
            disc_with_liquid(center_of(bounds), radius, WHITE, container.fill_ratio(), liquid)
        }
        ResourceKind::Trough(container) | ResourceKind::Container(container) => {
            let liquid = palette.color_for(liquid_name(container));
            rect_with_liquid(bounds, CONTAINER_BACKGROUND, container.fill_ratio(), liquid)
        }
        ResourceKind::TipSpot(tip) => vec![Shape::Circle {
            center: center_of(bounds),
            radius: node.size.x / 2.0,
            fill: Some(if tip.has_tip { TIP_PRESENT } else { WHITE }),
            stroke: Some(Stroke::OUTLINE),
        }],
        kind => vec![Shape::Rect {
            rect: bounds,
            fill: Some(resource_color(kind)),
            stroke: Some(Stroke::OUTLINE),
        }],
    }
}

fn liquid_name(container: &crate::core::container::ContainerState) -> Option<&str> {
    container.predominant_liquid().and_then(|l| l.name.as_deref())
}

fn center_of(r: Rect) -> Coordinate {
    Coordinate::xy(r.x + r.width / 2.0, r.y + r.height / 2.0)
}

/// Background rectangle with a liquid layer rising from the bottom edge.
fn rect_with_liquid(bounds: Rect, background: Rgba, ratio: f64, liquid: Rgba) -> Vec<Shape> {
    let mut shapes = vec![Shape::Rect {
        rect: bounds,
        fill: Some(background),
        stroke: Some(Stroke::OUTLINE),
    }];
    if ratio > 0.0 {
        shapes.push(Shape::Rect {
            rect: Rect::new(bounds.x, bounds.y, bounds.width, bounds.height * ratio.min(1.0)),
            fill: Some(liquid),
            stroke: Some(Stroke::THIN),
        });
    }
    shapes
}

/// Background disc with a concentric liquid disc whose area tracks the ratio.
fn disc_with_liquid(center: Coordinate, radius: f64, background: Rgba, ratio: f64, liquid: Rgba) -> Vec<Shape> {
    let mut shapes = vec![Shape::Circle {
        center,
        radius,
        fill: Some(background),
        stroke: Some(Stroke::OUTLINE),
    }];
    if ratio > 0.0 {
        shapes.push(Shape::Circle {
            center,
            radius: radius * ratio.min(1.0).sqrt(),
            fill: Some(liquid),
            stroke: Some(Stroke::THIN),
        });
    }
    shapes
}

fn rail_deck(deck: &DeckKind, bounds: Rect) -> Vec<Shape> {
    let mut shapes = vec![
        Shape::Rect {
            rect: Rect::new(bounds.x, bounds.y + RAIL_AREA_Y, bounds.width, RAIL_AREA_HEIGHT),
            fill: Some(WHITE),
            stroke: Some(Stroke::OUTLINE),
        },
        Shape::Rect {
            rect: bounds,
            fill: None,
            stroke: Some(Stroke::OUTLINE),
        },
    ];
    let Some((offset, count)) = deck.rails() else {
        return shapes;
    };
    for i in 0..count {
        let x = bounds.x + rail_x(offset, i);
        shapes.push(Shape::Line {
            from: Coordinate::xy(x, bounds.y + RAIL_AREA_Y - RAIL_TICK),
            to: Coordinate::xy(x, bounds.y + RAIL_AREA_Y + RAIL_AREA_HEIGHT),
            stroke: Stroke::OUTLINE,
        });
        // Rails are numbered from 1; every fifth one is labelled.
        if (i + 1) % 5 == 0 {
            shapes.push(Shape::Label {
                anchor: Coordinate::xy(x, bounds.y + 50.0),
                text: (i + 1).to_string(),
                font_size: 12.0,
                color: BLACK,
            });
        }
    }
    shapes
}

fn ot_deck(bounds: Rect) -> Vec<Shape> {
    let mut shapes = Vec::with_capacity(OT_SLOT_LOCATIONS.len() * 2 + 1);
    for (i, slot) in OT_SLOT_LOCATIONS.iter().enumerate() {
        let rect = Rect::new(bounds.x + slot.x, bounds.y + slot.y, OT_SLOT_WIDTH, OT_SLOT_HEIGHT);
        shapes.push(Shape::Rect {
            rect,
            fill: Some(WHITE),
            stroke: Some(Stroke::OUTLINE),
        });
        shapes.push(Shape::Label {
            anchor: center_of(rect),
            text: (i + 1).to_string(),
            font_size: 16.0,
            color: BLACK,
        });
    }
    shapes.push(Shape::Rect {
        rect: bounds,
        fill: None,
        stroke: Some(Stroke::OUTLINE),
    });
    shapes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serialize::load_json;
    use serde_json::json;

    fn star() -> ResourceTree {
        let mut t = ResourceTree::new();
        load_json(
            &mut t,
            &json!({
                "name": "deck", "type": "HamiltonSTARDeck", "num_rails": 30,
                "size_x": 1360, "size_y": 653.5, "size_z": 900,
                "location": {"x": 0, "y": 0, "z": 0},
                "children": [
                    {"name": "w", "type": "Well", "location": {"x": 100, "y": 100, "z": 0},
                     "size_x": 8, "size_y": 8, "size_z": 10, "max_volume": 100,
                     "cross_section_type": "circle", "liquids": [["water", 25]]},
                    {"name": "trash", "type": "Trash", "location": {"x": 800, "y": 190, "z": 0},
                     "size_x": 0, "size_y": 241.2, "size_z": 0}
                ]
            })
            .to_string(),
        )
        .unwrap();
        t
    }

    #[test]
    fn rail_deck_has_rails_and_every_fifth_label() {
        let t = star();
        let mut scene = Scene::new();
        scene.redraw_all(&t, &mut LiquidPalette::new(), ViewMode::Visualizer);
        let deck = scene.item(t.find("deck").unwrap()).unwrap();
        let lines = deck.shapes.iter().filter(|s| matches!(s, Shape::Line { .. })).count();
        let labels: Vec<_> = deck
            .shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Label { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(lines, 30);
        assert_eq!(labels, ["5", "10", "15", "20", "25", "30"]);
        match &deck.shapes[2] {
            Shape::Line { from, to, .. } => {
                assert_eq!(from.x, 100.0);
                assert_eq!(from.y, 53.0);
                assert_eq!(to.y, 560.0);
            }
            other => panic!("expected rail, got {other:?}"),
        }
    }

    #[test]
    fn circular_well_liquid_scales_by_area() {
        let t = star();
        let mut scene = Scene::new();
        scene.redraw_all(&t, &mut LiquidPalette::new(), ViewMode::Visualizer);
        let well = scene.item(t.find("w").unwrap()).unwrap();
        assert_eq!(well.tooltip, "w (Well)");
        assert!(!well.draggable);
        match &well.shapes[1] {
            Shape::Circle { center, radius, .. } => {
                assert_eq!((center.x, center.y), (104.0, 104.0));
                assert!((radius - 2.0).abs() < 1e-9);
            }
            other => panic!("expected liquid disc, got {other:?}"),
        }
    }

    #[test]
    fn trash_draws_nothing_but_keeps_tooltip() {
        let t = star();
        let mut scene = Scene::new();
        scene.redraw_all(&t, &mut LiquidPalette::new(), ViewMode::Gui);
        let trash = scene.item(t.find("trash").unwrap()).unwrap();
        assert!(trash.shapes.is_empty());
        assert!(trash.deletable);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn redraw_drops_destroyed_nodes() {
        let mut t = star();
        let mut scene = Scene::new();
        let mut palette = LiquidPalette::new();
        scene.redraw_all(&t, &mut palette, ViewMode::Visualizer);
        t.destroy(t.find("w").unwrap()).unwrap();
        let deck = t.find("deck").unwrap();
        scene.redraw(&t, deck, &mut palette, ViewMode::Visualizer);
        assert_eq!(scene.len(), 2);
        let hit = scene.hit_test(&t, 10.0, 10.0).unwrap();
        assert_eq!(hit.name, "deck");
    }

    #[test]
    fn ot_deck_draws_numbered_slots() {
        let mut t = ResourceTree::new();
        load_json(&mut t, r#"{"name": "deck", "type": "OTDeck", "size_x": 624.3, "size_y": 565.2}"#).unwrap();
        let mut scene = Scene::new();
        scene.redraw_all(&t, &mut LiquidPalette::new(), ViewMode::Visualizer);
        let deck = scene.item(t.find("deck").unwrap()).unwrap();
        assert_eq!(deck.shapes.len(), 25);
        assert!(matches!(&deck.shapes[1], Shape::Label { text, .. } if text == "1"));
        match &deck.shapes[0] {
            Shape::Rect { rect, .. } => assert_eq!((rect.x, rect.y), (115.65, 68.03)),
            other => panic!("expected slot, got {other:?}"),
        }
    }
}
