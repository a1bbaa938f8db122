//! A viewing session: the resource tree plus everything derived from it.
//!
//! All mutations go through here so the scene and the frame recorder stay in
//! step with the tree.  Every operation that changes a node ends in
//! [`Session::update`], which re-derives grid names, redraws the affected
//! subtree and ticks the recorder.

use std::collections::BTreeMap;
use std::path::Path;

use image::RgbaImage;
use serde_json::{Map, Value};

use crate::config::ViewerConfig;
use crate::core::container::Liquid;
use crate::core::error::{LoadError, TreeError, UpdateError};
use crate::core::geometry::Coordinate;
use crate::core::kind::ViewMode;
use crate::core::serialize;
use crate::core::snapping::{self, SnapKind, SnapLines, SnapTarget};
use crate::core::tree::{NodeId, ResourceTree};
use crate::core::update::{self, BatchReport};
use crate::render::palette::LiquidPalette;
use crate::render::raster::Rasterizer;
use crate::render::recorder::FrameRecorder;
use crate::render::scene::Scene;

/// What happened to a dropped resource.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Dropped on the trash; `removed` nodes were destroyed.
    Deleted { removed: usize },
    /// Docked onto a carrier site or deck slot.
    Docked { parent: NodeId, kind: SnapKind },
    /// Free placement, possibly corrected by guide lines.
    Placed { location: Coordinate, lines: SnapLines },
}

pub struct Session {
    tree: ResourceTree,
    scene: Scene,
    palette: LiquidPalette,
    recorder: FrameRecorder,
    raster: Rasterizer,
    mode: ViewMode,
    snapping: bool,
    snap_margin: f64,
}

impl Session {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            tree: ResourceTree::new(),
            scene: Scene::new(),
            palette: LiquidPalette::new(),
            recorder: FrameRecorder::new(config.frame_interval),
            raster: Rasterizer::new(config.pixels_per_mm),
            mode: config.mode,
            snapping: config.snapping,
            snap_margin: config.snap_margin,
        }
    }

    // ── accessors ───────────────────────────────────────────────

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn recorder(&self) -> &FrameRecorder {
        &self.recorder
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Switching modes changes drag/delete permissions on every item.
    pub fn set_mode(&mut self, mode: ViewMode) {
        if self.mode != mode {
            self.mode = mode;
            self.scene.redraw_all(&self.tree, &mut self.palette, mode);
            tracing::info!("switched to {} mode", mode.label());
        }
    }

    pub fn snapping(&self) -> bool {
        self.snapping
    }

    pub fn set_snapping(&mut self, enabled: bool) {
        self.snapping = enabled;
    }

    // ── load / export ───────────────────────────────────────────

    pub fn load_json(&mut self, json: &str) -> Result<NodeId, LoadError> {
        let id = serialize::load_json(&mut self.tree, json)?;
        self.update(id);
        Ok(id)
    }

    /// Full description of the whole tree.
    pub fn export_layout(&self) -> Option<Value> {
        serialize::export(&self.tree, self.tree.root()?)
    }

    pub fn export_state(&self) -> BTreeMap<String, Value> {
        serialize::export_state(&self.tree)
    }

    // ── state updates ───────────────────────────────────────────

    pub fn apply_state(&mut self, batch: &Map<String, Value>) -> BatchReport {
        let report = update::apply_batch(&mut self.tree, batch);
        for &id in &report.applied {
            self.update(id);
        }
        report
    }

    pub fn aspirate(&mut self, name: &str, volume: f64) -> Result<NodeId, UpdateError> {
        let id = update::aspirate(&mut self.tree, name, volume)?;
        self.update(id);
        Ok(id)
    }

    pub fn dispense(&mut self, name: &str, liquid: Liquid) -> Result<NodeId, UpdateError> {
        let id = update::dispense(&mut self.tree, name, liquid)?;
        self.update(id);
        Ok(id)
    }

    // ── placement ───────────────────────────────────────────────

    pub fn snap_target(&self, name: &str, x: f64, y: f64) -> Result<Option<SnapTarget>, TreeError> {
        let id = self.tree.lookup(name)?;
        Ok(snapping::snap_target(&self.tree, id, x, y, self.snapping))
    }

    pub fn snapping_grid(&self, x: f64, y: f64, width: f64, height: f64) -> SnapLines {
        snapping::snapping_grid(&self.tree, x, y, width, height, self.snap_margin, self.snapping)
    }

    /// Finish a drag of `name`: `pointer` is where it was released, `origin`
    /// the absolute position its lower-left corner was dragged to.
    pub fn drop_resource(&mut self, name: &str, pointer: Coordinate, origin: Coordinate) -> Result<DropOutcome, TreeError> {
        let id = self.tree.lookup(name)?;
        let (size, parent) = match self.tree.get(id) {
            Some(node) if node.kind.draggable(self.mode) => (node.size, node.parent),
            Some(_) => {
                return Err(TreeError::NotPermitted {
                    name: name.to_string(),
                    action: "drag",
                })
            }
            None => return Err(TreeError::NotFound(name.to_string())),
        };

        if let Some(target) = snapping::snap_target(&self.tree, id, pointer.x, pointer.y, self.snapping) {
            if target.kind == SnapKind::Trash {
                let removed = self.delete(name)?;
                return Ok(DropOutcome::Deleted { removed });
            }
            self.tree.assign_child(target.target, id)?;
            if let Some(node) = self.tree.get_mut(id) {
                node.location = Coordinate::new(target.location.x, target.location.y, node.location.z);
            }
            tracing::info!("docked {name} onto {}", self.tree.name_of(target.target));
            self.update(id);
            return Ok(DropOutcome::Docked {
                parent: target.target,
                kind: target.kind,
            });
        }

        let lines = self.snapping_grid(origin.x, origin.y, size.x, size.y);
        let absolute = Coordinate::xy(lines.resource_x.unwrap_or(origin.x), lines.resource_y.unwrap_or(origin.y));
        let parent_origin = parent
            .and_then(|p| self.tree.absolute_location(p))
            .unwrap_or(Coordinate::ZERO);
        let relative = absolute.minus(parent_origin);
        let location = match self.tree.get_mut(id) {
            Some(node) => {
                node.location = Coordinate::new(relative.x, relative.y, node.location.z);
                node.location
            }
            None => return Err(TreeError::NotFound(name.to_string())),
        };
        self.update(id);
        Ok(DropOutcome::Placed { location, lines })
    }

    /// Destroy `name` and its subtree.  Returns how many nodes went away.
    pub fn delete(&mut self, name: &str) -> Result<usize, TreeError> {
        let id = self.tree.lookup(name)?;
        let deletable = self.tree.get(id).is_some_and(|n| n.kind.deletable(self.mode));
        if !deletable {
            return Err(TreeError::NotPermitted {
                name: name.to_string(),
                action: "delete",
            });
        }
        let parent = self.tree.get(id).and_then(|n| n.parent);
        let removed = self.tree.destroy(id)?;
        tracing::info!("deleted {name} ({removed} resources)");
        match parent {
            Some(p) => self.update(p),
            None => self.scene = Scene::new(),
        }
        Ok(removed)
    }

    // ── render / update cycle ───────────────────────────────────

    /// Re-derive grid names under `id`, redraw its subtree and let the
    /// recorder sample the result.
    pub fn update(&mut self, id: NodeId) {
        let renamed = self.tree.refresh_grid_names(id);
        if renamed > 0 {
            tracing::debug!("renamed {renamed} grid children under {}", self.tree.name_of(id));
        }
        self.scene.redraw(&self.tree, id, &mut self.palette, self.mode);
        if self.recorder.tick() {
            let frame = self.render_frame();
            self.recorder.push(frame);
        }
    }

    pub fn render_frame(&self) -> RgbaImage {
        self.raster.render(&self.scene, &self.tree)
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.raster.save_png(&self.scene, &self.tree, path)
    }

    // ── recording ───────────────────────────────────────────────

    pub fn start_recording(&mut self) {
        let first = self.render_frame();
        self.recorder.start(first);
    }

    /// Stop recording and hand over the buffered frames.
    pub fn stop_recording(&mut self) -> Vec<RgbaImage> {
        let last = self.render_frame();
        self.recorder.stop(last)
    }

    pub fn set_frame_interval(&mut self, raw: u32) {
        self.recorder.set_interval(raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::deck::OT_DECK_LOCATION;
    use serde_json::json;

    fn gui() -> ViewerConfig {
        ViewerConfig {
            mode: ViewMode::Gui,
            ..ViewerConfig::default()
        }
    }

    fn star_session(config: &ViewerConfig) -> Session {
        let mut s = Session::new(config);
        s.load_json(
            &json!({
                "name": "deck", "type": "HamiltonSTARDeck", "num_rails": 30,
                "size_x": 1360, "size_y": 653.5, "size_z": 900,
                "location": {"x": 0, "y": 0, "z": 0},
                "children": [
                    {"name": "carrier", "type": "PlateCarrier", "location": {"x": 100, "y": 63, "z": 100},
                     "size_x": 135, "size_y": 497, "size_z": 130,
                     "children": [
                        {"name": "carrier-0", "type": "PlateHolder", "location": {"x": 4, "y": 8, "z": 86},
                         "size_x": 127, "size_y": 86, "size_z": 0}
                     ]},
                    {"name": "plate", "type": "Plate", "location": {"x": 500, "y": 200, "z": 0},
                     "size_x": 127, "size_y": 86, "size_z": 14, "num_items_x": 1, "num_items_y": 1,
                     "children": [
                        {"name": "A1", "type": "Well", "location": {"x": 10, "y": 70, "z": 1},
                         "size_x": 6, "size_y": 6, "size_z": 10, "max_volume": 300}
                     ]},
                    {"name": "trash", "type": "Trash", "location": {"x": 800, "y": 190, "z": 0},
                     "size_x": 100, "size_y": 100, "size_z": 0}
                ]
            })
            .to_string(),
        )
        .unwrap();
        s
    }

    #[test]
    fn load_renames_grid_children_and_draws_everything() {
        let s = star_session(&gui());
        assert!(s.tree().find("A1").is_none());
        assert!(s.tree().find("plate_well_0_0").is_some());
        assert_eq!(s.scene().len(), s.tree().len());
    }

    #[test]
    fn drop_on_compatible_site_docks_with_zero_offset() {
        let mut s = star_session(&gui());
        let out = s
            .drop_resource("plate", Coordinate::xy(150.0, 100.0), Coordinate::xy(140.0, 90.0))
            .unwrap();
        let site = s.tree().find("carrier-0").unwrap();
        assert_eq!(out, DropOutcome::Docked { parent: site, kind: SnapKind::CarrierSite });
        let plate = s.tree().find("plate").unwrap();
        assert_eq!(s.tree().get(plate).unwrap().parent, Some(site));
        let abs = s.tree().absolute_location(plate).unwrap();
        assert_eq!((abs.x, abs.y), (104.0, 71.0));
    }

    #[test]
    fn drop_on_trash_deletes_subtree() {
        let mut s = star_session(&gui());
        let before = s.tree().len();
        let out = s
            .drop_resource("plate", Coordinate::xy(850.0, 240.0), Coordinate::xy(840.0, 230.0))
            .unwrap();
        assert_eq!(out, DropOutcome::Deleted { removed: 2 });
        assert_eq!(s.tree().len(), before - 2);
        assert_eq!(s.scene().len(), s.tree().len());
    }

    #[test]
    fn free_drop_snaps_to_rail() {
        let mut s = star_session(&gui());
        let out = s
            .drop_resource("plate", Coordinate::xy(1000.0, 400.0), Coordinate::xy(146.0, 300.0))
            .unwrap();
        match out {
            DropOutcome::Placed { location, lines } => {
                assert_eq!(lines.resource_x, Some(145.0));
                assert_eq!(location.x, 145.0);
                assert_eq!(location.y, 300.0);
            }
            other => panic!("expected placement, got {other:?}"),
        }
    }

    #[test]
    fn visualizer_mode_forbids_drag_and_delete() {
        let mut s = star_session(&ViewerConfig::default());
        assert!(matches!(
            s.drop_resource("plate", Coordinate::xy(0.0, 0.0), Coordinate::xy(0.0, 0.0)),
            Err(TreeError::NotPermitted { action: "drag", .. })
        ));
        assert!(matches!(s.delete("plate"), Err(TreeError::NotPermitted { .. })));
        s.set_mode(ViewMode::Gui);
        assert_eq!(s.delete("plate"), Ok(2));
    }

    #[test]
    fn state_batch_redraws_and_records() {
        let mut s = star_session(&ViewerConfig {
            frame_interval: 1,
            ..ViewerConfig::default()
        });
        s.start_recording();
        let batch = json!({"plate_well_0_0": {"liquids": [["water", 150.0]]}});
        let report = s.apply_state(batch.as_object().unwrap());
        assert!(report.is_clean());
        assert_eq!(s.recorder().frame_count(), 2);
        assert_eq!(s.export_state()["plate_well_0_0"]["liquids"], json!([["water", 150.0]]));
        let frames = s.stop_recording();
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn ot_slot_drop_reparents_to_deck() {
        let mut s = Session::new(&gui());
        s.load_json(
            &json!({
                "name": "deck", "type": "OTDeck", "size_x": 624.3, "size_y": 565.2,
                "children": [
                    {"name": "tips", "type": "TipRack", "location": {"x": 0, "y": 0, "z": 0},
                     "size_x": 122, "size_y": 82, "num_items_x": 0, "num_items_y": 0}
                ]
            })
            .to_string(),
        )
        .unwrap();
        let px = OT_DECK_LOCATION.x + 132.5 + 10.0;
        let py = OT_DECK_LOCATION.y + 90.5 + 10.0;
        let out = s.drop_resource("tips", Coordinate::xy(px, py), Coordinate::xy(px, py)).unwrap();
        assert!(matches!(out, DropOutcome::Docked { kind: SnapKind::DeckSlot, .. }));
        let tips = s.tree().get(s.tree().find("tips").unwrap()).unwrap();
        assert_eq!((tips.location.x, tips.location.y), (132.5, 90.5));
    }
}
