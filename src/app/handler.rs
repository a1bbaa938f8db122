//! Input handling: maps key events, update batches and GIF progress to
//! state mutations.

use std::path::Path;

use crossterm::event::KeyEvent;
use serde_json::{Map, Value};

use crate::config::Action;
use crate::core::deck::RAIL_SPACING;
use crate::core::geometry::Coordinate;
use crate::core::kind::ViewMode;
use crate::core::tree::NodeId;
use crate::render::recorder::FinalizeUpdate;
use crate::ui::tree_widget::{visible_rows, TreeRow};

use super::event::UpdateEvent;
use super::session::DropOutcome;
use super::state::{AppState, DragState};

/// Keyboard drags move by one rail pitch per key press.
const DRAG_STEP: f64 = RAIL_SPACING;

fn rows(state: &AppState) -> Vec<TreeRow> {
    visible_rows(state.session.tree(), &state.expanded)
}

fn selected_node(state: &AppState) -> Option<NodeId> {
    rows(state).get(state.tree_state.selected).map(|r| r.node)
}

fn selected_name(state: &AppState) -> Option<String> {
    let id = selected_node(state)?;
    state.session.tree().get(id).map(|n| n.name.clone())
}

// ── keys ────────────────────────────────────────────────────────

/// Process a key event according to the configured bindings.
pub fn handle_key(state: &mut AppState, key: KeyEvent) {
    let Some(action) = state.config.match_key(key) else {
        return;
    };

    match action {
        Action::Quit => {
            if let Some(gif) = &state.gif {
                gif.job.request_cancel();
            }
            state.should_quit = true;
        }
        Action::MoveUp => state.tree_state.select_prev(),
        Action::MoveDown => {
            let count = rows(state).len();
            state.tree_state.select_next(count);
        }
        Action::Expand => {
            if let Some(row) = rows(state).get(state.tree_state.selected) {
                if row.has_children {
                    state.expanded.insert(row.node);
                }
            }
        }
        Action::Collapse => collapse_or_parent(state),
        Action::JumpSiblingUp => jump_sibling(state, false),
        Action::JumpSiblingDown => jump_sibling(state, true),
        Action::DragLeft => drag_by(state, -DRAG_STEP, 0.0),
        Action::DragRight => drag_by(state, DRAG_STEP, 0.0),
        Action::DragUp => drag_by(state, 0.0, DRAG_STEP),
        Action::DragDown => drag_by(state, 0.0, -DRAG_STEP),
        Action::Drop => drop_dragged(state),
        Action::CancelDrag => {
            if let Some(drag) = state.drag.take() {
                state.set_status(format!("drag of {} cancelled", drag.name));
            }
        }
        Action::Delete => delete_selected(state),
        Action::ToggleSnapping => {
            let enabled = !state.session.snapping();
            state.session.set_snapping(enabled);
            state.config.snapping = enabled;
            state.config_dirty = true;
            state.set_status(format!("snapping {}", if enabled { "on" } else { "off" }));
        }
        Action::ToggleMode => {
            let mode = match state.session.mode() {
                ViewMode::Visualizer => ViewMode::Gui,
                ViewMode::Gui => ViewMode::Visualizer,
            };
            state.session.set_mode(mode);
            state.drag = None;
            state.set_status(format!("{} mode", mode.label()));
        }
        Action::ToggleRecording => toggle_recording(state),
        Action::IntervalUp => change_interval(state, 8),
        Action::IntervalDown => change_interval(state, -8),
        Action::ExportLayout => export_layout(state),
        Action::ExportState => export_state(state),
        Action::Snapshot => {
            let path = state.outputs.png.clone();
            match state.session.save_png(&path) {
                Ok(()) => state.set_status(format!("snapshot written to {}", path.display())),
                Err(e) => state.set_status(format!("snapshot failed: {e}")),
            }
        }
    }
}

fn collapse_or_parent(state: &mut AppState) {
    let rows = rows(state);
    let Some(row) = rows.get(state.tree_state.selected) else {
        return;
    };
    if row.expanded {
        state.expanded.remove(&row.node);
        return;
    }
    let parent = state.session.tree().get(row.node).and_then(|n| n.parent);
    if let Some(idx) = parent.and_then(|p| rows.iter().position(|r| r.node == p)) {
        state.tree_state.selected = idx;
    }
}

fn jump_sibling(state: &mut AppState, forward: bool) {
    let rows = rows(state);
    let cur = state.tree_state.selected;
    let Some(depth) = rows.get(cur).map(|r| r.depth) else {
        return;
    };
    let found = if forward {
        rows.iter()
            .enumerate()
            .skip(cur + 1)
            .take_while(|(_, r)| r.depth >= depth)
            .find(|(_, r)| r.depth == depth)
            .map(|(i, _)| i)
    } else {
        rows[..cur]
            .iter()
            .enumerate()
            .rev()
            .take_while(|(_, r)| r.depth >= depth)
            .find(|(_, r)| r.depth == depth)
            .map(|(i, _)| i)
    };
    if let Some(i) = found {
        state.tree_state.selected = i;
    }
}

// ── drag & drop ─────────────────────────────────────────────────

fn drag_by(state: &mut AppState, dx: f64, dy: f64) {
    if state.drag.is_none() {
        let Some(id) = selected_node(state) else {
            return;
        };
        let tree = state.session.tree();
        let (Some(node), Some(origin)) = (tree.get(id), tree.absolute_location(id)) else {
            return;
        };
        if !node.kind.draggable(state.session.mode()) {
            let msg = format!("{} cannot be moved in {} mode", node.name, state.session.mode().label());
            state.set_status(msg);
            return;
        }
        state.drag = Some(DragState {
            node: id,
            name: node.name.clone(),
            origin,
        });
    }

    let Some(drag) = state.drag.as_mut() else {
        return;
    };
    drag.origin = Coordinate::new(drag.origin.x + dx, drag.origin.y + dy, drag.origin.z);
    let drag = drag.clone();
    let msg = drag_preview(state, &drag);
    state.set_status(msg);
}

/// Point the drag "holds" the resource by: the centre of its footprint.
fn drag_pointer(state: &AppState, drag: &DragState) -> Coordinate {
    let size = state.session.tree().get(drag.node).map(|n| n.size).unwrap_or_default();
    Coordinate::xy(drag.origin.x + size.x / 2.0, drag.origin.y + size.y / 2.0)
}

fn drag_preview(state: &AppState, drag: &DragState) -> String {
    let pointer = drag_pointer(state, drag);
    let tree = state.session.tree();
    let over = state
        .session
        .scene()
        .hit_test(tree, pointer.x, pointer.y)
        .filter(|item| item.node != drag.node && !tree.is_ancestor(drag.node, item.node))
        .map(|item| format!(" over {}", item.tooltip))
        .unwrap_or_default();
    let target = state
        .session
        .snap_target(&drag.name, pointer.x, pointer.y)
        .ok()
        .flatten()
        .map(|t| format!(" → {}", tree.name_of(t.target)))
        .unwrap_or_default();
    format!("dragging {} to ({:.1}, {:.1}){over}{target}", drag.name, drag.origin.x, drag.origin.y)
}

fn drop_dragged(state: &mut AppState) {
    let Some(drag) = state.drag.take() else {
        return;
    };
    let pointer = drag_pointer(state, &drag);
    match state.session.drop_resource(&drag.name, pointer, drag.origin) {
        Ok(DropOutcome::Deleted { removed }) => {
            state.set_status(format!("{} trashed ({removed} resources)", drag.name));
        }
        Ok(DropOutcome::Docked { parent, .. }) => {
            let parent_name = state.session.tree().name_of(parent).to_string();
            state.expanded.insert(parent);
            state.set_status(format!("{} placed on {parent_name}", drag.name));
        }
        Ok(DropOutcome::Placed { location, .. }) => {
            state.set_status(format!("{} moved to ({:.1}, {:.1})", drag.name, location.x, location.y));
        }
        Err(e) => state.set_status(format!("drop failed: {e}")),
    }
    state.invalidate_preview();
}

fn delete_selected(state: &mut AppState) {
    let Some(name) = selected_name(state) else {
        return;
    };
    match state.session.delete(&name) {
        Ok(removed) => {
            state.set_status(format!("deleted {name} ({removed} resources)"));
            state.invalidate_preview();
            let count = rows(state).len();
            state.tree_state.clamp_selection(count);
        }
        Err(e) => state.set_status(e.to_string()),
    }
}

// ── recording & export ──────────────────────────────────────────

fn toggle_recording(state: &mut AppState) {
    if state.session.recorder().is_recording() {
        let frames = state.session.stop_recording();
        state.set_status(format!("recording stopped, rendering {} frames", frames.len()));
        state.pending_gif = Some(frames);
    } else if state.gif.is_some() {
        state.set_status("a GIF is still being rendered");
    } else {
        state.session.start_recording();
        let every = state.session.recorder().interval();
        state.set_status(format!("recording (every {every} updates)"));
    }
}

fn change_interval(state: &mut AppState, delta: i64) {
    let current = i64::from(state.session.recorder().interval());
    let raw = (current + delta).clamp(0, i64::from(u32::MAX)) as u32;
    state.session.set_frame_interval(raw);
    state.config.frame_interval = state.session.recorder().interval();
    state.config_dirty = true;
    state.set_status(format!("frame interval {}", state.config.frame_interval));
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    Ok(())
}

fn export_layout(state: &mut AppState) {
    let path = state.outputs.layout.clone();
    let Some(layout) = state.session.export_layout() else {
        state.set_status("nothing to export");
        return;
    };
    match write_json(&path, &layout) {
        Ok(()) => state.set_status(format!("layout written to {}", path.display())),
        Err(e) => state.set_status(format!("export failed: {e}")),
    }
}

fn export_state(state: &mut AppState) {
    let path = state.outputs.state.clone();
    match write_json(&path, &state.session.export_state()) {
        Ok(()) => state.set_status(format!("state written to {}", path.display())),
        Err(e) => state.set_status(format!("export failed: {e}")),
    }
}

// ── background input ────────────────────────────────────────────

/// Apply one event from the update stream.
pub fn handle_update(state: &mut AppState, event: UpdateEvent) {
    match event {
        UpdateEvent::Batch(batch) => apply_batch(state, &batch),
        UpdateEvent::Malformed { line, error } => {
            tracing::warn!("update line {line} ignored: {error}");
            state.set_status(format!("update line {line} ignored: {error}"));
        }
        UpdateEvent::Closed => {
            state.updates_open = false;
            state.set_status("update stream closed");
        }
    }
}

fn apply_batch(state: &mut AppState, batch: &Map<String, Value>) {
    let report = state.session.apply_state(batch);
    state.invalidate_preview();
    if report.is_clean() {
        state.set_status(format!("applied {} state updates", report.applied.len()));
    } else {
        state.set_status(format!(
            "applied {}, rejected {}: {}",
            report.applied.len(),
            report.rejected.len(),
            report.rejected[0]
        ));
    }
}

/// Track the background GIF job.
pub fn handle_finalize(state: &mut AppState, update: FinalizeUpdate) {
    match update {
        FinalizeUpdate::Progress(p) => {
            if let Some(gif) = state.gif.as_mut() {
                gif.fraction = p;
            }
        }
        FinalizeUpdate::Done(outcome) => {
            state.gif = None;
            match outcome {
                Ok(path) => state.set_status(format!("GIF written to {}", path.display())),
                Err(e) => state.set_status(format!("GIF failed: {e}")),
            }
        }
    }
}
