//! Custom Ratatui widget that renders a [`ResourceTree`] as an indented,
//! collapsible list with per-resource state.

use std::collections::HashSet;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, StatefulWidget, Widget},
};

use crate::core::kind::ResourceKind;
use crate::core::tree::{NodeId, ResourceNode, ResourceTree};

use super::theme::Theme;

// ───────────────────────────────────────── state ─────────────

/// Persistent state for the tree widget (selected index, scroll offset).
#[derive(Debug, Default)]
pub struct TreeWidgetState {
    /// Index into the *visible* flat list that is currently highlighted.
    pub selected: usize,
    /// Vertical scroll offset (first visible row).
    pub offset: usize,
}

impl TreeWidgetState {
    pub fn select_next(&mut self, max: usize) {
        if max > 0 && self.selected < max - 1 {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Keep the selection inside a list that may have shrunk.
    pub fn clamp_selection(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Ensure the selected row is visible within the viewport of `height` rows.
    pub fn clamp_scroll(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + height {
            self.offset = self.selected - height + 1;
        }
    }
}

// ───────────────────────────────────────── row model ─────────

/// One rendered row in the tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub node: NodeId,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// Flat list of rows: the root, then children of every expanded node.
pub fn visible_rows(tree: &ResourceTree, expanded: &HashSet<NodeId>) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    if let Some(root) = tree.root() {
        collect_rows(tree, expanded, root, 0, &mut rows);
    }
    rows
}

fn collect_rows(tree: &ResourceTree, expanded: &HashSet<NodeId>, id: NodeId, depth: usize, rows: &mut Vec<TreeRow>) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let is_expanded = expanded.contains(&id);
    rows.push(TreeRow {
        node: id,
        depth,
        has_children: !node.children.is_empty(),
        expanded: is_expanded,
    });
    if is_expanded {
        for &child in &node.children {
            collect_rows(tree, expanded, child, depth + 1, rows);
        }
    }
}

/// Short state summary shown after the type: volume for containers, tip
/// presence for tip spots.
pub fn state_summary(node: &ResourceNode) -> Option<String> {
    if let Some(c) = node.kind.container() {
        let volume = c.volume();
        return Some(if c.max_volume.is_finite() {
            format!("{volume:.1}/{:.0} µL", c.max_volume)
        } else {
            format!("{volume:.1} µL")
        });
    }
    node.kind
        .tip_state()
        .map(|t| if t.has_tip { "tip".to_string() } else { "empty".to_string() })
}

// ───────────────────────────────────────── widget ────────────

/// The tree widget itself; created fresh each frame.
pub struct ResourceTreeWidget<'a> {
    tree: &'a ResourceTree,
    expanded: &'a HashSet<NodeId>,
    dragging: Option<NodeId>,
    block: Option<Block<'a>>,
}

impl<'a> ResourceTreeWidget<'a> {
    pub fn new(tree: &'a ResourceTree, expanded: &'a HashSet<NodeId>) -> Self {
        Self {
            tree,
            expanded,
            dragging: None,
            block: None,
        }
    }

    /// Mark the resource currently being dragged.
    pub fn dragging(mut self, node: Option<NodeId>) -> Self {
        self.dragging = node;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl<'a> StatefulWidget for ResourceTreeWidget<'a> {
    type State = TreeWidgetState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let inner = if let Some(ref block) = self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let rows = visible_rows(self.tree, self.expanded);
        state.clamp_selection(rows.len());
        state.clamp_scroll(inner.height as usize);

        let visible = rows
            .iter()
            .enumerate()
            .skip(state.offset)
            .take(inner.height as usize);

        for (i, (row_idx, row)) in visible.enumerate() {
            let Some(node) = self.tree.get(row.node) else {
                continue;
            };
            let y = inner.y + i as u16;
            let is_selected = row_idx == state.selected;

            let icon = match (row.has_children, row.expanded) {
                (false, _) => "  ",
                (true, true) => "▼ ",
                (true, false) => "▶ ",
            };
            let name_style = if is_selected {
                Theme::selected_style()
            } else if Some(row.node) == self.dragging {
                Theme::drag_style()
            } else if matches!(node.kind, ResourceKind::Deck(_)) {
                Theme::deck_style()
            } else if row.has_children {
                Theme::parent_style()
            } else {
                Theme::leaf_style()
            };
            let dim = if is_selected {
                Theme::selected_style()
            } else {
                Theme::type_style()
            };

            let mut spans = vec![
                Span::raw("  ".repeat(row.depth)),
                Span::styled(format!("{icon}{}", node.name), name_style),
                Span::styled(format!(" {}", node.kind.type_name()), dim),
            ];
            if let Some(summary) = state_summary(node) {
                let style = if is_selected {
                    Theme::selected_style()
                } else {
                    Theme::state_style()
                };
                spans.push(Span::styled(format!("  {summary}"), style));
            }
            if Some(row.node) == self.dragging {
                spans.push(Span::styled("  (dragging)", Theme::drag_style()));
            }

            buf.set_line(inner.x, y, &Line::from(spans), inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serialize::load_json;

    #[test]
    fn only_expanded_nodes_show_children() {
        let mut t = ResourceTree::new();
        load_json(
            &mut t,
            r#"{"name": "deck", "children": [
                {"name": "a", "children": [{"name": "a1"}]},
                {"name": "b", "type": "Trough", "max_volume": 100, "liquids": [["w", 12.5]]}
            ]}"#,
        )
        .unwrap();
        let deck = t.find("deck").unwrap();
        let a = t.find("a").unwrap();

        let mut expanded = HashSet::new();
        assert_eq!(visible_rows(&t, &expanded).len(), 1);
        expanded.insert(deck);
        let rows = visible_rows(&t, &expanded);
        assert_eq!(rows.len(), 3);
        assert!(rows[1].has_children && !rows[1].expanded);
        expanded.insert(a);
        let rows = visible_rows(&t, &expanded);
        assert_eq!(rows.iter().map(|r| r.depth).collect::<Vec<_>>(), [0, 1, 2, 1]);

        let b = t.get(t.find("b").unwrap()).unwrap();
        assert_eq!(state_summary(b).as_deref(), Some("12.5/100 µL"));
    }
}
