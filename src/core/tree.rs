//! In-memory resource tree with a name registry.
//!
//! Nodes live in an arena (the [`ResourceTree`] struct) and reference each
//! other by [`NodeId`].  Destroyed nodes leave a tombstone so that ids held by
//! the scene or the UI never alias a different resource.  The registry maps
//! every live node's unique name to its id.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use super::error::TreeError;
use super::geometry::{Coordinate, Rect, Size};
use super::kind::ResourceKind;

// ───────────────────────────────────────── node ──────────────

/// Index into the arena.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub name: String,
    /// Offset from the parent's origin (absolute for the root).
    pub location: Coordinate,
    pub size: Size,
    pub kind: ResourceKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Description fields no kind understands, re-emitted on export.
    pub extra: Map<String, Value>,
}

impl ResourceNode {
    pub fn new(name: impl Into<String>, kind: ResourceKind, location: Coordinate, size: Size) -> Self {
        Self {
            name: name.into(),
            location,
            size,
            kind,
            parent: None,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// `"{name} ({type})"`, shown when hovering a resource.
    pub fn tooltip(&self) -> String {
        format!("{} ({})", self.name, self.kind.type_name())
    }
}

// ───────────────────────────────────────── arena tree ────────

#[derive(Debug, Clone, Default)]
pub struct ResourceTree {
    nodes: Vec<Option<ResourceNode>>,
    registry: HashMap<String, NodeId>,
    root: Option<NodeId>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    /// Look a node up by name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.registry.get(name).copied()
    }

    /// Like [`find`](Self::find) but with a lookup error.
    pub fn lookup(&self, name: &str) -> Result<NodeId, TreeError> {
        self.find(name).ok_or_else(|| TreeError::NotFound(name.to_string()))
    }

    /// Number of registered (live) nodes.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn name_of(&self, id: NodeId) -> &str {
        self.get(id).map_or("<destroyed>", |n| n.name.as_str())
    }

    /// Add a node under `parent` (or as the root when `parent` is `None` and
    /// the tree has no root yet) and register it.
    pub fn insert(&mut self, mut node: ResourceNode, parent: Option<NodeId>) -> Result<NodeId, TreeError> {
        if self.registry.contains_key(&node.name) {
            return Err(TreeError::DuplicateName(node.name));
        }
        match parent {
            Some(pid) if self.get(pid).is_none() => {
                return Err(TreeError::NotFound(format!("#{pid}")));
            }
            None if self.root.is_some() => {
                return Err(TreeError::InvalidReparent {
                    child: node.name,
                    parent: "<none>".into(),
                });
            }
            _ => {}
        }

        let id = self.nodes.len();
        node.parent = parent;
        node.children.clear();
        self.registry.insert(node.name.clone(), id);
        self.nodes.push(Some(node));

        match parent {
            Some(pid) => {
                if let Some(p) = self.get_mut(pid) {
                    p.children.push(id);
                }
            }
            None => self.root = Some(id),
        }
        Ok(id)
    }

    /// Move `child` under `parent`, appending it to the parent's children.
    ///
    /// Rejects self-assignment and assignment below one of the child's own
    /// descendants; the tree is unchanged on error.
    pub fn assign_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if self.get(parent).is_none() {
            return Err(TreeError::NotFound(format!("#{parent}")));
        }
        if self.get(child).is_none() {
            return Err(TreeError::NotFound(format!("#{child}")));
        }
        if child == parent || self.is_ancestor(child, parent) {
            let err = TreeError::InvalidReparent {
                child: self.name_of(child).to_string(),
                parent: self.name_of(parent).to_string(),
            };
            tracing::warn!("{err}");
            return Err(err);
        }

        self.detach(child);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Unlink `child` from its parent's child list without unregistering it.
    fn detach(&mut self, child: NodeId) {
        let Some(old_parent) = self.get(child).and_then(|c| c.parent) else {
            return;
        };
        if let Some(p) = self.get_mut(old_parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
    }

    /// Destroy `id` and its whole subtree, removing every destroyed node from
    /// the registry.  Returns the number of nodes removed.
    pub fn destroy(&mut self, id: NodeId) -> Result<usize, TreeError> {
        if self.get(id).is_none() {
            return Err(TreeError::NotFound(format!("#{id}")));
        }
        self.detach(id);

        let doomed = self.descendants(id);
        for &nid in doomed.iter().rev() {
            if let Some(node) = self.nodes[nid].take() {
                if self.registry.get(&node.name) == Some(&nid) {
                    self.registry.remove(&node.name);
                }
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        tracing::debug!("destroyed {} node(s) rooted at #{id}", doomed.len());
        Ok(doomed.len())
    }

    /// Is `ancestor` on the parent chain of `id`?
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = self.get(id).and_then(|n| n.parent);
        while let Some(pid) = cur {
            if pid == ancestor {
                return true;
            }
            cur = self.get(pid).and_then(|n| n.parent);
        }
        false
    }

    /// Local offset plus every ancestor's offset.  Recomputed on each call.
    pub fn absolute_location(&self, id: NodeId) -> Option<Coordinate> {
        let mut node = self.get(id)?;
        let mut loc = node.location;
        while let Some(pid) = node.parent {
            node = self.get(pid)?;
            loc = loc.offset_by(node.location);
        }
        Some(loc)
    }

    /// Footprint of `id` in absolute deck coordinates.
    pub fn absolute_rect(&self, id: NodeId) -> Option<Rect> {
        let node = self.get(id)?;
        Some(Rect::at(self.absolute_location(id)?, node.size))
    }

    /// `id` followed by all of its descendants, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect(id, &mut out);
        out
    }

    fn collect(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.get(id) else {
            return;
        };
        out.push(id);
        for &child in &node.children {
            self.collect(child, out);
        }
    }

    /// All live nodes in pre-order from the root.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ResourceNode)> {
        self.root
            .map(|r| self.descendants(r))
            .unwrap_or_default()
            .into_iter()
            .filter_map(move |id| self.get(id).map(|n| (id, n)))
    }

    /// First node in pre-order matching `pred`.
    pub fn find_first(&self, pred: impl Fn(&ResourceNode) -> bool) -> Option<NodeId> {
        self.iter().find(|(_, n)| pred(n)).map(|(id, _)| id)
    }

    /// Change a node's name, keeping the registry in sync.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), TreeError> {
        let old = self
            .get(id)
            .map(|n| n.name.clone())
            .ok_or_else(|| TreeError::NotFound(format!("#{id}")))?;
        if old == new_name {
            return Ok(());
        }
        if self.registry.contains_key(new_name) {
            return Err(TreeError::DuplicateName(new_name.to_string()));
        }
        self.registry.remove(&old);
        self.registry.insert(new_name.to_string(), id);
        if let Some(n) = self.get_mut(id) {
            n.name = new_name.to_string();
        }
        Ok(())
    }

    /// Re-derive the names of grid children (`{grid}_{token}_{i}_{j}`) for
    /// every grid container in the subtree of `id`.  Returns how many nodes
    /// were renamed.
    pub fn refresh_grid_names(&mut self, id: NodeId) -> usize {
        let grids: Vec<NodeId> = self
            .descendants(id)
            .into_iter()
            .filter(|&nid| self.get(nid).is_some_and(|n| n.kind.grid().is_some()))
            .collect();
        grids.into_iter().map(|g| self.rename_grid_children(g)).sum()
    }

    fn rename_grid_children(&mut self, grid_id: NodeId) -> usize {
        let Some(grid_node) = self.get(grid_id) else {
            return 0;
        };
        let Some((grid, token)) = grid_node.kind.grid() else {
            return 0;
        };

        let ny = grid.num_items_y;
        if ny == 0 {
            return 0;
        }
        let cells = grid.num_items_x.saturating_mul(ny);

        let mut renames: Vec<(NodeId, String, String)> = Vec::new();
        for (idx, &child) in grid_node.children.iter().enumerate().take(cells) {
            let (i, j) = (idx / ny, idx % ny);
            let desired = format!("{}_{token}_{i}_{j}", grid_node.name);
            let current = self.name_of(child);
            if current != desired {
                renames.push((child, current.to_string(), desired));
            }
        }
        if renames.is_empty() {
            return 0;
        }

        // Names can rotate within one grid, so only nodes outside the batch
        // count as conflicts.
        let batch: HashSet<NodeId> = renames.iter().map(|(id, _, _)| *id).collect();
        if let Some((_, _, taken)) = renames.iter().find(|(_, _, desired)| {
            self.registry
                .get(desired)
                .is_some_and(|holder| !batch.contains(holder))
        }) {
            tracing::warn!(
                "not renaming children of {}: {taken} belongs to another resource",
                self.name_of(grid_id)
            );
            return 0;
        }

        for (child, old, _) in &renames {
            if self.registry.get(old) == Some(child) {
                self.registry.remove(old);
            }
        }
        for (child, _, desired) in &renames {
            self.registry.insert(desired.clone(), *child);
            if let Some(n) = self.get_mut(*child) {
                n.name = desired.clone();
            }
        }
        renames.len()
    }
}
