//! Node groups - rectangular overlays on the graph canvas
//!
//! A group is pure geometry: a titled, colored rectangle drawn behind a set
//! of nodes. Groups never touch the dataflow graph. Which nodes belong to a
//! group is derived on demand from the node's center point and the group's
//! stored bounds, so moving a node in or out of a rectangle changes its
//! membership without any bookkeeping.
//!
//! The [`GroupLayer`] owns every group of one canvas together with the
//! pointer interaction (select, drag, resize) active on it. At most one group
//! in the whole process is being dragged or resized at any time: a layer must
//! hold the process-wide interaction claim to enter `Dragging` or `Resizing`.
//!
//! # Example
//!
//! ```ignore
//! let mut layer = GroupLayer::new(GroupLayoutConfig::default());
//! let selected: Vec<&GraphNode> = graph.nodes().iter().take(2).collect();
//! let group_id = layer.create_group("Inputs", selected).id.clone();
//!
//! for node in layer.members(&group_id, graph.nodes())? {
//!     println!("{} is inside", node.id);
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::GroupLayoutConfig;
use crate::constants::defaults;
use crate::error::{FlowError, Result};
use crate::geometry::{Point, Rect, Size};
use crate::types::GraphNode;

/// A rectangular overlay grouping nodes on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
    /// Unique identifier for this group
    pub id: String,
    /// Text shown in the title bar
    pub title: String,
    /// Fill color of the group
    pub color: String,
    /// Authoritative geometry; kept unchanged while collapsed
    pub bounds: Rect,
    /// Whether the group is drawn as its title bar only
    #[serde(default)]
    pub is_collapsed: bool,
}

impl NodeGroup {
    pub fn new(id: impl Into<String>, title: impl Into<String>, bounds: Rect) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            color: defaults::GROUP_COLOR.to_string(),
            bounds,
            is_collapsed: false,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Bounds used for drawing and hit testing.
    ///
    /// A collapsed group substitutes `collapsed_height`; the stored height is
    /// restored untouched on expand.
    pub fn effective_bounds(&self, collapsed_height: f64) -> Rect {
        if self.is_collapsed {
            Rect {
                height: collapsed_height,
                ..self.bounds
            }
        } else {
            self.bounds
        }
    }

    /// Flip the collapsed flag, returning the new value
    pub fn toggle_collapsed(&mut self) -> bool {
        self.is_collapsed = !self.is_collapsed;
        self.is_collapsed
    }

    /// Translate the group by a canvas-space delta
    pub fn move_by(&mut self, delta: Point) {
        self.bounds = self.bounds.translated(delta);
    }

    /// Resize from `handle` by a canvas-space delta, keeping the opposite
    /// edges fixed when the minimum size clamps.
    pub fn resize_by(&mut self, handle: ResizeHandle, delta: Point, min: Size) {
        self.bounds = resize_bounds(self.bounds, handle, delta, min);
    }
}

/// Smallest rectangle enclosing `nodes`, inflated by `padding` on every side
/// and by `title_height` above.
///
/// An empty selection yields the default rectangle `{0, 0, 300, 200}`.
pub fn compute_bounds<'a>(
    nodes: impl IntoIterator<Item = &'a GraphNode>,
    padding: f64,
    title_height: f64,
) -> Rect {
    let Some(enclosing) = nodes
        .into_iter()
        .map(GraphNode::bounds)
        .reduce(|acc, rect| acc.union(&rect))
    else {
        return default_group_bounds();
    };

    Rect::new(
        enclosing.x - padding,
        enclosing.y - padding - title_height,
        enclosing.width + padding * 2.0,
        enclosing.height + padding * 2.0 + title_height,
    )
}

/// Rectangle given to a group that encloses no nodes
pub fn default_group_bounds() -> Rect {
    Rect::new(
        defaults::GROUP_DEFAULT_X,
        defaults::GROUP_DEFAULT_Y,
        defaults::GROUP_DEFAULT_WIDTH,
        defaults::GROUP_DEFAULT_HEIGHT,
    )
}

/// Whether the node's center lies inside the group's stored bounds
pub fn is_member(node: &GraphNode, group: &NodeGroup) -> bool {
    group.bounds.contains(node.center())
}

/// One of the eight compass resize handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NW,
        ResizeHandle::N,
        ResizeHandle::NE,
        ResizeHandle::E,
        ResizeHandle::SE,
        ResizeHandle::S,
        ResizeHandle::SW,
        ResizeHandle::W,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeHandle::N => "n",
            ResizeHandle::S => "s",
            ResizeHandle::E => "e",
            ResizeHandle::W => "w",
            ResizeHandle::NE => "ne",
            ResizeHandle::NW => "nw",
            ResizeHandle::SE => "se",
            ResizeHandle::SW => "sw",
        }
    }

    fn north(&self) -> bool {
        matches!(self, ResizeHandle::N | ResizeHandle::NE | ResizeHandle::NW)
    }

    fn south(&self) -> bool {
        matches!(self, ResizeHandle::S | ResizeHandle::SE | ResizeHandle::SW)
    }

    fn east(&self) -> bool {
        matches!(self, ResizeHandle::E | ResizeHandle::NE | ResizeHandle::SE)
    }

    fn west(&self) -> bool {
        matches!(self, ResizeHandle::W | ResizeHandle::NW | ResizeHandle::SW)
    }

    /// Center of this handle on `rect`
    pub fn anchor_on(&self, rect: &Rect) -> Point {
        let x = if self.west() {
            rect.x
        } else if self.east() {
            rect.right()
        } else {
            rect.x + rect.width / 2.0
        };
        let y = if self.north() {
            rect.y
        } else if self.south() {
            rect.bottom()
        } else {
            rect.y + rect.height / 2.0
        };
        Point::new(x, y)
    }
}

impl std::fmt::Display for ResizeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply one resize step to `bounds`.
///
/// North and west handles move the origin; when the minimum size clamps,
/// the origin is re-derived from the fixed south/east edge.
pub fn resize_bounds(bounds: Rect, handle: ResizeHandle, delta: Point, min: Size) -> Rect {
    let mut next = bounds;

    if handle.east() {
        next.width = (bounds.width + delta.x).max(min.width);
    }
    if handle.west() {
        next.width = bounds.width - delta.x;
        next.x = bounds.x + delta.x;
        if next.width < min.width {
            next.width = min.width;
            next.x = bounds.right() - min.width;
        }
    }
    if handle.south() {
        next.height = (bounds.height + delta.y).max(min.height);
    }
    if handle.north() {
        next.height = bounds.height - delta.y;
        next.y = bounds.y + delta.y;
        if next.height < min.height {
            next.height = min.height;
            next.y = bounds.bottom() - min.height;
        }
    }

    next
}

/// Part of a group under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// The draggable title bar
    Title,
    /// A resize handle
    Handle(ResizeHandle),
    /// Anywhere else inside the group
    Body,
}

/// Result of a hit test against the group layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHit {
    pub group_id: String,
    pub target: HitTarget,
}

/// The single pointer interaction of a group layer
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GroupInteraction {
    #[default]
    Idle,
    Selected {
        group_id: String,
    },
    Dragging {
        group_id: String,
        last: Point,
    },
    Resizing {
        group_id: String,
        handle: ResizeHandle,
        last: Point,
    },
}

impl GroupInteraction {
    /// Group currently selected or being manipulated
    pub fn group_id(&self) -> Option<&str> {
        match self {
            GroupInteraction::Idle => None,
            GroupInteraction::Selected { group_id }
            | GroupInteraction::Dragging { group_id, .. }
            | GroupInteraction::Resizing { group_id, .. } => Some(group_id),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            GroupInteraction::Dragging { .. } | GroupInteraction::Resizing { .. }
        )
    }

    /// The same interaction with any drag or resize ended
    fn settled(self) -> Self {
        match self {
            GroupInteraction::Dragging { group_id, .. }
            | GroupInteraction::Resizing { group_id, .. } => {
                GroupInteraction::Selected { group_id }
            }
            other => other,
        }
    }
}

/// Id of the layer currently dragging or resizing a group; 0 when none
static ACTIVE_LAYER: AtomicU64 = AtomicU64::new(0);
static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// All groups of one canvas plus the interaction running on them
#[derive(Debug)]
pub struct GroupLayer {
    id: u64,
    groups: Vec<NodeGroup>,
    layout: GroupLayoutConfig,
    interaction: GroupInteraction,
}

impl Default for GroupLayer {
    fn default() -> Self {
        Self::new(GroupLayoutConfig::default())
    }
}

/// A clone is a separate layer: it keeps the selection but not an ongoing
/// drag or resize.
impl Clone for GroupLayer {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed),
            groups: self.groups.clone(),
            layout: self.layout.clone(),
            interaction: self.interaction.clone().settled(),
        }
    }
}

impl Drop for GroupLayer {
    fn drop(&mut self) {
        self.release_claim();
    }
}

impl GroupLayer {
    pub fn new(layout: GroupLayoutConfig) -> Self {
        Self::with_groups(Vec::new(), layout)
    }

    /// Layer restored from persisted groups
    pub fn with_groups(groups: Vec<NodeGroup>, layout: GroupLayoutConfig) -> Self {
        Self {
            id: NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed),
            groups,
            layout,
            interaction: GroupInteraction::Idle,
        }
    }

    /// Whether this layer holds the process-wide drag/resize claim
    pub fn holds_interaction(&self) -> bool {
        ACTIVE_LAYER.load(Ordering::Acquire) == self.id
    }

    fn try_claim(&self) -> bool {
        match ACTIVE_LAYER.compare_exchange(0, self.id, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => true,
            Err(holder) => holder == self.id,
        }
    }

    fn release_claim(&self) {
        let _ = ACTIVE_LAYER.compare_exchange(self.id, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Single entry point for interaction changes.
    ///
    /// A drag or resize only starts when the claim is free or already ours;
    /// otherwise the group is just selected. Leaving an active state releases
    /// the claim.
    fn set_interaction(&mut self, next: GroupInteraction) {
        self.interaction = if next.is_active() && !self.try_claim() {
            log::debug!(
                "Another group is being manipulated; selecting {:?} instead",
                next.group_id()
            );
            next.settled()
        } else {
            next
        };
        if !self.interaction.is_active() {
            self.release_claim();
        }
    }

    pub fn layout(&self) -> &GroupLayoutConfig {
        &self.layout
    }

    /// Groups in drawing order, bottom first
    pub fn groups(&self) -> &[NodeGroup] {
        &self.groups
    }

    pub fn get(&self, group_id: &str) -> Option<&NodeGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    fn get_mut(&mut self, group_id: &str) -> Result<&mut NodeGroup> {
        self.groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| FlowError::GroupNotFound(group_id.to_string()))
    }

    pub fn interaction(&self) -> &GroupInteraction {
        &self.interaction
    }

    /// Currently selected group, if any
    pub fn selected(&self) -> Option<&str> {
        self.interaction.group_id()
    }

    /// Bounds enclosing `nodes` under this layer's layout policy
    pub fn bounds_for<'a>(&self, nodes: impl IntoIterator<Item = &'a GraphNode>) -> Rect {
        compute_bounds(nodes, self.layout.padding, self.layout.title_height)
    }

    /// Create a group enclosing the selected nodes and put it on top
    pub fn create_group<'a>(
        &mut self,
        title: impl Into<String>,
        nodes: impl IntoIterator<Item = &'a GraphNode>,
    ) -> &NodeGroup {
        let bounds = self.bounds_for(nodes);
        let group = NodeGroup::new(format!("group-{}", uuid::Uuid::new_v4()), title, bounds)
            .with_color(self.layout.default_color.clone());
        log::debug!("Created group '{}' at {:?}", group.id, group.bounds);
        self.groups.push(group);
        &self.groups[self.groups.len() - 1]
    }

    /// Add an existing group on top of the others
    pub fn insert(&mut self, group: NodeGroup) {
        self.groups.push(group);
    }

    /// Remove a group. Member nodes are not affected.
    pub fn remove_group(&mut self, group_id: &str) -> Result<NodeGroup> {
        let index = self
            .groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| FlowError::GroupNotFound(group_id.to_string()))?;
        if self.interaction.group_id() == Some(group_id) {
            self.set_interaction(GroupInteraction::Idle);
        }
        Ok(self.groups.remove(index))
    }

    /// Nodes whose center currently lies inside the group
    pub fn members<'a>(
        &self,
        group_id: &str,
        nodes: impl IntoIterator<Item = &'a GraphNode>,
    ) -> Result<Vec<&'a GraphNode>> {
        let group = self
            .get(group_id)
            .ok_or_else(|| FlowError::GroupNotFound(group_id.to_string()))?;
        Ok(nodes.into_iter().filter(|n| is_member(n, group)).collect())
    }

    /// Groups the node currently belongs to
    pub fn groups_containing(&self, node: &GraphNode) -> Vec<&NodeGroup> {
        self.groups.iter().filter(|g| is_member(node, g)).collect()
    }

    pub fn set_title(&mut self, group_id: &str, title: impl Into<String>) -> Result<()> {
        self.get_mut(group_id)?.title = title.into();
        Ok(())
    }

    pub fn set_color(&mut self, group_id: &str, color: impl Into<String>) -> Result<()> {
        self.get_mut(group_id)?.color = color.into();
        Ok(())
    }

    /// Toggle collapse, returning the new state
    pub fn toggle_collapsed(&mut self, group_id: &str) -> Result<bool> {
        let collapsed = self.get_mut(group_id)?.toggle_collapsed();
        // Handles vanish with the body, so a resize cannot continue
        let resizing_this = matches!(
            &self.interaction,
            GroupInteraction::Resizing { group_id: active, .. } if active == group_id
        );
        if collapsed && resizing_this {
            let settled = self.interaction.clone().settled();
            self.set_interaction(settled);
        }
        Ok(collapsed)
    }

    /// Drawn bounds of a group
    pub fn effective_bounds(&self, group_id: &str) -> Option<Rect> {
        self.get(group_id)
            .map(|g| g.effective_bounds(self.layout.collapsed_height))
    }

    /// Find the topmost group part under a canvas point.
    ///
    /// Handles are checked first and only exist on expanded groups; the
    /// title bar is the top `title_height` of the effective bounds.
    pub fn hit_test(&self, point: Point) -> Option<GroupHit> {
        let half = self.layout.handle_radius;
        for group in self.groups.iter().rev() {
            let bounds = group.effective_bounds(self.layout.collapsed_height);

            if !group.is_collapsed {
                let handle = ResizeHandle::ALL.into_iter().find(|handle| {
                    let anchor = handle.anchor_on(&bounds);
                    (point.x - anchor.x).abs() <= half && (point.y - anchor.y).abs() <= half
                });
                if let Some(handle) = handle {
                    return Some(GroupHit {
                        group_id: group.id.clone(),
                        target: HitTarget::Handle(handle),
                    });
                }
            }

            if bounds.contains(point) {
                let target = if point.y <= bounds.y + self.layout.title_height {
                    HitTarget::Title
                } else {
                    HitTarget::Body
                };
                return Some(GroupHit {
                    group_id: group.id.clone(),
                    target,
                });
            }
        }
        None
    }

    /// Pointer pressed at `canvas` (hit testing) / `screen` (delta reference).
    ///
    /// - title bar: select and start dragging
    /// - handle of the selected group: start resizing
    /// - any other part of a group: select it
    /// - empty canvas: clear the selection
    ///
    /// While another layer is dragging or resizing, a title or handle press
    /// only selects.
    pub fn pointer_down(&mut self, canvas: Point, screen: Point) -> &GroupInteraction {
        let hit = self.hit_test(canvas);
        let next = match hit {
            None => GroupInteraction::Idle,
            Some(GroupHit {
                group_id,
                target: HitTarget::Title,
            }) => GroupInteraction::Dragging {
                group_id,
                last: screen,
            },
            Some(GroupHit {
                group_id,
                target: HitTarget::Handle(handle),
            }) if self.selected() == Some(group_id.as_str()) => GroupInteraction::Resizing {
                group_id,
                handle,
                last: screen,
            },
            Some(GroupHit { group_id, .. }) => GroupInteraction::Selected { group_id },
        };
        self.set_interaction(next);
        log::trace!("Group pointer down -> {:?}", self.interaction);
        &self.interaction
    }

    /// Pointer moved to `screen`; the delta since the last event is divided
    /// by `zoom` and applied to the active group.
    ///
    /// Returns the updated bounds when a drag or resize is in progress.
    pub fn pointer_move(&mut self, screen: Point, zoom: f64) -> Option<Rect> {
        let (group_id, handle, last) = match &mut self.interaction {
            GroupInteraction::Dragging { group_id, last } => (group_id.clone(), None, last),
            GroupInteraction::Resizing {
                group_id,
                handle,
                last,
            } => (group_id.clone(), Some(*handle), last),
            _ => return None,
        };
        let delta = screen.delta_from(*last).unzoom(zoom);
        *last = screen;

        let min = Size::new(self.layout.min_width, self.layout.min_height);
        match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => {
                match handle {
                    None => group.move_by(delta),
                    Some(handle) => group.resize_by(handle, delta, min),
                }
                Some(group.bounds)
            }
            None => {
                log::warn!("Active group '{}' disappeared; ending interaction", group_id);
                self.set_interaction(GroupInteraction::Idle);
                None
            }
        }
    }

    /// Pointer released: an active drag or resize ends, keeping the selection
    pub fn pointer_up(&mut self) -> &GroupInteraction {
        let settled = self.interaction.clone().settled();
        self.set_interaction(settled);
        &self.interaction
    }

    /// Drop the selection and any interaction
    pub fn clear_selection(&mut self) {
        self.set_interaction(GroupInteraction::Idle);
    }
}
