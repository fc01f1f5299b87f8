//! 组件树
//!
//! 保留模式的组件树：节点存放在一个 arena 中，通过 `ComponentId` 互相引用。
//! 每个节点持有整数像素边界、可见性、脏标记和光标提示，行为由
//! [`Component`] trait 对象提供。

pub mod gesture;
pub mod surface;

use crate::error::{SequencerError, SequencerResult};
use egui::{pos2, vec2, CursorIcon, Pos2, Rect};
use surface::{PaintTarget, Surface};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub usize);

/// Integral pixel bounds relative to the parent component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    /// Fractional inputs are rounded up to whole pixels.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: x.ceil() as i32,
            y: y.ceil() as i32,
            width: width.max(0.0).ceil() as i32,
            height: height.max(0.0).ceil() as i32,
        }
    }

    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_min_size(
            pos2(self.x as f32, self.y as f32),
            vec2(self.width as f32, self.height as f32),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn remove_from_left(&mut self, amount: f32) -> Bounds {
        let amount = (amount.ceil() as i32).clamp(0, self.width);
        let removed = Bounds { width: amount, ..*self };
        self.x += amount;
        self.width -= amount;
        removed
    }

    pub fn remove_from_top(&mut self, amount: f32) -> Bounds {
        let amount = (amount.ceil() as i32).clamp(0, self.height);
        let removed = Bounds { height: amount, ..*self };
        self.y += amount;
        self.height -= amount;
        removed
    }

    pub fn remove_from_bottom(&mut self, amount: f32) -> Bounds {
        let amount = (amount.ceil() as i32).clamp(0, self.height);
        self.height -= amount;
        Bounds {
            y: self.y + self.height,
            height: amount,
            ..*self
        }
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    /// Disables snapping while dragging.
    pub option: bool,
}

/// Pointer event as delivered to component hooks. Positions are in the
/// root coordinate space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouseEvent {
    pub position: Pos2,
    pub position_at_mouse_down: Option<Pos2>,
    pub pressed_component: Option<ComponentId>,
    pub was_dragged: bool,
    pub is_dragging: bool,
    pub modifiers: Modifiers,
}

impl MouseEvent {
    /// Pointer offset since the press, zero outside a gesture.
    pub fn drag_delta(&self) -> egui::Vec2 {
        self.position_at_mouse_down
            .map(|down| self.position - down)
            .unwrap_or(egui::Vec2::ZERO)
    }
}

/// Behaviour of one node. Only `render` is mandatory.
#[allow(unused_variables)]
pub trait Component<M> {
    fn resized(&mut self, ctx: &mut EventCtx<'_, M>) {}
    fn render(&self, ctx: &RenderCtx<'_, M>, surface: &mut dyn Surface);
    fn mouse_moved(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn mouse_enter(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn mouse_exit(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn mouse_pressed(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn mouse_released(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn mouse_dragged(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn clicked(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn double_pressed(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
    fn double_clicked(&mut self, ctx: &mut EventCtx<'_, M>, event: &MouseEvent) {}
}

struct Node<M> {
    name: &'static str,
    bounds: Bounds,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
    visible: bool,
    dirty: bool,
    hovered: bool,
    being_dragged: bool,
    cursor: CursorIcon,
    // Taken out while one of its hooks runs.
    behavior: Option<Box<dyn Component<M>>>,
}

pub struct ComponentTree<M> {
    nodes: Vec<Node<M>>,
    root: Option<ComponentId>,
    render_requested: bool,
}

impl<M> Default for ComponentTree<M> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            render_requested: false,
        }
    }
}

impl<M: 'static> ComponentTree<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached node.
    pub fn insert(&mut self, name: &'static str, component: impl Component<M> + 'static) -> ComponentId {
        let id = ComponentId(self.nodes.len());
        self.nodes.push(Node {
            name,
            bounds: Bounds::default(),
            parent: None,
            children: Vec::new(),
            visible: true,
            dirty: true,
            hovered: false,
            being_dragged: false,
            cursor: CursorIcon::Default,
            behavior: Some(Box::new(component)),
        });
        id
    }

    pub fn set_root(&mut self, id: ComponentId) -> SequencerResult<()> {
        let node = self.node(id)?;
        if node.parent.is_some() {
            return Err(SequencerError::AlreadyParented(id));
        }
        self.root = Some(id);
        Ok(())
    }

    pub fn root(&self) -> Option<ComponentId> {
        self.root
    }

    fn node(&self, id: ComponentId) -> SequencerResult<&Node<M>> {
        self.nodes.get(id.0).ok_or(SequencerError::UnknownComponent(id))
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn name(&self, id: ComponentId) -> &'static str {
        self.nodes.get(id.0).map_or("?", |n| n.name)
    }

    /// Attaches `child` as the front-most child of `parent` and makes it
    /// visible. Fails if the child already has a parent.
    pub fn add_child(&mut self, parent: ComponentId, child: ComponentId) -> SequencerResult<()> {
        self.node(parent)?;
        if self.node(child)?.parent.is_some() || self.root == Some(child) {
            return Err(SequencerError::AlreadyParented(child));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(SequencerError::Cycle(child));
            }
            cursor = self.nodes[id.0].parent;
        }

        let node = &mut self.nodes[child.0];
        node.parent = Some(parent);
        node.visible = true;
        node.dirty = true;
        self.nodes[parent.0].children.push(child);
        log::trace!("attached {} under {}", self.name(child), self.name(parent));
        Ok(())
    }

    /// Detaches `child` from `parent`. The child becomes invisible.
    pub fn remove_child(&mut self, parent: ComponentId, child: ComponentId) -> bool {
        let Some(parent_node) = self.nodes.get_mut(parent.0) else {
            return false;
        };
        let Some(index) = parent_node.children.iter().position(|c| *c == child) else {
            return false;
        };
        parent_node.children.remove(index);
        let node = &mut self.nodes[child.0];
        node.parent = None;
        node.visible = false;
        node.hovered = false;
        true
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Moves a node to the end of its parent's child list so it is drawn
    /// last and hit first.
    pub fn to_front(&mut self, id: ComponentId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let children = &mut self.nodes[parent.0].children;
        if let Some(index) = children.iter().position(|c| *c == id) {
            let child = children.remove(index);
            children.push(child);
        }
    }

    pub fn bounds(&self, id: ComponentId) -> Bounds {
        self.nodes.get(id.0).map(|n| n.bounds).unwrap_or_default()
    }

    /// Absolute position, summing all parent offsets.
    pub fn position(&self, id: ComponentId) -> Pos2 {
        let mut x = 0;
        let mut y = 0;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current.0) else {
                break;
            };
            x += node.bounds.x;
            y += node.bounds.y;
            cursor = node.parent;
        }
        pos2(x as f32, y as f32)
    }

    pub fn absolute_rect(&self, id: ComponentId) -> Rect {
        let bounds = self.bounds(id);
        Rect::from_min_size(
            self.position(id),
            vec2(bounds.width as f32, bounds.height as f32),
        )
    }

    /// Updates the bounds and runs the node's `resized` hook.
    pub fn set_bounds(&mut self, id: ComponentId, bounds: Bounds, model: &mut M) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        node.bounds = bounds;
        node.dirty = true;
        self.dispatch(id, model, |component, ctx| component.resized(ctx));
    }

    pub fn is_visible(&self, id: ComponentId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.visible)
    }

    pub fn set_visible(&mut self, id: ComponentId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.visible = visible;
        }
        self.repaint(self.parent(id).unwrap_or(id));
    }

    pub fn is_hovered(&self, id: ComponentId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.hovered)
    }

    pub fn is_being_dragged(&self, id: ComponentId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.being_dragged)
    }

    pub fn cursor(&self, id: ComponentId) -> CursorIcon {
        self.nodes.get(id.0).map_or(CursorIcon::Default, |n| n.cursor)
    }

    pub fn set_cursor(&mut self, id: ComponentId, cursor: CursorIcon) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.cursor = cursor;
        }
    }

    /// Visible and `point` inside the absolute bounds, edges included.
    pub fn hit_test(&self, id: ComponentId, point: Pos2) -> bool {
        let Some(node) = self.nodes.get(id.0) else {
            return false;
        };
        if !node.visible {
            return false;
        }
        let pos = self.position(id);
        point.x >= pos.x
            && point.x <= pos.x + node.bounds.width as f32
            && point.y >= pos.y
            && point.y <= pos.y + node.bounds.height as f32
    }

    /// Deepest visible descendant under `point`, later children first.
    pub fn find_component_at(&self, id: ComponentId, point: Pos2) -> ComponentId {
        for child in self.children(id).iter().rev() {
            if self.hit_test(*child, point) {
                return self.find_component_at(*child, point);
            }
        }
        id
    }

    /// Marks the node and its descendants dirty and requests a render when
    /// the node is attached to the root.
    pub fn repaint(&mut self, id: ComponentId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0) {
                node.dirty = true;
                stack.extend(node.children.iter().copied());
            }
        }

        let mut top = id;
        while let Some(parent) = self.parent(top) {
            top = parent;
        }
        if self.root == Some(top) {
            self.render_requested = true;
        }
    }

    pub fn is_dirty(&self, id: ComponentId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.dirty)
    }

    pub fn render_requested(&self) -> bool {
        self.render_requested
    }

    /// Visible nodes reachable from the root, parents before children.
    pub fn paint_order(&self) -> Vec<ComponentId> {
        let mut order = Vec::new();
        if let Some(root) = self.root {
            self.collect_visible(root, &mut order);
        }
        order
    }

    fn collect_visible(&self, id: ComponentId, out: &mut Vec<ComponentId>) {
        if !self.is_visible(id) {
            return;
        }
        out.push(id);
        for child in self.children(id) {
            self.collect_visible(*child, out);
        }
    }

    /// Renders every dirty node with a positive size into its own layer
    /// and clears the flags. Returns the number of rendered layers.
    pub fn paint(&mut self, model: &M, target: &mut dyn PaintTarget) -> usize {
        let order = self.paint_order();
        let mut painted = 0;
        for &id in &order {
            let node = &self.nodes[id.0];
            if !node.dirty {
                continue;
            }
            if node.bounds.is_empty() {
                target.discard_layer(id);
                continue;
            }
            let Some(behavior) = node.behavior.as_ref() else {
                continue;
            };
            let rect = self.absolute_rect(id);
            let surface = target.begin_layer(id, rect);
            let ctx = RenderCtx {
                id,
                tree: self,
                model,
            };
            behavior.render(&ctx, surface);
            painted += 1;
        }
        for id in order {
            self.nodes[id.0].dirty = false;
        }
        self.render_requested = false;
        painted
    }

    /// Runs `f` with the node's behaviour temporarily taken out of the
    /// arena. Returns `None` for unknown nodes or nested dispatch.
    pub fn dispatch<R>(
        &mut self,
        id: ComponentId,
        model: &mut M,
        f: impl FnOnce(&mut dyn Component<M>, &mut EventCtx<'_, M>) -> R,
    ) -> Option<R> {
        let mut behavior = self.nodes.get_mut(id.0)?.behavior.take()?;
        let result = {
            let mut ctx = EventCtx {
                id,
                tree: self,
                model,
            };
            f(behavior.as_mut(), &mut ctx)
        };
        self.nodes[id.0].behavior = Some(behavior);
        Some(result)
    }

    pub(crate) fn set_hover_state(&mut self, id: ComponentId, entering: bool, event: &MouseEvent) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.hovered = if event.is_dragging {
                event.pressed_component == Some(id)
            } else {
                entering
            };
        }
    }

    pub(crate) fn set_being_dragged(&mut self, id: ComponentId, event: &MouseEvent) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.being_dragged = event.is_dragging && event.pressed_component == Some(id);
        }
    }
}

/// Context handed to event hooks: the node's place in the tree plus the
/// shared model.
pub struct EventCtx<'a, M> {
    id: ComponentId,
    pub tree: &'a mut ComponentTree<M>,
    pub model: &'a mut M,
}

impl<'a, M: 'static> EventCtx<'a, M> {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn position(&self) -> Pos2 {
        self.tree.position(self.id)
    }

    pub fn bounds(&self) -> Bounds {
        self.tree.bounds(self.id)
    }

    pub fn width(&self) -> f32 {
        self.bounds().width as f32
    }

    pub fn height(&self) -> f32 {
        self.bounds().height as f32
    }

    pub fn absolute_rect(&self) -> Rect {
        self.tree.absolute_rect(self.id)
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.tree.parent(self.id)
    }

    pub fn is_hovered(&self) -> bool {
        self.tree.is_hovered(self.id)
    }

    pub fn repaint(&mut self) {
        self.tree.repaint(self.id);
    }

    /// Repaints the parent, or this node when it is the root.
    pub fn repaint_parent(&mut self) {
        let target = self.parent().unwrap_or(self.id);
        self.tree.repaint(target);
    }

    pub fn set_cursor(&mut self, cursor: CursorIcon) {
        self.tree.set_cursor(self.id, cursor);
    }

    pub fn set_child_bounds(&mut self, child: ComponentId, bounds: Bounds) {
        self.tree.set_bounds(child, bounds, self.model);
    }
}

/// Read-only context handed to `render`.
pub struct RenderCtx<'a, M> {
    id: ComponentId,
    pub tree: &'a ComponentTree<M>,
    pub model: &'a M,
}

impl<'a, M: 'static> RenderCtx<'a, M> {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn position(&self) -> Pos2 {
        self.tree.position(self.id)
    }

    pub fn width(&self) -> f32 {
        self.tree.bounds(self.id).width as f32
    }

    pub fn height(&self) -> f32 {
        self.tree.bounds(self.id).height as f32
    }

    pub fn is_hovered(&self) -> bool {
        self.tree.is_hovered(self.id)
    }

    pub fn is_being_dragged(&self) -> bool {
        self.tree.is_being_dragged(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::surface::LayerStore;
    use super::*;

    struct Probe;

    impl Component<Vec<String>> for Probe {
        fn render(&self, _ctx: &RenderCtx<'_, Vec<String>>, surface: &mut dyn Surface) {
            let size = surface.size();
            surface.fill_rect(Rect::from_min_size(Pos2::ZERO, size), egui::Color32::RED);
        }

        fn resized(&mut self, ctx: &mut EventCtx<'_, Vec<String>>) {
            let name = ctx.tree.name(ctx.id());
            ctx.model.push(format!("resized {name}"));
        }
    }

    fn tree() -> (ComponentTree<Vec<String>>, ComponentId, ComponentId, ComponentId) {
        let mut tree = ComponentTree::new();
        let root = tree.insert("root", Probe);
        let a = tree.insert("a", Probe);
        let b = tree.insert("b", Probe);
        tree.set_root(root).unwrap();
        tree.add_child(root, a).unwrap();
        tree.add_child(root, b).unwrap();
        (tree, root, a, b)
    }

    #[test]
    fn bounds_carving() {
        let mut area = Bounds::from_size(200.0, 100.0);
        let left = area.remove_from_left(40.0);
        let top = area.remove_from_top(30.5);
        let bottom = area.remove_from_bottom(500.0);
        assert_eq!(left, Bounds { x: 0, y: 0, width: 40, height: 100 });
        assert_eq!(top, Bounds { x: 40, y: 0, width: 160, height: 31 });
        assert_eq!(bottom, Bounds { x: 40, y: 31, width: 160, height: 69 });
        assert_eq!(area.height, 0);
        assert!(left.intersects(&Bounds { x: 39, y: 99, width: 5, height: 5 }));
        assert!(!left.intersects(&top));
    }

    #[test]
    fn attaching_twice_fails() {
        let (mut tree, root, a, b) = tree();
        assert!(matches!(tree.add_child(b, a), Err(SequencerError::AlreadyParented(id)) if id == a));
        assert!(matches!(tree.add_child(a, root), Err(SequencerError::AlreadyParented(_))));
        let c = tree.insert("c", Probe);
        tree.add_child(a, c).unwrap();
        assert!(tree.remove_child(root, a));
        assert!(!tree.is_visible(a));
        assert!(matches!(tree.add_child(c, a), Err(SequencerError::Cycle(_))));
        tree.add_child(b, a).unwrap();
        assert!(tree.is_visible(a));
    }

    #[test]
    fn later_children_win_hit_tests() {
        let (mut tree, root, a, b) = tree();
        let mut log = Vec::new();
        tree.set_bounds(root, Bounds::from_size(100.0, 100.0), &mut log);
        tree.set_bounds(a, Bounds::new(10.0, 10.0, 50.0, 50.0), &mut log);
        tree.set_bounds(b, Bounds::new(30.0, 30.0, 50.0, 50.0), &mut log);
        assert_eq!(log, ["resized root", "resized a", "resized b"]);

        assert_eq!(tree.find_component_at(root, pos2(40.0, 40.0)), b);
        assert_eq!(tree.find_component_at(root, pos2(15.0, 15.0)), a);
        assert_eq!(tree.find_component_at(root, pos2(95.0, 5.0)), root);
        // Edges are inclusive.
        assert!(tree.hit_test(a, pos2(60.0, 60.0)));

        tree.to_front(a);
        assert_eq!(tree.find_component_at(root, pos2(40.0, 40.0)), a);

        tree.set_visible(a, false);
        assert_eq!(tree.find_component_at(root, pos2(40.0, 40.0)), b);
    }

    #[test]
    fn nested_positions_are_absolute() {
        let (mut tree, root, a, _) = tree();
        let c = tree.insert("c", Probe);
        tree.add_child(a, c).unwrap();
        let mut log = Vec::new();
        tree.set_bounds(root, Bounds::new(5.0, 5.0, 100.0, 100.0), &mut log);
        tree.set_bounds(a, Bounds::new(10.0, 20.0, 50.0, 50.0), &mut log);
        tree.set_bounds(c, Bounds::new(1.0, 2.0, 5.0, 5.0), &mut log);
        assert_eq!(tree.position(c), pos2(16.0, 27.0));
    }

    #[test]
    fn only_dirty_nodes_repaint() {
        let (mut tree, root, a, b) = tree();
        let mut log = Vec::new();
        for id in [root, a, b] {
            tree.set_bounds(id, Bounds::from_size(10.0, 10.0), &mut log);
        }
        let mut layers = LayerStore::default();
        assert_eq!(tree.paint(&log, &mut layers), 3);
        assert!(!tree.render_requested());
        assert_eq!(tree.paint(&log, &mut layers), 0);

        tree.repaint(a);
        assert!(tree.render_requested());
        assert!(tree.is_dirty(a) && !tree.is_dirty(b));
        assert_eq!(tree.paint(&log, &mut layers), 1);

        // Detached nodes never raise a render request.
        let lone = tree.insert("lone", Probe);
        tree.repaint(lone);
        assert!(!tree.render_requested());
    }
}
