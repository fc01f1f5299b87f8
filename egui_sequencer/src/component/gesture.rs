//! Turns raw pointer input into component gestures.

use super::{ComponentId, ComponentTree, Modifiers, MouseEvent};
use egui::{CursorIcon, Pos2};

/// Squared pixel distance beyond which a press becomes a drag.
pub const CLICK_MAX_DISTANCE_SQUARED: f32 = 30.0;
/// Press-to-release time under which a release counts as a click.
pub const CLICK_INTERVAL_MS: f64 = 200.0;
pub const DOUBLE_CLICK_INTERVAL_MS: f64 = 500.0;
pub const DOUBLE_PRESS_INTERVAL_MS: f64 = 400.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Press,
    Release,
    Move,
}

/// One raw pointer sample from the host, in root coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInput {
    pub kind: PointerKind,
    pub position: Pos2,
    pub modifiers: Modifiers,
    /// Whether the primary button is held.
    pub buttons_down: bool,
    pub time_ms: f64,
}

impl PointerInput {
    pub fn press(position: Pos2, time_ms: f64) -> Self {
        Self {
            kind: PointerKind::Press,
            position,
            modifiers: Modifiers::default(),
            buttons_down: true,
            time_ms,
        }
    }

    pub fn release(position: Pos2, time_ms: f64) -> Self {
        Self {
            kind: PointerKind::Release,
            position,
            modifiers: Modifiers::default(),
            buttons_down: false,
            time_ms,
        }
    }

    pub fn moved(position: Pos2, buttons_down: bool, time_ms: f64) -> Self {
        Self {
            kind: PointerKind::Move,
            position,
            modifiers: Modifiers::default(),
            buttons_down,
            time_ms,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Gesture session state for one tree.
#[derive(Clone, Debug, Default)]
pub struct GestureState {
    pressed: Option<ComponentId>,
    under_mouse: Option<ComponentId>,
    down_position: Option<Pos2>,
    down_time: f64,
    was_dragged: bool,
    is_dragging: bool,
    last_press: Option<(f64, Pos2)>,
    last_click: Option<(f64, Pos2)>,
}

fn squared_distance(a: Pos2, b: Pos2) -> f32 {
    (a - b).length_sq()
}

impl GestureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pressed_component(&self) -> Option<ComponentId> {
        self.pressed
    }

    pub fn is_dragging(&self) -> bool {
        self.is_dragging
    }

    /// Cursor to show: the pressed component's during a drag, otherwise the
    /// hovered component's.
    pub fn cursor<M: 'static>(&self, tree: &ComponentTree<M>) -> CursorIcon {
        match self.pressed.or(self.under_mouse) {
            Some(id) => tree.cursor(id),
            None => CursorIcon::Default,
        }
    }

    fn event(&self, input: &PointerInput, pressed: Option<ComponentId>) -> MouseEvent {
        MouseEvent {
            position: input.position,
            position_at_mouse_down: self.down_position,
            pressed_component: pressed,
            was_dragged: self.was_dragged,
            is_dragging: self.is_dragging,
            modifiers: input.modifiers,
        }
    }

    pub fn handle<M: 'static>(&mut self, tree: &mut ComponentTree<M>, model: &mut M, input: &PointerInput) {
        match input.kind {
            PointerKind::Press => self.press(tree, model, input),
            PointerKind::Release => self.release(tree, model, input),
            PointerKind::Move => self.moved(tree, model, input),
        }
    }

    fn press<M: 'static>(&mut self, tree: &mut ComponentTree<M>, model: &mut M, input: &PointerInput) {
        let Some(root) = tree.root() else {
            return;
        };
        let component = tree.find_component_at(root, input.position);

        self.pressed = Some(component);
        self.down_position = Some(input.position);
        self.down_time = input.time_ms;
        self.was_dragged = false;
        self.is_dragging = true;

        let event = self.event(input, Some(component));
        tree.dispatch(component, model, |c, ctx| c.mouse_pressed(ctx, &event));

        let is_double = self.last_press.is_some_and(|(time, pos)| {
            input.time_ms - time <= DOUBLE_PRESS_INTERVAL_MS
                && squared_distance(pos, input.position) <= CLICK_MAX_DISTANCE_SQUARED
        });
        if is_double {
            log::trace!("double press on {}", tree.name(component));
            self.last_press = None;
            tree.dispatch(component, model, |c, ctx| c.double_pressed(ctx, &event));
        } else {
            self.last_press = Some((input.time_ms, input.position));
        }
    }

    fn release<M: 'static>(&mut self, tree: &mut ComponentTree<M>, model: &mut M, input: &PointerInput) {
        if let Some(component) = self.pressed {
            let event = self.event(input, Some(component));
            tree.dispatch(component, model, |c, ctx| c.mouse_released(ctx, &event));

            let is_click = input.time_ms - self.down_time < CLICK_INTERVAL_MS && !self.was_dragged;
            if is_click {
                let is_double = self.last_click.is_some_and(|(time, pos)| {
                    input.time_ms - time <= DOUBLE_CLICK_INTERVAL_MS
                        && squared_distance(pos, input.position) <= CLICK_MAX_DISTANCE_SQUARED
                });
                if is_double {
                    log::trace!("double click on {}", tree.name(component));
                    self.last_click = None;
                    tree.dispatch(component, model, |c, ctx| c.double_clicked(ctx, &event));
                } else {
                    log::trace!("click on {}", tree.name(component));
                    self.last_click = Some((input.time_ms, input.position));
                    tree.dispatch(component, model, |c, ctx| c.clicked(ctx, &event));
                }
            }
        }

        self.pressed = None;
        self.down_position = None;
        self.was_dragged = false;
        self.is_dragging = false;
    }

    fn moved<M: 'static>(&mut self, tree: &mut ComponentTree<M>, model: &mut M, input: &PointerInput) {
        if let Some(down) = self.down_position {
            if !self.was_dragged && squared_distance(down, input.position) > CLICK_MAX_DISTANCE_SQUARED {
                self.was_dragged = true;
            }
        }

        if let Some(root) = tree.root() {
            let component = tree.find_component_at(root, input.position);
            let event = self.event(input, self.pressed);

            if let Some(previous) = self.under_mouse.filter(|p| *p != component) {
                tree.set_hover_state(previous, false, &event);
                tree.dispatch(previous, model, |c, ctx| c.mouse_exit(ctx, &event));
                tree.set_hover_state(component, true, &event);
                tree.dispatch(component, model, |c, ctx| c.mouse_enter(ctx, &event));
            } else if self.under_mouse.is_none() {
                tree.set_hover_state(component, true, &event);
                tree.dispatch(component, model, |c, ctx| c.mouse_enter(ctx, &event));
            }
            self.under_mouse = Some(component);

            tree.set_being_dragged(component, &event);
            tree.dispatch(component, model, |c, ctx| c.mouse_moved(ctx, &event));
        }

        if input.buttons_down {
            if let Some(pressed) = self.pressed {
                let event = self.event(input, Some(pressed));
                tree.dispatch(pressed, model, |c, ctx| c.mouse_dragged(ctx, &event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::surface::Surface;
    use crate::component::{Bounds, Component, EventCtx, RenderCtx};
    use egui::pos2;

    #[derive(Default)]
    struct Recorder;

    impl Component<Vec<&'static str>> for Recorder {
        fn render(&self, _ctx: &RenderCtx<'_, Vec<&'static str>>, _surface: &mut dyn Surface) {}

        fn mouse_pressed(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, _e: &MouseEvent) {
            ctx.model.push("pressed");
        }
        fn mouse_released(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, _e: &MouseEvent) {
            ctx.model.push("released");
        }
        fn mouse_dragged(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, e: &MouseEvent) {
            ctx.model.push(if e.was_dragged { "dragged" } else { "jitter" });
        }
        fn clicked(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, _e: &MouseEvent) {
            ctx.model.push("clicked");
        }
        fn double_clicked(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, _e: &MouseEvent) {
            ctx.model.push("double_clicked");
        }
        fn double_pressed(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, _e: &MouseEvent) {
            ctx.model.push("double_pressed");
        }
        fn mouse_enter(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, _e: &MouseEvent) {
            ctx.model.push("enter");
        }
        fn mouse_exit(&mut self, ctx: &mut EventCtx<'_, Vec<&'static str>>, _e: &MouseEvent) {
            ctx.model.push("exit");
        }
    }

    fn setup() -> (ComponentTree<Vec<&'static str>>, ComponentId, ComponentId) {
        let mut tree = ComponentTree::new();
        let root = tree.insert("root", Recorder);
        let child = tree.insert("child", Recorder);
        tree.set_root(root).unwrap();
        tree.add_child(root, child).unwrap();
        let mut scratch = Vec::new();
        tree.set_bounds(root, Bounds::from_size(100.0, 100.0), &mut scratch);
        tree.set_bounds(child, Bounds::new(50.0, 0.0, 50.0, 100.0), &mut scratch);
        (tree, root, child)
    }

    fn count(log: &[&str], name: &str) -> usize {
        log.iter().filter(|e| **e == name).count()
    }

    #[test]
    fn second_quick_click_is_a_double_click() {
        let (mut tree, _, _) = setup();
        let mut gestures = GestureState::new();
        let mut log = Vec::new();
        let p = pos2(10.0, 10.0);

        gestures.handle(&mut tree, &mut log, &PointerInput::press(p, 0.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::release(p, 150.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::press(p, 300.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::release(p, 450.0));

        assert_eq!(count(&log, "clicked"), 1);
        assert_eq!(count(&log, "double_clicked"), 1);
        assert_eq!(count(&log, "double_pressed"), 1);
        assert_eq!(count(&log, "released"), 2);
    }

    #[test]
    fn slow_release_is_not_a_click() {
        let (mut tree, _, _) = setup();
        let mut gestures = GestureState::new();
        let mut log = Vec::new();
        let p = pos2(10.0, 10.0);
        gestures.handle(&mut tree, &mut log, &PointerInput::press(p, 0.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::release(p, 250.0));
        assert_eq!(log, ["pressed", "released"]);
    }

    #[test]
    fn small_moves_do_not_count_as_drags() {
        let (mut tree, _, _) = setup();
        let mut gestures = GestureState::new();
        let mut log = Vec::new();

        gestures.handle(&mut tree, &mut log, &PointerInput::press(pos2(10.0, 10.0), 0.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(13.0, 13.0), true, 20.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(20.0, 10.0), true, 40.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(12.0, 10.0), true, 60.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::release(pos2(12.0, 10.0), 80.0));

        assert_eq!(count(&log, "jitter"), 1);
        // Once dragged, the gesture stays a drag even when the pointer returns.
        assert_eq!(count(&log, "dragged"), 2);
        assert_eq!(count(&log, "clicked"), 0);
    }

    #[test]
    fn drags_stay_with_the_pressed_component() {
        let (mut tree, root, child) = setup();
        let mut gestures = GestureState::new();
        let mut log = Vec::new();

        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(10.0, 10.0), false, 0.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::press(pos2(10.0, 10.0), 10.0));
        assert_eq!(gestures.pressed_component(), Some(root));

        log.clear();
        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(80.0, 10.0), true, 30.0));
        assert_eq!(log, ["exit", "enter", "dragged"]);
        // The child is under the pointer but only the pressed node counts as hovered.
        assert!(!tree.is_hovered(child));
        assert!(tree.is_hovered(root));

        gestures.handle(&mut tree, &mut log, &PointerInput::release(pos2(80.0, 10.0), 60.0));
        assert_eq!(gestures.pressed_component(), None);
        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(81.0, 10.0), false, 90.0));
        assert_eq!(gestures.pressed_component(), None);
    }

    #[test]
    fn cursor_follows_pressed_then_hovered_component() {
        let (mut tree, root, child) = setup();
        tree.set_cursor(root, CursorIcon::Grab);
        tree.set_cursor(child, CursorIcon::ResizeVertical);
        let mut gestures = GestureState::new();
        let mut log = Vec::new();

        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(70.0, 10.0), false, 0.0));
        assert_eq!(gestures.cursor(&tree), CursorIcon::ResizeVertical);
        gestures.handle(&mut tree, &mut log, &PointerInput::press(pos2(70.0, 10.0), 5.0));
        gestures.handle(&mut tree, &mut log, &PointerInput::moved(pos2(10.0, 10.0), true, 50.0));
        assert_eq!(gestures.cursor(&tree), CursorIcon::ResizeVertical);
        gestures.handle(&mut tree, &mut log, &PointerInput::release(pos2(10.0, 10.0), 90.0));
        assert_eq!(gestures.cursor(&tree), CursorIcon::Grab);
    }
}
