//! Rubber-band selection over a [`SelectedItemSet`].

use crate::component::surface::Surface;
use crate::component::MouseEvent;
use crate::selection::{SelectableItem, SelectedItemSet};
use crate::theme::Colors;
use egui::{Pos2, Rect, Stroke};

#[derive(Clone, Debug)]
struct Lasso<T> {
    start: Pos2,
    end: Pos2,
    /// Selection at press time when shift was held; the lasso then toggles
    /// items against it instead of replacing it.
    commute_from: Option<Vec<T>>,
}

#[derive(Clone, Debug)]
pub struct LassoSelector<T: SelectableItem> {
    lasso: Option<Lasso<T>>,
}

impl<T: SelectableItem> Default for LassoSelector<T> {
    fn default() -> Self {
        Self { lasso: None }
    }
}

impl<T: SelectableItem> LassoSelector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `owner_origin` is the absolute position of the owning component; the
    /// lasso is kept in its local coordinates.
    pub fn begin_lasso(&mut self, event: &MouseEvent, owner_origin: Pos2, selection: &SelectedItemSet<T>) {
        let local = (event.position - owner_origin).to_pos2();
        self.lasso = Some(Lasso {
            start: local,
            end: local,
            commute_from: event.modifiers.shift.then(|| selection.items().to_vec()),
        });
    }

    pub fn end_lasso(&mut self) {
        self.lasso = None;
    }

    pub fn is_active(&self) -> bool {
        self.lasso.is_some()
    }

    /// Lasso rectangle in owner-local coordinates.
    pub fn rect(&self) -> Option<Rect> {
        self.lasso.as_ref().map(|l| Rect::from_two_pos(l.start, l.end))
    }

    pub fn drag_lasso(
        &mut self,
        event: &MouseEvent,
        owner_origin: Pos2,
        selection: &mut SelectedItemSet<T>,
        find_all_in_lasso: impl FnOnce(Rect) -> Vec<T>,
    ) {
        let Some(lasso) = self.lasso.as_mut() else {
            return;
        };
        lasso.end = (event.position - owner_origin).to_pos2();
        let found = find_all_in_lasso(Rect::from_two_pos(lasso.start, lasso.end));

        match &lasso.commute_from {
            Some(initial) => {
                let mut items = initial.clone();
                for item in found {
                    if let Some(index) = items.iter().position(|s| *s == item) {
                        items.remove(index);
                    } else {
                        items.push(item);
                    }
                }
                selection.replace_selection(items);
            }
            None => selection.replace_selection(found),
        }
    }

    pub fn draw_lasso(&self, surface: &mut dyn Surface, colors: &Colors) {
        let Some(rect) = self.rect() else {
            return;
        };
        surface.fill_rect(rect, colors.lasso_background);
        surface.stroke_rect(rect, 0.0, Stroke::new(2.0, colors.lasso_outline));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Modifiers;
    use egui::pos2;

    fn event(x: f32, y: f32, shift: bool) -> MouseEvent {
        MouseEvent {
            position: pos2(x, y),
            position_at_mouse_down: None,
            pressed_component: None,
            was_dragged: true,
            is_dragging: true,
            modifiers: Modifiers { shift, option: false },
        }
    }

    // Items are points on a line at x = 10 * id (local coordinates).
    fn in_rect(rect: Rect) -> Vec<u32> {
        (0..10).filter(|i| rect.x_range().contains(*i as f32 * 10.0)).collect()
    }

    #[test]
    fn plain_lasso_replaces_selection() {
        let mut set = SelectedItemSet::new();
        set.replace_selection([9]);
        let mut lasso = LassoSelector::new();
        let origin = pos2(100.0, 100.0);

        lasso.begin_lasso(&event(105.0, 100.0, false), origin, &set);
        lasso.drag_lasso(&event(135.0, 120.0, false), origin, &mut set, in_rect);
        assert_eq!(set.items(), &[1, 2, 3]);
        assert_eq!(lasso.rect(), Some(Rect::from_min_max(pos2(5.0, 0.0), pos2(35.0, 20.0))));

        // Dragging back shrinks the selection again.
        lasso.drag_lasso(&event(115.0, 120.0, false), origin, &mut set, in_rect);
        assert_eq!(set.items(), &[1]);
    }

    #[test]
    fn shift_lasso_toggles_against_initial_selection() {
        let mut set = SelectedItemSet::new();
        set.replace_selection([2, 7]);
        let mut lasso = LassoSelector::new();
        let origin = Pos2::ZERO;

        lasso.begin_lasso(&event(5.0, 0.0, true), origin, &set);
        lasso.drag_lasso(&event(35.0, 10.0, true), origin, &mut set, in_rect);
        assert_eq!(set.items(), &[7, 1, 3]);

        lasso.drag_lasso(&event(15.0, 10.0, true), origin, &mut set, in_rect);
        assert_eq!(set.items(), &[2, 7, 1]);

        lasso.end_lasso();
        assert!(!lasso.is_active());
        lasso.drag_lasso(&event(95.0, 10.0, true), origin, &mut set, in_rect);
        assert_eq!(set.items(), &[2, 7, 1]);
    }
}
