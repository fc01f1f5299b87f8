//! Ordered multi-selection with a two-phase (press / release) protocol.
//!
//! Pressing an already selected item must not collapse the selection right
//! away, because the press may start a drag of the whole group. The
//! collapse is deferred to release and dropped if the pointer moved.

use std::fmt;

/// Anything that can live in a [`SelectedItemSet`]. Items are compared by
/// value, so ids are the natural fit.
pub trait SelectableItem: Copy + PartialEq {}

impl<T: Copy + PartialEq> SelectableItem for T {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingSelection<T> {
    Idle,
    PendingSelect(T),
}

pub struct SelectedItemSet<T: SelectableItem> {
    items: Vec<T>,
    pending: PendingSelection<T>,
    revision: u64,
    on_change: Option<Box<dyn FnMut(&[T])>>,
}

impl<T: SelectableItem> Default for SelectedItemSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pending: PendingSelection::Idle,
            revision: 0,
            on_change: None,
        }
    }
}

impl<T: SelectableItem + fmt::Debug> fmt::Debug for SelectedItemSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedItemSet")
            .field("items", &self.items)
            .field("pending", &self.pending)
            .field("revision", &self.revision)
            .finish()
    }
}

impl<T: SelectableItem> SelectedItemSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_change(&mut self, listener: impl FnMut(&[T]) + 'static) {
        self.on_change = Some(Box::new(listener));
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pending(&self) -> PendingSelection<T> {
        self.pending
    }

    /// Bumped on every change notification.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn notify(&mut self) {
        self.revision += 1;
        if let Some(listener) = self.on_change.as_mut() {
            listener(&self.items);
        }
    }

    /// Press phase. Returns `true` when the press was fully handled here and
    /// the release phase has nothing left to do.
    pub fn add_to_selection_mouse_down(&mut self, item: T, shift: bool) -> bool {
        self.pending = PendingSelection::Idle;

        if !self.contains(&item) {
            if !shift {
                self.items.clear();
            }
            self.items.push(item);
            self.notify();
            return true;
        }

        if shift {
            self.remove_from_selection(item);
            return true;
        }

        self.pending = PendingSelection::PendingSelect(item);
        false
    }

    /// Release phase: a plain click on an already selected item narrows the
    /// selection to it, unless the gesture turned into a drag.
    pub fn add_to_selection_mouse_up(&mut self, was_dragged: bool, shift: bool, consumed: bool) {
        let pending = std::mem::replace(&mut self.pending, PendingSelection::Idle);
        let PendingSelection::PendingSelect(item) = pending else {
            return;
        };
        if was_dragged || consumed {
            return;
        }

        if !shift {
            self.items.clear();
        }
        if !self.contains(&item) {
            self.items.push(item);
        }
        self.notify();
    }

    pub fn set_unique_selection(&mut self, item: T) {
        self.items.clear();
        self.items.push(item);
        self.notify();
    }

    pub fn remove_from_selection(&mut self, item: T) {
        if self.pending == PendingSelection::PendingSelect(item) {
            self.pending = PendingSelection::Idle;
        }
        if let Some(index) = self.items.iter().rposition(|s| *s == item) {
            self.items.remove(index);
            self.notify();
        }
    }

    pub fn deselect_all(&mut self) {
        self.items.clear();
        self.notify();
    }

    /// Replaces the whole selection, keeping the given order and dropping
    /// duplicates.
    pub fn replace_selection(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        for item in items {
            if !self.items.contains(&item) {
                self.items.push(item);
            }
        }
        self.notify();
    }

    /// Drops items rejected by `keep` without notifying when nothing changed.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        let before = self.items.len();
        self.items.retain(|item| keep(item));
        if let PendingSelection::PendingSelect(item) = self.pending {
            if !keep(&item) {
                self.pending = PendingSelection::Idle;
            }
        }
        if self.items.len() != before {
            self.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_set() -> (SelectedItemSet<u32>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let mut set = SelectedItemSet::new();
        let counter = calls.clone();
        set.set_on_change(move |_| counter.set(counter.get() + 1));
        (set, calls)
    }

    #[test]
    fn press_on_unselected_item_selects_it_uniquely() {
        let (mut set, calls) = counting_set();
        set.replace_selection([1, 2]);
        calls.set(0);

        assert!(set.add_to_selection_mouse_down(3, false));
        assert_eq!(set.items(), &[3]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn press_on_selected_item_defers_to_release() {
        let (mut set, calls) = counting_set();
        set.replace_selection([1, 2, 3]);
        calls.set(0);

        assert!(!set.add_to_selection_mouse_down(2, false));
        assert_eq!(set.items(), &[1, 2, 3]);
        assert_eq!(set.pending(), PendingSelection::PendingSelect(2));
        assert_eq!(calls.get(), 0);

        set.add_to_selection_mouse_up(false, false, false);
        assert_eq!(set.items(), &[2]);
        assert_eq!(set.pending(), PendingSelection::Idle);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn drag_keeps_group_selection() {
        let mut set = SelectedItemSet::new();
        set.replace_selection([1, 2, 3]);
        assert!(!set.add_to_selection_mouse_down(2, false));
        set.add_to_selection_mouse_up(true, false, false);
        assert_eq!(set.items(), &[1, 2, 3]);
        assert_eq!(set.pending(), PendingSelection::Idle);
    }

    #[test]
    fn shift_press_toggles() {
        let mut set = SelectedItemSet::new();
        assert!(set.add_to_selection_mouse_down(1, true));
        assert!(set.add_to_selection_mouse_down(2, true));
        assert_eq!(set.items(), &[1, 2]);
        assert!(set.add_to_selection_mouse_down(1, true));
        assert_eq!(set.items(), &[2]);
    }

    #[test]
    fn removing_pending_item_cancels_it() {
        let mut set = SelectedItemSet::new();
        set.replace_selection([1, 2]);
        set.add_to_selection_mouse_down(1, false);
        set.remove_from_selection(1);
        set.add_to_selection_mouse_up(false, false, false);
        assert_eq!(set.items(), &[2]);
    }

    #[test]
    fn each_mutator_notifies_once() {
        let (mut set, calls) = counting_set();
        set.set_unique_selection(4);
        set.deselect_all();
        set.replace_selection([1, 1, 2]);
        assert_eq!(set.items(), &[1, 2]);
        set.remove_from_selection(9);
        assert_eq!(calls.get(), 3);
        assert_eq!(set.revision(), 3);
    }
}
