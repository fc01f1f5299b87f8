//! 音符网格
//!
//! 坐标换算（像素 ↔ 时间/音高）、量化、拖拽状态机以及同一音高上的
//! 重叠消解。网格状态属于共享模型，力度轨道也直接读写它。

use crate::component::surface::Surface;
use crate::component::MouseEvent;
use crate::editor::SequencerEvent;
use crate::lasso::LassoSelector;
use crate::selection::SelectedItemSet;
use crate::structure::{Note, NoteId, NoteRecord, Range, TimeSignature, MAX_PITCH, MAX_VELOCITY, MIN_SEMITONE_HEIGHT};
use crate::theme::{Colors, LookAndFeel, PitchAxis, TimeAxis};
use crate::view::DisplayModel;
use egui::{pos2, vec2, CursorIcon, Pos2, Rect, Vec2};
use std::collections::HashMap;

pub const ADAPTIVE_LABELS: [&str; 5] = ["XL", "X", "M", "S", "XS"];
/// Target grid spacing as a fraction of the grid width, per adaptive label.
pub const ADAPTIVE_RATIOS: [f64; 5] = [1.0, 0.5, 0.25, 0.1, 0.05];
pub const FIXED_INCREMENTS: [f64; 9] = [128.0, 64.0, 32.0, 16.0, 8.0, 4.0, 2.0, 1.0, 0.5];
pub const FIXED_LABELS: [&str; 9] = [
    "8 bars", "4 bars", "2 bars", "1 bar", "1/2", "1/4", "1/8", "1/16", "1/32",
];
pub const DEFAULT_ADAPTIVE_INDEX: usize = 3;
pub const DEFAULT_FIXED_INDEX: usize = 5;

/// Width in pixels of the resize zones at both ends of a note.
const RESIZE_MARGIN: f32 = 2.0;
const MIN_NOTE_WIDTH: f32 = 2.0;
const MIN_SIXTEENTH_WIDTH: f64 = 1e-5;

/// Geometry of the grid for one call. Built from the component's current
/// position and size, never cached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridView {
    pub origin: Pos2,
    pub width: f32,
    pub height: f32,
    pub visible: Range,
    pub vertical: Range,
    pub max_time: Range,
    pub signature: TimeSignature,
    pub adaptive_mode: bool,
}

impl GridView {
    pub fn new(origin: Pos2, size: Vec2, display: &DisplayModel) -> Self {
        Self {
            origin,
            width: size.x,
            height: size.y,
            visible: display.visible_time_range,
            vertical: display.vertical_range,
            max_time: display.max_time_range,
            signature: display.signature,
            adaptive_mode: display.adaptive_mode,
        }
    }

    pub fn sixteenth_width(&self) -> f64 {
        f64::from(self.width) / self.visible.len()
    }

    pub fn semitone_height(&self) -> f64 {
        f64::from(self.height) / self.vertical.len()
    }

    /// Zero size, empty ranges or non-finite scales.
    pub fn is_degenerate(&self) -> bool {
        let sixteenth = self.sixteenth_width();
        let semi = self.semitone_height();
        !(sixteenth.is_finite() && sixteenth > 0.0 && semi.is_finite() && semi > 0.0)
    }

    /// Time under an absolute x coordinate.
    pub fn time_at(&self, x: f32) -> f64 {
        f64::from(x - self.origin.x) / self.sixteenth_width() + self.visible.start
    }

    /// Pitch lane under an absolute y coordinate.
    pub fn pitch_at(&self, y: f32) -> u8 {
        let local = f64::from(self.height) - f64::from(y - self.origin.y);
        let pitch = (local / self.semitone_height() + self.vertical.start + 0.5).round();
        if pitch.is_finite() {
            pitch.clamp(0.0, f64::from(MAX_PITCH)) as u8
        } else {
            0
        }
    }

    /// Local x of a time.
    pub fn x_for_time(&self, time: f64) -> f32 {
        ((time - self.visible.start) * self.sixteenth_width()) as f32
    }

    /// Local y of the top of a pitch lane.
    pub fn y_for_pitch(&self, pitch: f64) -> f32 {
        (f64::from(self.height) - (pitch - self.vertical.start) * self.semitone_height()) as f32
    }

    pub fn note_rect(&self, time: f64, pitch: u8, duration: f64) -> Rect {
        let w = ((duration * self.sixteenth_width()) as f32).max(MIN_NOTE_WIDTH);
        Rect::from_min_size(
            pos2(self.x_for_time(time), self.y_for_pitch(f64::from(pitch))),
            vec2(w, self.semitone_height() as f32),
        )
    }

    pub fn local(&self, position: Pos2) -> Pos2 {
        (position - self.origin).to_pos2()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragAction {
    #[default]
    None,
    MoveNote,
    Left,
    Right,
    /// Right edge plus velocity, right after a note was created.
    VRight,
}

impl DragAction {
    pub fn cursor(self) -> CursorIcon {
        match self {
            DragAction::MoveNote => CursorIcon::Move,
            DragAction::Left => CursorIcon::ResizeWest,
            DragAction::Right | DragAction::VRight => CursorIcon::ResizeEast,
            DragAction::None => CursorIcon::Default,
        }
    }
}

/// Transient display overrides computed by a preview overlap pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct NotePreview {
    hidden: bool,
    time: Option<f64>,
    duration: Option<f64>,
}

/// Values captured at the first effective drag step of a gesture.
#[derive(Clone, Debug)]
struct DragOrigin {
    anchor: Note,
    notes: HashMap<NoteId, Note>,
    /// Bounding box of the selection: earliest start, latest end, lowest
    /// and highest pitch.
    left: f64,
    right: f64,
    low: f64,
    high: f64,
}

#[derive(Clone, Debug, Default)]
struct DragSession {
    action: DragAction,
    anchor: Option<NoteId>,
    mouse_down_result: bool,
    origin: Option<DragOrigin>,
}

pub struct NoteGrid {
    notes: Vec<Note>,
    selection: SelectedItemSet<NoteId>,
    lasso: LassoSelector<NoteId>,
    preview: HashMap<NoteId, NotePreview>,
    drag: DragSession,
    edit_baseline: Option<Vec<Note>>,
    pub current_velocity: u8,
    adaptive_index: usize,
    fixed_index: usize,
    last_selection_revision: u64,
    events: Vec<SequencerEvent>,
}

impl Default for NoteGrid {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            selection: SelectedItemSet::new(),
            lasso: LassoSelector::new(),
            preview: HashMap::new(),
            drag: DragSession::default(),
            edit_baseline: None,
            current_velocity: MAX_VELOCITY,
            adaptive_index: DEFAULT_ADAPTIVE_INDEX,
            fixed_index: DEFAULT_FIXED_INDEX,
            last_selection_revision: 0,
            events: Vec::new(),
        }
    }
}

impl NoteGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes in z-order, front-most last.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    pub fn selection(&self) -> &SelectedItemSet<NoteId> {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectedItemSet<NoteId> {
        &mut self.selection
    }

    pub fn is_selected(&self, id: NoteId) -> bool {
        self.selection.contains(&id)
    }

    pub fn drag_action(&self) -> DragAction {
        self.drag.action
    }

    pub fn lasso(&self) -> &LassoSelector<NoteId> {
        &self.lasso
    }

    /// Notes as currently displayed: preview overrides applied, hidden
    /// notes skipped.
    pub fn displayed_notes(&self) -> impl Iterator<Item = Note> + '_ {
        self.notes.iter().filter_map(|note| match self.preview.get(&note.id) {
            Some(p) if p.hidden => None,
            Some(p) => Some(Note {
                time: p.time.unwrap_or(note.time),
                duration: p.duration.unwrap_or(note.duration),
                ..*note
            }),
            None => Some(*note),
        })
    }

    // ---- quantization ----

    pub fn adaptive_index(&self) -> usize {
        self.adaptive_index
    }

    pub fn set_adaptive_index(&mut self, index: usize) {
        self.adaptive_index = index.min(ADAPTIVE_RATIOS.len() - 1);
    }

    pub fn fixed_index(&self) -> usize {
        self.fixed_index
    }

    pub fn set_fixed_index(&mut self, index: usize) {
        self.fixed_index = index.min(FIXED_INCREMENTS.len() - 1);
    }

    /// Grid spacing in sixteenths, `None` when the zoom level is degenerate.
    pub fn time_increment(&self, view: &GridView) -> Option<f64> {
        let sixteenth = view.sixteenth_width();
        if !(sixteenth.is_finite() && sixteenth >= MIN_SIXTEENTH_WIDTH) {
            return None;
        }

        if !view.adaptive_mode {
            return Some(FIXED_INCREMENTS[self.fixed_index]);
        }

        let desired = ADAPTIVE_RATIOS[self.adaptive_index] * f64::from(view.width);
        let mut ratio = view.signature.sixteenths_per_measure();
        if ratio * sixteenth > desired {
            ratio /= f64::from(view.signature.upper);
            while sixteenth * ratio > desired {
                ratio /= 2.0;
            }
        } else {
            while sixteenth * ratio * 2.0 < desired {
                ratio *= 2.0;
            }
        }
        Some(ratio)
    }

    pub fn snap_to_grid(&self, view: &GridView, time: f64) -> f64 {
        match self.time_increment(view) {
            Some(incr) if incr > 0.0 => incr * (time / incr).floor(),
            _ => time,
        }
    }

    // ---- hit testing ----

    /// Front-most note under an absolute position.
    pub fn find_note_at(&self, view: &GridView, position: Pos2) -> Option<NoteId> {
        let local = view.local(position);
        self.notes
            .iter()
            .rev()
            .find(|n| {
                let r = view.note_rect(n.time, n.pitch, n.duration);
                local.x >= r.min.x && local.x <= r.max.x && local.y >= r.min.y && local.y <= r.max.y
            })
            .map(|n| n.id)
    }

    pub fn drag_action_for(&self, view: &GridView, id: NoteId, position: Pos2) -> DragAction {
        let Some(note) = self.note(id) else {
            return DragAction::None;
        };
        let rect = view.note_rect(note.time, note.pitch, note.duration);
        let local = view.local(position).x - rect.min.x;
        let w = rect.width();

        if local > w {
            DragAction::None
        } else if local >= w - RESIZE_MARGIN {
            DragAction::Right
        } else if local >= RESIZE_MARGIN {
            DragAction::MoveNote
        } else if local >= 0.0 {
            DragAction::Left
        } else {
            DragAction::None
        }
    }

    // ---- note management ----

    fn insert_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    fn take_note(&mut self, id: NoteId) -> Option<Note> {
        let index = self.notes.iter().position(|n| n.id == id)?;
        self.selection.remove_from_selection(id);
        self.preview.remove(&id);
        Some(self.notes.remove(index))
    }

    pub fn add_note(&mut self, note: Note) -> NoteId {
        let id = note.id;
        log::debug!("note added at {} pitch {}", note.time, note.pitch);
        self.insert_note(note);
        self.events.push(SequencerEvent::NoteAdded(note));
        id
    }

    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let note = self.take_note(id)?;
        log::debug!("note removed at {} pitch {}", note.time, note.pitch);
        self.events.push(SequencerEvent::NoteDeleted(note));
        Some(note)
    }

    pub fn move_note_to_front(&mut self, id: NoteId) {
        if let Some(index) = self.notes.iter().position(|n| n.id == id) {
            let note = self.notes.remove(index);
            self.notes.push(note);
        }
    }

    pub fn delete_selection(&mut self) -> usize {
        let ids = self.selection.items().to_vec();
        ids.into_iter().filter(|id| self.remove_note(*id).is_some()).count()
    }

    /// Replaces every note. Selection and transient state are cleared.
    pub fn set_notes(&mut self, records: impl IntoIterator<Item = NoteRecord>) {
        self.drag = DragSession::default();
        self.lasso.end_lasso();
        self.preview.clear();
        self.edit_baseline = None;
        self.selection.deselect_all();
        self.notes = records.into_iter().map(NoteRecord::into_note).collect();
    }

    pub fn select_all(&mut self) {
        let ids: Vec<NoteId> = self.notes.iter().map(|n| n.id).collect();
        self.selection.replace_selection(ids);
    }

    /// Indices in z-order of the selected notes.
    pub fn selected_indices(&self) -> Vec<usize> {
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, n)| self.selection.contains(&n.id))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn select_indices(&mut self, indices: &[usize]) {
        let ids: Vec<NoteId> = indices.iter().filter_map(|i| self.notes.get(*i)).map(|n| n.id).collect();
        self.selection.replace_selection(ids);
    }

    // ---- edit bookkeeping ----

    /// Remembers the notes so that `finish_edit` can report what changed.
    pub fn begin_edit(&mut self) {
        self.edit_baseline = Some(self.notes.clone());
    }

    /// Emits added, deleted and updated events against the `begin_edit`
    /// baseline.
    pub fn finish_edit(&mut self) {
        let Some(before) = self.edit_baseline.take() else {
            return;
        };
        for old in &before {
            match self.notes.iter().find(|n| n.id == old.id) {
                None => self.events.push(SequencerEvent::NoteDeleted(*old)),
                Some(new) if new.to_record() != old.to_record() => {
                    self.events.push(SequencerEvent::NoteUpdated { before: *old, after: *new });
                }
                Some(_) => {}
            }
        }
        for new in &self.notes {
            if !before.iter().any(|n| n.id == new.id) {
                self.events.push(SequencerEvent::NoteAdded(*new));
            }
        }
    }

    pub fn take_events(&mut self) -> Vec<SequencerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queues a `SelectionChanged` event if the selection changed since the
    /// last call.
    pub fn flush_selection_event(&mut self) {
        let revision = self.selection.revision();
        if revision != self.last_selection_revision {
            self.last_selection_revision = revision;
            self.events.push(SequencerEvent::SelectionChanged(self.selection.items().to_vec()));
        }
    }

    // ---- overlap resolution ----

    /// Resolves same-pitch overlaps caused by the selected notes. `apply`
    /// edits the notes; otherwise only the display preview is updated.
    pub fn remove_overlaps(&mut self, apply: bool) {
        self.preview.clear();
        let selected = self.selection.items().to_vec();

        for sid in selected {
            let Some(s) = self.note(sid).copied() else {
                continue;
            };
            let s_end = s.end();
            let mut doomed = Vec::new();

            for n in self.notes.iter_mut() {
                if n.id == s.id || n.pitch != s.pitch {
                    continue;
                }
                let n_end = n.end();
                if s.time <= n.time && n.time < s_end {
                    if self.selection.contains(&n.id) {
                        continue;
                    }
                    if n_end <= s_end {
                        if apply {
                            doomed.push(n.id);
                        } else {
                            self.preview.entry(n.id).or_default().hidden = true;
                        }
                    } else if apply {
                        n.time = s_end;
                        n.duration = n_end - s_end;
                    } else {
                        let p = self.preview.entry(n.id).or_default();
                        p.time = Some(s_end);
                        p.duration = Some(n_end - s_end);
                    }
                } else if n.time < s.time && s.time < n_end {
                    let duration = s.time - n.time;
                    if apply {
                        n.duration = duration;
                    } else {
                        self.preview.entry(n.id).or_default().duration = Some(duration);
                    }
                }
            }

            for id in doomed {
                self.take_note(id);
            }
        }
    }

    // ---- pointer handling ----

    /// Cursor for the hovered position while no drag is in progress.
    pub fn mouse_moved(&self, view: &GridView, position: Pos2) -> Option<CursorIcon> {
        if self.drag.action != DragAction::None {
            return None;
        }
        let action = self
            .find_note_at(view, position)
            .map_or(DragAction::None, |id| self.drag_action_for(view, id, position));
        Some(action.cursor())
    }

    pub fn mouse_pressed(&mut self, view: &GridView, event: &MouseEvent) {
        self.begin_edit();
        self.drag = DragSession::default();

        match self.find_note_at(view, event.position) {
            None => {
                if !event.modifiers.shift {
                    self.selection.deselect_all();
                }
                self.lasso.begin_lasso(event, view.origin, &self.selection);
                self.drag.mouse_down_result = true;
            }
            Some(id) => {
                self.drag.mouse_down_result = self.selection.add_to_selection_mouse_down(id, event.modifiers.shift);
                if self.selection.contains(&id) {
                    self.drag.action = self.drag_action_for(view, id, event.position);
                    self.drag.anchor = Some(id);
                }
                self.move_note_to_front(id);
            }
        }
    }

    pub fn double_pressed(&mut self, view: &GridView, event: &MouseEvent) -> Option<CursorIcon> {
        if let Some(id) = self.find_note_at(view, event.position) {
            self.take_note(id);
            self.drag.action = DragAction::None;
            self.drag.anchor = None;
            log::debug!("note deleted by double press");
            return None;
        }

        self.lasso.end_lasso();
        let time = self.snap_to_grid(view, view.time_at(event.position.x));
        let pitch = view.pitch_at(event.position.y);
        let duration = self.time_increment(view).unwrap_or(1.0);
        let note = Note::new(time, pitch, duration, self.current_velocity);
        log::debug!("note created at {time} pitch {pitch}");

        self.insert_note(note);
        self.selection.set_unique_selection(note.id);
        self.remove_overlaps(true);
        self.drag.action = DragAction::VRight;
        self.drag.anchor = Some(note.id);
        self.drag.origin = None;
        Some(DragAction::VRight.cursor())
    }

    pub fn mouse_dragged(&mut self, view: &GridView, event: &MouseEvent) {
        if self.drag.action == DragAction::None {
            let notes = &self.notes;
            self.lasso.drag_lasso(event, view.origin, &mut self.selection, |lasso| {
                notes
                    .iter()
                    .filter(|n| view.note_rect(n.time, n.pitch, n.duration).intersects(lasso))
                    .map(|n| n.id)
                    .collect()
            });
            return;
        }
        if !event.was_dragged || view.is_degenerate() {
            return;
        }

        match self.drag.action {
            DragAction::MoveNote => self.move_selection(view, event),
            DragAction::Right => self.drag_end_points(view, event),
            DragAction::VRight => {
                self.drag_end_points(view, event);
                self.drag_velocity(event);
            }
            DragAction::Left => self.drag_start_points(view, event),
            DragAction::None => {}
        }
        self.remove_overlaps(false);
    }

    pub fn mouse_released(&mut self, event: &MouseEvent) {
        let session = std::mem::take(&mut self.drag);
        self.lasso.end_lasso();

        for note in self.notes.iter_mut() {
            if self.selection.contains(&note.id) && note.duration < 0.0 {
                note.duration = 0.0;
            }
        }
        self.selection
            .add_to_selection_mouse_up(event.was_dragged, event.modifiers.shift, session.mouse_down_result);
        self.remove_overlaps(true);
        self.finish_edit();
    }

    /// Captures the selected notes on the first drag step of a gesture.
    fn capture_origin(&mut self) -> Option<DragOrigin> {
        if let Some(origin) = &self.drag.origin {
            return Some(origin.clone());
        }
        let anchor = *self.note(self.drag.anchor?)?;
        let notes: HashMap<NoteId, Note> = self
            .notes
            .iter()
            .filter(|n| self.selection.contains(&n.id))
            .map(|n| (n.id, *n))
            .collect();
        if notes.is_empty() {
            return None;
        }

        let left = notes.values().map(|n| n.time).fold(f64::INFINITY, f64::min);
        let right = notes.values().map(Note::end).fold(f64::NEG_INFINITY, f64::max);
        let low = notes.values().map(|n| f64::from(n.pitch)).fold(f64::INFINITY, f64::min);
        let high = notes.values().map(|n| f64::from(n.pitch)).fold(f64::NEG_INFINITY, f64::max);

        let origin = DragOrigin {
            anchor,
            notes,
            left,
            right,
            low,
            high,
        };
        self.drag.origin = Some(origin.clone());
        Some(origin)
    }

    fn move_selection(&mut self, view: &GridView, event: &MouseEvent) {
        let Some(origin) = self.capture_origin() else {
            return;
        };
        let max_time_offset = view.max_time.end - origin.right;
        let clamp_time = |t: f64| t.min(max_time_offset).max(-origin.left);

        let delta = event.drag_delta();
        let scaled_x = clamp_time(f64::from(delta.x) / view.sixteenth_width());
        let scaled_y = (-f64::from(delta.y) / view.semitone_height())
            .min(f64::from(MAX_PITCH) - origin.high)
            .max(-origin.low);

        let anchor = origin.anchor;
        let pitch_offset = (f64::from(anchor.pitch) + scaled_y).round() - f64::from(anchor.pitch);
        let mut time = anchor.time + scaled_x;
        if !event.modifiers.option {
            time = self.snap_to_grid(view, time);
        }
        let time_offset = clamp_time(time - anchor.time);

        for note in self.notes.iter_mut() {
            if let Some(start) = origin.notes.get(&note.id) {
                note.time = start.time + time_offset;
                note.pitch = (f64::from(start.pitch) + pitch_offset).clamp(0.0, f64::from(MAX_PITCH)) as u8;
            }
        }
    }

    fn drag_end_points(&mut self, view: &GridView, event: &MouseEvent) {
        let Some(origin) = self.capture_origin() else {
            return;
        };
        let max_offset = view.max_time.end - origin.right;
        let scaled_x = (f64::from(event.drag_delta().x) / view.sixteenth_width()).min(max_offset);

        let anchor = origin.anchor;
        let mut duration = anchor.duration + scaled_x;
        if !event.modifiers.option {
            duration = (self.snap_to_grid(view, anchor.time + duration) - anchor.time).max(0.0);
        }
        let offset = duration - anchor.duration;

        for note in self.notes.iter_mut() {
            if let Some(start) = origin.notes.get(&note.id) {
                note.duration = start.duration + offset;
            }
        }
    }

    fn drag_start_points(&mut self, view: &GridView, event: &MouseEvent) {
        let Some(origin) = self.capture_origin() else {
            return;
        };
        let scaled_x = (f64::from(event.drag_delta().x) / view.sixteenth_width()).max(-origin.left);

        let anchor = origin.anchor;
        let end = anchor.end();
        let mut time = (anchor.time + scaled_x).min(end);
        if !event.modifiers.option && end - time > 0.0 {
            time = self.snap_to_grid(view, time);
        }
        let offset = time - anchor.time;

        for note in self.notes.iter_mut() {
            if let Some(start) = origin.notes.get(&note.id) {
                let end = start.end();
                note.time = (start.time + offset).min(end);
                note.duration = (end - note.time).max(0.0);
            }
        }
    }

    fn drag_velocity(&mut self, event: &MouseEvent) {
        let Some(origin) = self.drag.origin.as_ref() else {
            return;
        };
        let initial = f64::from(origin.anchor.velocity);
        let velocity = (initial - f64::from(event.drag_delta().y)).clamp(0.0, f64::from(MAX_VELOCITY)) as u8;
        let anchor = origin.anchor.id;
        if let Some(note) = self.note_mut(anchor) {
            note.velocity = velocity;
        }
        self.current_velocity = velocity;
    }

    // ---- rendering ----

    pub fn draw(&self, view: &GridView, theme: &dyn LookAndFeel, colors: &Colors, surface: &mut dyn Surface) {
        if view.is_degenerate() {
            return;
        }
        let sixteenth = view.sixteenth_width();
        let semi = view.semitone_height();

        surface.fill_rect(Rect::from_min_size(Pos2::ZERO, vec2(view.width, view.height)), colors.background);
        if let Some(increment) = self.time_increment(view) {
            let axis = TimeAxis {
                height: view.height,
                sixteenth,
                increment,
                start: view.visible.start,
                end: view.visible.end,
                signature: view.signature,
            };
            theme.draw_time_background(surface, &axis, colors);
        }

        let pitch_axis = PitchAxis {
            width: view.width,
            height: view.height,
            start: view.vertical.start,
            end: view.vertical.end,
            semitone_height: semi,
        };
        if semi > MIN_SEMITONE_HEIGHT {
            theme.draw_semitone_pattern(surface, &pitch_axis, colors);
        } else {
            theme.draw_octave_lines(surface, &pitch_axis, colors);
        }

        let visible = Rect::from_min_size(Pos2::ZERO, vec2(view.width, view.height));
        for note in self.displayed_notes() {
            let rect = view.note_rect(note.time, note.pitch, note.duration);
            if rect.intersects(visible) {
                theme.draw_note(surface, rect, note.velocity, self.is_selected(note.id), colors);
            }
        }

        self.lasso.draw_lasso(surface, colors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Modifiers;
    use approx::assert_relative_eq;

    // 10 px per sixteenth and per semitone.
    fn view() -> GridView {
        let display = DisplayModel::default();
        GridView::new(Pos2::ZERO, vec2(160.0, 240.0), &display)
    }

    fn press(x: f32, y: f32) -> MouseEvent {
        MouseEvent {
            position: pos2(x, y),
            position_at_mouse_down: Some(pos2(x, y)),
            pressed_component: None,
            was_dragged: false,
            is_dragging: true,
            modifiers: Modifiers::default(),
        }
    }

    fn drag(from: MouseEvent, x: f32, y: f32) -> MouseEvent {
        MouseEvent {
            position: pos2(x, y),
            was_dragged: true,
            ..from
        }
    }

    fn grid_with(notes: &[(f64, u8, f64)]) -> (NoteGrid, Vec<NoteId>) {
        let mut grid = NoteGrid::new();
        let ids = notes
            .iter()
            .map(|&(time, pitch, duration)| {
                let note = Note::new(time, pitch, duration, 100);
                grid.insert_note(note);
                note.id
            })
            .collect();
        (grid, ids)
    }

    #[test]
    fn coordinates_follow_the_visible_ranges() {
        let v = view();
        assert_relative_eq!(v.sixteenth_width(), 10.0);
        assert_relative_eq!(v.semitone_height(), 10.0);
        assert_relative_eq!(v.time_at(34.0), 3.4);
        assert_eq!(v.y_for_pitch(64.0), 180.0);
        assert_eq!(v.pitch_at(185.0), 64);
        assert_eq!(v.pitch_at(-5000.0), MAX_PITCH);
        assert_eq!(v.pitch_at(5000.0), 0);

        // Minimal width keeps zero-length notes clickable.
        assert_eq!(v.note_rect(1.0, 60, 0.0).width(), 2.0);

        let flat = GridView::new(Pos2::ZERO, vec2(0.0, 0.0), &DisplayModel::default());
        assert!(flat.is_degenerate());
    }

    #[test]
    fn adaptive_and_fixed_increments() {
        let mut grid = NoteGrid::new();
        let mut v = view();
        assert_eq!(grid.time_increment(&v), Some(1.0));
        grid.set_adaptive_index(0);
        assert_eq!(grid.time_increment(&v), Some(16.0));
        grid.set_adaptive_index(99);
        assert_eq!(grid.adaptive_index(), 4);

        v.adaptive_mode = false;
        assert_eq!(grid.time_increment(&v), Some(FIXED_INCREMENTS[DEFAULT_FIXED_INDEX]));
        grid.set_fixed_index(8);
        assert_eq!(grid.time_increment(&v), Some(0.5));

        v.width = 0.0;
        assert_eq!(grid.time_increment(&v), None);
        assert_eq!(grid.snap_to_grid(&v, 3.7), 3.7);
    }

    #[test]
    fn snapping_is_idempotent() {
        let grid = NoteGrid::new();
        let v = view();
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..500 {
            let t = rng.f64() * 64.0;
            let once = grid.snap_to_grid(&v, t);
            assert!(once <= t);
            assert_eq!(grid.snap_to_grid(&v, once), once);
        }
    }

    #[test]
    fn drag_action_zones() {
        let (grid, ids) = grid_with(&[(4.0, 60, 2.0)]);
        let v = view();
        // Note spans x 40..60.
        let at = |x: f32| grid.drag_action_for(&v, ids[0], pos2(x, 225.0));
        assert_eq!(at(40.5), DragAction::Left);
        assert_eq!(at(50.0), DragAction::MoveNote);
        assert_eq!(at(59.0), DragAction::Right);
        assert_eq!(at(61.0), DragAction::None);
        assert_eq!(at(39.0), DragAction::None);
        assert_eq!(grid.mouse_moved(&v, pos2(50.0, 225.0)), Some(CursorIcon::Move));
        assert_eq!(grid.mouse_moved(&v, pos2(100.0, 225.0)), Some(CursorIcon::Default));
    }

    #[test]
    fn front_most_note_wins_hit_test() {
        let (mut grid, ids) = grid_with(&[(0.0, 60, 4.0), (2.0, 60, 4.0)]);
        let v = view();
        assert_eq!(grid.find_note_at(&v, pos2(30.0, 225.0)), Some(ids[1]));
        grid.move_note_to_front(ids[0]);
        assert_eq!(grid.find_note_at(&v, pos2(30.0, 225.0)), Some(ids[0]));
        assert_eq!(grid.find_note_at(&v, pos2(30.0, 205.0)), None);
    }

    #[test]
    fn double_press_creates_a_snapped_note() {
        let mut grid = NoteGrid::new();
        let v = view();
        let event = press(34.0, 185.0);
        grid.mouse_pressed(&v, &event);
        assert_eq!(grid.double_pressed(&v, &event), Some(CursorIcon::ResizeEast));
        grid.mouse_released(&event);

        let note = grid.notes()[0];
        assert_eq!(note.to_record(), NoteRecord { time: 3.0, pitch: 64, duration: 1.0, velocity: 127 });
        assert_eq!(grid.selection().items(), &[note.id]);
        assert_eq!(grid.take_events(), vec![SequencerEvent::NoteAdded(note)]);
    }

    #[test]
    fn double_press_on_a_note_deletes_it() {
        let (mut grid, ids) = grid_with(&[(4.0, 60, 2.0)]);
        let v = view();
        let event = press(50.0, 225.0);
        grid.mouse_pressed(&v, &event);
        assert_eq!(grid.double_pressed(&v, &event), None);
        grid.mouse_released(&event);
        assert!(grid.notes().is_empty());
        assert!(grid.selection().is_empty());
        assert!(matches!(grid.take_events().as_slice(), [SequencerEvent::NoteDeleted(n)] if n.id == ids[0]));
    }

    #[test]
    fn velocity_drag_after_creation_sets_default_velocity() {
        let mut grid = NoteGrid::new();
        let v = view();
        let event = press(34.0, 185.0);
        grid.mouse_pressed(&v, &event);
        grid.double_pressed(&v, &event);
        grid.mouse_dragged(&v, &drag(event, 34.0, 225.0));
        grid.mouse_released(&drag(event, 34.0, 225.0));
        assert_eq!(grid.notes()[0].velocity, 87);
        assert_eq!(grid.current_velocity, 87);
    }

    #[test]
    fn leading_edge_overlap_trims_the_later_note() {
        let (mut grid, ids) = grid_with(&[(0.0, 60, 4.0), (2.0, 60, 4.0)]);
        grid.selection_mut().set_unique_selection(ids[0]);
        grid.remove_overlaps(true);
        assert_eq!(grid.note(ids[0]).map(Note::to_record), Some(NoteRecord { time: 0.0, pitch: 60, duration: 4.0, velocity: 100 }));
        assert_eq!(grid.note(ids[1]).map(Note::to_record), Some(NoteRecord { time: 4.0, pitch: 60, duration: 2.0, velocity: 100 }));
    }

    #[test]
    fn covered_note_is_deleted_and_enclosing_note_loses_its_tail() {
        let (mut grid, ids) = grid_with(&[(0.0, 60, 4.0), (1.0, 60, 2.0), (10.0, 62, 8.0), (12.0, 62, 1.0)]);
        grid.selection_mut().replace_selection([ids[0], ids[3]]);
        grid.remove_overlaps(true);
        assert!(grid.note(ids[1]).is_none());
        assert_relative_eq!(grid.note(ids[2]).map_or(0.0, |n| n.duration), 2.0);
        assert_eq!(grid.notes().len(), 3);
    }

    #[test]
    fn preview_pass_leaves_notes_untouched() {
        let (mut grid, ids) = grid_with(&[(0.0, 60, 4.0), (1.0, 60, 2.0), (3.0, 60, 4.0)]);
        grid.selection_mut().set_unique_selection(ids[0]);
        grid.remove_overlaps(false);
        assert_eq!(grid.notes().len(), 3);
        let shown: Vec<Note> = grid.displayed_notes().collect();
        assert_eq!(shown.len(), 2);
        assert_relative_eq!(shown[1].time, 4.0);
        assert_relative_eq!(shown[1].duration, 3.0);
        assert_relative_eq!(grid.note(ids[2]).map_or(0.0, |n| n.time), 3.0);
    }

    #[test]
    fn overlap_invariant_holds_after_apply() {
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..200 {
            let mut grid = NoteGrid::new();
            for _ in 0..12 {
                let note = Note::new(rng.u8(0..16) as f64 * 0.5, rng.u8(60..63), rng.u8(0..10) as f64 * 0.5, 100);
                grid.insert_note(note);
            }
            let picked: Vec<NoteId> = grid.notes().iter().filter(|_| rng.bool()).map(|n| n.id).collect();
            grid.selection_mut().replace_selection(picked);
            grid.remove_overlaps(true);

            for s in grid.notes().iter().filter(|n| grid.is_selected(n.id)) {
                for n in grid.notes().iter().filter(|n| !grid.is_selected(n.id) && n.pitch == s.pitch) {
                    assert!(n.end() <= s.time || n.time >= s.end(), "{s:?} overlaps {n:?}");
                }
            }
        }
    }

    #[test]
    fn moving_a_selection_snaps_and_clamps() {
        let (mut grid, ids) = grid_with(&[(0.0, 60, 2.0), (4.0, 62, 2.0)]);
        let v = view();
        grid.selection_mut().replace_selection(ids.clone());

        let down = press(10.0, 225.0);
        grid.mouse_pressed(&v, &down);
        assert_eq!(grid.drag_action(), DragAction::MoveNote);
        grid.mouse_dragged(&v, &drag(down, 35.0, 205.0));
        assert_eq!(grid.note(ids[0]).map(|n| (n.time, n.pitch)), Some((2.0, 62)));
        assert_eq!(grid.note(ids[1]).map(|n| (n.time, n.pitch)), Some((6.0, 64)));

        // Left of zero is not reachable.
        grid.mouse_dragged(&v, &drag(down, -200.0, 225.0));
        assert_eq!(grid.note(ids[0]).map(|n| n.time), Some(0.0));
        grid.mouse_released(&drag(down, -200.0, 225.0));

        // The drag kept the group selected.
        assert_eq!(grid.selection().len(), 2);
    }

    #[test]
    fn move_without_snapping_uses_raw_offset() {
        let (mut grid, ids) = grid_with(&[(4.0, 60, 2.0)]);
        let v = view();
        let down = press(50.0, 225.0);
        grid.mouse_pressed(&v, &down);
        let mut moved = drag(down, 63.0, 225.0);
        moved.modifiers.option = true;
        grid.mouse_dragged(&v, &moved);
        assert_relative_eq!(grid.note(ids[0]).map_or(0.0, |n| n.time), 5.3, epsilon = 1e-6);
    }

    #[test]
    fn right_edge_drag_past_start_ends_at_zero() {
        let (mut grid, ids) = grid_with(&[(4.0, 60, 2.0)]);
        let v = view();
        let down = press(59.0, 225.0);
        grid.mouse_pressed(&v, &down);
        assert_eq!(grid.drag_action(), DragAction::Right);

        let mut step = drag(down, 9.0, 225.0);
        step.modifiers.option = true;
        grid.mouse_dragged(&v, &step);
        assert_relative_eq!(grid.note(ids[0]).map_or(0.0, |n| n.duration), -3.0);
        grid.mouse_released(&step);
        assert_eq!(grid.note(ids[0]).map(|n| n.duration), Some(0.0));

        let events = grid.take_events();
        assert!(matches!(events.as_slice(), [SequencerEvent::NoteUpdated { after, .. }] if after.duration == 0.0));
    }

    #[test]
    fn left_edge_drag_keeps_the_end() {
        let (mut grid, ids) = grid_with(&[(4.0, 60, 4.0)]);
        let v = view();
        let down = press(40.5, 225.0);
        grid.mouse_pressed(&v, &down);
        assert_eq!(grid.drag_action(), DragAction::Left);
        grid.mouse_dragged(&v, &drag(down, 62.0, 225.0));
        let note = grid.note(ids[0]).copied();
        assert_eq!(note.map(|n| (n.time, n.duration)), Some((6.0, 2.0)));

        // The start never crosses the end.
        grid.mouse_dragged(&v, &drag(down, 150.0, 225.0));
        assert_eq!(grid.note(ids[0]).map(|n| (n.time, n.duration)), Some((8.0, 0.0)));
    }

    #[test]
    fn lasso_selects_intersecting_notes() {
        let (mut grid, ids) = grid_with(&[(0.0, 60, 2.0), (4.0, 62, 2.0)]);
        let v = view();
        let down = press(150.0, 235.0);
        grid.mouse_pressed(&v, &down);
        assert!(grid.lasso().is_active());
        grid.mouse_dragged(&v, &drag(down, 15.0, 215.0));
        assert_eq!(grid.selection().items(), &[ids[0]]);
        grid.mouse_released(&drag(down, 15.0, 215.0));
        assert!(!grid.lasso().is_active());
        assert_eq!(grid.selection().items(), &[ids[0]]);
    }

    #[test]
    fn pressing_a_selected_note_defers_narrowing_to_release() {
        let (mut grid, ids) = grid_with(&[(0.0, 60, 2.0), (4.0, 62, 2.0)]);
        let v = view();
        grid.selection_mut().replace_selection(ids.clone());
        let down = press(10.0, 225.0);
        grid.mouse_pressed(&v, &down);
        assert_eq!(grid.selection().len(), 2);
        grid.mouse_released(&down);
        assert_eq!(grid.selection().items(), &[ids[0]]);

        grid.flush_selection_event();
        grid.flush_selection_event();
        let changes = grid
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, SequencerEvent::SelectionChanged(_)))
            .count();
        assert_eq!(changes, 1);
    }
}
