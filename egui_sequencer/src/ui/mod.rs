mod border;
mod grid_view;
mod pitch_ruler;
pub mod root;
mod time_ruler;
mod velocity;

pub use pitch_ruler::{DragDirection, DragMode};
pub use time_ruler::graduation_steps;

use crate::component::gesture::{GestureState, PointerInput};
use crate::component::surface::LayerStore;
use crate::component::{Bounds, ComponentId, ComponentTree, Modifiers};
use crate::editor::{SequencerCommand, SequencerEvent, SequencerOptions};
use crate::error::{parse_number_attribute, SequencerError, SequencerResult};
use crate::grid::NoteGrid;
use crate::structure::{self, Note, NoteId, NoteRecord, Range, SequencerSnapshot, TimeSignature, MAX_VELOCITY};
use crate::theme::{look_and_feel_by_name, LookAndFeel};
use crate::view::DisplayModel;
use border::DraggableBorder;
use egui::{CursorIcon, Event, Key, PointerButton, Rect, Response, Sense, Ui, Vec2};
use grid_view::NoteGridComponent;
use pitch_ruler::PitchRuler;
use root::{Parts, SequencerRoot};
use time_ruler::TimeRuler;
use velocity::{VelocityRuler, VelocityTrack};

/// 组件之间共享的状态：显示模型、音符网格与主题
pub struct SequencerModel {
    pub display: DisplayModel,
    pub grid: NoteGrid,
    pub theme: Box<dyn LookAndFeel>,
    events: Vec<SequencerEvent>,
}

impl SequencerModel {
    /// 组件产生的非音符事件，在交互结束后统一派发
    pub fn push_event(&mut self, event: SequencerEvent) {
        self.events.push(event);
    }

    fn drain_events(&mut self) -> Vec<SequencerEvent> {
        self.grid.flush_selection_event();
        let mut events = self.grid.take_events();
        events.append(&mut self.events);
        events
    }
}

/// 序列器的各个区域
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part {
    Root,
    TimeRuler,
    PitchRuler,
    Grid,
    VelocityRuler,
    VelocityTrack,
    Border,
}

type Ranges = (Range, Range, Range);

/// 可嵌入的钢琴卷帘序列器
pub struct Sequencer {
    model: SequencerModel,
    tree: ComponentTree<SequencerModel>,
    gesture: GestureState,
    layers: LayerStore,
    parts: Parts,
    root: ComponentId,
    size: Vec2,
    primary_down: bool,
    pub pending_events: Vec<SequencerEvent>,
    event_listener: Option<Box<dyn FnMut(&SequencerEvent)>>,
}

impl Sequencer {
    pub fn new(options: SequencerOptions) -> SequencerResult<Self> {
        let theme = look_and_feel_by_name(&options.theme)
            .ok_or_else(|| SequencerError::UnknownTheme(options.theme.clone()))?;

        let mut tree = ComponentTree::new();
        let parts = Parts {
            grid: tree.insert("note-grid", NoteGridComponent),
            time_ruler: tree.insert("time-ruler", TimeRuler::default()),
            pitch_ruler: tree.insert("pitch-ruler", PitchRuler::default()),
            velocity_ruler: tree.insert("velocity-ruler", VelocityRuler),
            velocity_track: tree.insert("velocity-track", VelocityTrack::default()),
            border: tree.insert("border", DraggableBorder::default()),
        };
        let root = tree.insert("sequencer", SequencerRoot::new(parts));
        tree.set_root(root)?;
        for child in [
            parts.grid,
            parts.time_ruler,
            parts.pitch_ruler,
            parts.velocity_ruler,
            parts.velocity_track,
            parts.border,
        ] {
            tree.add_child(root, child)?;
        }

        let mut sequencer = Self {
            model: SequencerModel {
                display: DisplayModel::default(),
                grid: NoteGrid::new(),
                theme,
                events: Vec::new(),
            },
            tree,
            gesture: GestureState::new(),
            layers: LayerStore::default(),
            parts,
            root,
            size: Vec2::ZERO,
            primary_down: false,
            pending_events: Vec::new(),
            event_listener: None,
        };
        sequencer.apply_options(&options)?;
        // Construction is not an edit.
        sequencer.model.drain_events();
        Ok(sequencer)
    }

    /// Applies every option at once. Theme and signature are validated
    /// before anything changes.
    pub fn apply_options(&mut self, options: &SequencerOptions) -> SequencerResult<()> {
        let theme = look_and_feel_by_name(&options.theme)
            .ok_or_else(|| SequencerError::UnknownTheme(options.theme.clone()))?;
        let signature = validate_signature(options.signature)?;

        let display = &mut self.model.display;
        let time_start = if options.time_start.is_finite() { options.time_start.max(0.0) } else { 0.0 };
        let duration = if options.duration.is_finite() { options.duration.max(0.0) } else { 0.0 };
        display.max_time_range = Range::new(time_start, time_start + duration);
        display.visible_time_range = options.initial_visible_range();
        display.vertical_range = options.vertical_range;
        display.signature = signature;
        display.adaptive_mode = options.adaptive_mode;
        display.zoom_sensitivity = options.zoom_sensitivity.max(1.0);
        display.velocity_track_height = options.velocity_track_height;
        display.colors = options.colors.unwrap_or_else(|| theme.default_colors());
        display.enforce_invariants();

        self.model.theme = theme;
        let grid = &mut self.model.grid;
        grid.set_adaptive_index(options.adaptive_index);
        grid.set_fixed_index(options.fixed_index);
        grid.current_velocity = options.default_velocity.min(MAX_VELOCITY);

        self.relayout();
        Ok(())
    }

    pub fn set_event_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&SequencerEvent) + 'static,
    {
        self.event_listener = Some(Box::new(listener));
    }

    pub fn take_events(&mut self) -> Vec<SequencerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn emit_event(&mut self, event: SequencerEvent) {
        if let Some(listener) = &mut self.event_listener {
            listener(&event);
        }
        self.pending_events.push(event);
    }

    fn ranges(&self) -> Ranges {
        let display = &self.model.display;
        (display.max_time_range, display.visible_time_range, display.vertical_range)
    }

    /// Forwards what the components queued, plus a coalesced
    /// `RangesChanged` when any range differs from `before`.
    fn after_interaction(&mut self, before: Ranges) {
        let mut events = self.model.drain_events();
        let after = self.ranges();
        if after != before {
            let (max_time_range, visible_time_range, vertical_range) = after;
            events.push(SequencerEvent::RangesChanged {
                max_time_range,
                visible_time_range,
                vertical_range,
            });
        }
        for event in events {
            self.emit_event(event);
        }
    }

    // ---- layout & painting ----

    fn relayout(&mut self) {
        let bounds = Bounds::from_size(self.size.x, self.size.y);
        self.tree.set_bounds(self.root, bounds, &mut self.model);
        self.tree.repaint(self.root);
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        let size = Vec2::new(width.max(0.0), height.max(0.0));
        if size == self.size {
            return;
        }
        log::debug!("sequencer resized to {}x{}", size.x, size.y);
        self.size = size;
        self.relayout();
    }

    /// Renders the dirty components into their layers. Returns how many
    /// were rendered.
    pub fn render(&mut self) -> usize {
        self.tree.paint(&self.model, &mut self.layers)
    }

    pub fn needs_render(&self) -> bool {
        self.tree.render_requested()
    }

    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    pub fn paint_order(&self) -> Vec<ComponentId> {
        self.tree.paint_order()
    }

    /// Cursor for the component under the pointer, or the pressed one
    /// while a gesture is in progress.
    pub fn cursor(&self) -> CursorIcon {
        self.gesture.cursor(&self.tree)
    }

    pub fn part_id(&self, part: Part) -> ComponentId {
        match part {
            Part::Root => self.root,
            Part::TimeRuler => self.parts.time_ruler,
            Part::PitchRuler => self.parts.pitch_ruler,
            Part::Grid => self.parts.grid,
            Part::VelocityRuler => self.parts.velocity_ruler,
            Part::VelocityTrack => self.parts.velocity_track,
            Part::Border => self.parts.border,
        }
    }

    /// Bounds of a part relative to the sequencer's top-left corner.
    pub fn part_rect(&self, part: Part) -> Rect {
        self.tree.absolute_rect(self.part_id(part))
    }

    // ---- input ----

    /// Feeds one pointer sample, in sequencer coordinates.
    pub fn handle_pointer(&mut self, input: &PointerInput) {
        let before = self.ranges();
        self.gesture.handle(&mut self.tree, &mut self.model, input);
        self.after_interaction(before);
    }

    /// Draws the sequencer into the remaining space of `ui` and routes the
    /// frame's pointer and keyboard input to it.
    pub fn ui(&mut self, ui: &mut Ui) -> Response {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.resize(rect.width(), rect.height());

        let (events, egui_modifiers, time) = ui.input(|i| (i.events.clone(), i.modifiers, i.time));
        let modifiers = Modifiers {
            shift: egui_modifiers.shift,
            option: egui_modifiers.alt || egui_modifiers.ctrl,
        };
        let time_ms = time * 1000.0;
        let offset = rect.min.to_vec2();

        for event in events {
            match event {
                Event::PointerMoved(pos) => {
                    let input = PointerInput::moved(pos - offset, self.primary_down, time_ms);
                    self.handle_pointer(&input.with_modifiers(modifiers));
                }
                Event::PointerButton {
                    pos,
                    button: PointerButton::Primary,
                    pressed,
                    ..
                } => {
                    if pressed && rect.contains(pos) {
                        self.primary_down = true;
                        response.request_focus();
                        let input = PointerInput::press(pos - offset, time_ms);
                        self.handle_pointer(&input.with_modifiers(modifiers));
                    } else if !pressed && self.primary_down {
                        self.primary_down = false;
                        let input = PointerInput::release(pos - offset, time_ms);
                        self.handle_pointer(&input.with_modifiers(modifiers));
                    }
                }
                Event::Key {
                    key: Key::Delete | Key::Backspace,
                    pressed: true,
                    ..
                } if response.has_focus() || response.hovered() => {
                    let before = self.ranges();
                    self.delete_selection();
                    self.after_interaction(before);
                }
                _ => {}
            }
        }

        if self.needs_render() {
            self.render();
        }
        let painter = ui.painter_at(rect);
        self.layers.replay(&self.tree.paint_order(), &painter, offset);

        if response.hovered() || self.primary_down {
            ui.ctx().set_cursor_icon(self.cursor());
        }
        response
    }

    // ---- commands ----

    pub fn apply_command(&mut self, command: SequencerCommand) -> SequencerResult<()> {
        let before = self.ranges();
        match command {
            SequencerCommand::ReplaceSnapshot(snapshot) => self.replace_snapshot(snapshot),
            SequencerCommand::SetNotes(records) => self.replace_notes(records),
            SequencerCommand::ClearNotes => self.replace_notes(Vec::new()),
            SequencerCommand::DeleteSelection => {
                self.delete_selection();
            }
            SequencerCommand::SelectAll => self.model.grid.select_all(),
            SequencerCommand::SetTimeStart(value) => {
                self.model.display.set_time_start(value);
            }
            SequencerCommand::SetDuration(value) => {
                self.model.display.set_duration(value);
            }
            SequencerCommand::SetTheme(name) => self.switch_theme(&name)?,
            SequencerCommand::SetSignature(signature) => {
                self.model.display.signature = validate_signature(signature)?;
            }
            SequencerCommand::SetAdaptiveMode(adaptive) => self.model.display.adaptive_mode = adaptive,
            SequencerCommand::SetAdaptiveIndex(index) => self.model.grid.set_adaptive_index(index),
            SequencerCommand::SetFixedIndex(index) => self.model.grid.set_fixed_index(index),
            SequencerCommand::SetVisibleTimeRange(range) => self.model.display.set_visible_time_range(range),
            SequencerCommand::SetVerticalRange(range) => self.model.display.set_vertical_range(range),
            SequencerCommand::SetColors(colors) => self.model.display.colors = colors,
            SequencerCommand::SetDefaultVelocity(velocity) => {
                self.model.grid.current_velocity = velocity.min(MAX_VELOCITY);
            }
        }
        self.tree.repaint(self.root);
        self.after_interaction(before);
        Ok(())
    }

    /// Host attributes: `time-start`, `duration` and `theme`. Invalid
    /// values are logged and leave the sequencer unchanged.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> SequencerResult<()> {
        let result = match name {
            "time-start" => parse_number_attribute(name, value)
                .and_then(|v| self.apply_command(SequencerCommand::SetTimeStart(v))),
            "duration" => parse_number_attribute(name, value)
                .and_then(|v| self.apply_command(SequencerCommand::SetDuration(v))),
            "theme" => self.apply_command(SequencerCommand::SetTheme(value.to_string())),
            _ => Err(SequencerError::UnknownAttribute(name.to_string())),
        };
        result.inspect_err(|err| log::warn!("ignoring attribute {name}=\"{value}\": {err}"))
    }

    pub fn set_theme(&mut self, name: &str) -> SequencerResult<()> {
        self.apply_command(SequencerCommand::SetTheme(name.to_string()))
    }

    fn switch_theme(&mut self, name: &str) -> SequencerResult<()> {
        let theme = look_and_feel_by_name(name).ok_or_else(|| SequencerError::UnknownTheme(name.to_string()))?;
        let theme_name = theme.name();
        self.model.display.colors = theme.default_colors();
        self.model.theme = theme;
        self.model.push_event(SequencerEvent::ThemeChanged(theme_name));
        log::info!("theme set to {theme_name}");
        Ok(())
    }

    fn replace_notes(&mut self, records: Vec<NoteRecord>) {
        let count = records.len();
        self.model.grid.set_notes(records);
        self.model.push_event(SequencerEvent::NotesReplaced { count });
    }

    fn replace_snapshot(&mut self, mut snapshot: SequencerSnapshot) {
        let fixes = snapshot.sanitize();
        if fixes > 0 {
            log::warn!("snapshot had {fixes} out-of-range values, clamped");
        }
        let display = &mut self.model.display;
        display.signature = snapshot.signature;
        display.max_time_range = Range::new(snapshot.time_start, snapshot.time_start + snapshot.length);
        display.visible_time_range = snapshot.visible_time_range;
        display.vertical_range = snapshot.vertical_range;
        display.enforce_invariants();

        self.replace_notes(snapshot.notes);
        self.model.grid.select_indices(&snapshot.selected);
    }

    fn delete_selection(&mut self) -> usize {
        let deleted = self.model.grid.delete_selection();
        if deleted > 0 {
            log::debug!("deleted {deleted} selected notes");
            self.tree.repaint(self.root);
        }
        deleted
    }

    // ---- notes & persistence ----

    pub fn add_note(&mut self, note: Note) -> NoteId {
        let before = self.ranges();
        let id = self.model.grid.add_note(note);
        self.tree.repaint(self.root);
        self.after_interaction(before);
        id
    }

    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let before = self.ranges();
        let note = self.model.grid.remove_note(id);
        self.tree.repaint(self.root);
        self.after_interaction(before);
        note
    }

    pub fn snapshot(&self) -> SequencerSnapshot {
        let display = &self.model.display;
        let grid = &self.model.grid;
        SequencerSnapshot {
            notes: grid.notes().iter().map(Note::to_record).collect(),
            signature: display.signature,
            time_start: display.max_time_range.start,
            length: display.max_time_range.len(),
            visible_time_range: display.visible_time_range,
            vertical_range: display.vertical_range,
            selected: grid.selected_indices(),
        }
    }

    /// Replaces notes and view with `snapshot`; out-of-range values are
    /// clamped first.
    pub fn load_snapshot(&mut self, snapshot: SequencerSnapshot) {
        let before = self.ranges();
        self.replace_snapshot(snapshot);
        self.tree.repaint(self.root);
        self.after_interaction(before);
    }

    pub fn import_midi(&mut self, bytes: &[u8]) -> SequencerResult<()> {
        let snapshot = structure::load_midi(bytes)?;
        self.load_snapshot(snapshot);
        Ok(())
    }

    pub fn export_midi(&self) -> SequencerResult<Vec<u8>> {
        structure::export_midi(&self.snapshot())
    }

    // ---- accessors ----

    pub fn notes(&self) -> &[Note] {
        self.model.grid.notes()
    }

    pub fn grid(&self) -> &NoteGrid {
        &self.model.grid
    }

    pub fn display(&self) -> &DisplayModel {
        &self.model.display
    }

    pub fn theme_name(&self) -> &'static str {
        self.model.theme.name()
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.is_dragging()
    }
}

fn validate_signature(signature: TimeSignature) -> SequencerResult<TimeSignature> {
    TimeSignature::new(signature.upper, signature.lower).ok_or(SequencerError::InvalidSignature {
        upper: signature.upper,
        lower: signature.lower,
    })
}
