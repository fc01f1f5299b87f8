use super::SequencerModel;
use crate::component::surface::Surface;
use crate::component::{Component, EventCtx, MouseEvent, RenderCtx};
use crate::grid::GridView;
use crate::lasso::LassoSelector;
use crate::structure::{NoteId, MAX_VELOCITY};
use crate::theme::{TimeAxis, VelocityHandle};
use egui::{pos2, vec2, Pos2, Rect};

const HANDLE_RADIUS: f32 = 3.0;
const HANDLE_HIT_DISTANCE_SQUARED: f32 = 64.0;

/// Velocity lane below the grid: one handle per note, shared selection
/// with the grid and its own lasso.
#[derive(Default)]
pub struct VelocityTrack {
    lasso: LassoSelector<NoteId>,
    mouse_down_result: bool,
    /// Velocities of the selected notes when a handle was pressed.
    initial: Option<Vec<(NoteId, u8)>>,
}

fn view(ctx: &EventCtx<'_, SequencerModel>) -> GridView {
    GridView::new(ctx.position(), vec2(ctx.width(), ctx.height()), &ctx.model.display)
}

fn velocity_scale(height: f32) -> f32 {
    height / f32::from(MAX_VELOCITY)
}

fn handle_center(view: &GridView, time: f64, velocity: u8) -> Pos2 {
    pos2(view.x_for_time(time), view.height - f32::from(velocity) * velocity_scale(view.height))
}

impl VelocityTrack {
    /// Front-most note whose handle is under `position` (absolute).
    fn find_handle_at(ctx: &EventCtx<'_, SequencerModel>, position: Pos2) -> Option<NoteId> {
        let view = view(ctx);
        let local = view.local(position);
        ctx.model
            .grid
            .displayed_notes()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .find(|n| (handle_center(&view, n.time, n.velocity) - local).length_sq() < HANDLE_HIT_DISTANCE_SQUARED)
            .map(|n| n.id)
    }
}

impl Component<SequencerModel> for VelocityTrack {
    fn render(&self, ctx: &RenderCtx<'_, SequencerModel>, surface: &mut dyn Surface) {
        let (width, height) = (ctx.width(), ctx.height());
        let model = ctx.model;
        let colors = &model.display.colors;
        surface.fill_rect(Rect::from_min_size(pos2(0.0, 0.0), vec2(width, height)), colors.background);

        let view = GridView::new(ctx.position(), vec2(width, height), &model.display);
        let sixteenth = view.sixteenth_width();
        if !(sixteenth.is_finite() && sixteenth > 0.0) || height <= 0.0 {
            return;
        }
        if let Some(increment) = model.grid.time_increment(&view) {
            let axis = TimeAxis {
                height,
                sixteenth,
                increment,
                start: view.visible.start,
                end: view.visible.end,
                signature: view.signature,
            };
            model.theme.draw_time_background(surface, &axis, colors);
        }

        self.lasso.draw_lasso(surface, colors);

        let v_scale = velocity_scale(height);
        for note in model.grid.displayed_notes() {
            let x = view.x_for_time(note.time);
            if x < -5.0 || x > width + 5.0 {
                continue;
            }
            let handle = VelocityHandle {
                x,
                width: (note.duration * sixteenth) as f32,
                velocity: note.velocity,
                selected: model.grid.is_selected(note.id),
            };
            model
                .theme
                .draw_velocity_handle(surface, &handle, height, v_scale, HANDLE_RADIUS, colors);
        }
    }

    fn mouse_pressed(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        self.initial = None;

        let Some(id) = Self::find_handle_at(ctx, event.position) else {
            let origin = ctx.position();
            let grid = &mut ctx.model.grid;
            if !event.modifiers.shift {
                grid.selection_mut().deselect_all();
            }
            self.lasso.begin_lasso(event, origin, grid.selection());
            self.mouse_down_result = true;
            ctx.repaint_parent();
            return;
        };

        let grid = &mut ctx.model.grid;
        grid.begin_edit();
        self.mouse_down_result = grid.selection_mut().add_to_selection_mouse_down(id, event.modifiers.shift);
        grid.move_note_to_front(id);
        let initial = grid
            .notes()
            .iter()
            .filter(|n| grid.is_selected(n.id))
            .map(|n| (n.id, n.velocity))
            .collect();
        self.initial = Some(initial);
        ctx.repaint_parent();
    }

    fn mouse_dragged(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        if !event.was_dragged {
            return;
        }

        match &self.initial {
            Some(initial) => {
                let v_scale = velocity_scale(ctx.height());
                if v_scale <= 0.0 {
                    return;
                }
                let scaled = event.drag_delta().y / v_scale;
                for &(id, velocity) in initial {
                    if let Some(note) = ctx.model.grid.note_mut(id) {
                        let v = (f32::from(velocity) - scaled).round();
                        note.velocity = v.clamp(1.0, f32::from(MAX_VELOCITY)) as u8;
                    }
                }
            }
            None => {
                let view = view(ctx);
                let origin = view.origin;
                let grid = &mut ctx.model.grid;
                let boxes: Vec<(NoteId, Rect)> = grid
                    .displayed_notes()
                    .map(|n| {
                        let center = handle_center(&view, n.time, n.velocity);
                        (n.id, Rect::from_center_size(center, vec2(HANDLE_RADIUS, HANDLE_RADIUS) * 2.0))
                    })
                    .collect();
                self.lasso.drag_lasso(event, origin, grid.selection_mut(), |lasso| {
                    boxes
                        .iter()
                        .filter(|(_, rect)| rect.intersects(lasso))
                        .map(|(id, _)| *id)
                        .collect()
                });
            }
        }
        ctx.repaint_parent();
    }

    fn mouse_released(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        self.lasso.end_lasso();
        let grid = &mut ctx.model.grid;
        grid.selection_mut()
            .add_to_selection_mouse_up(event.was_dragged, event.modifiers.shift, self.mouse_down_result);
        if self.initial.take().is_some() {
            grid.finish_edit();
        }
        ctx.repaint_parent();
    }
}

/// Graduations and labels left of the velocity lane.
#[derive(Default)]
pub struct VelocityRuler;

impl Component<SequencerModel> for VelocityRuler {
    fn render(&self, ctx: &RenderCtx<'_, SequencerModel>, surface: &mut dyn Surface) {
        let (width, height) = (ctx.width(), ctx.height());
        let colors = &ctx.model.display.colors;
        surface.fill_rect(Rect::from_min_size(pos2(0.0, 0.0), vec2(width, height)), colors.background);
        ctx.model.theme.draw_velocity_ruler(surface, width, height, colors);
    }
}
