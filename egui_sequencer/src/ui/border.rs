use super::root::border_dragged;
use super::SequencerModel;
use crate::component::surface::Surface;
use crate::component::{Component, EventCtx, MouseEvent, RenderCtx};
use egui::{vec2, CursorIcon, Pos2, Rect};

/// Horizontal bar between the grid and the velocity lane.
#[derive(Default)]
pub struct DraggableBorder {
    initial_y: f32,
}

impl Component<SequencerModel> for DraggableBorder {
    fn resized(&mut self, ctx: &mut EventCtx<'_, SequencerModel>) {
        ctx.set_cursor(CursorIcon::ResizeVertical);
    }

    fn render(&self, ctx: &RenderCtx<'_, SequencerModel>, surface: &mut dyn Surface) {
        let colors = &ctx.model.display.colors;
        let color = if ctx.is_hovered() || ctx.is_being_dragged() {
            colors.draggable_border_hover
        } else {
            colors.draggable_border
        };
        surface.fill_rect(Rect::from_min_size(Pos2::ZERO, vec2(ctx.width(), ctx.height())), color);
    }

    fn mouse_enter(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        ctx.repaint();
    }

    fn mouse_exit(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        ctx.repaint();
    }

    fn mouse_pressed(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        self.initial_y = ctx.position().y;
    }

    fn mouse_dragged(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let new_position = self.initial_y + event.drag_delta().y;
        border_dragged(ctx, new_position);
    }

    fn mouse_released(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        ctx.repaint();
    }
}
