use super::SequencerModel;
use crate::component::surface::Surface;
use crate::component::{Component, EventCtx, MouseEvent, RenderCtx};
use crate::grid::GridView;
use egui::vec2;

/// Component hosting the shared [`NoteGrid`](crate::grid::NoteGrid).
#[derive(Default)]
pub struct NoteGridComponent;

fn view(ctx: &EventCtx<'_, SequencerModel>) -> GridView {
    GridView::new(ctx.position(), vec2(ctx.width(), ctx.height()), &ctx.model.display)
}

impl Component<SequencerModel> for NoteGridComponent {
    fn render(&self, ctx: &RenderCtx<'_, SequencerModel>, surface: &mut dyn Surface) {
        let view = GridView::new(ctx.position(), vec2(ctx.width(), ctx.height()), &ctx.model.display);
        let model = ctx.model;
        model.grid.draw(&view, model.theme.as_ref(), &model.display.colors, surface);
    }

    fn mouse_moved(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let view = view(ctx);
        if let Some(cursor) = ctx.model.grid.mouse_moved(&view, event.position) {
            ctx.set_cursor(cursor);
        }
    }

    fn mouse_pressed(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let view = view(ctx);
        ctx.model.grid.mouse_pressed(&view, event);
        ctx.repaint_parent();
    }

    fn double_pressed(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let view = view(ctx);
        if let Some(cursor) = ctx.model.grid.double_pressed(&view, event) {
            ctx.set_cursor(cursor);
        }
        ctx.repaint_parent();
    }

    fn mouse_dragged(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let view = view(ctx);
        ctx.model.grid.mouse_dragged(&view, event);
        ctx.repaint_parent();
    }

    fn mouse_released(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        ctx.model.grid.mouse_released(event);
        let view = view(ctx);
        if let Some(cursor) = ctx.model.grid.mouse_moved(&view, event.position) {
            ctx.set_cursor(cursor);
        }
        ctx.repaint_parent();
    }
}
