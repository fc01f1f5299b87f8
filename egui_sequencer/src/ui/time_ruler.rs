use super::SequencerModel;
use crate::component::surface::Surface;
use crate::component::{Component, EventCtx, MouseEvent, RenderCtx};
use crate::grid::GridView;
use crate::view::TimeZoomAnchor;
use egui::{pos2, vec2, Align2, Rect};

const MIN_LABEL_SPACING: f64 = 50.0;
const MIN_GRADUATION_SPACING: f64 = 5.0;
const LABEL_SIZE: f32 = 11.0;

/// Ruler above the grid. Dragging vertically zooms the time axis around
/// the time under the pointer.
#[derive(Default)]
pub struct TimeRuler {
    anchor: Option<TimeZoomAnchor>,
}

/// Label spacing and graduation spacing, in sixteenths, for a zoom level.
pub fn graduation_steps(sixteenth: f64) -> (f64, f64) {
    let mut label = 1.0;
    while sixteenth * label < MIN_LABEL_SPACING {
        label *= 2.0;
    }

    let mut increment = 1.0;
    if sixteenth * increment < MIN_GRADUATION_SPACING {
        while sixteenth * increment < MIN_GRADUATION_SPACING {
            increment *= 2.0;
        }
    } else {
        while sixteenth * increment * 0.5 > MIN_GRADUATION_SPACING {
            increment *= 0.5;
        }
    }
    (label, increment)
}

fn is_multiple(value: f64, step: f64) -> bool {
    ((value / step).round() * step - value).abs() < 1e-6
}

impl Component<SequencerModel> for TimeRuler {
    fn mouse_pressed(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let view = GridView::new(ctx.position(), vec2(ctx.width(), ctx.height()), &ctx.model.display);
        if view.is_degenerate() {
            return;
        }
        self.anchor = Some(ctx.model.display.time_zoom_anchor(view.time_at(event.position.x)));
    }

    fn mouse_dragged(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let Some(anchor) = self.anchor else {
            return;
        };
        let width = ctx.width();
        if width <= 0.0 {
            return;
        }
        let pointer_ratio = f64::from((event.position.x - ctx.position().x) / width);
        ctx.model
            .display
            .zoom_time(&anchor, f64::from(event.drag_delta().y), pointer_ratio);
        ctx.repaint_parent();
    }

    fn mouse_released(&mut self, _ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        self.anchor = None;
    }

    fn double_clicked(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        ctx.model.display.reset_time_view();
        ctx.repaint_parent();
    }

    fn render(&self, ctx: &RenderCtx<'_, SequencerModel>, surface: &mut dyn Surface) {
        let (width, height) = (ctx.width(), ctx.height());
        let display = &ctx.model.display;
        let colors = &display.colors;
        surface.fill_rect(Rect::from_min_size(pos2(0.0, 0.0), vec2(width, height)), colors.background);

        let view = GridView::new(ctx.position(), vec2(width, height), display);
        let sixteenth = view.sixteenth_width();
        if !(sixteenth.is_finite() && sixteenth >= 1e-4) {
            return;
        }

        let (label_step, increment) = graduation_steps(sixteenth);
        let start = display.visible_time_range.start;
        let end = display.visible_time_range.end;
        let mut i = (start / increment).ceil() * increment;
        while i < end.ceil() {
            let x = ((i - start) * sixteenth) as f32;
            let grad = if is_multiple(i, increment * 4.0) { 0.4 } else { 0.12 };
            let grad_h = height * grad;
            surface.fill_rect(
                Rect::from_min_size(pos2(x, height - grad_h), vec2(1.0, grad_h)),
                colors.stroke_light,
            );

            if is_multiple(i, label_step) {
                let label = display.signature.string_for_time(i, true);
                surface.text(pos2(x + 4.0, height - 5.0), Align2::LEFT_BOTTOM, &label, LABEL_SIZE, colors.text);
            }
            i += increment;
        }

        // Bottom border
        surface.fill_rect(Rect::from_min_size(pos2(0.0, height - 1.0), vec2(width, 1.0)), colors.stroke_dark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graduation_steps_follow_zoom() {
        // 10 px per sixteenth: labels every 8, ticks every sixteenth.
        assert_eq!(graduation_steps(10.0), (8.0, 1.0));
        // Very wide sixteenths subdivide the ticks.
        assert_eq!(graduation_steps(100.0), (1.0, 0.0625));
        // Narrow sixteenths group the ticks.
        assert_eq!(graduation_steps(1.0), (64.0, 8.0));
    }
}
