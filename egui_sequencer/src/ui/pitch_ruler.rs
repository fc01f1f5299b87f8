use super::SequencerModel;
use crate::component::surface::Surface;
use crate::component::{Component, EventCtx, MouseEvent, RenderCtx};
use crate::editor::SequencerEvent;
use crate::grid::GridView;
use crate::theme::PitchAxis;
use egui::{pos2, vec2, Pos2, Rect};

const CHANGE_THRESHOLD: f32 = 8.0;
const CONSECUTIVE_THRESHOLD: u32 = 5;

/// Which of translate / zoom a ruler drag is currently doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragMode {
    #[default]
    Undecided,
    Translating,
    Zooming,
}

/// Dominant-axis detection with hysteresis for pitch ruler drags.
#[derive(Clone, Copy, Debug, Default)]
pub struct DragDirection {
    mode: DragMode,
    consecutive_horizontal: u32,
    consecutive_vertical: u32,
}

impl DragDirection {
    pub fn mode(&self) -> DragMode {
        self.mode
    }

    /// Feeds one pointer delta. Returns `true` to translate, `false` to
    /// zoom.
    pub fn should_translate(&mut self, dx: f32, dy: f32) -> bool {
        if dx.abs() > dy.abs() {
            self.consecutive_horizontal += 1;
            self.consecutive_vertical = 0;
        } else if dy.abs() > dx.abs() {
            self.consecutive_vertical += 1;
            self.consecutive_horizontal = 0;
        }

        let translate = match self.mode {
            DragMode::Translating => {
                let zoom = dx.abs() > (CHANGE_THRESHOLD + dy).abs()
                    || self.consecutive_horizontal > CONSECUTIVE_THRESHOLD;
                !zoom
            }
            DragMode::Zooming => {
                dy.abs() > (CHANGE_THRESHOLD + dx).abs() || self.consecutive_vertical > CONSECUTIVE_THRESHOLD
            }
            DragMode::Undecided => dy.abs() > dx.abs(),
        };
        self.mode = if translate {
            DragMode::Translating
        } else {
            DragMode::Zooming
        };
        translate
    }
}

/// Octave labels plus a piano keyboard. Dragging scrolls or zooms the
/// vertical range; pressing a key previews its pitch.
#[derive(Default)]
pub struct PitchRuler {
    last_position: Pos2,
    drag_started: bool,
    direction: DragDirection,
    previewed_pitch: Option<u8>,
    hovered_pitch: Option<u8>,
}

fn view(ctx: &EventCtx<'_, SequencerModel>) -> GridView {
    GridView::new(ctx.position(), vec2(ctx.width(), ctx.height()), &ctx.model.display)
}

impl PitchRuler {
    fn is_on_keys(ctx: &EventCtx<'_, SequencerModel>, position: Pos2) -> bool {
        let local_x = position.x - ctx.position().x;
        let semi = view(ctx).semitone_height();
        ctx.model.theme.is_on_piano_roll(local_x, ctx.width(), semi)
    }

    fn preview_at(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, y: f32) {
        let pitch = view(ctx).pitch_at(y);
        if self.previewed_pitch == Some(pitch) {
            return;
        }
        self.previewed_pitch = Some(pitch);
        ctx.model.push_event(SequencerEvent::PreviewPitch(Some(pitch)));
    }
}

impl Component<SequencerModel> for PitchRuler {
    fn render(&self, ctx: &RenderCtx<'_, SequencerModel>, surface: &mut dyn Surface) {
        let (width, height) = (ctx.width(), ctx.height());
        let display = &ctx.model.display;
        let colors = &display.colors;
        surface.fill_rect(Rect::from_min_size(pos2(0.0, 0.0), vec2(width, height)), colors.background);

        let view = GridView::new(ctx.position(), vec2(width, height), display);
        if view.is_degenerate() {
            return;
        }
        let axis = PitchAxis {
            width,
            height,
            start: display.vertical_range.start,
            end: display.vertical_range.end,
            semitone_height: view.semitone_height(),
        };
        let highlighted = self.previewed_pitch.or(self.hovered_pitch);
        ctx.model.theme.draw_pitch_ruler(surface, &axis, highlighted, colors);

        // Right border
        surface.fill_rect(Rect::from_min_size(pos2(width - 1.0, 0.0), vec2(1.0, height)), colors.stroke_dark);
    }

    fn mouse_moved(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        let hovered = Self::is_on_keys(ctx, event.position).then(|| view(ctx).pitch_at(event.position.y));
        if hovered != self.hovered_pitch {
            self.hovered_pitch = hovered;
            ctx.repaint();
        }
    }

    fn mouse_exit(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        if self.hovered_pitch.take().is_some() {
            ctx.repaint();
        }
    }

    fn mouse_pressed(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        if Self::is_on_keys(ctx, event.position) {
            self.preview_at(ctx, event.position.y);
            ctx.repaint();
        } else {
            self.drag_started = true;
        }
        self.last_position = event.position;
    }

    fn mouse_dragged(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        if self.drag_started {
            let delta = event.position - self.last_position;
            self.last_position = event.position;
            let semi = view(ctx).semitone_height();
            let display = &mut ctx.model.display;

            if self.direction.should_translate(delta.x, delta.y) {
                display.translate_pitch(f64::from(delta.y), semi);
            } else if delta.x > 0.0 {
                display.zoom_pitch_in(semi);
            } else {
                display.zoom_pitch_out();
            }
            ctx.repaint_parent();
        } else if Self::is_on_keys(ctx, event.position) {
            self.preview_at(ctx, event.position.y);
            ctx.repaint();
        }
    }

    fn mouse_released(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, _event: &MouseEvent) {
        self.drag_started = false;
        self.direction = DragDirection::default();
        if self.previewed_pitch.take().is_some() {
            ctx.model.push_event(SequencerEvent::PreviewPitch(None));
            ctx.repaint();
        }
    }

    fn double_clicked(&mut self, ctx: &mut EventCtx<'_, SequencerModel>, event: &MouseEvent) {
        if !Self::is_on_keys(ctx, event.position) {
            ctx.model.display.reset_pitch_view();
            ctx.repaint_parent();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_move_picks_the_dominant_axis() {
        let mut direction = DragDirection::default();
        assert!(direction.should_translate(1.0, 4.0));
        assert_eq!(direction.mode(), DragMode::Translating);

        let mut direction = DragDirection::default();
        assert!(!direction.should_translate(4.0, 1.0));
        assert_eq!(direction.mode(), DragMode::Zooming);
    }

    #[test]
    fn small_wobbles_do_not_switch_modes() {
        let mut direction = DragDirection::default();
        direction.should_translate(0.0, 5.0);
        // Slightly horizontal but under the threshold: keep translating.
        assert!(direction.should_translate(3.0, 1.0));
        // A big horizontal move switches to zooming.
        assert!(!direction.should_translate(12.0, 1.0));
    }

    #[test]
    fn sustained_horizontal_motion_switches_to_zoom() {
        let mut direction = DragDirection::default();
        direction.should_translate(0.0, 5.0);
        for _ in 0..5 {
            assert!(direction.should_translate(2.0, 1.0));
        }
        assert!(!direction.should_translate(2.0, 1.0));
    }
}
