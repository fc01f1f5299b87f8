use super::SequencerModel;
use crate::component::surface::Surface;
use crate::component::{Bounds, Component, ComponentId, EventCtx, RenderCtx};
use crate::view::MIN_GRID_HEIGHT;
use egui::{pos2, vec2, Rect};

pub const RULER_WIDTH: f32 = 40.0;
pub const RULER_HEIGHT: f32 = 40.0;
pub const BORDER_HEIGHT: f32 = 4.0;
/// The border snaps to the bottom edge within this distance.
const BORDER_SNAP: f32 = 50.0;

/// Ids of the root's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parts {
    pub time_ruler: ComponentId,
    pub pitch_ruler: ComponentId,
    pub grid: ComponentId,
    pub velocity_ruler: ComponentId,
    pub velocity_track: ComponentId,
    pub border: ComponentId,
}

/// Lays out the rulers, the grid, the velocity lane and the border between
/// them.
pub struct SequencerRoot {
    parts: Parts,
}

impl SequencerRoot {
    pub fn new(parts: Parts) -> Self {
        Self { parts }
    }
}

impl Component<SequencerModel> for SequencerRoot {
    fn resized(&mut self, ctx: &mut EventCtx<'_, SequencerModel>) {
        let (width, height) = (ctx.width(), ctx.height());
        let mut area = Bounds::from_size(width, height);

        let lane = ctx.model.display.velocity_lane_height(height);
        let mut velocity = area.remove_from_bottom(lane);
        let velocity_ruler = velocity.remove_from_left(RULER_WIDTH);
        ctx.set_child_bounds(self.parts.velocity_ruler, velocity_ruler);
        ctx.set_child_bounds(self.parts.velocity_track, velocity);

        let border = area.remove_from_bottom(BORDER_HEIGHT);
        ctx.set_child_bounds(self.parts.border, border);

        let mut time_ruler = area.remove_from_top(RULER_HEIGHT);
        time_ruler.remove_from_left(RULER_WIDTH);
        ctx.set_child_bounds(self.parts.time_ruler, time_ruler);

        let pitch_ruler = area.remove_from_left(RULER_WIDTH);
        ctx.set_child_bounds(self.parts.pitch_ruler, pitch_ruler);
        ctx.set_child_bounds(self.parts.grid, area);

        log::debug!("layout {width}x{height}, velocity lane {lane}");
        ctx.repaint();
    }

    fn render(&self, ctx: &RenderCtx<'_, SequencerModel>, surface: &mut dyn Surface) {
        let size = vec2(ctx.width(), ctx.height());
        surface.fill_rect(Rect::from_min_size(pos2(0.0, 0.0), size), ctx.model.display.colors.background);
    }
}

/// Moves the border separating the grid from the velocity lane to `y`
/// (root coordinates) and lays the root out again.
pub fn border_dragged(ctx: &mut EventCtx<'_, SequencerModel>, y: f32) {
    let Some(root) = ctx.tree.root() else {
        return;
    };
    let root_bounds = ctx.tree.bounds(root);
    let height = root_bounds.height as f32;

    let mut pos = (y - ctx.tree.position(root).y).min(height).max(MIN_GRID_HEIGHT);
    if pos > height - BORDER_SNAP {
        pos = if pos > height - BORDER_SNAP / 2.0 {
            height
        } else {
            height - BORDER_SNAP
        };
    }

    ctx.model.display.velocity_track_height = (height - pos).max(0.0);
    ctx.tree.set_bounds(root, root_bounds, ctx.model);
}
