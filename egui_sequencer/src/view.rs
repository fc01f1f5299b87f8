//! 显示模型
//!
//! 可见时间区间、最大时间区间、音高区间以及它们的缩放/平移操作。
//! 每个公开操作结束后都保证：可见时间区间 ⊆ 最大时间区间，音高区间 ⊆ [0,127]。

use crate::structure::{Range, TimeSignature, MAX_PITCH, MAX_SEMITONE_HEIGHT, MIN_PITCH};
use crate::theme::Colors;

/// Smallest visible time span reachable by zooming, in sixteenths.
pub const MIN_VISIBLE_TIME: f64 = 1.0;
/// Smallest vertical span reachable by zooming, in semitones.
pub const MIN_VISIBLE_PITCHES: f64 = 1.0;
const TIME_ZOOM_SENSITIVITY: f64 = 0.005;

pub const PITCH_BOUNDS: Range = Range::new(MIN_PITCH as f64, MAX_PITCH as f64);

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayModel {
    pub max_time_range: Range,
    pub visible_time_range: Range,
    pub vertical_range: Range,
    pub signature: TimeSignature,
    pub adaptive_mode: bool,
    /// Divisor applied to the vertical range for one pitch zoom step.
    pub zoom_sensitivity: f64,
    /// Velocity lane height in pixels, or a fraction of the total height
    /// when negative (`-0.25` is a quarter).
    pub velocity_track_height: f32,
    pub colors: Colors,
}

impl Default for DisplayModel {
    fn default() -> Self {
        Self {
            max_time_range: Range::new(0.0, 32.0),
            visible_time_range: Range::new(0.0, 16.0),
            vertical_range: Range::new(58.0, 82.0),
            signature: TimeSignature::default(),
            adaptive_mode: true,
            zoom_sensitivity: 30.0,
            velocity_track_height: 80.0,
            colors: Colors::default(),
        }
    }
}

/// Values captured when a time-ruler drag starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeZoomAnchor {
    pub range: Range,
    pub time: f64,
}

impl DisplayModel {
    /// Restores the range invariants after any mutation.
    pub fn enforce_invariants(&mut self) {
        if !(self.max_time_range.start.is_finite() && self.max_time_range.start >= 0.0) {
            self.max_time_range.start = 0.0;
        }
        if !(self.max_time_range.end.is_finite() && self.max_time_range.end >= self.max_time_range.start) {
            self.max_time_range.end = self.max_time_range.start;
        }
        self.visible_time_range = self.visible_time_range.clamped_to(&self.max_time_range);
        self.vertical_range = self.vertical_range.clamped_to(&PITCH_BOUNDS);
    }

    pub fn time_zoom_anchor(&self, time: f64) -> TimeZoomAnchor {
        TimeZoomAnchor {
            range: self.visible_time_range,
            time,
        }
    }

    /// Vertical drag on the time ruler: dragging down zooms in, up zooms out,
    /// keeping the time under the pointer in place. `pointer_ratio` is the
    /// pointer position across the grid width (0 at the left edge).
    pub fn zoom_time(&mut self, anchor: &TimeZoomAnchor, drag_offset_y: f64, pointer_ratio: f64) {
        let zoom_factor = 1.0 + drag_offset_y * TIME_ZOOM_SENSITIVITY;
        let original = anchor.range.len();
        let amount_to_add = (original * zoom_factor - original) / 2.0;

        let mut new_start = anchor.range.start + amount_to_add;
        let mut new_end = anchor.range.end - amount_to_add;

        // Keep at least the minimal range
        let excess = (MIN_VISIBLE_TIME - (new_end - new_start)).max(0.0);
        new_start -= excess * 0.5;
        new_end += excess * 0.5;

        let max = self.max_time_range;
        self.visible_time_range = Range::new(max.start.max(new_start), max.end.min(new_end));

        // Shift so the anchor time stays under the pointer
        let visible = self.visible_time_range;
        let time_at_pointer = visible.start + pointer_ratio * visible.len();
        let distance_to_left = max.start - visible.start;
        let distance_to_right = visible.end - max.end;
        let offset = (anchor.time - time_at_pointer).max(distance_to_left).min(-distance_to_right);

        self.visible_time_range = Range::new(max.start.max(new_start + offset), max.end.min(new_end + offset));
        self.enforce_invariants();
    }

    /// Shows the whole clip.
    pub fn reset_time_view(&mut self) {
        self.visible_time_range = self.max_time_range;
        self.enforce_invariants();
    }

    pub fn zoom_pitch_in(&mut self, semitone_height: f64) {
        if semitone_height >= MAX_SEMITONE_HEIGHT {
            return;
        }
        let range = self.vertical_range.len();
        let amount = range / self.zoom_sensitivity.max(1.0);
        if range - 2.0 * amount < MIN_VISIBLE_PITCHES {
            return;
        }
        self.vertical_range.start += amount;
        self.vertical_range.end -= amount;
        self.enforce_invariants();
    }

    pub fn zoom_pitch_out(&mut self) {
        let amount = self.vertical_range.len() / self.zoom_sensitivity.max(1.0);
        self.vertical_range.start = (self.vertical_range.start - amount).max(PITCH_BOUNDS.start);
        self.vertical_range.end = (self.vertical_range.end + amount).min(PITCH_BOUNDS.end);
        self.enforce_invariants();
    }

    /// Scrolls the vertical range by `amount` pixels, clipped to the pitch
    /// bounds without changing the span.
    pub fn translate_pitch(&mut self, amount: f64, semitone_height: f64) {
        if !(semitone_height > 0.0 && semitone_height.is_finite()) || amount == 0.0 {
            return;
        }
        let delta = amount / semitone_height;
        let Range { start, end } = self.vertical_range;
        if delta < 0.0 {
            let desired_min = start + delta;
            let clipped = desired_min.max(PITCH_BOUNDS.start);
            self.vertical_range = Range::new(clipped, end + (clipped - desired_min) + delta);
        } else {
            let desired_max = end + delta;
            let clipped = desired_max.min(PITCH_BOUNDS.end);
            self.vertical_range = Range::new(start + (clipped - desired_max) + delta, clipped);
        }
        self.enforce_invariants();
    }

    pub fn reset_pitch_view(&mut self) {
        self.vertical_range = PITCH_BOUNDS;
    }

    /// Moves the clip start, shifting the whole time frame. Returns the
    /// applied (clamped) value.
    pub fn set_time_start(&mut self, value: f64) -> f64 {
        let value = value.max(0.0);
        let offset = value - self.max_time_range.start;
        if offset != 0.0 {
            self.max_time_range.start += offset;
            self.max_time_range.end += offset;
            self.visible_time_range = self.visible_time_range.translated_into(&self.max_time_range);
        }
        self.enforce_invariants();
        value
    }

    /// Sets the clip length. Returns the applied (clamped) value.
    pub fn set_duration(&mut self, value: f64) -> f64 {
        let value = value.max(0.0);
        self.max_time_range.end = self.max_time_range.start + value;
        self.enforce_invariants();
        value
    }

    pub fn set_visible_time_range(&mut self, range: Range) {
        self.visible_time_range = range;
        self.enforce_invariants();
    }

    pub fn set_vertical_range(&mut self, range: Range) {
        self.vertical_range = range;
        self.enforce_invariants();
    }

    /// Height in pixels of the velocity lane for a component of `height`.
    pub fn velocity_lane_height(&self, height: f32) -> f32 {
        let wanted = if self.velocity_track_height < 0.0 {
            height * -self.velocity_track_height
        } else {
            self.velocity_track_height
        };
        wanted.clamp(0.0, (height - MIN_GRID_HEIGHT).max(0.0))
    }
}

/// The draggable border never moves closer than this to the top.
pub const MIN_GRID_HEIGHT: f32 = 80.0;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_invariants(model: &DisplayModel) {
        assert!(model.max_time_range.contains_range(&model.visible_time_range), "{model:?}");
        assert!(PITCH_BOUNDS.contains_range(&model.vertical_range), "{model:?}");
        assert!(model.visible_time_range.len() >= 0.0);
    }

    #[test]
    fn time_zoom_keeps_anchor_under_pointer() {
        let mut model = DisplayModel::default();
        let anchor = model.time_zoom_anchor(8.0);
        // Dragging down by 100 px halves the visible span around the middle.
        model.zoom_time(&anchor, 100.0, 0.5);
        assert_relative_eq!(model.visible_time_range.start, 4.0);
        assert_relative_eq!(model.visible_time_range.end, 12.0);
        assert_invariants(&model);
    }

    #[test]
    fn time_zoom_respects_bounds_and_minimum() {
        let mut model = DisplayModel::default();
        let anchor = model.time_zoom_anchor(0.0);
        model.zoom_time(&anchor, -2000.0, 0.0);
        assert_eq!(model.visible_time_range, model.max_time_range);

        let anchor = model.time_zoom_anchor(16.0);
        model.zoom_time(&anchor, 2000.0, 0.5);
        assert_relative_eq!(model.visible_time_range.start, 15.5);
        assert_relative_eq!(model.visible_time_range.len(), MIN_VISIBLE_TIME);
        assert_invariants(&model);
    }

    #[test]
    fn random_range_operations_keep_invariants() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut model = DisplayModel::default();
        for _ in 0..2000 {
            match rng.u8(0..7) {
                0 => {
                    let anchor = model.time_zoom_anchor(rng.f64() * 40.0 - 4.0);
                    model.zoom_time(&anchor, rng.f64() * 600.0 - 300.0, rng.f64() * 1.4 - 0.2);
                }
                1 => model.zoom_pitch_in(rng.f64() * 40.0),
                2 => model.zoom_pitch_out(),
                3 => model.translate_pitch(rng.f64() * 400.0 - 200.0, rng.f64() * 30.0),
                4 => {
                    model.set_time_start(rng.f64() * 64.0 - 16.0);
                }
                5 => {
                    model.set_duration(rng.f64() * 64.0 - 8.0);
                }
                _ => model.reset_time_view(),
            }
            assert_invariants(&model);
        }
    }

    #[test]
    fn pitch_translate_clips_without_resizing() {
        let mut model = DisplayModel::default();
        model.set_vertical_range(Range::new(100.0, 124.0));
        model.translate_pitch(100.0, 10.0);
        assert_eq!(model.vertical_range, Range::new(103.0, 127.0));
        model.translate_pitch(-50.0, 10.0);
        assert_eq!(model.vertical_range, Range::new(98.0, 122.0));
    }

    #[test]
    fn pitch_zoom_stops_at_max_semitone_height() {
        let mut model = DisplayModel::default();
        let before = model.vertical_range;
        model.zoom_pitch_in(MAX_SEMITONE_HEIGHT);
        assert_eq!(model.vertical_range, before);
        model.zoom_pitch_in(10.0);
        assert_relative_eq!(model.vertical_range.len(), 24.0 - 2.0 * 24.0 / 30.0);
        model.reset_pitch_view();
        model.zoom_pitch_out();
        assert_eq!(model.vertical_range, PITCH_BOUNDS);
    }

    #[test]
    fn clip_start_shifts_the_frame() {
        let mut model = DisplayModel::default();
        assert_eq!(model.set_time_start(-3.0), 0.0);
        assert_eq!(model.set_time_start(8.0), 8.0);
        assert_eq!(model.max_time_range, Range::new(8.0, 40.0));
        assert_eq!(model.visible_time_range, Range::new(8.0, 24.0));

        assert_eq!(model.set_duration(4.0), 4.0);
        assert_eq!(model.max_time_range, Range::new(8.0, 12.0));
        assert_eq!(model.visible_time_range, Range::new(8.0, 12.0));
    }

    #[test]
    fn velocity_lane_supports_fractions() {
        let mut model = DisplayModel::default();
        assert_eq!(model.velocity_lane_height(400.0), 80.0);
        model.velocity_track_height = -0.25;
        assert_eq!(model.velocity_lane_height(400.0), 100.0);
        model.velocity_track_height = 1000.0;
        assert_eq!(model.velocity_lane_height(400.0), 320.0);
    }
}
