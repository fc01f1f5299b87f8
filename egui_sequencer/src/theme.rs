//! 外观主题
//!
//! `LookAndFeel` 只负责绘制：输入为几何参数与颜色令牌，不持有任何状态。
//! 内置两个主题：`default`（圆角音符）与 `live`（直角音符、竖条力度）。

use crate::component::surface::Surface;
use crate::structure::{is_black_key, TimeSignature, MAX_PITCH};
use egui::{pos2, vec2, Align2, Color32, Pos2, Rect, Stroke};

const LABEL_SIZE: f32 = 11.0;

/// Semantic colour tokens shared by all components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Colors {
    pub background: Color32,
    pub background_alternate: Color32,
    pub background_black_key: Color32,
    pub stroke_light: Color32,
    pub stroke_dark: Color32,
    pub text: Color32,
    pub note_high: Color32,
    pub note_low_blend: Color32,
    pub note_outline: Color32,
    pub note_outline_selected: Color32,
    pub velocity_handle: Color32,
    pub velocity_handle_selected: Color32,
    pub lasso_background: Color32,
    pub lasso_outline: Color32,
    pub draggable_border: Color32,
    pub draggable_border_hover: Color32,
    pub black_key: Color32,
    pub white_key: Color32,
    pub hovered_key: Color32,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(0xfa, 0xfa, 0xfa),
            background_alternate: Color32::from_rgb(0xf0, 0xf0, 0xf3),
            background_black_key: Color32::from_rgb(0xe6, 0xe6, 0xea),
            stroke_light: Color32::from_rgb(0xd8, 0xd8, 0xde),
            stroke_dark: Color32::from_rgb(0x9a, 0x9a, 0xa4),
            text: Color32::from_rgb(0x40, 0x40, 0x48),
            note_high: Color32::from_rgb(0xe0, 0x4a, 0x3f),
            note_low_blend: Color32::from_rgb(0xf6, 0xd2, 0xcf),
            note_outline: Color32::from_rgb(0x7a, 0x22, 0x1c),
            note_outline_selected: Color32::from_rgb(0x1f, 0x6f, 0xeb),
            velocity_handle: Color32::from_rgb(0xe0, 0x4a, 0x3f),
            velocity_handle_selected: Color32::from_rgb(0x1f, 0x6f, 0xeb),
            lasso_background: Color32::from_rgba_unmultiplied(0x1f, 0x6f, 0xeb, 0x30),
            lasso_outline: Color32::from_rgb(0x1f, 0x6f, 0xeb),
            draggable_border: Color32::from_rgb(0xd8, 0xd8, 0xde),
            draggable_border_hover: Color32::from_rgb(0x9a, 0x9a, 0xa4),
            black_key: Color32::from_rgb(0x30, 0x30, 0x36),
            white_key: Color32::from_rgb(0xff, 0xff, 0xff),
            hovered_key: Color32::from_rgb(0xf6, 0xb8, 0x3c),
        }
    }
}

impl Colors {
    /// Darker palette used by the `live` theme.
    pub fn live() -> Self {
        Self {
            background: Color32::from_rgb(0x5e, 0x5e, 0x5e),
            background_alternate: Color32::from_rgb(0x56, 0x56, 0x56),
            background_black_key: Color32::from_rgb(0x52, 0x52, 0x52),
            stroke_light: Color32::from_rgb(0x4a, 0x4a, 0x4a),
            stroke_dark: Color32::from_rgb(0x2c, 0x2c, 0x2c),
            text: Color32::from_rgb(0xd0, 0xd0, 0xd0),
            note_high: Color32::from_rgb(0xff, 0x5e, 0x3a),
            note_low_blend: Color32::from_rgb(0xc9, 0xc9, 0xc9),
            note_outline: Color32::from_rgb(0x1e, 0x1e, 0x1e),
            note_outline_selected: Color32::from_rgb(0xff, 0xff, 0xff),
            velocity_handle: Color32::from_rgb(0xff, 0x5e, 0x3a),
            velocity_handle_selected: Color32::from_rgb(0xff, 0xff, 0xff),
            lasso_background: Color32::from_rgba_unmultiplied(0xff, 0xff, 0xff, 0x28),
            lasso_outline: Color32::from_rgb(0xe0, 0xe0, 0xe0),
            draggable_border: Color32::from_rgb(0x3a, 0x3a, 0x3a),
            draggable_border_hover: Color32::from_rgb(0x80, 0x80, 0x80),
            black_key: Color32::from_rgb(0x1e, 0x1e, 0x1e),
            white_key: Color32::from_rgb(0xc8, 0xc8, 0xc8),
            hovered_key: Color32::from_rgb(0xff, 0xa0, 0x30),
        }
    }
}

/// Linear blend from `a` (t = 0) to `b` (t = 1).
pub fn blend(a: Color32, b: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (f32::from(x) + (f32::from(y) - f32::from(x)) * t).round() as u8;
    Color32::from_rgba_unmultiplied(
        mix(a.r(), b.r()),
        mix(a.g(), b.g()),
        mix(a.b(), b.b()),
        mix(a.a(), b.a()),
    )
}

/// Fill colour of a note: full `note_high` at velocity 127, fading towards
/// `note_low_blend` as the velocity drops.
pub fn note_fill(velocity: u8, colors: &Colors) -> Color32 {
    let low = 1.0 - f32::from(velocity) / 127.0;
    blend(colors.note_high, colors.note_low_blend, low)
}

/// Width in sixteenths of the alternating background bands: one measure,
/// doubled or subdivided until a band is 100 to 200 px wide.
pub fn background_alternate_width(sixteenth: f64, signature: &TimeSignature) -> f64 {
    const MIN_ALTERNATE: f64 = 100.0;
    const MAX_ALTERNATE: f64 = 200.0;

    let mut alternate = signature.sixteenths_per_measure();
    if !(sixteenth > 0.0 && sixteenth.is_finite()) {
        return alternate;
    }

    if alternate * sixteenth > MAX_ALTERNATE {
        // Try alternating with each beat, then subdivide the beat.
        alternate /= f64::from(signature.upper);
        while alternate * sixteenth > MAX_ALTERNATE {
            alternate /= 2.0;
        }
    } else {
        while alternate * sixteenth < MIN_ALTERNATE {
            alternate *= 2.0;
        }
    }
    alternate
}

fn is_multiple(value: f64, step: f64) -> bool {
    step > 0.0 && ((value / step).round() * step - value).abs() < 1e-6
}

/// Horizontal geometry of the time axis inside one component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeAxis {
    pub height: f32,
    pub sixteenth: f64,
    pub increment: f64,
    pub start: f64,
    pub end: f64,
    pub signature: TimeSignature,
}

/// Vertical geometry of the pitch axis inside one component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchAxis {
    pub width: f32,
    pub height: f32,
    pub start: f64,
    pub end: f64,
    pub semitone_height: f64,
}

impl PitchAxis {
    /// Top edge of a pitch lane; the lane extends one semitone down from it.
    pub fn lane_top(&self, pitch: f64) -> f32 {
        (f64::from(self.height) - (pitch - self.start) * self.semitone_height) as f32
    }

    pub fn lane_bottom(&self, pitch: f64) -> f32 {
        self.lane_top(pitch) + self.semitone_height as f32
    }
}

/// One velocity handle as seen by the theme.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityHandle {
    pub x: f32,
    /// Displayed note length in pixels.
    pub width: f32,
    pub velocity: u8,
    pub selected: bool,
}

pub trait LookAndFeel {
    fn name(&self) -> &'static str;

    fn default_colors(&self) -> Colors {
        Colors::default()
    }

    /// The piano keys are only drawn above this semitone height.
    fn min_semitone_height(&self) -> f64 {
        5.0
    }

    fn draw_time_background(&self, surface: &mut dyn Surface, axis: &TimeAxis, colors: &Colors) {
        let TimeAxis {
            height,
            sixteenth,
            increment,
            start,
            end,
            signature,
        } = *axis;
        if !(sixteenth > 0.0 && sixteenth.is_finite() && increment > 0.0) {
            return;
        }
        if (end - start) / increment > 4096.0 {
            return;
        }

        let alternate = background_alternate_width(sixteenth, &signature);
        let period = alternate * 2.0;
        let mut band = (start / period).floor() * period;
        while band < end {
            let x = ((band - start) * sixteenth) as f32;
            let w = (alternate * sixteenth) as f32;
            surface.fill_rect(Rect::from_min_size(pos2(x, 0.0), vec2(w, height)), colors.background_alternate);
            band += period;
        }

        let measure = signature.sixteenths_per_measure();
        let mut i = (start / increment).ceil() * increment;
        while i < end.ceil() {
            let x = ((i - start) * sixteenth) as f32;
            let color = if is_multiple(i, measure) {
                // Larger lines for measures
                colors.stroke_dark
            } else {
                colors.stroke_light
            };
            surface.fill_rect(Rect::from_min_size(pos2(x, 0.0), vec2(1.0, height)), color);
            i += increment;
        }
    }

    fn draw_note(&self, surface: &mut dyn Surface, rect: Rect, velocity: u8, selected: bool, colors: &Colors) {
        let radius = 4.0_f32.min(rect.height() * 0.4).min(rect.width()).max(0.0);
        surface.fill_rounded_rect(rect, radius, note_fill(velocity, colors));
        if rect.height() >= 4.0 || selected {
            let stroke = if selected {
                Stroke::new(2.0, colors.note_outline_selected)
            } else {
                Stroke::new(1.0, colors.note_outline)
            };
            surface.stroke_rect(rect, radius, stroke);
        }
    }

    fn draw_velocity_handle(
        &self,
        surface: &mut dyn Surface,
        handle: &VelocityHandle,
        height: f32,
        v_scale: f32,
        radius: f32,
        colors: &Colors,
    ) {
        const ENDING_H: f32 = 6.0;
        let w = handle.width.max(0.0);
        let y = height - f32::from(handle.velocity) * v_scale;
        let color = if handle.selected {
            colors.velocity_handle_selected
        } else {
            colors.velocity_handle
        };

        surface.fill_rect(Rect::from_min_size(pos2(handle.x, y - 1.0), vec2(w, 2.0)), color);
        surface.fill_rect(
            Rect::from_min_size(pos2(handle.x + w - 1.0, y - ENDING_H * 0.5), vec2(2.0, ENDING_H)),
            color,
        );
        surface.circle(pos2(handle.x, y), radius, colors.background, Stroke::new(2.0, color));
    }

    fn draw_octave_lines(&self, surface: &mut dyn Surface, axis: &PitchAxis, colors: &Colors) {
        for pitch in (0..=MAX_PITCH).step_by(12) {
            let p = f64::from(pitch);
            if p >= axis.start && p <= axis.end {
                let y = axis.lane_bottom(p);
                surface.fill_rect(Rect::from_min_size(pos2(0.0, y), vec2(axis.width, 1.0)), colors.stroke_light);
            }
        }
    }

    fn draw_semitone_pattern(&self, surface: &mut dyn Surface, axis: &PitchAxis, colors: &Colors) {
        let semi = axis.semitone_height as f32;
        for pitch in axis.start.floor() as i32..=axis.end.ceil() as i32 {
            let top = axis.lane_top(f64::from(pitch));
            if is_black_key(pitch) {
                surface.fill_rect(
                    Rect::from_min_size(pos2(0.0, top), vec2(axis.width, semi)),
                    colors.background_black_key,
                );
            }
            // Line separation
            surface.fill_rect(Rect::from_min_size(pos2(0.0, top), vec2(axis.width, 1.0)), colors.stroke_light);
        }
    }

    fn draw_piano_roll(&self, surface: &mut dyn Surface, axis: &PitchAxis, hovered: Option<u8>, colors: &Colors) {
        let semi = axis.semitone_height as f32;
        let half = axis.width / 2.0;
        for pitch in axis.start.floor() as i32..=axis.end.ceil() as i32 {
            if !(0..=i32::from(MAX_PITCH)).contains(&pitch) {
                continue;
            }
            let top = axis.lane_top(f64::from(pitch));
            let fill = if hovered.is_some_and(|h| i32::from(h) == pitch) {
                colors.hovered_key
            } else if is_black_key(pitch) {
                colors.black_key
            } else {
                colors.white_key
            };
            surface.fill_rect(Rect::from_min_size(pos2(half, top), vec2(half, semi)), fill);
            surface.fill_rect(Rect::from_min_size(pos2(half, top), vec2(half, 1.0)), colors.stroke_light);
        }
    }

    fn draw_pitch_labels(&self, surface: &mut dyn Surface, axis: &PitchAxis, colors: &Colors) {
        let x = if self.is_piano_roll_visible(axis.semitone_height) {
            axis.width * 0.25
        } else {
            axis.width * 0.5
        };
        for pitch in (0..=MAX_PITCH).step_by(12) {
            let p = f64::from(pitch);
            if p + 6.0 >= axis.start && p <= axis.end {
                let y = axis.lane_bottom(p);
                let label_y = y - 6.0 * axis.semitone_height as f32;
                surface.text(
                    pos2(x, label_y),
                    Align2::CENTER_CENTER,
                    &octave_number(pitch).to_string(),
                    LABEL_SIZE,
                    colors.text,
                );
                surface.fill_rect(Rect::from_min_size(pos2(0.0, y), vec2(axis.width, 1.0)), colors.stroke_dark);
            }
        }
    }

    fn draw_pitch_ruler(&self, surface: &mut dyn Surface, axis: &PitchAxis, hovered: Option<u8>, colors: &Colors) {
        if self.is_piano_roll_visible(axis.semitone_height) {
            self.draw_piano_roll(surface, axis, hovered, colors);
            // left border
            surface.fill_rect(
                Rect::from_min_size(pos2(axis.width / 2.0, 0.0), vec2(1.0, axis.height)),
                colors.stroke_light,
            );
        }
        self.draw_pitch_labels(surface, axis, colors);
    }

    fn is_piano_roll_visible(&self, semitone_height: f64) -> bool {
        semitone_height > self.min_semitone_height()
    }

    fn is_on_piano_roll(&self, x: f32, width: f32, semitone_height: f64) -> bool {
        self.is_piano_roll_visible(semitone_height) && x > width / 2.0
    }

    fn draw_velocity_ruler(&self, surface: &mut dyn Surface, width: f32, height: f32, colors: &Colors) {
        const LARGE_GRAD_W: f32 = 10.0;
        const SMALL_GRAD_W: f32 = 5.0;
        let dark = colors.stroke_dark;

        // Ruler border
        surface.fill_rect(Rect::from_min_size(pos2(width - 1.0, 0.0), vec2(1.0, height)), dark);
        graduation(surface, width, LARGE_GRAD_W, 0.0, dark);
        graduation(surface, width, LARGE_GRAD_W, (height * 0.5).round(), dark);
        graduation(surface, width, LARGE_GRAD_W, height - 1.0, dark);
        if height > 60.0 {
            graduation(surface, width, SMALL_GRAD_W, (height * 0.25).round(), dark);
            graduation(surface, width, SMALL_GRAD_W, (height * 0.75).round(), dark);
        }

        surface.text(pos2(width - 20.0, height - 2.0), Align2::LEFT_BOTTOM, "0", LABEL_SIZE, colors.text);
        surface.text(pos2(width - 30.0, 12.0), Align2::LEFT_BOTTOM, "100%", LABEL_SIZE, colors.text);
    }
}

/// Right-aligned horizontal tick of a vertical ruler.
pub fn graduation(surface: &mut dyn Surface, width: f32, length: f32, y: f32, color: Color32) {
    surface.fill_rect(Rect::from_min_size(pos2(width - length, y), vec2(length, 1.0)), color);
}

/// Octave number with middle C (60) in octave 3.
pub fn octave_number(pitch: u8) -> i32 {
    i32::from(pitch) / 12 - 2
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLookAndFeel;

impl LookAndFeel for DefaultLookAndFeel {
    fn name(&self) -> &'static str {
        "default"
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LiveLookAndFeel;

impl LookAndFeel for LiveLookAndFeel {
    fn name(&self) -> &'static str {
        "live"
    }

    fn default_colors(&self) -> Colors {
        Colors::live()
    }

    fn draw_note(&self, surface: &mut dyn Surface, rect: Rect, velocity: u8, selected: bool, colors: &Colors) {
        surface.fill_rect(rect, note_fill(velocity, colors));
        let stroke = if selected {
            Stroke::new(2.0, colors.note_outline_selected)
        } else {
            Stroke::new(1.0, colors.note_outline)
        };
        surface.stroke_rect(rect, 0.0, stroke);
    }

    fn draw_velocity_handle(
        &self,
        surface: &mut dyn Surface,
        handle: &VelocityHandle,
        height: f32,
        v_scale: f32,
        radius: f32,
        colors: &Colors,
    ) {
        let h = f32::from(handle.velocity) * v_scale;
        let y = height - h;
        let color = if handle.selected {
            colors.velocity_handle_selected
        } else {
            colors.velocity_handle
        };
        surface.fill_rect(Rect::from_min_size(pos2(handle.x - 1.0, y), vec2(2.0, h)), color);
        surface.circle(pos2(handle.x, y), radius, colors.background, Stroke::new(1.8, color));
    }

    fn draw_pitch_labels(&self, surface: &mut dyn Surface, axis: &PitchAxis, colors: &Colors) {
        for pitch in (0..=MAX_PITCH).step_by(12) {
            let p = f64::from(pitch);
            if p >= axis.start && p <= axis.end {
                let y = axis.lane_bottom(p);
                let label = format!("C{}", octave_number(pitch));
                surface.text(pos2(2.0, y - 3.0), Align2::LEFT_BOTTOM, &label, LABEL_SIZE, colors.text);
                surface.fill_rect(Rect::from_min_size(pos2(0.0, y), vec2(axis.width, 1.0)), colors.stroke_dark);
            }
        }
    }

    fn draw_velocity_ruler(&self, surface: &mut dyn Surface, width: f32, height: f32, colors: &Colors) {
        const LARGE_GRAD_W: f32 = 10.0;
        const SMALL_GRAD_W: f32 = 5.0;
        const LABEL_RIGHT_MARGIN: f32 = 14.0;
        let dark = colors.stroke_dark;

        surface.fill_rect(Rect::from_min_size(pos2(width - 1.0, 0.0), vec2(1.0, height)), dark);
        graduation(surface, width, LARGE_GRAD_W, 0.0, dark);
        graduation(surface, width, SMALL_GRAD_W, (height * 0.5).round(), dark);
        graduation(surface, width, LARGE_GRAD_W, height - 1.0, dark);

        let label_x = width - LABEL_RIGHT_MARGIN;
        surface.text(Pos2::new(label_x, 12.0), Align2::RIGHT_BOTTOM, "127", LABEL_SIZE, colors.text);
        surface.text(Pos2::new(label_x, height - 2.0), Align2::RIGHT_BOTTOM, "0", LABEL_SIZE, colors.text);
    }
}

pub const THEME_NAMES: [&str; 2] = ["default", "live"];

pub fn look_and_feel_by_name(name: &str) -> Option<Box<dyn LookAndFeel>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "default" => Some(Box::new(DefaultLookAndFeel)),
        "live" => Some(Box::new(LiveLookAndFeel)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::surface::{DrawCommand, Layer};

    #[test]
    fn alternate_width_stays_in_band() {
        let sig = TimeSignature::default();
        // 16 sixteenths at 10 px is 160 px: one measure fits.
        assert_eq!(background_alternate_width(10.0, &sig), 16.0);
        // Narrow zoom doubles the measure.
        assert_eq!(background_alternate_width(2.0, &sig), 64.0);
        // Wide zoom falls back to beats, then halves.
        assert_eq!(background_alternate_width(40.0, &sig), 4.0);
        assert_eq!(background_alternate_width(100.0, &sig), 2.0);
    }

    #[test]
    fn note_fill_fades_with_velocity() {
        let colors = Colors::default();
        assert_eq!(note_fill(127, &colors), colors.note_high);
        assert_eq!(note_fill(0, &colors), colors.note_low_blend);
    }

    #[test]
    fn themes_resolve_by_name() {
        assert_eq!(look_and_feel_by_name("Live").unwrap().name(), "live");
        assert_eq!(look_and_feel_by_name("default").unwrap().name(), "default");
        assert!(look_and_feel_by_name("neon").is_none());
    }

    #[test]
    fn piano_roll_needs_tall_semitones() {
        let theme = DefaultLookAndFeel;
        assert!(!theme.is_on_piano_roll(35.0, 40.0, 5.0));
        assert!(theme.is_on_piano_roll(35.0, 40.0, 12.0));
        assert!(!theme.is_on_piano_roll(10.0, 40.0, 12.0));
    }

    #[test]
    fn time_background_marks_measures() {
        let mut layer = Layer::new(Rect::from_min_size(Pos2::ZERO, vec2(320.0, 100.0)));
        let axis = TimeAxis {
            height: 100.0,
            sixteenth: 10.0,
            increment: 4.0,
            start: 0.0,
            end: 32.0,
            signature: TimeSignature::default(),
        };
        let colors = Colors::default();
        DefaultLookAndFeel.draw_time_background(&mut layer, &axis, &colors);
        let dark = layer
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { fill, .. } if *fill == colors.stroke_dark))
            .count();
        // Lines at 0 and 16.
        assert_eq!(dark, 2);
    }
}
